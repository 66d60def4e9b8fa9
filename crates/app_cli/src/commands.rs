use std::path::PathBuf;

use core_orchestrator::WorkspaceAction;
use core_types::{DocumentId, UiLanguage};
use document_store::DocumentStore;
use uuid::Uuid;

pub const HELP: &str = "\
/upload <path>...   index text files
/docs               list indexed documents
/remove <n|id|name> remove a document
/summarize          summarize every document
/insights           look for correlations across documents
/conflicts          look for contradictions across documents
/lang <en|zh>       switch interface language
/quit               leave (Ctrl-D also works)
Anything else is sent as a question. Ctrl-C stops a streaming reply.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Upload(Vec<PathBuf>),
    Docs,
    Remove(String),
    Action(WorkspaceAction),
    Lang(UiLanguage),
    Quit,
    Ask(String),
    Unknown(String),
}

pub fn parse(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Ask(line.to_string());
    };
    let (name, args) = rest
        .split_once(char::is_whitespace)
        .map(|(name, args)| (name, args.trim()))
        .unwrap_or((rest, ""));

    match name {
        "help" | "?" => Command::Help,
        "upload" | "add" if !args.is_empty() => {
            Command::Upload(args.split_whitespace().map(PathBuf::from).collect())
        }
        "docs" | "ls" => Command::Docs,
        "remove" | "rm" if !args.is_empty() => Command::Remove(args.to_string()),
        "lang" => match args {
            "en" | "en_us" => Command::Lang(UiLanguage::EnUs),
            "zh" | "zh_cn" => Command::Lang(UiLanguage::ZhCn),
            _ => Command::Unknown(line.to_string()),
        },
        "quit" | "exit" | "q" => Command::Quit,
        other => match other.parse::<WorkspaceAction>() {
            Ok(action) => Command::Action(action),
            Err(_) => Command::Unknown(line.to_string()),
        },
    }
}

/// Accepts an exact name, a 1-based list position, a full id, or a unique id prefix.
///
/// Names are checked first so a document called `2` stays reachable by name.
pub fn resolve_document(store: &DocumentStore, key: &str) -> Option<DocumentId> {
    let key = key.trim();
    if let Some(doc) = store.documents().find(|doc| doc.name == key) {
        return Some(doc.id);
    }
    if let Ok(position) = key.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|index| store.documents().nth(index))
            .map(|doc| doc.id);
    }
    if let Ok(id) = Uuid::parse_str(key) {
        return store.get(&id).map(|doc| doc.id);
    }

    let mut prefixed = store
        .documents()
        .filter(|doc| key.len() >= 4 && doc.id.to_string().starts_with(key));
    match (prefixed.next(), prefixed.next()) {
        (Some(doc), None) => Some(doc.id),
        _ => None,
    }
}
