mod commands;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use commands::{Command, HELP, parse, resolve_document};
use config::{AppConfig, ConfigStore, resolve_api_key};
use core_orchestrator::{Conversation, ConversationError, ConversationPipeline, TurnOutcome};
use core_types::{Message, ProviderConfig, ProviderId, UiLanguage};
use document_store::{DocumentStore, LocalFile};
use futures::future;
use i18n::I18n;
use provider_http::HttpProviderAdapter;
use retrieval::{ContextAssembler, Retriever};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Gemini,
    Openai,
}

impl From<ProviderArg> for ProviderId {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Gemini => ProviderId::Gemini,
            ProviderArg::Openai => ProviderId::OpenAi,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LangArg {
    En,
    Zh,
}

impl From<LangArg> for UiLanguage {
    fn from(value: LangArg) -> Self {
        match value {
            LangArg::En => UiLanguage::EnUs,
            LangArg::Zh => UiLanguage::ZhCn,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "docmind", version, about = "Chat with your documents")]
struct Cli {
    /// Directory holding config.json (defaults to the platform config dir).
    #[arg(long)]
    config_dir: Option<PathBuf>,
    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,
    /// Overrides the provider's default model.
    #[arg(long)]
    model: Option<String>,
    #[arg(long, value_enum)]
    lang: Option<LangArg>,
    /// Files to index before the session starts.
    files: Vec<PathBuf>,
}

struct App {
    i18n: I18n,
    store: DocumentStore,
    conversation: Conversation,
    pipeline: ConversationPipeline,
    provider: ProviderConfig,
    api_key: Result<String>,
}

impl App {
    fn new(config: AppConfig, cli: &Cli) -> Result<Self> {
        let i18n = I18n::new(cli.lang.map(Into::into).unwrap_or(config.language));
        let provider_id = cli.provider.map(Into::into).unwrap_or(config.active_provider);
        let mut provider = config.provider(provider_id)?.clone();
        if let Some(model) = &cli.model {
            provider.default_model = model.clone();
        }
        let api_key = resolve_api_key(&provider);
        if let Err(err) = &api_key {
            warn!(provider = ?provider.id, error = %err, "api key unavailable");
        }

        let pipeline = ConversationPipeline::new(Arc::new(HttpProviderAdapter::new()))
            .with_retriever(Retriever::new(config.retrieval.clone()))
            .with_assembler(ContextAssembler::default())
            .with_temperature(config.generation.temperature);

        Ok(Self {
            conversation: Conversation::with_welcome(i18n.t("chat.welcome")),
            i18n,
            store: DocumentStore::new(),
            pipeline,
            provider,
            api_key,
        })
    }

    fn upload(&mut self, paths: Vec<PathBuf>) {
        let report = self.store.upload(paths.into_iter().map(LocalFile::new));
        for id in &report.added {
            if let Some(doc) = self.store.get(id) {
                println!("{}: {} ({})", self.i18n.t("docs.added"), doc.name, doc.media_type);
            }
        }
        for failure in &report.failed {
            println!("{}: {} ({})", self.i18n.t("docs.failed"), failure.name, failure.error);
        }
    }

    fn list_documents(&self) {
        if self.store.is_empty() {
            println!("{}", self.i18n.t("docs.none"));
            return;
        }
        println!("{}:", self.i18n.t("docs.title"));
        for (index, doc) in self.store.documents().enumerate() {
            println!(
                "  {}. {}  [{}]  {} bytes  {}",
                index + 1,
                doc.name,
                doc.media_type,
                doc.content.len(),
                &doc.id.to_string()[..8]
            );
        }
    }

    fn remove(&mut self, key: &str) {
        let removed = resolve_document(&self.store, key).and_then(|id| self.store.remove(&id));
        match removed {
            Some(doc) => println!("{}: {}", self.i18n.t("docs.removed"), doc.name),
            None => println!("{}: {key}", self.i18n.t("docs.not_found")),
        }
    }

    /// Streams one reply to stdout. Ctrl-C stops consuming and keeps the partial text.
    async fn ask(&mut self, text: &str) -> Result<()> {
        let api_key = match &self.api_key {
            Ok(key) => key.clone(),
            Err(err) => {
                println!("{}: {err}", self.i18n.t("app.no_api_key"));
                return Ok(());
            }
        };

        let outcome = self
            .pipeline
            .run_turn(
                &mut self.conversation,
                &self.store,
                &self.provider,
                &api_key,
                text,
                |fragment| {
                    print!("{fragment}");
                    if let Err(err) = io::stdout().flush() {
                        warn!(error = %err, "failed to flush stdout");
                    }
                },
                interrupted(),
            )
            .await;

        match outcome {
            Ok(TurnOutcome::Completed(reply_id)) => {
                println!();
                if let Some(message) = self.conversation.message(reply_id) {
                    print_sources(message);
                }
            }
            Ok(TurnOutcome::Cancelled(_)) => {
                println!();
                println!("{}", self.i18n.t("chat.cancelled"));
            }
            Err(ConversationError::Busy) => println!("{}", self.i18n.t("chat.busy")),
            Err(ConversationError::EmptyMessage) => println!("{}", self.i18n.t("chat.empty")),
            Err(ConversationError::Provider(err)) => {
                error!(error = %err, "reply failed");
                println!();
                println!("{}", self.i18n.t("chat.unavailable"));
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }
}

/// Resolves on Ctrl-C. Never resolves if the signal handler cannot be installed.
async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl-c handler unavailable");
        future::pending::<()>().await;
    }
}

fn print_sources(message: &Message) {
    if !message.sources.is_empty() {
        println!("[sources: {}]", message.sources.join(", "));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    data_dir.push("docmind");
    if let Err(err) = fs::create_dir_all(&data_dir) {
        eprintln!("failed to prepare data dir: {err}");
    }
    let _log_guard = init_local_logger(&data_dir.join("logs"));

    let config_store = match &cli.config_dir {
        Some(dir) => ConfigStore::from_dir(dir),
        None => ConfigStore::from_default_location()?,
    };
    let config = match config_store.load_or_init() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to load config: {err:#}");
            AppConfig::default()
        }
    };

    let mut app = App::new(config, &cli)?;
    info!(provider = ?app.provider.id, model = %app.provider.default_model, "session started");
    if let Some(welcome) = app.conversation.messages().first() {
        println!("{}", welcome.text);
    }
    if !cli.files.is_empty() {
        app.upload(cli.files.clone());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush().context("failed to flush stdout")?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match parse(&line) {
            Command::Help => println!("{HELP}"),
            Command::Upload(paths) => app.upload(paths),
            Command::Docs => app.list_documents(),
            Command::Remove(key) => app.remove(&key),
            Command::Action(action) => app.ask(action.prompt()).await?,
            Command::Lang(lang) => app.i18n.set_language(lang),
            Command::Quit => break,
            Command::Ask(text) if text.is_empty() => {}
            Command::Ask(text) => app.ask(&text).await?,
            Command::Unknown(_) => println!("{}", app.i18n.t("app.unknown_command")),
        }
    }

    info!(
        messages = app.conversation.messages().len(),
        documents = app.store.len(),
        "session ended"
    );
    Ok(())
}

fn init_local_logger(log_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    if let Err(err) = fs::create_dir_all(log_dir) {
        eprintln!("failed to create log dir `{}`: {err}", log_dir.display());
    }
    let file_appender = tracing_appender::rolling::daily(log_dir, "docmind.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,docmind=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .with_writer(writer)
        .init();

    guard
}
