use std::str::FromStr;

use anyhow::{Error, anyhow};

/// Canned workspace-wide requests, submitted as ordinary turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkspaceAction {
    Summarize,
    Insights,
    Conflicts,
}

impl WorkspaceAction {
    pub const ALL: [WorkspaceAction; 3] = [Self::Summarize, Self::Insights, Self::Conflicts];

    pub fn name(self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Insights => "insights",
            Self::Conflicts => "conflicts",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::Summarize => {
                "Synthesize all indexed data and provide a unified technical summary."
            }
            Self::Insights => {
                "Run a semantic analysis to discover correlations across the current document index."
            }
            Self::Conflicts => {
                "Audit all documents for potential logical inconsistencies or contradictory data points."
            }
        }
    }
}

impl FromStr for WorkspaceAction {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| anyhow!("unknown workspace action `{value}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_action_names() {
        assert_eq!(
            "Summarize".parse::<WorkspaceAction>().expect("parse"),
            WorkspaceAction::Summarize
        );
        assert_eq!(
            " conflicts ".parse::<WorkspaceAction>().expect("parse"),
            WorkspaceAction::Conflicts
        );
        assert!("audit".parse::<WorkspaceAction>().is_err());
    }

    #[test]
    fn prompts_are_distinct() {
        let prompts: Vec<_> = WorkspaceAction::ALL.iter().map(|a| a.prompt()).collect();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].starts_with("Synthesize"));
        assert!(prompts[2].starts_with("Audit"));
    }
}
