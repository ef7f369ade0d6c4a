//! Command-line interface argument parsing.
//!
//! One subcommand per worker, plus the global logging and settings flags.

use crate::models::{OutputFormat, SummaryType};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tsw - tiny smart workers
///
/// Small LLM-driven workers for research, reading, writing, and code.
///
/// Examples:
///   tsw research "rust async runtimes" -c research.json
///   tsw think https://example.com/post
///   tsw summarise paper.pdf --type both
///   tsw kb create paper.pdf -c kb.json
///   tsw code pack code.json
///   tsw --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the settings file
    ///
    /// If not specified, looks for .tsw.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true, env = "TSW_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Generate a default .tsw.toml settings file
    #[arg(long)]
    pub init_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Research a topic in rounds and write a report
    Research {
        topic: String,

        /// Research config (JSON)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Quick report: break a topic down and look up each part once
    Report {
        topic: String,

        #[arg(short, long, default_value = "pdf", value_name = "FORMAT")]
        format: OutputFormat,
    },

    /// Ask and answer questions about an article
    Think {
        link: String,

        /// Thinking config (JSON)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Write a technical article from an agenda
    Write {
        /// Writer config (JSON)
        config: PathBuf,
    },

    /// Summarise a PDF
    #[command(alias = "summary")]
    Summarise {
        file: PathBuf,

        #[arg(short = 't', long = "type", default_value = "text", value_name = "TYPE")]
        kind: SummaryType,
    },

    /// Aggregate job listings from several pages into HTML
    Aggregate {
        /// Aggregation config (JSON)
        config: PathBuf,
    },

    /// Manage the PDF knowledge base
    #[command(arg_required_else_help = true)]
    Kb {
        #[command(subcommand)]
        action: KbCommand,
    },

    /// Pack or explain a code repository
    #[command(arg_required_else_help = true)]
    Code {
        #[command(subcommand)]
        action: CodeCommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum KbCommand {
    /// Add a PDF
    Create {
        file: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Replace a PDF's chunks
    Refresh {
        file: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Remove an entry by name
    Remove {
        name: String,

        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// List entries
    List {
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

impl KbCommand {
    pub fn config(&self) -> Option<&PathBuf> {
        match self {
            KbCommand::Create { config, .. }
            | KbCommand::Refresh { config, .. }
            | KbCommand::Remove { config, .. }
            | KbCommand::List { config } => config.as_ref(),
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum CodeCommand {
    /// Explain the repository's architecture
    Explain {
        /// Code config (JSON)
        config: PathBuf,
    },

    /// Pack the repository into one markdown file
    Pack {
        /// Code config (JSON)
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.command.is_none() && !self.init_config {
            return Err("No command given".to_string());
        }

        match &self.command {
            Some(Command::Research { topic, .. }) | Some(Command::Report { topic, .. }) => {
                if topic.trim().is_empty() {
                    return Err("Topic must not be empty".to_string());
                }
            }
            Some(Command::Think { link, .. }) => {
                if !link.starts_with("http://") && !link.starts_with("https://") {
                    return Err("Link must start with 'http://' or 'https://'".to_string());
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tsw").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_research() {
        let cli = parse(&["research", "rust async", "-c", "research.json"]);
        match cli.command {
            Some(Command::Research { topic, config }) => {
                assert_eq!(topic, "rust async");
                assert_eq!(config, Some(PathBuf::from("research.json")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_summary_alias_and_type() {
        let cli = parse(&["summary", "paper.pdf", "-t", "both"]);
        match cli.command {
            Some(Command::Summarise { file, kind }) => {
                assert_eq!(file, PathBuf::from("paper.pdf"));
                assert_eq!(kind, SummaryType::Both);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_report_defaults_to_pdf() {
        let cli = parse(&["report", "wasm"]);
        assert!(matches!(
            cli.command,
            Some(Command::Report { format: OutputFormat::Pdf, .. })
        ));
    }

    #[test]
    fn test_kb_config_accessor() {
        let cli = parse(&["kb", "remove", "paper", "--config", "kb.json"]);
        match cli.command {
            Some(Command::Kb { action }) => {
                assert_eq!(action.config(), Some(&PathBuf::from("kb.json")));
                assert!(matches!(action, KbCommand::Remove { ref name, .. } if name == "paper"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_bare_group_shows_help() {
        for group in ["kb", "code"] {
            let err = Cli::try_parse_from(["tsw", group]).unwrap_err();
            assert_eq!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            );
        }
    }

    #[test]
    fn test_txt_format_is_hidden() {
        assert!(Cli::try_parse_from(["tsw", "report", "x", "--format", "txt"]).is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let cli = parse(&["-v", "-q", "report", "x"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_validation_requires_command() {
        assert!(parse(&[]).validate().is_err());
        assert!(parse(&["--init-config"]).validate().is_ok());
    }

    #[test]
    fn test_validation_think_link() {
        assert!(parse(&["think", "not-a-link"]).validate().is_err());
        assert!(parse(&["think", "https://a.io/post"]).validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut cli = parse(&["research", "x"]);
        assert_eq!(cli.log_level(), tracing::Level::INFO);

        cli.verbose = true;
        assert_eq!(cli.log_level(), tracing::Level::DEBUG);

        cli.verbose = false;
        cli.quiet = true;
        assert_eq!(cli.log_level(), tracing::Level::ERROR);
    }
}
