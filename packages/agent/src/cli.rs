//! Command-line interface for the form agent.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{self, AgentConfig, API_KEY_VAR};
use crate::error::{FormAgentError, Result};
use crate::query::QueryOrchestrator;
use crate::render::{render_answer, render_summary};
use crate::store::FormStore;

/// Form agent - Ask questions about OCR'd forms.
#[derive(Parser)]
#[command(name = "formagent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Form store directory (default: $FORMAGENT_STORE_DIR or data/forms_db)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register the OCR text of a form.
    Add {
        /// File holding the extracted text
        text_file: PathBuf,

        /// Original upload to keep next to the text
        #[arg(long)]
        source: Option<PathBuf>,

        /// Display name (default: the source or text file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// List stored forms.
    List,

    /// Ask a question about one or more forms.
    Ask {
        question: String,

        /// Form id to include (repeatable, default: all forms)
        #[arg(short, long = "form")]
        forms: Vec<String>,

        /// Print the raw query result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize one or more forms.
    Summarize {
        /// Form id to include (repeatable, default: all forms)
        #[arg(short, long = "form")]
        forms: Vec<String>,

        /// Print the raw query result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify the API key and the form store.
    Check,
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let store = FormStore::new(config::store_dir(cli.store));

    match cli.command {
        Commands::Add {
            text_file,
            source,
            name,
        } => add_command(&store, &text_file, source.as_deref(), name.as_deref()),
        Commands::List => list_command(&store),
        Commands::Ask {
            question,
            forms,
            json,
        } => ask_command(&store, &question, &forms, json),
        Commands::Summarize { forms, json } => summarize_command(&store, &forms, json),
        Commands::Check => check_command(&store),
    }
}

fn add_command(
    store: &FormStore,
    text_file: &Path,
    source: Option<&Path>,
    name: Option<&str>,
) -> Result<()> {
    let ocr_text = fs::read_to_string(text_file)?;
    let original = match source {
        Some(path) => fs::read(path)?,
        None => ocr_text.clone().into_bytes(),
    };

    let file_name = name
        .map(str::to_string)
        .or_else(|| file_name_of(source.unwrap_or(text_file)))
        .ok_or_else(|| {
            FormAgentError::InvalidInput(format!("cannot name form from {}", text_file.display()))
        })?;

    let id = store.save(&file_name, &original, &ocr_text)?;

    println!(
        "{} {} as {}",
        style("Saved").green().bold(),
        style(&file_name).cyan(),
        id
    );
    Ok(())
}

fn list_command(store: &FormStore) -> Result<()> {
    let documents = store.load_all()?;
    if documents.is_empty() {
        println!("No forms in {}", store.root().display());
        return Ok(());
    }

    for doc in &documents {
        println!(
            "{}  {}  ({} chars)",
            doc.id,
            style(&doc.display_name).cyan(),
            doc.text.chars().count()
        );
    }
    Ok(())
}

fn ask_command(store: &FormStore, question: &str, forms: &[String], json: bool) -> Result<()> {
    let documents = store.load_selected(forms)?;
    let config = AgentConfig::from_env()?;
    let orchestrator = QueryOrchestrator::from_config(&config)?;

    let result = with_spinner("Asking the model...", || {
        orchestrator.answer_question(&documents, question)
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_answer(&result, &documents));
    }
    Ok(())
}

fn summarize_command(store: &FormStore, forms: &[String], json: bool) -> Result<()> {
    let documents = store.load_selected(forms)?;
    let config = AgentConfig::from_env()?;
    let orchestrator = QueryOrchestrator::from_config(&config)?;

    let result = with_spinner("Summarizing...", || orchestrator.summarize(&documents))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_summary(&result));
    }
    Ok(())
}

fn check_command(store: &FormStore) -> Result<()> {
    let config = AgentConfig::from_env();
    match &config {
        Ok(config) => println!(
            "{} {API_KEY_VAR} is set (model: {})",
            style("ok").green().bold(),
            config.model
        ),
        Err(e) => println!("{} {e}", style("missing").red().bold()),
    }

    let root = store.root();
    if root.is_dir() {
        let forms = store.load_all()?;
        println!(
            "{} form store at {} ({} forms)",
            style("ok").green().bold(),
            root.display(),
            forms.len()
        );
    } else {
        println!(
            "{} form store at {} does not exist yet; it is created on first add",
            style("note").yellow().bold(),
            root.display()
        );
    }

    config.map(|_| ())
}

/// Run `f` behind a spinner that is cleared once it returns.
fn with_spinner<T>(message: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = f();
    pb.finish_and_clear();
    result
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_ask() {
        let cli = Cli::parse_from([
            "formagent",
            "ask",
            "What is the gross income?",
            "--form",
            "a",
            "-f",
            "b",
        ]);

        assert!(cli.store.is_none());
        let Commands::Ask {
            question,
            forms,
            json,
        } = cli.command
        else {
            panic!("expected ask command");
        };
        assert_eq!(question, "What is the gross income?");
        assert_eq!(forms, vec!["a".to_string(), "b".to_string()]);
        assert!(!json);
    }

    #[test]
    fn test_cli_parse_summarize_with_store() {
        let cli = Cli::parse_from(["formagent", "summarize", "--json", "--store", "/tmp/forms"]);

        assert_eq!(cli.store, Some(PathBuf::from("/tmp/forms")));
        let Commands::Summarize { forms, json } = cli.command else {
            panic!("expected summarize command");
        };
        assert!(forms.is_empty());
        assert!(json);
    }

    #[test]
    fn test_cli_parse_add() {
        let cli = Cli::parse_from([
            "formagent",
            "add",
            "scan.txt",
            "--source",
            "scan.pdf",
            "--name",
            "Application",
        ]);

        let Commands::Add {
            text_file,
            source,
            name,
        } = cli.command
        else {
            panic!("expected add command");
        };
        assert_eq!(text_file, PathBuf::from("scan.txt"));
        assert_eq!(source, Some(PathBuf::from("scan.pdf")));
        assert_eq!(name.as_deref(), Some("Application"));
    }

    #[test]
    fn test_add_command_stores_text() {
        let dir = tempfile::tempdir().unwrap();
        let text_file = dir.path().join("scan.txt");
        fs::write(&text_file, "Full Name: Alex Johnson").unwrap();
        let store = FormStore::new(dir.path().join("forms"));

        add_command(&store, &text_file, None, None).unwrap();

        let docs = store.load_all().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].display_name, "scan.txt");
        assert_eq!(docs[0].text, "Full Name: Alex Johnson");
    }

    #[test]
    fn test_with_spinner_passes_result_through() {
        assert_eq!(with_spinner("x", || Ok(3)).unwrap(), 3);
        assert!(with_spinner::<()>("x", || Err(FormAgentError::InvalidInput("bad".into()))).is_err());
    }
}
