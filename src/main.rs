use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pattern_qa::Result;
use pattern_qa::commands::{answer_query, ingest_patterns, query_patterns};
use pattern_qa::config::{Config, ModelConfig};

#[derive(Parser)]
#[command(name = "pattern-qa")]
#[command(about = "Retrieval-augmented search and explanation for a catalog of code patterns")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and embed a pattern catalog into the vector collection
    Ingest {
        /// Path to the pattern catalog file
        source: PathBuf,
        /// Vector store directory
        #[arg(long)]
        persist_dir: Option<PathBuf>,
        /// Collection name
        #[arg(long)]
        collection: Option<String>,
        /// Delete the existing collection before ingesting
        #[arg(long)]
        reset: bool,
        /// Path to the ONNX embedding model directory
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// Search the collection for the nearest patterns
    Query {
        /// Search query text
        query: String,
        /// Number of results to retrieve
        #[arg(long, default_value_t = 3)]
        top_k: usize,
        /// Vector store directory
        #[arg(long)]
        persist_dir: Option<PathBuf>,
        /// Collection name
        #[arg(long)]
        collection: Option<String>,
        /// Path to the ONNX embedding model directory
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// Retrieve the best match and explain it with generated code
    Answer {
        /// Search query text
        query: String,
        /// Number of results to retrieve
        #[arg(long, default_value_t = 1)]
        top_k: usize,
        /// Vector store directory
        #[arg(long)]
        persist_dir: Option<PathBuf>,
        /// Collection name
        #[arg(long)]
        collection: Option<String>,
        /// Path to the ONNX embedding model directory
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
}

fn model_config(base: &Config, model_dir: Option<PathBuf>) -> ModelConfig {
    ModelConfig {
        model_dir: model_dir.unwrap_or_else(|| base.model.model_dir.clone()),
        ..base.model.clone()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = Config::config_dir()
        .map_err(|e| pattern_qa::PatternError::Config(e.to_string()))?;
    let config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Ingest {
            source,
            persist_dir,
            collection,
            reset,
            model_dir,
        } => {
            let persist_dir = persist_dir.unwrap_or_else(|| config.store.persist_dir.clone());
            let collection = collection.unwrap_or_else(|| config.store.collection.clone());
            let model = model_config(&config, model_dir);
            ingest_patterns(&source, &persist_dir, &collection, reset, &model).await?;
        }
        Commands::Query {
            query,
            top_k,
            persist_dir,
            collection,
            model_dir,
        } => {
            let persist_dir = persist_dir.unwrap_or_else(|| config.store.persist_dir.clone());
            let collection = collection.unwrap_or_else(|| config.store.collection.clone());
            let model = model_config(&config, model_dir);
            query_patterns(&query, top_k, &persist_dir, &collection, &model).await?;
        }
        Commands::Answer {
            query,
            top_k,
            persist_dir,
            collection,
            model_dir,
        } => {
            let persist_dir = persist_dir.unwrap_or_else(|| config.store.persist_dir.clone());
            let collection = collection.unwrap_or_else(|| config.store.collection.clone());
            let model = model_config(&config, model_dir);
            answer_query(
                &query,
                top_k,
                &persist_dir,
                &collection,
                &model,
                &config.generation,
            )
            .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["pattern-qa", "ingest", "patterns.txt"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::Ingest { .. });
        }
    }

    #[test]
    fn ingest_command_with_reset() {
        let cli = Cli::try_parse_from(["pattern-qa", "ingest", "patterns.txt", "--reset"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest { source, reset, .. } = parsed.command {
                assert_eq!(source, PathBuf::from("patterns.txt"));
                assert!(reset);
            }
        }
    }

    #[test]
    fn query_command_with_top_k() {
        let cli = Cli::try_parse_from(["pattern-qa", "query", "builder pattern", "--top-k", "5"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Query { query, top_k, .. } = parsed.command {
                assert_eq!(query, "builder pattern");
                assert_eq!(top_k, 5);
            }
        }
    }

    #[test]
    fn query_top_k_defaults_to_three() {
        let cli = Cli::try_parse_from(["pattern-qa", "query", "singleton"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Query { top_k, .. } = parsed.command {
                assert_eq!(top_k, 3);
            }
        }
    }

    #[test]
    fn answer_top_k_defaults_to_one() {
        let cli = Cli::try_parse_from(["pattern-qa", "answer", "singleton"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Answer { top_k, .. } = parsed.command {
                assert_eq!(top_k, 1);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["pattern-qa", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["pattern-qa", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
