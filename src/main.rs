//! # Vault Search CLI (`vsearch`)
//!
//! Builds the static search index from the vault and runs queries against
//! it or against the SQLite-backed query runtime.
//!
//! ## Usage
//!
//! ```bash
//! vsearch --config ./config/vsearch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vsearch build-index` | Build the static search index JSON |
//! | `vsearch search "<query>"` | Search the built index |
//! | `vsearch sql "<statement>"` | Run SQL against the vault |
//! | `vsearch fts "<text>"` | Full-text search via FTS5 |
//! | `vsearch similar "<text>"` | Embedding similarity search |
//! | `vsearch embed "<text>"` | Print the embedding of a text |
//! | `vsearch status` | Print search readiness events |
//! | `vsearch completions <shell>` | Generate shell completions |

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use vault_search::{build_index, config, query_cmd, search};

/// Vault Search CLI: build and query the vault's search index.
///
/// All commands except `completions` read a TOML configuration file given
/// by `--config`. See `config/vsearch.toml` for an example.
#[derive(Parser)]
#[command(
    name = "vsearch",
    about = "Vault Search: search index builder and query runtime for a columnar knowledge-base vault",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vsearch.toml")]
    config: PathBuf,

    /// Log at DEBUG instead of INFO.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build the static search index.
    ///
    /// Reads the vault, drops drafts and incomplete pages, and writes
    /// `{ index, documents }` JSON. A missing vault file is logged and
    /// skipped.
    BuildIndex {
        /// Output path (defaults to `[index].output`).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Leave the stored-document list out of the output.
        #[arg(long)]
        no_documents: bool,
    },

    /// Search the built index.
    ///
    /// Supports inline filters: `tag:x` / `#x`, `author:x` / `@x`,
    /// `title:x`.
    Search {
        /// The search query string.
        query: String,

        /// Only return documents dated on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run a SQL statement against the vault and print JSON rows.
    Sql {
        /// SQL statement. The vault is in table `vault`.
        statement: String,
    },

    /// Full-text search over the configured FTS columns.
    Fts {
        text: String,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Rank documents by embedding similarity to a text.
    Similar {
        text: String,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the mean-pooled, normalized embedding of a text.
    Embed { text: String },

    /// Start the query engine and print status events.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish).
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "vsearch", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::BuildIndex {
            output,
            no_documents,
        } => {
            let include_documents = cfg.index.include_documents && !no_documents;
            if let Some(summary) =
                build_index::run_build_index(&cfg, output.as_deref(), include_documents)?
            {
                println!(
                    "Indexed {} of {} rows into {}",
                    summary.documents,
                    summary.rows_read,
                    summary.output.display()
                );
            }
        }
        Commands::Search {
            query,
            since,
            limit,
        } => {
            search::run_search(&cfg, &query, since, limit)?;
        }
        Commands::Sql { statement } => {
            query_cmd::run_sql(&cfg, &statement).await?;
        }
        Commands::Fts { text, limit } => {
            query_cmd::run_fts(&cfg, &text, limit).await?;
        }
        Commands::Similar { text, limit } => {
            query_cmd::run_similar(&cfg, &text, limit).await?;
        }
        Commands::Embed { text } => {
            query_cmd::run_embed(&cfg, &text).await?;
        }
        Commands::Status => {
            query_cmd::run_status(&cfg).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
