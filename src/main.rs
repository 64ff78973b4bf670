//! # Recall CLI (`recall`)
//!
//! ## Usage
//!
//! ```bash
//! recall --config ./config/recall.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall init` | Create the data directory, database, and vector directory |
//! | `recall ingest <file>` | Chunk, embed, and store a txt/md/html/pdf file |
//! | `recall databank <name> <type> <file>` | Ingest a DataBank entry |
//! | `recall chat ingest <character> <file.json>` | Archive and index a transcript |
//! | `recall chat characters` | List characters with archived chats |
//! | `recall chat list <character>` | List a character's chats |
//! | `recall chat show <character> <id>` | Print a transcript |
//! | `recall chat forget <character> <id>` | Remove a chat and its chunks |
//! | `recall search "<query>"` | Rank stored fragments against a query |
//! | `recall get <id>` | Show one stored fragment |
//! | `recall list` | List stored fragments |
//! | `recall delete <id>` | Delete one fragment |
//! | `recall purge --tag <t>` | Delete every fragment matching a filter |
//! | `recall stats` | Store summary |
//!
//! When the config file does not exist, built-in defaults rooted at
//! `./data` are used.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use recall::app::Services;
use recall::config::{self, Config};
use recall::search::{SearchOutput, SearchScope};
use recall::{chat_cmd, get, ingest, logging, search, stats};

/// Recall: local-first document and chat retrieval for RAG.
#[derive(Parser)]
#[command(name = "recall", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store. Idempotent.
    Init,

    /// Ingest a text, markdown, HTML, or PDF file.
    Ingest {
        file: PathBuf,

        /// Extra tag to attach (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Ingest a DataBank entry: `{name, content, type}`.
    Databank {
        name: String,
        /// Entry type, used as source and tag.
        #[arg(value_name = "TYPE")]
        kind: String,
        /// File holding the entry's text.
        file: PathBuf,
    },

    /// Chat transcript archive.
    Chat {
        #[command(subcommand)]
        action: ChatAction,
    },

    /// Search stored fragments.
    Search {
        query: String,

        /// Maximum number of results (defaults to `retrieval.default_limit`).
        #[arg(long)]
        limit: Option<i64>,

        #[command(flatten)]
        scope: ScopeArgs,

        /// Print results as a numbered context block.
        #[arg(long, conflicts_with = "json")]
        context: bool,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one stored fragment.
    Get {
        id: String,
        #[arg(long)]
        json: bool,
    },

    /// List stored fragments.
    List {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Delete one fragment and its vector.
    Delete { id: String },

    /// Delete every fragment matching the given filters.
    Purge {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Show store statistics.
    Stats,
}

#[derive(clap::Args)]
struct ScopeArgs {
    /// Only documents carrying this tag.
    #[arg(long)]
    tag: Option<String>,

    /// Only documents from this source.
    #[arg(long)]
    source: Option<String>,

    /// Only chat fragments for this character.
    #[arg(long)]
    character: Option<String>,
}

impl From<ScopeArgs> for SearchScope {
    fn from(args: ScopeArgs) -> Self {
        SearchScope {
            tag: args.tag,
            source: args.source,
            character: args.character,
        }
    }
}

#[derive(Subcommand)]
enum ChatAction {
    /// Archive and index a transcript JSON file.
    Ingest { character: String, file: PathBuf },
    /// List characters with archived chats.
    Characters,
    /// List a character's chats, newest first.
    List { character: String },
    /// Print a transcript.
    Show {
        character: String,
        id: String,
        /// Only the last N messages.
        #[arg(long)]
        last: Option<usize>,
    },
    /// Remove a chat from the archive and the index.
    Forget { character: String, id: String },
}

fn load(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load(&cli.config)?;
    logging::init(&cfg.logging)?;

    let services = Services::open(&cfg).await?;
    let result = dispatch(&services, cli.command).await;
    services.close().await;
    result
}

async fn dispatch(services: &Services, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init => {
            println!(
                "Store initialized at {}",
                services.config.storage.path.display()
            );
        }
        Commands::Ingest { file, tags } => {
            ingest::run_ingest_file(services, &file, &tags).await?;
        }
        Commands::Databank { name, kind, file } => {
            ingest::run_databank(services, &name, &kind, &file).await?;
        }
        Commands::Chat { action } => match action {
            ChatAction::Ingest { character, file } => {
                chat_cmd::run_chat_ingest(services, &character, &file).await?;
            }
            ChatAction::Characters => {
                chat_cmd::run_chat_characters(services).await?;
            }
            ChatAction::List { character } => {
                chat_cmd::run_chat_list(services, &character).await?;
            }
            ChatAction::Show {
                character,
                id,
                last,
            } => {
                chat_cmd::run_chat_show(services, &character, &id, last).await?;
            }
            ChatAction::Forget { character, id } => {
                chat_cmd::run_chat_forget(services, &character, &id).await?;
            }
        },
        Commands::Search {
            query,
            limit,
            scope,
            context,
            json,
        } => {
            let output = if json {
                SearchOutput::Json
            } else if context {
                SearchOutput::Context
            } else {
                SearchOutput::Text
            };
            search::run_search(services, &query, limit, &scope.into(), output).await?;
        }
        Commands::Get { id, json } => {
            get::run_get(services, &id, json).await?;
        }
        Commands::List { scope } => {
            get::run_list(services, &scope.into()).await?;
        }
        Commands::Delete { id } => {
            get::run_delete(services, &id).await?;
        }
        Commands::Purge { scope } => {
            get::run_purge(services, &scope.into()).await?;
        }
        Commands::Stats => {
            stats::run_stats(services).await?;
        }
    }
    Ok(())
}
