use std::fs;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::chat::{SqliteStore, Tutor};
use crate::core::db::{async_db, initialize_db};
use crate::core::{AppConfig, logging};

pub mod chat;
pub mod export;
pub mod init;
pub mod quiz;
pub mod serve;
pub mod sessions;
pub mod speak;

#[derive(Subcommand)]
enum Command {
    /// Initialize the database
    Init {
        #[arg(long, action, default_value = "false")]
        db: bool,
    },
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Chat with ADA in the terminal
    Chat {
        /// Continue an existing conversation instead of starting one
        #[arg(long)]
        session: Option<String>,
    },
    /// Take a quiz on the course
    Quiz {},
    /// List saved conversations
    Sessions {},
    /// Export a conversation as a text document
    Export {
        #[arg(long)]
        id: String,
        /// Defaults to session-YYYY-MM-DD.txt in the current directory
        #[arg(long)]
        out: Option<String>,
    },
    /// Read text out loud into a WAV file
    Speak {
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "ada.wav")]
        out: String,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

/// A tutor that keeps conversations in the database at `config.db_path`.
pub async fn open_tutor(config: &AppConfig) -> Result<Tutor> {
    fs::create_dir_all(&config.db_path)?;
    let db = async_db(&config.db_path).await?;
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await?;

    Ok(Tutor::builder(
        &config.gemini_api_hostname,
        &config.gemini_api_key,
        &config.model,
    )
    .system_instruction(&config.system_message)
    .store(Arc::new(SqliteStore::new(&db)))
    .build())
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let config = AppConfig::default();

    // The server installs its own subscriber
    if !matches!(args.command, Some(Command::Serve { .. })) {
        logging::init();
    }

    // Handle each sub command
    match args.command {
        Some(Command::Init { db }) => {
            init::run(db, &config.db_path).await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port, config).await?;
        }
        Some(Command::Chat { session }) => {
            chat::run(&config, session).await?;
        }
        Some(Command::Quiz {}) => {
            quiz::run(&config).await?;
        }
        Some(Command::Sessions {}) => {
            sessions::run(&config).await?;
        }
        Some(Command::Export { id, out }) => {
            export::run(&config, &id, out).await?;
        }
        Some(Command::Speak { text, out }) => {
            speak::run(&config, &text, &out).await?;
        }
        None => {}
    }

    Ok(())
}
