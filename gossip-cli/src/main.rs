//! # gossip-cli
//!
//! Command-line driver for the Gossip realtime chat client.
//!
//! ## Commands
//!
//! - `login` / `logout` / `whoami`: Session management
//! - `register` / `verify`: Account creation with an emailed OTP
//! - `friends` / `requests` / `request` / `block`: Contacts
//! - `send` / `history`: Direct and group messages
//! - `groups` / `create-group`: Group listing
//! - `watch`: Stream incoming events until the session ends
//! - `theme`: Show or change the chat theme
//!
//! ## Example
//!
//! ```bash
//! # Sign in (prompts for the password)
//! gossip-cli login --email alice@example.com
//!
//! # Talk to a friend
//! gossip-cli send --to 64f0c2 "see you at eight"
//! gossip-cli history --user 64f0c2
//!
//! # Follow pushes with debug logging
//! RUST_LOG=gossip_client=debug gossip-cli watch
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{auth, chat, contacts, Target};

/// Command-line driver for the Gossip realtime chat client.
#[derive(Parser, Debug)]
#[command(name = "gossip-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the persisted token and theme
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (default: gossip.toml in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in with email and password
    Login {
        /// Account email
        #[arg(long, short)]
        email: String,

        /// Password (will prompt if not provided)
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Create an account; an OTP is emailed for `verify`
    Register {
        /// Display name
        #[arg(long, short)]
        name: String,

        /// Account email
        #[arg(long, short)]
        email: String,

        /// Password (will prompt if not provided)
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Verify a new account with the emailed OTP and sign in
    Verify {
        /// Account email
        #[arg(long, short)]
        email: String,

        /// One-time password from the email
        otp: String,
    },

    /// Sign out and forget the stored token
    Logout,

    /// Show the signed-in account
    Whoami,

    /// List friends, marking the ones online
    Friends,

    /// List pending friend requests
    Requests,

    /// Send, accept, reject or cancel a friend request
    Request {
        /// Other user's id
        user: String,

        /// What to do with the request
        #[arg(long, value_enum, default_value = "send")]
        action: contacts::RequestAction,
    },

    /// Block or unblock a user
    Block {
        /// Other user's id
        user: String,

        /// Lift the block instead
        #[arg(long)]
        undo: bool,
    },

    /// Send a message to a user or group
    Send {
        /// Recipient user id
        #[arg(long, conflicts_with = "group")]
        to: Option<String>,

        /// Recipient group id
        #[arg(long, conflicts_with = "to")]
        group: Option<String>,

        /// Message text
        message: Option<String>,

        /// File to attach
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Print the history of a conversation
    History {
        /// Peer user id
        #[arg(long, conflicts_with = "group")]
        user: Option<String>,

        /// Group id
        #[arg(long, conflicts_with = "user")]
        group: Option<String>,

        /// Print messages as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// List groups
    Groups,

    /// Create a group with the given members
    CreateGroup {
        /// Group name
        #[arg(long, short)]
        name: String,

        /// Description
        #[arg(long, short, default_value = "")]
        description: String,

        /// Member user ids
        #[arg(long = "member")]
        members: Vec<String>,

        /// Admin user ids
        #[arg(long = "admin")]
        admins: Vec<String>,
    },

    /// Stream notices and incoming messages until the session ends
    Watch,

    /// Show or change the chat theme
    Theme {
        /// New theme id (e.g. dracula)
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let config_path = cli
        .config
        .unwrap_or_else(|| data_dir.join(commands::CONFIG_FILE));
    let client = commands::open_client(&data_dir, &config_path)?;

    match cli.command {
        Commands::Login { email, password } => {
            auth::login(&client, &email, password).await?;
        }
        Commands::Register {
            name,
            email,
            password,
        } => {
            auth::register(&client, &name, &email, password).await?;
        }
        Commands::Verify { email, otp } => {
            auth::verify(&client, &email, &otp).await?;
        }
        Commands::Logout => {
            auth::logout(&client).await?;
        }
        Commands::Whoami => {
            auth::whoami(&client).await?;
        }
        Commands::Friends => {
            contacts::friends(&client).await?;
        }
        Commands::Requests => {
            contacts::requests(&client).await?;
        }
        Commands::Request { user, action } => {
            contacts::request(&client, &user.into(), action).await?;
        }
        Commands::Block { user, undo } => {
            contacts::block(&client, &user.into(), undo).await?;
        }
        Commands::Send {
            to,
            group,
            message,
            file,
        } => {
            let target = Target::from_args(to, group)?;
            chat::send(&client, target, message, file.as_deref()).await?;
        }
        Commands::History { user, group, json } => {
            let target = Target::from_args(user, group)?;
            chat::history(&client, target, json).await?;
        }
        Commands::Groups => {
            chat::groups(&client).await?;
        }
        Commands::CreateGroup {
            name,
            description,
            members,
            admins,
        } => {
            chat::create_group(&client, &name, &description, members, admins).await?;
        }
        Commands::Watch => {
            chat::watch(&client).await?;
        }
        Commands::Theme { name } => {
            chat::theme(&client, name.as_deref()).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for gossip-cli.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "gossip", "gossip-cli")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
