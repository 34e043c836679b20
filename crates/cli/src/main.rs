//! Barker CLI - shipping quotes, token inspection and sessions.
//!
//! # Usage
//!
//! ```bash
//! # Quote shipping against the live backend
//! barker quote 1425
//!
//! # Quote against a saved `shipping-zones/` response
//! barker quote 1425 --zones zones.json
//!
//! # Decode an access token (signature is not checked)
//! barker token inspect eyJhbGciOi...
//!
//! # Log in and keep the session in a file
//! BARKER_PASSWORD=secret barker session login -e ana@barker.com
//! barker session status
//! barker session refresh
//! barker session watch
//! barker session logout
//! ```
//!
//! # Environment Variables
//!
//! - `BARKER_API_BASE` - Backend REST base URL
//! - `BARKER_PASSWORD` - Password for `session login` when `--password` is omitted

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "barker")]
#[command(author, version, about = "Barker storefront CLI tools")]
struct Cli {
    /// Backend REST base URL (defaults to `BARKER_API_BASE`, then production)
    #[arg(long, global = true)]
    api: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Quote shipping for a postal code
    Quote {
        /// Postal code as typed at checkout
        postal_code: String,

        /// Read zones from a saved JSON response instead of the backend
        #[arg(short, long)]
        zones: Option<PathBuf>,

        /// Store pickup (always free)
        #[arg(long)]
        pickup: bool,
    },
    /// Inspect access tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Manage a stored login session
    Session {
        /// File holding the token pair
        #[arg(long, global = true, default_value = ".barker/session.json")]
        store: PathBuf,

        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Print a token's claims, expiry and role
    Inspect {
        /// The JWT
        token: String,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Log in with email and password
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Password (falls back to `BARKER_PASSWORD`)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Exchange the refresh token for a new access token
    Refresh,
    /// Show the stored session
    Status,
    /// Keep the session alive with silent refreshes until Ctrl+C
    Watch,
    /// Clear the stored session
    Logout,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let api = commands::api_base(cli.api);

    match cli.command {
        Commands::Quote {
            postal_code,
            zones,
            pickup,
        } => commands::quote::run(&api, &postal_code, zones.as_deref(), pickup).await?,
        Commands::Token { action } => match action {
            TokenAction::Inspect { token } => commands::token::inspect(&token)?,
        },
        Commands::Session { store, action } => {
            let session = commands::session::open(&api, &store)?;
            match action {
                SessionAction::Login { email, password } => {
                    commands::session::login(&session, &email, password).await?;
                }
                SessionAction::Refresh => commands::session::refresh(&session).await?,
                SessionAction::Status => commands::session::status(&session)?,
                SessionAction::Watch => commands::session::watch(&session).await?,
                SessionAction::Logout => commands::session::logout(&session),
            }
        }
    }
    Ok(())
}
