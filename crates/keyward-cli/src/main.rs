//! keyward - log in to a token-based auth service from the terminal.
//!
//! Thin host around `keyward-core`: it builds the session manager from
//! configuration and exposes register/login/logout/whoami/status.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use keyward_core::auth::DEFAULT_ACCOUNT;
use keyward_core::{
    AuthClient, Config, CredentialStore, EncryptedFileStore, KeyringStore, LogoutOutcome,
    MemoryStore, SessionManager, StoreBackend,
};

// ============================================================================
// Constants
// ============================================================================

/// Write logs to a daily-rotated file in this directory as well as stderr
const ENV_LOG_DIR: &str = "KEYWARD_LOG_DIR";

/// Non-interactive password for register/login
const ENV_PASSWORD: &str = "KEYWARD_PASSWORD";

/// Passphrase for the encrypted file store
const ENV_STORE_PASSPHRASE: &str = "KEYWARD_STORE_PASSPHRASE";

#[derive(Parser)]
#[command(name = "keyward", version, about = "Manage your auth-service session")]
struct Cli {
    /// Auth service base URL (overrides config and KEYWARD_API_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Where to keep the refresh token: keyring, file or memory
    #[arg(long, global = true)]
    store: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and log in
    Register {
        #[arg(env = "KEYWARD_EMAIL")]
        email: Option<String>,
    },
    /// Log in with email and password
    Login {
        #[arg(env = "KEYWARD_EMAIL")]
        email: Option<String>,
    },
    /// Log out and forget the stored refresh token
    Logout {
        /// Revoke every session of this user, not just this one
        #[arg(long)]
        all: bool,
    },
    /// Show the logged-in user's profile
    Whoami,
    /// Show session state without contacting the service beyond a refresh
    Status,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var_os(ENV_LOG_DIR) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "keyward.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn build_store(backend: StoreBackend) -> Result<Arc<dyn CredentialStore>> {
    let store: Arc<dyn CredentialStore> = match backend {
        StoreBackend::Keyring => {
            if !KeyringStore::is_persistent() {
                warn!("Built without native-keyring; the keyring store ends with this process. Use --store file to keep the session");
            }
            Arc::new(KeyringStore::new(DEFAULT_ACCOUNT)?)
        }
        StoreBackend::File => {
            let passphrase = match std::env::var(ENV_STORE_PASSPHRASE) {
                Ok(p) => p,
                Err(_) => rpassword::prompt_password("Credential store passphrase: ")?,
            };
            Arc::new(EncryptedFileStore::new(EncryptedFileStore::default_path()?, passphrase))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory credential store; the session ends with this process");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

fn prompt_email(default: Option<&str>) -> Result<String> {
    match default {
        Some(d) => eprint!("Email [{}]: ", d),
        None => eprint!("Email: "),
    }
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let email = line.trim();
    if email.is_empty() {
        default
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Email required"))
    } else {
        Ok(email.to_string())
    }
}

fn prompt_password() -> Result<String> {
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        return Ok(password);
    }
    Ok(rpassword::prompt_password("Password: ")?)
}

/// Pick up a session persisted by an earlier run. Failures are reported, not fatal.
async fn resume(session: &SessionManager) -> bool {
    match session.restore().await {
        Ok(restored) => restored,
        Err(e) => {
            eprintln!("Could not resume session: {}", e);
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    if let Some(url) = cli.base_url {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(store) = cli.store {
        config.credential_store = store.parse()?;
    }
    info!(base_url = %config.api_base_url, store = ?config.credential_store, "keyward starting");

    let client = AuthClient::new(&config.api_base_url, config.request_timeout())?;
    let store = build_store(config.credential_store)?;
    let session = SessionManager::new(client, store, config.session_config());

    match cli.command {
        Command::Register { email } => {
            let email = match email {
                Some(e) => e,
                None => prompt_email(config.last_email.as_deref())?,
            };
            let password = prompt_password()?;
            session
                .register(&email, &password)
                .await
                .context("Registration failed")?;
            remember_email(&mut config, email.clone());
            println!("Registered and logged in as {}", email);
        }
        Command::Login { email } => {
            let email = match email {
                Some(e) => e,
                None => prompt_email(config.last_email.as_deref())?,
            };
            let password = prompt_password()?;
            session.login(&email, &password).await.context("Login failed")?;
            remember_email(&mut config, email.clone());
            println!("Logged in as {}", email);
        }
        Command::Logout { all } => {
            resume(&session).await;
            match session.logout(all).await {
                LogoutOutcome::Revoked if all => println!("Logged out of all sessions"),
                LogoutOutcome::Revoked => println!("Logged out"),
                LogoutOutcome::LocalOnly => println!("Logged out locally"),
            }
        }
        Command::Whoami => {
            if !resume(&session).await {
                println!("Not logged in");
                return Ok(());
            }
            let profile = session.profile().await.context("Failed to fetch profile")?;
            println!("{} ({}, {})", profile.email, profile.id, profile.status_display());
        }
        Command::Status => {
            resume(&session).await;
            let snapshot = session.snapshot().await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}

fn remember_email(config: &mut Config, email: String) {
    config.last_email = Some(email);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}
