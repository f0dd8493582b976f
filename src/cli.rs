//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::{Database, SubscriptionStatus};
use crate::password::hash_password;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use clap::Parser;
use rand::RngCore;
use tracing::{error, info};

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ADMIN_KEY_LENGTH: usize = 16;

/// New trial tenants get 30 days before the gate closes.
const TRIAL_DAYS: i64 = 30;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "courseops",
    about = "Multi-tenant training-course operations backend"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "courseops.db")]
    pub database: String,

    /// Path to file containing the JWT secret. Prefer the COURSEOPS_JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Path to file containing the admin API key. Prefer the COURSEOPS_ADMIN_KEY env var instead
    #[arg(long)]
    pub admin_key_file: Option<String>,

    /// Create a tenant account with this login email and print a generated password
    #[arg(long, value_name = "EMAIL")]
    pub create_tenant: Option<String>,

    /// Company name for --create-tenant
    #[arg(long, requires = "create_tenant")]
    pub tenant_name: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

fn load_secret(
    env_var: &'static str,
    file: Option<&str>,
    min_length: usize,
    flag: &str,
) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "A secret is required. Set the {} environment variable (recommended) or use {}",
            env_var, flag
        );
        return None;
    };

    if secret.len() < min_length {
        error!(
            "Secret from {} is shorter than {} characters. Use a longer secret",
            env_var, min_length
        );
        return None;
    }

    Some(secret)
}

/// Load the JWT signing secret from the environment or a file.
/// Returns None and logs an error if the secret cannot be loaded.
/// There is no default: a missing secret is a fatal configuration error.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    load_secret(
        "COURSEOPS_JWT_SECRET",
        jwt_secret_file,
        MIN_JWT_SECRET_LENGTH,
        "--jwt-secret-file",
    )
}

/// Load the admin API key from the environment or a file.
pub fn load_admin_key(admin_key_file: Option<&str>) -> Option<String> {
    load_secret(
        "COURSEOPS_ADMIN_KEY",
        admin_key_file,
        MIN_ADMIN_KEY_LENGTH,
        "--admin-key-file",
    )
}

/// Handle the --create-tenant flag: create a trial account and print its
/// generated password once.
pub async fn handle_create_tenant(db: &Database, email: &str, name: Option<&str>) {
    match db.accounts().get_by_email(email).await {
        Ok(Some(_)) => {
            error!(email = %email, "An account with this email already exists");
            std::process::exit(1);
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "Failed to check for existing account");
            std::process::exit(1);
        }
    }

    let mut password_bytes = [0u8; 18];
    rand::rng().fill_bytes(&mut password_bytes);
    let password = URL_SAFE_NO_PAD.encode(password_bytes);

    let password_hash = match hash_password(&password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Failed to hash generated password");
            std::process::exit(1);
        }
    };

    let name = name.unwrap_or(email);
    let expires_at = Utc::now() + Duration::days(TRIAL_DAYS);

    match db
        .accounts()
        .create(
            email,
            name,
            &password_hash,
            "trial",
            SubscriptionStatus::Trial,
            Some(&expires_at),
            5,
        )
        .await
    {
        Ok(id) => {
            println!();
            println!("Tenant account created: {} (id {})", email, id);
            println!("Password: {}", password);
            println!("Trial expires: {}", expires_at.to_rfc3339());
            println!();
        }
        Err(e) => {
            error!(error = %e, "Failed to create tenant account");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(db: Database, jwt_secret: String, admin_key: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        admin_key: admin_key.into_bytes(),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
