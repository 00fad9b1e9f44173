//! Server command implementation

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tally_core::{LogMailer, MailConfig, Mailer, SmtpMailer};
use tally_server::ServerConfig;

use super::open_db;

/// Read an environment variable, treating empty as unset
fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a comma-separated list, dropping blanks
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Server settings from TALLY_JWT_SECRET, TALLY_TOKEN_TTL_DAYS and TALLY_ALLOWED_ORIGINS
pub fn server_config_from_env() -> Result<ServerConfig> {
    let secret = env_var("TALLY_JWT_SECRET")
        .context("TALLY_JWT_SECRET must be set to sign bearer tokens")?;

    let mut config = ServerConfig::new(secret);
    if let Some(ttl) = env_var("TALLY_TOKEN_TTL_DAYS") {
        config.token_ttl_days = ttl
            .parse::<i64>()
            .ok()
            .filter(|days| *days > 0)
            .with_context(|| format!("Invalid TALLY_TOKEN_TTL_DAYS: {}", ttl))?;
    }
    if let Some(origins) = env_var("TALLY_ALLOWED_ORIGINS") {
        config.allowed_origins = parse_list(&origins);
    }
    Ok(config)
}

/// SMTP settings, present only when TALLY_SMTP_HOST is set
pub fn mail_config_from_env() -> Result<Option<MailConfig>> {
    let Some(smtp_host) = env_var("TALLY_SMTP_HOST") else {
        return Ok(None);
    };
    Ok(Some(MailConfig {
        smtp_host,
        username: env_var("TALLY_SMTP_USERNAME").unwrap_or_default(),
        password: env_var("TALLY_SMTP_PASSWORD").unwrap_or_default(),
        from: env_var("TALLY_MAIL_FROM")
            .context("TALLY_MAIL_FROM must be set when TALLY_SMTP_HOST is")?,
    }))
}

pub async fn cmd_serve(db_path: &Path, host: &str, port: u16) -> Result<()> {
    let config = server_config_from_env()?;

    println!("🚀 Starting Tally API server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    println!("   🔑 Token lifetime: {} day(s)", config.token_ttl_days);
    if !config.allowed_origins.is_empty() {
        println!(
            "   🌐 Allowed origins: {} (TALLY_ALLOWED_ORIGINS)",
            config.allowed_origins.join(", ")
        );
    }

    let mailer: Arc<dyn Mailer> = match mail_config_from_env()? {
        Some(mail) => {
            println!("   ✉️  Reset codes sent via {}", mail.smtp_host);
            Arc::new(SmtpMailer::new(&mail).context("Failed to configure SMTP")?)
        }
        None => {
            println!("   ⚠️  TALLY_SMTP_HOST not set - reset codes are only logged");
            Arc::new(LogMailer)
        }
    };
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path)?;
    tally_server::serve_with_mailer(db, host, port, config, mailer).await?;

    Ok(())
}
