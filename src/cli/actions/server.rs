use crate::{
    api::{self, ServerConfig},
    auth::AuthConfig,
};
use anyhow::{Result, anyhow};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub db_username: Option<String>,
    pub db_password: Option<SecretString>,
    pub db_max_connections: u32,
    pub auth: AuthConfig,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the DSN is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let dsn = with_credentials(
        &args.dsn,
        args.db_username.as_deref(),
        args.db_password.as_ref(),
    )?;

    api::new(ServerConfig {
        port: args.port,
        dsn,
        max_connections: args.db_max_connections,
        auth: args.auth,
    })
    .await
}

/// Replace the user and password in `dsn` with any provided on the command line.
fn with_credentials(
    dsn: &str,
    username: Option<&str>,
    password: Option<&SecretString>,
) -> Result<String> {
    if username.is_none() && password.is_none() {
        return Ok(dsn.to_string());
    }

    let mut dsn = Url::parse(dsn)?;

    if let Some(username) = username {
        dsn.set_username(username)
            .map_err(|()| anyhow!("Error setting username"))?;
    }

    if let Some(password) = password {
        dsn.set_password(Some(password.expose_secret()))
            .map_err(|()| anyhow!("Error setting password"))?;
    }

    Ok(dsn.to_string())
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        (
            "db_username",
            args.db_username
                .clone()
                .unwrap_or_else(|| "from dsn".to_string()),
        ),
        ("db_password_set", args.db_password.is_some().to_string()),
        ("db_max_connections", args.db_max_connections.to_string()),
        (
            "request_timeout",
            format!("{}s", args.auth.request_timeout().as_secs()),
        ),
        (
            "session_max",
            format!("{}s", args.auth.session_max_period().as_secs()),
        ),
        ("session_scope", args.auth.session_scope().to_string()),
        (
            "trust_proxy_headers",
            args.auth.trust_proxy_headers().to_string(),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", folio_banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn folio_banner() -> String {
    let short_hash = short_commit(api::GIT_COMMIT_HASH);
    FOLIO_BANNER.replace(
        "{VERSION}",
        &format!(" - {} - {}", env!("CARGO_PKG_VERSION"), short_hash),
    )
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}

const FOLIO_BANNER: &str = r"
   _______
  |  ___  |\
  | |___| | |
  |  ___  | |
  | |___| | |  F O L I O {VERSION}
  |_______| |
   \_______\|";
