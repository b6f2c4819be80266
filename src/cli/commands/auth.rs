//! Session, penalty and request-deadline settings.

use crate::auth::{AuthConfig, MAX_SESSION_SECONDS, SessionScope};
use anyhow::{Context, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command, builder::BoolishValueParser};
use std::time::Duration;

pub const ARG_REQUEST_TIMEOUT_SECONDS: &str = "request-timeout-seconds";
pub const ARG_SESSION_MAX_SECONDS: &str = "session-max-seconds";
pub const ARG_SESSION_SCOPE: &str = "session-scope";
pub const ARG_TRUST_PROXY_HEADERS: &str = "trust-proxy-headers";

#[derive(Debug)]
pub struct Options {
    pub request_timeout: Duration,
    pub session_max_period: Duration,
    pub session_scope: SessionScope,
    pub trust_proxy_headers: bool,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a value is missing, zero or out of range.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let seconds = |id: &str| -> anyhow::Result<Duration> {
            let value = matches
                .get_one::<u64>(id)
                .copied()
                .with_context(|| format!("missing required argument: --{id}"))?;
            if value == 0 {
                return Err(anyhow!("--{id} must be greater than zero"));
            }
            Ok(Duration::from_secs(value))
        };

        let session_max_period = seconds(ARG_SESSION_MAX_SECONDS)?;
        if session_max_period.as_secs() > MAX_SESSION_SECONDS {
            return Err(anyhow!(
                "--{ARG_SESSION_MAX_SECONDS} must not exceed {MAX_SESSION_SECONDS}"
            ));
        }

        let session_scope = matches
            .get_one::<String>(ARG_SESSION_SCOPE)
            .map_or(Ok(SessionScope::default()), |scope| {
                scope.parse::<SessionScope>()
            })
            .map_err(|err| anyhow!(err))?;

        Ok(Self {
            request_timeout: seconds(ARG_REQUEST_TIMEOUT_SECONDS)?,
            session_max_period,
            session_scope,
            trust_proxy_headers: matches.get_flag(ARG_TRUST_PROXY_HEADERS),
        })
    }

    #[must_use]
    pub fn into_config(self) -> AuthConfig {
        AuthConfig::new()
            .with_request_timeout(self.request_timeout)
            .with_session_max_period(self.session_max_period)
            .with_session_scope(self.session_scope)
            .with_trust_proxy_headers(self.trust_proxy_headers)
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT_SECONDS)
                .long(ARG_REQUEST_TIMEOUT_SECONDS)
                .help("Deadline for each request, including its database work")
                .env("FOLIO_REQUEST_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SESSION_MAX_SECONDS)
                .long(ARG_SESSION_MAX_SECONDS)
                .help("Upper bound for requested session periods, in seconds")
                .env("FOLIO_SESSION_MAX_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SESSION_SCOPE)
                .long(ARG_SESSION_SCOPE)
                .help("Key sessions by origin and identity, or by identity alone")
                .env("FOLIO_SESSION_SCOPE")
                .default_value("origin")
                .value_parser(["origin", "identity"]),
        )
        .arg(
            Arg::new(ARG_TRUST_PROXY_HEADERS)
                .long(ARG_TRUST_PROXY_HEADERS)
                .help("Take the client origin from X-Forwarded-For / X-Real-IP")
                .env("FOLIO_TRUST_PROXY_HEADERS")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
}
