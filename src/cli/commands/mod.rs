pub mod auth;
pub mod database;
pub mod logging;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::api::GIT_COMMIT_HASH)
            .into_boxed_str(),
    );

    let command = Command::new("folio")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("FOLIO_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .long_help(
                    "Database connection string. --db-username/--db-password, when set, replace the credentials in the DSN.",
                )
                .env("FOLIO_DSN")
                .required(true),
        );

    let command = database::with_args(command);
    let command = auth::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MAX_SESSION_SECONDS, SessionScope};
    use std::time::Duration;

    const DSN: &str = "postgres://folio@localhost:5432/folio";

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "folio");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some(env!("CARGO_PKG_DESCRIPTION").to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars_unset(
            [
                "FOLIO_PORT",
                "FOLIO_DB_USERNAME",
                "FOLIO_DB_PASSWORD",
                "FOLIO_DB_MAX_CONNECTIONS",
                "FOLIO_REQUEST_TIMEOUT_SECONDS",
                "FOLIO_SESSION_MAX_SECONDS",
                "FOLIO_SESSION_SCOPE",
                "FOLIO_TRUST_PROXY_HEADERS",
                "FOLIO_LOG_LEVEL",
            ],
            || {
                let matches = new().get_matches_from(vec!["folio", "--dsn", DSN]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(8080));

                let Ok(db) = database::Options::parse(&matches) else {
                    panic!("database options should parse");
                };
                assert_eq!(db.max_connections, 5);
                assert!(db.username.is_none());
                assert!(db.password.is_none());

                let Ok(auth) = auth::Options::parse(&matches) else {
                    panic!("auth options should parse");
                };
                assert_eq!(auth.request_timeout, Duration::from_secs(5));
                assert_eq!(auth.session_max_period, Duration::from_secs(86_400));
                assert_eq!(auth.session_scope, SessionScope::Origin);
                assert!(!auth.trust_proxy_headers);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(0)
                );
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("FOLIO_PORT", Some("443")),
                ("FOLIO_DSN", Some(DSN)),
                ("FOLIO_DB_USERNAME", Some("writer")),
                ("FOLIO_DB_PASSWORD", Some("hunter2")),
                ("FOLIO_DB_MAX_CONNECTIONS", Some("12")),
                ("FOLIO_REQUEST_TIMEOUT_SECONDS", Some("9")),
                ("FOLIO_SESSION_MAX_SECONDS", Some("3600")),
                ("FOLIO_SESSION_SCOPE", Some("identity")),
                ("FOLIO_TRUST_PROXY_HEADERS", Some("true")),
                ("FOLIO_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["folio"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>("dsn").cloned(),
                    Some(DSN.to_string())
                );

                let Ok(db) = database::Options::parse(&matches) else {
                    panic!("database options should parse");
                };
                assert_eq!(db.username.as_deref(), Some("writer"));
                assert!(db.password.is_some());
                assert_eq!(db.max_connections, 12);

                let Ok(auth) = auth::Options::parse(&matches) else {
                    panic!("auth options should parse");
                };
                assert_eq!(auth.request_timeout, Duration::from_secs(9));
                assert_eq!(auth.session_max_period, Duration::from_secs(3600));
                assert_eq!(auth.session_scope, SessionScope::Identity);
                assert!(auth.trust_proxy_headers);

                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_rejects_unknown_session_scope() {
        let result = new().try_get_matches_from(vec![
            "folio",
            "--dsn",
            DSN,
            "--session-scope",
            "global",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        temp_env::with_vars_unset(["FOLIO_SESSION_MAX_SECONDS"], || {
            let matches = new().get_matches_from(vec![
                "folio",
                "--dsn",
                DSN,
                "--request-timeout-seconds",
                "0",
            ]);
            assert!(auth::Options::parse(&matches).is_err());
        });
    }

    #[test]
    fn test_rejects_oversized_session_max() {
        temp_env::with_vars_unset(["FOLIO_REQUEST_TIMEOUT_SECONDS"], || {
            let too_long = (MAX_SESSION_SECONDS + 1).to_string();
            let matches = new().get_matches_from(vec![
                "folio",
                "--dsn",
                DSN,
                "--session-max-seconds",
                too_long.as_str(),
            ]);
            assert!(auth::Options::parse(&matches).is_err());

            let ceiling = MAX_SESSION_SECONDS.to_string();
            let matches = new().get_matches_from(vec![
                "folio",
                "--dsn",
                DSN,
                "--session-max-seconds",
                ceiling.as_str(),
            ]);
            assert!(auth::Options::parse(&matches).is_ok());
        });
    }

    #[test]
    fn test_check_log_level_env() {
        // loop cover all possible value_parse
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [("FOLIO_LOG_LEVEL", Some(level)), ("FOLIO_DSN", Some(DSN))],
                || {
                    let matches = new().get_matches_from(vec!["folio"]);
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5usize {
            temp_env::with_vars([("FOLIO_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["folio".to_string(), "--dsn".to_string(), DSN.to_string()];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }
}
