//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(3000);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let cors_origin = matches
        .get_one::<String>("cors-origin")
        .cloned()
        .context("missing required argument: --cors-origin")?;
    let access_token_secret = matches
        .get_one::<String>("access-token-secret")
        .cloned()
        .context("missing required argument: --access-token-secret")?;
    let refresh_token_secret = matches
        .get_one::<String>("refresh-token-secret")
        .cloned()
        .context("missing required argument: --refresh-token-secret")?;

    Ok(Action::Server(Args {
        port,
        dsn,
        cors_origin,
        access_token_secret: SecretString::from(access_token_secret),
        refresh_token_secret: SecretString::from(refresh_token_secret),
        access_token_ttl_seconds: matches
            .get_one::<i64>("access-token-ttl-seconds")
            .copied()
            .unwrap_or(900),
        refresh_token_ttl_seconds: matches
            .get_one::<i64>("refresh-token-ttl-seconds")
            .copied()
            .unwrap_or(604_800),
        bcrypt_cost: matches
            .get_one::<u32>("bcrypt-cost")
            .copied()
            .unwrap_or(10),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::Action;

    #[test]
    fn secrets_required() {
        temp_env::with_vars(
            [
                ("TASKDEN_ACCESS_TOKEN_SECRET", None::<&str>),
                ("TASKDEN_REFRESH_TOKEN_SECRET", None::<&str>),
                ("TASKDEN_DSN", Some("postgres://localhost/taskden")),
            ],
            || {
                let command = crate::cli::commands::new();
                let result = command.try_get_matches_from(vec!["taskden"]);
                assert!(result.is_err());
            },
        );
    }

    #[test]
    fn server_args_from_env() {
        temp_env::with_vars(
            [
                ("TASKDEN_DSN", Some("postgres://localhost/taskden")),
                ("TASKDEN_ACCESS_TOKEN_SECRET", Some("access-secret")),
                ("TASKDEN_REFRESH_TOKEN_SECRET", Some("refresh-secret")),
                ("TASKDEN_ACCESS_TOKEN_TTL_SECONDS", Some("300")),
                ("TASKDEN_BCRYPT_COST", Some("4")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["taskden"]);
                let action = handler(&matches).unwrap();
                let Action::Server(args) = action;
                assert_eq!(args.port, 3000);
                assert_eq!(args.dsn, "postgres://localhost/taskden");
                assert_eq!(args.access_token_ttl_seconds, 300);
                assert_eq!(args.refresh_token_ttl_seconds, 604_800);
                assert_eq!(args.bcrypt_cost, 4);
            },
        );
    }
}
