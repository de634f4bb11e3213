use crate::api;
use anyhow::{Context, Result};
use secrecy::SecretString;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub cors_origin: String,
    pub access_token_secret: SecretString,
    pub refresh_token_secret: SecretString,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub bcrypt_cost: u32,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the DSN is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let dsn = Url::parse(&args.dsn).context("invalid database DSN")?;

    let auth_config = api::handlers::auth::AuthConfig::new(
        args.access_token_secret,
        args.refresh_token_secret,
    )
    .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
    .with_refresh_token_ttl_seconds(args.refresh_token_ttl_seconds)
    .with_bcrypt_cost(args.bcrypt_cost);

    api::new(args.port, dsn.to_string(), args.cors_origin, auth_config).await
}
