/*
 * Responsibility
 * - tokio runtime
 * - command line parsing; each subcommand is one verifier operation (or the server)
 */
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use authone_verifier::{app, config::Config, services::oauth::build_verifier};

/// Relying-party token verifier for an OAuth2 / OpenID Connect authorization server.
///
/// Settings come from the environment (or a `.env` file): AUTHONE_ISSUER, AUTHONE_CLIENT_ID,
/// AUTHONE_CLIENT_SECRET, CACHE_BACKEND, ...
#[derive(Parser, Debug)]
#[command(name = "authone-verifier", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the demo resource server (GET /api/v1/health, GET /api/v1/me)
    Serve,
    /// Print the authorization URL for the code flow
    AuthUrl {
        /// Opaque value echoed back on the redirect
        #[arg(long, default_value = "")]
        state: String,
        /// Extra query parameters, `key=value`
        #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_pair)]
        params: Vec<(String, String)>,
    },
    /// Print the logout URL, optionally redirecting back afterwards
    LogoutUrl {
        #[arg(long, default_value = "")]
        redirect: String,
    },
    /// Exchange an authorization code for tokens
    Exchange { code: String },
    /// Introspect an access or refresh token
    Introspect { token: String },
    /// Fetch user info with an access token
    Userinfo { token: String },
    /// Validate a signed identity token
    ValidateIdToken { token: String },
    /// Revoke an access or refresh token
    Revoke { token: String },
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    app::init_tracing();
    let config = Config::from_env().context("loading configuration")?;

    match cli.command {
        Command::Serve => app::serve(config).await,
        command => run_once(&config, command).await,
    }
}

async fn run_once(config: &Config, command: Command) -> Result<()> {
    let verifier = build_verifier(config).await?;

    match command {
        Command::Serve => {}
        Command::AuthUrl { state, params } => {
            let extra: Vec<(&str, &str)> = params
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            println!("{}", verifier.authorize_url(&state, &extra));
        }
        Command::LogoutUrl { redirect } => {
            println!("{}", verifier.logout_url(&redirect));
        }
        Command::Exchange { code } => {
            let token = verifier.exchange(&code).await?;
            print_json(token.raw())?;
        }
        Command::Introspect { token } => {
            print_json(&verifier.introspect(&token).await?)?;
        }
        Command::Userinfo { token } => {
            print_json(&verifier.user_info(&token).await?)?;
        }
        Command::ValidateIdToken { token } => {
            print_json(&verifier.validate_id_token(&token).await?)?;
        }
        Command::Revoke { token } => {
            verifier.revoke(&token).await?;
            print_json(&json!({"revoked": true}))?;
        }
    }

    Ok(())
}
