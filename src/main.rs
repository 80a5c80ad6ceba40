//! JWT-bearer client
//!
//! Requests an access token from an OAuth2 token endpoint with a signed
//! JWT-bearer assertion and prints it to stdout.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use jwt_bearer_client::keys::{load_key_pair_from_json, load_key_pair_from_pem, load_x509_credential};
use jwt_bearer_client::{ClientConfig, ClientConfigJson, Credential, TokenLifecycleManager};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "jwt-bearer-client")]
#[command(about = "Obtain an OAuth2 access token with a JWT-bearer assertion")]
struct Args {
    /// JSON config file (kebab-case keys), overridden by the options below
    #[arg(long, env = "JWT_BEARER_CONFIG")]
    config: Option<PathBuf>,

    /// Token endpoint URL
    #[arg(long, env = "JWT_BEARER_TOKEN_URL")]
    token_url: Option<String>,

    /// Audience (aud claim)
    #[arg(long, env = "JWT_BEARER_AUDIENCE")]
    audience: Option<String>,

    /// Issuer (iss claim), the client integration ID
    #[arg(long, env = "JWT_BEARER_ISSUER")]
    issuer: Option<String>,

    /// Consumer organization number
    #[arg(long, env = "JWT_BEARER_CONSUMER_ORG")]
    consumer_org: Option<String>,

    /// Scope to request (repeatable or comma-separated)
    #[arg(long = "scope", env = "JWT_BEARER_SCOPES", value_delimiter = ',')]
    scopes: Vec<String>,

    /// Assertion lifetime in seconds
    #[arg(long, env = "JWT_BEARER_EXPIRY_SECONDS")]
    expiry_seconds: Option<u64>,

    /// HTTP timeout in seconds
    #[arg(long, env = "JWT_BEARER_HTTP_TIMEOUT_SECS")]
    http_timeout_secs: Option<u64>,

    /// Private JWK file (must contain a kid)
    #[arg(long, env = "JWT_BEARER_KEY_JSON", conflicts_with = "key_pem")]
    key_json: Option<PathBuf>,

    /// RSA private key in PEM format
    #[arg(long, env = "JWT_BEARER_KEY_PEM", requires = "kid")]
    key_pem: Option<PathBuf>,

    /// Key ID registered for --key-pem
    #[arg(long, env = "JWT_BEARER_KID")]
    kid: Option<String>,

    /// Private key of an X.509 business certificate
    #[arg(long, env = "JWT_BEARER_X509_KEY")]
    x509_key: Option<PathBuf>,

    /// X.509 business certificate
    #[arg(long, env = "JWT_BEARER_X509_CERT", requires = "x509_key")]
    x509_cert: Option<PathBuf>,

    /// Print the full token response as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, env = "JWT_BEARER_VERBOSE")]
    verbose: bool,
}

impl Args {
    /// Command line overrides as a config overlay.
    fn overlay(&self) -> ClientConfigJson {
        ClientConfigJson {
            token_url: self.token_url.clone(),
            scopes: self
                .scopes
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            audience: self.audience.clone(),
            issuer: self.issuer.clone(),
            consumer_organization: self.consumer_org.clone(),
            expiry_seconds: self.expiry_seconds,
            http_timeout_secs: self.http_timeout_secs,
        }
    }
}

/// Build the client config from defaults, the config file and the command line.
fn build_config(args: &Args) -> Result<ClientConfig> {
    let mut config = ClientConfig::default();

    if let Some(path) = &args.config {
        ClientConfigJson::from_file(path)?.apply_to(&mut config);
    }
    args.overlay().apply_to(&mut config);

    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    Ok(config)
}

/// Load the signing credential selected on the command line.
fn load_credential(args: &Args) -> Result<Credential> {
    let key_pair = match (&args.key_json, &args.key_pem) {
        (Some(path), _) => Some(load_key_pair_from_json(path)?),
        (None, Some(path)) => {
            let kid = args
                .kid
                .clone()
                .ok_or_else(|| anyhow!("--kid is required with --key-pem"))?;
            Some(load_key_pair_from_pem(path, kid)?)
        }
        (None, None) => None,
    };

    let x509 = args
        .x509_key
        .as_ref()
        .map(|key| load_x509_credential(key, args.x509_cert.as_deref()))
        .transpose()?;

    Credential::from_parts(key_pair, x509).context("Invalid credential options")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr, stdout carries the token
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("{}={}", env!("CARGO_CRATE_NAME"), log_level))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = build_config(&args)?;
    let credential = load_credential(&args)?;

    info!(
        token_url = %config.token_url,
        issuer = %config.issuer,
        scopes = %config.scope_string(),
        method = credential.method(),
        "Configuration loaded"
    );

    let manager = TokenLifecycleManager::new(config, credential)?;
    let token = manager.obtain_access_token().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&token)?);
    } else {
        println!("{}", token.as_str());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TEST_JWK: &str = include_str!("../testdata/test_key.json");

    /// Parse `args` with the env fallbacks removed, so `JWT_BEARER_*`
    /// variables in the calling shell cannot leak in.
    fn try_parse(args: &[&str]) -> Result<Args, clap::Error> {
        let matches = Args::command()
            .mut_args(|arg| arg.env(None::<&'static str>))
            .try_get_matches_from(std::iter::once("jwt-bearer-client").chain(args.iter().copied()))?;
        Args::from_arg_matches(&matches)
    }

    fn parse(args: &[&str]) -> Args {
        try_parse(args).unwrap()
    }

    fn temp_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const REQUIRED: [&str; 6] = [
        "--token-url",
        "https://test.maskinporten.no/token",
        "--audience",
        "https://test.maskinporten.no/",
        "--issuer",
        "my-integration",
    ];

    #[test]
    fn test_scopes_repeatable_and_comma_separated() {
        let mut argv = REQUIRED.to_vec();
        argv.extend(["--scope", "nav:aareg,nav:inntekt", "--scope", "skatt:read"]);

        let config = build_config(&parse(&argv)).unwrap();
        assert_eq!(config.scopes, vec!["nav:aareg", "nav:inntekt", "skatt:read"]);
        assert_eq!(config.expiry_seconds, 10);
    }

    #[test]
    fn test_args_override_config_file() {
        let file = temp_file(
            r#"{
                "token-url": "https://maskinporten.no/token",
                "audience": "https://maskinporten.no/",
                "issuer": "from-file",
                "consumer-organization": "987654321",
                "scopes": ["nav:aareg"],
                "expiry-seconds": 60
            }"#,
        );
        let path = file.path().to_str().unwrap();

        let config = build_config(&parse(&["--config", path, "--issuer", "from-args"])).unwrap();

        assert_eq!(config.token_url, "https://maskinporten.no/token");
        assert_eq!(config.issuer, "from-args");
        assert_eq!(config.consumer_organization, "987654321");
        assert_eq!(config.expiry_seconds, 60);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = build_config(&parse(&["--token-url", "ftp://example.com"])).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[test]
    fn test_load_credential_from_jwk() {
        let key = temp_file(TEST_JWK);
        let args = parse(&["--key-json", key.path().to_str().unwrap()]);

        let credential = load_credential(&args).unwrap();
        assert_eq!(credential.method(), "private_key");
    }

    #[test]
    fn test_credential_required() {
        assert!(load_credential(&parse(&[])).is_err());
    }

    #[test]
    fn test_parse_ignores_environment() {
        std::env::set_var("JWT_BEARER_ISSUER", "from-env");
        let args = parse(&["--token-url", "https://test.maskinporten.no/token"]);
        assert!(args.issuer.is_none());
    }

    #[test]
    fn test_key_pem_requires_kid() {
        assert!(try_parse(&["--key-pem", "key.pem"]).is_err());
    }

    #[test]
    fn test_key_sources_conflict() {
        assert!(try_parse(&[
            "--key-json",
            "key.json",
            "--key-pem",
            "key.pem",
            "--kid",
            "k"
        ])
        .is_err());
    }
}
