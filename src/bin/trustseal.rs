//! Trustseal command line.
//!
//! Client commands print what would go on the wire; `authority` runs a Credential Authority over
//! stdin/stdout, one `<route> <json-body>` request per line.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trustseal::{protocol, Config, CredentialAuthority, FileKeyStore, IdentityAgent};

#[derive(Parser, Debug)]
#[command(name = "trustseal")]
#[command(about = "Password-gated public key provisioning and signed messages")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "TRUSTSEAL_CONFIG", default_value = "trustseal.toml")]
    config: PathBuf,

    /// Directory holding the key files (overrides config file)
    #[arg(long, env = "TRUSTSEAL_KEY_DIR")]
    key_dir: Option<PathBuf>,

    /// Key identifier (overrides config file)
    #[arg(long, env = "TRUSTSEAL_KEY_ID")]
    key_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a register request body
    Register { password: String },
    /// Generate and seal a keypair, then print the store request body
    Store { password: String, passphrase: String },
    /// Sign a message with the sealed private key and print its wire form
    Message { passphrase: String, message: String },
    /// Print a verify request body for a wire-form message
    Verify { message: String },
    /// Serve requests from stdin, one "<route> <json-body>" per line
    Authority,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trustseal=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Some(dir) = cli.key_dir {
        config.keys.dir = dir;
    }
    if let Some(id) = cli.key_id {
        config.keys.id = id;
    }

    let agent = || {
        IdentityAgent::new(
            FileKeyStore::new(config.keys.dir.clone()),
            &config.keys.id,
            config.seal,
        )
    };

    match cli.command {
        Command::Register { password } => {
            println!("{}", json!({ "password": password }));
        }
        Command::Store { password, passphrase } => {
            let keypair = agent()
                .generate_keypair(&passphrase)
                .context("could not generate keypair")?;
            println!("{}", json!({ "password": password, "publicKey": keypair.public_key }));
        }
        Command::Message { passphrase, message } => {
            let wire = agent()
                .sign(&passphrase, message.as_bytes())
                .context("could not sign message")?;
            println!("{wire}");
        }
        Command::Verify { message } => {
            println!("{}", json!({ "message": message }));
        }
        Command::Authority => serve(&CredentialAuthority::new(config.password))?,
    }
    Ok(())
}

/// serve answers line-delimited requests until stdin closes
fn serve(authority: &CredentialAuthority) -> anyhow::Result<()> {
    info!("credential authority reading requests from stdin");
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (route, body) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let response = protocol::handle(authority, route, body.trim().as_bytes());
        writeln!(out, "{}", response.to_json())?;
        out.flush()?;
    }
    Ok(())
}
