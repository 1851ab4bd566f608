//! Whisper command-line binary.
//!
//! # Usage
//!
//! ```bash
//! whisper generate > whisper_key
//! whisper get-public --key whisper_key > whisper_key.pub
//! whisper server --port 9000
//! whisper client --key whisper_key --nick alice --host localhost --port 9000
//! ```

mod error;
mod interactive;

use std::io::{Read, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::{Parser, Subcommand};
use error::CliError;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use whisper_crypto::keys::{DEFAULT_KEY_BITS, KeyFile, PublicKeyInfo};
use whisper_server::{Server, ServerConfig};

/// End-to-end encrypted notes and messaging.
#[derive(Parser, Debug)]
#[command(name = "whisper")]
#[command(about = "End-to-end encrypted, nickname-addressed notes and messaging")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TCP port to bind (`server`) or connect to (`client`).
    #[arg(long, default_value_t = 9000, global = true)]
    port: u16,

    /// Host to bind (`server`) or connect to (`client`).
    #[arg(long, default_value = "localhost", global = true)]
    host: String,

    /// Path to a private key file.
    #[arg(long, default_value = "whisper_key", global = true)]
    key: PathBuf,

    /// Path to a public key file (`encrypt`).
    #[arg(long, global = true)]
    public_key: Option<PathBuf>,

    /// Nickname to authenticate as (`client`).
    #[arg(long, global = true)]
    nick: Option<String>,

    /// Log level passed to `tracing_subscriber::EnvFilter` when `RUST_LOG`
    /// is unset.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to a server and run an interactive session.
    Client,
    /// Listen for TCP connections.
    Server,
    /// Emit a newly generated private key on standard output.
    Generate,
    /// Read plaintext from stdin, write base64-encoded ciphertext to stdout.
    Encrypt,
    /// Reverse of `encrypt`.
    Decrypt,
    /// Read a private key, emit its public part.
    GetPublic,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "whisper exited with an error");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Generate => generate(),
        Command::GetPublic => get_public(&cli.key),
        Command::Encrypt => encrypt(cli.public_key.as_deref()),
        Command::Decrypt => decrypt(&cli.key),
        Command::Server => run_server(&cli.host, cli.port).await,
        Command::Client => {
            let nick = cli.nick.ok_or_else(|| {
                CliError::MissingFlag("client requires --nick".to_string())
            })?;
            run_client(&cli.host, cli.port, &nick, &cli.key).await
        },
    }
}

fn read_private_key(path: &std::path::Path) -> Result<RsaPrivateKey, CliError> {
    let text = std::fs::read_to_string(path)?;
    let file: KeyFile = serde_json::from_str(&text)?;
    Ok(RsaPrivateKey::try_from(&file)?)
}

fn read_public_key(path: &std::path::Path) -> Result<RsaPublicKey, CliError> {
    let text = std::fs::read_to_string(path)?;
    let info: PublicKeyInfo = serde_json::from_str(&text)?;
    Ok(RsaPublicKey::try_from(&info)?)
}

fn generate() -> Result<(), CliError> {
    let private = whisper_crypto::generate_keypair(DEFAULT_KEY_BITS)?;
    let file = KeyFile::from(&private);
    let mut stdout = std::io::stdout();
    serde_json::to_writer(&mut stdout, &file)?;
    writeln!(stdout)?;
    Ok(())
}

fn get_public(key_path: &std::path::Path) -> Result<(), CliError> {
    let text = std::fs::read_to_string(key_path)?;
    let file: KeyFile = serde_json::from_str(&text)?;
    let public = file.public()?;
    let mut stdout = std::io::stdout();
    serde_json::to_writer(&mut stdout, &public)?;
    writeln!(stdout)?;
    Ok(())
}

fn encrypt(public_key_path: Option<&std::path::Path>) -> Result<(), CliError> {
    let path = public_key_path
        .ok_or_else(|| CliError::MissingFlag("encrypt requires --public-key".to_string()))?;
    let public = read_public_key(path)?;

    let mut plaintext = Vec::new();
    std::io::stdin().read_to_end(&mut plaintext)?;

    let ciphertext = public
        .encrypt(&mut rand::rngs::OsRng, Pkcs1v15Encrypt, &plaintext)
        .map_err(|e| CliError::Crypto(whisper_crypto::CryptoError::KeyWrap(e.to_string())))?;

    let mut stdout = std::io::stdout();
    writeln!(stdout, "{}", BASE64.encode(ciphertext))?;
    Ok(())
}

fn decrypt(key_path: &std::path::Path) -> Result<(), CliError> {
    let private = read_private_key(key_path)?;

    let mut encoded = String::new();
    std::io::stdin().read_to_string(&mut encoded)?;
    let ciphertext = BASE64.decode(encoded.trim())?;

    let plaintext = private
        .decrypt(Pkcs1v15Encrypt, &ciphertext)
        .map_err(|e| CliError::Crypto(whisper_crypto::CryptoError::KeyUnwrap(e.to_string())))?;

    std::io::stdout().write_all(&plaintext)?;
    Ok(())
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, CliError> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| CliError::UnresolvedAddress(format!("{host}:{port}")))
}

async fn run_server(host: &str, port: u16) -> Result<(), CliError> {
    let bind_address = resolve(host, port).await?;
    let config = ServerConfig { bind_address, data_dir: PathBuf::from(".") };
    let server = Server::bind(config).await?;
    tracing::info!(addr = %server.local_addr()?, "whisper server listening");
    server.run().await;
    Ok(())
}

async fn run_client(
    host: &str,
    port: u16,
    nick: &str,
    key_path: &std::path::Path,
) -> Result<(), CliError> {
    let private_key = read_private_key(key_path)?;
    let client = whisper_client::Client::connect(host, port, nick, private_key).await?;
    interactive::run(&client).await
}
