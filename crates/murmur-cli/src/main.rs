//! Murmur CLI
//!
//! Session management and streaming file encryption.

mod config;
mod progress;

use anyhow::Context;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::{Parser, Subcommand};
use indicatif::HumanBytes;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use murmur_core::{ClientId, FileStore, KeyBox, SessionContext, SessionDirectory, StreamCodec};
use murmur_crypto::stream::{SecretStream, StreamCipher, StreamKey};

use config::Config;
use progress::StreamProgress;

type Directory<'a> = SessionDirectory<'a, KeyBox<FileStore>>;

/// Murmur - per-peer encrypted sessions and secret streams
#[derive(Parser)]
#[command(name = "murmur")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new stream key
    Keygen {
        /// Output file for the key (printed if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Encrypt a file as a secret stream
    Encrypt {
        /// Plaintext input
        input: PathBuf,
        /// Encrypted output
        output: PathBuf,
        /// Stream key file
        #[arg(short, long)]
        key: PathBuf,
    },

    /// Decrypt a secret stream
    Decrypt {
        /// Encrypted input
        input: PathBuf,
        /// Plaintext output
        output: PathBuf,
        /// Stream key file
        #[arg(short, long)]
        key: PathBuf,
    },

    /// Show the local identity fingerprint
    Fingerprint,

    /// Generate a range of prekeys
    Prekeys {
        /// First prekey id
        #[arg(long, default_value_t = 0)]
        start: u16,
        /// Number of prekeys
        #[arg(long, default_value_t = 10)]
        count: u16,
    },

    /// Generate the last-resort prekey
    LastPrekey,

    /// Per-client session operations
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Start a session from a peer's base64 prekey bundle
    Create { client: String, prekey: String },

    /// Accept a session from a peer's base64 prekey message
    Accept { client: String, message: String },

    /// Encrypt a base64 payload for a client
    Encrypt { client: String, plaintext: String },

    /// Decrypt a base64 message from a client
    Decrypt { client: String, ciphertext: String },

    /// Delete the session with a client
    Delete { client: String },

    /// Show a client's identity fingerprint
    Fingerprint { client: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load_or_init()?,
    };
    config.validate()?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Keygen { output } => generate_key(output.as_deref())?,
        Commands::Encrypt { input, output, key } => {
            encrypt_file(&input, &output, &key, &config)?;
        }
        Commands::Decrypt { input, output, key } => {
            decrypt_file(&input, &output, &key, &config)?;
        }
        Commands::Fingerprint => {
            with_directory(&config, |dir| {
                println!("{}", String::from_utf8_lossy(dir.local_fingerprint()));
                Ok(())
            })?;
        }
        Commands::Prekeys { start, count } => {
            let end = start
                .checked_add(count)
                .context("prekey range exceeds the reserved last prekey id")?;
            with_directory(&config, |dir| {
                for (id, bundle) in dir.generate_prekeys(start..end) {
                    println!("{id}\t{bundle}");
                }
                Ok(())
            })?;
        }
        Commands::LastPrekey => {
            with_directory(&config, |dir| {
                println!("{}", dir.generate_last_prekey());
                Ok(())
            })?;
        }
        Commands::Session { command } => {
            with_directory(&config, |dir| run_session_command(dir, command))?;
        }
    }

    Ok(())
}

/// Run `f` as one unit of work against the configured key store.
fn with_directory(
    config: &Config,
    f: impl FnOnce(&mut Directory<'_>) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let store = FileStore::open(&config.store.path)
        .with_context(|| format!("failed to open key store {}", config.store.path.display()))?;
    let context = SessionContext::new(KeyBox::open(store)?);
    context.with_directory(f)
}

fn run_session_command(dir: &mut Directory<'_>, command: SessionCommand) -> anyhow::Result<()> {
    match command {
        SessionCommand::Create { client, prekey } => {
            dir.create_session(&ClientId::from(client), &prekey)?;
        }
        SessionCommand::Accept { client, message } => {
            let message = BASE64.decode(message).context("message is not valid base64")?;
            let plaintext = dir.create_session_from_message(&ClientId::from(client), &message)?;
            println!("{}", BASE64.encode(plaintext));
        }
        SessionCommand::Encrypt { client, plaintext } => {
            let client = ClientId::from(client);
            let plaintext = Zeroizing::new(
                BASE64.decode(plaintext).context("plaintext is not valid base64")?,
            );
            let ciphertext = dir
                .encrypt(&plaintext, &client)?
                .with_context(|| format!("no session with {client}"))?;
            println!("{}", BASE64.encode(ciphertext));
        }
        SessionCommand::Decrypt { client, ciphertext } => {
            let client = ClientId::from(client);
            let ciphertext = BASE64.decode(ciphertext).context("ciphertext is not valid base64")?;
            let plaintext = dir
                .decrypt(&ciphertext, &client)?
                .with_context(|| format!("no session with {client}"))?;
            println!("{}", BASE64.encode(plaintext));
        }
        SessionCommand::Delete { client } => {
            dir.delete_session(&ClientId::from(client));
        }
        SessionCommand::Fingerprint { client } => {
            let client = ClientId::from(client);
            let fingerprint = dir
                .fingerprint(&client)
                .with_context(|| format!("no session with {client}"))?;
            println!("{}", String::from_utf8_lossy(&fingerprint));
        }
    }
    Ok(())
}

/// Generate a new stream key
fn generate_key(output: Option<&Path>) -> anyhow::Result<()> {
    let key = SecretStream::generate_key()?;
    let encoded = Zeroizing::new(hex::encode(key.as_bytes()));

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, encoded.as_bytes())?;
            println!("Stream key saved to: {}", path.display());
            println!("\nKeep this file secure! Anyone holding it can read your streams.");
        }
        None => println!("{}", encoded.as_str()),
    }

    Ok(())
}

fn read_key(path: &Path) -> anyhow::Result<StreamKey> {
    let contents = Zeroizing::new(
        fs::read_to_string(path)
            .with_context(|| format!("failed to read key file {}", path.display()))?,
    );
    let bytes = Zeroizing::new(hex::decode(contents.trim()).context("key file is not valid hex")?);
    Ok(StreamKey::from_slice(&bytes)?)
}

fn file_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
}

/// Encrypt a file into a secret stream
fn encrypt_file(input: &Path, output: &Path, key: &Path, config: &Config) -> anyhow::Result<()> {
    let key = read_key(key)?;
    let codec = StreamCodec::<SecretStream>::with_config(&config.stream);

    let source = File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    let size = source.metadata()?.len();
    let progress = StreamProgress::new(size, "Encrypting", file_name(input));

    let sink = BufWriter::new(File::create(output)?);
    match codec.encrypt(&key, progress.wrap_read(BufReader::new(source)), sink) {
        Ok(written) => {
            progress.done(format!("Encrypted {} into {}", HumanBytes(size), HumanBytes(written)));
            tracing::info!(input = %input.display(), output = %output.display(), written, "stream encrypted");
            Ok(())
        }
        Err(err) => {
            progress.failed();
            Err(err.into())
        }
    }
}

/// Decrypt a secret stream, removing the output if it does not verify
fn decrypt_file(input: &Path, output: &Path, key: &Path, config: &Config) -> anyhow::Result<()> {
    let key = read_key(key)?;
    let codec = StreamCodec::<SecretStream>::with_config(&config.stream);

    let source = File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    let size = source.metadata()?.len();
    let progress = StreamProgress::new(size, "Decrypting", file_name(input));

    let sink = BufWriter::new(File::create(output)?);
    match codec.decrypt(&key, progress.wrap_read(BufReader::new(source)), sink) {
        Ok(written) => {
            progress.done(format!("Decrypted {}", HumanBytes(written)));
            tracing::info!(input = %input.display(), output = %output.display(), written, "stream decrypted");
            Ok(())
        }
        Err(err) => {
            progress.failed();
            if let Err(remove_err) = fs::remove_file(output) {
                tracing::warn!(output = %output.display(), "failed to remove partial output: {remove_err}");
            }
            Err(err).with_context(|| format!("failed to decrypt {}", input.display()))
        }
    }
}
