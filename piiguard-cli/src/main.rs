//! `piiguard` CLI tool for key management and field operations.

#![warn(clippy::pedantic, clippy::nursery)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use piiguard::prelude::*;
use piiguard_key_file::FileKeyProvider;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "piiguard")]
#[command(about = "Field-level PII encryption CLI", long_about = None)]
struct Cli {
    /// Key directory; keys are read from PIIGUARD_*_KEY variables when omitted
    #[arg(short, long, global = true)]
    keys: Option<PathBuf>,

    /// Cipher mode, overriding PIIGUARD_CIPHER_MODE
    #[arg(long, global = true)]
    cipher_mode: Option<CipherMode>,

    /// Deriver UUID for heap digests, overriding PIIGUARD_DERIVER_KEY
    #[arg(long, global = true)]
    deriver: Option<Uuid>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate new keys
    Keygen {
        /// Output directory for keys
        #[arg(short, long, default_value = "./keys")]
        output: PathBuf,
        /// AES key size in bits (128, 192 or 256)
        #[arg(long, default_value_t = 256)]
        aes_bits: usize,
    },
    /// Encrypt a value for a row identity
    Encrypt {
        /// Row identity (UUIDs are used as their 16 raw bytes)
        #[arg(short, long)]
        identity: String,
        #[arg(short = 't', long = "type", value_enum, default_value_t = ValueType::String)]
        value_type: ValueType,
        value: String,
    },
    /// Decrypt a stored ciphertext
    Decrypt {
        #[arg(short, long)]
        identity: String,
        #[arg(short = 't', long = "type", value_enum, default_value_t = ValueType::String)]
        value_type: ValueType,
        ciphertext: String,
    },
    /// Compute the 8-digit blind index of a value
    BlindIndex {
        #[arg(short, long)]
        identity: String,
        value: String,
    },
    /// Compute the 8-hex-character heap digest of a value
    Hash { value: String },
    /// Show heap tokens and digests for a value
    Tokenize {
        /// Heap table the entries are meant for
        #[arg(long, default_value = "text_heap")]
        table: String,
        value: String,
    },
}

/// Column type of a value given on the command line.
#[derive(Clone, Copy, ValueEnum)]
enum ValueType {
    String,
    Int,
    Float,
    Bool,
    /// RFC 3339 timestamp
    Time,
    /// Hex-encoded bytes
    Bytes,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli { keys, cipher_mode, deriver, command } = Cli::parse();
    let crypto = || build_crypto(keys.as_deref(), cipher_mode, deriver);

    match command {
        Commands::Keygen { output, aes_bits } => {
            if aes_bits % 8 != 0 {
                bail!("AES key size must be 128, 192 or 256 bits");
            }
            FileKeyProvider::init_with_aead_len(&output, aes_bits / 8)
                .with_context(|| format!("failed to initialize {}", output.display()))?;
            println!("Generated keys in: {}", output.display());
        }
        Commands::Encrypt { identity, value_type, value } => {
            let crypto = crypto()?;
            let identity = parse_identity(&identity);
            let stored = match value_type {
                ValueType::String => crypto.seal(identity, value),
                ValueType::Int => crypto.seal(identity, value.parse::<i64>()?),
                ValueType::Float => crypto.seal(identity, value.parse::<f64>()?),
                ValueType::Bool => crypto.seal(identity, value.parse::<bool>()?),
                ValueType::Time => crypto.seal(
                    identity,
                    chrono::DateTime::parse_from_rfc3339(&value).context("invalid RFC 3339 time")?,
                ),
                ValueType::Bytes => {
                    crypto.seal(identity, hex::decode(&value).context("invalid hex bytes")?)
                }
            }?;
            println!("{stored}");
        }
        Commands::Decrypt { identity, value_type, ciphertext } => {
            let crypto = crypto()?;
            let identity = parse_identity(&identity);
            let text = match value_type {
                ValueType::String => crypto.open::<String>(identity, &ciphertext)?,
                ValueType::Int => crypto.open::<i64>(identity, &ciphertext)?.to_string(),
                ValueType::Float => crypto.open::<f64>(identity, &ciphertext)?.to_string(),
                ValueType::Bool => crypto.open::<bool>(identity, &ciphertext)?.to_string(),
                ValueType::Time => crypto
                    .open::<chrono::DateTime<chrono::FixedOffset>>(identity, &ciphertext)?
                    .to_rfc3339(),
                ValueType::Bytes => hex::encode(crypto.open::<Vec<u8>>(identity, &ciphertext)?),
            };
            println!("{text}");
        }
        Commands::BlindIndex { identity, value } => {
            let index = crypto()?.blind_index_value(parse_identity(&identity), value).encode()?;
            println!("{index}");
        }
        Commands::Hash { value } => {
            println!("{}", crypto()?.hash_string(&value)?);
        }
        Commands::Tokenize { table, value } => {
            let crypto = crypto()?;
            if !crypto.is_configured(PrimitiveKind::Mac) {
                for token in crypto.tokenizer().tokenize(&value) {
                    println!("{token}");
                }
                return Ok(());
            }
            let index = crypto.build_heap(&value, &table)?;
            for entry in &index.entries {
                println!("{}\t{}", entry.content, entry.hash);
            }
            println!("bidx\t{}", index.digest);
        }
    }

    Ok(())
}

fn build_crypto(
    keys: Option<&Path>,
    cipher_mode: Option<CipherMode>,
    deriver: Option<Uuid>,
) -> Result<FieldCrypto> {
    let mut config = CryptoConfig::from_env()?;
    if let Some(mode) = cipher_mode {
        config.cipher_mode = mode;
    }
    if let Some(deriver) = deriver {
        config.deriver_identity = Identity::from(deriver);
    }

    let crypto = match keys {
        Some(dir) => {
            tracing::debug!(dir = %dir.display(), "loading keys from directory");
            let provider = FileKeyProvider::new(dir)
                .with_context(|| format!("cannot open key directory {}", dir.display()))?;
            FieldCrypto::new(&provider, config)?
        }
        None => {
            tracing::debug!("loading keys from environment");
            FieldCrypto::new(&EnvKeyProvider::new(), config)?
        }
    };

    if [PrimitiveKind::Aead, PrimitiveKind::Mac, PrimitiveKind::BlindIndex]
        .iter()
        .all(|kind| !crypto.is_configured(*kind))
    {
        bail!("no keys configured; pass --keys or set PIIGUARD_AEAD_KEY, PIIGUARD_MAC_KEY or PIIGUARD_BIDX_KEY");
    }

    Ok(crypto)
}

fn parse_identity(raw: &str) -> Identity {
    Uuid::parse_str(raw).map_or_else(|_| Identity::from(raw), Identity::from)
}
