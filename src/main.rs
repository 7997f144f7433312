//! Secure Kit - CLI
//!
//! Command-line interface for store and envelope operations.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use secure_kit::{EntryKind, KitConfig, KitError, KitKey, KitResult, SecureStore};

#[derive(Parser)]
#[command(name = "secure-kit")]
#[command(version = secure_kit::VERSION)]
#[command(about = "Secure Kit - transport envelopes, encrypted local store, masked-key cipher")]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, default_value = "./securekit.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an app key; with --bundle-id also write a configuration file
    Keygen {
        #[arg(long)]
        bundle_id: Option<String>,

        /// Store directory for the written configuration
        #[arg(long, default_value = "./securekit-store")]
        store_dir: PathBuf,
    },

    /// Store a new entry
    Put {
        key: String,
        value: String,
        /// Value is hex-encoded binary
        #[arg(long)]
        binary: bool,
    },

    /// Read an entry
    Get {
        key: String,
        /// Print as hex even if stored as text
        #[arg(long)]
        binary: bool,
    },

    /// Replace an existing entry
    Update {
        key: String,
        value: String,
        #[arg(long)]
        binary: bool,
    },

    /// Delete an entry
    Remove { key: String },

    /// Encrypt for the server
    Encrypt {
        plaintext: String,
        #[arg(long)]
        binary: bool,
    },

    /// Decrypt a server envelope
    Decrypt {
        envelope: String,
        #[arg(long)]
        binary: bool,
    },

    /// Encrypt with the white-box key
    WbEncrypt {
        plaintext: String,
        #[arg(long)]
        binary: bool,
    },

    /// Decrypt a white-box envelope
    WbDecrypt {
        envelope: String,
        #[arg(long)]
        binary: bool,
    },

    /// Print SDK version
    Version,

    /// Run the jailbreak scan
    Jailbreak,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error [code {}]: {}", e.code(), e);
        std::process::exit(1);
    }
}

fn open(config: &Path) -> KitResult<SecureStore> {
    SecureStore::open(KitConfig::load(config)?)
}

fn decode_hex(value: &str) -> KitResult<Vec<u8>> {
    hex::decode(value.trim()).map_err(|e| KitError::InvalidParameter(format!("invalid hex: {}", e)))
}

fn run(cli: Cli) -> KitResult<()> {
    match cli.command {
        Commands::Keygen { bundle_id, store_dir } => {
            let key = KitKey::generate().to_base64();
            match bundle_id {
                Some(bundle_id) => {
                    KitConfig::new(bundle_id, key, store_dir).save(&cli.config)?;
                    println!("✅ Configuration written to {}", cli.config.display());
                }
                None => println!("{}", key),
            }
        }

        Commands::Put { key, value, binary } => {
            let store = open(&cli.config)?;
            if binary {
                store.put_binary(&decode_hex(&value)?, &key)?;
            } else {
                store.put_string(&value, &key)?;
            }
            println!("✅ Stored {}", key);
        }

        Commands::Get { key, binary } => {
            let store = open(&cli.config)?;
            let entry = store.get_entry(&key)?;
            if binary || entry.kind == EntryKind::Binary {
                println!("{}", hex::encode(&entry.value));
            } else {
                let text = String::from_utf8(entry.value)
                    .map_err(|_| KitError::DataEncryptDecrypt(format!("entry {} is not UTF-8", key)))?;
                println!("{}", text);
            }
        }

        Commands::Update { key, value, binary } => {
            let store = open(&cli.config)?;
            if binary {
                store.update_binary(&decode_hex(&value)?, &key)?;
            } else {
                store.update_string(&value, &key)?;
            }
            println!("✅ Updated {}", key);
        }

        Commands::Remove { key } => {
            let store = open(&cli.config)?;
            store.remove_string(&key)?;
            println!("🗑️  Removed {}", key);
        }

        Commands::Encrypt { plaintext, binary } => {
            let store = open(&cli.config)?;
            let envelope = if binary {
                store.encrypt_binary_to_server(&decode_hex(&plaintext)?)?
            } else {
                store.encrypt_string_to_server(&plaintext)?
            };
            println!("{}", envelope);
        }

        Commands::Decrypt { envelope, binary } => {
            let store = open(&cli.config)?;
            if binary {
                println!("{}", hex::encode(store.decrypt_binary_from_server(&envelope)?));
            } else {
                println!("{}", store.decrypt_string_from_server(&envelope)?);
            }
        }

        Commands::WbEncrypt { plaintext, binary } => {
            let store = open(&cli.config)?;
            let envelope = if binary {
                store.wb_encrypt_binary(&decode_hex(&plaintext)?)?
            } else {
                store.wb_encrypt_string(&plaintext)?
            };
            println!("{}", envelope);
        }

        Commands::WbDecrypt { envelope, binary } => {
            let store = open(&cli.config)?;
            if binary {
                println!("{}", hex::encode(store.wb_decrypt_binary(&envelope)?));
            } else {
                println!("{}", store.wb_decrypt_string(&envelope)?);
            }
        }

        Commands::Version => {
            println!("secure-kit {}", secure_kit::VERSION);
        }

        Commands::Jailbreak => {
            let report = secure_kit::JailbreakDetector::default().scan();
            if report.is_jailbroken() {
                println!("⚠️  Device looks compromised (score {})", report.total_score());
                for signal in &report.signals {
                    println!("   {:<24} {:>3}  {}", signal.name, signal.score, signal.description);
                }
            } else {
                println!("✅ No jailbreak indicators found");
            }
        }
    }

    Ok(())
}
