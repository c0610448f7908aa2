//! kvspace - command-line access to a JSON-file store
//!
//! Opens a [`FileAdapter`] and runs one storage command against it, in flat,
//! prefix or space mode.

use anyhow::{bail, Context};
use kvspace::storage::{Cache, Storage, StorageConfig};
use kvspace::FileAdapter;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// A single storage command
#[derive(Debug)]
enum Command {
    Get { key: String },
    Set { key: String, value: String },
    Del { key: String },
    Keys { pattern: Option<String> },
    Clear { pattern: String },
    Stats,
}

/// CLI configuration
#[derive(Debug)]
struct Config {
    /// Path of the backing JSON file
    file: String,
    /// Key prefix (prefix mode)
    prefix: Option<String>,
    /// Storage space id (space mode)
    id: Option<String>,
    /// TTL for `set`
    ttl: Option<Duration>,
    command: Command,
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> anyhow::Result<Self> {
        let args: Vec<String> = std::env::args().skip(1).collect();

        let mut file = "kvspace.json".to_string();
        let mut prefix = None;
        let mut id = None;
        let mut ttl = None;
        let mut positional = Vec::new();

        let mut i = 0;
        while i < args.len() {
            let flag_value = || {
                args.get(i + 1)
                    .cloned()
                    .with_context(|| format!("{} requires a value", args[i]))
            };
            match args[i].as_str() {
                "--file" | "-f" => {
                    file = flag_value()?;
                    i += 2;
                }
                "--prefix" | "-p" => {
                    prefix = Some(flag_value()?);
                    i += 2;
                }
                "--id" => {
                    id = Some(flag_value()?);
                    i += 2;
                }
                "--ttl" => {
                    let ms: u64 = flag_value()?
                        .parse()
                        .context("--ttl expects milliseconds")?;
                    ttl = Some(Duration::from_millis(ms));
                    i += 2;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("kvspace version {}", kvspace::VERSION);
                    std::process::exit(0);
                }
                other if other.starts_with('-') => bail!("unknown argument: {}", other),
                other => {
                    positional.push(other.to_string());
                    i += 1;
                }
            }
        }

        let mut positional = positional.into_iter();
        let mut operand = |name: &str| {
            positional
                .next()
                .with_context(|| format!("missing <{}>", name))
        };

        let command = match operand("command")?.as_str() {
            "get" => Command::Get {
                key: operand("key")?,
            },
            "set" => Command::Set {
                key: operand("key")?,
                value: operand("value")?,
            },
            "del" => Command::Del {
                key: operand("key")?,
            },
            "keys" => Command::Keys {
                pattern: operand("pattern").ok(),
            },
            "clear" => Command::Clear {
                pattern: operand("pattern")?,
            },
            "stats" => Command::Stats,
            other => bail!("unknown command: {}", other),
        };

        Ok(Self {
            file,
            prefix,
            id,
            ttl,
            command,
        })
    }
}

fn print_help() {
    println!(
        r#"
kvspace - layered key-value storage over a JSON file

USAGE:
    kvspace [OPTIONS] <COMMAND>

COMMANDS:
    get <key>              Print a value
    set <key> <value>      Store a value (JSON if it parses, else a string)
    del <key>              Remove a value
    keys [pattern]         List keys in scope, optionally filtered by glob
    clear <pattern>        Remove keys in scope matching a glob
    stats                  Print adapter and cache statistics

OPTIONS:
    -f, --file <PATH>      Backing file (default: kvspace.json)
    -p, --prefix <PREFIX>  Scope keys under "<PREFIX>-"
        --id <ID>          Use the isolated storage space <ID>
        --ttl <MS>         Expire a `set` value after MS milliseconds
    -v, --version          Print version information
    -h, --help             Print this help message

EXAMPLES:
    kvspace --prefix settings set theme '"dark"'
    kvspace --id user set name John --ttl 60000
    kvspace clear 'test*'
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args()?;

    // Set up logging; stdout is reserved for command output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    debug!(?config, "Starting");

    let adapter = FileAdapter::open(&config.file)
        .with_context(|| format!("failed to open {}", config.file))?;

    let global = Cache::shared();
    let mut storage_config = StorageConfig::new()
        .with_adapter(adapter)
        .with_global_cache(Arc::clone(&global));
    if let Some(prefix) = &config.prefix {
        storage_config = storage_config.with_prefix(prefix);
    }
    if let Some(id) = &config.id {
        storage_config = storage_config.with_id(id);
    }
    let storage = Storage::new(storage_config)?;

    match config.command {
        Command::Get { key } => match storage.get_item::<Value>(&key)? {
            Some(value) => println!("{}", value),
            None => println!("(nil)"),
        },
        Command::Set { key, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            storage.set_item(&key, &value, config.ttl)?;
            println!("OK");
        }
        Command::Del { key } => {
            storage.remove_item(&key)?;
            println!("OK");
        }
        Command::Keys { pattern } => {
            let keys = match pattern {
                Some(pattern) => storage.keys_matching(&pattern)?,
                None => storage.scoped_keys()?,
            };
            for key in keys {
                println!("{}", key);
            }
        }
        Command::Clear { pattern } => {
            let removed = storage.clear_matching(&pattern)?;
            println!("(integer) {}", removed);
        }
        Command::Stats => {
            if let Some(seeding) = storage.seeding() {
                let seeded = seeding.wait().await?;
                println!("seeded_keys:{}", seeded);
            }
            println!("adapter:{}", storage.adapter_name());
            println!("adapter_size_bytes:{}", storage.size()?);
            println!("keys_in_scope:{}", storage.scoped_keys()?.len());

            let stats = global.stats();
            println!("cache_entries:{}", stats.entries);
            println!("cache_hits:{}", stats.hits);
            println!("cache_misses:{}", stats.misses);
            println!("cache_expired:{}", stats.expired);
        }
    }

    Ok(())
}
