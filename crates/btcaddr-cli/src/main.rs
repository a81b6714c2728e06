//! btcaddr-kdf: scrypt key derivation from the command line
//!
//! Reads the passphrase from `BTCADDR_PASSWORD` or the first line of stdin
//! and prints the derived key as hex or JSON.
//!
//! # Usage
//!
//! ```bash
//! echo -n "passphrase" | btcaddr-kdf --salt-hex 01020304 --length 64
//! btcaddr-kdf --config kdf.toml --salt NaCl --offset 32 --length 32
//! btcaddr-kdf --config kdf.toml --validate
//! ```

mod config;

use anyhow::{Context, Result};
use btcaddr_kdf::{ScryptKdf, ScryptParams};
use serde::Serialize;
use std::io::{BufRead, SeekFrom};
use std::path::PathBuf;
use zeroize::Zeroizing;

/// JSON report printed with `--json`.
#[derive(Serialize)]
struct DerivationReport<'a> {
    cost: u32,
    block_size: u32,
    parallelism: u32,
    offset: u64,
    length: usize,
    effective_salt: bool,
    key: &'a str,
}

fn main() -> Result<()> {
    // Keep derived keys and passphrases out of core files
    btcaddr_kdf::memory::disable_core_dumps();

    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut salt: Option<Vec<u8>> = None;
    let mut length: Option<usize> = None;
    let mut offset: u64 = 0;
    let mut want_effective_salt = false;
    let mut json = false;
    let mut validate_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(next_value(&args, &mut i, "--config")?));
            }
            "--salt" => {
                salt = Some(next_value(&args, &mut i, "--salt")?.as_bytes().to_vec());
            }
            "--salt-hex" => {
                let value = next_value(&args, &mut i, "--salt-hex")?;
                salt = Some(hex::decode(value).context("--salt-hex is not valid hex")?);
            }
            "--length" => {
                let value = next_value(&args, &mut i, "--length")?;
                length = Some(value.parse().context("--length must be a number")?);
            }
            "--offset" => {
                let value = next_value(&args, &mut i, "--offset")?;
                offset = value.parse().context("--offset must be a number")?;
            }
            "--effective-salt" => {
                want_effective_salt = true;
            }
            "--json" => {
                json = true;
            }
            "--validate" => {
                validate_only = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("btcaddr-kdf {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => {
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    // Load config
    let mut cli_config = match &config_path {
        Some(path) => config::CliConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => config::CliConfig::default(),
    };

    // Apply env overrides, then flags
    cli_config.apply_env_overrides();
    if let Some(len) = length {
        cli_config.output.length = len;
    }
    if json {
        cli_config.output.format = "json".to_string();
    }

    cli_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    env_logger::Builder::new()
        .parse_filters(&cli_config.log_level)
        .init();

    let params = cli_config.params()?;

    if validate_only {
        println!("Configuration is valid.");
        println!("  Cost (N):       {}", params.cost);
        println!("  Block size (r): {}", params.block_size);
        println!("  Parallelism:    {}", params.parallelism);
        println!("  Max threads:    {}", params.max_threads);
        println!("  Lock memory:    {}", params.lock_memory);
        println!("  Memory:         {} bytes", params.total_bytes());
        println!(
            "  Output:         {} bytes as {}",
            cli_config.output.length, cli_config.output.format
        );
        return Ok(());
    }

    let salt = salt.context("a salt is required (--salt or --salt-hex)")?;
    let password = read_password()?;

    let kdf = ScryptKdf::default();
    let key = if want_effective_salt {
        kdf.effective_salt(password.as_bytes(), &salt, &params)?
    } else {
        derive_at(&kdf, password.as_bytes(), &salt, &params, offset, cli_config.output.length)?
    };

    let encoded = Zeroizing::new(hex::encode(&*key));
    if cli_config.output.format == "json" {
        let report = DerivationReport {
            cost: params.cost,
            block_size: params.block_size,
            parallelism: params.parallelism,
            offset: if want_effective_salt { 0 } else { offset },
            length: key.len(),
            effective_salt: want_effective_salt,
            key: &encoded,
        };
        let text = Zeroizing::new(serde_json::to_string_pretty(&report)?);
        println!("{}", *text);
    } else {
        println!("{}", *encoded);
    }

    Ok(())
}

/// Read `length` bytes of the derived stream starting at `offset`.
fn derive_at(
    kdf: &ScryptKdf,
    password: &[u8],
    salt: &[u8],
    params: &ScryptParams,
    offset: u64,
    length: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let mut stream = kdf.stream(password, salt, params)?;
    stream
        .seek(SeekFrom::Start(offset))
        .context("--offset is outside the derived stream")?;

    let mut key = Zeroizing::new(vec![0u8; length]);
    stream
        .fill(&mut key)
        .context("requested bytes run past the end of the derived stream")?;
    log::debug!("read {} bytes at offset {}", length, offset);
    Ok(key)
}

/// Passphrase from `BTCADDR_PASSWORD`, else the first line of stdin.
fn read_password() -> Result<Zeroizing<String>> {
    if let Ok(password) = std::env::var("BTCADDR_PASSWORD") {
        return Ok(Zeroizing::new(password));
    }

    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read passphrase from stdin")?;

    let trimmed = line.trim_end_matches(&['\r', '\n'][..]).len();
    line.truncate(trimmed);
    Ok(line)
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str> {
    *i += 1;
    match args.get(*i) {
        Some(value) => Ok(value),
        None => anyhow::bail!("{} requires a value", flag),
    }
}

fn print_help() {
    println!(
        r#"btcaddr-kdf: scrypt key derivation (BIP-38 parameters by default)

USAGE:
    btcaddr-kdf [OPTIONS] (--salt <TEXT> | --salt-hex <HEX>)

The passphrase is read from BTCADDR_PASSWORD, or from the first line of stdin.

OPTIONS:
    -c, --config <PATH>   TOML config file
    --salt <TEXT>         Salt as UTF-8 text
    --salt-hex <HEX>      Salt as hex bytes
    --length <BYTES>      Number of key bytes to print (default: 32)
    --offset <BYTES>      Start reading the derived key at this offset
    --effective-salt      Print the mixed salt used by the final PBKDF2 pass
    --json                Print a JSON report instead of bare hex
    --validate            Validate configuration and exit
    -h, --help            Show this help message
    -V, --version         Show version

ENVIRONMENT VARIABLES (override config file):
    BTCADDR_PASSWORD        Passphrase
    BTCADDR_LOG_LEVEL       Log level (error/warn/info/debug/trace)
    BTCADDR_COST            CPU/memory cost N (power of two)
    BTCADDR_BLOCK_SIZE      Block size r
    BTCADDR_PARALLELISM     Parallelism p
    BTCADDR_MAX_THREADS     Worker thread limit
    BTCADDR_OUTPUT_LENGTH   Number of key bytes to print

EXAMPLES:
    # BIP-38 stretch of a passphrase
    echo -n "passphrase" | btcaddr-kdf --salt-hex 01020304

    # Cheap confirmation-code parameters, 64 bytes as JSON
    btcaddr-kdf --config confirm.toml --salt NaCl --length 64 --json
"#
    );
}
