//! CLI configuration, parsed from a TOML file plus environment variable overrides.
//!
//! Priority: command-line flags > environment variables > config file > defaults.

use anyhow::{Context, Result};
use btcaddr_kdf::ScryptParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// scrypt cost parameters
    #[serde(default)]
    pub kdf: KdfSection,

    /// What to print
    #[serde(default)]
    pub output: OutputSection,
}

/// scrypt parameters. Explicit fields override the preset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KdfSection {
    /// "bip38" (default) or "bip38-confirmation"
    pub preset: Option<String>,

    /// CPU/memory cost N (power of two)
    pub cost: Option<u32>,

    /// Block size r
    pub block_size: Option<u32>,

    /// Parallelism p
    pub parallelism: Option<u32>,

    /// Worker thread limit
    pub max_threads: Option<usize>,

    /// mlock scratch memory while mixing
    #[serde(default)]
    pub lock_memory: bool,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    /// Number of key bytes to print
    #[serde(default = "default_output_length")]
    pub length: usize,

    /// "hex" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            kdf: KdfSection::default(),
            output: OutputSection::default(),
        }
    }
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            length: default_output_length(),
            format: default_format(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_output_length() -> usize {
    32
}

fn default_format() -> String {
    "hex".to_string()
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl CliConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `BTCADDR_LOG_LEVEL`
    /// - `BTCADDR_COST`
    /// - `BTCADDR_BLOCK_SIZE`
    /// - `BTCADDR_PARALLELISM`
    /// - `BTCADDR_MAX_THREADS`
    /// - `BTCADDR_OUTPUT_LENGTH`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BTCADDR_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Ok(v) = std::env::var("BTCADDR_COST") {
            if let Ok(cost) = v.parse::<u32>() {
                self.kdf.cost = Some(cost);
            }
        }
        if let Ok(v) = std::env::var("BTCADDR_BLOCK_SIZE") {
            if let Ok(r) = v.parse::<u32>() {
                self.kdf.block_size = Some(r);
            }
        }
        if let Ok(v) = std::env::var("BTCADDR_PARALLELISM") {
            if let Ok(p) = v.parse::<u32>() {
                self.kdf.parallelism = Some(p);
            }
        }
        if let Ok(v) = std::env::var("BTCADDR_MAX_THREADS") {
            if let Ok(threads) = v.parse::<usize>() {
                self.kdf.max_threads = Some(threads);
            }
        }
        if let Ok(v) = std::env::var("BTCADDR_OUTPUT_LENGTH") {
            if let Ok(len) = v.parse::<usize>() {
                self.output.length = len;
            }
        }
    }

    /// Resolve the preset and overrides into scrypt parameters.
    pub fn params(&self) -> Result<ScryptParams> {
        let mut params = match self.kdf.preset.as_deref() {
            None | Some("bip38") => ScryptParams::bip38(),
            Some("bip38-confirmation") => ScryptParams::bip38_confirmation(),
            Some(other) => anyhow::bail!("Unknown kdf.preset: {}", other),
        };
        if let Some(cost) = self.kdf.cost {
            params.cost = cost;
        }
        if let Some(r) = self.kdf.block_size {
            params.block_size = r;
        }
        if let Some(p) = self.kdf.parallelism {
            params.parallelism = p;
        }
        if let Some(threads) = self.kdf.max_threads {
            params.max_threads = threads;
        }
        params.lock_memory = self.kdf.lock_memory;
        Ok(params)
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        let params = self.params()?;
        params
            .validate(32)
            .context("kdf parameters are invalid")?;

        anyhow::ensure!(
            matches!(self.output.format.as_str(), "hex" | "json"),
            "output.format must be \"hex\" or \"json\""
        );

        // Keep the printed key to something a terminal can take
        anyhow::ensure!(
            self.output.length <= 1 << 20,
            "output.length must be <= 1048576"
        );

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn full_toml() -> &'static str {
        r#"
log_level = "debug"

[kdf]
preset = "bip38-confirmation"
parallelism = 2
max_threads = 4
lock_memory = true

[output]
length = 64
format = "json"
"#
    }

    fn load(toml: &str) -> CliConfig {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", toml).unwrap();
        CliConfig::from_file(file.path()).unwrap()
    }

    #[test]
    fn test_parse_empty_config() {
        let config = load("");
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.output.length, 32);
        assert_eq!(config.output.format, "hex");
        assert_eq!(config.params().unwrap(), ScryptParams::bip38());
    }

    #[test]
    fn test_default_matches_empty_file() {
        let config = CliConfig::default();
        let empty = load("");
        assert_eq!(config.log_level, empty.log_level);
        assert_eq!(config.output.length, empty.output.length);
        assert_eq!(config.params().unwrap(), empty.params().unwrap());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config = load(full_toml());
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.output.length, 64);
        assert_eq!(config.output.format, "json");

        let params = config.params().unwrap();
        assert_eq!(params.cost, 1024);
        assert_eq!(params.block_size, 1);
        assert_eq!(params.parallelism, 2);
        assert_eq!(params.max_threads, 4);
        assert!(params.lock_memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = load("");

        std::env::set_var("BTCADDR_COST", "2048");
        std::env::set_var("BTCADDR_MAX_THREADS", "2");
        std::env::set_var("BTCADDR_OUTPUT_LENGTH", "16");

        config.apply_env_overrides();

        assert_eq!(config.kdf.cost, Some(2048));
        assert_eq!(config.kdf.max_threads, Some(2));
        assert_eq!(config.output.length, 16);

        // Clean up
        std::env::remove_var("BTCADDR_COST");
        std::env::remove_var("BTCADDR_MAX_THREADS");
        std::env::remove_var("BTCADDR_OUTPUT_LENGTH");
    }

    #[test]
    fn test_unknown_preset() {
        let config = load("[kdf]\npreset = \"argon2\"\n");
        assert!(config.params().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bad_cost() {
        let config = load("[kdf]\ncost = 1000\n");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_threads() {
        let config = load("[kdf]\nmax_threads = 0\n");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bad_format() {
        let config = load("[output]\nformat = \"base64\"\n");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = load(full_toml());
        let serialized = toml::to_string_pretty(&config).unwrap();

        // Should be valid TOML that re-parses
        let reparsed: CliConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.params().unwrap(), config.params().unwrap());
        assert_eq!(reparsed.output.format, config.output.format);
    }
}
