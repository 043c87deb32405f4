//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

const MAX_CHUNK_SIZE: u64 = 16 * 1024 * 1024;

/// TOML-style file configuration for dload defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Base directory for relative and derived destinations.
    pub output_dir: Option<PathBuf>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Write-buffer size while streaming to disk.
    pub chunk_size: Option<usize>,
    /// Concurrent workers for `multi`.
    pub max_threads: Option<usize>,
    /// Delay between batch worker launches in milliseconds.
    pub stagger_ms: Option<u64>,
    /// `User-Agent` header override.
    pub user_agent: Option<String>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.timeout_secs
            && !(1..=3600).contains(&timeout)
        {
            bail!("Invalid config value for `timeout_secs`: {timeout}. Expected range: 1..=3600");
        }

        if let Some(chunk_size) = self.chunk_size
            && !(1..=MAX_CHUNK_SIZE).contains(&(chunk_size as u64))
        {
            bail!(
                "Invalid config value for `chunk_size`: {chunk_size}. Expected range: 1..={MAX_CHUNK_SIZE}"
            );
        }

        if let Some(max_threads) = self.max_threads
            && !(1..=100).contains(&max_threads)
        {
            bail!("Invalid config value for `max_threads`: {max_threads}. Expected range: 1..=100");
        }

        if let Some(stagger) = self.stagger_ms
            && stagger > 60_000
        {
            bail!("Invalid config value for `stagger_ms`: {stagger}. Expected range: 0..=60000");
        }

        if let Some(user_agent) = &self.user_agent
            && user_agent.trim().is_empty()
        {
            bail!("Invalid config value for `user_agent`: must not be empty");
        }

        Ok(())
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/dload/config.toml`
/// 2. `$HOME/.config/dload/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("dload").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("dload")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit` or the default path if present.
pub fn load_file_config_from(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(resolve_default_config_path);
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig { path, config: None });
    };

    if !path_ref.exists() {
        if explicit.is_some() {
            bail!("Config file '{}' does not exist", path_ref.display());
        }
        return Ok(LoadedConfig { path, config: None });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {}", line_index + 1);

        match key {
            "output_dir" => {
                cfg.output_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(context)?,
                ));
            }
            "timeout_secs" => {
                cfg.timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "chunk_size" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                cfg.chunk_size = Some(
                    usize::try_from(parsed)
                        .map_err(|_| anyhow::anyhow!("chunk_size out of range for usize"))
                        .with_context(context)?,
                );
            }
            "max_threads" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                cfg.max_threads = Some(
                    usize::try_from(parsed)
                        .map_err(|_| anyhow::anyhow!("max_threads out of range for usize"))
                        .with_context(context)?,
                );
            }
            "stagger_ms" => {
                cfg.stagger_ms = Some(parse_integer_u64(value).with_context(context)?);
            }
            "user_agent" => {
                cfg.user_agent = Some(parse_string_literal(value).with_context(context)?);
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
output_dir = "~/downloads"
timeout_secs = 45
chunk_size = 65536
max_threads = 8
stagger_ms = 0
user_agent = "fetcher/1.0"
"#,
        )
        .expect("full config should parse");
        assert_eq!(cfg.output_dir, Some(PathBuf::from("~/downloads")));
        assert_eq!(cfg.timeout_secs, Some(45));
        assert_eq!(cfg.chunk_size, Some(65536));
        assert_eq!(cfg.max_threads, Some(8));
        assert_eq!(cfg.stagger_ms, Some(0));
        assert_eq!(cfg.user_agent.as_deref(), Some("fetcher/1.0"));
    }

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str("max_threads = 4").expect("partial config should parse");
        assert_eq!(cfg.max_threads, Some(4));
        assert!(cfg.output_dir.is_none());
        assert!(cfg.timeout_secs.is_none());
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
# defaults for the office proxy
timeout_secs = 10 # slow link
user_agent = "a#b" # hash inside quotes is kept
"#,
        )
        .expect("config with comments should parse");
        assert_eq!(cfg.timeout_secs, Some(10));
        assert_eq!(cfg.user_agent.as_deref(), Some("a#b"));
    }

    #[test]
    fn test_parse_config_rejects_out_of_range_values() {
        for (line, key) in [
            ("timeout_secs = 0", "timeout_secs"),
            ("timeout_secs = 3601", "timeout_secs"),
            ("chunk_size = 0", "chunk_size"),
            ("chunk_size = 16777217", "chunk_size"),
            ("max_threads = 0", "max_threads"),
            ("max_threads = 101", "max_threads"),
            ("stagger_ms = 60001", "stagger_ms"),
        ] {
            let err = parse_config_str(line).expect_err("out-of-range value expected");
            assert!(err.to_string().contains(key), "{line}: {err}");
        }
    }

    #[test]
    fn test_parse_config_rejects_trailing_tokens() {
        let err = parse_config_str("max_threads = 4 trailing")
            .expect_err("expected trailing token error");
        assert!(err.to_string().contains("max_threads"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_strings() {
        let err = parse_config_str("output_dir = /tmp").expect_err("expected quoting error");
        assert!(err.to_string().contains("output_dir"));
    }

    #[test]
    fn test_parse_config_rejects_empty_user_agent() {
        let err = parse_config_str(r#"user_agent = "  ""#).expect_err("expected empty error");
        assert!(err.to_string().contains("user_agent"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("unknown_key = 123").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("unknown_key"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("max_threads 4").expect_err("syntax error expected");
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_load_file_config_from_explicit_missing_path_fails() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        let err = load_file_config_from(Some(&missing)).expect_err("missing file expected");
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_load_file_config_from_explicit_path() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "stagger_ms = 250\n").expect("write config");
        let loaded = load_file_config_from(Some(&path)).expect("config should load");
        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.and_then(|c| c.stagger_ms), Some(250));
    }
}
