//! Configuration loading: environment first, then file search paths, then
//! built-in defaults.
//!
//! A source that is missing or malformed is skipped with a log line; loading
//! itself never fails.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::errors::ConfigError;
use super::types::{merge_configs, DiscoveryConfig, EnvSource, PartialDiscoveryConfig};

// ─── Environment Variables ───────────────────────────────────────────────────

/// Whole-config JSON override. When valid, file search is skipped.
pub const DISCOVERY_CONFIG_ENV: &str = "MCP_DISCOVERY_CONFIG";
/// JSON array of server-list file paths.
pub const CONFIG_PATHS_ENV: &str = "MCP_CONFIG_PATHS";
/// JSON map of essential servers (`name → {command, args, env}`).
pub const ESSENTIAL_SERVERS_ENV: &str = "MCP_ESSENTIAL_SERVERS";
/// JSON array of fallback tool rules.
pub const FALLBACK_TOOLS_ENV: &str = "MCP_FALLBACK_TOOLS";
/// JSON arrays of classification rules.
pub const CATEGORY_RULES_ENV: &str = "MCP_CATEGORY_RULES";
pub const COMPLEXITY_RULES_ENV: &str = "MCP_COMPLEXITY_RULES";
pub const DURATION_RULES_ENV: &str = "MCP_DURATION_RULES";
/// JSON array of additional server objects, read during discovery.
pub const SERVERS_ENV: &str = "MCP_SERVERS";

/// Config file locations probed in order when no env override is present.
const CONFIG_SEARCH_PATHS: &[&str] = &[
    "./discovery-config.json",
    "./.mcp/discovery-config.json",
    "~/.config/mcp/discovery-config.json",
    "~/.mcp/discovery-config.json",
];

// ─── Path Expansion ──────────────────────────────────────────────────────────

/// Expand a leading `~/` to the home directory and a leading `./` to the
/// current working directory. Other paths pass through unchanged.
pub fn expand_path(path: &str) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    expand_path_with(path, dirs::home_dir().as_deref(), &cwd)
}

/// [`expand_path`] with explicit home and working directories.
pub fn expand_path_with(path: &str, home: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = home {
            return home.join(rest);
        }
    } else if let Some(rest) = path.strip_prefix("./") {
        return cwd.join(rest);
    }
    PathBuf::from(path)
}

/// The expanded default config search paths.
pub fn default_search_paths() -> Vec<PathBuf> {
    CONFIG_SEARCH_PATHS.iter().map(|p| expand_path(p)).collect()
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Load the discovery configuration from the process environment and the
/// default search paths.
pub fn load_config() -> DiscoveryConfig {
    load_config_with(&EnvSource::Process, &default_search_paths())
}

/// Load the discovery configuration from an explicit environment and list of
/// candidate files.
///
/// Order:
/// 1. `MCP_DISCOVERY_CONFIG` (merged over defaults, file search skipped).
/// 2. The first file in `search_paths` that exists and parses.
/// 3. Defaults.
///
/// Per-field environment overrides are applied last in every case.
pub fn load_config_with(env: &EnvSource, search_paths: &[PathBuf]) -> DiscoveryConfig {
    let defaults = DiscoveryConfig::default();

    if let Some(raw) = env.get(DISCOVERY_CONFIG_ENV) {
        match parse_partial(&raw, DISCOVERY_CONFIG_ENV) {
            Ok(partial) => {
                tracing::info!(source = DISCOVERY_CONFIG_ENV, "loaded discovery config from environment");
                return apply_env_overrides(merge_configs(&defaults, partial), env);
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed discovery config override");
            }
        }
    }

    let base = match first_readable_file(search_paths) {
        Some((path, partial)) => {
            tracing::info!(path = %path.display(), "loaded discovery config file");
            merge_configs(&defaults, partial)
        }
        None => {
            tracing::debug!("no discovery config file found, using defaults");
            defaults
        }
    };

    apply_env_overrides(base, env)
}

/// Return the first path that exists and parses, with its contents.
fn first_readable_file(search_paths: &[PathBuf]) -> Option<(&PathBuf, PartialDiscoveryConfig)> {
    search_paths.iter().find_map(|path| {
        if !path.exists() {
            return None;
        }
        match read_config_file(path) {
            Ok(partial) => Some((path, partial)),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unusable discovery config file");
                None
            }
        }
    })
}

/// Read and parse one config file.
pub fn read_config_file(path: &Path) -> Result<PartialDiscoveryConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_partial(&raw, &path.display().to_string())
}

fn parse_partial(raw: &str, source_name: &str) -> Result<PartialDiscoveryConfig, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::MalformedJson {
        source_name: source_name.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a JSON-valued environment variable, logging and ignoring garbage.
pub(crate) fn env_json<T: DeserializeOwned>(env: &EnvSource, key: &str) -> Option<T> {
    let raw = env.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(var = key, error = %e, "ignoring malformed JSON in environment variable");
            None
        }
    }
}

/// Apply the per-field environment overrides, which beat every file source.
fn apply_env_overrides(config: DiscoveryConfig, env: &EnvSource) -> DiscoveryConfig {
    let partial = PartialDiscoveryConfig {
        config_paths: env_json(env, CONFIG_PATHS_ENV),
        essential_servers: env_json(env, ESSENTIAL_SERVERS_ENV),
        fallback_tools: env_json(env, FALLBACK_TOOLS_ENV),
        category_rules: env_json(env, CATEGORY_RULES_ENV),
        complexity_rules: env_json(env, COMPLEXITY_RULES_ENV),
        duration_rules: env_json(env, DURATION_RULES_ENV),
        ..Default::default()
    };
    merge_configs(&config, partial)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_env_override_wins_and_skips_files() {
        let tmp = TempDir::new().unwrap();
        let file = write(&tmp, "discovery-config.json", r#"{"configPaths": ["from-file.json"]}"#);
        let env = EnvSource::fixed([(DISCOVERY_CONFIG_ENV, r#"{"configPaths": ["from-env.json"]}"#)]);

        let config = load_config_with(&env, &[file]);
        assert_eq!(config.config_paths, vec!["from-env.json"]);
    }

    #[test]
    fn test_malformed_env_override_falls_through_to_file() {
        let tmp = TempDir::new().unwrap();
        let file = write(&tmp, "discovery-config.json", r#"{"queryTimeoutMs": 750}"#);
        let env = EnvSource::fixed([(DISCOVERY_CONFIG_ENV, "{not json")]);

        let config = load_config_with(&env, &[file]);
        assert_eq!(config.query_timeout_ms, 750);
    }

    #[test]
    fn test_first_parseable_file_wins() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing.json");
        let broken = write(&tmp, "broken.json", "{{{");
        let good = write(&tmp, "good.json", r#"{"queryTimeoutMs": 1200}"#);
        let later = write(&tmp, "later.json", r#"{"queryTimeoutMs": 9999}"#);

        let config = load_config_with(&EnvSource::Fixed(Default::default()), &[missing, broken, good, later]);
        assert_eq!(config.query_timeout_ms, 1200);
    }

    #[test]
    fn test_defaults_when_nothing_found() {
        let tmp = TempDir::new().unwrap();
        let config = load_config_with(
            &EnvSource::Fixed(Default::default()),
            &[tmp.path().join("nope.json")],
        );
        assert_eq!(config, DiscoveryConfig::default());
    }

    #[test]
    fn test_field_env_overrides_beat_files() {
        let tmp = TempDir::new().unwrap();
        let file = write(
            &tmp,
            "discovery-config.json",
            r#"{"essentialServers": {"file-server": {"command": "a"}}}"#,
        );
        let env = EnvSource::fixed([
            (ESSENTIAL_SERVERS_ENV, r#"{"env-server": {"command": "b", "args": ["x"]}}"#),
            (CATEGORY_RULES_ENV, r#"[{"pattern": "foo", "value": "bar"}]"#),
            (DURATION_RULES_ENV, "garbage"),
        ]);

        let config = load_config_with(&env, &[file]);
        assert_eq!(
            config.essential_servers.keys().collect::<Vec<_>>(),
            vec!["env-server"]
        );
        assert_eq!(config.category_rules.len(), 1);
        assert_eq!(config.category_rules[0].value, "bar");
        // malformed override ignored
        assert_eq!(config.duration_rules, DiscoveryConfig::default().duration_rules);
    }

    #[test]
    fn test_expand_path() {
        let home = Path::new("/home/u");
        let cwd = Path::new("/work");
        assert_eq!(
            expand_path_with("~/.mcp/x.json", Some(home), cwd),
            PathBuf::from("/home/u/.mcp/x.json")
        );
        assert_eq!(
            expand_path_with("./x.json", Some(home), cwd),
            PathBuf::from("/work/x.json")
        );
        assert_eq!(
            expand_path_with("/abs/x.json", Some(home), cwd),
            PathBuf::from("/abs/x.json")
        );
        assert_eq!(
            expand_path_with("rel/x.json", Some(home), cwd),
            PathBuf::from("rel/x.json")
        );
        // no home directory: leave the path alone
        assert_eq!(
            expand_path_with("~/x.json", None, cwd),
            PathBuf::from("~/x.json")
        );
    }
}
