//! Server discovery: collect server descriptors from config files, package
//! manifests, the environment and the essential-server table.
//!
//! Every source is optional. A file that is missing, unreadable or malformed
//! is skipped; an individual entry that fails validation is dropped. Nothing
//! here aborts a sweep.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::errors::McpError;
use super::types::{ServerDescriptor, ServerEntry, ServerSource};
use crate::config::loader::{env_json, SERVERS_ENV};
use crate::config::{expand_path, ConfigError, DiscoveryConfig, EnvSource};

// ─── Manifest Search ─────────────────────────────────────────────────────────

/// File names recognised as package manifests that may declare servers.
pub const MANIFEST_FILE_NAMES: &[&str] = &["package.json", "mcp.json", ".mcp.json"];

/// Build output and dependency directories never searched.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "dist", "build", ".git"];

fn is_skipped_dir(name: &str) -> bool {
    SKIPPED_DIRS.contains(&name) || name.starts_with('_') || name.starts_with('.')
}

/// Recursively find manifest files under `root`, descending at most
/// `max_depth` directory levels. Results are sorted for stable sweeps.
///
/// A missing or unreadable root yields an empty list.
pub fn find_manifest_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut found = Vec::new();
    walk_manifests(root, 0, max_depth, &mut found);
    found.sort();
    found
}

fn walk_manifests(dir: &Path, depth: usize, max_depth: usize, found: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(path = %dir.display(), error = %e, "skipping unreadable directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        if path.is_dir() {
            if depth < max_depth && !is_skipped_dir(&file_name) {
                walk_manifests(&path, depth + 1, max_depth, found);
            }
        } else if MANIFEST_FILE_NAMES.contains(&file_name.as_str()) {
            found.push(path);
        }
    }
}

// ─── Document Shapes ─────────────────────────────────────────────────────────

/// Extract server descriptors from one JSON document.
///
/// Accepted shapes, tried in order:
/// - `{"mcpServers": {name: entry}}`
/// - `{"servers": {name: entry}}` or `{"servers": [named entry]}`
/// - `[named entry]`
/// - a single named entry `{"name": ..., "command": ...}`
/// - a bare `{name: entry}` map
///
/// Invalid entries are dropped with a debug log; the rest survive.
pub fn parse_server_document(
    doc: &Value,
    source: ServerSource,
    origin: &str,
) -> Vec<ServerDescriptor> {
    let results = match doc {
        Value::Array(items) => parse_named_list(items, source, origin),
        Value::Object(obj) => {
            if let Some(Value::Object(map)) = obj.get("mcpServers") {
                parse_named_map(map, source, origin)
            } else if let Some(Value::Object(map)) = obj.get("servers") {
                parse_named_map(map, source, origin)
            } else if let Some(Value::Array(items)) = obj.get("servers") {
                parse_named_list(items, source, origin)
            } else if obj.get("name").is_some_and(Value::is_string) && obj.contains_key("command") {
                parse_named_list(std::slice::from_ref(doc), source, origin)
            } else {
                // Bare maps share their keys with unrelated manifest fields, so
                // only object values that carry a command are candidates.
                obj.iter()
                    .filter(|(_, v)| v.get("command").is_some())
                    .map(|(name, v)| entry_from_value(name, v, source, origin))
                    .collect()
            }
        }
        _ => vec![Err(McpError::InvalidEntry {
            source_name: origin.to_string(),
            reason: "document is neither an object nor an array".into(),
        })],
    };

    results
        .into_iter()
        .filter_map(|result| match result {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                tracing::debug!(error = %e, "dropping invalid server entry");
                None
            }
        })
        .collect()
}

fn parse_named_map(
    map: &serde_json::Map<String, Value>,
    source: ServerSource,
    origin: &str,
) -> Vec<Result<ServerDescriptor, McpError>> {
    map.iter()
        .map(|(name, value)| entry_from_value(name, value, source, origin))
        .collect()
}

fn parse_named_list(
    items: &[Value],
    source: ServerSource,
    origin: &str,
) -> Vec<Result<ServerDescriptor, McpError>> {
    items
        .iter()
        .map(|item| match item.get("name").and_then(Value::as_str) {
            Some(name) => entry_from_value(name, item, source, origin),
            None => Err(McpError::InvalidEntry {
                source_name: origin.to_string(),
                reason: "list entry has no string 'name'".into(),
            }),
        })
        .collect()
}

/// Validate one entry: it must deserialize and carry a non-empty name and
/// command.
fn entry_from_value(
    name: &str,
    value: &Value,
    source: ServerSource,
    origin: &str,
) -> Result<ServerDescriptor, McpError> {
    let invalid = |reason: String| McpError::InvalidEntry {
        source_name: origin.to_string(),
        reason,
    };

    if name.trim().is_empty() {
        return Err(invalid("server name is empty".into()));
    }
    let entry: ServerEntry = serde_json::from_value(value.clone())
        .map_err(|e| invalid(format!("server '{name}': {e}")))?;
    if entry.command.trim().is_empty() {
        return Err(invalid(format!("server '{name}': command is empty")));
    }

    Ok(entry.into_descriptor(name, source))
}

/// Read a server-list file and extract its descriptors.
pub fn read_server_file(
    path: &Path,
    source: ServerSource,
) -> Result<Vec<ServerDescriptor>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let doc: Value = serde_json::from_str(&raw).map_err(|e| ConfigError::MalformedJson {
        source_name: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(parse_server_document(&doc, source, &path.display().to_string()))
}

/// Servers declared in the `MCP_SERVERS` environment variable.
pub fn servers_from_env(env: &EnvSource) -> Vec<ServerDescriptor> {
    match env_json::<Value>(env, SERVERS_ENV) {
        Some(doc) => parse_server_document(&doc, ServerSource::Environment, SERVERS_ENV),
        None => Vec::new(),
    }
}

// ─── Server Table ────────────────────────────────────────────────────────────

/// Name-keyed server set with explicit source precedence.
///
/// On a name collision the descriptor from the higher-ranked
/// [`ServerSource`] is kept; between equal ranks the later insert wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerTable {
    servers: BTreeMap<String, ServerDescriptor>,
}

impl ServerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor, honouring precedence. Returns whether it was kept.
    pub fn insert(&mut self, descriptor: ServerDescriptor) -> bool {
        if let Some(existing) = self.servers.get(&descriptor.name) {
            if existing.source > descriptor.source {
                tracing::debug!(
                    server = %descriptor.name,
                    kept = ?existing.source,
                    dropped = ?descriptor.source,
                    "server shadowed by higher-precedence source"
                );
                return false;
            }
        }
        self.servers.insert(descriptor.name.clone(), descriptor);
        true
    }

    pub fn extend(&mut self, descriptors: impl IntoIterator<Item = ServerDescriptor>) {
        for descriptor in descriptors {
            self.insert(descriptor);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ServerDescriptor> {
        self.servers.get(name)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.servers.keys().cloned().collect()
    }

    /// Descriptors in name order.
    pub fn descriptors(&self) -> Vec<ServerDescriptor> {
        self.servers.values().cloned().collect()
    }
}

// ─── Sweep ───────────────────────────────────────────────────────────────────

/// Run every discovery source against `config` and build the server table.
///
/// Sources in processing order: configured server-list files, manifest
/// search results, `MCP_SERVERS`, essential servers.
pub fn collect_servers(config: &DiscoveryConfig, env: &EnvSource) -> ServerTable {
    let mut table = ServerTable::new();
    let mut seen_files = HashSet::new();

    for raw_path in &config.config_paths {
        let path = expand_path(raw_path);
        if !path.is_file() {
            continue;
        }
        seen_files.insert(canonical(&path));
        match read_server_file(&path, ServerSource::ConfigFile) {
            Ok(descriptors) => {
                tracing::debug!(path = %path.display(), servers = descriptors.len(), "read server list");
                table.extend(descriptors);
            }
            Err(e) => tracing::warn!(error = %e, "skipping server list"),
        }
    }

    if config.manifest_search.enabled {
        let root = manifest_root(&config.manifest_search.root);
        for path in find_manifest_files(&root, config.manifest_search.max_depth) {
            if !seen_files.insert(canonical(&path)) {
                continue;
            }
            match read_server_file(&path, ServerSource::Manifest) {
                Ok(descriptors) => table.extend(descriptors),
                Err(e) => tracing::debug!(error = %e, "skipping manifest"),
            }
        }
    }

    table.extend(servers_from_env(env));

    table.extend(
        config
            .essential_servers
            .iter()
            .map(|(name, entry)| entry.clone().into_descriptor(name, ServerSource::Essential))
            .filter(|d| !d.command.trim().is_empty()),
    );

    tracing::info!(servers = table.len(), "server discovery complete");
    table
}

fn manifest_root(root: &str) -> PathBuf {
    if root == "." {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    } else {
        expand_path(root)
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn names(descriptors: &[ServerDescriptor]) -> Vec<&str> {
        descriptors.iter().map(|d| d.name.as_str()).collect()
    }

    fn quiet_config() -> DiscoveryConfig {
        let mut config = DiscoveryConfig::default();
        config.config_paths.clear();
        config.manifest_search.enabled = false;
        config
    }

    #[test]
    fn test_parse_mcp_servers_map() {
        let doc = json!({"mcpServers": {"fs": {"command": "echo", "args": ["{}"]}}});
        let servers = parse_server_document(&doc, ServerSource::ConfigFile, "test");
        assert_eq!(names(&servers), vec!["fs"]);
        assert_eq!(servers[0].args, vec!["{}"]);
        assert_eq!(servers[0].source, ServerSource::ConfigFile);
    }

    #[test]
    fn test_parse_servers_map_and_array() {
        let map = json!({"servers": {"a": {"command": "x"}}});
        assert_eq!(names(&parse_server_document(&map, ServerSource::ConfigFile, "t")), vec!["a"]);

        let list = json!({"servers": [{"name": "b", "command": "y"}]});
        assert_eq!(names(&parse_server_document(&list, ServerSource::ConfigFile, "t")), vec!["b"]);
    }

    #[test]
    fn test_parse_bare_array_and_single_object() {
        let list = json!([{"name": "a", "command": "x"}, {"name": "b", "command": "y"}]);
        assert_eq!(
            names(&parse_server_document(&list, ServerSource::Environment, "t")),
            vec!["a", "b"]
        );

        let single = json!({"name": "solo", "command": "z", "env": {"K": "V"}});
        let servers = parse_server_document(&single, ServerSource::ConfigFile, "t");
        assert_eq!(names(&servers), vec!["solo"]);
        assert_eq!(servers[0].env.get("K").map(String::as_str), Some("V"));
    }

    #[test]
    fn test_parse_bare_name_map_ignores_unrelated_fields() {
        let doc = json!({
            "name": "my-package",
            "version": "1.0.0",
            "dependencies": {"left-pad": "1.0"},
            "git": {"command": "mcp-git"}
        });
        let servers = parse_server_document(&doc, ServerSource::Manifest, "package.json");
        assert_eq!(names(&servers), vec!["git"]);
    }

    #[test]
    fn test_invalid_entries_are_dropped() {
        let doc = json!({"mcpServers": {
            "ok": {"command": "echo"},
            "empty": {"command": "  "},
            "missing": {"args": ["x"]},
            "wrong": {"command": 42}
        }});
        let servers = parse_server_document(&doc, ServerSource::ConfigFile, "t");
        assert_eq!(names(&servers), vec!["ok"]);

        let list = json!([{"command": "nameless"}, {"name": "", "command": "x"}]);
        assert!(parse_server_document(&list, ServerSource::ConfigFile, "t").is_empty());
        assert!(parse_server_document(&json!("nope"), ServerSource::ConfigFile, "t").is_empty());
    }

    #[test]
    fn test_find_manifests_respects_depth_and_skips() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::write(root.join("package.json"), "{}").unwrap();
        std::fs::create_dir_all(root.join("a/b/c/d")).unwrap();
        std::fs::write(root.join("a/mcp.json"), "{}").unwrap();
        std::fs::write(root.join("a/b/c/d/mcp.json"), "{}").unwrap();
        for skipped in ["node_modules", "target", "_shared", ".hidden"] {
            std::fs::create_dir(root.join(skipped)).unwrap();
            std::fs::write(root.join(skipped).join("package.json"), "{}").unwrap();
        }
        std::fs::write(root.join("README.md"), "# readme").unwrap();

        let found = find_manifest_files(root, 3);
        assert_eq!(found, vec![root.join("a/mcp.json"), root.join("package.json")]);

        let shallow = find_manifest_files(root, 0);
        assert_eq!(shallow, vec![root.join("package.json")]);
    }

    #[test]
    fn test_find_manifests_missing_root() {
        assert!(find_manifest_files(Path::new("/nonexistent/path/for/manifests"), 3).is_empty());
    }

    #[test]
    fn test_table_precedence() {
        let mut table = ServerTable::new();
        let essential = ServerDescriptor::new("fs", "essential-cmd", &[])
            .with_source(ServerSource::Essential);
        let from_file = ServerDescriptor::new("fs", "file-cmd", &[]);

        assert!(table.insert(essential));
        assert!(!table.insert(from_file.clone()));
        assert_eq!(table.get("fs").unwrap().command, "essential-cmd");

        // equal rank: later wins
        let mut table = ServerTable::new();
        table.insert(from_file);
        table.insert(ServerDescriptor::new("fs", "later-cmd", &[]));
        assert_eq!(table.get("fs").unwrap().command, "later-cmd");

        // lower rank first, higher rank replaces it
        let mut table = ServerTable::new();
        table.insert(ServerDescriptor::new("x", "m", &[]).with_source(ServerSource::Manifest));
        table.insert(ServerDescriptor::new("x", "e", &[]).with_source(ServerSource::Environment));
        assert_eq!(table.get("x").unwrap().command, "e");
    }

    #[test]
    fn test_collect_servers_from_file_and_essential() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("servers.json");
        std::fs::write(
            &file,
            r#"{"mcpServers":{"fs":{"command":"echo","args":["{}"]}}}"#,
        )
        .unwrap();

        let mut config = quiet_config();
        config.config_paths = vec![file.display().to_string()];
        config.essential_servers.insert(
            "core".into(),
            serde_json::from_value(json!({"command": "core-server"})).unwrap(),
        );

        let table = collect_servers(&config, &EnvSource::Fixed(Default::default()));
        assert_eq!(table.names(), vec!["core", "fs"]);
        assert_eq!(table.get("core").unwrap().source, ServerSource::Essential);
    }

    #[test]
    fn test_collect_servers_env_and_bad_files() {
        let tmp = TempDir::new().unwrap();
        let broken = tmp.path().join("broken.json");
        std::fs::write(&broken, "{ nope").unwrap();

        let mut config = quiet_config();
        config.config_paths = vec![
            broken.display().to_string(),
            tmp.path().join("missing.json").display().to_string(),
        ];
        let env = EnvSource::fixed([(SERVERS_ENV, r#"[{"name": "web", "command": "search-server"}]"#)]);

        let table = collect_servers(&config, &env);
        assert_eq!(table.names(), vec!["web"]);
        assert_eq!(table.get("web").unwrap().source, ServerSource::Environment);
    }

    #[test]
    fn test_collect_servers_manifest_loses_to_config_file() {
        let tmp = TempDir::new().unwrap();
        let pkg = tmp.path().join("pkg");
        std::fs::create_dir(&pkg).unwrap();
        std::fs::write(
            pkg.join("package.json"),
            r#"{"name": "pkg", "mcpServers": {"fs": {"command": "from-manifest"}, "git": {"command": "git-mcp"}}}"#,
        )
        .unwrap();
        let list = tmp.path().join("servers.json");
        std::fs::write(&list, r#"{"servers": [{"name": "fs", "command": "from-config"}]}"#).unwrap();

        let mut config = quiet_config();
        config.config_paths = vec![list.display().to_string()];
        config.manifest_search.enabled = true;
        config.manifest_search.root = tmp.path().display().to_string();

        let table = collect_servers(&config, &EnvSource::Fixed(Default::default()));
        assert_eq!(table.names(), vec!["fs", "git"]);
        assert_eq!(table.get("fs").unwrap().command, "from-config");
        assert_eq!(table.get("git").unwrap().source, ServerSource::Manifest);
    }
}
