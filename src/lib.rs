//! MCP server discovery, heuristic tool classification and route planning.
//!
//! [`RoutePlanner`] is the entry point: it discovers configured MCP servers,
//! asks each for its tool listing (falling back to heuristic tool sets when a
//! server can't answer), and ranks candidate tool chains for a task.

pub mod config;
pub mod heuristics;
pub mod mcp_client;
pub mod planner;
pub mod reliability;
pub mod routing;
pub mod schemas;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use config::{load_config, DiscoveryConfig};
pub use mcp_client::{DiscoveryClient, SweepReport, ToolDescriptor};
pub use planner::{PlannerError, RoutePlanner};
pub use reliability::{HealthReport, ReliabilityManager, RetryPolicy};
pub use routing::{OptimizationCriteria, RouteCandidate, RouteStrategy, SequentialAnalysis};

/// Async mutex for types that require `.await` inside their methods.
pub type TokioMutex<T> = tokio::sync::Mutex<T>;

/// Discovery client shared between the planner and a hosting layer.
pub type SharedDiscovery = Arc<TokioMutex<DiscoveryClient>>;

/// Log files kept besides the current one.
const KEEP_LOG_FILES: u32 = 3;

/// Set to `json` for one JSON object per log line.
const LOG_FORMAT_ENV: &str = "MCP_LOG_FORMAT";

/// Platform data directory for the planner.
///
/// - macOS: `~/Library/Application Support/mcp-route-planner/`
/// - Linux: `$XDG_DATA_HOME/mcp-route-planner/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.mcp-route-planner/` when neither resolves.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("mcp-route-planner");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mcp-route-planner")
}

/// Install the global tracing subscriber, logging to `planner.log` in
/// [`data_dir`].
///
/// Existing logs are rotated first (`planner.log` → `.1` → `.2` → `.3`). The
/// filter comes from `RUST_LOG`, defaulting to `mcp_route_planner=info,warn`.
pub fn init_tracing() -> anyhow::Result<()> {
    init_tracing_in(&data_dir())
}

/// [`init_tracing`] with an explicit log directory.
pub fn init_tracing_in(log_dir: &Path) -> anyhow::Result<()> {
    use anyhow::Context;
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let log_path = log_dir.join("planner.log");
    rotate_log_file(&log_path, KEEP_LOG_FILES);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;
    let writer = FlushingWriter::new(log_file);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mcp_route_planner=info,warn"));

    let json = std::env::var(LOG_FORMAT_ENV).map_or(false, |v| v.eq_ignore_ascii_case("json"));
    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("tracing subscriber already installed: {e}"))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== mcp-route-planner starting ==="
    );
    Ok(())
}

/// Rotate `base` → `base.1` → … → `base.{keep}`; the oldest is deleted.
/// Gaps in the chain are skipped.
fn rotate_log_file(base: &Path, keep: u32) {
    let numbered = |i: u32| PathBuf::from(format!("{}.{i}", base.display()));

    let _ = std::fs::remove_file(numbered(keep));
    for i in (1..keep).rev() {
        let _ = std::fs::rename(numbered(i), numbered(i + 1));
    }
    if base.exists() {
        let _ = std::fs::rename(base, numbered(1));
    }
}

/// File writer that flushes after every write, so log lines reach disk
/// even if the process dies.
#[derive(Clone)]
struct FlushingWriter {
    file: Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: Arc::new(std::sync::Mutex::new(file)),
        }
    }

    fn lock(&self) -> std::io::Result<std::sync::MutexGuard<'_, std::fs::File>> {
        self.file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))
    }
}

impl Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self.lock()?;
        let n = f.write(buf)?;
        f.flush()?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.lock()?.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_keeps_last_three() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("planner.log");
        for generation in 0..5 {
            std::fs::write(&base, format!("gen {generation}")).unwrap();
            rotate_log_file(&base, 3);
        }

        assert!(!base.exists());
        let read = |i: u32| std::fs::read_to_string(format!("{}.{i}", base.display())).unwrap();
        assert_eq!(read(1), "gen 4");
        assert_eq!(read(2), "gen 3");
        assert_eq!(read(3), "gen 2");
        assert!(!dir.path().join("planner.log.4").exists());
    }

    #[test]
    fn test_rotate_with_nothing_to_rotate() {
        let dir = tempfile::tempdir().unwrap();
        rotate_log_file(&dir.path().join("planner.log"), 3);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_flushing_writer_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = FlushingWriter::new(file);
        let mut clone = writer.clone();

        writer.write_all(b"one\n").unwrap();
        clone.write_all(b"two\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_init_tracing_twice_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // another test may already own the global subscriber
        let first = init_tracing_in(dir.path());
        assert!(dir.path().join("planner.log").exists());
        if first.is_ok() {
            assert!(init_tracing_in(dir.path()).is_err());
        }
    }

    #[test]
    fn test_data_dir_is_namespaced() {
        let dir = data_dir();
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.contains("mcp-route-planner"));
    }
}
