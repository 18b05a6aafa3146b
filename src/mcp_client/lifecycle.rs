//! Query process lifecycle.
//!
//! Each `tools/list` query runs a server as a short-lived child process:
//! spawn, write one request line, close stdin, collect output until exit.
//! The lifecycle is an explicit state machine so every exit path (clean exit,
//! non-zero exit, timeout, cancellation) is observable after the fact.
//!
//! ```text
//! Spawned ──► Running ──► Exited(code)
//!                   ├───► TimedOut   (deadline fired, process killed)
//!                   └───► Killed     (caller cancelled, process killed)
//! ```

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

use super::errors::McpError;
use super::transport::{encode_request_line, parse_tool_listing};
use super::types::{error_codes, JsonRpcRequest, ServerDescriptor, ToolDescriptor};
use crate::heuristics::RuleSet;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Default wall-clock budget for one query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Captured stderr is truncated to keep error messages and logs readable.
const STDERR_LIMIT_CHARS: usize = 2_000;

// ─── State Machine ───────────────────────────────────────────────────────────

/// Lifecycle state of a query process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Process created, request not yet delivered.
    Spawned,
    /// Request written and stdin closed; waiting for exit.
    Running,
    /// Process exited on its own. `None` means it was ended by a signal.
    Exited(Option<i32>),
    /// Process killed because the caller cancelled the query.
    Killed,
    /// Process killed because the deadline passed.
    TimedOut,
}

impl ProcessState {
    /// Whether the process is gone (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited(_) | Self::Killed | Self::TimedOut)
    }
}

/// Output captured from a query process that exited with status zero.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

/// One in-flight query process and its lifecycle history.
pub struct ServerQuery {
    name: String,
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    history: Vec<ProcessState>,
    started: Instant,
}

impl ServerQuery {
    /// Spawn the server with piped stdio.
    ///
    /// The child inherits the ambient environment with `descriptor.env`
    /// overlaid. `kill_on_drop` guarantees no orphan if the query is dropped
    /// mid-flight.
    pub fn spawn(descriptor: &ServerDescriptor) -> Result<Self, McpError> {
        let mut cmd = Command::new(&descriptor.command);
        cmd.args(&descriptor.args);
        cmd.envs(&descriptor.env);

        // Windows: prevent console window from appearing for child processes
        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            name: descriptor.name.clone(),
            reason: e.to_string(),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        tracing::debug!(server = %descriptor.name, pid = ?child.id(), "spawned query process");

        Ok(Self {
            name: descriptor.name.clone(),
            child,
            stdout,
            stderr,
            history: vec![ProcessState::Spawned],
            started: Instant::now(),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.history.last().copied().unwrap_or(ProcessState::Spawned)
    }

    /// Every state the process has passed through, oldest first.
    pub fn history(&self) -> &[ProcessState] {
        &self.history
    }

    /// Time since spawn.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn transition(&mut self, next: ProcessState) {
        tracing::debug!(
            server = %self.name,
            from = ?self.state(),
            to = ?next,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "query process transition"
        );
        self.history.push(next);
    }

    /// Write the request line and close stdin.
    ///
    /// A server that exits without reading its input (or closes stdin early)
    /// is not an error here: its output still decides the outcome.
    pub async fn send(&mut self, request: &JsonRpcRequest) -> Result<(), McpError> {
        let line = encode_request_line(request).map_err(|e| McpError::TransportError {
            server: self.name.clone(),
            reason: e.to_string(),
        })?;

        if let Some(mut stdin) = self.child.stdin.take() {
            let written = async {
                stdin.write_all(line.as_bytes()).await?;
                stdin.flush().await
            }
            .await;
            if let Err(e) = written {
                tracing::debug!(server = %self.name, error = %e, "server closed stdin before reading request");
            }
            // stdin is dropped here, which closes the pipe
        }

        self.transition(ProcessState::Running);
        Ok(())
    }

    /// Collect stdout/stderr until the process exits, the timeout fires, or
    /// `cancel` is triggered.
    ///
    /// The deadline is a child of `cancel`, so cancelling the caller's token
    /// also ends this query. On either kind of cancellation the process is
    /// killed and reaped before this returns.
    pub async fn wait_for_output(
        &mut self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CapturedOutput, McpError> {
        let (Some(stdout), Some(stderr)) = (self.stdout.take(), self.stderr.take()) else {
            return Err(McpError::TransportError {
                server: self.name.clone(),
                reason: "stdio pipes already consumed".into(),
            });
        };

        let deadline = cancel.child_token();
        let timer = {
            let deadline = deadline.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                deadline.cancel();
            })
        };

        let outcome = tokio::select! {
            result = collect_output(&mut self.child, stdout, stderr) => Some(result),
            _ = deadline.cancelled() => None,
        };
        timer.abort();

        match outcome {
            Some(Ok((status, stdout, stderr))) => {
                self.transition(ProcessState::Exited(status.code()));
                if status.success() {
                    Ok(CapturedOutput { stdout, stderr })
                } else {
                    Err(McpError::ProcessExited {
                        name: self.name.clone(),
                        code: status.code(),
                        stderr: truncate_chars(&stderr, STDERR_LIMIT_CHARS),
                    })
                }
            }
            Some(Err(e)) => {
                self.terminate().await;
                self.transition(ProcessState::Killed);
                Err(McpError::TransportError {
                    server: self.name.clone(),
                    reason: format!("failed to read server output: {e}"),
                })
            }
            None if cancel.is_cancelled() => {
                self.terminate().await;
                self.transition(ProcessState::Killed);
                Err(McpError::Cancelled {
                    name: self.name.clone(),
                })
            }
            None => {
                self.terminate().await;
                self.transition(ProcessState::TimedOut);
                Err(McpError::Timeout {
                    name: self.name.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Force-kill the process and wait for it to be reaped.
    async fn terminate(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::warn!(server = %self.name, error = %e, "failed to kill query process");
        }
    }
}

/// Drain both pipes concurrently, then wait for the exit status.
async fn collect_output(
    child: &mut Child,
    mut stdout: ChildStdout,
    mut stderr: ChildStderr,
) -> std::io::Result<(ExitStatus, String, String)> {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let (read_out, read_err) = tokio::join!(
        stdout.read_to_end(&mut out),
        stderr.read_to_end(&mut err)
    );
    read_out?;
    read_err?;
    let status = child.wait().await?;
    Ok((
        status,
        String::from_utf8_lossy(&out).into_owned(),
        String::from_utf8_lossy(&err).into_owned(),
    ))
}

/// Truncate to at most `limit` characters, marking the cut.
fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...(truncated)", &text[..idx]),
        None => text.to_string(),
    }
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// Ask one server for its tools.
///
/// Spawns the server, sends a single `tools/list` request, and classifies
/// every tool in the response through `rules`. A clean exit whose output
/// holds no tool listing at all is reported as `InvalidResponse` so the
/// caller can fall back.
pub async fn query_server_tools(
    descriptor: &ServerDescriptor,
    timeout: Duration,
    rules: &RuleSet,
    cancel: &CancellationToken,
) -> Result<Vec<ToolDescriptor>, McpError> {
    let mut query = ServerQuery::spawn(descriptor)?;
    query.send(&JsonRpcRequest::tools_list()).await?;
    let output = query.wait_for_output(timeout, cancel).await?;

    let listing = parse_tool_listing(&output.stdout);
    if listing.listing_messages == 0 {
        let reason = match listing.rpc_errors.first() {
            Some(error) if error.code == error_codes::METHOD_NOT_FOUND => format!(
                "server does not support tools/list (code {}): {}",
                error.code, error.message
            ),
            Some(error) => format!("server returned error {}: {}", error.code, error.message),
            None => format!(
                "no tools/list result in output ({} unparseable lines)",
                listing.skipped_lines
            ),
        };
        return Err(McpError::InvalidResponse {
            server: descriptor.name.clone(),
            reason,
        });
    }

    tracing::debug!(
        server = %descriptor.name,
        tools = listing.tools.len(),
        elapsed_ms = query.elapsed().as_millis() as u64,
        "server answered tools/list"
    );

    Ok(listing
        .tools
        .into_iter()
        .map(|raw| rules.describe_tool(&descriptor.name, raw))
        .collect())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(name: &str, script: &str) -> ServerDescriptor {
        ServerDescriptor::new(name, "sh", &["-c", script])
    }

    const LISTING: &str = r#"read line; echo 'booting'; echo '{"jsonrpc":"2.0","id":1,"result":{"tools":[{"name":"read_file","description":"Read a file"},{"name":"zzz","complexity":9}]}}'"#;

    #[tokio::test]
    async fn test_query_parses_listing() {
        let tools = query_server_tools(
            &sh("fs", LISTING),
            Duration::from_secs(5),
            &RuleSet::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "read_file");
        assert_eq!(tools[0].category, "filesystem");
        assert_eq!(tools[0].server_name, "fs");
        assert_eq!(tools[1].name, "zzz");
        assert_eq!(tools[1].complexity, 9);
        assert_eq!(tools[1].category, "utility");
    }

    #[tokio::test]
    async fn test_server_receives_exactly_one_request_line() {
        // Echo stdin back inside a listing so the test can inspect it.
        let script = r#"req=$(cat); n=$(printf '%s\n' "$req" | wc -l | tr -d ' '); echo "{\"result\":{\"tools\":[{\"name\":\"lines_$n\"}]}}"; printf '%s\n' "$req" >&2"#;
        let mut query = ServerQuery::spawn(&sh("echo", script)).unwrap();
        query.send(&JsonRpcRequest::tools_list()).await.unwrap();
        let output = query
            .wait_for_output(Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap();

        assert!(output.stdout.contains("lines_1"));
        let request: serde_json::Value = serde_json::from_str(output.stderr.trim()).unwrap();
        assert_eq!(request["method"], "tools/list");
        assert_eq!(
            query.history(),
            &[ProcessState::Spawned, ProcessState::Running, ProcessState::Exited(Some(0))]
        );
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let started = Instant::now();
        let mut query = ServerQuery::spawn(&sh("slow", "sleep 30")).unwrap();
        query.send(&JsonRpcRequest::tools_list()).await.unwrap();
        let err = query
            .wait_for_output(Duration::from_millis(200), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, McpError::Timeout { timeout_ms: 200, .. }));
        assert_eq!(query.state(), ProcessState::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_caller_cancellation_kills_process() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut query = ServerQuery::spawn(&sh("slow", "sleep 30")).unwrap();
        query.send(&JsonRpcRequest::tools_list()).await.unwrap();
        let err = query
            .wait_for_output(Duration::from_secs(10), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, McpError::Cancelled { .. }));
        assert_eq!(query.state(), ProcessState::Killed);
        assert!(query.state().is_terminal());
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let err = query_server_tools(
            &sh("bad", "echo 'missing dependency' >&2; exit 3"),
            Duration::from_secs(5),
            &RuleSet::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        match err {
            McpError::ProcessExited { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert!(stderr.contains("missing dependency"));
            }
            other => panic!("expected ProcessExited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_clean_exit_without_listing_is_invalid_response() {
        let err = query_server_tools(
            &ServerDescriptor::new("fs", "echo", &["{}"]),
            Duration::from_secs(5),
            &RuleSet::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, McpError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_rpc_error_message_is_reported() {
        let query = |script: &'static str| async move {
            query_server_tools(
                &sh("rpc", script),
                Duration::from_secs(5),
                &RuleSet::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err()
            .to_string()
        };

        let unsupported = query(
            r#"cat >/dev/null; echo '{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}'"#,
        )
        .await;
        assert!(unsupported.contains("does not support tools/list"), "{unsupported}");
        assert!(unsupported.contains("Method not found"));

        let failed = query(
            r#"cat >/dev/null; echo '{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"index not ready"}}'"#,
        )
        .await;
        assert!(failed.contains("error -32000: index not ready"), "{failed}");
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let err = ServerQuery::spawn(&ServerDescriptor::new(
            "ghost",
            "/definitely/not/a/binary",
            &[],
        ))
        .err()
        .unwrap();
        assert!(matches!(err, McpError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_env_overlay_reaches_child() {
        let mut desc = sh(
            "env",
            r#"echo "{\"result\":{\"tools\":[{\"name\":\"$TOOL_NAME\"}]}}""#,
        );
        desc.env.insert("TOOL_NAME".into(), "from_env".into());

        let tools = query_server_tools(
            &desc,
            Duration::from_secs(5),
            &RuleSet::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(tools[0].name, "from_env");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc...(truncated)");
        assert_eq!(truncate_chars("ééé", 2), "éé...(truncated)");
    }
}
