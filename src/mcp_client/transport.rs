//! Line-delimited JSON-RPC framing.
//!
//! The query protocol is one request line in, any number of JSON lines out:
//! - The request is serialized compactly and terminated by `\n`
//! - Each stdout line is parsed on its own; lines that aren't JSON (server
//!   log output, banners) are skipped
//! - Every message carrying a `result.tools` array contributes its entries

use super::errors::McpError;
use super::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RawToolDefinition};

/// Serialize a request as a single newline-terminated line.
pub fn encode_request_line(request: &JsonRpcRequest) -> Result<String, McpError> {
    let mut line = serde_json::to_string(request).map_err(|e| McpError::TransportError {
        server: String::new(),
        reason: format!("failed to serialize request: {e}"),
    })?;
    line.push('\n');
    Ok(line)
}

/// Result of scanning a server's stdout.
#[derive(Debug, Default)]
pub struct ToolListing {
    /// Tool entries in upstream order, across all listing messages.
    pub tools: Vec<RawToolDefinition>,
    /// How many messages carried a `result.tools` array.
    pub listing_messages: usize,
    /// Lines that were not valid JSON.
    pub skipped_lines: usize,
    /// JSON-RPC error objects the server answered with, in output order.
    pub rpc_errors: Vec<JsonRpcError>,
}

/// Parse every stdout line independently and collect the tool listings.
///
/// Individual tool entries that don't deserialize (e.g. missing `name`) are
/// dropped; the rest of the listing survives.
pub fn parse_tool_listing(stdout: &str) -> ToolListing {
    let mut listing = ToolListing::default();

    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let message = match serde_json::from_str::<JsonRpcResponse>(trimmed) {
            Ok(message) => message,
            Err(_) => {
                listing.skipped_lines += 1;
                continue;
            }
        };

        if let Some(error) = message.error.clone() {
            listing.rpc_errors.push(error);
        }

        let Some(entries) = message
            .result
            .as_ref()
            .and_then(|r| r.get("tools"))
            .and_then(|t| t.as_array())
        else {
            continue;
        };

        listing.listing_messages += 1;
        for entry in entries {
            match serde_json::from_value::<RawToolDefinition>(entry.clone()) {
                Ok(tool) => listing.tools.push(tool),
                Err(e) => {
                    tracing::debug!(error = %e, "dropping malformed tool entry");
                }
            }
        }
    }

    listing
}

// ─── Tests ───────────────────────────────────────────────────────────────────
