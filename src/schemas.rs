//! Request schema table.
//!
//! Each request the planner accepts has a closed [`SchemaId`]. The JSON
//! Schema document for it, and its required fields, come from one static
//! table keyed by that id.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Identifier of a request schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaId {
    DiscoverServers,
    ListTools,
    GenerateRoutes,
    AnalyzeWorkflow,
    HealthCheck,
}

impl SchemaId {
    pub const ALL: [SchemaId; 5] = [
        Self::DiscoverServers,
        Self::ListTools,
        Self::GenerateRoutes,
        Self::AnalyzeWorkflow,
        Self::HealthCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        entry(*self).id
    }
}

impl FromStr for SchemaId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SCHEMA_TABLE
            .iter()
            .find(|e| e.id == s)
            .map(|e| e.schema)
            .ok_or_else(|| format!("unknown schema id '{s}'"))
    }
}

impl std::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Table ───────────────────────────────────────────────────────────────────

struct Property {
    name: &'static str,
    kind: &'static str,
    description: &'static str,
}

struct SchemaEntry {
    schema: SchemaId,
    id: &'static str,
    description: &'static str,
    properties: &'static [Property],
    required: &'static [&'static str],
}

const CRITERIA: Property = Property {
    name: "criteria",
    kind: "object",
    description: "Optimization criteria (priorities, limits, required and excluded tools)",
};

const SCHEMA_TABLE: &[SchemaEntry] = &[
    SchemaEntry {
        schema: SchemaId::DiscoverServers,
        id: "discover_servers",
        description: "Re-run server discovery and tool analysis",
        properties: &[],
        required: &[],
    },
    SchemaEntry {
        schema: SchemaId::ListTools,
        id: "list_tools",
        description: "List discovered tools, optionally by category or server",
        properties: &[
            Property {
                name: "category",
                kind: "string",
                description: "Only tools in this category",
            },
            Property {
                name: "server",
                kind: "string",
                description: "Only tools of this server",
            },
        ],
        required: &[],
    },
    SchemaEntry {
        schema: SchemaId::GenerateRoutes,
        id: "generate_routes",
        description: "Rank candidate tool chains for a task",
        properties: &[
            Property {
                name: "task",
                kind: "string",
                description: "What the route should accomplish",
            },
            CRITERIA,
        ],
        required: &["task"],
    },
    SchemaEntry {
        schema: SchemaId::AnalyzeWorkflow,
        id: "analyze_workflow",
        description: "Step-by-step rationale and routes for a problem",
        properties: &[
            Property {
                name: "problem",
                kind: "string",
                description: "Problem statement to analyze",
            },
            CRITERIA,
            Property {
                name: "creative",
                kind: "boolean",
                description: "Allow a longer chain of reasoning steps",
            },
            Property {
                name: "seed",
                kind: "integer",
                description: "Seed that makes the rationale reproducible",
            },
        ],
        required: &["problem"],
    },
    SchemaEntry {
        schema: SchemaId::HealthCheck,
        id: "health_check",
        description: "Report health from rolling reliability metrics",
        properties: &[],
        required: &[],
    },
];

fn entry(id: SchemaId) -> &'static SchemaEntry {
    // every variant has a row, checked by test_table_covers_every_id
    SCHEMA_TABLE
        .iter()
        .find(|e| e.schema == id)
        .unwrap_or(&SCHEMA_TABLE[0])
}

/// The JSON Schema document for a request.
pub fn schema_for(id: SchemaId) -> Value {
    let entry = entry(id);
    let properties: Map<String, Value> = entry
        .properties
        .iter()
        .map(|p| {
            (
                p.name.to_string(),
                json!({"type": p.kind, "description": p.description}),
            )
        })
        .collect();

    json!({
        "$id": entry.id,
        "description": entry.description,
        "type": "object",
        "properties": properties,
        "required": entry.required,
    })
}

/// Fields a request must carry.
pub fn required_fields(id: SchemaId) -> &'static [&'static str] {
    entry(id).required
}

// ─── Tests ───────────────────────────────────────────────────────────────────
