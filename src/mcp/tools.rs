//! MCP tool definitions for Engram

use serde_json::json;

use super::protocol::ToolDefinition;

/// All tool definitions: (name, description, input schema)
pub const TOOL_DEFINITIONS: &[(&str, &str, &str)] = &[
    (
        "mem_save",
        "Save an observation from the current session. Use for decisions, bugfixes, discoveries, patterns, and anything worth recalling later.",
        r#"{
            "type": "object",
            "properties": {
                "session_id": {"type": "string", "description": "Owning session id (default: manual-save)"},
                "type": {"type": "string", "description": "Observation type, e.g. decision, architecture, bugfix, pattern, config, discovery, manual"},
                "title": {"type": "string", "description": "Short title"},
                "content": {"type": "string", "description": "What happened. <private>...</private> spans are redacted before storage."},
                "tool_name": {"type": "string", "description": "Tool that produced the observation, if any"},
                "project": {"type": "string", "description": "Project name for filtering"}
            },
            "required": ["title", "content"]
        }"#,
    ),
    (
        "mem_save_prompt",
        "Record a user prompt verbatim, separate from observations.",
        r#"{
            "type": "object",
            "properties": {
                "session_id": {"type": "string", "description": "Owning session id"},
                "content": {"type": "string", "description": "The user's message"},
                "project": {"type": "string", "description": "Project name for filtering"}
            },
            "required": ["session_id", "content"]
        }"#,
    ),
    (
        "mem_session_start",
        "Register the start of a session. Idempotent: repeated calls with the same id are no-ops.",
        r#"{
            "type": "object",
            "properties": {
                "session_id": {"type": "string", "description": "Caller-supplied session id"},
                "project": {"type": "string", "description": "Project name"},
                "directory": {"type": "string", "description": "Working directory"}
            },
            "required": ["session_id"]
        }"#,
    ),
    (
        "mem_session_end",
        "Mark a session as ended and record its summary.",
        r#"{
            "type": "object",
            "properties": {
                "session_id": {"type": "string", "description": "Session id"},
                "summary": {"type": "string", "description": "What the session accomplished"}
            },
            "required": ["session_id"]
        }"#,
    ),
    (
        "mem_session_summary",
        "Save a mid-session summary as an observation of type 'session' without ending the session.",
        r#"{
            "type": "object",
            "properties": {
                "session_id": {"type": "string", "description": "Session id"},
                "summary": {"type": "string", "description": "Summary text"},
                "project": {"type": "string", "description": "Project name for filtering"}
            },
            "required": ["session_id", "summary"]
        }"#,
    ),
    (
        "mem_search",
        "Full-text search over observations. Tokens are matched literally and ANDed; results are ranked by relevance.",
        r#"{
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Free-text query"},
                "type": {"type": "string", "description": "Filter by observation type"},
                "project": {"type": "string", "description": "Filter by project"},
                "limit": {"type": "integer", "description": "Maximum results (hard-capped by the server)"}
            },
            "required": ["query"]
        }"#,
    ),
    (
        "mem_context",
        "Get a digest of recent sessions, prompts, and observations for injection into a new session.",
        r#"{
            "type": "object",
            "properties": {
                "project": {"type": "string", "description": "Limit the digest to one project"}
            }
        }"#,
    ),
    (
        "mem_timeline",
        "Show the chronological neighborhood around an observation: N before and M after within the same session.",
        r#"{
            "type": "object",
            "properties": {
                "observation_id": {"type": "integer", "description": "Pivot observation id"},
                "before": {"type": "integer", "description": "Observations before the pivot (default 5)"},
                "after": {"type": "integer", "description": "Observations after the pivot (default 5)"}
            },
            "required": ["observation_id"]
        }"#,
    ),
    (
        "mem_get_observation",
        "Fetch a single observation by id.",
        r#"{
            "type": "object",
            "properties": {
                "id": {"type": "integer", "description": "Observation id"}
            },
            "required": ["id"]
        }"#,
    ),
    (
        "mem_stats",
        "Memory system statistics: session, observation, and prompt counts plus known projects.",
        r#"{
            "type": "object",
            "properties": {}
        }"#,
    ),
];

/// Parsed tool definitions for tools/list
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    TOOL_DEFINITIONS
        .iter()
        .map(|(name, description, schema)| ToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: serde_json::from_str(schema).unwrap_or_else(|_| json!({"type": "object"})),
        })
        .collect()
}
