//! Tool dispatch onto the store
//!
//! Pure parameter binding: every tool resolves to one or two store calls.
//! Failures come back as {"error": ...} JSON so agent hosts can keep
//! going when a call is malformed.

use serde_json::{json, Value};

use crate::redact::strip_private_tags;
use crate::storage::{
    add_observation, add_prompt, create_session, end_session, format_context, get_observation,
    search, stats, timeline, Storage,
};
use crate::types::{classify_tool, AddObservationParams, AddPromptParams, SearchOptions};

use super::protocol::{
    methods, InitializeResult, McpHandler, McpRequest, McpResponse, ToolCallResult,
};
use super::tools::get_tool_definitions;

/// Session id used when an agent saves outside a tracked session
const MANUAL_SESSION: &str = "manual-save";

/// MCP request handler backed by the store
pub struct EngramHandler {
    storage: Storage,
}

impl EngramHandler {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn handle_tool_call(&self, name: &str, params: Value) -> Value {
        match name {
            "mem_save" => self.tool_mem_save(params),
            "mem_save_prompt" => self.tool_mem_save_prompt(params),
            "mem_session_start" => self.tool_mem_session_start(params),
            "mem_session_end" => self.tool_mem_session_end(params),
            "mem_session_summary" => self.tool_mem_session_summary(params),
            "mem_search" => self.tool_mem_search(params),
            "mem_context" => self.tool_mem_context(params),
            "mem_timeline" => self.tool_mem_timeline(params),
            "mem_get_observation" => self.tool_mem_get_observation(params),
            "mem_stats" => self.tool_mem_stats(params),
            _ => json!({"error": format!("Unknown tool: {}", name)}),
        }
    }

    fn tool_mem_save(&self, params: Value) -> Value {
        let session_id = str_param(&params, "session_id").unwrap_or(MANUAL_SESSION.to_string());
        let title = match str_param(&params, "title") {
            Some(t) => t,
            None => return json!({"error": "title is required"}),
        };
        let content = match str_param(&params, "content") {
            Some(c) => c,
            None => return json!({"error": "content is required"}),
        };
        let tool_name = str_param(&params, "tool_name");
        let project = str_param(&params, "project");

        // Default the type from the tool that produced the observation.
        let observation_type = str_param(&params, "type").unwrap_or_else(|| {
            tool_name
                .as_deref()
                .map(classify_tool)
                .unwrap_or("manual")
                .to_string()
        });

        let input = AddObservationParams {
            session_id: session_id.clone(),
            observation_type,
            title: strip_private_tags(&title),
            content: strip_private_tags(&content),
            tool_name,
            project: project.clone(),
        };

        self.storage
            .with_connection(|conn| {
                create_session(conn, &session_id, project.as_deref().unwrap_or(""), "")?;
                let id = add_observation(conn, self.storage.config(), &input)?;
                Ok(json!({"id": id, "title": input.title}))
            })
            .unwrap_or_else(|e| json!({"error": e.to_string()}))
    }

    fn tool_mem_save_prompt(&self, params: Value) -> Value {
        let session_id = match str_param(&params, "session_id") {
            Some(s) => s,
            None => return json!({"error": "session_id is required"}),
        };
        let content = match str_param(&params, "content") {
            Some(c) => c,
            None => return json!({"error": "content is required"}),
        };
        let project = str_param(&params, "project");

        let input = AddPromptParams {
            session_id: session_id.clone(),
            content: strip_private_tags(&content),
            project: project.clone(),
        };

        self.storage
            .with_connection(|conn| {
                create_session(conn, &session_id, project.as_deref().unwrap_or(""), "")?;
                let id = add_prompt(conn, self.storage.config(), &input)?;
                Ok(json!({"id": id}))
            })
            .unwrap_or_else(|e| json!({"error": e.to_string()}))
    }

    fn tool_mem_session_start(&self, params: Value) -> Value {
        let session_id = match str_param(&params, "session_id") {
            Some(s) => s,
            None => return json!({"error": "session_id is required"}),
        };
        let project = str_param(&params, "project").unwrap_or_default();
        let directory = str_param(&params, "directory").unwrap_or_default();

        self.storage
            .with_connection(|conn| {
                create_session(conn, &session_id, &project, &directory)?;
                Ok(json!({"session_id": session_id}))
            })
            .unwrap_or_else(|e| json!({"error": e.to_string()}))
    }

    fn tool_mem_session_end(&self, params: Value) -> Value {
        let session_id = match str_param(&params, "session_id") {
            Some(s) => s,
            None => return json!({"error": "session_id is required"}),
        };
        let summary = str_param(&params, "summary")
            .map(|s| strip_private_tags(&s))
            .unwrap_or_default();

        self.storage
            .with_connection(|conn| {
                end_session(conn, &session_id, &summary)?;
                Ok(json!({"session_id": session_id, "ended": true}))
            })
            .unwrap_or_else(|e| json!({"error": e.to_string()}))
    }

    fn tool_mem_session_summary(&self, params: Value) -> Value {
        let session_id = match str_param(&params, "session_id") {
            Some(s) => s,
            None => return json!({"error": "session_id is required"}),
        };
        let summary = match str_param(&params, "summary") {
            Some(s) => s,
            None => return json!({"error": "summary is required"}),
        };
        let project = str_param(&params, "project");

        let input = AddObservationParams {
            session_id: session_id.clone(),
            observation_type: "session".to_string(),
            title: "Session summary".to_string(),
            content: strip_private_tags(&summary),
            tool_name: None,
            project: project.clone(),
        };

        self.storage
            .with_connection(|conn| {
                create_session(conn, &session_id, project.as_deref().unwrap_or(""), "")?;
                let id = add_observation(conn, self.storage.config(), &input)?;
                Ok(json!({"id": id}))
            })
            .unwrap_or_else(|e| json!({"error": e.to_string()}))
    }

    fn tool_mem_search(&self, params: Value) -> Value {
        let query = match str_param(&params, "query") {
            Some(q) => q,
            None => return json!({"error": "query is required"}),
        };
        let opts = SearchOptions {
            observation_type: str_param(&params, "type"),
            project: str_param(&params, "project"),
            limit: params.get("limit").and_then(|v| v.as_i64()),
        };

        self.storage
            .with_connection(|conn| {
                let results = search(conn, self.storage.config(), &query, &opts)?;
                Ok(json!({"count": results.len(), "results": results}))
            })
            .unwrap_or_else(|e| json!({"error": e.to_string()}))
    }

    fn tool_mem_context(&self, params: Value) -> Value {
        let project = str_param(&params, "project");

        self.storage
            .with_connection(|conn| {
                let context =
                    format_context(conn, self.storage.config(), project.as_deref())?;
                Ok(json!({"context": context}))
            })
            .unwrap_or_else(|e| json!({"error": e.to_string()}))
    }

    fn tool_mem_timeline(&self, params: Value) -> Value {
        let observation_id = match params.get("observation_id").and_then(|v| v.as_i64()) {
            Some(id) => id,
            None => return json!({"error": "observation_id is required"}),
        };
        let before = params.get("before").and_then(|v| v.as_i64()).unwrap_or(0);
        let after = params.get("after").and_then(|v| v.as_i64()).unwrap_or(0);

        self.storage
            .with_connection(|conn| {
                let result = timeline(conn, observation_id, before, after)?;
                Ok(json!(result))
            })
            .unwrap_or_else(|e| json!({"error": e.to_string()}))
    }

    fn tool_mem_get_observation(&self, params: Value) -> Value {
        let id = match params.get("id").and_then(|v| v.as_i64()) {
            Some(id) => id,
            None => return json!({"error": "id is required"}),
        };

        self.storage
            .with_connection(|conn| {
                let obs = get_observation(conn, id)?;
                Ok(json!(obs))
            })
            .unwrap_or_else(|e| json!({"error": e.to_string()}))
    }

    fn tool_mem_stats(&self, _params: Value) -> Value {
        self.storage
            .with_connection(|conn| {
                let s = stats(conn)?;
                Ok(json!(s))
            })
            .unwrap_or_else(|e| json!({"error": e.to_string()}))
    }
}

impl McpHandler for EngramHandler {
    fn handle_request(&self, request: McpRequest) -> McpResponse {
        match request.method.as_str() {
            methods::INITIALIZE => {
                let result = InitializeResult::default();
                McpResponse::success(request.id, json!(result))
            }
            methods::INITIALIZED => McpResponse::success(request.id, json!({})),
            methods::LIST_TOOLS => {
                let tools = get_tool_definitions();
                McpResponse::success(request.id, json!({"tools": tools}))
            }
            methods::CALL_TOOL => {
                let name = request
                    .params
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                let arguments = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or(json!({}));

                let result = self.handle_tool_call(name, arguments);
                let tool_result = ToolCallResult::json(&result);
                McpResponse::success(request.id, json!(tool_result))
            }
            _ => McpResponse::error(
                request.id,
                -32601,
                format!("Method not found: {}", request.method),
            ),
        }
    }
}

fn str_param(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}
