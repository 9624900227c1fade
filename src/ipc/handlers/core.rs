use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::registry::ClassRegistry;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "classCount": state.registry.as_ref().map(|r| r.len()).unwrap_or(0),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = path else {
        return err(&req.id, "bad_params", "missing params.path");
    };

    match ClassRegistry::open(&path) {
        Ok(registry) => {
            let class_count = registry.len();
            state.workspace = Some(path.clone());
            state.registry = Some(registry);
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "classCount": class_count,
                }),
            )
        }
        Err(e) => err(&req.id, "load_failed", format!("{e:#}")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
