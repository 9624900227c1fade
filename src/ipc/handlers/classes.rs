use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::registry::{course_of, ClassRegistry};
use serde_json::json;
use std::path::PathBuf;

fn registry_mut<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut ClassRegistry, serde_json::Value> {
    state
        .registry
        .as_mut()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first"))
}

fn required_name(req: &Request) -> Result<String, serde_json::Value> {
    let name = req
        .params
        .get("name")
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string());
    match name {
        Some(n) if !n.is_empty() => Ok(n),
        _ => Err(err(&req.id, "bad_params", "missing name")),
    }
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(registry) = state.registry.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };

    let classes: Vec<serde_json::Value> = registry
        .iter()
        .map(|(name, ds)| {
            json!({
                "name": name,
                "course": course_of(name),
                "studentCount": ds.students().len(),
                "disciplineCount": ds.disciplines().len(),
            })
        })
        .collect();

    ok(&req.id, json!({ "classes": classes }))
}

fn handle_classes_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match required_name(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let source_path = match req.params.get("sourcePath").and_then(|v| v.as_str()) {
        Some(v) => PathBuf::from(v),
        None => return err(&req.id, "bad_params", "missing sourcePath"),
    };
    let registry = match registry_mut(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match registry.add(&name, &source_path) {
        Ok(ds) => {
            let student_count = ds.students().len();
            let discipline_count = ds.disciplines().len();
            ok(
                &req.id,
                json!({
                    "name": name.clone(),
                    "course": course_of(&name),
                    "studentCount": student_count,
                    "disciplineCount": discipline_count,
                }),
            )
        }
        Err(e) => err(&req.id, "load_failed", format!("{e:#}")),
    }
}

fn handle_classes_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match required_name(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let registry = match registry_mut(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match registry.remove(&name) {
        Ok(true) => ok(&req.id, json!({ "removed": name })),
        Ok(false) => err(&req.id, "not_found", format!("class '{}' not found", name)),
        Err(e) => err(&req.id, "remove_failed", format!("{e:#}")),
    }
}

fn handle_classes_reload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let registry = match registry_mut(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match registry.reload() {
        Ok(()) => ok(&req.id, json!({ "classCount": registry.len() })),
        Err(e) => err(&req.id, "load_failed", format!("{e:#}")),
    }
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(registry) = state.registry.as_ref() else {
        return ok(&req.id, json!({ "courses": [] }));
    };
    ok(&req.id, json!({ "courses": registry.courses() }))
}

fn handle_courses_classes(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(registry) = state.registry.as_ref() else {
        return ok(&req.id, json!({ "groups": [] }));
    };
    let course = req.params.get("course").and_then(|v| v.as_str());
    let groups = registry.classes_by_course(course);
    ok(&req.id, json!({ "groups": groups }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.add" => Some(handle_classes_add(state, req)),
        "classes.remove" => Some(handle_classes_remove(state, req)),
        "classes.reload" => Some(handle_classes_reload(state, req)),
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.classes" => Some(handle_courses_classes(state, req)),
        _ => None,
    }
}
