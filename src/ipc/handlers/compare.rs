use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::registry::ClassRegistry;
use std::collections::HashSet;

fn registry<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a ClassRegistry, serde_json::Value> {
    state
        .registry
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first"))
}

fn parse_course(req: &Request) -> Option<String> {
    req.params
        .get("course")
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_class_names(req: &Request) -> Result<Option<Vec<String>>, serde_json::Value> {
    let Some(raw) = req.params.get("classNames") else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    let Some(arr) = raw.as_array() else {
        return Err(err(
            &req.id,
            "bad_params",
            "classNames must be an array of strings",
        ));
    };

    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for v in arr {
        let Some(name) = v.as_str() else {
            return Err(err(
                &req.id,
                "bad_params",
                "classNames must contain only strings",
            ));
        };
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(err(
                &req.id,
                "bad_params",
                "classNames must not contain empty names",
            ));
        }
        let owned = trimmed.to_string();
        if seen.insert(owned.clone()) {
            out.push(owned);
        }
    }
    if out.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            "classNames must contain at least one class name",
        ));
    }
    Ok(Some(out))
}

fn to_json(value: impl serde::Serialize) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn handle_compare_classes(state: &mut AppState, req: &Request) -> serde_json::Value {
    let registry = match registry(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let course = parse_course(req);
    let names = match parse_class_names(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match registry.compare(course.as_deref(), names.as_deref()) {
        Ok(report) => ok(&req.id, to_json(report)),
        Err(e) => err(&req.id, &e.code, e.message),
    }
}

fn handle_compare_difficulty(state: &mut AppState, req: &Request) -> serde_json::Value {
    let registry = match registry(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let course = parse_course(req);
    let names = match parse_class_names(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let ranking = registry.consolidated_difficulty_ranking(course.as_deref(), names.as_deref());
    ok(&req.id, to_json(ranking))
}

fn handle_compare_school_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let registry = match registry(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let course = parse_course(req);
    let names = match parse_class_names(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match registry.school_stats(course.as_deref(), names.as_deref()) {
        Ok(stats) => ok(&req.id, to_json(stats)),
        Err(e) => err(&req.id, &e.code, e.message),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "compare.classes" => Some(handle_compare_classes(state, req)),
        "compare.difficultyRanking" => Some(handle_compare_difficulty(state, req)),
        "compare.schoolStats" => Some(handle_compare_school_stats(state, req)),
        _ => None,
    }
}
