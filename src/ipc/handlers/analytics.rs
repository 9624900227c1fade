use crate::calc;
use crate::dataset::ClassDataset;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key)))
}

fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
}

fn optional_f64(req: &Request, key: &str, default: f64) -> Result<f64, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be a number", key))),
    }
}

fn optional_usize(req: &Request, key: &str, default: usize) -> Result<usize, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| {
                err(
                    &req.id,
                    "bad_params",
                    format!("{} must be a non-negative integer", key),
                )
            }),
    }
}

/// Every analytics query names its class explicitly; there is no implicit
/// "active" dataset.
fn dataset<'a>(state: &'a AppState, req: &Request) -> Result<&'a ClassDataset, serde_json::Value> {
    let registry = state
        .registry
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first"))?;
    let class = required_str(req, "class")?;
    registry
        .get(&class)
        .ok_or_else(|| err(&req.id, "not_found", format!("class '{}' not found", class)))
}

fn to_json(value: impl serde::Serialize) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn handle_student_average(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match dataset(state, req) {
        Ok(ds) => ds,
        Err(resp) => return resp,
    };
    let student = match required_str(req, "student") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let discipline = optional_str(req, "discipline");
    let average = calc::student_average(ds, &student, discipline.as_deref());
    ok(
        &req.id,
        json!({
            "student": student,
            "discipline": discipline,
            "average": average,
        }),
    )
}

fn handle_discipline_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match dataset(state, req) {
        Ok(ds) => ds,
        Err(resp) => return resp,
    };
    let discipline = match required_str(req, "discipline") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let stats = calc::discipline_stats(ds, &discipline);
    ok(
        &req.id,
        json!({ "discipline": discipline, "stats": to_json(stats) }),
    )
}

fn handle_struggling(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match dataset(state, req) {
        Ok(ds) => ds,
        Err(resp) => return resp,
    };
    let threshold = match optional_f64(req, "threshold", calc::DEFAULT_STRUGGLING_THRESHOLD) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({
            "threshold": threshold,
            "disciplines": to_json(calc::struggling_students(ds, threshold)),
        }),
    )
}

fn handle_top_students(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match dataset(state, req) {
        Ok(ds) => ds,
        Err(resp) => return resp,
    };
    let threshold = match optional_f64(req, "threshold", calc::DEFAULT_TOP_THRESHOLD) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({
            "threshold": threshold,
            "disciplines": to_json(calc::top_students(ds, threshold)),
        }),
    )
}

fn handle_attention(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match dataset(state, req) {
        Ok(ds) => ds,
        Err(resp) => return resp,
    };
    let min_failing = match optional_usize(req, "minFailing", calc::DEFAULT_MIN_FAILING) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let recovery_threshold = match optional_f64(
        req,
        "recoveryThreshold",
        calc::DEFAULT_RECOVERY_THRESHOLD,
    ) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let students = calc::attention_needed(ds, min_failing, recovery_threshold);
    ok(
        &req.id,
        json!({ "count": students.len(), "students": to_json(students) }),
    )
}

fn handle_difficulty_ranking(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match dataset(state, req) {
        Ok(ds) => ds,
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({ "ranking": to_json(calc::difficulty_ranking(ds)) }),
    )
}

fn handle_student_ranking(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match dataset(state, req) {
        Ok(ds) => ds,
        Err(resp) => return resp,
    };
    let limit = match optional_usize(req, "limit", calc::DEFAULT_RANKING_LIMIT) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({ "limit": limit, "ranking": to_json(calc::student_ranking(ds, limit)) }),
    )
}

fn handle_term_progress(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match dataset(state, req) {
        Ok(ds) => ds,
        Err(resp) => return resp,
    };
    ok(&req.id, to_json(calc::term_progress(ds)))
}

fn handle_class_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match dataset(state, req) {
        Ok(ds) => ds,
        Err(resp) => return resp,
    };
    ok(&req.id, to_json(calc::class_report(ds)))
}

fn handle_term_performance(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match dataset(state, req) {
        Ok(ds) => ds,
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({ "disciplines": to_json(calc::term_performance(ds)) }),
    )
}

fn handle_discipline_detail(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match dataset(state, req) {
        Ok(ds) => ds,
        Err(resp) => return resp,
    };
    let discipline = match required_str(req, "discipline") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match calc::discipline_detail(ds, &discipline) {
        Ok(detail) => ok(&req.id, to_json(detail)),
        Err(e) => err(&req.id, &e.code, e.message),
    }
}

fn handle_student_detail(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match dataset(state, req) {
        Ok(ds) => ds,
        Err(resp) => return resp,
    };
    let student = match required_str(req, "student") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let discipline = optional_str(req, "discipline");
    match calc::student_detail(ds, &student, discipline.as_deref()) {
        Ok(detail) => ok(&req.id, to_json(detail)),
        Err(e) => err(&req.id, &e.code, e.message),
    }
}

fn handle_chart_data(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match dataset(state, req) {
        Ok(ds) => ds,
        Err(resp) => return resp,
    };
    ok(&req.id, to_json(calc::chart_data(ds)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.studentAverage" => Some(handle_student_average(state, req)),
        "analytics.disciplineStats" => Some(handle_discipline_stats(state, req)),
        "analytics.struggling" => Some(handle_struggling(state, req)),
        "analytics.topStudents" => Some(handle_top_students(state, req)),
        "analytics.attention" => Some(handle_attention(state, req)),
        "analytics.difficultyRanking" => Some(handle_difficulty_ranking(state, req)),
        "analytics.studentRanking" => Some(handle_student_ranking(state, req)),
        "analytics.termProgress" => Some(handle_term_progress(state, req)),
        "analytics.classReport" => Some(handle_class_report(state, req)),
        "analytics.termPerformance" => Some(handle_term_performance(state, req)),
        "analytics.disciplineDetail" => Some(handle_discipline_detail(state, req)),
        "analytics.studentDetail" => Some(handle_student_detail(state, req)),
        "analytics.chartData" => Some(handle_chart_data(state, req)),
        _ => None,
    }
}
