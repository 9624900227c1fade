mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::process::{Child, ChildStdin, ChildStdout};
use test_support::{request_err, request_ok, spawn_sidecar, temp_dir, write_class_csv};

fn sidecar_with_school() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let workspace = temp_dir("gradebookd-compare");
    write_class_csv(
        &workspace,
        "1º_info_a.csv",
        &[
            "Ana,Informática - Redes,8,,",
            "Bia,Informática - Redes,6,,",
        ],
    );
    write_class_csv(
        &workspace,
        "2º_info_b.csv",
        &[
            "Caio,Informática - Redes,4,,",
            "Dani,Informática - Redes,5,,",
        ],
    );
    write_class_csv(&workspace, "3º_agro_a.csv", &["Edu,Agropecuária - Solos,3,,"]);

    let (child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "setup",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    (child, stdin, reader)
}

#[test]
fn compare_sorts_classes_by_overall_average() {
    let (_child, mut stdin, mut reader) = sidecar_with_school();
    let report = request_ok(&mut stdin, &mut reader, "1", "compare.classes", json!({}));

    assert_eq!(report.get("classCount").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(
        report.get("bestClass").and_then(|v| v.as_str()),
        Some("1º Info A")
    );
    assert_eq!(
        report.get("worstClass").and_then(|v| v.as_str()),
        Some("3º Agro A")
    );

    let classes = report.get("classes").and_then(|v| v.as_array()).expect("classes");
    assert_eq!(classes[0].get("name").and_then(|v| v.as_str()), Some("1º Info A"));
    assert_eq!(
        classes[0].get("overallAverage").and_then(|v| v.as_f64()),
        Some(7.0)
    );
    assert_eq!(classes[0].get("approvalRate").and_then(|v| v.as_f64()), Some(100.0));
    // Both 2º Info B students sit in recovery; worst case rules them out of passing.
    assert_eq!(classes[1].get("recoveryCount").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(classes[1].get("approvalRate").and_then(|v| v.as_f64()), Some(0.0));
    assert_eq!(classes[2].get("failingCount").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(
        classes[0].get("termStatus").and_then(|v| v.as_str()),
        Some("Term 1 in progress")
    );
}

#[test]
fn compare_honors_course_and_name_filters() {
    let (_child, mut stdin, mut reader) = sidecar_with_school();
    let info = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "compare.classes",
        json!({ "course": "Informática" }),
    );
    assert_eq!(info.get("classCount").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(
        info.get("courseFilter").and_then(|v| v.as_str()),
        Some("Informática")
    );

    let named = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "compare.classes",
        json!({ "classNames": ["2º Info B"] }),
    );
    assert_eq!(named.get("classCount").and_then(|v| v.as_u64()), Some(1));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "compare.classes",
        json!({ "course": "Mecânica" }),
    );
    assert_eq!(code, "not_found");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "compare.classes",
        json!({ "classNames": [] }),
    );
    assert_eq!(code, "bad_params");
}

#[test]
fn consolidated_ranking_groups_by_bare_discipline() {
    let (_child, mut stdin, mut reader) = sidecar_with_school();
    let ranking = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "compare.difficultyRanking",
        json!({ "course": "Informática" }),
    );
    assert_eq!(ranking.get("classCount").and_then(|v| v.as_u64()), Some(2));
    let disciplines = ranking
        .get("disciplines")
        .and_then(|v| v.as_array())
        .expect("disciplines");
    assert_eq!(disciplines.len(), 1);
    let redes = &disciplines[0];
    assert_eq!(redes.get("discipline").and_then(|v| v.as_str()), Some("Redes"));
    // 0% struggling in 1º Info A, 100% in 2º Info B -> simple mean of 50%.
    assert_eq!(
        redes.get("difficultyPercent").and_then(|v| v.as_f64()),
        Some(50.0)
    );
    assert_eq!(redes.get("strugglingCount").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(redes.get("studentCount").and_then(|v| v.as_u64()), Some(4));
}

#[test]
fn school_stats_sum_outcomes_and_average_class_averages() {
    let (_child, mut stdin, mut reader) = sidecar_with_school();
    let stats = request_ok(&mut stdin, &mut reader, "1", "compare.schoolStats", json!({}));

    assert_eq!(stats.get("classCount").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(stats.get("studentCount").and_then(|v| v.as_u64()), Some(5));
    assert_eq!(stats.get("passingCount").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(stats.get("recoveryCount").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(stats.get("failingCount").and_then(|v| v.as_u64()), Some(1));
    // Mean of the class averages 7.0, 4.5 and 3.0.
    assert_eq!(stats.get("overallAverage").and_then(|v| v.as_f64()), Some(4.83));
    assert_eq!(stats.get("approvalRate").and_then(|v| v.as_f64()), Some(40.0));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "compare.schoolStats",
        json!({ "course": "Mecânica" }),
    );
    assert_eq!(code, "not_found");
}
