use crate::dataset::{bare_discipline, present, ClassDataset};
use serde::Serialize;
use std::cmp::Ordering;

pub const DEFAULT_STRUGGLING_THRESHOLD: f64 = 6.0;
pub const DEFAULT_TOP_THRESHOLD: f64 = 8.0;
pub const DEFAULT_MIN_FAILING: usize = 3;
pub const DEFAULT_RECOVERY_THRESHOLD: f64 = 6.0;
pub const DEFAULT_RANKING_LIMIT: usize = 10;

/// Approval boundaries on the [0,10] score scale: passing at or above 6,
/// recovery at or above 4, failing below that.
pub const PASSING_MIN: f64 = 6.0;
pub const RECOVERY_MIN: f64 = 4.0;

#[derive(Debug, Clone, Serialize)]
pub struct QueryError {
    pub code: String,
    pub message: String,
}

impl QueryError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }
}

pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn compute_median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    }
}

fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn status_label(average: f64) -> &'static str {
    if average >= PASSING_MIN {
        "Passing"
    } else if average >= RECOVERY_MIN {
        "Recovery"
    } else {
        "Failing"
    }
}

/// Mean of every present score the student has, optionally restricted to one
/// discipline. Returns 0.0 when no matching record or no present score exists;
/// that value is ambiguous with a true zero average and stays that way.
pub fn student_average(ds: &ClassDataset, student: &str, discipline: Option<&str>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;

    match discipline {
        Some(d) => {
            if let Some(rec) = ds.record(student, d) {
                for v in rec.present_scores() {
                    sum += v;
                    count += 1;
                }
            }
        }
        None => {
            for rec in ds.student_records(student) {
                for v in rec.present_scores() {
                    sum += v;
                    count += 1;
                }
            }
        }
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisciplineStats {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub max: f64,
    pub min: f64,
    pub count: usize,
}

/// Summary statistics over the per-student averages within one discipline.
/// Students with no present score in the discipline are excluded; an empty
/// selection yields the all-zero struct.
pub fn discipline_stats(ds: &ClassDataset, discipline: &str) -> DisciplineStats {
    let mut averages: Vec<f64> = Vec::new();
    for rec in ds.discipline_records(discipline) {
        let scores: Vec<f64> = rec.present_scores().collect();
        if scores.is_empty() {
            continue;
        }
        averages.push(mean(&scores));
    }

    if averages.is_empty() {
        return DisciplineStats::default();
    }

    let max = averages
        .iter()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max);
    let min = averages.iter().cloned().fold(f64::INFINITY, f64::min);

    DisciplineStats {
        mean: mean(&averages),
        median: compute_median(&averages),
        std_dev: population_std_dev(&averages),
        max,
        min,
        count: averages.len(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisciplineStudents {
    pub discipline: String,
    pub students: Vec<String>,
}

fn students_by_average<F>(ds: &ClassDataset, keep: F) -> Vec<DisciplineStudents>
where
    F: Fn(f64) -> bool,
{
    ds.disciplines()
        .iter()
        .map(|discipline| {
            let mut students: Vec<String> = Vec::new();
            for rec in ds.discipline_records(discipline) {
                let scores: Vec<f64> = rec.present_scores().collect();
                if scores.is_empty() {
                    continue;
                }
                if keep(mean(&scores)) {
                    students.push(rec.student.clone());
                }
            }
            DisciplineStudents {
                discipline: discipline.clone(),
                students,
            }
        })
        .collect()
}

/// Per discipline, the students (with at least one present score) averaging
/// below `threshold`.
pub fn struggling_students(ds: &ClassDataset, threshold: f64) -> Vec<DisciplineStudents> {
    students_by_average(ds, |avg| avg < threshold)
}

/// Per discipline, the students (with at least one present score) averaging
/// at or above `threshold`.
pub fn top_students(ds: &ClassDataset, threshold: f64) -> Vec<DisciplineStudents> {
    students_by_average(ds, |avg| avg >= threshold)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
    Critical,
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionStudent {
    pub name: String,
    pub overall_average: f64,
    pub failing: Vec<String>,
    pub recovery: Vec<String>,
    pub passing: Vec<String>,
    pub failing_count: usize,
    pub recovery_count: usize,
    pub passing_count: usize,
    pub problem_count: usize,
    pub priority: Priority,
}

/// Cross-discipline triage. Each discipline is classified by the student's
/// average there: failing below 4, recovery up to `recovery_threshold`,
/// passing otherwise. Disciplines with no data contribute a 0.0 average to
/// the overall mean (and therefore land in the failing list).
pub fn attention_needed(
    ds: &ClassDataset,
    min_failing: usize,
    recovery_threshold: f64,
) -> Vec<AttentionStudent> {
    let disciplines = ds.disciplines();
    let mut flagged: Vec<AttentionStudent> = Vec::new();

    for student in ds.students() {
        let mut failing: Vec<String> = Vec::new();
        let mut recovery: Vec<String> = Vec::new();
        let mut passing: Vec<String> = Vec::new();
        let mut total = 0.0;

        for discipline in disciplines {
            let avg = student_average(ds, student, Some(discipline.as_str()));
            total += avg;
            let bare = bare_discipline(discipline).to_string();
            if avg < RECOVERY_MIN {
                failing.push(bare);
            } else if avg < recovery_threshold {
                recovery.push(bare);
            } else {
                passing.push(bare);
            }
        }

        let overall = if disciplines.is_empty() {
            0.0
        } else {
            total / disciplines.len() as f64
        };
        let problem_count = failing.len() + recovery.len();

        let needs_attention = failing.len() >= min_failing
            || problem_count >= min_failing
            || overall < 5.0;
        if !needs_attention {
            continue;
        }

        let priority = if failing.len() >= 5 || overall < 4.0 {
            Priority::Critical
        } else if failing.len() >= 3 || overall < 5.0 {
            Priority::High
        } else {
            Priority::Medium
        };

        flagged.push(AttentionStudent {
            name: student.clone(),
            overall_average: round2(overall),
            failing_count: failing.len(),
            recovery_count: recovery.len(),
            passing_count: passing.len(),
            problem_count,
            failing,
            recovery,
            passing,
            priority,
        });
    }

    flagged.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
    flagged
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyEntry {
    pub discipline: String,
    pub percent: f64,
    pub struggling_count: usize,
}

/// Disciplines ranked hardest-first by the share of struggling students.
/// The sort is stable; ties keep the dataset's discipline order.
pub fn difficulty_ranking(ds: &ClassDataset) -> Vec<DifficultyEntry> {
    let struggling = struggling_students(ds, DEFAULT_STRUGGLING_THRESHOLD);
    let mut out: Vec<DifficultyEntry> = Vec::with_capacity(struggling.len());

    for entry in struggling {
        let total = ds.discipline_records(&entry.discipline).count();
        let struggling_count = entry.students.len();
        let percent = if total > 0 {
            struggling_count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        out.push(DifficultyEntry {
            discipline: entry.discipline,
            percent,
            struggling_count,
        });
    }

    out.sort_by(|a, b| b.percent.partial_cmp(&a.percent).unwrap_or(Ordering::Equal));
    out
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisciplineAverage {
    pub name: String,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    pub position: usize,
    pub name: String,
    pub overall_average: f64,
    pub disciplines: Vec<DisciplineAverage>,
    pub discipline_count: usize,
    pub passing_count: usize,
    pub recovery_count: usize,
    pub failing_count: usize,
    pub best_discipline: Option<String>,
    pub best_average: f64,
    pub worst_discipline: Option<String>,
    pub worst_average: f64,
}

/// Students ranked by overall average, best first, truncated to `limit`.
/// A student's overall average spreads their per-discipline averages over the
/// full discipline count, so missing data drags the ranking down.
pub fn student_ranking(ds: &ClassDataset, limit: usize) -> Vec<RankedStudent> {
    let disciplines = ds.disciplines();
    let mut ranked: Vec<RankedStudent> = Vec::new();

    for student in ds.students() {
        let mut info: Vec<DisciplineAverage> = Vec::with_capacity(disciplines.len());
        let mut total = 0.0;
        let mut passing_count = 0usize;
        let mut recovery_count = 0usize;
        let mut failing_count = 0usize;

        for discipline in disciplines {
            let avg = student_average(ds, student, Some(discipline.as_str()));
            total += avg;
            info.push(DisciplineAverage {
                name: bare_discipline(discipline).to_string(),
                average: round2(avg),
            });
            if avg >= PASSING_MIN {
                passing_count += 1;
            } else if avg >= RECOVERY_MIN {
                recovery_count += 1;
            } else {
                failing_count += 1;
            }
        }

        let overall = if disciplines.is_empty() {
            0.0
        } else {
            total / disciplines.len() as f64
        };

        info.sort_by(|a, b| b.average.partial_cmp(&a.average).unwrap_or(Ordering::Equal));

        ranked.push(RankedStudent {
            position: 0,
            name: student.clone(),
            overall_average: round2(overall),
            discipline_count: disciplines.len(),
            passing_count,
            recovery_count,
            failing_count,
            best_discipline: info.first().map(|d| d.name.clone()),
            best_average: info.first().map(|d| d.average).unwrap_or(0.0),
            worst_discipline: info.last().map(|d| d.name.clone()),
            worst_average: info.last().map(|d| d.average).unwrap_or(0.0),
            disciplines: info,
        });
    }

    ranked.sort_by(|a, b| {
        b.overall_average
            .partial_cmp(&a.overall_average)
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(limit);
    for (i, student) in ranked.iter_mut().enumerate() {
        student.position = i + 1;
    }
    ranked
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermProgress {
    pub current_term: u8,
    pub status: String,
    pub completed_terms: Vec<u8>,
    pub percentages: [f64; 3],
}

/// Infers the active grading term from data completeness: a term is complete
/// when more than 80% of the records carry a present score in it. With no
/// complete term (including the empty dataset) the year defaults to term 1.
pub fn term_progress(ds: &ClassDataset) -> TermProgress {
    let total = ds.records().len();
    let mut filled = [0usize; 3];
    for rec in ds.records() {
        for (slot, value) in rec.terms.iter().enumerate() {
            if present(*value).is_some() {
                filled[slot] += 1;
            }
        }
    }

    let mut percentages = [0.0f64; 3];
    for slot in 0..3 {
        percentages[slot] = if total > 0 {
            round1(filled[slot] as f64 / total as f64 * 100.0)
        } else {
            0.0
        };
    }

    let completed_terms: Vec<u8> = (0..3u8)
        .filter(|&slot| percentages[slot as usize] > 80.0)
        .map(|slot| slot + 1)
        .collect();

    let (current_term, status) = if completed_terms.contains(&3) {
        (3, "Year Complete")
    } else if completed_terms.contains(&2) {
        (2, "Term 2 in progress")
    } else {
        (1, "Term 1 in progress")
    };

    TermProgress {
        current_term,
        status: status.to_string(),
        completed_terms,
        percentages,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassReport {
    pub student_count: usize,
    pub discipline_count: usize,
    pub overall_average: f64,
    pub struggling_total: usize,
    pub struggling_percent: f64,
    pub hardest_discipline: Option<String>,
    pub easiest_discipline: Option<String>,
}

/// Whole-class roll-up. The overall average spans every student x discipline
/// cell, counting absent pairs as 0.0.
pub fn class_report(ds: &ClassDataset) -> ClassReport {
    let students = ds.students();
    let disciplines = ds.disciplines();

    let mut all_averages: Vec<f64> = Vec::with_capacity(students.len() * disciplines.len());
    for student in students {
        for discipline in disciplines {
            all_averages.push(student_average(ds, student, Some(discipline.as_str())));
        }
    }

    let struggling_total: usize = struggling_students(ds, DEFAULT_STRUGGLING_THRESHOLD)
        .iter()
        .map(|d| d.students.len())
        .sum();
    let cells = students.len() * disciplines.len();
    let struggling_percent = if cells > 0 {
        struggling_total as f64 / cells as f64 * 100.0
    } else {
        0.0
    };

    let ranking = difficulty_ranking(ds);

    ClassReport {
        student_count: students.len(),
        discipline_count: disciplines.len(),
        overall_average: mean(&all_averages),
        struggling_total,
        struggling_percent,
        hardest_discipline: ranking.first().map(|e| e.discipline.clone()),
        easiest_discipline: ranking.last().map(|e| e.discipline.clone()),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermPerformance {
    pub discipline: String,
    pub term_averages: [f64; 3],
}

/// Per discipline, the mean of present scores in each term (0.0 for a term
/// with no present score yet).
pub fn term_performance(ds: &ClassDataset) -> Vec<TermPerformance> {
    ds.disciplines()
        .iter()
        .map(|discipline| {
            let mut sums = [0.0f64; 3];
            let mut counts = [0usize; 3];
            for rec in ds.discipline_records(discipline) {
                for (slot, value) in rec.terms.iter().enumerate() {
                    if let Some(v) = present(*value) {
                        sums[slot] += v;
                        counts[slot] += 1;
                    }
                }
            }
            let mut term_averages = [0.0f64; 3];
            for slot in 0..3 {
                if counts[slot] > 0 {
                    term_averages[slot] = sums[slot] / counts[slot] as f64;
                }
            }
            TermPerformance {
                discipline: discipline.clone(),
                term_averages,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub name: String,
    pub average: f64,
    pub term_scores: [Option<f64>; 3],
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisciplineDetail {
    pub discipline: String,
    pub full_discipline: String,
    pub mean: f64,
    pub student_count: usize,
    pub passing_count: usize,
    pub recovery_count: usize,
    pub failing_count: usize,
    pub best_student: Option<StudentRow>,
    pub worst_student: Option<StudentRow>,
    pub students: Vec<StudentRow>,
}

/// Full per-student breakdown of one discipline, looked up by bare name
/// (case-insensitive). Every class student gets a row; a student with no
/// record or no present score averages 0.0 and reads as failing.
pub fn discipline_detail(ds: &ClassDataset, name: &str) -> Result<DisciplineDetail, QueryError> {
    let wanted = name.to_lowercase();
    let full = ds
        .disciplines()
        .iter()
        .find(|d| bare_discipline(d).to_lowercase() == wanted)
        .cloned()
        .ok_or_else(|| QueryError::not_found(format!("discipline '{}' not found", name)))?;

    let mut rows: Vec<StudentRow> = Vec::with_capacity(ds.students().len());
    let mut averages: Vec<f64> = Vec::with_capacity(ds.students().len());

    for student in ds.students() {
        let avg = student_average(ds, student, Some(full.as_str()));
        averages.push(avg);

        let term_scores = match ds.record(student, &full) {
            Some(rec) => [
                present(rec.terms[0]),
                present(rec.terms[1]),
                present(rec.terms[2]),
            ],
            None => [None; 3],
        };

        rows.push(StudentRow {
            name: student.clone(),
            average: round2(avg),
            term_scores,
            status: status_label(avg).to_string(),
        });
    }

    rows.sort_by(|a, b| b.average.partial_cmp(&a.average).unwrap_or(Ordering::Equal));

    let passing_count = rows.iter().filter(|r| r.status == "Passing").count();
    let recovery_count = rows.iter().filter(|r| r.status == "Recovery").count();
    let failing_count = rows.iter().filter(|r| r.status == "Failing").count();

    Ok(DisciplineDetail {
        discipline: name.to_string(),
        full_discipline: full,
        mean: round2(mean(&averages)),
        student_count: rows.len(),
        passing_count,
        recovery_count,
        failing_count,
        best_student: rows.first().cloned(),
        worst_student: rows.last().cloned(),
        students: rows,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDisciplineRow {
    pub discipline: String,
    pub term_scores: [Option<f64>; 3],
    pub average: f64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDetail {
    pub name: String,
    pub overall_average: f64,
    pub disciplines: Vec<StudentDisciplineRow>,
    pub discipline_count: usize,
    pub passing_count: usize,
    pub recovery_count: usize,
    pub failing_count: usize,
}

/// One student's breakdown across the class's disciplines, optionally
/// restricted to a single bare discipline name (case-insensitive).
pub fn student_detail(
    ds: &ClassDataset,
    student: &str,
    discipline_filter: Option<&str>,
) -> Result<StudentDetail, QueryError> {
    if !ds.contains_student(student) {
        return Err(QueryError::not_found(format!(
            "student '{}' not found",
            student
        )));
    }
    let wanted = discipline_filter.map(|f| f.to_lowercase());

    let mut rows: Vec<StudentDisciplineRow> = Vec::new();
    for discipline in ds.disciplines() {
        let bare = bare_discipline(discipline);
        if let Some(wanted) = &wanted {
            if bare.to_lowercase() != *wanted {
                continue;
            }
        }

        let avg = student_average(ds, student, Some(discipline.as_str()));
        let term_scores = match ds.record(student, discipline) {
            Some(rec) => [
                present(rec.terms[0]),
                present(rec.terms[1]),
                present(rec.terms[2]),
            ],
            None => [None; 3],
        };

        rows.push(StudentDisciplineRow {
            discipline: bare.to_string(),
            term_scores,
            average: round2(avg),
            status: status_label(avg).to_string(),
        });
    }

    let shown: Vec<f64> = rows.iter().map(|r| r.average).collect();
    let passing_count = rows.iter().filter(|r| r.status == "Passing").count();
    let recovery_count = rows.iter().filter(|r| r.status == "Recovery").count();
    let failing_count = rows.iter().filter(|r| r.status == "Failing").count();

    Ok(StudentDetail {
        name: student.to_string(),
        overall_average: round2(mean(&shown)),
        discipline_count: rows.len(),
        passing_count,
        recovery_count,
        failing_count,
        disciplines: rows,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub disciplines: Vec<String>,
    pub difficulty_percents: Vec<f64>,
    pub struggling_counts: Vec<usize>,
    pub term_performance: Vec<TermPerformance>,
    pub student_count: usize,
}

/// Chart-ready series in difficulty order, with course prefixes stripped.
/// Rendering itself lives outside the core.
pub fn chart_data(ds: &ClassDataset) -> ChartData {
    let ranking = difficulty_ranking(ds);
    ChartData {
        disciplines: ranking
            .iter()
            .map(|e| bare_discipline(&e.discipline).to_string())
            .collect(),
        difficulty_percents: ranking.iter().map(|e| e.percent).collect(),
        struggling_counts: ranking.iter().map(|e| e.struggling_count).collect(),
        term_performance: term_performance(ds),
        student_count: ds.students().len(),
    }
}
