use crate::dataset::{ClassDataset, GradeRecord};
use anyhow::Context;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const SOURCE_EXTENSION: &str = "csv";

const SCORE_MIN: f64 = 0.0;
const SCORE_MAX: f64 = 10.0;

/// Loads one class gradebook from a tabular source file.
///
/// Expected columns (header names matched case-insensitively): `name`,
/// `discipline`, `term1`, `term2`, `term3`. Term cells are either blank or a
/// score in [0,10]. Anything else is a load error; the caller keeps no entry
/// for a class whose source fails to load.
pub fn load_class_file(path: &Path) -> anyhow::Result<ClassDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("open class source {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("read header row of {}", path.display()))?
        .clone();
    let column = |name: &str| -> anyhow::Result<usize> {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow::anyhow!("missing column '{}' in {}", name, path.display()))
    };
    let name_col = column("name")?;
    let discipline_col = column("discipline")?;
    let term_cols = [column("term1")?, column("term2")?, column("term3")?];

    let mut records: Vec<GradeRecord> = Vec::new();
    let mut seen_pairs: HashSet<(String, String)> = HashSet::new();

    for (row_idx, row) in reader.records().enumerate() {
        let line = row_idx + 2;
        let row = row.with_context(|| format!("read {} line {}", path.display(), line))?;

        let student = row.get(name_col).unwrap_or("").to_string();
        let discipline = row.get(discipline_col).unwrap_or("").to_string();
        if student.is_empty() {
            anyhow::bail!("empty student name at {} line {}", path.display(), line);
        }
        if discipline.is_empty() {
            anyhow::bail!("empty discipline at {} line {}", path.display(), line);
        }
        if !seen_pairs.insert((student.clone(), discipline.clone())) {
            anyhow::bail!(
                "duplicate row for ({}, {}) at {} line {}",
                student,
                discipline,
                path.display(),
                line
            );
        }

        let mut terms: [Option<f64>; 3] = [None; 3];
        for (slot, col) in term_cols.iter().enumerate() {
            let cell = row.get(*col).unwrap_or("");
            if cell.is_empty() {
                continue;
            }
            let value: f64 = cell.parse().map_err(|_| {
                anyhow::anyhow!(
                    "bad term{} value '{}' at {} line {}",
                    slot + 1,
                    cell,
                    path.display(),
                    line
                )
            })?;
            if !(SCORE_MIN..=SCORE_MAX).contains(&value) {
                anyhow::bail!(
                    "term{} value {} out of range at {} line {}",
                    slot + 1,
                    value,
                    path.display(),
                    line
                );
            }
            terms[slot] = Some(value);
        }

        records.push(GradeRecord {
            student,
            discipline,
            terms,
        });
    }

    Ok(ClassDataset::from_records(records))
}

/// Lists the class source files in a workspace directory, sorted by path so
/// every scan observes the same order.
pub fn scan_class_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for ent in std::fs::read_dir(dir)
        .with_context(|| format!("read workspace directory {}", dir.display()))?
    {
        let ent = ent?;
        let p = ent.path();
        if !p.is_file() {
            continue;
        }
        let is_source = p
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(SOURCE_EXTENSION))
            .unwrap_or(false);
        if is_source {
            files.push(p);
        }
    }
    files.sort();
    Ok(files)
}

/// `"3º Info A"` -> `"3º_info_a.csv"`.
pub fn class_file_name(class_name: &str) -> String {
    format!(
        "{}.{}",
        class_name.to_lowercase().replace(' ', "_"),
        SOURCE_EXTENSION
    )
}

/// `"3º_info_a"` -> `"3º Info A"`, the inverse of `class_file_name` up to
/// the original casing.
pub fn class_name_from_stem(stem: &str) -> String {
    title_case(&stem.replace('_', " "))
}

/// Uppercases every letter that follows a non-letter, lowercases the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}
