use crate::calc::{self, round1, round2, QueryError};
use crate::dataset::{bare_discipline, ClassDataset};
use crate::source;
use anyhow::Context;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Ordered substring rules for inferring a curriculum course from a class
/// name, evaluated top-down against the lowercased name.
const COURSE_RULES: &[(&str, &str)] = &[
    ("agro", "Agropecuária"),
    ("info", "Informática"),
    ("eletro", "Eletrotécnica"),
    ("principal", "Geral"),
];

pub fn course_of(class_name: &str) -> String {
    let lowered = class_name.to_lowercase();
    for (needle, label) in COURSE_RULES {
        if lowered.contains(needle) {
            return (*label).to_string();
        }
    }
    match lowered.split_whitespace().next() {
        Some(word) => source::title_case(word),
        None => "Outros".to_string(),
    }
}

/// Named registry of class datasets, backed by one source file per class in
/// a workspace directory. Entries are replaced or removed wholesale; the map
/// iterates in class-name order, which is the tie-break order for every
/// cross-class result.
pub struct ClassRegistry {
    dir: PathBuf,
    classes: BTreeMap<String, ClassDataset>,
}

impl ClassRegistry {
    /// Opens a workspace directory (creating it if missing) and loads every
    /// class source found there. Sources that fail to load are logged and
    /// skipped; they leave no registry entry.
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create workspace directory {}", dir.display()))?;
        let mut registry = Self {
            dir,
            classes: BTreeMap::new(),
        };
        registry.load_all()?;
        Ok(registry)
    }

    fn load_all(&mut self) -> anyhow::Result<()> {
        for path in source::scan_class_files(&self.dir)? {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let name = source::class_name_from_stem(stem);
            match source::load_class_file(&path) {
                Ok(dataset) => {
                    self.classes.insert(name, dataset);
                }
                Err(e) => {
                    warn!(class = %name, error = %e, "skipping unreadable class source");
                }
            }
        }
        info!(classes = self.classes.len(), dir = %self.dir.display(), "registry loaded");
        Ok(())
    }

    /// Drops every entry and rescans the workspace directory.
    pub fn reload(&mut self) -> anyhow::Result<()> {
        self.classes.clear();
        self.load_all()
    }

    /// Copies `source_path` into the workspace under the class's normalized
    /// file name and loads it, replacing any existing entry. A failed load
    /// retains neither an entry nor the copied file.
    pub fn add(&mut self, name: &str, source_path: &Path) -> anyhow::Result<&ClassDataset> {
        let dest = self.dir.join(source::class_file_name(name));
        std::fs::copy(source_path, &dest).with_context(|| {
            format!(
                "copy class source {} to {}",
                source_path.display(),
                dest.display()
            )
        })?;
        match source::load_class_file(&dest) {
            Ok(dataset) => {
                let slot = match self.classes.entry(name.to_string()) {
                    Entry::Occupied(mut occupied) => {
                        occupied.insert(dataset);
                        occupied.into_mut()
                    }
                    Entry::Vacant(vacant) => vacant.insert(dataset),
                };
                Ok(slot)
            }
            Err(e) => {
                let _ = std::fs::remove_file(&dest);
                Err(e)
            }
        }
    }

    /// Removes a class entry and deletes its backing source file. Returns
    /// false when the class is unknown.
    pub fn remove(&mut self, name: &str) -> anyhow::Result<bool> {
        if self.classes.remove(name).is_none() {
            return Ok(false);
        }
        let path = self.dir.join(source::class_file_name(name));
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("delete class source {}", path.display()))?;
        }
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ClassDataset)> {
        self.classes.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ClassDataset> {
        self.classes.get(name)
    }

    /// Sorted distinct course labels across the registered classes.
    pub fn courses(&self) -> Vec<String> {
        let mut courses: Vec<String> = self.classes.keys().map(|n| course_of(n)).collect();
        courses.sort();
        courses.dedup();
        courses
    }

    /// Classes grouped by inferred course, optionally restricted to one
    /// course label.
    pub fn classes_by_course(&self, course: Option<&str>) -> Vec<CourseClasses> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        for name in self.classes.keys() {
            let class_course = course_of(name);
            if let Some(filter) = course {
                if class_course != filter {
                    continue;
                }
            }
            if !groups.contains_key(&class_course) {
                order.push(class_course.clone());
            }
            groups
                .entry(class_course)
                .or_default()
                .push(name.clone());
        }
        order
            .into_iter()
            .map(|course| {
                let classes = groups.remove(&course).unwrap_or_default();
                CourseClasses { course, classes }
            })
            .collect()
    }

    fn filtered(
        &self,
        course: Option<&str>,
        class_names: Option<&[String]>,
    ) -> Vec<(&String, &ClassDataset)> {
        self.classes
            .iter()
            .filter(|(name, _)| match course {
                Some(course) => course_of(name) == course,
                None => true,
            })
            .filter(|(name, _)| match class_names {
                Some(wanted) => wanted.iter().any(|w| w == *name),
                None => true,
            })
            .collect()
    }

    /// Side-by-side class comparison over the classes matching the filters,
    /// sorted by overall average, best first.
    pub fn compare(
        &self,
        course: Option<&str>,
        class_names: Option<&[String]>,
    ) -> Result<ComparisonReport, QueryError> {
        let selected = self.filtered(course, class_names);
        if selected.is_empty() {
            return Err(QueryError::not_found("no class matches the given filters"));
        }

        let mut classes: Vec<ClassComparison> = Vec::with_capacity(selected.len());
        for (name, ds) in selected {
            let report = calc::class_report(ds);
            let progress = calc::term_progress(ds);
            let outcomes = worst_case_outcomes(ds);
            let approval_rate = if report.student_count > 0 {
                round1(outcomes.passing as f64 / report.student_count as f64 * 100.0)
            } else {
                0.0
            };
            classes.push(ClassComparison {
                name: name.clone(),
                course: course_of(name),
                student_count: report.student_count,
                discipline_count: report.discipline_count,
                overall_average: report.overall_average,
                passing_count: outcomes.passing,
                recovery_count: outcomes.recovery,
                failing_count: outcomes.failing,
                approval_rate,
                current_term: progress.current_term,
                term_status: progress.status,
                completed_terms: progress.completed_terms,
            });
        }

        classes.sort_by(|a, b| {
            b.overall_average
                .partial_cmp(&a.overall_average)
                .unwrap_or(Ordering::Equal)
        });

        Ok(ComparisonReport {
            class_count: classes.len(),
            best_class: classes.first().map(|c| c.name.clone()),
            worst_class: classes.last().map(|c| c.name.clone()),
            course_filter: course.map(|c| c.to_string()),
            classes,
        })
    }

    /// Difficulty ranking consolidated across the matching classes. Rankings
    /// are grouped by bare discipline name; the consolidated percent is the
    /// simple mean of the per-class percents (not weighted by class size),
    /// struggling and with-data student counts are summed.
    pub fn consolidated_difficulty_ranking(
        &self,
        course: Option<&str>,
        class_names: Option<&[String]>,
    ) -> ConsolidatedRanking {
        let selected = self.filtered(course, class_names);

        let mut order: Vec<String> = Vec::new();
        let mut acc: HashMap<String, DifficultyAccumulator> = HashMap::new();

        for (_, ds) in &selected {
            for entry in calc::difficulty_ranking(ds) {
                let bare = bare_discipline(&entry.discipline).to_string();
                let with_data = calc::discipline_stats(ds, &entry.discipline).count;
                if !acc.contains_key(&bare) {
                    order.push(bare.clone());
                }
                let slot = acc.entry(bare).or_default();
                slot.percents.push(entry.percent);
                slot.struggling_count += entry.struggling_count;
                slot.student_count += with_data;
            }
        }

        let mut disciplines: Vec<ConsolidatedDifficulty> = order
            .into_iter()
            .map(|name| {
                let slot = acc.remove(&name).unwrap_or_default();
                let percent = if slot.percents.is_empty() {
                    0.0
                } else {
                    slot.percents.iter().sum::<f64>() / slot.percents.len() as f64
                };
                ConsolidatedDifficulty {
                    discipline: name,
                    difficulty_percent: round1(percent),
                    student_count: slot.student_count,
                    struggling_count: slot.struggling_count,
                }
            })
            .collect();

        disciplines.sort_by(|a, b| {
            b.difficulty_percent
                .partial_cmp(&a.difficulty_percent)
                .unwrap_or(Ordering::Equal)
        });

        ConsolidatedRanking {
            discipline_count: disciplines.len(),
            class_count: selected.len(),
            course_filter: course.map(|c| c.to_string()),
            disciplines,
        }
    }

    /// School-wide totals across the matching classes. The overall average is
    /// the mean of each class's overall average, not re-derived from rows.
    pub fn school_stats(
        &self,
        course: Option<&str>,
        class_names: Option<&[String]>,
    ) -> Result<SchoolStatistics, QueryError> {
        let selected = self.filtered(course, class_names);
        if selected.is_empty() {
            return Err(QueryError::not_found("no class matches the given filters"));
        }

        let mut student_count = 0usize;
        let mut passing_count = 0usize;
        let mut recovery_count = 0usize;
        let mut failing_count = 0usize;
        let mut class_averages: Vec<f64> = Vec::with_capacity(selected.len());

        for (_, ds) in &selected {
            let report = calc::class_report(ds);
            student_count += report.student_count;
            class_averages.push(report.overall_average);
            let outcomes = worst_case_outcomes(ds);
            passing_count += outcomes.passing;
            recovery_count += outcomes.recovery;
            failing_count += outcomes.failing;
        }

        let overall_average = if class_averages.is_empty() {
            0.0
        } else {
            class_averages.iter().sum::<f64>() / class_averages.len() as f64
        };
        let approval_rate = if student_count > 0 {
            round1(passing_count as f64 / student_count as f64 * 100.0)
        } else {
            0.0
        };

        Ok(SchoolStatistics {
            class_count: selected.len(),
            student_count,
            passing_count,
            recovery_count,
            failing_count,
            overall_average: round2(overall_average),
            approval_rate,
            course_filter: course.map(|c| c.to_string()),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseClasses {
    pub course: String,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassComparison {
    pub name: String,
    pub course: String,
    pub student_count: usize,
    pub discipline_count: usize,
    pub overall_average: f64,
    pub passing_count: usize,
    pub recovery_count: usize,
    pub failing_count: usize,
    pub approval_rate: f64,
    pub current_term: u8,
    pub term_status: String,
    pub completed_terms: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub classes: Vec<ClassComparison>,
    pub class_count: usize,
    pub best_class: Option<String>,
    pub worst_class: Option<String>,
    pub course_filter: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct DifficultyAccumulator {
    percents: Vec<f64>,
    struggling_count: usize,
    student_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedDifficulty {
    pub discipline: String,
    pub difficulty_percent: f64,
    pub student_count: usize,
    pub struggling_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedRanking {
    pub disciplines: Vec<ConsolidatedDifficulty>,
    pub discipline_count: usize,
    pub class_count: usize,
    pub course_filter: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolStatistics {
    pub class_count: usize,
    pub student_count: usize,
    pub passing_count: usize,
    pub recovery_count: usize,
    pub failing_count: usize,
    pub overall_average: f64,
    pub approval_rate: f64,
    pub course_filter: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct OutcomeCounts {
    passing: usize,
    recovery: usize,
    failing: usize,
}

/// Worst-case student classification: a student fails the class if any
/// discipline average sits in (0, 4), is in recovery if any sits in [4, 6),
/// and passes otherwise. A 0.0 average carries no data and counts toward
/// neither bucket.
fn worst_case_outcomes(ds: &ClassDataset) -> OutcomeCounts {
    let mut out = OutcomeCounts::default();
    for student in ds.students() {
        let mut failing = 0usize;
        let mut recovery = 0usize;
        for discipline in ds.disciplines() {
            let avg = calc::student_average(ds, student, Some(discipline.as_str()));
            if avg >= calc::PASSING_MIN {
                continue;
            } else if avg >= calc::RECOVERY_MIN {
                recovery += 1;
            } else if avg > 0.0 {
                failing += 1;
            }
        }
        if failing > 0 {
            out.failing += 1;
        } else if recovery > 0 {
            out.recovery += 1;
        } else {
            out.passing += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::GradeRecord;

    fn rec(student: &str, discipline: &str, score: f64) -> GradeRecord {
        GradeRecord {
            student: student.to_string(),
            discipline: discipline.to_string(),
            terms: [Some(score), None, None],
        }
    }

    fn registry_with(classes: Vec<(&str, Vec<GradeRecord>)>) -> ClassRegistry {
        let mut map = BTreeMap::new();
        for (name, records) in classes {
            map.insert(name.to_string(), ClassDataset::from_records(records));
        }
        ClassRegistry {
            dir: PathBuf::from("unused"),
            classes: map,
        }
    }

    #[test]
    fn course_rules_match_in_order() {
        assert_eq!(course_of("3º Agro B"), "Agropecuária");
        assert_eq!(course_of("2º Informática A"), "Informática");
        assert_eq!(course_of("1º Eletrotécnica"), "Eletrotécnica");
        assert_eq!(course_of("Turma Principal"), "Geral");
        assert_eq!(course_of("Mecânica 1"), "Mecânica");
        assert_eq!(course_of(""), "Outros");
    }

    #[test]
    fn worst_case_classification_prefers_failing() {
        let ds = ClassDataset::from_records(vec![
            // Ana fails one discipline even though another is passing.
            rec("Ana", "D0", 3.0),
            rec("Ana", "D1", 9.0),
            // Bia is clean but has one recovery.
            rec("Bia", "D0", 5.0),
            rec("Bia", "D1", 8.0),
            // Caio passes everything; D0 has no data, which counts nowhere.
            GradeRecord {
                student: "Caio".to_string(),
                discipline: "D0".to_string(),
                terms: [None; 3],
            },
            rec("Caio", "D1", 7.0),
        ]);
        let outcomes = worst_case_outcomes(&ds);
        assert_eq!(outcomes.failing, 1);
        assert_eq!(outcomes.recovery, 1);
        assert_eq!(outcomes.passing, 1);
    }

    #[test]
    fn compare_sorts_classes_and_picks_extremes() {
        let registry = registry_with(vec![
            ("1º Info A", vec![rec("Ana", "Math", 9.0), rec("Bia", "Math", 8.0)]),
            ("2º Agro A", vec![rec("Caio", "Math", 4.0), rec("Dani", "Math", 5.0)]),
        ]);
        let report = registry.compare(None, None).expect("compare");
        assert_eq!(report.class_count, 2);
        assert_eq!(report.classes[0].name, "1º Info A");
        assert_eq!(report.best_class.as_deref(), Some("1º Info A"));
        assert_eq!(report.worst_class.as_deref(), Some("2º Agro A"));
        assert_eq!(report.classes[0].approval_rate, 100.0);
        // Both 2º Agro A students are below passing.
        assert_eq!(report.classes[1].approval_rate, 0.0);
        assert_eq!(report.classes[1].recovery_count, 2);
    }

    #[test]
    fn compare_filters_by_course_and_names() {
        let registry = registry_with(vec![
            ("1º Info A", vec![rec("Ana", "Math", 9.0)]),
            ("2º Agro A", vec![rec("Caio", "Math", 4.0)]),
        ]);
        let info = registry.compare(Some("Informática"), None).expect("info");
        assert_eq!(info.class_count, 1);
        assert_eq!(info.classes[0].name, "1º Info A");

        let named = registry
            .compare(None, Some(&["2º Agro A".to_string()]))
            .expect("named");
        assert_eq!(named.class_count, 1);

        let err = registry.compare(Some("Mecânica"), None).unwrap_err();
        assert_eq!(err.code, "not_found");
    }

    #[test]
    fn consolidated_ranking_averages_percents_and_sums_counts() {
        let registry = registry_with(vec![
            (
                "1º Info A",
                vec![
                    rec("Ana", "Informática - Redes", 4.0),
                    rec("Bia", "Informática - Redes", 8.0),
                ],
            ),
            (
                "2º Info B",
                vec![
                    rec("Caio", "Informática - Redes", 5.0),
                    rec("Dani", "Informática - Redes", 5.0),
                ],
            ),
        ]);
        let ranking = registry.consolidated_difficulty_ranking(None, None);
        assert_eq!(ranking.discipline_count, 1);
        assert_eq!(ranking.class_count, 2);
        let redes = &ranking.disciplines[0];
        assert_eq!(redes.discipline, "Redes");
        // 50% in one class, 100% in the other -> simple mean 75%.
        assert_eq!(redes.difficulty_percent, 75.0);
        assert_eq!(redes.struggling_count, 3);
        assert_eq!(redes.student_count, 4);
    }

    #[test]
    fn consolidated_ranking_with_no_matches_is_empty() {
        let registry = registry_with(vec![]);
        let ranking = registry.consolidated_difficulty_ranking(None, None);
        assert!(ranking.disciplines.is_empty());
        assert_eq!(ranking.class_count, 0);
    }

    #[test]
    fn school_stats_sum_counts_and_average_class_averages() {
        let registry = registry_with(vec![
            ("1º Info A", vec![rec("Ana", "Math", 8.0)]),
            ("2º Agro A", vec![rec("Caio", "Math", 4.0)]),
        ]);
        let stats = registry.school_stats(None, None).expect("stats");
        assert_eq!(stats.class_count, 2);
        assert_eq!(stats.student_count, 2);
        assert_eq!(stats.passing_count, 1);
        assert_eq!(stats.recovery_count, 1);
        assert_eq!(stats.failing_count, 0);
        // Mean of the two class averages (8.0 and 4.0).
        assert_eq!(stats.overall_average, 6.0);
        assert_eq!(stats.approval_rate, 50.0);

        assert_eq!(
            registry.school_stats(Some("Mecânica"), None).unwrap_err().code,
            "not_found"
        );
    }

    #[test]
    fn courses_and_groups_are_derived_from_class_names() {
        let registry = registry_with(vec![
            ("1º Info A", vec![]),
            ("2º Info B", vec![]),
            ("3º Agro A", vec![]),
        ]);
        assert_eq!(
            registry.courses(),
            vec!["Agropecuária".to_string(), "Informática".to_string()]
        );
        let groups = registry.classes_by_course(Some("Informática"));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].classes.len(), 2);
    }
}
