use std::collections::HashMap;

/// One gradebook row: a student's scores in one discipline across the three
/// grading terms. `None` is a blank cell in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeRecord {
    pub student: String,
    pub discipline: String,
    pub terms: [Option<f64>; 3],
}

impl GradeRecord {
    pub fn present_scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.terms.iter().filter_map(|t| present(*t))
    }
}

/// A score counts as present only when it is non-blank AND non-zero.
/// A recorded 0.0 is indistinguishable from "not yet entered"; both read as
/// absent here. Sources that mean a true failing zero cannot express it.
pub fn present(value: Option<f64>) -> Option<f64> {
    match value {
        Some(v) if v != 0.0 => Some(v),
        _ => None,
    }
}

/// Strips an optional `"<Course> - "` prefix from a discipline identifier.
/// The bare name is the token between the first and second `" - "` separator.
pub fn bare_discipline(name: &str) -> &str {
    match name.split_once(" - ") {
        Some((_, rest)) => rest.split(" - ").next().unwrap_or(rest),
        None => name,
    }
}

/// The in-memory gradebook for one class: the raw records plus unique student
/// and discipline lists in first-encounter order, indexed for pair and
/// per-group lookup. Immutable once built; queries recompute from records.
#[derive(Debug, Clone, Default)]
pub struct ClassDataset {
    records: Vec<GradeRecord>,
    students: Vec<String>,
    disciplines: Vec<String>,
    by_pair: HashMap<(String, String), usize>,
    by_student: HashMap<String, Vec<usize>>,
    by_discipline: HashMap<String, Vec<usize>>,
}

impl ClassDataset {
    pub fn from_records(records: Vec<GradeRecord>) -> Self {
        let mut students: Vec<String> = Vec::new();
        let mut disciplines: Vec<String> = Vec::new();
        let mut by_pair: HashMap<(String, String), usize> = HashMap::new();
        let mut by_student: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_discipline: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, rec) in records.iter().enumerate() {
            if !by_student.contains_key(&rec.student) {
                students.push(rec.student.clone());
            }
            if !by_discipline.contains_key(&rec.discipline) {
                disciplines.push(rec.discipline.clone());
            }
            by_pair
                .entry((rec.student.clone(), rec.discipline.clone()))
                .or_insert(idx);
            by_student
                .entry(rec.student.clone())
                .or_default()
                .push(idx);
            by_discipline
                .entry(rec.discipline.clone())
                .or_default()
                .push(idx);
        }

        Self {
            records,
            students,
            disciplines,
            by_pair,
            by_student,
            by_discipline,
        }
    }

    pub fn records(&self) -> &[GradeRecord] {
        &self.records
    }

    pub fn students(&self) -> &[String] {
        &self.students
    }

    pub fn disciplines(&self) -> &[String] {
        &self.disciplines
    }

    pub fn contains_student(&self, student: &str) -> bool {
        self.by_student.contains_key(student)
    }

    pub fn record(&self, student: &str, discipline: &str) -> Option<&GradeRecord> {
        self.by_pair
            .get(&(student.to_string(), discipline.to_string()))
            .map(|&idx| &self.records[idx])
    }

    pub fn student_records(&self, student: &str) -> impl Iterator<Item = &GradeRecord> {
        self.by_student
            .get(student)
            .into_iter()
            .flatten()
            .map(|&idx| &self.records[idx])
    }

    pub fn discipline_records(&self, discipline: &str) -> impl Iterator<Item = &GradeRecord> {
        self.by_discipline
            .get(discipline)
            .into_iter()
            .flatten()
            .map(|&idx| &self.records[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(student: &str, discipline: &str, terms: [Option<f64>; 3]) -> GradeRecord {
        GradeRecord {
            student: student.to_string(),
            discipline: discipline.to_string(),
            terms,
        }
    }

    #[test]
    fn present_treats_zero_and_blank_as_absent() {
        assert_eq!(present(Some(7.5)), Some(7.5));
        assert_eq!(present(Some(0.0)), None);
        assert_eq!(present(None), None);
    }

    #[test]
    fn bare_discipline_strips_course_prefix() {
        assert_eq!(bare_discipline("Informática - Redes"), "Redes");
        assert_eq!(bare_discipline("Matemática"), "Matemática");
        // Only the token after the first separator, as in the source data.
        assert_eq!(bare_discipline("A - B - C"), "B");
    }

    #[test]
    fn from_records_keeps_first_encounter_order() {
        let ds = ClassDataset::from_records(vec![
            rec("Bia", "Math", [Some(7.0), None, None]),
            rec("Ana", "Math", [Some(8.0), None, None]),
            rec("Bia", "History", [Some(6.0), None, None]),
        ]);
        assert_eq!(ds.students(), ["Bia".to_string(), "Ana".to_string()]);
        assert_eq!(
            ds.disciplines(),
            ["Math".to_string(), "History".to_string()]
        );
        assert_eq!(ds.student_records("Bia").count(), 2);
        assert_eq!(ds.discipline_records("Math").count(), 2);
        assert!(ds.record("Ana", "History").is_none());
        assert!(ds.record("Ana", "Math").is_some());
    }
}
