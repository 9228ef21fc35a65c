use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::vocabulary::{Condition, Insurance, Sex, TreatmentType, VisitReason};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patient {
    pub id: i64,
    pub age: u8,
    pub sex: Sex,
    pub smoker: bool,
    pub diabetic: bool,
    pub insurance: Insurance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Visit {
    pub id: i64,
    pub patient_id: i64,
    pub date: NaiveDate,
    pub reason: VisitReason,
    pub provider_id: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    pub id: i64,
    pub visit_id: i64,
    /// ICD-10 code, always `condition.icd10_code()`
    pub code: &'static str,
    pub condition: Condition,
    pub severity: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Treatment {
    pub id: i64,
    pub visit_id: i64,
    #[serde(rename = "type")]
    pub kind: TreatmentType,
    /// MXN, rounded to 2 decimals
    pub cost: f64,
    /// FDI tooth number
    pub tooth: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerioExam {
    pub id: i64,
    pub patient_id: i64,
    pub date: NaiveDate,
    /// millimetres
    pub probing_depth: f64,
    pub bleeding_pct: f64,
    pub calculus_score: u8,
}

/// All generated rows, in generation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    pub patients: Vec<Patient>,
    pub visits: Vec<Visit>,
    pub diagnoses: Vec<Diagnosis>,
    pub treatments: Vec<Treatment>,
    pub perio_exams: Vec<PerioExam>,
}

/// Row count per entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub patients: usize,
    pub visits: usize,
    pub diagnoses: usize,
    pub treatments: usize,
    pub perio_exams: usize,
}

impl RowCounts {
    pub fn total(&self) -> usize {
        self.patients + self.visits + self.diagnoses + self.treatments + self.perio_exams
    }
}

impl Dataset {
    pub fn row_counts(&self) -> RowCounts {
        RowCounts {
            patients: self.patients.len(),
            visits: self.visits.len(),
            diagnoses: self.diagnoses.len(),
            treatments: self.treatments.len(),
            perio_exams: self.perio_exams.len(),
        }
    }

    /// Number of rows whose foreign key does not resolve to a parent row.
    pub fn dangling_references(&self) -> usize {
        let patient_ids: HashSet<i64> = self.patients.iter().map(|p| p.id).collect();
        let visit_ids: HashSet<i64> = self.visits.iter().map(|v| v.id).collect();

        self.visits.iter().filter(|v| !patient_ids.contains(&v.patient_id)).count()
            + self.diagnoses.iter().filter(|d| !visit_ids.contains(&d.visit_id)).count()
            + self.treatments.iter().filter(|t| !visit_ids.contains(&t.visit_id)).count()
            + self
                .perio_exams
                .iter()
                .filter(|e| !patient_ids.contains(&e.patient_id))
                .count()
    }
}

/// Small hand-written dataset with known aggregate answers, for testing
#[cfg(test)]
pub fn mock_dataset() -> Dataset {
    let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
    let patient = |id, age, sex, smoker, diabetic, insurance| Patient {
        id,
        age,
        sex,
        smoker,
        diabetic,
        insurance,
    };
    let visit = |id, patient_id, date, reason, provider_id| Visit {
        id,
        patient_id,
        date,
        reason,
        provider_id,
    };
    let diagnosis = |id, visit_id, condition: Condition, severity| Diagnosis {
        id,
        visit_id,
        code: condition.icd10_code(),
        condition,
        severity,
    };
    let treatment = |id, visit_id, kind, cost, tooth| Treatment {
        id,
        visit_id,
        kind,
        cost,
        tooth,
    };
    let exam = |id, patient_id, date, probing_depth, bleeding_pct, calculus_score| PerioExam {
        id,
        patient_id,
        date,
        probing_depth,
        bleeding_pct,
        calculus_score,
    };

    Dataset {
        patients: vec![
            patient(1, 10, Sex::Male, false, false, Insurance::Imss),
            patient(2, 40, Sex::Female, true, false, Insurance::Private),
            patient(3, 70, Sex::Female, true, true, Insurance::Imss),
        ],
        visits: vec![
            visit(1, 1, day(2022, 3, 1), VisitReason::Checkup, 1),
            visit(2, 1, day(2023, 5, 10), VisitReason::Cleaning, 2),
            visit(3, 2, day(2024, 1, 15), VisitReason::AcutePain, 3),
            visit(4, 3, day(2022, 11, 20), VisitReason::Implant, 4),
        ],
        diagnoses: vec![
            diagnosis(1, 1, Condition::Caries, 1),
            diagnosis(2, 2, Condition::Caries, 2),
            diagnosis(3, 3, Condition::Gingivitis, 2),
            diagnosis(4, 3, Condition::Periodontitis, 3),
            diagnosis(5, 4, Condition::Caries, 4),
        ],
        treatments: vec![
            treatment(1, 1, TreatmentType::Filling, 800.00, 16),
            treatment(2, 2, TreatmentType::Prophylaxis, 600.50, 16),
            treatment(3, 3, TreatmentType::Filling, 820.30, 21),
            treatment(4, 4, TreatmentType::Implant, 18_000.00, 16),
        ],
        perio_exams: vec![
            exam(1, 1, day(2022, 3, 1), 2.0, 10.0, 0),
            exam(2, 1, day(2023, 5, 10), 3.0, 20.0, 1),
            exam(3, 2, day(2024, 1, 15), 4.5, 30.0, 2),
            exam(4, 3, day(2022, 11, 20), 6.0, 60.0, 3),
            exam(5, 3, day(2023, 2, 2), 5.0, 50.0, 3),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_dataset_is_consistent() {
        let dataset = mock_dataset();
        assert_eq!(dataset.dangling_references(), 0);
        assert_eq!(
            dataset.row_counts(),
            RowCounts {
                patients: 3,
                visits: 4,
                diagnoses: 5,
                treatments: 4,
                perio_exams: 5,
            }
        );
        assert_eq!(dataset.row_counts().total(), 21);
    }

    #[test]
    fn test_dangling_references_are_counted() {
        let mut dataset = mock_dataset();
        dataset.visits[0].patient_id = 99;
        dataset.treatments[1].visit_id = 42;
        dataset.perio_exams[4].patient_id = 7;
        assert_eq!(dataset.dangling_references(), 3);
    }

    #[test]
    fn test_treatment_serializes_type_field() {
        let dataset = mock_dataset();
        let json = serde_json::to_value(&dataset.treatments[2]).unwrap();
        assert_eq!(json["type"], "Filling");
        assert_eq!(json["tooth"], 21);
        let json = serde_json::to_value(&dataset.visits[0]).unwrap();
        assert_eq!(json["date"], "2022-03-01");
        assert_eq!(json["reason"], "Checkup");
    }
}
