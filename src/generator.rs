use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use fake::Fake;
use fake::faker::boolean::en::Boolean;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::schema::{Dataset, Diagnosis, Patient, PerioExam, Treatment, Visit};
use crate::stats::round_to;
use crate::vocabulary::{Condition, Insurance, Sex, TreatmentType, VisitReason};

pub const DEFAULT_PATIENTS: u32 = 200;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_FIRST_DAY: NaiveDate =
    NaiveDate::from_ymd_opt(2022, 1, 1).expect("2022-01-01 is a valid date");
pub const DEFAULT_LAST_DAY: NaiveDate =
    NaiveDate::from_ymd_opt(2024, 12, 31).expect("2024-12-31 is a valid date");

const MIN_AGE: u8 = 8;
const MAX_AGE: u8 = 80;
const SMOKER_PERCENT: u8 = 22;
const DIABETIC_PERCENT: u8 = 15;
const PROVIDERS: u8 = 6;
const VISITS_PER_PATIENT: (u32, u32) = (1, 5);
const DIAGNOSES_PER_VISIT: (u32, u32) = (1, 2);
const EXAMS_PER_PATIENT: (u32, u32) = (1, 3);
const MAX_SEVERITY: u8 = 4;
const COST_JITTER: (f64, f64) = (0.8, 1.2);
const TEETH: (u8, u8) = (11, 48);
const PROBING_DEPTH_MM: (f64, f64) = (1.0, 7.5);
const BLEEDING_PCT: (f64, f64) = (0.0, 80.0);
const MAX_CALCULUS: u8 = 3;

/// Inputs of one generation run
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub patients: u32,
    pub seed: u64,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            patients: DEFAULT_PATIENTS,
            seed: DEFAULT_SEED,
            first_day: DEFAULT_FIRST_DAY,
            last_day: DEFAULT_LAST_DAY,
        }
    }
}

/// Every calendar day from `first_day` to `last_day`, inclusive
pub fn calendar(first_day: NaiveDate, last_day: NaiveDate) -> anyhow::Result<Vec<NaiveDate>> {
    if first_day > last_day {
        bail!("calendar is empty: {first_day} is after {last_day}");
    }
    Ok(first_day
        .iter_days()
        .take_while(|day| *day <= last_day)
        .collect())
}

/// Generate the dataset from a `StdRng` seeded with `settings.seed`
///
/// Same seed and patient count always give the same dataset.
pub fn generate_seeded(settings: &GeneratorSettings) -> anyhow::Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(settings.seed);
    generate(&mut rng, settings)
}

/// Generate a synthetic clinic dataset from any random source
///
/// Sampling order is fixed: patients, then visits per patient, diagnoses per
/// visit, one treatment per visit and finally perio exams per patient. Ids are
/// dense and 1-based, so every foreign key points at an earlier row.
pub fn generate<R: Rng + ?Sized>(
    rng: &mut R,
    settings: &GeneratorSettings,
) -> anyhow::Result<Dataset> {
    let days = calendar(settings.first_day, settings.last_day)?;

    let patients: Vec<Patient> = (1..=i64::from(settings.patients))
        .map(|id| fake_patient(rng, id))
        .collect();

    let mut visits = Vec::new();
    for patient in &patients {
        for _ in 0..rng.random_range(VISITS_PER_PATIENT.0..=VISITS_PER_PATIENT.1) {
            visits.push(Visit {
                id: next_id(&visits),
                patient_id: patient.id,
                date: pick(rng, &days),
                reason: pick(rng, VisitReason::ALL),
                provider_id: rng.random_range(1..=PROVIDERS),
            });
        }
    }

    let mut diagnoses = Vec::new();
    for visit in &visits {
        for _ in 0..rng.random_range(DIAGNOSES_PER_VISIT.0..=DIAGNOSES_PER_VISIT.1) {
            let condition = pick(rng, Condition::ALL);
            diagnoses.push(Diagnosis {
                id: next_id(&diagnoses),
                visit_id: visit.id,
                code: condition.icd10_code(),
                condition,
                severity: rng.random_range(1..=MAX_SEVERITY),
            });
        }
    }

    let mut treatments = Vec::with_capacity(visits.len());
    for visit in &visits {
        let kind = pick(rng, TreatmentType::ALL);
        let jitter = rng.random_range(COST_JITTER.0..=COST_JITTER.1);
        treatments.push(Treatment {
            id: next_id(&treatments),
            visit_id: visit.id,
            kind,
            cost: round_to(kind.base_cost() * jitter, 2),
            tooth: rng.random_range(TEETH.0..=TEETH.1),
        });
    }

    let mut perio_exams = Vec::new();
    for patient in &patients {
        for _ in 0..rng.random_range(EXAMS_PER_PATIENT.0..=EXAMS_PER_PATIENT.1) {
            perio_exams.push(PerioExam {
                id: next_id(&perio_exams),
                patient_id: patient.id,
                date: pick(rng, &days),
                probing_depth: round_to(
                    rng.random_range(PROBING_DEPTH_MM.0..=PROBING_DEPTH_MM.1),
                    1,
                ),
                bleeding_pct: round_to(rng.random_range(BLEEDING_PCT.0..=BLEEDING_PCT.1), 1),
                calculus_score: rng.random_range(0..=MAX_CALCULUS),
            });
        }
    }

    Ok(Dataset {
        patients,
        visits,
        diagnoses,
        treatments,
        perio_exams,
    })
}

/// Patient with independently sampled attributes
fn fake_patient<R: Rng + ?Sized>(rng: &mut R, id: i64) -> Patient {
    Patient {
        id,
        age: (MIN_AGE..=MAX_AGE).fake_with_rng(rng),
        sex: pick(rng, Sex::ALL),
        smoker: Boolean(SMOKER_PERCENT).fake_with_rng(rng),
        diabetic: Boolean(DIABETIC_PERCENT).fake_with_rng(rng),
        insurance: pick(rng, Insurance::ALL),
    }
}

/// Uniform choice; callers only pass the non-empty vocabularies and calendar.
fn pick<T: Copy, R: Rng + ?Sized>(rng: &mut R, items: &[T]) -> T {
    items[rng.random_range(0..items.len())]
}

fn next_id<T>(rows: &[T]) -> i64 {
    rows.len() as i64 + 1
}

/// One JSONL line, tagged with the entity it came from
#[derive(Serialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
enum ExportRow<'a> {
    Patient(&'a Patient),
    Visit(&'a Visit),
    Diagnosis(&'a Diagnosis),
    Treatment(&'a Treatment),
    PerioExam(&'a PerioExam),
}

/// Write every generated row to a JSONL file
///
/// Rows are written entity by entity, in generation order. Returns the
/// number of lines written.
pub fn write_dataset_jsonl(path: &Path, dataset: &Dataset) -> anyhow::Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("failed to create dataset export {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let rows = dataset
        .patients
        .iter()
        .map(ExportRow::Patient)
        .chain(dataset.visits.iter().map(ExportRow::Visit))
        .chain(dataset.diagnoses.iter().map(ExportRow::Diagnosis))
        .chain(dataset.treatments.iter().map(ExportRow::Treatment))
        .chain(dataset.perio_exams.iter().map(ExportRow::PerioExam));

    let mut written = 0;
    for row in rows {
        serde_json::to_writer(&mut writer, &row)?;
        writeln!(writer)?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::{BufRead, BufReader};

    fn small_settings(patients: u32, seed: u64) -> GeneratorSettings {
        GeneratorSettings {
            patients,
            seed,
            ..GeneratorSettings::default()
        }
    }

    #[test]
    fn test_default_calendar_bounds() {
        assert_eq!(DEFAULT_FIRST_DAY.to_string(), "2022-01-01");
        assert_eq!(DEFAULT_LAST_DAY.to_string(), "2024-12-31");
        let settings = GeneratorSettings::default();
        assert_eq!(settings.first_day, DEFAULT_FIRST_DAY);
        assert_eq!(settings.last_day, DEFAULT_LAST_DAY);
    }

    #[test]
    fn test_calendar_spans_three_years() {
        let settings = GeneratorSettings::default();
        let days = calendar(settings.first_day, settings.last_day).unwrap();
        // 2024 is a leap year
        assert_eq!(days.len(), 365 + 365 + 366);
        assert_eq!(days.first(), Some(&settings.first_day));
        assert_eq!(days.last(), Some(&settings.last_day));
    }

    #[test]
    fn test_calendar_rejects_reversed_bounds() {
        let first = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let last = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let err = calendar(first, last).unwrap_err();
        assert!(err.to_string().contains("calendar is empty"));

        let settings = GeneratorSettings {
            first_day: first,
            last_day: last,
            ..GeneratorSettings::default()
        };
        assert!(generate_seeded(&settings).is_err());
    }

    #[test]
    fn test_single_day_calendar() {
        let day = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let settings = GeneratorSettings {
            patients: 5,
            first_day: day,
            last_day: day,
            ..GeneratorSettings::default()
        };
        let dataset = generate_seeded(&settings).unwrap();
        assert!(dataset.visits.iter().all(|v| v.date == day));
        assert!(dataset.perio_exams.iter().all(|e| e.date == day));
    }

    #[test]
    fn test_generation_is_deterministic_per_seed() {
        let first = generate_seeded(&small_settings(25, 7)).unwrap();
        let second = generate_seeded(&small_settings(25, 7)).unwrap();
        assert_eq!(first, second);

        let other = generate_seeded(&small_settings(25, 8)).unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn test_generate_accepts_any_rng() {
        let mut rng = rand::rng();
        let dataset = generate(&mut rng, &small_settings(10, 0)).unwrap();
        assert_eq!(dataset.patients.len(), 10);
        assert_eq!(dataset.dangling_references(), 0);
    }

    #[test]
    fn test_cardinalities_per_parent() {
        let dataset = generate_seeded(&small_settings(60, 3)).unwrap();

        let mut visits_per_patient: HashMap<i64, usize> = HashMap::new();
        for visit in &dataset.visits {
            *visits_per_patient.entry(visit.patient_id).or_default() += 1;
        }
        let mut exams_per_patient: HashMap<i64, usize> = HashMap::new();
        for exam in &dataset.perio_exams {
            *exams_per_patient.entry(exam.patient_id).or_default() += 1;
        }
        let mut diagnoses_per_visit: HashMap<i64, usize> = HashMap::new();
        for diagnosis in &dataset.diagnoses {
            *diagnoses_per_visit.entry(diagnosis.visit_id).or_default() += 1;
        }
        let mut treatments_per_visit: HashMap<i64, usize> = HashMap::new();
        for treatment in &dataset.treatments {
            *treatments_per_visit.entry(treatment.visit_id).or_default() += 1;
        }

        for patient in &dataset.patients {
            let visits = visits_per_patient.get(&patient.id).copied().unwrap_or(0);
            let exams = exams_per_patient.get(&patient.id).copied().unwrap_or(0);
            assert!((1..=5).contains(&visits), "patient {} has {visits} visits", patient.id);
            assert!((1..=3).contains(&exams), "patient {} has {exams} exams", patient.id);
        }
        for visit in &dataset.visits {
            let diagnoses = diagnoses_per_visit.get(&visit.id).copied().unwrap_or(0);
            assert!((1..=2).contains(&diagnoses));
            assert_eq!(treatments_per_visit.get(&visit.id), Some(&1));
        }
    }

    #[test]
    fn test_ids_are_dense_and_one_based() {
        let dataset = generate_seeded(&small_settings(15, 11)).unwrap();
        for (i, visit) in dataset.visits.iter().enumerate() {
            assert_eq!(visit.id, i as i64 + 1);
        }
        for (i, exam) in dataset.perio_exams.iter().enumerate() {
            assert_eq!(exam.id, i as i64 + 1);
        }
        for (i, diagnosis) in dataset.diagnoses.iter().enumerate() {
            assert_eq!(diagnosis.id, i as i64 + 1);
        }
    }

    #[test]
    fn test_costs_follow_base_price_and_rounding() {
        let dataset = generate_seeded(&small_settings(40, 5)).unwrap();
        for treatment in &dataset.treatments {
            let base = treatment.kind.base_cost();
            assert!(treatment.cost >= round_to(base * 0.8, 2));
            assert!(treatment.cost <= round_to(base * 1.2, 2));
            assert_eq!(round_to(treatment.cost, 2), treatment.cost);
        }
        for exam in &dataset.perio_exams {
            assert_eq!(round_to(exam.probing_depth, 1), exam.probing_depth);
            assert_eq!(round_to(exam.bleeding_pct, 1), exam.bleeding_pct);
        }
        for diagnosis in &dataset.diagnoses {
            assert_eq!(diagnosis.code, diagnosis.condition.icd10_code());
        }
    }

    #[test]
    fn test_write_dataset_jsonl() {
        let dataset = generate_seeded(&small_settings(4, 1)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.jsonl");

        let written = write_dataset_jsonl(&path, &dataset).unwrap();
        assert_eq!(written, dataset.row_counts().total());

        let reader = BufReader::new(File::open(&path).unwrap());
        let lines: Vec<serde_json::Value> = reader
            .lines()
            .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
            .collect();
        assert_eq!(lines.len(), written);
        assert_eq!(lines[0]["entity"], "patient");
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines.last().unwrap()["entity"], "perio_exam");
        let treatment = lines.iter().find(|l| l["entity"] == "treatment").unwrap();
        assert!(treatment["type"].is_string());
    }

    #[test]
    fn test_write_dataset_jsonl_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("dataset.jsonl");
        let err = write_dataset_jsonl(&path, &Dataset::default()).unwrap_err();
        assert!(err.to_string().contains("failed to create dataset export"));
    }
}
