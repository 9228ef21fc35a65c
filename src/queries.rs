//! The seven fixed aggregate queries.
//!
//! Every ordering carries an explicit `MIN(<row id>)` secondary key so that
//! ties come out in first-inserted order. Rounding is SQLite `ROUND`.

use rusqlite::Row;

use crate::store::Store;
use crate::vocabulary::{AgeBracket, Condition, Insurance, RiskCategory, Sex, TreatmentType};

pub const DIAGNOSIS_PREVALENCE_SQL: &str = "\
SELECT description,
       COUNT(*) AS total,
       ROUND(100.0 * COUNT(*) / SUM(COUNT(*)) OVER (), 1) AS percentage
FROM diagnoses
GROUP BY description
ORDER BY total DESC, MIN(id) ASC";

pub const REVENUE_BY_TREATMENT_SQL: &str = "\
SELECT type,
       COUNT(*) AS cases,
       ROUND(AVG(cost), 2) AS average_cost,
       SUM(CAST(ROUND(cost * 100) AS INTEGER)) AS revenue_cents
FROM treatments
GROUP BY type
ORDER BY revenue_cents DESC, MIN(id) ASC";

pub const PERIO_RISK_SQL: &str = "\
SELECT p.sex, p.smoker, p.diabetic,
       ROUND(AVG(e.probing_depth), 2) AS mean_probing_depth,
       ROUND(AVG(e.bleeding_pct), 1) AS mean_bleeding_pct,
       COUNT(DISTINCT p.id) AS patients
FROM patients p
JOIN perio_exams e ON e.patient_id = p.id
GROUP BY p.sex, p.smoker, p.diabetic
ORDER BY mean_probing_depth DESC, MIN(e.id) ASC";

pub const VISITS_BY_INSURANCE_SQL: &str = "\
SELECT p.insurance,
       COUNT(v.id) AS total_visits,
       COUNT(DISTINCT v.patient_id) AS unique_patients,
       ROUND(1.0 * COUNT(v.id) / COUNT(DISTINCT v.patient_id), 2) AS visits_per_patient
FROM patients p
JOIN visits v ON v.patient_id = p.id
GROUP BY p.insurance
ORDER BY total_visits DESC, MIN(v.id) ASC";

/// The most frequent type per tooth wins; ties go to the type name that
/// sorts first.
pub const TOP_TEETH_SQL: &str = "\
WITH per_type AS (
    SELECT tooth, type,
           ROW_NUMBER() OVER (PARTITION BY tooth ORDER BY COUNT(*) DESC, type ASC) AS type_rank
    FROM treatments
    GROUP BY tooth, type
)
SELECT t.tooth,
       COUNT(*) AS frequency,
       (SELECT pt.type FROM per_type pt
         WHERE pt.tooth = t.tooth AND pt.type_rank = 1) AS most_frequent_treatment
FROM treatments t
GROUP BY t.tooth
ORDER BY frequency DESC, MIN(t.id) ASC
LIMIT 10";

pub fn age_bracket_sql() -> String {
    format!(
        "\
SELECT {} AS bracket,
       COUNT(DISTINCT p.id) AS patients,
       ROUND(AVG(e.probing_depth), 2) AS mean_probing_depth,
       ROUND(AVG(e.bleeding_pct), 1) AS mean_bleeding_pct
FROM patients p
JOIN perio_exams e ON e.patient_id = p.id
GROUP BY bracket
ORDER BY MIN(p.age) ASC",
        AgeBracket::sql_case("p.age")
    )
}

pub fn bleeding_heatmap_sql() -> String {
    format!(
        "\
SELECT {} AS risk_category,
       p.sex,
       ROUND(AVG(e.bleeding_pct), 1) AS mean_bleeding_pct
FROM patients p
JOIN perio_exams e ON e.patient_id = p.id
GROUP BY risk_category, p.sex",
        RiskCategory::sql_case("p.smoker", "p.diabetic")
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisPrevalence {
    pub condition: Condition,
    pub total: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreatmentRevenue {
    pub treatment: TreatmentType,
    pub cases: i64,
    pub average_cost: f64,
    /// Exact sum of the per-case costs, in cents
    pub total_revenue_cents: i64,
}

impl TreatmentRevenue {
    pub fn total_revenue(&self) -> f64 {
        self.total_revenue_cents as f64 / 100.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerioRiskGroup {
    pub sex: Sex,
    pub smoker: bool,
    pub diabetic: bool,
    pub mean_probing_depth: f64,
    pub mean_bleeding_pct: f64,
    pub patients: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsuranceVisits {
    pub insurance: Insurance,
    pub total_visits: i64,
    pub unique_patients: i64,
    pub visits_per_patient: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgeBracketIndicators {
    pub bracket: AgeBracket,
    pub patients: i64,
    pub mean_probing_depth: f64,
    pub mean_bleeding_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToothFrequency {
    pub tooth: u8,
    pub frequency: i64,
    pub most_frequent_treatment: TreatmentType,
}

/// Mean bleeding % per (risk category, sex), rows in `RiskCategory::ALL`
/// order and columns in `Sex::ALL` order. `None` marks a combination
/// without patients.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BleedingHeatmap {
    pub cells: [[Option<f64>; Sex::COUNT]; RiskCategory::COUNT],
}

impl BleedingHeatmap {
    pub fn get(&self, risk: RiskCategory, sex: Sex) -> Option<f64> {
        self.cells[risk.ordinal()][sex.ordinal()]
    }

    pub fn rows(&self) -> impl Iterator<Item = (RiskCategory, &[Option<f64>; Sex::COUNT])> {
        RiskCategory::ALL.iter().copied().zip(self.cells.iter())
    }

    /// Smallest and largest filled cell.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.cells.iter().flatten().flatten().fold(None, |range, &v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
        })
    }
}

fn query_rows<T, F>(store: &Store, sql: &str, map: F) -> anyhow::Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = store.connection().prepare(sql)?;
    let rows = stmt.query_map([], map)?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Count and share of each diagnosis, most frequent first.
pub fn diagnosis_prevalence(store: &Store) -> anyhow::Result<Vec<DiagnosisPrevalence>> {
    query_rows(store, DIAGNOSIS_PREVALENCE_SQL, |row| {
        Ok(DiagnosisPrevalence {
            condition: row.get(0)?,
            total: row.get(1)?,
            percentage: row.get(2)?,
        })
    })
}

/// Cases, average cost and revenue per treatment type, highest revenue first.
pub fn revenue_by_treatment(store: &Store) -> anyhow::Result<Vec<TreatmentRevenue>> {
    query_rows(store, REVENUE_BY_TREATMENT_SQL, |row| {
        Ok(TreatmentRevenue {
            treatment: row.get(0)?,
            cases: row.get(1)?,
            average_cost: row.get(2)?,
            total_revenue_cents: row.get(3)?,
        })
    })
}

/// Periodontal means per (sex, smoker, diabetic), deepest pockets first.
pub fn perio_risk(store: &Store) -> anyhow::Result<Vec<PerioRiskGroup>> {
    query_rows(store, PERIO_RISK_SQL, |row| {
        Ok(PerioRiskGroup {
            sex: row.get(0)?,
            smoker: row.get(1)?,
            diabetic: row.get(2)?,
            mean_probing_depth: row.get(3)?,
            mean_bleeding_pct: row.get(4)?,
            patients: row.get(5)?,
        })
    })
}

/// Visit volume per insurance category, busiest first.
pub fn visits_by_insurance(store: &Store) -> anyhow::Result<Vec<InsuranceVisits>> {
    query_rows(store, VISITS_BY_INSURANCE_SQL, |row| {
        Ok(InsuranceVisits {
            insurance: row.get(0)?,
            total_visits: row.get(1)?,
            unique_patients: row.get(2)?,
            visits_per_patient: row.get(3)?,
        })
    })
}

/// Periodontal means per age bracket, youngest bracket first.
pub fn age_brackets(store: &Store) -> anyhow::Result<Vec<AgeBracketIndicators>> {
    query_rows(store, &age_bracket_sql(), |row| {
        Ok(AgeBracketIndicators {
            bracket: row.get(0)?,
            patients: row.get(1)?,
            mean_probing_depth: row.get(2)?,
            mean_bleeding_pct: row.get(3)?,
        })
    })
}

/// The ten most treated teeth.
pub fn top_teeth(store: &Store) -> anyhow::Result<Vec<ToothFrequency>> {
    query_rows(store, TOP_TEETH_SQL, |row| {
        Ok(ToothFrequency {
            tooth: row.get(0)?,
            frequency: row.get(1)?,
            most_frequent_treatment: row.get(2)?,
        })
    })
}

/// Mean bleeding % per risk category and sex, pivoted into a fixed matrix.
pub fn bleeding_heatmap(store: &Store) -> anyhow::Result<BleedingHeatmap> {
    let cells = query_rows(store, &bleeding_heatmap_sql(), |row| {
        Ok((
            row.get::<_, RiskCategory>(0)?,
            row.get::<_, Sex>(1)?,
            row.get::<_, f64>(2)?,
        ))
    })?;

    let mut heatmap = BleedingHeatmap::default();
    for (risk, sex, bleeding) in cells {
        heatmap.cells[risk.ordinal()][sex.ordinal()] = Some(bleeding);
    }
    Ok(heatmap)
}

/// Results of all seven queries over one populated store.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResults {
    pub diagnosis_prevalence: Vec<DiagnosisPrevalence>,
    pub revenue_by_treatment: Vec<TreatmentRevenue>,
    pub perio_risk: Vec<PerioRiskGroup>,
    pub visits_by_insurance: Vec<InsuranceVisits>,
    pub age_brackets: Vec<AgeBracketIndicators>,
    pub top_teeth: Vec<ToothFrequency>,
    pub bleeding_heatmap: BleedingHeatmap,
}

impl QueryResults {
    pub fn collect(store: &Store) -> anyhow::Result<Self> {
        Ok(Self {
            diagnosis_prevalence: diagnosis_prevalence(store)?,
            revenue_by_treatment: revenue_by_treatment(store)?,
            perio_risk: perio_risk(store)?,
            visits_by_insurance: visits_by_insurance(store)?,
            age_brackets: age_brackets(store)?,
            top_teeth: top_teeth(store)?,
            bleeding_heatmap: bleeding_heatmap(store)?,
        })
    }
}
