//! Query results flattened into display tables, shared by the console and
//! HTML reports.

use crate::queries::{
    self, AgeBracketIndicators, DiagnosisPrevalence, InsuranceVisits, PerioRiskGroup,
    QueryResults, ToothFrequency, TreatmentRevenue,
};
use crate::vocabulary::Sex;

/// Text placeholder for an empty heatmap cell.
pub const EMPTY_CELL: &str = "—";

/// One query result as display-ready text
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    pub key: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub sql: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultTable {
    fn new(
        key: &'static str,
        title: &'static str,
        description: &'static str,
        sql: impl Into<String>,
        headers: &[&str],
    ) -> Self {
        Self {
            key,
            title,
            description,
            sql: sql.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn with_rows<T>(mut self, items: &[T], row: impl Fn(&T) -> Vec<String>) -> Self {
        self.rows = items.iter().map(row).collect();
        self
    }
}

/// `162030` cents -> `"1620.30"`
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

fn yes_no(flag: bool) -> String {
    if flag { "Yes" } else { "No" }.to_string()
}

impl QueryResults {
    /// All seven tables, in query order.
    pub fn tables(&self) -> Vec<ResultTable> {
        let prevalence = ResultTable::new(
            "diagnosis_prevalence",
            "Q1 · Diagnosis prevalence",
            "Number of diagnoses per condition and its share of all diagnoses.",
            queries::DIAGNOSIS_PREVALENCE_SQL,
            &["Diagnosis", "Total", "Percentage"],
        )
        .with_rows(&self.diagnosis_prevalence, |r: &DiagnosisPrevalence| {
            vec![
                r.condition.to_string(),
                r.total.to_string(),
                format!("{:.1}", r.percentage),
            ]
        });

        let revenue = ResultTable::new(
            "revenue_by_treatment",
            "Q2 · Revenue by treatment type",
            "Cases, average cost and total revenue (MXN) per procedure.",
            queries::REVENUE_BY_TREATMENT_SQL,
            &["Treatment", "Cases", "Average cost (MXN)", "Total revenue (MXN)"],
        )
        .with_rows(&self.revenue_by_treatment, |r: &TreatmentRevenue| {
            vec![
                r.treatment.to_string(),
                r.cases.to_string(),
                format!("{:.2}", r.average_cost),
                format_cents(r.total_revenue_cents),
            ]
        });

        let perio = ResultTable::new(
            "perio_risk",
            "Q3 · Periodontal risk factors",
            "Mean probing depth and bleeding on probing by sex, smoking and diabetes.",
            queries::PERIO_RISK_SQL,
            &[
                "Sex",
                "Smoker",
                "Diabetic",
                "Mean probing depth (mm)",
                "Mean bleeding %",
                "Patients",
            ],
        )
        .with_rows(&self.perio_risk, |r: &PerioRiskGroup| {
            vec![
                r.sex.to_string(),
                yes_no(r.smoker),
                yes_no(r.diabetic),
                format!("{:.2}", r.mean_probing_depth),
                format!("{:.1}", r.mean_bleeding_pct),
                r.patients.to_string(),
            ]
        });

        let insurance = ResultTable::new(
            "visits_by_insurance",
            "Q4 · Visits by insurance type",
            "Visit volume, distinct patients and visits per patient for each coverage type.",
            queries::VISITS_BY_INSURANCE_SQL,
            &["Insurance", "Total visits", "Unique patients", "Visits per patient"],
        )
        .with_rows(&self.visits_by_insurance, |r: &InsuranceVisits| {
            vec![
                r.insurance.to_string(),
                r.total_visits.to_string(),
                r.unique_patients.to_string(),
                format!("{:.2}", r.visits_per_patient),
            ]
        });

        let ages = ResultTable::new(
            "age_brackets",
            "Q5 · Periodontal indicators by age bracket",
            "Patients, mean probing depth and mean bleeding per age bracket.",
            queries::age_bracket_sql(),
            &["Age bracket", "Patients", "Mean probing depth (mm)", "Mean bleeding %"],
        )
        .with_rows(&self.age_brackets, |r: &AgeBracketIndicators| {
            vec![
                r.bracket.to_string(),
                r.patients.to_string(),
                format!("{:.2}", r.mean_probing_depth),
                format!("{:.1}", r.mean_bleeding_pct),
            ]
        });

        let teeth = ResultTable::new(
            "top_teeth",
            "Q6 · Most treated teeth",
            "The ten teeth (FDI numbering) with the most treatments and their most frequent procedure.",
            queries::TOP_TEETH_SQL,
            &["Tooth", "Frequency", "Most frequent treatment"],
        )
        .with_rows(&self.top_teeth, |r: &ToothFrequency| {
            vec![
                r.tooth.to_string(),
                r.frequency.to_string(),
                r.most_frequent_treatment.to_string(),
            ]
        });

        let mut heatmap = ResultTable::new(
            "bleeding_heatmap",
            "Q7 · Bleeding on probing by risk factor and sex",
            "Mean bleeding % for each combination of risk category and sex.",
            queries::bleeding_heatmap_sql(),
            &["Risk category"],
        );
        heatmap.headers.extend(Sex::ALL.iter().map(Sex::to_string));
        heatmap.rows = self
            .bleeding_heatmap
            .rows()
            .map(|(risk, cells)| {
                std::iter::once(risk.to_string())
                    .chain(cells.iter().map(|cell| match cell {
                        Some(value) => format!("{value:.1}"),
                        None => EMPTY_CELL.to_string(),
                    }))
                    .collect()
            })
            .collect();

        vec![prevalence, revenue, perio, insurance, ages, teeth, heatmap]
    }
}
