use std::path::PathBuf;

use anyhow::{Context, bail};

use crate::chart;
use crate::config::Config;
use crate::generator::{self, write_dataset_jsonl};
use crate::logging::log_stage_event;
use crate::queries::QueryResults;
use crate::report::{self, HTML_FILE_NAME, IMAGE_FILE_NAME};
use crate::reporter::print_tables;
use crate::schema::RowCounts;
use crate::store::Store;

/// What one run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub row_counts: RowCounts,
    pub results: QueryResults,
    pub image_path: PathBuf,
    pub html_path: PathBuf,
    /// Lines written by `--export-jsonl`, if requested
    pub exported_rows: Option<usize>,
}

/// Generate, load, query, then print and render the results
///
/// Stages run strictly in order and the first failure aborts the run.
pub async fn run(config: &Config) -> anyhow::Result<RunSummary> {
    config.validate()?;
    let settings = config.generator_settings();

    // the store is dropped before the first await
    let (row_counts, results, exported_rows) = {
        let dataset =
            generator::generate_seeded(&settings).context("failed to generate dataset")?;
        let counts = dataset.row_counts();
        log_stage_event(
            "generator",
            "generated",
            &format!(
                "{} patients, {} visits, {} diagnoses, {} treatments, {} perio exams (seed {})",
                counts.patients,
                counts.visits,
                counts.diagnoses,
                counts.treatments,
                counts.perio_exams,
                settings.seed
            ),
        );

        let exported_rows = match &config.export_jsonl {
            Some(path) => {
                let written = write_dataset_jsonl(path, &dataset)?;
                log_stage_event(
                    "generator",
                    "exported",
                    &format!("{written} rows to {}", path.display()),
                );
                Some(written)
            }
            None => None,
        };

        let mut store = Store::open()?;
        store
            .populate(&dataset)
            .context("failed to load dataset into the store")?;
        let row_counts = store.row_counts()?;
        let orphans = store.orphan_count()?;
        if orphans > 0 {
            bail!("{orphans} rows reference a missing parent");
        }
        log_stage_event(
            "store",
            "populated",
            &format!("{} rows loaded", row_counts.total()),
        );

        let results = QueryResults::collect(&store).context("failed to run queries")?;
        tracing::debug!(
            diagnoses = results.diagnosis_prevalence.len(),
            treatments = results.revenue_by_treatment.len(),
            teeth = results.top_teeth.len(),
            "query results collected"
        );
        (row_counts, results, exported_rows)
    };
    log_stage_event("queries", "completed", "7 result tables");

    let tables = results.tables();
    print_tables(&tables);

    let image_path = config.output_dir.join(IMAGE_FILE_NAME);
    let html_path = config.output_dir.join(HTML_FILE_NAME);
    let patients = row_counts.patients;

    let chart_results = results.clone();
    let chart_path = image_path.clone();
    tokio::task::spawn_blocking(move || chart::render(&chart_results, patients, &chart_path))
        .await
        .context("chart rendering task panicked")??;
    log_stage_event("chart", "rendered", &image_path.display().to_string());

    let html = report::build(&tables, IMAGE_FILE_NAME, patients);
    report::write(&html_path, &html).await?;
    log_stage_event("report", "written", &html_path.display().to_string());

    println!("Chart saved: {}", image_path.display());
    println!("HTML saved: {}", html_path.display());

    Ok(RunSummary {
        row_counts,
        results,
        image_path,
        html_path,
        exported_rows,
    })
}
