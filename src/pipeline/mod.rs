// Qualification pipeline: load -> duplicates -> enrich -> classify -> report

pub mod ingestion;
pub mod processing;
pub mod report;

use crate::config::RunContext;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::ingestion::loader::{
    load_registrations_from_path, LoadedRow, RegistrationSheet, RowOutcome,
};
use crate::pipeline::processing::classify::{classify, incomplete_registration};
use crate::pipeline::processing::duplicates::detect_duplicates;
use crate::pipeline::processing::enrich::{ProfileEnricher, ProfileFetch};
use crate::pipeline::report::{OutputRow, PipelineReport, Summary};
use crate::types::RegistrationRecord;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

pub struct Pipeline {
    ctx: RunContext,
    enricher: Arc<ProfileEnricher>,
}

impl Pipeline {
    pub fn new(ctx: RunContext, enricher: Arc<ProfileEnricher>) -> Self {
        Self { ctx, enricher }
    }

    /// Load `input` and run every stage on it
    pub async fn run_file(&self, input: &Path) -> Result<PipelineReport> {
        let sheet = load_registrations_from_path(input, &self.ctx)?;
        Ok(self.run(sheet).await)
    }

    /// Run duplicate detection, enrichment and classification over loaded
    /// rows. Never fails: fetch problems degrade single records.
    #[instrument(skip_all, fields(rows = sheet.rows.len()))]
    pub async fn run(&self, sheet: RegistrationSheet) -> PipelineReport {
        let started = Instant::now();
        let RegistrationSheet { headers, rows } = sheet;

        // Only records that passed field and consent checks are grouped or fetched
        let eligible: Vec<&RegistrationRecord> = rows
            .iter()
            .filter_map(LoadedRow::record)
            .filter(|r| r.terms_accepted)
            .collect();
        let duplicates = detect_duplicates(eligible.iter().copied());

        let jobs: Vec<(usize, Option<String>)> = eligible
            .iter()
            .filter(|r| !duplicates.status(r.row_number).is_secondary())
            .map(|r| (r.row_number, r.profile_url.clone()))
            .collect();
        info!("Enriching {} profiles", jobs.len());
        let mut fetches = self.enricher.fetch_all(jobs).await;

        let output: Vec<OutputRow> = rows
            .into_iter()
            .map(|LoadedRow { raw, outcome }| {
                let out = match outcome {
                    RowOutcome::Malformed { reason } => OutputRow::skipped(raw, reason),
                    RowOutcome::Incomplete { missing } => {
                        OutputRow::classified(raw, incomplete_registration(&missing), None)
                    }
                    RowOutcome::Valid(record) => {
                        let dup = duplicates.status(record.row_number);
                        let snapshot = fetches
                            .remove(&record.row_number)
                            .as_ref()
                            .map(ProfileFetch::snapshot);
                        let result = classify(&self.ctx, &record, &dup, snapshot.as_ref());
                        OutputRow::classified(raw, result, snapshot)
                    }
                };
                if let Some(status) = out.status {
                    metrics::record_classified(status);
                }
                out
            })
            .collect();

        let groups = duplicates.groups().to_vec();
        let summary = Summary::from_rows(&output, &groups);
        metrics::record_run_duration(started.elapsed());
        info!(
            total = summary.total_rows,
            skipped = summary.skipped_rows,
            duplicates = summary.total_duplicates,
            fetch_failures = summary.fetch_failures,
            "Pipeline finished in {:.2?}",
            started.elapsed()
        );

        PipelineReport {
            input_columns: headers,
            rows: output,
            summary,
            duplicate_groups: groups,
        }
    }
}
