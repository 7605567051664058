use crate::constants::{
    COL_PROGRESS_PROFILE_URL, COL_TOTAL_BADGES, COL_USER_EMAIL, COL_USER_NAME, DATE_NOT_FOUND,
};
use crate::error::Result;
use crate::parser::ParsedProfile;
use crate::pipeline::ingestion::loader::HeaderIndex;
use crate::pipeline::processing::enrich::{ProfileEnricher, ProfileFetch};
use crate::types::FetchStatus;
use csv::{ReaderBuilder, WriterBuilder};
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{info, warn};

/// One row of the progress export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRow {
    pub row_number: usize,
    pub user_name: String,
    pub user_email: String,
    pub profile_url: Option<String>,
}

/// Per-user earned dates for the tracked badges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeDateRow {
    pub progress: ProgressRow,
    pub fetch_status: FetchStatus,
    /// One cell per tracked badge, in tracked order; empty when not earned
    pub dates: Vec<String>,
}

impl BadgeDateRow {
    pub fn total_badges(&self) -> usize {
        self.dates.iter().filter(|d| !d.is_empty()).count()
    }
}

#[derive(Debug, Clone)]
pub struct BadgeDateTable {
    pub tracked: Vec<String>,
    pub rows: Vec<BadgeDateRow>,
}

pub fn load_progress<R: Read>(reader: R) -> Result<Vec<ProgressRow>> {
    let mut csv_reader = ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let index = HeaderIndex::new(&headers, &[COL_PROGRESS_PROFILE_URL])?;

    let mut rows = Vec::new();
    for (offset, result) in csv_reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(row_number = offset + 1, "Skipping unreadable progress row: {}", e);
                continue;
            }
        };
        let url = index.get(&record, COL_PROGRESS_PROFILE_URL);
        rows.push(ProgressRow {
            row_number: offset + 1,
            user_name: index.get(&record, COL_USER_NAME).trim().to_string(),
            user_email: index.get(&record, COL_USER_EMAIL).trim().to_string(),
            profile_url: Some(url.trim().to_string()).filter(|u| !u.is_empty()),
        });
    }
    info!("Loaded {} records from progress export", rows.len());
    Ok(rows)
}

/// Earned-date cells for the tracked badges found on a profile
pub fn badge_dates_for(profile: &ParsedProfile, tracked: &[String]) -> Vec<String> {
    tracked
        .iter()
        .map(|name| {
            profile
                .badges
                .iter()
                .find(|badge| badge.name == *name)
                .map(|badge| {
                    badge
                        .earned_display()
                        .unwrap_or_else(|| DATE_NOT_FOUND.to_string())
                })
                .unwrap_or_default()
        })
        .collect()
}

fn date_row(progress: ProgressRow, fetch: &ProfileFetch, tracked: &[String]) -> BadgeDateRow {
    let dates = match &fetch.profile {
        Some(profile) => badge_dates_for(profile, tracked),
        None => vec![String::new(); tracked.len()],
    };
    BadgeDateRow {
        progress,
        fetch_status: fetch.status,
        dates,
    }
}

/// Fetch every progress profile through the shared enricher and build the table
pub async fn collect_badge_dates(
    rows: Vec<ProgressRow>,
    tracked: &[String],
    enricher: &Arc<ProfileEnricher>,
) -> BadgeDateTable {
    let jobs = rows
        .iter()
        .map(|row| (row.row_number, row.profile_url.clone()))
        .collect();
    let mut fetches = enricher.fetch_all(jobs).await;

    let rows = rows
        .into_iter()
        .map(|row| {
            let fetch = fetches
                .remove(&row.row_number)
                .unwrap_or_else(ProfileFetch::skipped_no_url);
            if fetch.status == FetchStatus::SkippedNoUrl {
                info!("Skipping row {}: No profile URL", row.row_number);
            }
            date_row(row, &fetch, tracked)
        })
        .collect();

    BadgeDateTable {
        tracked: tracked.to_vec(),
        rows,
    }
}

impl BadgeDateTable {
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = WriterBuilder::new().from_writer(writer);
        let mut header = vec![COL_USER_NAME, COL_USER_EMAIL, COL_PROGRESS_PROFILE_URL];
        header.extend(self.tracked.iter().map(String::as_str));
        header.push(COL_TOTAL_BADGES);
        out.write_record(&header)?;

        for row in &self.rows {
            let mut cells = vec![
                row.progress.user_name.clone(),
                row.progress.user_email.clone(),
                row.progress.profile_url.clone().unwrap_or_default(),
            ];
            cells.extend(row.dates.iter().cloned());
            cells.push(row.total_badges().to_string());
            out.write_record(&cells)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Users holding each tracked badge, in tracked order
    pub fn earned_counts(&self) -> Vec<(&str, usize)> {
        self.tracked
            .iter()
            .enumerate()
            .map(|(idx, badge)| {
                let count = self
                    .rows
                    .iter()
                    .filter(|row| row.dates.get(idx).is_some_and(|d| !d.is_empty()))
                    .count();
                (badge.as_str(), count)
            })
            .collect()
    }

    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("BADGE SCRAPING SUMMARY");
        println!("{}", "=".repeat(80));
        println!("Total profiles processed: {}", self.rows.len());
        println!("\nBadge Earned Counts:");
        for (badge, count) in self.earned_counts() {
            println!("  {}: {} users", badge, count);
        }
    }
}
