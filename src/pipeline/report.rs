use crate::constants::{
    COL_BADGE_COUNT, COL_CREATION_YEAR, COL_DISCORD_ID, COL_DUPLICATE_GROUP_ID, COL_FETCH_STATUS,
    COL_IS_DUPLICATE, COL_LEAGUE, COL_POINTS, COL_PROGRESS_PROFILE_URL, COL_REASON, COL_STATUS,
    COL_USER_NAME,
};
use crate::error::Result;
use crate::pipeline::ingestion::loader::RawRow;
use crate::pipeline::processing::duplicates::DuplicateGroup;
use crate::types::{FetchStatus, ProfileSnapshot, QualificationResult, QualificationStatus};
use csv::WriterBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Columns appended after every input column of the enriched report
pub const DERIVED_COLUMNS: [&str; 9] = [
    COL_IS_DUPLICATE,
    COL_DUPLICATE_GROUP_ID,
    COL_FETCH_STATUS,
    COL_CREATION_YEAR,
    COL_BADGE_COUNT,
    COL_LEAGUE,
    COL_POINTS,
    COL_STATUS,
    COL_REASON,
];

/// One flat output row per input row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    pub raw: RawRow,
    /// `None` only for malformed rows, which carry no status
    pub status: Option<QualificationStatus>,
    pub reason: String,
    pub is_duplicate: bool,
    pub duplicate_group_id: Option<usize>,
    /// Present when enrichment ran or was skipped for a missing URL
    pub snapshot: Option<ProfileSnapshot>,
}

impl OutputRow {
    pub fn classified(
        raw: RawRow,
        result: QualificationResult,
        snapshot: Option<ProfileSnapshot>,
    ) -> Self {
        Self {
            raw,
            status: Some(result.status),
            reason: result.reason,
            is_duplicate: result.is_duplicate,
            duplicate_group_id: result.duplicate_group_id,
            snapshot,
        }
    }

    pub fn skipped(raw: RawRow, reason: impl Into<String>) -> Self {
        Self {
            raw,
            status: None,
            reason: reason.into(),
            is_duplicate: false,
            duplicate_group_id: None,
            snapshot: None,
        }
    }

    /// Fetch status as reported: a blank URL reads `skipped_no_url` even when
    /// the row never reached enrichment
    pub fn fetch_status(&self) -> Option<FetchStatus> {
        match &self.snapshot {
            Some(snapshot) => Some(snapshot.fetch_status),
            None if self.raw.profile_url.trim().is_empty() => Some(FetchStatus::SkippedNoUrl),
            None => None,
        }
    }

    /// Input cells padded or cut to `width`, then the derived cells
    fn cells(&self, width: usize) -> Vec<String> {
        fn opt<T: ToString>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }
        let snapshot = self.snapshot.as_ref();
        let mut cells: Vec<String> = self.raw.cells.iter().take(width).cloned().collect();
        cells.resize(width, String::new());
        cells.extend([
            self.is_duplicate.to_string(),
            opt(self.duplicate_group_id),
            opt(self.fetch_status()),
            opt(snapshot.and_then(|s| s.creation_year)),
            opt(snapshot.map(|s| s.badge_count)),
            snapshot.map(|s| s.league.clone()).unwrap_or_default(),
            opt(snapshot.and_then(|s| s.points)),
            opt(self.status),
            self.reason.clone(),
        ]);
        cells
    }
}

/// Run totals. Status counts cover every tier, including zero counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_rows: usize,
    pub skipped_rows: usize,
    pub unique_phones: usize,
    pub total_duplicates: usize,
    pub duplicate_groups: usize,
    pub fetch_failures: usize,
    pub profiles_not_found: usize,
    pub status_counts: BTreeMap<QualificationStatus, usize>,
}

impl Summary {
    pub fn from_rows(rows: &[OutputRow], groups: &[DuplicateGroup]) -> Self {
        let mut status_counts: BTreeMap<QualificationStatus, usize> =
            QualificationStatus::all().into_iter().map(|s| (s, 0)).collect();
        let mut skipped_rows = 0;
        let mut fetch_failures = 0;
        let mut profiles_not_found = 0;

        for row in rows {
            match row.status {
                Some(status) => *status_counts.entry(status).or_insert(0) += 1,
                None => skipped_rows += 1,
            }
            match row.snapshot.as_ref().map(|s| s.fetch_status) {
                Some(FetchStatus::FetchFailed) => fetch_failures += 1,
                Some(FetchStatus::NotFound) => profiles_not_found += 1,
                _ => {}
            }
        }

        Self {
            total_rows: rows.len(),
            skipped_rows,
            unique_phones: groups.len(),
            total_duplicates: groups.iter().map(|g| g.secondary.len()).sum(),
            duplicate_groups: groups.iter().filter(|g| g.has_duplicates()).count(),
            fetch_failures,
            profiles_not_found,
            status_counts,
        }
    }

    pub fn count(&self, status: QualificationStatus) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    /// Rows that reached profile-based evaluation
    pub fn valid_entries(&self) -> usize {
        self.sum_where(|s| !s.is_invalid_entry())
    }

    pub fn qualified(&self) -> usize {
        self.sum_where(|s| s.is_qualified())
    }

    pub fn action_required(&self) -> usize {
        self.sum_where(|s| s.requires_action())
    }

    fn sum_where(&self, pred: impl Fn(&QualificationStatus) -> bool) -> usize {
        self.status_counts
            .iter()
            .filter(|(status, _)| pred(status))
            .map(|(_, count)| count)
            .sum()
    }
}

/// Everything a run produced, rows in input order
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Cleaned input header, written ahead of `DERIVED_COLUMNS`
    pub input_columns: Vec<String>,
    pub rows: Vec<OutputRow>,
    pub summary: Summary,
    pub duplicate_groups: Vec<DuplicateGroup>,
}

impl PipelineReport {
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = WriterBuilder::new().from_writer(writer);
        let width = self.input_columns.len();
        out.write_record(
            self.input_columns
                .iter()
                .map(String::as_str)
                .chain(DERIVED_COLUMNS),
        )?;
        for row in &self.rows {
            out.write_record(row.cells(width))?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn write_csv_to_path(&self, path: &Path) -> Result<()> {
        self.write_csv(File::create(path)?)?;
        info!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    pub fn write_summary_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.summary)?;
        std::fs::write(path, json)?;
        info!("Wrote summary to {}", path.display());
        Ok(())
    }

    pub fn qualified_rows(&self) -> impl Iterator<Item = &OutputRow> {
        self.rows
            .iter()
            .filter(|row| row.status.is_some_and(|s| s.is_qualified()))
    }

    /// Qualified rows in the shape the bulk importer expects
    pub fn write_import_candidates<W: Write>(&self, writer: W) -> Result<usize> {
        let mut out = WriterBuilder::new().from_writer(writer);
        out.write_record([COL_USER_NAME, COL_PROGRESS_PROFILE_URL, COL_DISCORD_ID])?;
        let mut written = 0;
        for row in self.qualified_rows() {
            out.write_record([row.raw.name.trim(), row.raw.profile_url.trim(), ""])?;
            written += 1;
        }
        out.flush()?;
        Ok(written)
    }

    fn names_with(&self, status: QualificationStatus) -> Vec<&OutputRow> {
        self.rows.iter().filter(|r| r.status == Some(status)).collect()
    }

    fn row(&self, row_number: usize) -> Option<&OutputRow> {
        self.rows.iter().find(|r| r.raw.row_number == row_number)
    }

    pub fn print_summary(&self) {
        let s = &self.summary;
        let counted = s.total_rows - s.skipped_rows;
        let pct = |n: usize| {
            if counted == 0 {
                0.0
            } else {
                n as f64 * 100.0 / counted as f64
            }
        };

        println!("\n{}", "=".repeat(80));
        println!("ANALYSIS SUMMARY");
        println!("{}", "=".repeat(80));
        println!("Total entries: {}", s.total_rows);
        if s.skipped_rows > 0 {
            println!("Skipped (malformed) rows: {}", s.skipped_rows);
        }
        println!("Unique phone numbers: {}", s.unique_phones);
        println!(
            "Duplicate entries: {} across {} phone numbers",
            s.total_duplicates, s.duplicate_groups
        );
        println!("Fetch failures: {}", s.fetch_failures);
        println!("Profiles not found: {}", s.profiles_not_found);

        println!("\nStatus breakdown:");
        for (status, count) in &s.status_counts {
            println!("  {:<24} {:>5} ({:.1}%)", status.as_str(), count, pct(*count));
        }

        println!("\nValid entries: {}", s.valid_entries());
        println!("✅ Qualified: {}", s.qualified());
        println!("⚠️  Action required: {}", s.action_required());

        if s.duplicate_groups > 0 {
            println!("\nDuplicate phone numbers:");
            for group in self.duplicate_groups.iter().filter(|g| g.has_duplicates()) {
                let names: Vec<&str> = group
                    .members()
                    .filter_map(|n| self.row(n))
                    .map(|r| r.raw.name.trim())
                    .collect();
                println!("  Group {} ({} entries): {}", group.id, names.len(), names.join(", "));
            }
        }

        for status in [
            QualificationStatus::HardQualified,
            QualificationStatus::QualifiedTier2,
            QualificationStatus::FlaggedDiffAccount,
            QualificationStatus::Disqualified,
        ] {
            let rows = self.names_with(status);
            if rows.is_empty() {
                continue;
            }
            println!("\n{} ({}):", status, rows.len());
            for row in rows {
                println!("  - {} <{}>: {}", row.raw.name.trim(), row.raw.email.trim(), row.reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NormalizedPhone;

    const INPUT_COLUMNS: [&str; 4] = [
        "Timestamp",
        "Name",
        "Email Address",
        "Skills Boost Public Profile URL",
    ];

    fn raw(row_number: usize, name: &str) -> RawRow {
        let email = format!("{}@gdg.org", name.to_lowercase());
        let profile_url = format!("https://p/{}", name.to_lowercase());
        RawRow {
            row_number,
            cells: vec![
                format!("2025-01-0{} 10:00", row_number),
                name.into(),
                email.clone(),
                profile_url.clone(),
            ],
            name: name.into(),
            email,
            profile_url,
            ..RawRow::default()
        }
    }

    fn classified(row_number: usize, name: &str, status: QualificationStatus) -> OutputRow {
        OutputRow::classified(
            raw(row_number, name),
            QualificationResult {
                status,
                reason: "because".into(),
                is_duplicate: false,
                duplicate_group_id: Some(row_number),
            },
            Some(ProfileSnapshot::without_profile(FetchStatus::Ok)),
        )
    }

    fn report(rows: Vec<OutputRow>) -> PipelineReport {
        let groups = vec![DuplicateGroup {
            id: 1,
            key: NormalizedPhone::from_raw("5550100").unwrap(),
            primary: 1,
            secondary: vec![2],
        }];
        PipelineReport {
            input_columns: INPUT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            summary: Summary::from_rows(&rows, &groups),
            rows,
            duplicate_groups: groups,
        }
    }

    #[test]
    fn test_summary_counts_every_status() {
        let report = report(vec![
            classified(1, "Ada", QualificationStatus::HardQualified),
            classified(2, "Bea", QualificationStatus::DuplicateEntry),
            OutputRow::skipped(raw(3, "Broken"), "Malformed row"),
            classified(4, "Cy", QualificationStatus::ReviewNeeded),
        ]);
        let s = &report.summary;

        assert_eq!(s.status_counts.len(), 10);
        assert_eq!(s.total_rows, 4);
        assert_eq!(s.skipped_rows, 1);
        assert_eq!(s.count(QualificationStatus::HardQualified), 1);
        assert_eq!(s.count(QualificationStatus::TermsDeclined), 0);
        assert_eq!(s.total_duplicates, 1);
        assert_eq!(s.qualified(), 1);
        assert_eq!(s.action_required(), 1);
        assert_eq!(s.valid_entries(), 2);
        assert_eq!(s.status_counts.values().sum::<usize>() + s.skipped_rows, s.total_rows);
    }

    #[test]
    fn test_csv_has_input_then_derived_columns() {
        let report = report(vec![
            classified(1, "Ada", QualificationStatus::HardQualified),
            OutputRow::skipped(raw(2, "Broken"), "Malformed row"),
        ]);
        let mut buf = Vec::new();
        report.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            format!("{},{}", INPUT_COLUMNS.join(","), DERIVED_COLUMNS.join(","))
        );
        assert_eq!(
            lines[1],
            "2025-01-01 10:00,Ada,ada@gdg.org,https://p/ada,false,1,ok,,0,,,HARD_QUALIFIED,because"
        );
        assert_eq!(
            lines[2],
            "2025-01-02 10:00,Broken,broken@gdg.org,https://p/broken,false,,,,,,,,Malformed row"
        );
    }

    #[test]
    fn test_short_and_long_input_rows_fit_the_header() {
        let mut short = raw(1, "Ada");
        short.cells.truncate(2);
        let mut long = raw(2, "Bea");
        long.cells.push("stray".into());
        let report = report(vec![
            OutputRow::skipped(short, "Malformed row"),
            OutputRow::skipped(long, "Malformed row"),
        ]);
        let mut buf = Vec::new();
        report.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[1], "2025-01-01 10:00,Ada,,,false,,,,,,,,Malformed row");
        assert_eq!(lines[2], "2025-01-02 10:00,Bea,bea@gdg.org,https://p/bea,false,,,,,,,,Malformed row");
    }

    #[test]
    fn test_blank_url_reports_skipped_without_enrichment() {
        let mut declined = raw(1, "Ada");
        declined.profile_url = "  ".into();
        let row = OutputRow::classified(
            declined,
            QualificationResult {
                status: QualificationStatus::TermsDeclined,
                reason: "Terms not accepted".into(),
                is_duplicate: false,
                duplicate_group_id: None,
            },
            None,
        );
        assert_eq!(row.fetch_status(), Some(FetchStatus::SkippedNoUrl));

        let unfetched = OutputRow::skipped(raw(2, "Bea"), "Malformed row");
        assert_eq!(unfetched.fetch_status(), None);
    }

    #[test]
    fn test_import_candidates_only_qualified() {
        let report = report(vec![
            classified(1, "Ada", QualificationStatus::HardQualified),
            classified(2, "Bea", QualificationStatus::Disqualified),
            classified(3, "Cy", QualificationStatus::QualifiedTier2),
        ]);
        let mut buf = Vec::new();
        let written = report.write_import_candidates(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(written, 2);
        assert_eq!(
            text,
            "User Name,Google Cloud Skills Boost Profile URL,Discord ID\nAda,https://p/ada,\nCy,https://p/cy,\n"
        );
    }

    #[test]
    fn test_summary_json_uses_tier_names() {
        let report = report(vec![classified(1, "Ada", QualificationStatus::QualifiedTier2)]);
        let json = serde_json::to_value(&report.summary).unwrap();
        assert_eq!(json["status_counts"]["QUALIFIED_TIER2"], 1);
        assert_eq!(json["total_rows"], 1);
    }
}
