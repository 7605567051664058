// Record processing: duplicate grouping, profile enrichment and classification

pub mod badge_dates;
pub mod classify;
pub mod duplicates;
pub mod enrich;
