// Registration ingestion: CSV loading, header cleaning and row validation

pub mod loader;
