pub mod baseline_snapshot;
pub mod enrichment_report;
pub mod go_universe;
