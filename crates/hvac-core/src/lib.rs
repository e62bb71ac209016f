//! HVAC monitor core: ingestion, duty-cycle aggregation, and queries.
//!
//! Data flows one way: an external payload goes through [`ingest`] into the
//! sample store; on read, [`query`] pulls an ordered range back out and
//! [`aggregate`] derives per-sample stage percentages over a trailing window.

pub mod aggregate;
pub mod cli;
pub mod diag;
pub mod exit_codes;
pub mod ingest;
pub mod query;

pub use aggregate::{aggregate, window_at, AggregatedPoint, StagePercent, StageTimes};
pub use diag::DiagnosticLog;
pub use exit_codes::ExitCode;
pub use ingest::{ingest_batch, IngestError, IngestReport, InvalidRecord};
pub use query::{build_series, QueryRange, SeriesOptions, SeriesReport};
