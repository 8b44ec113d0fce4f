//! albumscan core: identify a photographed album cover, enrich it with a
//! review and cover artwork, and persist one record per album.
//!
//! Entry point is [`ScanOrchestrator`]; every external service sits behind a
//! trait so the orchestrator can be driven entirely by in-memory fakes.

pub mod artwork;
pub mod catalog;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod store;
pub mod types;
pub mod utils;

pub use crate::error::{ScanError, ScanResult};
pub use crate::orchestrator::{
    OrchestratorSettings, RetrySummary, ScanDependencies, ScanOrchestrator, ScanReport,
};
pub use crate::types::{
    AlbumRecord, ArtworkBundle, CatalogCandidate, Confidence, EnrichmentResult,
    IdentificationOutcome, IdentificationResult, Recommendation, SearchRefinement,
};
