//! camatlas — field resolution and geospatial extraction for live-camera listing pages.

pub mod acquisition;
pub mod assembler;
pub mod classifier;
pub mod config;
pub mod document;
pub mod error;
pub mod geo;
pub mod loader;
pub mod pipeline;
pub mod rules;
pub mod store;
pub mod types;

pub use assembler::{Assembly, Engine};
pub use classifier::{Indicator, RenderAssessment, RenderClassifier};
pub use config::EngineConfig;
pub use document::ParsedDocument;
pub use error::{AtlasError, AtlasResult};
pub use loader::{DocumentLoader, LoadMode, LoadedPage, MemoryLoader};
pub use pipeline::{normalize_target, read_url_dir, read_url_list, PageOutcome, Pipeline, RunStats};
pub use store::{MergeOutcome, RecordStore};
pub use types::*;
