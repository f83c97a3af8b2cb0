//! Shared data models for the DriveWatch backend.
//!
//! This crate provides Serde-serializable types for:
//! - Safety event types, debounce rules and category weights
//! - Emitted events and per-trip category scores
//! - Trip report payloads (report.json schema)
//! - Background job descriptors and state transitions
//! - Analysis configuration

pub mod config;
pub mod event;
pub mod job;
pub mod score;
pub mod trip;

// Re-export common types
pub use config::AnalysisConfig;
pub use event::{
    DebounceRule, Event, EventCategory, EventMetadata, EventType, Stream, ALL_EVENT_TYPES,
};
pub use job::{Job, JobId, JobState};
pub use score::{CategoryPenalties, CategoryScores, ScoreDetails};
pub use trip::{TripInfo, TripReport, TripStatus};
