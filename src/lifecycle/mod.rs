//! Stream lifecycle
//!
//! [`StreamManager`] owns the policy for when ingestion runs:
//!
//! ```text
//!   always-on:  start() --> worker --exit--> backoff --> worker --> ...
//!   on-demand:  attach_viewer() --> worker --exit--> dormant
//! ```
//!
//! It also serves viewer requests end to end: codec discovery, session
//! negotiation, queue attachment and the per-viewer delivery task.

pub mod config;
pub mod controller;

pub use config::LifecycleConfig;
pub use controller::{StreamManager, ViewerAnswer};
