//! Stream registry for stream and viewer state
//!
//! The registry is the single table of stream state shared by ingestion
//! workers and viewer sessions. It fans out media units from a worker to
//! every attached viewer's bounded queue.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<StreamRegistry>
//!                     ┌──────────────────────────┐
//!                     │ streams: HashMap<Id,     │
//!                     │   StreamEntry {          │
//!                     │     codecs, running,     │
//!                     │     viewers: {id -> Tx}, │
//!                     │   }                      │
//!                     │ >                        │
//!                     └────────────┬─────────────┘
//!                                  │
//!         ┌────────────────────────┼────────────────────────┐
//!         │                        │                        │
//!         ▼                        ▼                        ▼
//!   [IngestWorker]             [Viewer]                 [Viewer]
//!   source events             rx.recv()                rx.recv()
//!         │                        │                        │
//!         └──► registry.broadcast() ──► try_send() ──► session.write_unit()
//! ```
//!
//! # Backpressure
//!
//! Each viewer owns a fixed-capacity queue. The broadcaster never waits: a
//! full queue drops the unit for that viewer only, so one slow viewer cannot
//! stall the source or the other viewers.

pub mod config;
pub mod descriptor;
pub mod entry;
pub mod error;
pub mod gate;
pub mod lease;
pub mod store;

pub use config::RegistryConfig;
pub use descriptor::StreamDescriptor;
pub use entry::{FanOut, StreamStats};
pub use error::RegistryError;
pub use gate::CodecDiscovery;
pub use lease::WorkerLease;
pub use store::StreamRegistry;
