//! gather - time-bounded telemetry snapshot collector
//!
//! A snapshot request opens a fixed-length collection window. While it is
//! open, any number of sources push their latest sample per instrument; when
//! it closes the requester receives one consolidated JSON document.
//!
//! - `session`: state machine and accumulator
//! - `window`: collection window timer
//! - `web`: HTTP endpoints
//! - `error`: HTTP error mapping
//! - `commands`: CLI client commands
//! - `telemetry`: logging and OTLP export

pub mod commands;
pub mod error;
pub mod session;
pub mod telemetry;
pub mod web;
pub mod window;

pub use error::CollectorError;
pub use session::{
    IngestOutcome, SessionBusy, SessionCoordinator, SessionState, SessionStats, Snapshot,
};
pub use window::{PendingSnapshot, WindowClosed};
