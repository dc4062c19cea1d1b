//! Off-thread layout execution.
//!
//! [`LayoutWorkerClient`] serializes each request into a JSON message, hands it
//! to a background thread running a [`c4layout_engine::LayoutEngine`] and
//! matches the response back by correlation id. Requests time out, a crashed
//! worker fails only its own in-flight requests, and the next submission
//! transparently starts a fresh worker.

mod client;
mod error;
mod pending;
pub mod telemetry;
pub mod wire;
mod worker;

pub use client::{DEFAULT_TIMEOUT, LayoutWorkerClient};
pub use error::WorkerError;
pub use pending::PendingLayout;
pub use wire::{LayoutRequest, LayoutResponse, WorkerMessage};
