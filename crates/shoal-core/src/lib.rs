//! Shoal Core
//!
//! Core types, errors, constants and configuration for the Shoal in-process
//! actor runtime.
//!
//! # Overview
//!
//! Shoal lets callers address many independent, stateful actors by key. Each
//! actor processes at most one message at a time, the total number of queued
//! and in-flight messages is bounded by a shared permit pool, and per-key actor
//! instances are created lazily and evicted by a periodic ping sweep.
//!
//! This crate holds what every layer shares. The mailbox, runtime and registry
//! live in `shoal-runtime`.
//!
//! # TigerStyle
//!
//! - Explicit limits with big-endian naming (e.g., `PING_BATCH_PERIOD_MS_MIN`)
//! - Validation at configuration boundaries
//! - No recursion in the runtime paths

pub mod config;
pub mod constants;
pub mod error;
pub mod telemetry;

pub use config::{RuntimeConfig, ShoalConfig, SmartActorsConfig};
pub use constants::*;
pub use error::{Error, Result};
pub use telemetry::{init_telemetry, TelemetryConfig};
