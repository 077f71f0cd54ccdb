//! Background Jobs for the SiteLens orchestrator
//!
//! - `cache_janitor`: Purges expired result cache entries on a fixed interval
//!
//! # Usage
//!
//! ```ignore
//! use sitelens_orchestrator::jobs::{cache_janitor_task, JanitorConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let task = tokio::spawn(cache_janitor_task(cache, JanitorConfig::default(), shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! let metrics = task.await?;
//! ```
//!
//! Most callers use [`crate::Orchestrator::spawn_janitor`] instead, which
//! wires the task to the orchestrator's cache and returns a [`JanitorHandle`].

pub mod cache_janitor;

pub use cache_janitor::{
    cache_janitor_task, JanitorConfig, JanitorHandle, JanitorMetrics, JanitorSnapshot,
};
