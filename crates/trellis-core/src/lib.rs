//! trellis-core library.
//!
//! Work items nest epic → feature → story → task. This crate holds the
//! nesting rules ([`hierarchy`]), sparse sibling order keys ([`order`]),
//! forest reconstruction ([`tree`]), the mutation entry points
//! ([`coordinator::Engine`]) and the stores behind them ([`store`], [`db`]).
//!
//! # Conventions
//!
//! - **Errors**: engine operations return [`error::EngineError`]; storage
//!   helpers use `anyhow::Result` with context.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

#![forbid(unsafe_code)]

pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod hierarchy;
pub mod model;
pub mod order;
pub mod store;
pub mod tree;

pub use coordinator::{Engine, Placement, ReorderPlan};
pub use error::{EngineError, ErrorCode};
pub use model::{ContentPatch, Kind, NewWorkItem, WorkItem, WorkItemRecord};
pub use tree::{TreeBuild, TreeNode, build_tree};
