//! # casebind
//!
//! Code-first synchronization between test metadata declared in source text
//! and a remote test-management service.
//!
//! ## Overview
//!
//! casebind scans a source tree for test declarations — structured
//! identifiers, nested group hierarchy, inline steps and narrative
//! documentation — and reconciles them against the records held by an
//! external test-management service. Local source is authoritative for all
//! declared metadata (the remote system is a mirror), while remote-only
//! operational fields are preserved untouched. After a sync the
//! remote-assigned numeric ids are written back into the source text so
//! subsequent runs match by id instead of guessing.
//!
//! ### Key properties
//!
//! - **Indentation-free structural recovery**: group nesting is recovered
//!   with a brace balance walk over a literal token stream, so braces in
//!   string literals or comments never corrupt the hierarchy.
//! - **Explicit match ordering**: annotated remote id, then identifier
//!   field, then display title — an ordered list of strategies, not nested
//!   conditionals.
//! - **Idempotent by construction**: re-running an unchanged sync creates
//!   zero records and zero containers, which makes re-invocation the sole
//!   (and safe) retry mechanism.
//! - **Error tolerance**: one malformed declaration is excluded with a
//!   warning; one failed remote call fails that record, not the run.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use casebind::{
//!     config::SyncConfig,
//!     orchestrate::{SyncOptions, SyncOrchestrator},
//!     remote::HttpRemoteApi,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::from_file("casebind.toml")?;
//!     let api = HttpRemoteApi::new(&config)?;
//!     let orchestrator = SyncOrchestrator::new(&config, &api);
//!
//!     let runtime = tokio::runtime::Builder::new_current_thread()
//!         .enable_all()
//!         .build()?;
//!     let report = runtime.block_on(orchestrator.run(
//!         std::path::Path::new("./tests"),
//!         &SyncOptions::default(),
//!     ))?;
//!     println!("created {} updated {}", report.created, report.updated);
//!     Ok(())
//! }
//! ```
//!
//! ## Module guide
//!
//! Start with [`orchestrate::SyncOrchestrator`] for the full pipeline, or
//! go component by component: [`extract`] (structural parsing), [`model`]
//! (normalized entities), [`remote`] (service contract and index),
//! [`reconcile`] (match strategies and action plan), [`resolve`]
//! (find-or-create container paths), [`annotate`] (id write-back) and
//! [`snapshot`] (CSV audit artifact).

pub mod annotate;
pub mod config;
pub mod error;
pub mod extract;
pub mod ident;
pub mod model;
pub mod orchestrate;
pub mod reconcile;
pub mod remote;
pub mod resolve;
pub mod snapshot;

pub use error::*;
