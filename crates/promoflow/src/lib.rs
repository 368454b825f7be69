//! Promoflow - Asset Catalog & Campaign Task Tracker
//!
//! The core of the Promoflow content-automation pipeline:
//!
//! - **catalog**: keeps image records aligned with directories of files
//!   across configurable storage roots (scan/reconcile/reclassify), and
//!   resolves where each asset physically lives.
//! - **campaign**: ingests third-party campaign-task records scraped from
//!   the platform feed, classifies them by title keywords, and tracks
//!   participation state down to per-task rule cards.
//!
//! Scraping, image generation, LLM calls, and the REST facade are external
//! collaborators; they talk to this crate through `promoflow_db::PromoDb`
//! and the services here.

pub mod campaign;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;

pub use config::StorageConfig;
pub use error::{CoreError, Result};
