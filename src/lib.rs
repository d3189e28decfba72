//! Bulk deletion of posts listed in an exported archive.
//!
//! The crate is organised as a one-way pipeline:
//!
//! - [`archive`] loads and validates records from an archive file
//! - [`selection`] splits them into protected, eligible and skipped sets
//! - [`pipeline`] deletes the eligible set with bounded concurrency through
//!   a [`client::DeletionClient`]
//! - [`ledger`] and [`report`] persist what happened
//!
//! [`runner::Runner`] wires these together for a single run.

pub mod archive;
pub mod client;
pub mod config;
pub mod ledger;
#[cfg(feature = "cli")]
pub mod observability;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod selection;
pub mod session;

#[cfg(test)]
mod tests;
