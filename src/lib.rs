//! Pod restart tracker
//!
//! Receives pod snapshots as CloudEvents, keeps a sliding window of restart
//! observations per container and pushes ntfy alerts for containers that
//! restart too often.

pub mod config;
pub mod notifier;
pub mod server;
pub mod tracker;
