//! Core trait abstractions.
//!
//! Backends fetch pages; stores persist targets, snapshots and
//! determinations. Applications can plug in their own of either.

pub mod backend;
pub mod store;
