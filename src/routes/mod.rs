//! Route tables, split by how much the caller must prove.
//!
//! `public` needs nothing (handlers may still read an optional token),
//! `authenticated` sits behind the bearer-token layer, and `admin` is nested
//! under `/admin` behind the same layer with per-handler permission checks.

pub mod admin;
pub mod authenticated;
pub mod public;
