//! Lockstep - reconciles dependency-bot branches with a versioned codebase.
//!
//! Four independent batch jobs, each a single pass over filesystem and network
//! state:
//!
//! - [`migrations`]: remove stale duplicate schema migrations
//! - [`manifest`]: widen manifest constraints that contradict the lockfile
//! - [`lockfile`]: diff two lockfile snapshots into an upgrade artifact
//! - [`changelog`]: turn the upgrade artifact into a release-notes report
//!
//! [`config`] holds the optional `lockstep.toml` configuration shared by all four.

pub mod changelog;
pub mod config;
pub mod lockfile;
pub mod manifest;
pub mod migrations;
