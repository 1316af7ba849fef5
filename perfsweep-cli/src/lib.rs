//! Command line driver for storage cluster benchmark sweeps.
//!
//! Loads the configuration, runs the sweep on the configured cluster runner and reduces the raw
//! results. See [`perfsweep_core`] for the sweep and reduction logic.
#![warn(missing_debug_implementations)]

pub mod cli;
pub mod config;
pub mod observability;
pub mod report;
