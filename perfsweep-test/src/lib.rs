//! Test utilities for perfsweep.
//!
//! This crate provides utilities to facilitate testing sweeps and reductions without a cluster.
//! See the modules for all available utilities.

pub mod fixtures;
pub mod runner;
pub mod tracing;
