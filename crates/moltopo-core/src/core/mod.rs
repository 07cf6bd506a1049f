//! Foundational layer: unit handling, potential expressions, the topology
//! data model, and file-format io.

pub mod io;
pub mod models;
pub mod potential;
pub mod units;
