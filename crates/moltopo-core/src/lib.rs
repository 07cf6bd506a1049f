//! # moltopo Core Library
//!
//! A data-model and conversion library for molecular simulation topologies:
//! sites, bonds, angles, dihedrals, impropers and their parametrized
//! interaction types, together with converters to and from external
//! representations.
//!
//! ## Architectural Philosophy
//!
//! The library is split into two layers with a strict dependency direction:
//!
//! - **[`core`]: The Foundation.** Unit-tagged quantities ([`core::units`]),
//!   the symbolic potential-expression machinery ([`core::potential`]), the
//!   topology data model ([`core::models`]), and plain-text file formats
//!   ([`core::io`]).
//!
//! - **[`external`]: The Conversion Engine.** An arena-indexed external
//!   structure representation and the bidirectional structural/parameter
//!   converters between it and the internal [`core::models::topology::Topology`],
//!   including type deduplication and functional-form validation.

pub mod core;
pub mod external;
