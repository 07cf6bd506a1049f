//! The internal topology data model: sites, connections, parametrized
//! connection types, the simulation box, and the owning [`topology::Topology`].

pub mod connection;
pub mod element;
pub mod ids;
pub mod simbox;
pub mod site;
pub mod topology;
pub mod types;
