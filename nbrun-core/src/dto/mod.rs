//! Data Transfer Objects
//!
//! Request and response bodies exchanged with the cluster REST API.
//! Domain types are reused where the wire shape matches them exactly.

pub mod cluster;
pub mod run;
pub mod workspace;
