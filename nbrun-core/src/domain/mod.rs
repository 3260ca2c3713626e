//! Core domain types
//!
//! These types represent what the remote execution service knows about:
//! clusters to run on, libraries to attach, and runs with their lifecycle.
//! They are shared between the client (which fetches them) and the binaries
//! (which display and classify them).

pub mod cluster;
pub mod library;
pub mod run;
