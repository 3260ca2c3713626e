//! nbrun Core
//!
//! Core types shared by the nbrun client, CLI and batch runner.
//!
//! This crate contains:
//! - Domain types: clusters, runs, libraries and run outcomes
//! - DTOs: request/response bodies of the cluster REST API
//! - Params: the ordered key-value codec used for notebook parameters

pub mod domain;
pub mod dto;
pub mod params;
