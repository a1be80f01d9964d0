//! services/api/src/lib.rs
//!
//! The progress API service: adapters for the core ports, configuration and
//! the HTTP surface.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
