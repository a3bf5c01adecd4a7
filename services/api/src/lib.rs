//! services/api/src/lib.rs
//!
//! The HTTP service around the document insights core: configuration,
//! infrastructure adapters and the axum web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
