//! # Canvass Common Library
//!
//! Shared code for the Canvass survey engine including:
//! - Database schema, initialization, and row models
//! - Event types (SurveyEvent enum) and the per-survey notification hub
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
