//! Core use-case services.
//!
//! # Responsibility
//! - Pair every repository mutation with a provenance stamp.
//! - Turn raw page/limit input into bounded, mapped result pages.

pub mod endpoint_service;
pub mod pagination;
