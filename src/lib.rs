//! Numeric error detection benchmark library
//!
//! Provides tools for measuring how well chat models spot numeric errors in
//! short passages.

pub mod benchmark;
pub mod clients;
pub mod config;
pub mod dataset;
pub mod predictions;
