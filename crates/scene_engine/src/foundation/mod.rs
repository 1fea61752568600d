//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the scene graph:
//! - Math types and operations
//! - Identifiers and handle types
//! - Logging utilities

pub mod math;
pub mod collections;
pub mod logging;
