//! Utilities Module
//!
//! This module contains shared utility functionality for the gnmd daemon.

pub mod error;
pub mod tracing;
