//! Utility functions and helpers for the lmbopt-rs library.

pub mod matrix_convert;
