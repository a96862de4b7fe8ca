//! Integration tests for Terroir.
//!
//! The tests in `tests/` exercise cross-crate behavior at the logic level
//! without requiring a running database or network access: status-axis
//! transition rules, schedule phase merging, rate tier selection, and
//! metadata round-tripping.

#![cfg_attr(not(test), forbid(unsafe_code))]
