//! Shared test fixtures for the gauge-sync workspace.
//!
//! This crate provides canned payloads shaped like the ones the real
//! services return:
//! - Store sensor listings and record listings
//! - USGS instantaneous-values and site-catalog responses
//! - SFWMD aggregate responses
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then build payloads in your tests:
//!
//! ```ignore
//! let body = test_utils::usgs::flat_response(&[("2024-01-01T00:00:00Z", "1.0")]);
//! ```

pub mod sfwmd;
pub mod store;
pub mod usgs;
