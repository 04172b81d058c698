//! # Vellum Testkit
//!
//! Test utilities for Vellum.
//!
//! This crate provides:
//! - A repository fixture on a manual clock with known field-group definitions
//! - Property-based test generators using proptest
//! - Stress testing utilities for the per-key critical sections
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vellum_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_repository() {
//!     with_test_repo(|t| {
//!         let page = t.page("hello");
//!         t.edit(&page, &body("world"), true);
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
