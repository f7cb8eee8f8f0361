//! Understudy - test doubles for isolating code from its dependencies
//!
//! Two independent tools:
//!
//! - [`stub`]: expectation-based stubs for narrow capability interfaces.
//! - [`transport`]: HTTP transports that record live traffic to disk and
//!   replay it later without touching the network.

#![deny(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod http;
pub mod storage;
pub mod stub;
pub mod transport;

pub use error::{Result, UnderstudyError};
