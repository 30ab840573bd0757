//! Core types for gantry.
//!
//! This module holds the foundation the rest of the crate builds on: the
//! strongly-typed error enum for every fatal failure mode and the
//! user-facing fatal report.
//!
//! # Error Management
//!
//! Gantry distinguishes two kinds of failure:
//!
//! - **Transient failures** (network errors, 4xx responses, digest
//!   mismatches) stay inside the download loop, consume retry attempts,
//!   and at worst degrade to "launch whatever we already have". They are
//!   carried as [`anyhow::Error`] values and never abort the process.
//! - **Fatal failures** ([`BootstrapError`]) mean the bootstrap cannot do
//!   its job at all: the working directory is unusable, the installed
//!   artifact cannot be replaced, a forced download failed, or the
//!   launcher would not start. These bubble up to `main`, which prints
//!   the fatal report and exits non-zero.

pub mod error;

pub use error::{BootstrapError, fatal_report};
