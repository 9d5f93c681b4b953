//! # sqltap-core
//!
//! Leaf types for the sqltap statement-audit pipeline: statement
//! classification, the parameter value tree and its redaction policy, the
//! `iFlags` bitmask, and the [`StatementEvent`] wire record.
//!
//! This crate is deliberately free of I/O and async machinery so the event
//! model can be consumed anywhere — the capture layer, sinks, and test
//! harnesses all speak these types.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod classify;
pub mod event;
pub mod flags;
pub mod param;
pub mod redact;

pub use classify::{classify, leading_keyword, parse_use_database, StatementKind};
pub use event::{IsolationLevel, StatementEvent};
pub use param::ParamValue;
pub use redact::{display_params, redact, RedactionPolicy};
