//! # postmerge Core
//!
//! Core types and utilities for postmerge.
//! Provides the error taxonomy shared by every crate, the setup/operation data
//! model, and the rules that split a setup into post processor invocations.

pub mod error;
pub mod grouping;
pub mod operation;

pub use error::{EngineError, Error, ErrorKind, FormatError, NamingError, Result, TimeoutError};
pub use grouping::{group_operations, single_group};
pub use operation::{Operation, OperationGroup, Setup, ToolNumber};
