//! Common utilities and types shared across SealStream modules.
//!
//! This module provides the shared error type and the pull-based I/O
//! building blocks the container format is read through, including the
//! footer extractor that holds back a stream's trailing authentication tag.

pub mod error;
pub mod footer;
pub mod source;

pub use error::{Error, Result};
pub use footer::FooterReader;
pub use source::{Chunk, ReadSource, Source, MAX_CONSECUTIVE_EMPTY_READS};
