//! Error taxonomy for the index.
//!
//! `NotFound` and `DuplicateKey` are ordinary control flow and leave the
//! tree untouched. `Insane` means an internal invariant has been violated
//! and the tree must be treated as indeterminate until a `sanity_check`
//! says otherwise. `NoSpace` is recoverable only by recreating the store
//! with more blocks.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt block: {0}")]
    Corrupt(String),

    #[error("free list exhausted, cannot allocate a block")]
    NoSpace,

    #[error("key not found")]
    NotFound,

    #[error("key already present")]
    DuplicateKey,

    #[error("index invariant violated: {0}")]
    Insane(String),

    #[error("not implemented: {0}")]
    Unimplemented(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
