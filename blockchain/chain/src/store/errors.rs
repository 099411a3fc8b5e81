// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_ipld_encoding::Error as EncErr;
use thiserror::Error;

/// Chain store error
#[derive(Debug, Error)]
pub enum Error {
    /// Key or block was not found in the store
    #[error("{0} not found")]
    NotFound(String),
    /// Input that can never be stored or resolved
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An insert would overwrite an existing, differing binding
    #[error("conflicting state root for tipset {0}")]
    Conflict(String),
    /// No chain head is tracked in the datastore
    #[error("no chain head tracked in datastore")]
    NoHead,
    /// Loading walked back to a terminus that is not the configured genesis
    #[error("genesis mismatch: {0}")]
    GenesisMismatch(String),
    /// Cancellation token fired during a long operation
    #[error("operation cancelled")]
    Cancelled,
    /// Error originating constructing blockchain structures
    #[error(transparent)]
    Blockchain(#[from] blocks::Error),
    /// Persisted bytes failed to encode or decode
    #[error("encoding error: {0}")]
    Encoding(String),
    /// Backend read/write failure
    #[error(transparent)]
    Db(#[from] db::Error),
    /// Other chain error
    #[error("{0}")]
    Other(String),
}

impl From<EncErr> for Error {
    fn from(e: EncErr) -> Error {
        Error::Encoding(e.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}
