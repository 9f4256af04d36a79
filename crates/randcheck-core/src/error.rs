//! Fatal error conditions for a battery run.
//!
//! Everything in here halts the run: a broken invariant, an unusable
//! configuration, or a required file that cannot be read or written. Outcomes
//! that come from the data itself (out-of-range p-values, inapplicable
//! iterations, tests disabled at init) are recorded, never raised.

use std::io;

use thiserror::Error;

use crate::config::TestId;
use crate::driver::DriverState;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{test}: {op} is not permitted in driver state {state}")]
    DriverState {
        test: TestId,
        op: &'static str,
        state: DriverState,
    },

    #[error("{test}: iterate called on a disabled test")]
    Disabled { test: TestId },

    #[error("{test}: {got} p-values supplied, expected a multiple of {partitions}")]
    PartitionMismatch {
        test: TestId,
        got: usize,
        partitions: usize,
    },

    #[error("result store size overflow: {count} elements of {element_size} bytes")]
    StoreOverflow { count: usize, element_size: usize },

    #[error("result store allocation of {count} elements failed")]
    StoreAlloc { count: usize },

    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bit source exhausted while reading iteration {iteration}")]
    SourceExhausted { iteration: usize },

    #[error("invalid byte {byte:#04x} in ascii bit stream")]
    InvalidAscii { byte: u8 },

    #[error("sequential source cannot seek to iteration {requested}, next is {expected}")]
    NonSequentialSeek { requested: usize, expected: usize },

    #[error("archive {path}: {reason}")]
    Archive { path: String, reason: String },

    #[error("scheduler: {0}")]
    Scheduler(&'static str),

    #[error("worker thread panicked")]
    WorkerPanicked,

    #[error("lock poisoned: {0}")]
    Poisoned(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
