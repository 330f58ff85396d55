//! The three simulated tasks.
//!
//! Priorities are those of the reference task layout (firmware highest,
//! bottom half lowest). They are recorded on each task's span; correctness
//! never depends on them, only on the ring locks, the doorbell and the mask.

mod bottom_half;
mod firmware;
mod tx_path;

#[cfg(test)]
mod tests;

pub use self::{
    bottom_half::{BhStep, BottomHalf},
    firmware::{Firmware, FwStep},
    tx_path::{TxOutcome, TxPath},
};
