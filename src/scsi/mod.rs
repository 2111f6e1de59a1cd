//! SCSI command layer: CDB decoding, per logical unit state and command
//! execution.

pub mod backend;
pub mod commands;
pub mod enums;
mod error;
pub mod handler;
pub mod mode_page;
pub mod queue;
pub mod responses;
pub mod sense;
pub mod unit;

pub use backend::*;
pub use error::*;
