#![cfg_attr(not(test), no_std)]
#![allow(async_fn_in_trait)]

// must come first so the other modules see its macros
pub(crate) mod fmt;

pub mod bus;
pub mod config;
pub mod engine;
pub mod message;
pub mod monitor;
pub mod scsi;
pub mod storage;
