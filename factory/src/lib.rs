//! Device facade of sluice.
//!
//! [`Factory`] picks queue families from [`Config`], creates queues
//! and hands out semaphores and fences bound to its device.

#![warn(
    missing_debug_implementations,
    missing_copy_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications
)]

#[macro_use]
extern crate failure;

use sluice_command as command;

mod config;
mod factory;

#[cfg(test)]
mod test;

pub use crate::{
    config::{Config, FamilyInfo, OneQueue, QueuesConfigure, SavedQueueConfig, TimelineMode},
    factory::{CreationError, Factory},
};
