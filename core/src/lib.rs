//! Crate that contains backend abstractions and utility modules used by other sluice crates.
//!
//! Everything the queue engine needs from the outside world is expressed here as a trait:
//! [`SyncobjDevice`] for kernel synchronization objects and [`Winsys`] for hardware submission,
//! sparse binding and preamble generation.

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
extern crate derivative;
#[macro_use]
extern crate failure;

pub use crate::{
    backend::*, bind::*, deadline::*, error::*, preamble::*, slow::*, syncobj::*, winsys::*,
    wrap::*,
};

mod backend;
mod bind;
mod deadline;
mod error;
mod preamble;
mod slow;
mod syncobj;
mod winsys;
mod wrap;
