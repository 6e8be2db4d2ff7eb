//! Sluice's top level crate.
//! Reexports all others.

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

#[doc(inline)]
pub use sluice_core as core;

#[cfg(feature = "command")]
#[doc(inline)]
pub use sluice_command as command;

#[cfg(feature = "factory")]
#[doc(inline)]
pub use sluice_factory as factory;

#[cfg(feature = "soft")]
#[doc(inline)]
pub use sluice_soft as soft;
