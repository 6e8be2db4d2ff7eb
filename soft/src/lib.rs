//! Backend that emulates kernel synchronization objects and hardware queues on host.
//!
//! Work submitted through [`SoftWinsys`] "executes" instantly:
//! its signals are triggered as soon as it is submitted, unless completion is held.
//! Everything submitted is recorded for inspection.

#![warn(
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications
)]

mod syncobj;
mod winsys;

pub use crate::{syncobj::*, winsys::*};

use sluice_core::{Backend, PreambleRequirements, Submittable};

/// Host emulated backend.
#[derive(Debug)]
pub enum SoftBackend {}

impl Backend for SoftBackend {
    type Syncobj = SoftSyncobj;
    type CommandBuffer = SoftCommandBuffer;
    type Buffer = SoftResource;
    type Image = SoftResource;
    type Memory = SoftResource;
    type Preamble = SoftPreamble;
}

/// Command buffer that only carries a label and its requirements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SoftCommandBuffer {
    /// Label to identify command buffer in records.
    pub label: u64,

    /// Shared resources it needs.
    pub requirements: PreambleRequirements,
}

impl SoftCommandBuffer {
    /// Command buffer without requirements.
    pub fn new(label: u64) -> Self {
        SoftCommandBuffer {
            label,
            requirements: PreambleRequirements::none(),
        }
    }

    /// Command buffer with requirements.
    pub fn with_requirements(label: u64, requirements: PreambleRequirements) -> Self {
        SoftCommandBuffer {
            label,
            requirements,
        }
    }
}

impl Submittable for SoftCommandBuffer {
    fn requirements(&self) -> PreambleRequirements {
        self.requirements
    }
}

/// Buffer, image or memory handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SoftResource(pub u32);

/// Preamble generated by [`SoftWinsys`].
#[derive(Debug, PartialEq, Eq)]
pub struct SoftPreamble {
    /// Sequential id.
    pub id: u32,

    /// Requirements it was generated for.
    pub requirements: PreambleRequirements,
}
