//! Queue submission scheduling and timeline synchronization.
//!
//! Submissions are accepted from any thread, wait for their dependencies
//! without blocking callers and reach the hardware in per-queue FIFO order.

#![forbid(overflowing_literals)]
#![warn(missing_copy_implementations)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]
#![warn(path_statements)]
#![warn(trivial_bounds)]
#![warn(type_alias_bounds)]
#![warn(unconditional_recursion)]
#![warn(while_true)]
#![warn(bad_style)]
#![warn(future_incompatible)]
#![warn(rust_2018_compatibility)]
#![warn(rust_2018_idioms)]

mod device;
mod dispatch;
mod family;
mod fence;
mod queue;
mod semaphore;
mod submission;
mod timeline;

pub use crate::{
    device::Device,
    family::Family,
    fence::{wait_for_fences, Fence, FenceEpoch},
    queue::{Preamble, Queue, WorkerConfig},
    semaphore::{wait_semaphores, Semaphore, SemaphoreKind, SemaphorePart, TimelineSyncobj},
    submission::SubmitInfo,
    timeline::{PointBorrow, Timeline},
};
