use crate::{
    backend::{Backend, QueueId},
    bind::SparseBind,
    error::{OutOfMemory, SubmitError},
    preamble::PreambleRequirements,
    syncobj::SyncobjPoint,
};

/// Everything the hardware needs for one submission to a queue.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct HwSubmission<'a, B: Backend> {
    /// Target queue.
    pub queue: QueueId,

    /// Preamble to prepend. `None` for queues that need no shared resources.
    pub preamble: Option<&'a B::Preamble>,

    /// Flush and invalidate caches before the command buffers.
    pub flush_caches: bool,

    /// Command buffers in execution order.
    pub command_buffers: &'a [B::CommandBuffer],

    /// Syncobjs the hardware waits on before execution.
    pub waits: &'a [SyncobjPoint<B::Syncobj>],

    /// Syncobjs signaled after execution.
    pub signals: &'a [SyncobjPoint<B::Syncobj>],

    /// Fence syncobj signaled after execution.
    pub fence: Option<B::Syncobj>,
}

impl<'a, B> HwSubmission<'a, B>
where
    B: Backend,
{
    /// Check if submission carries no work, only synchronization.
    pub fn is_empty(&self) -> bool {
        self.command_buffers.is_empty()
    }
}

/// Window-system level access to the hardware queues.
pub trait Winsys<B: Backend>: std::fmt::Debug + Send + Sync {
    /// Generate preamble command streams for resources sized by `requirements`.
    fn create_preamble(
        &self,
        queue: QueueId,
        requirements: &PreambleRequirements,
    ) -> Result<B::Preamble, OutOfMemory>;

    /// Destroy preamble created by this winsys.
    fn destroy_preamble(&self, preamble: B::Preamble);

    /// Execute sparse binding operation on the queue.
    fn bind_sparse(&self, queue: QueueId, bind: &SparseBind<B>) -> Result<(), SubmitError>;

    /// Submit work to the hardware queue.
    fn submit(&self, submission: HwSubmission<'_, B>) -> Result<(), SubmitError>;
}
