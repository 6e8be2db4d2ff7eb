use {
    crate::{dispatch::Wakeups, queue::QueueShared, semaphore::{Semaphore, SemaphorePart}},
    parking_lot::Mutex,
    smallvec::SmallVec,
    sluice_core::{Backend, SparseBind, Submittable, Syncobj, PreambleRequirements},
    std::sync::{
        atomic::{AtomicBool, AtomicI32, Ordering},
        Arc,
    },
};

/// Batch of work for a queue.
///
/// Command buffers and binds are moved in.
/// Semaphores are borrowed only until the submit call returns.
#[derive(derivative::Derivative)]
#[derivative(Debug(bound = ""), Default(bound = ""))]
pub struct SubmitInfo<'a, B: Backend> {
    /// Command buffers in execution order.
    pub command_buffers: Vec<B::CommandBuffer>,

    /// Sparse binding operations executed before the command buffers.
    pub binds: Vec<SparseBind<B>>,

    /// Semaphores with values to wait for.
    pub waits: SmallVec<[(&'a Semaphore<B>, u64); 4]>,

    /// Semaphores with values to signal.
    pub signals: SmallVec<[(&'a Semaphore<B>, u64); 4]>,
}

impl<'a, B> SubmitInfo<'a, B>
where
    B: Backend,
{
    /// Create new empty submission.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add command buffers.
    pub fn submits(mut self, command_buffers: impl IntoIterator<Item = B::CommandBuffer>) -> Self {
        self.command_buffers.extend(command_buffers);
        self
    }

    /// Add sparse binding operations.
    pub fn binds(mut self, binds: impl IntoIterator<Item = SparseBind<B>>) -> Self {
        self.binds.extend(binds);
        self
    }

    /// Wait for semaphore. Value is ignored for binary semaphores.
    pub fn wait(mut self, semaphore: &'a Semaphore<B>, value: u64) -> Self {
        self.waits.push((semaphore, value));
        self
    }

    /// Signal semaphore. Value is ignored for binary semaphores.
    pub fn signal(mut self, semaphore: &'a Semaphore<B>, value: u64) -> Self {
        self.signals.push((semaphore, value));
        self
    }

    /// Check if this info neither carries work nor synchronizes anything.
    pub fn is_empty(&self) -> bool {
        self.command_buffers.is_empty()
            && self.binds.is_empty()
            && self.waits.is_empty()
            && self.signals.is_empty()
    }
}

/// Everything needed to dispatch a submission.
/// Does not reference any caller memory.
#[derive(derivative::Derivative)]
#[derivative(Debug(bound = ""))]
pub(crate) struct Payload<B: Backend> {
    pub command_buffers: Vec<B::CommandBuffer>,
    pub binds: Vec<SparseBind<B>>,
    pub flush_caches: bool,
    pub waits: SmallVec<[(SemaphorePart<B>, u64); 4]>,
    pub signals: SmallVec<[(SemaphorePart<B>, u64); 4]>,
    pub fence: Option<Arc<Syncobj<B>>>,
}

impl<B> Payload<B>
where
    B: Backend,
{
    /// Take ownership of everything `info` references.
    /// Temporary semaphore payloads are moved out of waited semaphores.
    pub fn new(info: SubmitInfo<'_, B>, flush_caches: bool, fence: Option<Arc<Syncobj<B>>>) -> Self {
        Payload {
            waits: info
                .waits
                .iter()
                .map(|&(semaphore, value)| (semaphore.take_wait_part(), value))
                .collect(),
            signals: info
                .signals
                .iter()
                .map(|&(semaphore, value)| (semaphore.signal_part(), value))
                .collect(),
            command_buffers: info.command_buffers,
            binds: info.binds,
            flush_caches,
            fence,
        }
    }

    /// Payload that only signals fence.
    pub fn fence_only(fence: Arc<Syncobj<B>>) -> Self {
        Payload {
            command_buffers: Vec::new(),
            binds: Vec::new(),
            flush_caches: false,
            waits: SmallVec::new(),
            signals: SmallVec::new(),
            fence: Some(fence),
        }
    }

    /// Shared resources required by command buffers.
    pub fn requirements(&self) -> PreambleRequirements {
        self.command_buffers
            .iter()
            .fold(PreambleRequirements::none(), |acc, cb| {
                acc.union(&cb.requirements())
            })
    }

    /// Check if some wait is on a kernel timeline.
    pub fn has_timeline_syncobj_waits(&self) -> bool {
        self.waits.iter().any(|(part, _)| match part {
            SemaphorePart::TimelineSyncobj(_) => true,
            _ => false,
        })
    }

    /// Kernel timeline points the submission waits for.
    pub fn timeline_syncobj_waits(&self) -> SmallVec<[(B::Syncobj, u64); 4]> {
        self.waits
            .iter()
            .filter_map(|(part, value)| match part {
                SemaphorePart::TimelineSyncobj(timeline) => Some((timeline.raw(), *value)),
                _ => None,
            })
            .collect()
    }
}

/// Deferred unit of work owned by a queue until dispatched.
///
/// `pending` counts unmet conditions: one per wait plus one for queue order.
/// Whoever brings it to zero claims the submission and hands it to the queue.
#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub(crate) struct Submission<B: Backend> {
    #[derivative(Debug = "ignore")]
    queue: Arc<QueueShared<B>>,
    pending: AtomicI32,
    claimed: AtomicBool,
    payload: Mutex<Option<Payload<B>>>,
}

impl<B> Submission<B>
where
    B: Backend,
{
    pub fn new(queue: &Arc<QueueShared<B>>, payload: Payload<B>) -> Arc<Self> {
        Arc::new(Submission {
            queue: queue.clone(),
            pending: AtomicI32::new(1 + payload.waits.len() as i32),
            claimed: AtomicBool::new(false),
            payload: Mutex::new(Some(payload)),
        })
    }

    pub fn queue(&self) -> &Arc<QueueShared<B>> {
        &self.queue
    }

    /// Take payload out. Only the claiming thread does this.
    pub fn take_payload(&self) -> Option<Payload<B>> {
        self.payload.lock().take()
    }

    /// Remove `count` unmet conditions.
    /// Once none left the submission is pushed to its queue ready channel.
    pub fn decrement(self: &Arc<Self>, count: i32, wakeups: &mut Wakeups<B>) {
        if count == 0 {
            return;
        }

        let previous = self.pending.fetch_sub(count, Ordering::AcqRel);
        sluice_core::sluice_slow_assert!(previous >= count, "Submission released twice");
        if previous != count {
            return;
        }

        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.queue.ready(self.clone(), wakeups);
        }
    }
}
