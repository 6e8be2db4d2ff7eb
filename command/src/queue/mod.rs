//! Queue module docs.

mod preamble;
mod worker;

pub use self::{preamble::Preamble, worker::WorkerConfig};

use {
    self::{preamble::PreambleCache, worker::Worker},
    crate::{
        device::Device,
        dispatch::{dispatch, Wakeups},
        fence::{Fence, FenceEpoch},
        semaphore::SemaphorePart,
        submission::{Payload, Submission, SubmitInfo},
    },
    crossbeam_channel::{unbounded, Receiver, Sender},
    parking_lot::{Condvar, Mutex},
    relevant::Relevant,
    smallvec::SmallVec,
    sluice_core::{
        device_owned, Backend, Deadline, DeviceLost, OutOfMemory, PreambleRequirements, QueueId,
        QueueType, SubmitError, WaitStatus,
    },
    std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicBool, AtomicU64, Ordering},
            Arc,
        },
    },
    thread_profiler::profile_scope,
};

/// State shared by the queue handle, its submissions and the worker.
#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub(crate) struct QueueShared<B: Backend> {
    id: QueueId,
    queue_type: QueueType,
    #[derivative(Debug = "ignore")]
    device: Arc<Device<B>>,

    /// Submissions in FIFO order. The front one is the only one that may be dispatched.
    #[derivative(Debug = "ignore")]
    pending: Mutex<VecDeque<Arc<Submission<B>>>>,
    idle: Condvar,

    #[derivative(Debug = "ignore")]
    ready_sender: Sender<Arc<Submission<B>>>,
    #[derivative(Debug = "ignore")]
    ready_receiver: Receiver<Arc<Submission<B>>>,

    preamble: Mutex<PreambleCache<B>>,
    worker: Worker<B>,
    next_epoch: AtomicU64,

    /// Set on dispose. Submissions released after that are dropped.
    closed: AtomicBool,
}

impl<B> QueueShared<B>
where
    B: Backend,
{
    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    pub fn device(&self) -> &Arc<Device<B>> {
        &self.device
    }

    pub fn worker(&self) -> &Worker<B> {
        &self.worker
    }

    /// Check if the queue was disposed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Get preamble covering `required`.
    pub fn preamble(
        &self,
        required: &PreambleRequirements,
    ) -> Result<Arc<Preamble<B>>, OutOfMemory> {
        self.preamble.lock().get(self.device.winsys(), required)
    }

    /// Push claimed submission to the ready channel.
    /// The thread that owns `wakeups` drains it.
    pub fn ready(self: &Arc<Self>, submission: Arc<Submission<B>>, wakeups: &mut Wakeups<B>) {
        if self.is_closed() {
            log::trace!("Drop submission released after {:?} was disposed", self.id);
            return;
        }

        if self.ready_sender.send(submission).is_err() {
            log::error!("Ready channel of {:?} is disconnected", self.id);
            return;
        }
        wakeups.queue(self.clone());
    }

    /// Dispatch all ready submissions.
    pub fn drain(self: &Arc<Self>, wakeups: &mut Wakeups<B>) {
        while let Ok(submission) = self.ready_receiver.try_recv() {
            dispatch(submission, wakeups);
        }
    }

    /// Accept submission into FIFO and release it if nothing blocks it.
    fn enqueue(self: &Arc<Self>, payload: Payload<B>, wakeups: &mut Wakeups<B>) {
        let timelines: SmallVec<[_; 4]> = payload
            .waits
            .iter()
            .filter_map(|(part, value)| match part {
                SemaphorePart::Timeline(timeline) => Some((timeline.clone(), *value)),
                _ => None,
            })
            .collect();
        let waits = payload.waits.len();

        let submission = Submission::new(self, payload);

        let mut unsatisfied = 0;
        for (timeline, value) in &timelines {
            if timeline.register_waiter(*value, &submission) {
                unsatisfied += 1;
            }
        }

        let is_first = {
            let mut pending = self.pending.lock();
            pending.push_back(submission.clone());
            pending.len() == 1
        };

        log::trace!(
            "Enqueue submission to {:?}: {} waits, {} unsatisfied, first: {}",
            self.id,
            waits,
            unsatisfied,
            is_first
        );

        let decrement = (waits - unsatisfied) + is_first as usize;
        submission.decrement(decrement as i32, wakeups);
    }

    /// Remove dispatched submission from FIFO and release the next one.
    pub fn complete(self: &Arc<Self>, submission: &Arc<Submission<B>>, wakeups: &mut Wakeups<B>) {
        let next = {
            let mut pending = self.pending.lock();
            match pending.front() {
                Some(front) if Arc::ptr_eq(front, submission) => {}
                _ => {
                    // Disposed queue has its FIFO drained already.
                    sluice_core::sluice_slow_assert!(
                        self.is_closed(),
                        "Only the front submission can be dispatched"
                    );
                    return;
                }
            }
            pending.pop_front();
            if pending.is_empty() {
                self.idle.notify_all();
            }
            pending.front().cloned()
        };

        if let Some(next) = next {
            next.decrement(1, wakeups);
        }
    }
}

/// Command queue.
///
/// Accepts submissions from any thread and dispatches them in submission order.
/// Must be disposed explicitly to stop its worker thread.
#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub struct Queue<B: Backend> {
    shared: Arc<QueueShared<B>>,
    relevant: Relevant,
}

device_owned!(Queue<B> @ |q: &Self| q.shared.device.id());

impl<B> Queue<B>
where
    B: Backend,
{
    /// Create queue.
    pub fn new(
        device: &Arc<Device<B>>,
        id: QueueId,
        queue_type: QueueType,
        worker: WorkerConfig,
    ) -> Self {
        let (ready_sender, ready_receiver) = unbounded();
        Queue {
            shared: Arc::new(QueueShared {
                id,
                queue_type,
                device: device.clone(),
                pending: Mutex::new(VecDeque::new()),
                idle: Condvar::new(),
                ready_sender,
                ready_receiver,
                preamble: Mutex::new(PreambleCache::new(id)),
                worker: Worker::new(id, worker),
                next_epoch: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
            relevant: Relevant,
        }
    }

    /// Id of the queue.
    pub fn id(&self) -> QueueId {
        self.shared.id
    }

    /// Type of the queue.
    pub fn queue_type(&self) -> QueueType {
        self.shared.queue_type
    }

    /// Returns next queue epoch.
    pub fn next_epoch(&self) -> u64 {
        self.shared.next_epoch.load(Ordering::Acquire)
    }

    /// Number of submissions accepted but not yet dispatched.
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Check if the worker thread was ever spawned.
    pub fn has_worker(&self) -> bool {
        self.shared.worker.is_spawned()
    }

    /// Number of times preamble was generated for this queue.
    pub fn preamble_generations(&self) -> usize {
        self.shared.preamble.lock().generations()
    }

    /// Submit work to the queue.
    ///
    /// Returns once submissions are accepted.
    /// Each of them is dispatched after every previous one and after its waits are satisfied.
    /// Fence is signaled by the last submission.
    /// Submitting no infos with a fence still signals the fence in queue order.
    pub fn submit<'a>(
        &self,
        infos: impl IntoIterator<Item = SubmitInfo<'a, B>>,
        fence: Option<&mut Fence<B>>,
    ) -> Result<(), SubmitError> {
        profile_scope!("submit");
        self.submit_impl(infos, fence, true)
    }

    /// Submit sparse binding operations.
    /// Same as [`Queue::submit`] except that caches are never flushed.
    pub fn bind_sparse<'a>(
        &self,
        infos: impl IntoIterator<Item = SubmitInfo<'a, B>>,
        fence: Option<&mut Fence<B>>,
    ) -> Result<(), SubmitError> {
        profile_scope!("bind_sparse");
        self.submit_impl(infos, fence, false)
    }

    fn submit_impl<'a>(
        &self,
        infos: impl IntoIterator<Item = SubmitInfo<'a, B>>,
        fence: Option<&mut Fence<B>>,
        flush_caches: bool,
    ) -> Result<(), SubmitError> {
        self.shared.device.check()?;

        let device = self.device_id();
        let infos: SmallVec<[_; 4]> = infos.into_iter().filter(|info| !info.is_empty()).collect();
        for info in &infos {
            sluice_core::sluice_slow_assert!(
                flush_caches || info.command_buffers.is_empty(),
                "Sparse binding doesn't take command buffers"
            );
            for (semaphore, _) in info.waits.iter().chain(&info.signals) {
                semaphore.assert_device_owner(device);
            }
        }

        if let Some(fence) = &fence {
            fence.assert_device_owner(device);
            sluice_core::sluice_slow_assert!(
                !fence.is_signaled() && !fence.is_submitted(),
                "Fence must be reset before submission"
            );
        }

        let fence_syncobj = fence.as_ref().map(|fence| fence.active());
        let count = infos.len();
        let mut flushed = !flush_caches;
        let mut payloads: SmallVec<[Payload<B>; 4]> = SmallVec::new();

        for (index, info) in infos.into_iter().enumerate() {
            let flush = !flushed && !info.command_buffers.is_empty();
            flushed |= flush;
            let fence = if index + 1 == count {
                fence_syncobj.clone()
            } else {
                None
            };
            payloads.push(Payload::new(info, flush, fence));
        }

        if payloads.is_empty() {
            match fence_syncobj {
                Some(fence) => payloads.push(Payload::fence_only(fence)),
                None => return Ok(()),
            }
        }

        if let Some(fence) = fence {
            let epoch = self.shared.next_epoch.fetch_add(1, Ordering::AcqRel);
            fence.mark_submitted(FenceEpoch {
                queue: self.shared.id,
                epoch,
            });
        }

        let mut wakeups = Wakeups::new();
        for payload in payloads {
            self.shared.enqueue(payload, &mut wakeups);
        }
        wakeups.process();
        Ok(())
    }

    /// Wait until every accepted submission is dispatched.
    /// Fails as soon as the device is lost.
    pub fn wait_idle(&self, deadline: Deadline) -> Result<WaitStatus, DeviceLost> {
        profile_scope!("wait_idle");

        // Device loss doesn't notify `idle`, so waits are sliced by the poll interval.
        let poll_interval = self.shared.worker.poll_interval();
        let mut pending = self.shared.pending.lock();
        loop {
            self.shared.device.check()?;
            if pending.is_empty() {
                return Ok(WaitStatus::Signaled);
            }
            if deadline.is_expired() {
                return Ok(WaitStatus::Timeout);
            }

            match Deadline::after(poll_interval).min(deadline) {
                Deadline::Never => self.shared.idle.wait(&mut pending),
                Deadline::At(instant) => {
                    let _ = self.shared.idle.wait_until(&mut pending, instant);
                }
            }
        }
    }

    /// Stop the worker and destroy the queue.
    /// Submissions still waiting for dependencies are dropped and never reach hardware.
    pub fn dispose(self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.worker().shutdown();

        let leftover: Vec<_> = self.shared.pending.lock().drain(..).collect();
        if !leftover.is_empty() {
            log::warn!(
                "{} submissions to {:?} never reached hardware",
                leftover.len(),
                self.shared.id
            );
        }
        drop(leftover);

        self.relevant.dispose();
    }
}
