//! Dispatcher hands ready submissions to the hardware.
//!
//! Dispatching a submission may satisfy dependencies of other submissions,
//! on this queue or any other. Those are collected in [`Wakeups`]
//! and processed by the same thread until nothing is left.

use {
    crate::{
        queue::QueueShared,
        semaphore::SemaphorePart,
        submission::{Payload, Submission},
        timeline::{PointBorrow, Timeline},
    },
    smallvec::SmallVec,
    sluice_core::{
        Backend, Deadline, HwSubmission, QueueType, SubmitError, SyncobjPoint, WaitMode,
        WaitStatus,
    },
    std::sync::Arc,
    thread_profiler::profile_scope,
};

/// Work released while holding no locks, processed later by the releasing thread.
#[derive(derivative::Derivative)]
#[derivative(Debug(bound = ""), Default(bound = ""))]
pub(crate) struct Wakeups<B: Backend> {
    /// Submissions with one dependency satisfied.
    satisfied: SmallVec<[Arc<Submission<B>>; 4]>,

    /// Queues with submissions in the ready channel.
    queues: SmallVec<[Arc<QueueShared<B>>; 4]>,
}

impl<B> Wakeups<B>
where
    B: Backend,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// One dependency of `submission` is satisfied.
    pub fn satisfied(&mut self, submission: Arc<Submission<B>>) {
        self.satisfied.push(submission);
    }

    /// Queue has ready submissions.
    pub fn queue(&mut self, queue: Arc<QueueShared<B>>) {
        if !self.queues.iter().any(|q| Arc::ptr_eq(q, &queue)) {
            self.queues.push(queue);
        }
    }

    /// Release satisfied submissions and dispatch everything that becomes ready.
    pub fn process(mut self) {
        loop {
            if let Some(submission) = self.satisfied.pop() {
                submission.decrement(1, &mut self);
            } else if let Some(queue) = self.queues.pop() {
                queue.drain(&mut self);
            } else {
                break;
            }
        }
    }
}

/// Dispatch claimed submission.
/// Hands it to the queue worker if it waits for kernel timeline points not yet submitted.
pub(crate) fn dispatch<B>(submission: Arc<Submission<B>>, wakeups: &mut Wakeups<B>)
where
    B: Backend,
{
    profile_scope!("dispatch");

    if submission.queue().is_closed() {
        log::trace!("Drop submission to disposed {:?}", submission.queue().id());
        return;
    }

    let payload = match submission.take_payload() {
        Some(payload) => payload,
        None => {
            log::error!("Submission dispatched twice");
            return;
        }
    };

    if payload.has_timeline_syncobj_waits() {
        let device = submission.queue().device().clone();
        let points = payload.timeline_syncobj_waits();
        match device
            .syncobjs()
            .timeline_wait(&points, WaitMode::All, true, Deadline::now())
        {
            Ok(WaitStatus::Signaled) => {}
            Ok(WaitStatus::Timeout) => {
                let queue = submission.queue().clone();
                log::trace!("Submission to {:?} waits for external dependency", queue.id());
                match queue.worker().hand_off((submission, payload)) {
                    Ok(()) => return,
                    Err(_) if queue.is_closed() => {
                        log::trace!("Drop submission to disposed {:?}", queue.id());
                        return;
                    }
                    Err((submission, payload)) => {
                        device.set_lost("Queue worker is unavailable");
                        execute(submission, payload, wakeups);
                        return;
                    }
                }
            }
            Err(_) => {
                device.set_lost("Wait for external dependency failed");
            }
        }
    }

    execute(submission, payload, wakeups);
}

#[derive(derivative::Derivative)]
#[derivative(Default(bound = ""))]
struct Resolved<B: Backend> {
    waits: SmallVec<[SyncobjPoint<B::Syncobj>; 8]>,
    signals: SmallVec<[SyncobjPoint<B::Syncobj>; 8]>,
    wait_points: SmallVec<[(Arc<Timeline<B>>, PointBorrow<B>); 4]>,
    signal_points: SmallVec<[(Arc<Timeline<B>>, Option<PointBorrow<B>>, u64); 4]>,
}

/// Submit unblocked submission to the hardware and finalize timelines.
///
/// Any failure marks the device lost. Syncobjs the submission would signal
/// are then signaled from host and timelines are finalized anyway
/// so nobody waits forever.
pub(crate) fn execute<B>(
    submission: Arc<Submission<B>>,
    payload: Payload<B>,
    wakeups: &mut Wakeups<B>,
) where
    B: Backend,
{
    profile_scope!("execute");

    let queue = submission.queue().clone();
    let device = queue.device().clone();
    let mut resolved = Resolved::default();

    if let Err(error) = submit(&queue, &payload, &mut resolved) {
        device.set_lost(&format!("Submission to {:?} failed: {}", queue.id(), error));

        let binary: SmallVec<[_; 8]> = resolved
            .signals
            .iter()
            .filter(|point| point.value.is_none())
            .map(|point| point.syncobj)
            .chain(payload.fence.as_ref().map(|fence| fence.raw()))
            .collect();
        let timeline: SmallVec<[_; 8]> = resolved
            .signals
            .iter()
            .filter_map(|point| point.value.map(|value| (point.syncobj, value)))
            .collect();

        if device.syncobjs().signal_syncobjs(&binary).is_err()
            || device.syncobjs().timeline_signal(&timeline).is_err()
        {
            log::error!("Failed to signal syncobjs of failed submission");
        }
    }

    let Resolved {
        wait_points,
        signal_points,
        ..
    } = resolved;

    for (timeline, point) in wait_points {
        timeline.release(point);
    }

    for (timeline, point, value) in signal_points {
        timeline.finalize_signal(point, value, wakeups);
    }

    drop(payload);
    queue.complete(&submission, wakeups);
}

fn submit<B>(
    queue: &QueueShared<B>,
    payload: &Payload<B>,
    resolved: &mut Resolved<B>,
) -> Result<(), SubmitError>
where
    B: Backend,
{
    for (part, value) in &payload.waits {
        match part {
            SemaphorePart::None => {}
            SemaphorePart::Binary(syncobj) => {
                resolved.waits.push(SyncobjPoint::binary(syncobj.raw()));
            }
            SemaphorePart::Timeline(timeline) => {
                if let Some(point) = timeline.find_point_at_least(*value) {
                    resolved.waits.push(SyncobjPoint::binary(point.syncobj()));
                    resolved.wait_points.push((timeline.clone(), point));
                }
            }
            SemaphorePart::TimelineSyncobj(timeline) => {
                resolved
                    .waits
                    .push(SyncobjPoint::timeline(timeline.raw(), *value));
            }
        }
    }

    for (part, value) in &payload.signals {
        match part {
            SemaphorePart::None => {}
            SemaphorePart::Binary(syncobj) => {
                resolved.signals.push(SyncobjPoint::binary(syncobj.raw()));
            }
            SemaphorePart::Timeline(timeline) => {
                let point = timeline.add_point(*value);
                let point = match point {
                    Ok(point) => point,
                    Err(error) => {
                        // Still advance the timeline so its waiters are released.
                        resolved.signal_points.push((timeline.clone(), None, *value));
                        return Err(error);
                    }
                };
                if let Some(point) = &point {
                    resolved.signals.push(SyncobjPoint::binary(point.syncobj()));
                }
                resolved.signal_points.push((timeline.clone(), point, *value));
            }
            SemaphorePart::TimelineSyncobj(timeline) => {
                timeline.update_max_point(*value);
                resolved
                    .signals
                    .push(SyncobjPoint::timeline(timeline.raw(), *value));
            }
        }
    }

    let device = queue.device();
    device.check()?;

    for bind in &payload.binds {
        device.winsys().bind_sparse(queue.id(), bind)?;
    }

    if payload.command_buffers.is_empty()
        && resolved.waits.is_empty()
        && resolved.signals.is_empty()
        && payload.fence.is_none()
    {
        return Ok(());
    }

    let preamble = if payload.command_buffers.is_empty()
        || queue.queue_type() == QueueType::Transfer
    {
        None
    } else {
        Some(queue.preamble(&payload.requirements())?)
    };

    log::trace!(
        "Dispatch to {:?}: {} command buffers, {} waits, {} signals, fence: {}",
        queue.id(),
        payload.command_buffers.len(),
        resolved.waits.len(),
        resolved.signals.len(),
        payload.fence.is_some()
    );

    device.winsys().submit(HwSubmission {
        queue: queue.id(),
        preamble: preamble.as_ref().map(|preamble| preamble.raw()),
        flush_caches: payload.flush_caches,
        command_buffers: &payload.command_buffers,
        waits: &resolved.waits,
        signals: &resolved.signals,
        fence: payload.fence.as_ref().map(|fence| fence.raw()),
    })
}
