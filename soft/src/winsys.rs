use {
    crate::{SoftBackend, SoftPreamble, SoftSyncobj, SoftSyncobjs},
    parking_lot::Mutex,
    sluice_core::{
        DeviceLost, HwSubmission, OutOfMemory, PreambleRequirements, QueueId, SparseBind,
        SubmitError, SyncobjDevice, SyncobjPoint, Winsys,
    },
    std::{
        sync::Arc,
        thread::{self, ThreadId},
    },
};

/// Submission as seen by the hardware.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitRecord {
    /// Target queue.
    pub queue: QueueId,

    /// Labels of submitted command buffers.
    pub command_buffers: Vec<u64>,

    /// Id of preamble that was used.
    pub preamble: Option<u32>,

    /// Whether caches were flushed.
    pub flush_caches: bool,

    /// Waited syncobjs.
    pub waits: Vec<SyncobjPoint<SoftSyncobj>>,

    /// Signaled syncobjs.
    pub signals: Vec<SyncobjPoint<SoftSyncobj>>,

    /// Signaled fence.
    pub fence: Option<SoftSyncobj>,

    /// Thread that submitted.
    pub thread: ThreadId,
}

#[derive(Debug, Default)]
struct Completion {
    binary: Vec<SoftSyncobj>,
    timeline: Vec<(SoftSyncobj, u64)>,
}

#[derive(Debug, Default)]
struct State {
    records: Vec<SubmitRecord>,
    binds: Vec<(QueueId, usize)>,
    held: Vec<Completion>,
    hold: bool,
    fail_submits: bool,
    next_preamble: u32,
    preambles_alive: usize,
}

/// Recording winsys with instantly completing queues.
#[derive(Debug)]
pub struct SoftWinsys {
    syncobjs: Arc<SoftSyncobjs>,
    state: Mutex<State>,
}

impl SoftWinsys {
    /// Create winsys that signals syncobjs from `syncobjs`.
    pub fn new(syncobjs: Arc<SoftSyncobjs>) -> Self {
        SoftWinsys {
            syncobjs,
            state: Mutex::new(State::default()),
        }
    }

    /// Keep submitted work incomplete until [`SoftWinsys::complete`] is called.
    pub fn hold(&self, hold: bool) {
        self.state.lock().hold = hold;
    }

    /// Complete all held work.
    pub fn complete(&self) -> Result<(), DeviceLost> {
        let held = std::mem::replace(&mut self.state.lock().held, Vec::new());
        for completion in held {
            self.complete_one(completion)?;
        }
        Ok(())
    }

    /// Make following submissions fail as if the device was lost.
    pub fn fail_submits(&self, fail: bool) {
        self.state.lock().fail_submits = fail;
    }

    /// Recorded submissions in submission order.
    pub fn records(&self) -> Vec<SubmitRecord> {
        self.state.lock().records.clone()
    }

    /// Labels of submitted command buffers in submission order.
    pub fn submitted_labels(&self) -> Vec<u64> {
        self.state
            .lock()
            .records
            .iter()
            .flat_map(|record| record.command_buffers.iter().cloned())
            .collect()
    }

    /// Sparse binding operations executed, with number of ranges in each.
    pub fn binds(&self) -> Vec<(QueueId, usize)> {
        self.state.lock().binds.clone()
    }

    /// Number of preambles ever created.
    pub fn preambles_created(&self) -> u32 {
        self.state.lock().next_preamble
    }

    /// Number of preambles not destroyed yet.
    pub fn preambles_alive(&self) -> usize {
        self.state.lock().preambles_alive
    }

    fn complete_one(&self, completion: Completion) -> Result<(), DeviceLost> {
        self.syncobjs.signal_syncobjs(&completion.binary)?;
        self.syncobjs.timeline_signal(&completion.timeline)
    }
}

impl Winsys<SoftBackend> for SoftWinsys {
    fn create_preamble(
        &self,
        _queue: QueueId,
        requirements: &PreambleRequirements,
    ) -> Result<SoftPreamble, OutOfMemory> {
        let mut state = self.state.lock();
        let id = state.next_preamble;
        state.next_preamble += 1;
        state.preambles_alive += 1;
        Ok(SoftPreamble {
            id,
            requirements: *requirements,
        })
    }

    fn destroy_preamble(&self, _preamble: SoftPreamble) {
        self.state.lock().preambles_alive -= 1;
    }

    fn bind_sparse(&self, queue: QueueId, bind: &SparseBind<SoftBackend>) -> Result<(), SubmitError> {
        let mut state = self.state.lock();
        if state.fail_submits {
            return Err(DeviceLost.into());
        }
        state.binds.push((queue, bind.len()));
        Ok(())
    }

    fn submit(&self, submission: HwSubmission<'_, SoftBackend>) -> Result<(), SubmitError> {
        let completion = {
            let mut state = self.state.lock();
            if state.fail_submits {
                return Err(DeviceLost.into());
            }

            state.records.push(SubmitRecord {
                queue: submission.queue,
                command_buffers: submission
                    .command_buffers
                    .iter()
                    .map(|cb| cb.label)
                    .collect(),
                preamble: submission.preamble.map(|preamble| preamble.id),
                flush_caches: submission.flush_caches,
                waits: submission.waits.to_vec(),
                signals: submission.signals.to_vec(),
                fence: submission.fence,
                thread: thread::current().id(),
            });

            let completion = Completion {
                binary: submission
                    .signals
                    .iter()
                    .filter(|point| point.value.is_none())
                    .map(|point| point.syncobj)
                    .chain(submission.fence)
                    .collect(),
                timeline: submission
                    .signals
                    .iter()
                    .filter_map(|point| point.value.map(|value| (point.syncobj, value)))
                    .collect(),
            };

            if state.hold {
                for &(syncobj, value) in &completion.timeline {
                    self.syncobjs.make_available(syncobj, value)?;
                }
                state.held.push(completion);
                return Ok(());
            }
            completion
        };

        self.complete_one(completion)?;
        Ok(())
    }
}
