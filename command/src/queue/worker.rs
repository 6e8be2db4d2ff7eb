//! Per-queue thread that waits for external dependencies.
//!
//! Submissions that wait on kernel timeline points which are not even submitted yet
//! can't be handed to the hardware. Instead of blocking the submitting thread
//! they are passed to the queue worker which waits and dispatches them.

use {
    crate::{
        dispatch::{execute, Wakeups},
        submission::{Payload, Submission},
    },
    crossbeam_channel::{unbounded, RecvTimeoutError, Receiver, Sender},
    parking_lot::Mutex,
    sluice_core::{Backend, Deadline, QueueId, WaitMode, WaitStatus},
    std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread::JoinHandle,
        time::Duration,
    },
};

/// Worker thread configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkerConfig {
    /// Upper bound of a single blocking wait.
    /// Cancellation is observed between waits.
    pub poll_interval: Duration,

    /// Prefix of worker thread names.
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            poll_interval: Duration::from_millis(50),
            thread_name: "sluice-queue".into(),
        }
    }
}

/// Flag shared with the worker thread to request shutdown.
#[derive(Clone, Debug, Default)]
pub(crate) struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

type Job<B> = (Arc<Submission<B>>, Payload<B>);

#[derive(derivative::Derivative)]
#[derivative(Debug(bound = ""))]
struct Thread<B: Backend> {
    #[derivative(Debug = "ignore")]
    sender: Sender<Job<B>>,
    handle: JoinHandle<()>,
}

/// Lazily spawned worker.
#[derive(derivative::Derivative)]
#[derivative(Debug(bound = ""))]
pub(crate) struct Worker<B: Backend> {
    queue: QueueId,
    config: WorkerConfig,
    cancel: CancellationToken,
    thread: Mutex<Option<Thread<B>>>,
}

impl<B> Worker<B>
where
    B: Backend,
{
    pub fn new(queue: QueueId, config: WorkerConfig) -> Self {
        Worker {
            queue,
            config,
            cancel: CancellationToken::default(),
            thread: Mutex::new(None),
        }
    }

    /// Upper bound of a single blocking wait.
    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    /// Check if thread was spawned.
    pub fn is_spawned(&self) -> bool {
        self.thread.lock().is_some()
    }

    /// Pass submission to the worker, spawning it if necessary.
    /// Gives the job back if the thread can't be spawned.
    pub fn hand_off(&self, job: Job<B>) -> Result<(), Job<B>> {
        let mut thread = self.thread.lock();
        if self.cancel.is_cancelled() {
            return Err(job);
        }

        if thread.is_none() {
            let (sender, receiver) = unbounded();
            let name = format!(
                "{}-{}-{}",
                self.config.thread_name, self.queue.family.index, self.queue.index
            );
            let cancel = self.cancel.clone();
            let poll_interval = self.config.poll_interval;

            log::debug!("Spawn worker thread {} for {:?}", name, self.queue);
            let handle = match std::thread::Builder::new()
                .name(name)
                .spawn(move || run(receiver, cancel, poll_interval))
            {
                Ok(handle) => handle,
                Err(error) => {
                    log::error!("Failed to spawn worker for {:?}: {}", self.queue, error);
                    return Err(job);
                }
            };
            *thread = Some(Thread { sender, handle });
        }

        match &*thread {
            Some(thread) => thread.sender.send(job).map_err(|error| error.into_inner()),
            None => Err(job),
        }
    }

    /// Stop the thread and wait for it to finish.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let thread = self.thread.lock().take();
        if let Some(Thread { sender, handle }) = thread {
            drop(sender);
            if handle.join().is_err() {
                log::error!("Worker thread of {:?} panicked", self.queue);
            }
        }
    }
}

fn run<B>(receiver: Receiver<Job<B>>, cancel: CancellationToken, poll_interval: Duration)
where
    B: Backend,
{
    while !cancel.is_cancelled() {
        let (submission, payload) = match receiver.recv_timeout(poll_interval) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if !wait_available(&submission, &payload, &cancel, poll_interval) {
            log::warn!(
                "Worker of {:?} cancelled, submission never reached hardware",
                submission.queue().id()
            );
            break;
        }

        let mut wakeups = Wakeups::new();
        execute(submission, payload, &mut wakeups);
        wakeups.process();
    }
}

/// Wait until every kernel timeline point the payload waits for has work submitted.
/// Returns `false` if cancelled first.
/// Returns `true` early once the device is lost so the submission fails fast.
fn wait_available<B>(
    submission: &Submission<B>,
    payload: &Payload<B>,
    cancel: &CancellationToken,
    poll_interval: Duration,
) -> bool
where
    B: Backend,
{
    let device = submission.queue().device();
    let points = payload.timeline_syncobj_waits();

    loop {
        if cancel.is_cancelled() {
            return false;
        }
        if device.is_lost() {
            return true;
        }

        match device.syncobjs().timeline_wait(
            &points,
            WaitMode::All,
            true,
            Deadline::after(poll_interval),
        ) {
            Ok(WaitStatus::Signaled) => return true,
            Ok(WaitStatus::Timeout) => continue,
            Err(_) => {
                // Dispatch fails fast and releases everything.
                device.set_lost("Wait for external dependency failed");
                return true;
            }
        }
    }
}
