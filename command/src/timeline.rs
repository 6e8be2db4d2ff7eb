//! Host emulated timeline semaphore.
//!
//! Timeline is a monotonic counter backed by binary syncobjs.
//! Every value some submission signals gets its own point with a syncobj.
//! Points are kept sorted by value and reclaimed once signaled and unused.

use {
    crate::{dispatch::Wakeups, submission::Submission},
    parking_lot::{Condvar, Mutex},
    relevant::Relevant,
    sluice_core::{
        Backend, Deadline, DeviceLost, SubmitError, SyncobjDevice, Syncobj, WaitMode,
        WaitStatus,
    },
    std::{collections::VecDeque, sync::Arc},
};

#[derive(Debug)]
struct Point<B: Backend> {
    value: u64,
    syncobj: Syncobj<B>,
    wait_count: u32,
}

#[derive(derivative::Derivative)]
#[derivative(Debug)]
struct Waiter<B: Backend> {
    value: u64,
    #[derivative(Debug = "ignore")]
    submission: Arc<Submission<B>>,
}

#[derive(Debug)]
struct State<B: Backend> {
    highest_signaled: u64,
    highest_submitted: u64,

    /// Point storage. Slots are never removed, only recycled.
    points: Vec<Point<B>>,

    /// Indices of live points in ascending value order.
    live: VecDeque<usize>,

    /// Indices of reclaimed points ready for reuse.
    free: Vec<usize>,

    waiters: Vec<Waiter<B>>,
}

/// Borrow of a timeline point.
/// Keeps the point alive until returned with [`Timeline::release`] or [`Timeline::finalize_signal`].
#[derive(Debug)]
pub struct PointBorrow<B: Backend> {
    index: usize,
    value: u64,
    syncobj: B::Syncobj,
    relevant: Relevant,
}

impl<B> PointBorrow<B>
where
    B: Backend,
{
    /// Value of the point.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Syncobj signaled when the point is reached.
    pub fn syncobj(&self) -> B::Syncobj {
        self.syncobj
    }
}

/// Timeline semaphore payload.
#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub struct Timeline<B: Backend> {
    state: Mutex<State<B>>,
    condvar: Condvar,
    #[derivative(Debug = "ignore")]
    device: Arc<dyn SyncobjDevice<B>>,
}

impl<B> Timeline<B>
where
    B: Backend,
{
    /// Create timeline with initial value.
    pub fn new(device: &Arc<dyn SyncobjDevice<B>>, initial: u64) -> Self {
        Timeline {
            state: Mutex::new(State {
                highest_signaled: initial,
                highest_submitted: initial,
                points: Vec::new(),
                live: VecDeque::new(),
                free: Vec::new(),
                waiters: Vec::new(),
            }),
            condvar: Condvar::new(),
            device: device.clone(),
        }
    }

    /// Current value. Reclaims signaled points first.
    pub fn value(&self) -> u64 {
        let mut state = self.state.lock();
        state.garbage_collect();
        state.highest_signaled
    }

    /// Highest value some submission that signals this timeline was dispatched for.
    pub fn highest_submitted(&self) -> u64 {
        self.state.lock().highest_submitted
    }

    /// Number of points that are not reclaimed yet.
    pub fn live_points(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Number of points ever created.
    pub fn allocated_points(&self) -> usize {
        self.state.lock().points.len()
    }

    /// Borrow the first point with value at least `value`.
    /// Returns `None` if the value is already signaled.
    pub fn find_point_at_least(&self, value: u64) -> Option<PointBorrow<B>> {
        self.state.lock().find_point_at_least(value)
    }

    /// Add point for `value`.
    /// Returns `None` if the value is already signaled or another submission signals it.
    pub fn add_point(&self, value: u64) -> Result<Option<PointBorrow<B>>, SubmitError> {
        let mut state = self.state.lock();
        if value <= state.highest_signaled {
            return Ok(None);
        }

        let position = match state.live.binary_search_by_key(&value, |&index| state.points[index].value) {
            Ok(_) => return Ok(None),
            Err(position) => position,
        };

        let index = match state.free.pop() {
            Some(index) => {
                if let Err(error) = state.points[index].syncobj.reset() {
                    state.free.push(index);
                    return Err(error.into());
                }
                let point = &mut state.points[index];
                point.value = value;
                point.wait_count = 1;
                index
            }
            None => {
                let syncobj = Syncobj::new(&self.device, false)?;
                state.points.push(Point {
                    value,
                    syncobj,
                    wait_count: 1,
                });
                state.points.len() - 1
            }
        };

        state.live.insert(position, index);
        let syncobj = state.points[index].syncobj.raw();
        Ok(Some(PointBorrow {
            index,
            value,
            syncobj,
            relevant: Relevant,
        }))
    }

    /// Return point borrow.
    pub fn release(&self, point: PointBorrow<B>) {
        let mut state = self.state.lock();
        state.release(point);
    }

    /// Register submission that must not be released before `value` is submitted.
    /// Returns `false` if `value` is already submitted and nothing was registered.
    pub(crate) fn register_waiter(&self, value: u64, submission: &Arc<Submission<B>>) -> bool {
        let mut state = self.state.lock();
        if state.highest_submitted < value {
            state.waiters.push(Waiter {
                value,
                submission: submission.clone(),
            });
            true
        } else {
            false
        }
    }

    /// Signal `value` from host.
    pub(crate) fn signal(&self, value: u64, wakeups: &mut Wakeups<B>) {
        let mut state = self.state.lock();
        state.highest_signaled = state.highest_signaled.max(value);
        state.highest_submitted = state.highest_submitted.max(value);
        state.garbage_collect();
        state.trigger_waiters(wakeups);
        self.condvar.notify_all();
    }

    /// Record that work signaling `value` reached the hardware.
    pub(crate) fn finalize_signal(
        &self,
        point: Option<PointBorrow<B>>,
        value: u64,
        wakeups: &mut Wakeups<B>,
    ) {
        let mut state = self.state.lock();
        if let Some(point) = point {
            state.release(point);
        }
        state.highest_submitted = state.highest_submitted.max(value);
        state.trigger_waiters(wakeups);
        self.condvar.notify_all();
    }

    /// Block until `value` is signaled or the deadline is reached.
    pub fn wait(&self, value: u64, deadline: Deadline) -> Result<WaitStatus, DeviceLost> {
        let point = {
            let mut state = self.state.lock();
            while state.highest_submitted < value {
                match deadline {
                    Deadline::Never => self.condvar.wait(&mut state),
                    Deadline::At(instant) => {
                        if self.condvar.wait_until(&mut state, instant).timed_out()
                            && state.highest_submitted < value
                        {
                            return Ok(WaitStatus::Timeout);
                        }
                    }
                }
            }
            state.find_point_at_least(value)
        };

        match point {
            None => Ok(WaitStatus::Signaled),
            Some(point) => {
                let status = self.device.wait_syncobjs(
                    &[point.syncobj],
                    WaitMode::All,
                    deadline,
                );
                self.release(point);
                status
            }
        }
    }
}

impl<B> State<B>
where
    B: Backend,
{
    fn garbage_collect(&mut self) {
        while let Some(&index) = self.live.front() {
            let point = &self.points[index];
            if point.wait_count > 0 || point.value > self.highest_submitted {
                break;
            }

            match point.syncobj.is_signaled() {
                Ok(true) => {}
                Ok(false) | Err(DeviceLost) => break,
            }

            self.highest_signaled = self.highest_signaled.max(point.value);
            self.live.pop_front();
            self.free.push(index);
        }
    }

    fn find_point_at_least(&mut self, value: u64) -> Option<PointBorrow<B>> {
        self.garbage_collect();
        if value <= self.highest_signaled {
            return None;
        }

        let index = self
            .live
            .iter()
            .copied()
            .find(|&index| self.points[index].value >= value)?;

        let point = &mut self.points[index];
        point.wait_count += 1;
        Some(PointBorrow {
            index,
            value: point.value,
            syncobj: point.syncobj.raw(),
            relevant: Relevant,
        })
    }

    fn release(&mut self, point: PointBorrow<B>) {
        let PointBorrow {
            index, relevant, ..
        } = point;
        relevant.dispose();

        let point = &mut self.points[index];
        sluice_core::sluice_slow_assert!(point.wait_count > 0);
        point.wait_count -= 1;
    }

    fn trigger_waiters(&mut self, wakeups: &mut Wakeups<B>) {
        let highest_submitted = self.highest_submitted;
        let mut index = 0;
        while index < self.waiters.len() {
            if self.waiters[index].value <= highest_submitted {
                let waiter = self.waiters.swap_remove(index);
                wakeups.satisfied(waiter.submission);
            } else {
                index += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        rand::{seq::SliceRandom, Rng},
        sluice_soft::SoftBackend,
    };

    fn timeline(initial: u64) -> (Arc<sluice_soft::SoftSyncobjs>, Timeline<SoftBackend>) {
        let syncobjs = Arc::new(sluice_soft::SoftSyncobjs::new());
        let device: Arc<dyn SyncobjDevice<SoftBackend>> = syncobjs.clone();
        (syncobjs, Timeline::new(&device, initial))
    }

    #[test]
    fn add_point_rejects_signaled_and_duplicate_values() {
        let (_, timeline) = timeline(3);
        assert!(timeline.add_point(3).unwrap().is_none());

        let point = timeline.add_point(5).unwrap().unwrap();
        assert_eq!(point.value(), 5);
        assert!(timeline.add_point(5).unwrap().is_none());

        timeline.release(point);
    }

    #[test]
    fn points_are_recycled_after_signal() {
        let (syncobjs, timeline) = timeline(0);
        let mut wakeups = Wakeups::new();

        let point = timeline.add_point(1).unwrap().unwrap();
        syncobjs.signal_syncobjs(&[point.syncobj()]).unwrap();
        timeline.finalize_signal(Some(point), 1, &mut wakeups);
        assert_eq!(timeline.value(), 1);
        assert_eq!(timeline.live_points(), 0);

        let point = timeline.add_point(2).unwrap().unwrap();
        assert_eq!(timeline.allocated_points(), 1);
        assert!(!syncobjs.is_signaled(point.syncobj()));
        timeline.release(point);
    }

    #[test]
    fn value_lags_until_point_syncobj_signals() {
        let (syncobjs, timeline) = timeline(0);
        let mut wakeups = Wakeups::new();

        let point = timeline.add_point(4).unwrap().unwrap();
        let raw = point.syncobj();
        timeline.finalize_signal(Some(point), 4, &mut wakeups);
        assert_eq!(timeline.highest_submitted(), 4);
        assert_eq!(timeline.value(), 0);

        let borrowed = timeline.find_point_at_least(2).unwrap();
        assert_eq!(borrowed.value(), 4);

        syncobjs.signal_syncobjs(&[raw]).unwrap();
        assert_eq!(timeline.value(), 0, "Borrowed point must not be reclaimed");
        timeline.release(borrowed);
        assert_eq!(timeline.value(), 4);
        assert!(timeline.find_point_at_least(4).is_none());
    }

    #[test]
    fn host_signal_is_monotonic() {
        let (_, timeline) = timeline(0);
        let mut wakeups = Wakeups::new();
        timeline.signal(7, &mut wakeups);
        timeline.signal(3, &mut wakeups);
        assert_eq!(timeline.value(), 7);
        assert_eq!(timeline.highest_submitted(), 7);
    }

    #[test]
    fn wait_times_out_without_signal() {
        let (_, timeline) = timeline(0);
        let status = timeline
            .wait(1, Deadline::after(std::time::Duration::from_millis(10)))
            .unwrap();
        assert_eq!(status, WaitStatus::Timeout);
    }

    #[test]
    fn wait_wakes_on_host_signal() {
        let (_, timeline) = timeline(0);
        let timeline = Arc::new(timeline);

        let waiter = {
            let timeline = timeline.clone();
            std::thread::spawn(move || timeline.wait(2, Deadline::Never).unwrap())
        };

        std::thread::sleep(std::time::Duration::from_millis(10));
        let mut wakeups = Wakeups::new();
        timeline.signal(2, &mut wakeups);

        assert_eq!(waiter.join().unwrap(), WaitStatus::Signaled);
    }

    #[test]
    fn random_signal_order_keeps_value_monotonic() {
        let _ = env_logger::builder().is_test(true).try_init();

        let (syncobjs, timeline) = timeline(0);
        let mut rng = rand::thread_rng();
        let mut values: Vec<u64> = (1..=32).collect();
        values.shuffle(&mut rng);

        let mut last = 0;
        for value in values {
            let mut wakeups = Wakeups::new();
            if let Some(point) = timeline.add_point(value).unwrap() {
                if rng.gen_bool(0.7) {
                    syncobjs.signal_syncobjs(&[point.syncobj()]).unwrap();
                }
                timeline.finalize_signal(Some(point), value, &mut wakeups);
            }
            wakeups.process();

            let current = timeline.value();
            assert!(current >= last);
            assert!(current <= timeline.highest_submitted());
            last = current;
        }

        let mut wakeups = Wakeups::new();
        timeline.signal(32, &mut wakeups);
        wakeups.process();
        assert_eq!(timeline.value(), 32);
    }
}
