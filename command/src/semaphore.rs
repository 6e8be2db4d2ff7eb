//! Binary and timeline semaphores.
//!
//! Semaphore payload lives in a [`SemaphorePart`].
//! A semaphore has a permanent part and optionally a temporary one installed by import.
//! Waiting on a semaphore moves its temporary part into the submission.

use {
    crate::{device::Device, dispatch::Wakeups, timeline::Timeline},
    parking_lot::Mutex,
    sluice_core::{
        device_owned, Backend, Deadline, DeviceId, DeviceLost, ExternalError, ExternalHandle,
        ExternalHandleKind, InvalidExternalHandle, OutOfMemory, Syncobj,
        WaitMode, WaitStatus,
    },
    std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

/// Kind of the semaphore.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SemaphoreKind {
    /// Binary semaphore. Values are ignored.
    Binary,

    /// Counting semaphore with monotonic 64-bit value.
    Timeline,
}

/// Timeline implemented by the kernel.
#[derive(Debug)]
pub struct TimelineSyncobj<B: Backend> {
    syncobj: Syncobj<B>,
    max_point: AtomicU64,
}

impl<B> TimelineSyncobj<B>
where
    B: Backend,
{
    fn new(syncobj: Syncobj<B>) -> Self {
        TimelineSyncobj {
            syncobj,
            max_point: AtomicU64::new(0),
        }
    }

    /// Raw syncobj.
    pub fn raw(&self) -> B::Syncobj {
        self.syncobj.raw()
    }

    /// Highest point any submission signals.
    pub fn max_point(&self) -> u64 {
        self.max_point.load(Ordering::Acquire)
    }

    pub(crate) fn update_max_point(&self, value: u64) {
        self.max_point.fetch_max(value, Ordering::AcqRel);
    }
}

/// Payload of a semaphore.
#[derive(derivative::Derivative)]
#[derivative(Clone(bound = ""), Debug(bound = ""))]
pub enum SemaphorePart<B: Backend> {
    /// No payload.
    None,

    /// Binary syncobj.
    Binary(Arc<Syncobj<B>>),

    /// Emulated timeline.
    Timeline(Arc<Timeline<B>>),

    /// Kernel timeline syncobj.
    TimelineSyncobj(Arc<TimelineSyncobj<B>>),
}

impl<B> SemaphorePart<B>
where
    B: Backend,
{
    /// Check if part holds no payload.
    pub fn is_none(&self) -> bool {
        match self {
            SemaphorePart::None => true,
            _ => false,
        }
    }

    fn export(&self, kind: ExternalHandleKind) -> Result<ExternalHandle, ExternalError> {
        match (self, kind) {
            (SemaphorePart::Binary(syncobj), _) => syncobj.export(kind),
            (SemaphorePart::TimelineSyncobj(timeline), ExternalHandleKind::OpaqueFd) => {
                timeline.syncobj.export(kind)
            }
            _ => Err(InvalidExternalHandle.into()),
        }
    }
}

#[derive(Debug)]
struct Parts<B: Backend> {
    permanent: SemaphorePart<B>,
    temporary: SemaphorePart<B>,
}

impl<B> Parts<B>
where
    B: Backend,
{
    fn active(&self) -> &SemaphorePart<B> {
        if self.temporary.is_none() {
            &self.permanent
        } else {
            &self.temporary
        }
    }
}

/// Semaphore that can be waited and signaled by submissions.
#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub struct Semaphore<B: Backend> {
    device: DeviceId,
    kind: SemaphoreKind,
    parts: Mutex<Parts<B>>,
    #[derivative(Debug = "ignore")]
    shared: Arc<Device<B>>,
}

device_owned!(Semaphore<B>);

impl<B> Semaphore<B>
where
    B: Backend,
{
    /// Create binary semaphore.
    pub fn binary(device: &Arc<Device<B>>) -> Result<Self, OutOfMemory> {
        let syncobj = Syncobj::new(device.syncobjs(), false)?;
        Ok(Self::from_part(
            device,
            SemaphoreKind::Binary,
            SemaphorePart::Binary(Arc::new(syncobj)),
        ))
    }

    /// Create timeline semaphore emulated on host.
    pub fn timeline(device: &Arc<Device<B>>, initial: u64) -> Self {
        Self::from_part(
            device,
            SemaphoreKind::Timeline,
            SemaphorePart::Timeline(Arc::new(Timeline::new(device.syncobjs(), initial))),
        )
    }

    /// Create timeline semaphore backed by kernel timeline syncobj.
    pub fn timeline_syncobj(device: &Arc<Device<B>>, initial: u64) -> Result<Self, OutOfMemory> {
        let syncobj = Syncobj::new(device.syncobjs(), false)?;
        if initial > 0 {
            device
                .syncobjs()
                .timeline_signal(&[(syncobj.raw(), initial)])
                .map_err(|DeviceLost| OutOfMemory::Device)?;
        }
        Ok(Self::from_part(
            device,
            SemaphoreKind::Timeline,
            SemaphorePart::TimelineSyncobj(Arc::new(TimelineSyncobj::new(syncobj))),
        ))
    }

    fn from_part(device: &Arc<Device<B>>, kind: SemaphoreKind, part: SemaphorePart<B>) -> Self {
        Semaphore {
            device: device.id(),
            kind,
            parts: Mutex::new(Parts {
                permanent: part,
                temporary: SemaphorePart::None,
            }),
            shared: device.clone(),
        }
    }

    /// Get kind of the semaphore.
    pub fn kind(&self) -> SemaphoreKind {
        self.kind
    }

    /// Check if temporary payload is installed.
    pub fn has_temporary(&self) -> bool {
        !self.parts.lock().temporary.is_none()
    }

    /// Part a waiting submission takes. Temporary part is moved out.
    pub(crate) fn take_wait_part(&self) -> SemaphorePart<B> {
        let mut parts = self.parts.lock();
        if parts.temporary.is_none() {
            parts.permanent.clone()
        } else {
            std::mem::replace(&mut parts.temporary, SemaphorePart::None)
        }
    }

    /// Part a signaling submission uses.
    pub(crate) fn signal_part(&self) -> SemaphorePart<B> {
        self.parts.lock().active().clone()
    }

    /// Signal timeline value from host.
    ///
    /// Submissions waiting for this value are released,
    /// possibly dispatching them on this thread.
    pub fn signal(&self, value: u64) -> Result<(), DeviceLost> {
        sluice_core::sluice_slow_assert_eq!(self.kind, SemaphoreKind::Timeline);
        self.shared.check()?;

        match self.signal_part() {
            SemaphorePart::Timeline(timeline) => {
                let mut wakeups = Wakeups::new();
                timeline.signal(value, &mut wakeups);
                wakeups.process();
                Ok(())
            }
            SemaphorePart::TimelineSyncobj(timeline) => {
                self.shared
                    .syncobjs()
                    .timeline_signal(&[(timeline.raw(), value)])?;
                timeline.update_max_point(value);
                Ok(())
            }
            SemaphorePart::Binary(syncobj) => syncobj.signal(),
            SemaphorePart::None => Ok(()),
        }
    }

    /// Current counter value.
    pub fn value(&self) -> Result<u64, DeviceLost> {
        self.shared.check()?;
        match self.signal_part() {
            SemaphorePart::Timeline(timeline) => Ok(timeline.value()),
            SemaphorePart::TimelineSyncobj(timeline) => {
                self.shared.syncobjs().timeline_query(timeline.raw())
            }
            SemaphorePart::Binary(syncobj) => syncobj.is_signaled().map(u64::from),
            SemaphorePart::None => Ok(0),
        }
    }

    /// Block until counter reaches `value`.
    pub fn wait(&self, value: u64, deadline: Deadline) -> Result<WaitStatus, DeviceLost> {
        self.shared.check()?;
        let status = match self.signal_part() {
            SemaphorePart::Timeline(timeline) => timeline.wait(value, deadline)?,
            SemaphorePart::TimelineSyncobj(timeline) => self.shared.syncobjs().timeline_wait(
                &[(timeline.raw(), value)],
                WaitMode::All,
                false,
                deadline,
            )?,
            SemaphorePart::Binary(syncobj) => syncobj.wait(deadline)?,
            SemaphorePart::None => WaitStatus::Signaled,
        };
        self.shared.check()?;
        Ok(status)
    }

    /// Kernel timeline point for this semaphore, if it is a kernel timeline.
    pub(crate) fn timeline_syncobj_point(&self, value: u64) -> Option<(B::Syncobj, u64)> {
        match self.signal_part() {
            SemaphorePart::TimelineSyncobj(timeline) => Some((timeline.raw(), value)),
            _ => None,
        }
    }

    /// Import payload from external handle.
    ///
    /// Opaque handles may replace either part.
    /// Sync-file handles can only be imported temporarily into binary semaphores.
    pub fn import(&self, handle: ExternalHandle, temporary: bool) -> Result<(), ExternalError> {
        self.shared.check()?;

        let mut parts = self.parts.lock();
        let part = match (handle.kind, self.kind, &parts.permanent) {
            (ExternalHandleKind::SyncFile, SemaphoreKind::Binary, _) if temporary => {
                SemaphorePart::Binary(Arc::new(Syncobj::import(self.shared.syncobjs(), handle)?))
            }
            (ExternalHandleKind::OpaqueFd, SemaphoreKind::Binary, _) => {
                SemaphorePart::Binary(Arc::new(Syncobj::import(self.shared.syncobjs(), handle)?))
            }
            (ExternalHandleKind::OpaqueFd, SemaphoreKind::Timeline, SemaphorePart::TimelineSyncobj(_)) => {
                let syncobj = Syncobj::import(self.shared.syncobjs(), handle)?;
                SemaphorePart::TimelineSyncobj(Arc::new(TimelineSyncobj::new(syncobj)))
            }
            _ => return Err(InvalidExternalHandle.into()),
        };

        log::trace!("Import {:?} into semaphore (temporary: {})", handle, temporary);
        if temporary {
            parts.temporary = part;
        } else {
            parts.temporary = SemaphorePart::None;
            parts.permanent = part;
        }
        Ok(())
    }

    /// Export payload.
    ///
    /// Exporting a sync file transfers the payload out:
    /// the temporary part is dropped, or the permanent syncobj is reset.
    pub fn export(&self, kind: ExternalHandleKind) -> Result<ExternalHandle, ExternalError> {
        self.shared.check()?;

        let mut parts = self.parts.lock();
        let handle = parts.active().export(kind)?;

        if kind == ExternalHandleKind::SyncFile {
            if parts.temporary.is_none() {
                if let SemaphorePart::Binary(syncobj) = &parts.permanent {
                    syncobj.reset()?;
                }
            } else {
                parts.temporary = SemaphorePart::None;
            }
        }

        Ok(handle)
    }
}

/// Wait for several semaphores to reach their values.
///
/// Waiting for all is done one by one with the same deadline.
/// Waiting for any is delegated to the kernel when every semaphore is a kernel timeline,
/// otherwise each semaphore is polled until the deadline.
pub fn wait_semaphores<B>(
    semaphores: &[(&Semaphore<B>, u64)],
    mode: WaitMode,
    deadline: Deadline,
) -> Result<WaitStatus, DeviceLost>
where
    B: Backend,
{
    match mode {
        WaitMode::All => {
            for &(semaphore, value) in semaphores {
                if let WaitStatus::Timeout = semaphore.wait(value, deadline)? {
                    return Ok(WaitStatus::Timeout);
                }
            }
            Ok(WaitStatus::Signaled)
        }
        WaitMode::Any => {
            let first = match semaphores.first() {
                Some(&(semaphore, _)) => semaphore,
                None => return Ok(WaitStatus::Signaled),
            };

            let points: Option<Vec<_>> = semaphores
                .iter()
                .map(|&(semaphore, value)| semaphore.timeline_syncobj_point(value))
                .collect();

            if let Some(points) = points {
                first.shared.check()?;
                return first
                    .shared
                    .syncobjs()
                    .timeline_wait(&points, WaitMode::Any, false, deadline);
            }

            loop {
                for &(semaphore, value) in semaphores {
                    if semaphore.wait(value, Deadline::now())?.is_signaled() {
                        return Ok(WaitStatus::Signaled);
                    }
                }
                if deadline.is_expired() {
                    return Ok(WaitStatus::Timeout);
                }
                std::thread::yield_now();
            }
        }
    }
}
