use {
    crate::{
        backend::Backend,
        deadline::Deadline,
        error::{DeviceLost, ExternalError, OutOfMemory},
    },
    std::sync::Arc,
};

/// How to treat a set of waited objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WaitMode {
    /// Wait until every object is signaled.
    All,

    /// Wait until at least one object is signaled.
    Any,
}

/// Outcome of a wait that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WaitStatus {
    /// Condition satisfied.
    Signaled,

    /// Deadline reached first.
    Timeout,
}

impl WaitStatus {
    /// Check if wait succeeded.
    pub fn is_signaled(&self) -> bool {
        *self == WaitStatus::Signaled
    }
}

/// Kind of external handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExternalHandleKind {
    /// Opaque handle referencing the kernel object itself.
    /// Imported object shares payload with the exporter.
    OpaqueFd,

    /// Handle referencing a snapshot of the payload.
    /// Can only be imported temporarily.
    SyncFile,
}

/// Handle used to share synchronization objects across processes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExternalHandle {
    /// Kind of the handle.
    pub kind: ExternalHandleKind,

    /// Raw value, file descriptor for the kernel backend.
    pub raw: i64,
}

/// Reference to a syncobj and, for timelines, a point on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SyncobjPoint<S> {
    /// Raw syncobj.
    pub syncobj: S,

    /// Timeline point. `None` for binary usage.
    pub value: Option<u64>,
}

impl<S> SyncobjPoint<S> {
    /// Binary usage of the syncobj.
    pub fn binary(syncobj: S) -> Self {
        SyncobjPoint {
            syncobj,
            value: None,
        }
    }

    /// Timeline usage of the syncobj.
    pub fn timeline(syncobj: S, value: u64) -> Self {
        SyncobjPoint {
            syncobj,
            value: Some(value),
        }
    }
}

/// Kernel synchronization primitive.
///
/// Every method may be called concurrently from any thread.
/// Waits may block up to the deadline and are never issued under engine locks.
pub trait SyncobjDevice<B: Backend>: std::fmt::Debug + Send + Sync {
    /// Create new binary syncobj.
    fn create_syncobj(&self, signaled: bool) -> Result<B::Syncobj, OutOfMemory>;

    /// Destroy syncobj. It must not be used afterwards.
    fn destroy_syncobj(&self, syncobj: B::Syncobj);

    /// Reset syncobjs to unsignaled state, dropping attached fences.
    fn reset_syncobjs(&self, syncobjs: &[B::Syncobj]) -> Result<(), DeviceLost>;

    /// Signal binary syncobjs from host.
    fn signal_syncobjs(&self, syncobjs: &[B::Syncobj]) -> Result<(), DeviceLost>;

    /// Wait for binary syncobjs.
    fn wait_syncobjs(
        &self,
        syncobjs: &[B::Syncobj],
        mode: WaitMode,
        deadline: Deadline,
    ) -> Result<WaitStatus, DeviceLost>;

    /// Signal points on timeline syncobjs from host.
    fn timeline_signal(&self, points: &[(B::Syncobj, u64)]) -> Result<(), DeviceLost>;

    /// Query current value of timeline syncobj.
    fn timeline_query(&self, syncobj: B::Syncobj) -> Result<u64, DeviceLost>;

    /// Wait for points on timeline syncobjs.
    ///
    /// With `available_only` the wait completes as soon as work that signals
    /// the points has been submitted, not when it has finished.
    fn timeline_wait(
        &self,
        points: &[(B::Syncobj, u64)],
        mode: WaitMode,
        available_only: bool,
        deadline: Deadline,
    ) -> Result<WaitStatus, DeviceLost>;

    /// Export syncobj payload.
    fn export_syncobj(
        &self,
        syncobj: B::Syncobj,
        kind: ExternalHandleKind,
    ) -> Result<ExternalHandle, ExternalError>;

    /// Import external handle as new syncobj.
    fn import_syncobj(&self, handle: ExternalHandle) -> Result<B::Syncobj, ExternalError>;
}

/// Owned syncobj. Destroyed through its device when dropped.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Syncobj<B: Backend> {
    raw: B::Syncobj,
    #[derivative(Debug = "ignore")]
    device: Arc<dyn SyncobjDevice<B>>,
}

impl<B> Syncobj<B>
where
    B: Backend,
{
    /// Create new binary syncobj.
    pub fn new(device: &Arc<dyn SyncobjDevice<B>>, signaled: bool) -> Result<Self, OutOfMemory> {
        let raw = device.create_syncobj(signaled)?;
        Ok(Syncobj {
            raw,
            device: device.clone(),
        })
    }

    /// Import syncobj from external handle.
    pub fn import(
        device: &Arc<dyn SyncobjDevice<B>>,
        handle: ExternalHandle,
    ) -> Result<Self, ExternalError> {
        let raw = device.import_syncobj(handle)?;
        Ok(Syncobj {
            raw,
            device: device.clone(),
        })
    }

    /// Get raw handle.
    pub fn raw(&self) -> B::Syncobj {
        self.raw
    }

    /// Get device this syncobj was created on.
    pub fn device(&self) -> &Arc<dyn SyncobjDevice<B>> {
        &self.device
    }

    /// Reset to unsignaled state.
    pub fn reset(&self) -> Result<(), DeviceLost> {
        self.device.reset_syncobjs(&[self.raw])
    }

    /// Signal from host.
    pub fn signal(&self) -> Result<(), DeviceLost> {
        self.device.signal_syncobjs(&[self.raw])
    }

    /// Check if signaled without blocking.
    pub fn is_signaled(&self) -> Result<bool, DeviceLost> {
        self.wait(Deadline::now()).map(|status| status.is_signaled())
    }

    /// Wait for binary payload.
    pub fn wait(&self, deadline: Deadline) -> Result<WaitStatus, DeviceLost> {
        self.device
            .wait_syncobjs(&[self.raw], WaitMode::All, deadline)
    }

    /// Export external handle.
    pub fn export(&self, kind: ExternalHandleKind) -> Result<ExternalHandle, ExternalError> {
        self.device.export_syncobj(self.raw, kind)
    }
}

impl<B> Drop for Syncobj<B>
where
    B: Backend,
{
    fn drop(&mut self) {
        self.device.destroy_syncobj(self.raw);
    }
}
