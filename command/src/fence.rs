use {
    crate::device::Device,
    sluice_core::{
        device_owned, Backend, Deadline, DeviceId, DeviceLost, ExternalError, ExternalHandle,
        ExternalHandleKind, InvalidExternalHandle, OutOfMemory, QueueId, Syncobj, WaitMode,
        WaitStatus,
    },
    std::sync::Arc,
};

/// Queue epoch is the point in particluar queue timeline when fence is submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FenceEpoch {
    /// Queue that signals fence.
    pub queue: QueueId,

    /// Queue epoch counter.
    pub epoch: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FenceState {
    Unsignaled,
    Signaled,
    Submitted(FenceEpoch),
    /// Payload imported from outside. Only the syncobj knows the state.
    External,
}

/// Fence wrapper.
#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub struct Fence<B: Backend> {
    device: DeviceId,
    permanent: Arc<Syncobj<B>>,
    temporary: Option<Arc<Syncobj<B>>>,
    state: FenceState,
    last_epoch: Option<FenceEpoch>,
    #[derivative(Debug = "ignore")]
    shared: Arc<Device<B>>,
}

device_owned!(Fence<B>);

impl<B> Fence<B>
where
    B: Backend,
{
    /// Create new fence in signaled or unsignaled state.
    pub fn new(device: &Arc<Device<B>>, signaled: bool) -> Result<Self, OutOfMemory> {
        let syncobj = Syncobj::new(device.syncobjs(), signaled)?;
        Ok(Fence {
            device: device.id(),
            permanent: Arc::new(syncobj),
            temporary: None,
            state: if signaled {
                FenceState::Signaled
            } else {
                FenceState::Unsignaled
            },
            last_epoch: None,
            shared: device.clone(),
        })
    }

    /// Check if fence was submitted.
    pub fn is_submitted(&self) -> bool {
        match self.state {
            FenceState::Submitted(_) => true,
            _ => false,
        }
    }

    /// Check if fence is known to be signaled.
    pub fn is_signaled(&self) -> bool {
        match self.state {
            FenceState::Signaled => true,
            _ => false,
        }
    }

    /// Check if fence is unsignaled.
    /// It can be submitted as well.
    pub fn is_unsignaled(&self) -> bool {
        !self.is_signaled()
    }

    /// Syncobj the next submission signals.
    pub(crate) fn active(&self) -> Arc<Syncobj<B>> {
        self.temporary
            .as_ref()
            .unwrap_or(&self.permanent)
            .clone()
    }

    /// Becomes `Submitted` if it was unsignaled.
    /// Submitting a signaled or submitted fence is a usage error and keeps the state.
    pub(crate) fn mark_submitted(&mut self, epoch: FenceEpoch) {
        sluice_core::sluice_slow_assert!(
            !self.is_signaled() && !self.is_submitted(),
            "Fence must be reset before submission"
        );
        match self.state {
            FenceState::Unsignaled | FenceState::External => {
                self.state = FenceState::Submitted(epoch);
                self.last_epoch = Some(epoch);
            }
            state => log::warn!("Fence in state {:?} submitted to {:?}", state, epoch.queue),
        }
    }

    /// Reset fence.
    /// Temporary payload is dropped and permanent one becomes unsignaled.
    pub fn reset(&mut self) -> Result<(), DeviceLost> {
        self.shared.check()?;
        self.temporary = None;
        self.permanent.reset()?;
        self.state = FenceState::Unsignaled;
        self.last_epoch = None;
        Ok(())
    }

    /// Wait for fence to become signaled.
    /// Returns submission epoch on success if fence was submitted to a queue.
    pub fn wait_signaled(&mut self, deadline: Deadline) -> Result<Option<FenceEpoch>, DeviceLost> {
        match self.wait(deadline)? {
            WaitStatus::Signaled => Ok(self.epoch()),
            WaitStatus::Timeout => Ok(None),
        }
    }

    /// Wait for fence to become signaled.
    pub fn wait(&mut self, deadline: Deadline) -> Result<WaitStatus, DeviceLost> {
        self.shared.check()?;
        if let FenceState::Signaled = self.state {
            return Ok(WaitStatus::Signaled);
        }

        let status = self.active().wait(deadline)?;
        self.shared.check()?;
        if status.is_signaled() {
            self.mark_signaled();
        }
        Ok(status)
    }

    /// Check if fence has became signaled without blocking.
    pub fn check_signaled(&mut self) -> Result<bool, DeviceLost> {
        self.wait(Deadline::now()).map(|status| status.is_signaled())
    }

    fn mark_signaled(&mut self) {
        self.state = match self.state {
            FenceState::Submitted(epoch) => {
                log::trace!("Fence of {:?} signaled", epoch);
                FenceState::Signaled
            }
            _ => FenceState::Signaled,
        };
    }

    /// Get epoch of the last submission since reset.
    /// `None` if the fence was not submitted to a queue.
    pub fn epoch(&self) -> Option<FenceEpoch> {
        self.last_epoch
    }

    /// Import payload from external handle.
    /// Sync-file handles can only be imported temporarily.
    pub fn import(&mut self, handle: ExternalHandle, temporary: bool) -> Result<(), ExternalError> {
        self.shared.check()?;
        if handle.kind == ExternalHandleKind::SyncFile && !temporary {
            return Err(InvalidExternalHandle.into());
        }

        let syncobj = Arc::new(Syncobj::import(self.shared.syncobjs(), handle)?);
        if temporary {
            self.temporary = Some(syncobj);
        } else {
            self.temporary = None;
            self.permanent = syncobj;
        }
        self.state = FenceState::External;
        self.last_epoch = None;
        Ok(())
    }

    /// Export payload.
    /// Exporting a sync file drops temporary payload or resets the permanent one.
    pub fn export(&mut self, kind: ExternalHandleKind) -> Result<ExternalHandle, ExternalError> {
        self.shared.check()?;
        let handle = self.active().export(kind)?;
        if kind == ExternalHandleKind::SyncFile {
            if self.temporary.take().is_none() {
                self.permanent.reset()?;
            }
            self.state = FenceState::Unsignaled;
        }
        Ok(handle)
    }
}

/// Wait for several fences.
pub fn wait_for_fences<B>(
    fences: &mut [&mut Fence<B>],
    mode: WaitMode,
    deadline: Deadline,
) -> Result<WaitStatus, DeviceLost>
where
    B: Backend,
{
    let first = match fences.first() {
        Some(fence) => fence.shared.clone(),
        None => return Ok(WaitStatus::Signaled),
    };
    first.check()?;

    let raws: Vec<_> = fences
        .iter()
        .filter(|fence| !fence.is_signaled())
        .map(|fence| fence.active().raw())
        .collect();

    if raws.is_empty() || (mode == WaitMode::Any && raws.len() < fences.len()) {
        return Ok(WaitStatus::Signaled);
    }

    let status = first.syncobjs().wait_syncobjs(&raws, mode, deadline)?;
    first.check()?;

    // Any-mode only tells that at least one is signaled.
    for fence in fences.iter_mut() {
        if fence.is_signaled() {
            continue;
        }
        if status.is_signaled() && mode == WaitMode::All {
            fence.mark_signaled();
        } else {
            fence.check_signaled()?;
        }
    }

    Ok(status)
}
