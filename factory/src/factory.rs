use {
    crate::{
        command::{
            wait_for_fences, wait_semaphores, Device, Family, Fence, FenceEpoch, Queue, Semaphore,
        },
        config::{Config, FamilyInfo, QueuesConfigure, TimelineMode},
    },
    parking_lot::RwLock,
    relevant::Relevant,
    sluice_core::{
        Deadline, DeviceLost, FamilyId, OutOfMemory, QueueId, SyncobjDevice, WaitMode, WaitStatus,
        Winsys,
    },
    smallvec::SmallVec,
    std::{cmp::max, sync::Arc},
    thread_profiler::profile_scope,
};

/// Error that may occur while creating the factory.
#[derive(Clone, Copy, Debug, Fail, PartialEq, Eq)]
pub enum CreationError {
    /// Configuration requested no queues.
    #[fail(display = "No queues requested")]
    NoQueues,

    /// Family is unknown or has fewer queues than requested.
    #[fail(display = "Family {:?} can't provide requested queues", _0)]
    InvalidFamily(FamilyId),
}

/// Device facade.
/// Owns queue families and tracks fence epochs.
///
/// Must be disposed explicitly with [`Factory::dispose`].
#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub struct Factory<B: sluice_core::Backend> {
    #[derivative(Debug = "ignore")]
    device: Arc<Device<B>>,
    families: Vec<Family<B>>,
    families_indices: Vec<usize>,
    epochs: Vec<RwLock<Vec<u64>>>,
    timelines: TimelineMode,
    relevant: Relevant,
}

impl<B> Factory<B>
where
    B: sluice_core::Backend,
{
    /// Create new factory.
    ///
    /// `families` describes queue families the device exposes.
    pub fn new(
        config: Config<impl QueuesConfigure>,
        families: &[FamilyInfo],
        syncobjs: Arc<dyn SyncobjDevice<B>>,
        winsys: Arc<dyn Winsys<B>>,
    ) -> Result<Self, CreationError> {
        profile_scope!("Factory::new");

        let requested: SmallVec<[(FamilyId, usize); 4]> = config
            .queues
            .configure(families)
            .into_iter()
            .filter(|&(_, count)| count > 0)
            .collect();

        if requested.is_empty() {
            return Err(CreationError::NoQueues);
        }

        let mut infos: SmallVec<[FamilyInfo; 4]> = SmallVec::new();
        for &(id, count) in &requested {
            let info = families
                .iter()
                .find(|info| info.id == id)
                .filter(|info| info.max_queues >= count)
                .ok_or(CreationError::InvalidFamily(id))?;

            if infos.iter().any(|known| known.id == id) {
                return Err(CreationError::InvalidFamily(id));
            }
            infos.push(*info);
        }

        let device = Arc::new(Device::new(syncobjs, winsys));
        log::debug!("Created device {:?}", device.id());

        let families: Vec<_> = requested
            .iter()
            .zip(&infos)
            .map(|(&(id, count), info)| {
                Family::new(&device, id, info.queue_type, count, &config.worker)
            })
            .collect();

        let families_len = families.iter().map(|f| f.id().index + 1).max().unwrap_or(0);
        let mut families_indices = vec![!0; families_len];
        for (index, family) in families.iter().enumerate() {
            families_indices[family.id().index] = index;
        }

        let epochs = families
            .iter()
            .map(|f| RwLock::new(vec![0; f.queues().len()]))
            .collect();

        Ok(Factory {
            device,
            families,
            families_indices,
            epochs,
            timelines: config.timelines,
            relevant: Relevant,
        })
    }

    /// Get device shared by all queues of the factory.
    pub fn device(&self) -> &Arc<Device<B>> {
        &self.device
    }

    /// Check if device was lost.
    pub fn is_lost(&self) -> bool {
        self.device.is_lost()
    }

    /// Get all queue families.
    pub fn families(&self) -> &[Family<B>] {
        &self.families
    }

    /// Get queue family by id.
    pub fn family(&self, id: FamilyId) -> Option<&Family<B>> {
        let index = *self.families_indices.get(id.index)?;
        self.families.get(index)
    }

    /// Get queue by id.
    pub fn queue(&self, id: QueueId) -> Option<&Queue<B>> {
        self.family(id.family)?.queue(id.index)
    }

    /// Create binary semaphore.
    pub fn create_binary_semaphore(&self) -> Result<Semaphore<B>, OutOfMemory> {
        Semaphore::binary(&self.device)
    }

    /// Create timeline semaphore with specified initial value.
    pub fn create_timeline_semaphore(&self, initial: u64) -> Result<Semaphore<B>, OutOfMemory> {
        match self.timelines {
            TimelineMode::Emulated => Ok(Semaphore::timeline(&self.device, initial)),
            TimelineMode::Syncobj => Semaphore::timeline_syncobj(&self.device, initial),
        }
    }

    /// Create new fence.
    pub fn create_fence(&self, signaled: bool) -> Result<Fence<B>, OutOfMemory> {
        Fence::new(&self.device, signaled)
    }

    /// Reset fence so it could be submitted again.
    pub fn reset_fence(&self, fence: &mut Fence<B>) -> Result<(), DeviceLost> {
        fence.assert_device_owner(self.device.id());
        fence.reset()
    }

    /// Wait for the fence become signaled.
    /// Returns `false` on timeout.
    pub fn wait_for_fence(
        &self,
        fence: &mut Fence<B>,
        deadline: Deadline,
    ) -> Result<bool, DeviceLost> {
        profile_scope!("wait_for_fence");

        fence.assert_device_owner(self.device.id());

        match fence.wait(deadline)? {
            WaitStatus::Signaled => {
                if let Some(epoch) = fence.epoch() {
                    self.complete_epoch(epoch);
                }
                Ok(true)
            }
            WaitStatus::Timeout => Ok(false),
        }
    }

    /// Wait for the fences become signaled.
    /// Returns `false` on timeout.
    pub fn wait_for_fences(
        &self,
        fences: &mut [&mut Fence<B>],
        mode: WaitMode,
        deadline: Deadline,
    ) -> Result<bool, DeviceLost> {
        profile_scope!("wait_for_fences");

        for fence in fences.iter() {
            fence.assert_device_owner(self.device.id());
        }

        if let WaitStatus::Timeout = wait_for_fences(&mut *fences, mode, deadline)? {
            return Ok(false);
        }

        for fence in fences.iter() {
            if fence.is_signaled() {
                if let Some(epoch) = fence.epoch() {
                    self.complete_epoch(epoch);
                }
            }
        }
        Ok(true)
    }

    /// Wait for semaphores to reach specified values.
    pub fn wait_semaphores(
        &self,
        semaphores: &[(&Semaphore<B>, u64)],
        mode: WaitMode,
        deadline: Deadline,
    ) -> Result<WaitStatus, DeviceLost> {
        profile_scope!("wait_semaphores");

        for (semaphore, _) in semaphores {
            semaphore.assert_device_owner(self.device.id());
        }
        wait_semaphores(semaphores, mode, deadline)
    }

    /// Wait until all queues have dispatched every accepted submission.
    pub fn wait_idle(&self, deadline: Deadline) -> Result<WaitStatus, DeviceLost> {
        profile_scope!("wait_idle");

        for family in &self.families {
            for queue in family.queues() {
                if let WaitStatus::Timeout = queue.wait_idle(deadline)? {
                    return Ok(WaitStatus::Timeout);
                }
            }
        }
        Ok(WaitStatus::Signaled)
    }

    /// Number of fenced submissions to the queue that are known to be complete.
    ///
    /// Updated when fences are waited through the factory.
    pub fn completed_epochs(&self, queue: QueueId) -> Option<u64> {
        let index = *self.families_indices.get(queue.family.index)?;
        let epochs = self.epochs.get(index)?.read();
        epochs.get(queue.index).copied()
    }

    fn complete_epoch(&self, epoch: FenceEpoch) {
        let index = match self.families_indices.get(epoch.queue.family.index) {
            Some(&index) => index,
            None => return,
        };

        if let Some(epochs) = self.epochs.get(index) {
            let mut lock = epochs.write();
            if let Some(completed) = lock.get_mut(epoch.queue.index) {
                *completed = max(*completed, epoch.epoch + 1);
            }
        }
    }

    /// Dispose of the factory.
    /// Stops queue workers. Submissions still blocked on dependencies never reach hardware.
    pub fn dispose(self) {
        log::debug!("Dispose factory of {:?}", self.device.id());

        for family in self.families {
            family.dispose();
        }
        log::trace!("Families disposed");

        self.relevant.dispose();
    }
}

#[allow(unused)]
fn factory_is_send_sync<B: sluice_core::Backend>() {
    fn is_send_sync<T: Send + Sync>() {}
    is_send_sync::<Factory<B>>();
}
