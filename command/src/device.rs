//! Logical device and its sticky lost state.

use {
    sluice_core::{DeviceId, DeviceLost, SyncobjDevice, Winsys, Backend},
    std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Logical device shared by queues, semaphores and fences.
///
/// Holds the collaborators and the sticky lost flag.
/// Once lost the device never recovers and every operation fails fast.
#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub struct Device<B: Backend> {
    id: DeviceId,
    #[derivative(Debug = "ignore")]
    syncobjs: Arc<dyn SyncobjDevice<B>>,
    #[derivative(Debug = "ignore")]
    winsys: Arc<dyn Winsys<B>>,
    lost: AtomicBool,
}

impl<B> Device<B>
where
    B: Backend,
{
    /// Wrap collaborators.
    pub fn new(syncobjs: Arc<dyn SyncobjDevice<B>>, winsys: Arc<dyn Winsys<B>>) -> Self {
        Device {
            id: DeviceId::new(),
            syncobjs,
            winsys,
            lost: AtomicBool::new(false),
        }
    }

    /// Get device id.
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Kernel synchronization primitive.
    pub fn syncobjs(&self) -> &Arc<dyn SyncobjDevice<B>> {
        &self.syncobjs
    }

    /// Hardware submission interface.
    pub fn winsys(&self) -> &Arc<dyn Winsys<B>> {
        &self.winsys
    }

    /// Check if device is lost.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Fail fast if device is lost.
    pub fn check(&self) -> Result<(), DeviceLost> {
        if self.is_lost() {
            Err(DeviceLost)
        } else {
            Ok(())
        }
    }

    /// Mark device as lost. Returns `DeviceLost` for convenience.
    pub fn set_lost(&self, reason: &str) -> DeviceLost {
        if !self.lost.swap(true, Ordering::AcqRel) {
            log::error!("Device lost: {}", reason);
        }
        DeviceLost
    }
}
