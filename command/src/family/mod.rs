//! Family module docs.

use {
    crate::{
        device::Device,
        queue::{Queue, WorkerConfig},
    },
    relevant::Relevant,
    sluice_core::{device_owned, Backend, DeviceId, FamilyId, QueueId, QueueType},
    std::sync::Arc,
};

/// Family of the command queues.
/// All queues of the family have same capabilities.
#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub struct Family<B: Backend> {
    device: DeviceId,
    id: FamilyId,
    queue_type: QueueType,
    queues: Vec<Queue<B>>,
    relevant: Relevant,
}

device_owned!(Family<B>);

impl<B> Family<B>
where
    B: Backend,
{
    /// Create family with `count` queues.
    pub fn new(
        device: &Arc<Device<B>>,
        id: FamilyId,
        queue_type: QueueType,
        count: usize,
        worker: &WorkerConfig,
    ) -> Self {
        log::debug!("Create {} queues of {:?} family {:?}", count, queue_type, id);
        Family {
            device: device.id(),
            id,
            queue_type,
            queues: (0..count)
                .map(|index| {
                    Queue::new(device, QueueId::new(id, index), queue_type, worker.clone())
                })
                .collect(),
            relevant: Relevant,
        }
    }

    /// Get id of the family.
    pub fn id(&self) -> FamilyId {
        self.id
    }

    /// Get type of the family.
    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    /// Get queues of the family.
    pub fn queues(&self) -> &[Queue<B>] {
        &self.queues
    }

    /// Get queue by index.
    pub fn queue(&self, index: usize) -> Option<&Queue<B>> {
        self.queues.get(index)
    }

    /// Dispose of queues.
    pub fn dispose(self) {
        for queue in self.queues {
            queue.dispose();
        }
        self.relevant.dispose();
    }
}
