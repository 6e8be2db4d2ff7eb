use {
    crate::command::WorkerConfig,
    sluice_core::{FamilyId, QueueType},
};

/// Factory configuration.
#[derive(Clone, derivative::Derivative)]
#[derivative(Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config<Q = OneQueue> {
    /// Config for queue families.
    pub queues: Q,

    /// Config for queue worker threads.
    pub worker: WorkerConfig,

    /// How timeline semaphores are implemented.
    pub timelines: TimelineMode,
}

/// Implementation of timeline semaphores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimelineMode {
    /// Timelines are emulated on host with binary syncobjs.
    Emulated,

    /// Timelines use kernel timeline syncobjs.
    Syncobj,
}

impl Default for TimelineMode {
    fn default() -> Self {
        TimelineMode::Emulated
    }
}

/// Queue family the device exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FamilyInfo {
    /// Family id.
    pub id: FamilyId,

    /// Type of queues in the family.
    pub queue_type: QueueType,

    /// Maximum number of queues that can be created.
    pub max_queues: usize,
}

/// Trait that represents some method to select queue families and queue counts.
pub trait QueuesConfigure {
    /// Families with queue counts.
    type Families: IntoIterator<Item = (FamilyId, usize)>;

    /// Pick families.
    fn configure(&self, families: &[FamilyInfo]) -> Self::Families;
}

/// Picks one queue of the first family capable of graphics.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OneQueue;

impl QueuesConfigure for OneQueue {
    type Families = Option<(FamilyId, usize)>;

    fn configure(&self, families: &[FamilyInfo]) -> Option<(FamilyId, usize)> {
        families
            .iter()
            .find(|f| f.queue_type.supports_graphics() && f.max_queues > 0)
            .map(|f| (f.id, 1))
    }
}

/// Saved config for queues.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SavedQueueConfig(pub Vec<(FamilyId, usize)>);

impl QueuesConfigure for SavedQueueConfig {
    type Families = Vec<(FamilyId, usize)>;

    fn configure(&self, _: &[FamilyInfo]) -> Vec<(FamilyId, usize)> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn families() -> Vec<FamilyInfo> {
        vec![
            FamilyInfo {
                id: FamilyId { index: 0 },
                queue_type: QueueType::Transfer,
                max_queues: 2,
            },
            FamilyInfo {
                id: FamilyId { index: 1 },
                queue_type: QueueType::General,
                max_queues: 1,
            },
        ]
    }

    #[test]
    fn one_graphics_queue_skips_transfer_families() {
        assert_eq!(
            OneQueue.configure(&families()),
            Some((FamilyId { index: 1 }, 1))
        );
    }

    #[test]
    fn saved_config_is_returned_as_is() {
        let saved = SavedQueueConfig(vec![(FamilyId { index: 0 }, 2)]);
        assert_eq!(saved.configure(&families()), saved.0);
    }
}
