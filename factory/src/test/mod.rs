#![allow(dead_code)]

mod lost;
mod ordering;
mod timeline;

use {
    crate::{command::WorkerConfig, Config, Factory, FamilyInfo, SavedQueueConfig, TimelineMode},
    sluice_core::{FamilyId, QueueId, QueueType},
    sluice_soft::{SoftBackend, SoftSyncobjs, SoftWinsys},
    std::{sync::Arc, time::Duration},
};

pub const GENERAL: FamilyId = FamilyId { index: 0 };
pub const TRANSFER: FamilyId = FamilyId { index: 1 };

/// Factory over soft collaborators that tests can poke directly.
pub struct Harness {
    pub syncobjs: Arc<SoftSyncobjs>,
    pub winsys: Arc<SoftWinsys>,
    pub factory: Factory<SoftBackend>,
}

impl Harness {
    pub fn new(timelines: TimelineMode) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let syncobjs = Arc::new(SoftSyncobjs::new());
        let winsys = Arc::new(SoftWinsys::new(syncobjs.clone()));
        let config = Config {
            queues: SavedQueueConfig(vec![(GENERAL, 2), (TRANSFER, 1)]),
            worker: WorkerConfig {
                poll_interval: Duration::from_millis(5),
                thread_name: "sluice-test".into(),
            },
            timelines,
        };

        let factory = Factory::new(config, &families(), syncobjs.clone(), winsys.clone())
            .expect("Soft device provides requested queues");

        Harness {
            syncobjs,
            winsys,
            factory,
        }
    }

    pub fn emulated() -> Self {
        Self::new(TimelineMode::Emulated)
    }

    pub fn kernel() -> Self {
        Self::new(TimelineMode::Syncobj)
    }

    pub fn dispose(self) {
        self.factory.dispose();
    }
}

pub fn families() -> Vec<FamilyInfo> {
    vec![
        FamilyInfo {
            id: GENERAL,
            queue_type: QueueType::General,
            max_queues: 2,
        },
        FamilyInfo {
            id: TRANSFER,
            queue_type: QueueType::Transfer,
            max_queues: 1,
        },
    ]
}

pub fn general(index: usize) -> QueueId {
    QueueId::new(GENERAL, index)
}

pub fn transfer() -> QueueId {
    QueueId::new(TRANSFER, 0)
}
