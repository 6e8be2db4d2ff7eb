use {
    super::*,
    crate::command::{FenceEpoch, SubmitInfo},
    sluice_core::{Deadline, MemoryBind, PreambleRequirements, SparseBind},
    sluice_soft::{SoftCommandBuffer, SoftResource},
    std::thread,
};

fn cb(label: u64) -> SoftCommandBuffer {
    SoftCommandBuffer::new(label)
}

#[test]
fn dispatch_order_is_submission_order() {
    let harness = Harness::emulated();
    let queue = harness.factory.queue(general(0)).unwrap();

    for batch in 0..4u64 {
        let infos = (0..4u64).map(|i| SubmitInfo::new().submits(Some(cb(batch * 4 + i))));
        queue.submit(infos, None).unwrap();
    }

    assert_eq!(harness.winsys.submitted_labels(), (0..16).collect::<Vec<_>>());
    harness.dispose();
}

#[test]
fn blocked_head_holds_back_following_submissions() {
    let harness = Harness::emulated();
    let queue = harness.factory.queue(general(0)).unwrap();
    let semaphore = harness.factory.create_timeline_semaphore(0).unwrap();

    queue
        .submit(Some(SubmitInfo::new().submits(Some(cb(0))).wait(&semaphore, 1)), None)
        .unwrap();
    queue
        .submit(Some(SubmitInfo::new().submits(Some(cb(1)))), None)
        .unwrap();

    assert_eq!(queue.pending(), 2);
    assert!(harness.winsys.submitted_labels().is_empty());

    semaphore.signal(1).unwrap();

    assert_eq!(queue.pending(), 0);
    assert_eq!(harness.winsys.submitted_labels(), vec![0, 1]);
    harness.dispose();
}

#[test]
fn ready_submission_dispatches_on_calling_thread() {
    let harness = Harness::emulated();
    let queue = harness.factory.queue(general(1)).unwrap();

    queue
        .submit(Some(SubmitInfo::new().submits(Some(cb(7)))), None)
        .unwrap();

    let records = harness.winsys.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].queue, general(1));
    assert_eq!(records[0].thread, thread::current().id());
    assert!(!queue.has_worker());
    harness.dispose();
}

#[test]
fn only_first_submission_with_command_buffers_flushes() {
    let harness = Harness::emulated();
    let queue = harness.factory.queue(general(0)).unwrap();
    let semaphore = harness.factory.create_binary_semaphore().unwrap();

    queue
        .submit(
            vec![
                SubmitInfo::new().signal(&semaphore, 0),
                SubmitInfo::new().submits(Some(cb(1))),
                SubmitInfo::new().submits(Some(cb(2))),
            ],
            None,
        )
        .unwrap();

    let flushes: Vec<_> = harness
        .winsys
        .records()
        .iter()
        .map(|record| record.flush_caches)
        .collect();
    assert_eq!(flushes, vec![false, true, false]);
    harness.dispose();
}

#[test]
fn sparse_binds_never_flush() {
    let harness = Harness::emulated();
    let queue = harness.factory.queue(general(0)).unwrap();
    let semaphore = harness.factory.create_binary_semaphore().unwrap();

    let range = |offset| MemoryBind {
        resource_offset: offset,
        size: 0x1000,
        memory: Some(SoftResource(3)),
        memory_offset: offset,
    };
    let bind = SparseBind::Buffer {
        buffer: SoftResource(1),
        binds: vec![range(0), range(0x1000)],
    };

    queue
        .bind_sparse(
            Some(SubmitInfo::new().binds(Some(bind)).signal(&semaphore, 0)),
            None,
        )
        .unwrap();

    assert_eq!(harness.winsys.binds(), vec![(general(0), 2)]);
    let records = harness.winsys.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].flush_caches);
    assert!(records[0].command_buffers.is_empty());
    harness.dispose();
}

#[test]
fn empty_submit_with_fence_signals_in_order() {
    let harness = Harness::emulated();
    let queue = harness.factory.queue(general(0)).unwrap();
    let mut fence = harness.factory.create_fence(false).unwrap();

    harness.winsys.hold(true);
    queue
        .submit(Some(SubmitInfo::new().submits(Some(cb(1)))), None)
        .unwrap();
    queue
        .submit(Vec::<SubmitInfo<'_, SoftBackend>>::new(), Some(&mut fence))
        .unwrap();

    assert_eq!(
        fence.epoch(),
        Some(FenceEpoch {
            queue: general(0),
            epoch: 0,
        })
    );
    assert_eq!(queue.next_epoch(), 1);

    let records = harness.winsys.records();
    assert_eq!(records.len(), 2);
    assert!(records[1].command_buffers.is_empty());
    assert!(records[1].fence.is_some());

    assert!(!harness
        .factory
        .wait_for_fence(&mut fence, Deadline::after(Duration::from_millis(10)))
        .unwrap());
    assert_eq!(harness.factory.completed_epochs(general(0)), Some(0));

    harness.winsys.complete().unwrap();
    assert!(harness
        .factory
        .wait_for_fence(&mut fence, Deadline::Never)
        .unwrap());
    assert_eq!(harness.factory.completed_epochs(general(0)), Some(1));
    harness.dispose();
}

#[test]
fn empty_submit_without_fence_is_ignored() {
    let harness = Harness::emulated();
    let queue = harness.factory.queue(general(0)).unwrap();

    queue
        .submit(vec![SubmitInfo::<'_, SoftBackend>::new()], None)
        .unwrap();

    assert_eq!(queue.pending(), 0);
    assert!(harness.winsys.records().is_empty());
    harness.dispose();
}

#[test]
fn preamble_is_reused_within_high_water_mark() {
    let harness = Harness::emulated();
    let queue = harness.factory.queue(general(0)).unwrap();

    let scratch = |size, waves| PreambleRequirements {
        scratch_size_per_wave: size,
        scratch_waves: waves,
        ..PreambleRequirements::none()
    };
    let submit = |label, requirements| {
        queue
            .submit(
                Some(
                    SubmitInfo::new()
                        .submits(Some(SoftCommandBuffer::with_requirements(label, requirements))),
                ),
                None,
            )
            .unwrap();
    };

    submit(0, scratch(256, 8));
    submit(1, scratch(128, 8));
    submit(2, scratch(256, 2));
    submit(3, PreambleRequirements::none());
    assert_eq!(queue.preamble_generations(), 1);
    assert_eq!(harness.winsys.preambles_created(), 1);

    submit(4, scratch(64, 16));
    assert_eq!(queue.preamble_generations(), 2);
    assert_eq!(harness.winsys.preambles_alive(), 1);

    let preambles: Vec<_> = harness
        .winsys
        .records()
        .iter()
        .map(|record| record.preamble)
        .collect();
    assert_eq!(preambles, vec![Some(0), Some(0), Some(0), Some(0), Some(1)]);
    harness.dispose();
}

#[test]
fn transfer_queue_gets_no_preamble() {
    let harness = Harness::emulated();
    let queue = harness.factory.queue(transfer()).unwrap();

    queue
        .submit(Some(SubmitInfo::new().submits(Some(cb(1)))), None)
        .unwrap();

    assert_eq!(harness.winsys.records()[0].preamble, None);
    assert_eq!(harness.winsys.preambles_created(), 0);
    harness.dispose();
}
