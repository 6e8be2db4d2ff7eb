use {
    super::*,
    crate::command::SubmitInfo,
    sluice_core::{Deadline, DeviceLost, OutOfMemory, SubmitError},
    sluice_soft::SoftCommandBuffer,
    std::{thread, time::Instant},
};

#[test]
fn failed_submission_loses_device_for_good() {
    let harness = Harness::emulated();
    let queue = harness.factory.queue(general(0)).unwrap();
    let semaphore = harness.factory.create_binary_semaphore().unwrap();
    let mut fence = harness.factory.create_fence(false).unwrap();

    harness.winsys.fail_submits(true);
    queue
        .submit(
            Some(
                SubmitInfo::new()
                    .submits(Some(SoftCommandBuffer::new(1)))
                    .signal(&semaphore, 0),
            ),
            Some(&mut fence),
        )
        .unwrap();

    assert!(harness.factory.is_lost());
    assert_eq!(queue.pending(), 0);

    harness.winsys.fail_submits(false);
    let result = queue.submit(
        Some(SubmitInfo::new().submits(Some(SoftCommandBuffer::new(2)))),
        None,
    );
    assert_eq!(result, Err(SubmitError::DeviceLost(DeviceLost)));
    assert_eq!(
        harness.factory.wait_for_fence(&mut fence, Deadline::Never),
        Err(DeviceLost)
    );
    assert_eq!(harness.factory.wait_idle(Deadline::Never), Err(DeviceLost));
    assert!(harness.winsys.records().is_empty());
    harness.dispose();
}

#[test]
fn waiters_of_failed_submission_are_released() {
    let harness = Harness::emulated();
    let signaler = harness.factory.queue(general(0)).unwrap();
    let waiter = harness.factory.queue(general(1)).unwrap();
    let semaphore = harness.factory.create_timeline_semaphore(0).unwrap();

    waiter
        .submit(
            Some(
                SubmitInfo::new()
                    .submits(Some(SoftCommandBuffer::new(2)))
                    .wait(&semaphore, 1),
            ),
            None,
        )
        .unwrap();
    assert_eq!(waiter.pending(), 1);

    harness.winsys.fail_submits(true);
    signaler
        .submit(
            Some(
                SubmitInfo::new()
                    .submits(Some(SoftCommandBuffer::new(1)))
                    .signal(&semaphore, 1),
            ),
            None,
        )
        .unwrap();

    assert!(harness.factory.is_lost());
    assert_eq!(signaler.pending(), 0);
    assert_eq!(waiter.pending(), 0);
    assert!(harness.winsys.records().is_empty());
    harness.dispose();
}

#[test]
fn lost_device_releases_queue_blocked_on_external_wait() {
    let harness = Harness::kernel();
    let blocked = harness.factory.queue(general(0)).unwrap();
    let failing = harness.factory.queue(general(1)).unwrap();
    let external = harness.factory.create_timeline_semaphore(0).unwrap();

    blocked
        .submit(
            Some(
                SubmitInfo::new()
                    .submits(Some(SoftCommandBuffer::new(1)))
                    .wait(&external, 1),
            ),
            None,
        )
        .unwrap();
    assert!(blocked.has_worker());

    harness.winsys.fail_submits(true);
    failing
        .submit(Some(SubmitInfo::new().submits(Some(SoftCommandBuffer::new(2)))), None)
        .unwrap();
    assert!(harness.factory.is_lost());

    // Nothing ever signals `external`, only the lost flag can end these waits.
    let start = Instant::now();
    let long = || Deadline::after(Duration::from_secs(10));
    assert_eq!(blocked.wait_idle(long()), Err(DeviceLost));
    assert_eq!(harness.factory.wait_idle(long()), Err(DeviceLost));
    assert!(start.elapsed() < Duration::from_secs(5));

    // Worker stops waiting and takes the failure path.
    while blocked.pending() > 0 && start.elapsed() < Duration::from_secs(5) {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(blocked.pending(), 0);
    assert!(harness.winsys.records().is_empty());
    harness.dispose();
}

#[test]
fn allocation_failure_is_recoverable() {
    let harness = Harness::emulated();

    harness.syncobjs.set_fail_allocations(true);
    assert_eq!(
        harness.factory.create_fence(false).unwrap_err(),
        OutOfMemory::Host
    );
    assert_eq!(
        harness.factory.create_binary_semaphore().unwrap_err(),
        OutOfMemory::Host
    );

    harness.syncobjs.set_fail_allocations(false);
    assert!(harness.factory.create_fence(true).is_ok());
    assert!(!harness.factory.is_lost());
    harness.dispose();
}
