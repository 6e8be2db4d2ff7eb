use {
    super::*,
    crate::command::SubmitInfo,
    rand::Rng,
    sluice_core::{Deadline, SyncobjPoint, WaitMode, WaitStatus},
    sluice_soft::SoftCommandBuffer,
    std::thread,
};

#[test]
fn signal_then_wait_on_same_queue() {
    let harness = Harness::emulated();
    let queue = harness.factory.queue(general(0)).unwrap();
    let semaphore = harness.factory.create_timeline_semaphore(0).unwrap();

    harness.winsys.hold(true);
    queue
        .submit(
            vec![
                SubmitInfo::new()
                    .submits(Some(SoftCommandBuffer::new(1)))
                    .signal(&semaphore, 5),
                SubmitInfo::new()
                    .submits(Some(SoftCommandBuffer::new(2)))
                    .wait(&semaphore, 5),
            ],
            None,
        )
        .unwrap();

    let records = harness.winsys.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].command_buffers, vec![1]);
    assert_eq!(records[1].command_buffers, vec![2]);

    // Second submission waits for the point the first one signals.
    assert_eq!(records[0].signals.len(), 1);
    assert_eq!(records[1].waits, records[0].signals);
    assert_eq!(semaphore.value().unwrap(), 0);

    harness.winsys.complete().unwrap();
    assert_eq!(semaphore.value().unwrap(), 5);
    harness.dispose();
}

#[test]
fn wait_submitted_first_is_released_by_signal_on_other_queue() {
    let harness = Harness::emulated();
    let waiter = harness.factory.queue(general(1)).unwrap();
    let signaler = harness.factory.queue(general(0)).unwrap();
    let semaphore = harness.factory.create_timeline_semaphore(0).unwrap();

    waiter
        .submit(
            Some(
                SubmitInfo::new()
                    .submits(Some(SoftCommandBuffer::new(2)))
                    .wait(&semaphore, 5),
            ),
            None,
        )
        .unwrap();
    assert_eq!(waiter.pending(), 1);
    assert!(harness.winsys.records().is_empty());

    signaler
        .submit(
            Some(
                SubmitInfo::new()
                    .submits(Some(SoftCommandBuffer::new(1)))
                    .signal(&semaphore, 5),
            ),
            None,
        )
        .unwrap();

    let queues: Vec<_> = harness
        .winsys
        .records()
        .iter()
        .map(|record| record.queue)
        .collect();
    assert_eq!(queues, vec![general(0), general(1)]);
    assert_eq!(waiter.pending(), 0);
    assert!(!waiter.has_worker());
    harness.dispose();
}

#[test]
fn wait_for_satisfied_value_is_dropped() {
    let harness = Harness::emulated();
    let queue = harness.factory.queue(general(0)).unwrap();
    let semaphore = harness.factory.create_timeline_semaphore(3).unwrap();

    queue
        .submit(
            Some(
                SubmitInfo::new()
                    .submits(Some(SoftCommandBuffer::new(1)))
                    .wait(&semaphore, 2),
            ),
            None,
        )
        .unwrap();

    let records = harness.winsys.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].waits.is_empty());
    harness.dispose();
}

#[test]
fn value_never_decreases() {
    let harness = Harness::emulated();
    let semaphore = harness.factory.create_timeline_semaphore(0).unwrap();

    let mut last = 0;
    for &value in &[3, 1, 7, 7, 2, 10] {
        semaphore.signal(value).unwrap();
        let current = semaphore.value().unwrap();
        assert!(current >= value);
        assert!(current >= last);
        last = current;
    }
    assert_eq!(last, 10);
    harness.dispose();
}

#[test]
fn concurrent_waits_and_signals() {
    const TOP: u64 = 32;

    let harness = Harness::emulated();
    let semaphore = Arc::new(harness.factory.create_timeline_semaphore(0).unwrap());

    let waiters: Vec<_> = (0..8)
        .map(|_| {
            let semaphore = semaphore.clone();
            let target = rand::thread_rng().gen_range(1..=TOP);
            thread::spawn(move || {
                let status = semaphore
                    .wait(target, Deadline::after(Duration::from_secs(10)))
                    .unwrap();
                assert_eq!(status, WaitStatus::Signaled);
                assert!(semaphore.value().unwrap() >= target);
            })
        })
        .collect();

    let late = {
        let semaphore = semaphore.clone();
        thread::spawn(move || {
            semaphore
                .wait(TOP + 1, Deadline::after(Duration::from_millis(20)))
                .unwrap()
        })
    };

    let signaler = {
        let semaphore = semaphore.clone();
        thread::spawn(move || {
            let mut rng = rand::thread_rng();
            for value in 1..=TOP {
                if rng.gen_bool(0.3) {
                    thread::sleep(Duration::from_micros(rng.gen_range(10..200)));
                }
                semaphore.signal(value).unwrap();
            }
        })
    };

    signaler.join().unwrap();
    for waiter in waiters {
        waiter.join().unwrap();
    }
    assert_eq!(late.join().unwrap(), WaitStatus::Timeout);
    assert_eq!(semaphore.value().unwrap(), TOP);

    drop(semaphore);
    harness.dispose();
}

#[test]
fn concurrent_submitters_release_each_other() {
    const ROUNDS: u64 = 16;

    let harness = Harness::emulated();
    let semaphore = harness.factory.create_timeline_semaphore(0).unwrap();
    let factory = &harness.factory;

    // Even values are signaled by the first queue, odd ones by the second.
    // Each step waits for the previous one.
    thread::scope(|scope| {
        for parity in 0..2u64 {
            let semaphore = &semaphore;
            scope.spawn(move || {
                let queue = factory.queue(general(parity as usize)).unwrap();
                let mut rng = rand::thread_rng();
                let mut value = parity + 1;
                while value <= ROUNDS {
                    if rng.gen_bool(0.5) {
                        thread::yield_now();
                    }
                    queue
                        .submit(
                            Some(
                                SubmitInfo::new()
                                    .submits(Some(SoftCommandBuffer::new(value)))
                                    .wait(semaphore, value - 1)
                                    .signal(semaphore, value),
                            ),
                            None,
                        )
                        .unwrap();
                    value += 2;
                }
            });
        }
    });

    assert_eq!(
        factory.wait_idle(Deadline::after(Duration::from_secs(10))).unwrap(),
        WaitStatus::Signaled
    );
    assert_eq!(
        harness.winsys.submitted_labels(),
        (1..=ROUNDS).collect::<Vec<_>>()
    );
    assert_eq!(semaphore.value().unwrap(), ROUNDS);
    harness.dispose();
}

#[test]
fn wait_any_over_kernel_timelines() {
    let harness = Harness::kernel();
    let a = harness.factory.create_timeline_semaphore(0).unwrap();
    let b = harness.factory.create_timeline_semaphore(0).unwrap();

    let short = || Deadline::after(Duration::from_millis(10));
    assert_eq!(
        harness
            .factory
            .wait_semaphores(&[(&a, 1), (&b, 1)], WaitMode::Any, short())
            .unwrap(),
        WaitStatus::Timeout
    );

    b.signal(1).unwrap();
    assert_eq!(
        harness
            .factory
            .wait_semaphores(&[(&a, 1), (&b, 1)], WaitMode::Any, short())
            .unwrap(),
        WaitStatus::Signaled
    );
    assert_eq!(
        harness
            .factory
            .wait_semaphores(&[(&a, 1), (&b, 1)], WaitMode::All, short())
            .unwrap(),
        WaitStatus::Timeout
    );
    harness.dispose();
}

#[test]
fn kernel_timeline_points_reach_hardware() {
    let harness = Harness::kernel();
    let queue = harness.factory.queue(general(0)).unwrap();
    let semaphore = harness.factory.create_timeline_semaphore(0).unwrap();

    queue
        .submit(
            vec![
                SubmitInfo::new()
                    .submits(Some(SoftCommandBuffer::new(1)))
                    .signal(&semaphore, 4),
                SubmitInfo::new()
                    .submits(Some(SoftCommandBuffer::new(2)))
                    .wait(&semaphore, 4),
            ],
            None,
        )
        .unwrap();

    let records = harness.winsys.records();
    assert_eq!(records.len(), 2);
    let signal: Vec<SyncobjPoint<_>> = records[0].signals.clone();
    assert_eq!(signal.len(), 1);
    assert_eq!(signal[0].value, Some(4));
    assert_eq!(records[1].waits, signal);
    assert_eq!(semaphore.value().unwrap(), 4);
    harness.dispose();
}
