//! Concurrency properties of the reference monitor: snapshot reads stay
//! internally consistent while writers race, no mutation is ever lost, and
//! initialization is all-or-nothing under contention.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use difc_core::{
    CapabilityEdit, MonitorError, Pid, Polarity, ProcessSecurityContext, ReferenceMonitor,
    Tag, Uid,
};
use proptest::prelude::*;

const PID: Pid = Pid(7);

fn grant_global(monitor: &ReferenceMonitor, tags: impl IntoIterator<Item = Tag>) {
    for tag in tags {
        monitor.edit_global_capability(tag, Polarity::Positive, CapabilityEdit::Grant);
    }
}

#[test]
fn concurrent_adds_to_one_pid_are_all_preserved() {
    let monitor = Arc::new(ReferenceMonitor::new());
    const THREADS: i64 = 8;
    const TAGS_PER_THREAD: i64 = 100;

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || {
                for i in 0..TAGS_PER_THREAD {
                    let tag = Tag(t * TAGS_PER_THREAD + i);
                    monitor.edit_global_capability(
                        tag,
                        Polarity::Positive,
                        CapabilityEdit::Grant,
                    );
                    monitor.add_tag_to_label(PID, tag).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let label = monitor.process_label(PID);
    assert_eq!(label.len(), (THREADS * TAGS_PER_THREAD) as usize);
}

#[test]
fn snapshots_racing_writers_are_never_torn() {
    let monitor = Arc::new(ReferenceMonitor::new());
    const TOTAL: i64 = 500;
    grant_global(&monitor, (0..TOTAL).map(Tag));

    let writer = {
        let monitor = Arc::clone(&monitor);
        thread::spawn(move || {
            for i in 0..TOTAL {
                monitor.add_tag_to_label(PID, Tag(i)).unwrap();
            }
        })
    };

    // Labels only grow here, so each snapshot must contain the previous one
    // and its reported size must match its materialized contents.
    let mut previous: HashSet<Tag> = HashSet::new();
    loop {
        let snapshot = monitor.process_label(PID);
        let materialized: HashSet<Tag> = snapshot.iter().collect();
        assert_eq!(snapshot.len(), materialized.len());
        assert!(
            previous.is_subset(&materialized),
            "snapshot went backwards: {} -> {} tags",
            previous.len(),
            materialized.len()
        );
        let done = materialized.len() == TOTAL as usize;
        previous = materialized;
        if done {
            break;
        }
    }
    writer.join().unwrap();
}

#[test]
fn racing_inits_for_one_pid_have_exactly_one_winner() {
    for _ in 0..50 {
        let monitor = Arc::new(ReferenceMonitor::new());
        let contenders: Vec<_> = (0..4)
            .map(|n| {
                let monitor = Arc::clone(&monitor);
                thread::spawn(move || {
                    monitor.init_process_context(ProcessSecurityContext {
                        pid: Pid(1),
                        uid: Uid(1000),
                        sec: vec![Tag(n)],
                        pos: vec![],
                        neg: vec![],
                    })
                })
            })
            .collect();

        let results: Vec<Result<(), MonitorError>> =
            contenders.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one init may succeed");

        // The surviving state is exactly the winner's context, nothing
        // blended from the losers.
        let label = monitor.process_label(Pid(1));
        assert_eq!(label.len(), 1);
    }
}

proptest! {
    /// Under any interleaving of grants and taints against a racing reader,
    /// every snapshot is a subset of the tags written so far and equal in
    /// size to its own contents (no truncation, no overflow).
    #[test]
    fn prop_snapshots_are_consistent_under_random_writes(
        tags in prop::collection::hash_set(-1000i64..1000, 1..64),
        reads in 1usize..32,
    ) {
        let monitor = Arc::new(ReferenceMonitor::new());
        let tags: Vec<Tag> = tags.into_iter().map(Tag).collect();
        grant_global(&monitor, tags.iter().copied());
        let expected: HashSet<Tag> = tags.iter().copied().collect();

        let writer = {
            let monitor = Arc::clone(&monitor);
            let tags = tags.clone();
            thread::spawn(move || {
                for tag in tags {
                    monitor.add_tag_to_label(PID, tag).unwrap();
                }
            })
        };

        for _ in 0..reads {
            let snapshot = monitor.process_label(PID);
            let materialized: Vec<Tag> = snapshot.iter().collect();
            prop_assert_eq!(snapshot.len(), materialized.len());
            prop_assert!(materialized.iter().all(|t| expected.contains(t)));
        }

        writer.join().unwrap();
        let final_label: HashSet<Tag> = monitor.process_label(PID).iter().collect();
        prop_assert_eq!(final_label, expected);
    }
}
