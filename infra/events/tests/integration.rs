pub mod fixtures;

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;
    use tickbus_events::*;

    fn recording(
        journal: &Journal,
        tag: &'static str,
    ) -> impl Fn(&Scored) -> anyhow::Result<()> + Send + Sync + use<> {
        let journal = journal.clone();
        move |_: &Scored| {
            journal.record(tag);
            Ok(())
        }
    }

    fn bus_with(clock: Arc<ManualClock>, sink: Arc<CollectingSink>) -> EventBus {
        EventBus::builder().clock(clock).sink(sink).build().expect("bus should build")
    }

    /// A bus whose clock never moves, so a single tick always empties the queue.
    fn frozen_bus() -> EventBus {
        bus_with(Arc::new(ManualClock::new()), Arc::new(CollectingSink::default()))
    }

    #[test]
    fn test_priority_ordering_with_stable_ties() {
        let bus = frozen_bus();
        let journal = Journal::default();

        bus.subscribe(recording(&journal, "A"), 5).unwrap();
        bus.subscribe(recording(&journal, "B"), 10).unwrap();
        bus.subscribe(recording(&journal, "C"), 5).unwrap();

        assert_eq!(bus.publish(Scored { value: 1 }), 3);
        bus.tick();

        assert_eq!(journal.entries(), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_filter_excludes_non_matching_events() {
        let bus = frozen_bus();
        let journal = Journal::default();

        let log = journal.clone();
        bus.subscribe_filtered(
            move |e: &Scored| {
                log.record(e.value.to_string());
                Ok(())
            },
            0,
            |e: &Scored| e.value > 10,
        )
        .unwrap();

        assert_eq!(bus.publish(Scored { value: 5 }), 0);
        assert_eq!(bus.publish(Scored { value: 15 }), 1);
        bus.tick();

        assert_eq!(journal.entries(), vec!["15"]);
    }

    #[test]
    fn test_unsubscribe_is_effective_and_idempotent() {
        let bus = frozen_bus();
        let journal = Journal::default();

        let gone = bus.on(recording(&journal, "gone")).unwrap();
        bus.on(recording(&journal, "kept")).unwrap();

        assert!(bus.unsubscribe(gone));
        assert!(!bus.unsubscribe(gone));

        bus.publish(Scored { value: 1 });
        bus.tick();

        assert_eq!(journal.entries(), vec!["kept"]);
        assert_eq!(bus.subscriber_count(Scored::CATEGORY), 1);
    }

    #[test]
    fn test_handler_failure_is_isolated() {
        let sink = Arc::new(CollectingSink::default());
        let bus = bus_with(Arc::new(ManualClock::new()), sink.clone());
        let journal = Journal::default();

        bus.subscribe(|_: &Scored| anyhow::bail!("corrupt save"), 10).unwrap();
        bus.subscribe(recording(&journal, "H2"), 0).unwrap();

        bus.publish(Scored { value: 1 });
        let report = bus.tick();

        assert_eq!(journal.entries(), vec!["H2"]);
        assert_eq!(report.dispatched, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(sink.count(), 1);
        assert!(sink.messages()[0].contains("corrupt save"));
    }

    #[test]
    fn test_panicking_handler_does_not_abort_drain() {
        let sink = Arc::new(CollectingSink::default());
        let bus = bus_with(Arc::new(ManualClock::new()), sink.clone());
        let journal = Journal::default();

        bus.subscribe(
            |e: &Scored| -> anyhow::Result<()> {
                assert!(e.value > 100, "value too small");
                Ok(())
            },
            1,
        )
        .unwrap();
        bus.subscribe(recording(&journal, "after"), 0).unwrap();

        bus.publish(Scored { value: 1 });
        bus.publish(Scored { value: 2 });
        let report = bus.tick();

        assert_eq!(report.failed, 2);
        assert_eq!(journal.entries(), vec!["after", "after"]);
        assert_eq!(bus.pending(), 0);
        assert!(sink.messages().iter().all(|m| m.contains("value too small")));
    }

    #[test]
    fn test_time_budget_defers_remainder_to_next_drain() {
        let clock = Arc::new(ManualClock::new());
        let bus = bus_with(clock.clone(), Arc::new(CollectingSink::default()));
        let calls = Arc::new(AtomicUsize::new(0));

        let (step, counter) = (clock.clone(), calls.clone());
        bus.on(move |_: &Spawned| {
            step.advance(Duration::from_millis(2));
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
        .unwrap();

        let total = 10;
        for i in 0..total {
            bus.publish(Spawned(i));
        }

        let budget = Duration::from_millis(5);
        let first = bus.drain(budget);
        let after_first = calls.load(Ordering::Relaxed);
        assert!(after_first < total as usize, "budget must cut the pass short");
        assert_eq!(first.dispatched, after_first);
        assert!(first.exhausted);

        while bus.pending() > 0 {
            bus.drain(budget);
        }
        assert_eq!(calls.load(Ordering::Relaxed), total as usize);
    }

    #[test]
    fn test_no_cross_category_leakage() {
        let bus = frozen_bus();
        let journal = Journal::default();
        bus.on(recording(&journal, "scored")).unwrap();

        assert_eq!(bus.publish(Spawned(1)), 0);
        assert!(bus.tick().is_idle());
        assert!(journal.entries().is_empty());
    }

    #[test]
    fn test_group_bulk_release() {
        let bus = frozen_bus();
        let journal = Journal::default();

        let mut group = bus.group();
        group.on(recording(&journal, "s1")).unwrap();
        group.add(recording(&journal, "s2"), 3).unwrap();
        let log = journal.clone();
        group
            .on(move |_: &Spawned| {
                log.record("spawned");
                Ok(())
            })
            .unwrap();
        assert_eq!(group.len(), 3);

        group.dispose();

        assert_eq!(bus.publish(Scored { value: 1 }), 0);
        assert_eq!(bus.publish(Spawned(1)), 0);
        bus.tick();

        assert!(journal.entries().is_empty());
        assert_eq!(bus.subscriber_count(Scored::CATEGORY), 0);
        assert_eq!(bus.subscriber_count(Spawned::CATEGORY), 0);
    }

    #[test]
    fn test_fifo_across_publishes() {
        let bus = frozen_bus();
        let journal = Journal::default();

        let log = journal.clone();
        bus.subscribe(
            move |e: &Spawned| {
                log.record(format!("hi-{}", e.0));
                Ok(())
            },
            1,
        )
        .unwrap();
        let log = journal.clone();
        bus.subscribe(
            move |e: &Spawned| {
                log.record(format!("lo-{}", e.0));
                Ok(())
            },
            0,
        )
        .unwrap();

        bus.publish(Spawned(1));
        bus.publish(Spawned(2));
        bus.tick();

        assert_eq!(journal.entries(), vec!["hi-1", "lo-1", "hi-2", "lo-2"]);
    }

    #[test]
    fn test_unsubscribe_after_publish_still_delivers_queued_task() {
        let bus = frozen_bus();
        let journal = Journal::default();
        let token = bus.on(recording(&journal, "late")).unwrap();

        bus.publish(Scored { value: 1 });
        bus.unsubscribe(token);
        bus.tick();

        assert_eq!(journal.entries(), vec!["late"]);
    }

    #[test]
    fn test_concurrent_publishers_lose_nothing() {
        let bus = frozen_bus();
        let delivered = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let delivered = delivered.clone();
            bus.on(move |_: &Spawned| {
                delivered.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
            .unwrap();
        }

        let publishers: Vec<_> = (0..4)
            .map(|p| {
                let bus = bus.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        bus.publish(Spawned(p * 1_000 + i));
                    }
                })
            })
            .collect();

        while publishers.iter().any(|h| !h.is_finished()) {
            bus.drain(Duration::from_millis(1));
        }
        for handle in publishers {
            handle.join().unwrap();
        }
        while bus.pending() > 0 {
            bus.tick();
        }

        assert_eq!(delivered.load(Ordering::Relaxed), 4 * 250 * 3);
    }

    #[test]
    fn test_concurrent_subscribe_and_unsubscribe() {
        let bus = frozen_bus();

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let bus = bus.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let token = bus.on(|_: &Scored| Ok(())).unwrap();
                        bus.publish(Scored { value: 0 });
                        assert!(bus.unsubscribe(token));
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(bus.subscriber_count(Scored::CATEGORY), 0);
        assert_eq!(bus.categories(), vec![Scored::CATEGORY]);
        while bus.pending() > 0 {
            bus.tick();
        }
    }

    #[test]
    fn test_category_conflict_is_rejected() {
        #[derive(Debug)]
        struct Counterfeit;

        impl Event for Counterfeit {
            const CATEGORY: Category = Scored::CATEGORY;
        }

        let bus = frozen_bus();
        bus.on(|_: &Scored| Ok(())).unwrap();

        let err = bus.on(|_: &Counterfeit| Ok(())).unwrap_err();
        assert!(matches!(err, EventBusError::CategoryConflict { .. }));
        assert_eq!(bus.publish(Counterfeit), 0);
    }

    #[test]
    fn test_dropping_group_releases_subscriptions() {
        let bus = frozen_bus();
        {
            let mut group = SubscriptionGroup::new(&bus);
            group.add_filtered(|_: &Scored| Ok(()), 0, |e: &Scored| e.value == 1).unwrap();
            assert_eq!(bus.subscriber_count(Scored::CATEGORY), 1);
        }
        assert_eq!(bus.subscriber_count(Scored::CATEGORY), 0);
    }

    #[test]
    fn test_token_from_other_bus_is_ignored() {
        let first = frozen_bus();
        let second = frozen_bus();
        let journal = Journal::default();

        let foreign = first.on(|_: &Scored| Ok(())).unwrap();
        let own = second.on(recording(&journal, "second")).unwrap();
        assert_eq!(foreign.category(), own.category());

        assert!(!second.unsubscribe(foreign));
        assert_eq!(second.subscriber_count(Scored::CATEGORY), 1);

        assert_eq!(second.publish(Scored { value: 1 }), 1);
        second.tick();
        assert_eq!(journal.entries(), vec!["second"]);
    }

    #[test]
    fn test_publish_arc_shares_instance() {
        let bus = frozen_bus();
        let journal = Journal::default();
        bus.on(recording(&journal, "one")).unwrap();
        bus.on(recording(&journal, "two")).unwrap();

        let event = Arc::new(Scored { value: 9 });
        assert_eq!(bus.publish_arc(event.clone()), 2);
        assert_eq!(Arc::strong_count(&event), 3, "each queued task shares the event");

        bus.tick();
        assert_eq!(Arc::strong_count(&event), 1);
        assert_eq!(journal.len(), 2);
    }
}
