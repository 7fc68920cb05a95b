use crate::config::TickerConfig;
use crate::events::{EntitySpawned, Heartbeat, ScoreChanged};
use anyhow::{Context, Result, anyhow};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tickbus_events::{DrainReport, EventBus, EventBusError, SubscriptionGroup};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Counters updated by the ticker's own subscribers.
#[derive(Debug, Default)]
pub struct Stats {
    heartbeats: AtomicU64,
    spawned: AtomicU64,
    score_events: AtomicU64,
    score: AtomicI64,
    penalties: AtomicU64,
}

impl Stats {
    #[must_use]
    pub fn heartbeats(&self) -> u64 {
        self.heartbeats.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn score_events(&self) -> u64 {
        self.score_events.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn score(&self) -> i64 {
        self.score.load(Ordering::Relaxed)
    }

    /// Score changes with a negative delta.
    #[must_use]
    pub fn penalties(&self) -> u64 {
        self.penalties.load(Ordering::Relaxed)
    }
}

/// Totals of one [`Ticker::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub published: usize,
    pub dispatched: usize,
    pub failed: usize,
}

impl RunSummary {
    const fn record(&mut self, report: &DrainReport) {
        self.dispatched += report.dispatched;
        self.failed += report.failed;
    }
}

/// Drives an [`EventBus`] from a fixed-interval loop while background threads publish into it.
#[derive(Debug)]
pub struct Ticker {
    bus: EventBus,
    config: TickerConfig,
    stats: Arc<Stats>,
    _subscriptions: SubscriptionGroup,
}

impl Ticker {
    /// Builds the bus from `config.bus` and registers the ticker's subscribers.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: TickerConfig) -> Result<Self> {
        config.validate()?;

        let bus = EventBus::builder()
            .config(config.bus.clone())
            .build()
            .context("Failed to build event bus")?;
        let stats = Arc::new(Stats::default());
        let subscriptions =
            register(&bus, &stats).context("Failed to register ticker subscribers")?;

        Ok(Self { bus, config, stats, _subscriptions: subscriptions })
    }

    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub fn stats(&self) -> Arc<Stats> {
        Arc::clone(&self.stats)
    }

    /// Ticks until the configured tick count is reached or `shutdown` resolves.
    ///
    /// Each tick publishes a [`Heartbeat`] and drains the bus once within its budget. On exit
    /// the publishers are stopped and joined, and whatever is still queued is drained.
    ///
    /// # Errors
    /// Returns an error if a publisher thread cannot be spawned or panicked.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<RunSummary> {
        let stop = Arc::new(AtomicBool::new(false));
        let publishers = self.spawn_publishers(&stop)?;

        let mut interval = time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            interval_ms = self.config.tick_interval_ms,
            ticks = self.config.ticks,
            publishers = self.config.publishers,
            "Ticker started"
        );

        let mut summary = RunSummary::default();
        while self.config.ticks == 0 || summary.ticks < self.config.ticks {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested, stopping ticker");
                    break;
                },
                _ = interval.tick() => {},
            }

            summary.ticks += 1;
            self.bus.publish(Heartbeat { tick: summary.ticks });
            let report = self.bus.tick();
            summary.record(&report);
            log_report(summary.ticks, &report);
        }

        stop.store(true, Ordering::Relaxed);
        for handle in publishers {
            summary.published +=
                handle.join().map_err(|_| anyhow!("Publisher thread panicked"))?;
        }

        while self.bus.pending() > 0 {
            summary.record(&self.bus.tick());
        }

        info!(
            ticks = summary.ticks,
            published = summary.published,
            dispatched = summary.dispatched,
            failed = summary.failed,
            score = self.stats.score(),
            "Ticker stopped"
        );
        Ok(summary)
    }

    fn spawn_publishers(&self, stop: &Arc<AtomicBool>) -> Result<Vec<JoinHandle<usize>>> {
        (0..self.config.publishers)
            .map(|publisher| {
                let bus = self.bus.clone();
                let stop = Arc::clone(stop);
                let events = self.config.events_per_publisher;

                thread::Builder::new()
                    .name(format!("publisher-{publisher}"))
                    .spawn(move || publish_batch(&bus, &stop, publisher, events))
                    .with_context(|| format!("Failed to spawn publisher {publisher}"))
            })
            .collect()
    }
}

fn publish_batch(bus: &EventBus, stop: &AtomicBool, publisher: usize, events: usize) -> usize {
    let mut published = 0;
    for entity in 0..events {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        if entity % 2 == 0 {
            bus.publish(EntitySpawned { publisher, entity });
        } else {
            bus.publish(ScoreChanged { publisher, delta: score_delta(entity) });
        }
        published += 1;
        if entity % 64 == 63 {
            thread::yield_now();
        }
    }
    debug!(publisher, published, "Publisher finished");
    published
}

/// Cycles through -2..=2, so one in five score changes is empty.
fn score_delta(entity: usize) -> i64 {
    i64::try_from(entity % 5).unwrap_or_default() - 2
}

fn register(bus: &EventBus, stats: &Arc<Stats>) -> Result<SubscriptionGroup, EventBusError> {
    let mut group = bus.group();

    let s = Arc::clone(stats);
    group.on(move |_: &Heartbeat| {
        s.heartbeats.fetch_add(1, Ordering::Relaxed);
        Ok(())
    })?;

    let s = Arc::clone(stats);
    group.on(move |_: &EntitySpawned| {
        s.spawned.fetch_add(1, Ordering::Relaxed);
        Ok(())
    })?;

    // Audit runs first; its failures must not keep the score from being applied.
    group.add(
        |e: &ScoreChanged| {
            anyhow::ensure!(e.delta != 0, "empty score change from publisher {}", e.publisher);
            Ok(())
        },
        10,
    )?;

    let s = Arc::clone(stats);
    group.add_filtered(
        move |_: &ScoreChanged| {
            s.penalties.fetch_add(1, Ordering::Relaxed);
            Ok(())
        },
        5,
        |e: &ScoreChanged| e.delta < 0,
    )?;

    let s = Arc::clone(stats);
    group.add(
        move |e: &ScoreChanged| {
            s.score_events.fetch_add(1, Ordering::Relaxed);
            s.score.fetch_add(e.delta, Ordering::Relaxed);
            Ok(())
        },
        0,
    )?;

    Ok(group)
}

fn log_report(tick: u64, report: &DrainReport) {
    if report.is_idle() {
        return;
    }
    if report.failed > 0 {
        warn!(
            tick,
            dispatched = report.dispatched,
            failed = report.failed,
            remaining = report.remaining,
            "Tick finished with handler failures"
        );
    } else {
        debug!(
            tick,
            dispatched = report.dispatched,
            remaining = report.remaining,
            exhausted = report.exhausted,
            elapsed_us = report.elapsed.as_micros(),
            "Tick finished"
        );
    }
}
