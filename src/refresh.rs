//! Per-feed refresh loops.
//!
//! A cycle retrieves the feed bytes, runs the feed's loader and, only when
//! both succeed, swaps the new snapshot into the store. A failed cycle leaves
//! the previous snapshot visible and bumps the feed's error counter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::{debug, error, info};
use url::Url;

use crate::consumer::{DepartureConsumer, ParkingConsumer};
use crate::error::LoadError;
use crate::fetch::auth::redacted;
use crate::fetch::{Retriever, fetch_bytes};
use crate::metrics::{LoadMetrics, MetricsSink};
use crate::parser::{DelimitedOptions, load_delimited, load_equipments};
use crate::records::{Departure, EquipmentDetail, Feed, Parking};
use crate::store::{SnapshotStore, Stored};

/// Intervals below this disable the background loop of a feed.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Binds a feed to the loader that parses it.
pub trait FeedSource: Send + Sync + 'static {
    type Record: Stored + Send + Sync + 'static;

    const FEED: Feed;

    fn load(&self, bytes: &[u8]) -> Result<Vec<Self::Record>, LoadError>;
}

/// Fixed 8-field departures extract, no header.
#[derive(Debug, Clone, Copy)]
pub struct DepartureSource {
    pub tz: Tz,
}

impl FeedSource for DepartureSource {
    type Record = Departure;

    const FEED: Feed = Feed::Departures;

    fn load(&self, bytes: &[u8]) -> Result<Vec<Departure>, LoadError> {
        let options = DelimitedOptions {
            field_count: Some(DepartureConsumer::FIELD_COUNT),
            ..Default::default()
        };
        load_delimited(bytes, DepartureConsumer::new(self.tz), options)
    }
}

/// Parkings extract: a header line, then lines of varying length.
#[derive(Debug, Clone, Copy)]
pub struct ParkingSource {
    pub tz: Tz,
}

impl FeedSource for ParkingSource {
    type Record = Parking;

    const FEED: Feed = Feed::Parkings;

    fn load(&self, bytes: &[u8]) -> Result<Vec<Parking>, LoadError> {
        let options = DelimitedOptions {
            skip_first_line: true,
            ..Default::default()
        };
        load_delimited(bytes, ParkingConsumer::new(self.tz), options)
    }
}

/// Equipment status XML document.
#[derive(Debug, Clone, Copy)]
pub struct EquipmentSource {
    pub tz: Tz,
}

impl FeedSource for EquipmentSource {
    type Record = EquipmentDetail;

    const FEED: Feed = Feed::Equipments;

    fn load(&self, bytes: &[u8]) -> Result<Vec<EquipmentDetail>, LoadError> {
        load_equipments(bytes, self.tz)
    }
}

/// Drives the refresh cycles of one feed.
pub struct Refresher<S: FeedSource> {
    source: S,
    location: Url,
    interval: Duration,
    retriever: Arc<dyn Retriever>,
    store: Arc<SnapshotStore>,
    metrics: Arc<dyn LoadMetrics>,
}

impl<S: FeedSource> Refresher<S> {
    pub fn new(
        source: S,
        location: Url,
        interval: Duration,
        retriever: Arc<dyn Retriever>,
        store: Arc<SnapshotStore>,
        metrics: &dyn MetricsSink,
    ) -> Self {
        Self {
            source,
            location,
            interval,
            retriever,
            store,
            metrics: metrics.for_feed(S::FEED),
        }
    }

    pub fn background_enabled(&self) -> bool {
        self.interval >= MIN_REFRESH_INTERVAL
    }

    /// Runs one retrieve → parse → replace cycle.
    ///
    /// Returns the number of records now visible for the feed.
    #[tracing::instrument(skip_all, fields(feed = %S::FEED, location = %redacted(&self.location)))]
    pub async fn refresh_once(&self) -> Result<usize, LoadError> {
        let begin = Instant::now();
        match self.cycle().await {
            Ok(count) => {
                let elapsed = begin.elapsed();
                self.metrics.observe_duration(elapsed);
                debug!(
                    records = count,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Feed data updated"
                );
                Ok(count)
            }
            Err(e) => {
                self.metrics.inc_error();
                Err(e)
            }
        }
    }

    async fn cycle(&self) -> Result<usize, LoadError> {
        let bytes = fetch_bytes(self.retriever.as_ref(), &self.location).await?;
        let records = self.source.load(&bytes)?;
        let count = records.len();
        S::Record::slot(&self.store).replace(records);
        Ok(count)
    }

    /// Sleeps, refreshes, repeats until `shutdown` fires.
    ///
    /// The first action is the sleep: the eager load at startup is expected
    /// to have been done with [`Refresher::refresh_once`].
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if !self.background_enabled() {
            info!(feed = %S::FEED, interval = ?self.interval, "Data refreshing is disabled");
            return;
        }
        info!(feed = %S::FEED, interval = ?self.interval, "Starting refresh loop");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => break,
            }
            if let Err(e) = self.refresh_once().await {
                error!(feed = %S::FEED, error = %e, "Error while reloading data");
            }
        }
        info!(feed = %S::FEED, "Refresh loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetrievalError;
    use crate::metrics::NoopMetrics;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono_tz::Europe::Paris;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Serves queued responses in order, then fails.
    struct Scripted(Mutex<Vec<Result<&'static str, ()>>>);

    impl Scripted {
        fn new(mut responses: Vec<Result<&'static str, ()>>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self(Mutex::new(responses)))
        }
    }

    #[async_trait]
    impl Retriever for Scripted {
        async fn retrieve(&self, _location: &Url) -> Result<Bytes, RetrievalError> {
            match self.0.lock().unwrap().pop() {
                Some(Ok(body)) => Ok(Bytes::from_static(body.as_bytes())),
                _ => Err(RetrievalError::UnsupportedScheme("scripted".into())),
            }
        }
    }

    #[derive(Default)]
    struct Counting {
        durations: AtomicU64,
        errors: AtomicU64,
    }

    impl LoadMetrics for Counting {
        fn observe_duration(&self, _elapsed: Duration) {
            self.durations.fetch_add(1, Ordering::SeqCst);
        }

        fn inc_error(&self) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingSink(Arc<Counting>);

    impl MetricsSink for CountingSink {
        fn for_feed(&self, _feed: Feed) -> Arc<dyn LoadMetrics> {
            self.0.clone()
        }
    }

    const GOOD: &str = "C3;BEL;301;Vaulx;A;2024-03-10;07:15:30;E\n\
                        C3;BEL;301;Vaulx;A;2024-03-10;07:25:30;E\n";
    const SHORT_LINE: &str = "C3;BEL;301;Vaulx;A;2024-03-10;07:15:30;E\n\
                              C3;BEL;301;Vaulx;A;2024-03-10;07:25:30\n";

    fn location() -> Url {
        Url::parse("file:///srv/extract_edylic.txt").unwrap()
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_previous_snapshot() {
        let store = Arc::new(SnapshotStore::new());
        let counting = Arc::new(Counting::default());
        let refresher = Refresher::new(
            DepartureSource { tz: Paris },
            location(),
            Duration::from_secs(30),
            Scripted::new(vec![Ok(GOOD), Ok(SHORT_LINE), Err(())]),
            store.clone(),
            &CountingSink(counting.clone()),
        );

        assert_eq!(refresher.refresh_once().await.unwrap(), 2);
        let first = store.departures().get();

        let err = refresher.refresh_once().await.unwrap_err();
        assert!(matches!(err, LoadError::Format { record: 1, .. }));
        assert!(Arc::ptr_eq(&first, &store.departures().get()));

        let err = refresher.refresh_once().await.unwrap_err();
        assert!(matches!(err, LoadError::Retrieval(_)));
        assert!(Arc::ptr_eq(&first, &store.departures().get()));

        assert_eq!(counting.durations.load(Ordering::SeqCst), 1);
        assert_eq!(counting.errors.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_parking_source_skips_header() {
        let store = Arc::new(SnapshotStore::new());
        let body = "id;name;updated;available;occupied\n\
                    P1;Perrache;2024-03-10 07:00:00;120;30\n\
                    P2;Bellecour;2024-03-10 07:00:00;10;90\n\
                    P3;Part-Dieu;2024-03-10 07:00:00;0;500\n";
        let refresher = Refresher::new(
            ParkingSource { tz: Paris },
            location(),
            Duration::from_secs(30),
            Scripted::new(vec![Ok(body)]),
            store.clone(),
            &NoopMetrics,
        );
        assert_eq!(refresher.refresh_once().await.unwrap(), 3);
        assert_eq!(store.parkings().get().records[0].id, "P1");
    }

    #[tokio::test]
    async fn test_sub_second_interval_disables_loop() {
        let refresher = Refresher::new(
            EquipmentSource { tz: Paris },
            location(),
            Duration::from_millis(500),
            Scripted::new(vec![]),
            Arc::new(SnapshotStore::new()),
            &NoopMetrics,
        );
        assert!(!refresher.background_enabled());
        let (_tx, rx) = watch::channel(false);
        // returns immediately instead of looping forever
        refresher.run(rx).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_refreshes_until_shutdown() {
        let store = Arc::new(SnapshotStore::new());
        let counting = Arc::new(Counting::default());
        let refresher = Refresher::new(
            DepartureSource { tz: Paris },
            location(),
            Duration::from_secs(30),
            Scripted::new(vec![Ok(GOOD), Err(()), Ok(GOOD)]),
            store.clone(),
            &CountingSink(counting.clone()),
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(refresher.run(rx));

        tokio::time::sleep(Duration::from_secs(95)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(counting.durations.load(Ordering::SeqCst), 2);
        assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
        assert_eq!(store.departures().get().len(), 2);
    }
}
