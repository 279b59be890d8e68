//! Load metrics, injected into each refresh loop.
//!
//! A [`MetricsSink`] hands out one [`LoadMetrics`] handle per feed when the
//! loop is built; the loop never reaches for process-wide registries.

use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};

use crate::records::Feed;

pub const NAMESPACE: &str = "sytralrt";

/// Per-feed observations made by a refresh loop.
pub trait LoadMetrics: Send + Sync {
    /// A refresh cycle completed and replaced the snapshot.
    fn observe_duration(&self, elapsed: Duration);

    /// A refresh cycle failed.
    fn inc_error(&self);
}

pub trait MetricsSink: Send + Sync {
    fn for_feed(&self, feed: Feed) -> Arc<dyn LoadMetrics>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl LoadMetrics for NoopMetrics {
    fn observe_duration(&self, _elapsed: Duration) {}

    fn inc_error(&self) {}
}

impl MetricsSink for NoopMetrics {
    fn for_feed(&self, _feed: Feed) -> Arc<dyn LoadMetrics> {
        Arc::new(NoopMetrics)
    }
}

#[derive(Clone)]
struct FeedCollectors {
    duration: Histogram,
    errors: IntCounter,
}

impl LoadMetrics for FeedCollectors {
    fn observe_duration(&self, elapsed: Duration) {
        self.duration.observe(elapsed.as_secs_f64());
    }

    fn inc_error(&self) {
        self.errors.inc();
    }
}

/// Prometheus-backed metrics with an owned registry.
///
/// Registers, for each feed, `sytralrt_<feed>_load_durations_seconds` and
/// `sytralrt_<feed>_loading_errors`.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    departures: FeedCollectors,
    parkings: FeedCollectors,
    equipments: FeedCollectors,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let departures = register_feed(&registry, Feed::Departures)?;
        let parkings = register_feed(&registry, Feed::Parkings)?;
        let equipments = register_feed(&registry, Feed::Equipments)?;
        Ok(Self {
            registry,
            departures,
            parkings,
            equipments,
        })
    }

    /// Renders every registered metric in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn register_feed(registry: &Registry, feed: Feed) -> Result<FeedCollectors, prometheus::Error> {
    let duration = Histogram::with_opts(
        HistogramOpts::new("load_durations_seconds", "feed load duration distribution")
            .namespace(NAMESPACE)
            .subsystem(feed.as_str())
            .buckets(prometheus::exponential_buckets(0.001, 1.5, 15)?),
    )?;
    let errors = IntCounter::with_opts(
        Opts::new("loading_errors", "number of failed feed loads")
            .namespace(NAMESPACE)
            .subsystem(feed.as_str()),
    )?;
    registry.register(Box::new(duration.clone()))?;
    registry.register(Box::new(errors.clone()))?;
    Ok(FeedCollectors { duration, errors })
}

impl MetricsSink for PrometheusMetrics {
    fn for_feed(&self, feed: Feed) -> Arc<dyn LoadMetrics> {
        let collectors = match feed {
            Feed::Departures => &self.departures,
            Feed::Parkings => &self.parkings,
            Feed::Equipments => &self.equipments,
        };
        Arc::new(collectors.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feeds_have_separate_collectors() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.for_feed(Feed::Parkings).inc_error();
        metrics.for_feed(Feed::Parkings).inc_error();
        metrics
            .for_feed(Feed::Departures)
            .observe_duration(Duration::from_millis(12));

        assert_eq!(metrics.parkings.errors.get(), 2);
        assert_eq!(metrics.departures.errors.get(), 0);
        assert_eq!(metrics.equipments.errors.get(), 0);
        assert_eq!(metrics.departures.duration.get_sample_count(), 1);
    }

    #[test]
    fn test_render_uses_feed_names() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.for_feed(Feed::Equipments).inc_error();
        let text = metrics.render().unwrap();
        assert!(text.contains("sytralrt_equipments_loading_errors 1"));
        assert!(text.contains("sytralrt_departures_load_durations_seconds_bucket"));
    }

    #[test]
    fn test_two_instances_do_not_collide() {
        assert!(PrometheusMetrics::new().is_ok());
        assert!(PrometheusMetrics::new().is_ok());
    }
}
