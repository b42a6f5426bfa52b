//! A small, dependency-light metric registry.
//!
//! Every component in this workspace is handed an `Arc<Registry>` at construction time,
//! registers the instruments it needs once, and keeps the returned recorder around for the
//! lifetime of the component rather than re-resolving it on every operation.
#![warn(missing_docs, missing_debug_implementations)]

mod attributes;

use parking_lot::Mutex;
use std::{
    any::Any,
    collections::HashMap,
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

pub use attributes::Attributes;

/// A monotonically increasing counter.
#[derive(Debug, Clone, Default)]
pub struct U64Counter(Arc<AtomicU64>);

impl U64Counter {
    /// Increment the counter by `delta`.
    pub fn inc(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    /// Read the current value.
    pub fn fetch(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A point-in-time observable value that can go up or down.
#[derive(Debug, Clone, Default)]
pub struct U64Gauge(Arc<AtomicU64>);

impl U64Gauge {
    /// Set the gauge to an absolute value.
    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }

    /// Increment the gauge by `delta`.
    pub fn inc(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    /// Decrement the gauge by `delta`, saturating at zero.
    pub fn dec(&self, delta: u64) {
        self.0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(delta))
            })
            .ok();
    }

    /// Read the current value.
    pub fn fetch(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Instruments that can be produced by a [`Metric`].
pub trait MetricObserver: Clone + Default + Debug + Send + Sync + 'static {}

impl MetricObserver for U64Counter {}
impl MetricObserver for U64Gauge {}

/// A named, described instrument that hands out per-[`Attributes`] recorders.
#[derive(Debug)]
pub struct Metric<T> {
    name: &'static str,
    description: &'static str,
    observers: Arc<Mutex<HashMap<Attributes, T>>>,
}

impl<T> Clone for Metric<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            description: self.description,
            observers: Arc::clone(&self.observers),
        }
    }
}

impl<T: MetricObserver> Metric<T> {
    fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            observers: Default::default(),
        }
    }

    /// The instrument's registered name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The instrument's registered description.
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Obtain (creating if necessary) the recorder for a given attribute set.
    ///
    /// The returned handle is cheap to clone and should be held by the caller rather than
    /// re-resolved on every operation.
    pub fn recorder(&self, attributes: impl Into<Attributes>) -> T {
        let mut observers = self.observers.lock();
        observers.entry(attributes.into()).or_default().clone()
    }

    /// Fetch the recorder for a given attribute set, if one has been created.
    pub fn get_observer(&self, attributes: &Attributes) -> Option<T> {
        self.observers.lock().get(attributes).cloned()
    }
}

/// A process-wide collection of named instruments.
#[derive(Debug, Default)]
pub struct Registry {
    instruments: Mutex<HashMap<&'static str, Box<dyn Any + Send + Sync>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or fetch the existing) instrument under `name`.
    ///
    /// Panics if `name` was already registered with a different observer type; this is a
    /// programmer error caught once at startup, not a runtime condition to recover from.
    pub fn register_metric<T: MetricObserver>(
        &self,
        name: &'static str,
        description: &'static str,
    ) -> Metric<T> {
        let mut instruments = self.instruments.lock();
        let entry = instruments
            .entry(name)
            .or_insert_with(|| Box::new(Metric::<T>::new(name, description)));
        entry
            .downcast_ref::<Metric<T>>()
            .expect("metric re-registered under a different observer type")
            .clone()
    }

    /// Look up a previously registered instrument by name, mostly useful from tests.
    pub fn get_instrument<M: Clone + 'static>(&self, name: &str) -> Option<M> {
        self.instruments
            .lock()
            .get(name)
            .and_then(|m| m.downcast_ref::<M>())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_recorder_is_shared_per_attribute_set() {
        let registry = Registry::new();
        let metric: Metric<U64Counter> = registry.register_metric("requests", "total requests");

        let ok = metric.recorder(&[("status", "ok")][..]);
        let ok_again = metric.recorder(&[("status", "ok")][..]);
        let err = metric.recorder(&[("status", "err")][..]);

        ok.inc(2);
        ok_again.inc(3);
        err.inc(1);

        assert_eq!(ok.fetch(), 5);
        assert_eq!(err.fetch(), 1);
    }

    #[test]
    fn gauge_tracks_absolute_value() {
        let registry = Registry::new();
        let metric: Metric<U64Gauge> = registry.register_metric("live_bytes", "live bytes");
        let gauge = metric.recorder(&[][..]);

        gauge.set(10);
        gauge.inc(5);
        assert_eq!(gauge.fetch(), 15);
        gauge.dec(100);
        assert_eq!(gauge.fetch(), 0);
    }

    #[test]
    fn get_instrument_round_trips_registration() {
        let registry = Registry::new();
        let metric: Metric<U64Counter> = registry.register_metric("writes", "writes");
        metric.recorder(&[][..]).inc(1);

        let fetched: Metric<U64Counter> = registry.get_instrument("writes").unwrap();
        assert_eq!(fetched.recorder(&[][..]).fetch(), 1);
        assert!(registry.get_instrument::<Metric<U64Gauge>>("missing").is_none());
    }
}
