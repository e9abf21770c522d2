//! Hierarchical, weighted progress reporting.
//!
//! A [`Progress`] node holds a value in `[0, 100]`. Reporting on a child propagates the
//! *difference* to its last reported value, scaled by the child's weight, up to the root.
//! Only the root talks to the outside world, through the sink installed by [`StatusProgress`].
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use resxsync::progress::StatusProgress;
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! let root = StatusProgress::new(move |_status, value| sink.lock().unwrap().push(value));
//!
//! let children = root.create_children(&[1.0, 3.0]);
//! children[1].report(100.0);
//! assert_eq!(root.value(), 75.0);
//! ```
//!
//! # Ordering
//!
//! Siblings may report concurrently from different threads. The root applies increments in
//! arrival order, so the sequence of values observed by the sink is not guaranteed to be
//! monotonic: a wide child moving backwards, or a child re-reporting a lower value, lowers the
//! root. Values are neither clamped nor reordered.

use std::{
    fmt,
    sync::{Arc, Mutex},
};

type Sink = dyn Fn(Option<&str>, f64) + Send + Sync;

struct Node {
    parent: Option<Arc<Node>>,
    weight: f64,
    value: Mutex<f64>,
    sink: Option<Box<Sink>>,
}

impl Node {
    fn increment(&self, diff: f64) {
        let value = {
            let mut value = lock(&self.value);
            *value += diff;
            *value
        };
        match &self.parent {
            Some(parent) => parent.increment(self.weight * diff),
            None => self.emit(None, value),
        }
    }

    fn emit(&self, status: Option<&str>, value: f64) {
        if let Some(sink) = &self.sink {
            sink(status, value);
        }
    }
}

fn lock(value: &Mutex<f64>) -> std::sync::MutexGuard<'_, f64> {
    // A panicking sink must not wedge every other reporter.
    value.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A node of the progress tree. Cloning yields another handle to the same node.
#[derive(Clone)]
pub struct Progress {
    node: Arc<Node>,
}

impl Progress {
    /// A root without any sink. Useful when the caller does not care about progress.
    pub fn detached() -> Self {
        Self::root(None)
    }

    fn root(sink: Option<Box<Sink>>) -> Self {
        Progress {
            node: Arc::new(Node {
                parent: None,
                weight: 1.0,
                value: Mutex::new(0.0),
                sink,
            }),
        }
    }

    /// Reports an absolute value for this node.
    pub fn report(&self, value: f64) {
        let diff = {
            let mut current = lock(&self.node.value);
            let diff = value - *current;
            *current = value;
            diff
        };
        match &self.node.parent {
            Some(parent) => parent.increment(self.node.weight * diff),
            None => self.node.emit(None, value),
        }
    }

    /// Reports `done` out of `total` units, as a percentage.
    pub fn report_fraction(&self, done: usize, total: usize) {
        if total == 0 {
            self.report(100.0);
        } else {
            self.report(100.0 * done as f64 / total as f64);
        }
    }

    /// Last value held by this node.
    pub fn value(&self) -> f64 {
        *lock(&self.node.value)
    }

    /// Weight of this node relative to its parent (`1.0` for a root).
    pub fn weight(&self) -> f64 {
        self.node.weight
    }

    /// Creates one child per weight; child `i` contributes `weights[i] / sum(weights)`.
    pub fn create_children(&self, weights: &[f64]) -> Vec<Progress> {
        let total: f64 = weights.iter().sum();
        weights
            .iter()
            .map(|weight| Progress {
                node: Arc::new(Node {
                    parent: Some(self.node.clone()),
                    weight: if total > 0.0 { weight / total } else { 0.0 },
                    value: Mutex::new(0.0),
                    sink: None,
                }),
            })
            .collect()
    }

    /// Creates `count` equally weighted children.
    pub fn create_even_children(&self, count: usize) -> Vec<Progress> {
        self.create_children(&vec![1.0; count])
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("value", &self.value())
            .field("weight", &self.node.weight)
            .field("is_root", &self.node.parent.is_none())
            .finish()
    }
}

/// Root of a progress tree that also carries a textual status label.
///
/// Dereferences to [`Progress`], so children are created directly from it.
pub struct StatusProgress {
    root: Progress,
}

impl StatusProgress {
    /// Creates a root whose updates are forwarded to `sink(status, value)`.
    ///
    /// `status` is `Some` only for [`StatusProgress::report_status`] calls.
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(Option<&str>, f64) + Send + Sync + 'static,
    {
        StatusProgress {
            root: Progress::root(Some(Box::new(sink))),
        }
    }

    /// Starts a new phase: sets the label and resets the value.
    pub fn report_status(&self, status: &str, value: f64) {
        *lock(&self.root.node.value) = value;
        self.root.node.emit(Some(status), value);
    }

    pub fn clear(&self) {
        self.report_status("", 0.0);
    }

    pub fn progress(&self) -> &Progress {
        &self.root
    }
}

impl std::ops::Deref for StatusProgress {
    type Target = Progress;

    fn deref(&self) -> &Progress {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn recording_root() -> (StatusProgress, Arc<Mutex<Vec<(Option<String>, f64)>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let root = StatusProgress::new(move |status, value| {
            sink.lock()
                .unwrap()
                .push((status.map(str::to_string), value));
        });
        (root, events)
    }

    #[test]
    fn test_weighted_children_scale_into_root() {
        let (root, _) = recording_root();
        let children = root.create_children(&[1.0, 3.0]);
        children[1].report(100.0);
        assert_eq!(root.value(), 75.0);
        assert_eq!(children[0].value(), 0.0);

        children[0].report(100.0);
        assert_eq!(root.value(), 100.0);
    }

    #[test]
    fn test_report_propagates_only_the_difference() {
        let (root, events) = recording_root();
        let child = root.create_children(&[1.0, 1.0]).remove(0);
        child.report(40.0);
        child.report(60.0);
        assert!((root.value() - 30.0).abs() < 1e-9);

        let values: Vec<f64> = events.lock().unwrap().iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![20.0, 30.0]);
    }

    #[test]
    fn test_nested_children_multiply_weights() {
        let root = Progress::detached();
        let phases = root.create_children(&[0.7, 0.3]);
        let files = phases[1].create_even_children(2);
        files[0].report(100.0);
        assert!((root.value() - 15.0).abs() < 1e-9);
        assert!((phases[1].value() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_lower_report_moves_root_backwards() {
        let (root, events) = recording_root();
        let child = root.create_children(&[1.0]).remove(0);
        child.report(80.0);
        child.report(50.0);

        let values: Vec<f64> = events.lock().unwrap().iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![80.0, 50.0]);
    }

    #[test]
    fn test_status_resets_value() {
        let (root, events) = recording_root();
        root.report(55.0);
        root.report_status("Merging resources", 0.0);
        assert_eq!(root.value(), 0.0);

        let events = events.lock().unwrap();
        assert_eq!(
            events.last().unwrap(),
            &(Some("Merging resources".to_string()), 0.0)
        );
    }

    #[test]
    fn test_zero_total_weight_yields_inert_children() {
        let root = Progress::detached();
        let children = root.create_children(&[0.0, 0.0]);
        children[0].report(100.0);
        assert_eq!(root.value(), 0.0);
    }

    #[test]
    fn test_concurrent_children_sum_to_total() {
        let root = Progress::detached();
        let children = root.create_even_children(8);
        let handles: Vec<_> = children
            .into_iter()
            .map(|child| {
                thread::spawn(move || {
                    for step in 1..=10 {
                        child.report(step as f64 * 10.0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!((root.value() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_report_fraction() {
        let root = Progress::detached();
        root.report_fraction(1, 4);
        assert_eq!(root.value(), 25.0);
        root.report_fraction(0, 0);
        assert_eq!(root.value(), 100.0);
    }
}
