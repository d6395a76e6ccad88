//! Memoized reactive nodes.
//!
//! A [Node] caches the output computed from its last accepted input and recomputes only when
//! called with an input that differs by equality. Every call carries a [Sequence] taken when the
//! interaction was accepted. A node stores a result only if no later sequence has reached it
//! while the result was being computed, so results land in request order rather than completion
//! order.

use crate::metrics::{NODE_CACHE_HITS, NODE_COMPUTATIONS, NODE_STALE_RESULTS};

use parking_lot::Mutex;
use serde::Serialize;
use std::ops::Deref;
use std::sync::Arc;

/// Position of an interaction in acceptance order.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Sequence(u64);

impl Sequence {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Node input wrapper comparing shared values by identity.
///
/// Used where an upstream node's output is the input of a downstream node: an unchanged upstream
/// hands out the same [Arc].
#[derive(Debug)]
pub struct Shared<T>(pub Arc<T>);

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Deref for Shared<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// Last accepted computation of a node.
#[derive(Debug)]
struct Cached<I, O> {
    input: I,
    output: Arc<O>,
    sequence: Sequence,
}

#[derive(Debug)]
struct State<I, O> {
    /// Newest sequence that has reached the node
    latest: Sequence,
    cached: Option<Cached<I, O>>,
}

/// A memoized unit of derived state.
#[derive(Debug)]
pub struct Node<I, O> {
    name: &'static str,
    state: Mutex<State<I, O>>,
}

impl<I, O> Node<I, O>
where
    I: Clone + PartialEq,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(State {
                latest: Sequence::default(),
                cached: None,
            }),
        }
    }

    /// Return the output for `input`, computing it if it differs from the cached input.
    ///
    /// The lock is not held while computing, so calls for other inputs proceed concurrently. The
    /// computed output is stored only if `sequence` is still the newest sequence seen by the node.
    /// Either way it is returned to the caller.
    pub fn get_or_compute<E, F>(
        &self,
        sequence: Sequence,
        input: &I,
        compute: F,
    ) -> Result<Arc<O>, E>
    where
        F: FnOnce(&I) -> Result<O, E>,
    {
        {
            let mut state = self.state.lock();
            state.latest = state.latest.max(sequence);
            if let Some(cached) = &state.cached {
                if cached.input == *input {
                    tracing::debug!(node = self.name, "Cache hit");
                    NODE_CACHE_HITS.with_label_values(&[self.name]).inc();
                    return Ok(Arc::clone(&cached.output));
                }
            }
        }

        tracing::debug!(node = self.name, sequence = sequence.get(), "Recomputing");
        NODE_COMPUTATIONS.with_label_values(&[self.name]).inc();
        let output = Arc::new(compute(input)?);

        let mut state = self.state.lock();
        if state.latest == sequence {
            state.cached = Some(Cached {
                input: input.clone(),
                output: Arc::clone(&output),
                sequence,
            });
        } else {
            tracing::debug!(
                node = self.name,
                sequence = sequence.get(),
                latest = state.latest.get(),
                "Discarding stale result"
            );
            NODE_STALE_RESULTS.with_label_values(&[self.name]).inc();
        }
        Ok(output)
    }

    /// The cached input and output, with the sequence that stored them.
    pub fn current(&self) -> Option<(I, Arc<O>, Sequence)> {
        let state = self.state.lock();
        state
            .cached
            .as_ref()
            .map(|cached| (cached.input.clone(), Arc::clone(&cached.output), cached.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    fn double(input: &u32) -> Result<u32, Infallible> {
        Ok(input * 2)
    }

    #[test]
    fn computes_on_first_call() {
        let node = Node::new("test");
        assert!(node.current().is_none());
        let output = node.get_or_compute(Sequence::new(1), &3, double).unwrap();
        assert_eq!(6, *output);
        let (input, cached, sequence) = node.current().unwrap();
        assert_eq!(3, input);
        assert!(Arc::ptr_eq(&output, &cached));
        assert_eq!(Sequence::new(1), sequence);
    }

    #[test]
    fn equal_input_is_a_hit() {
        let node = Node::new("test");
        let calls = AtomicUsize::new(0);
        let compute = |input: &u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            double(input)
        };
        let first = node.get_or_compute(Sequence::new(1), &3, compute).unwrap();
        let second = node.get_or_compute(Sequence::new(2), &3, compute).unwrap();
        assert_eq!(1, calls.load(Ordering::SeqCst));
        assert!(Arc::ptr_eq(&first, &second));
        // The hit still advances the node, so an older computation is not stored.
        node.get_or_compute(Sequence::new(1), &4, compute).unwrap();
        assert_eq!(3, node.current().unwrap().0);
    }

    #[test]
    fn changed_input_recomputes() {
        let node = Node::new("test");
        node.get_or_compute(Sequence::new(1), &3, double).unwrap();
        let output = node.get_or_compute(Sequence::new(2), &4, double).unwrap();
        assert_eq!(8, *output);
        assert_eq!(4, node.current().unwrap().0);
    }

    #[test]
    fn error_is_not_cached() {
        let node: Node<u32, u32> = Node::new("test");
        let result = node.get_or_compute(Sequence::new(1), &3, |_| Err("boom"));
        assert_eq!(Err("boom"), result);
        assert!(node.current().is_none());
        let output = node.get_or_compute(Sequence::new(2), &3, double).unwrap();
        assert_eq!(6, *output);
    }

    #[test]
    fn older_sequence_is_discarded() {
        let node = Node::new("test");
        node.get_or_compute(Sequence::new(5), &1, double).unwrap();
        // A late arrival from an earlier interaction is answered but not stored.
        let output = node.get_or_compute(Sequence::new(3), &10, double).unwrap();
        assert_eq!(20, *output);
        let (input, _, sequence) = node.current().unwrap();
        assert_eq!(1, input);
        assert_eq!(Sequence::new(5), sequence);
    }

    #[test]
    fn slow_stale_computation_does_not_overwrite() {
        let node = Arc::new(Node::new("test"));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let slow_node = Arc::clone(&node);
        let slow = std::thread::spawn(move || {
            slow_node
                .get_or_compute(Sequence::new(1), &1, |input| {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    double(input)
                })
                .unwrap()
        });

        started_rx.recv().unwrap();
        let fast = node.get_or_compute(Sequence::new(2), &2, double).unwrap();
        release_tx.send(()).unwrap();
        let slow = slow.join().unwrap();

        assert_eq!(2, *slow);
        assert_eq!(4, *fast);
        let (input, output, sequence) = node.current().unwrap();
        assert_eq!(2, input);
        assert_eq!(4, *output);
        assert_eq!(Sequence::new(2), sequence);
    }

    #[test]
    fn shared_compares_identity() {
        let a = Arc::new(1);
        let b = Arc::new(1);
        assert_eq!(Shared(Arc::clone(&a)), Shared(Arc::clone(&a)));
        assert_ne!(Shared(a), Shared(b.clone()));
        assert_eq!(1, *Shared(b));
    }
}
