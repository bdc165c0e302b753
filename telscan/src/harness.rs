//! Bounded-concurrency fan-out across a host × port product (C6).

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::progress::ProgressSink;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("a probe task panicked: {0}")]
    TaskPanicked(String),
}

/// Runs `probe` over every `(host, port)` pair, holding at most
/// `max_concurrency` probes in flight at once via a semaphore permit per
/// task. Results come back in the same order as `targets`, not completion
/// order. Each completion, success or failure, advances `progress`
/// exactly once.
pub struct Harness {
    max_concurrency: usize,
}

impl Harness {
    pub fn new(max_concurrency: usize) -> Self {
        Self { max_concurrency: max_concurrency.max(1) }
    }

    pub async fn run<T, F, Fut>(
        &self,
        targets: Vec<(String, u16)>,
        progress: &(dyn ProgressSink),
        probe: F,
    ) -> Result<Vec<T>, HarnessError>
    where
        F: Fn(String, u16) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let probe = Arc::new(probe);
        let mut results: Vec<Option<T>> = (0..targets.len()).map(|_| None).collect();
        let mut set = JoinSet::new();

        for (index, (host, port)) in targets.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let probe = probe.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                let result = probe(host, port).await;
                (index, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    results[index] = Some(result);
                    progress.advance();
                }
                Err(e) => {
                    progress.finish();
                    return Err(HarnessError::TaskPanicked(e.to_string()));
                }
            }
        }

        progress.finish();
        Ok(results.into_iter().map(|r| r.expect("every index completed")).collect())
    }
}

/// The Cartesian product of `hosts` and `ports`, in `hosts`-major order.
pub fn target_product(hosts: &[String], ports: &[u16]) -> Vec<(String, u16)> {
    hosts.iter().flat_map(|h| ports.iter().map(move |p| (h.clone(), *p))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn runs_every_target_and_preserves_order() {
        let targets = target_product(&["a".into(), "b".into()], &[1, 2]);
        assert_eq!(targets.len(), 4);

        let harness = Harness::new(2);
        let results = harness
            .run(targets.clone(), &NullProgress, |host, port| async move { format!("{host}:{port}") })
            .await
            .unwrap();

        let expected: Vec<String> = targets.iter().map(|(h, p)| format!("{h}:{p}")).collect();
        assert_eq!(results, expected);
    }

    #[tokio::test]
    async fn never_exceeds_max_concurrency() {
        let targets = target_product(&["x".into()], &(0..20).collect::<Vec<_>>());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let harness = Harness::new(4);
        let in_flight_cl = in_flight.clone();
        let peak_cl = peak.clone();
        harness
            .run(targets, &NullProgress, move |_host, _port| {
                let in_flight = in_flight_cl.clone();
                let peak = peak_cl.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .await
            .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn progress_advances_once_per_completion_regardless_of_outcome() {
        let targets = target_product(&["a".into(), "b".into(), "c".into()], &[1]);
        let counter = Arc::new(AtomicUsize::new(0));

        struct CountingSink(Arc<AtomicUsize>);
        impl ProgressSink for CountingSink {
            fn advance(&self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            fn finish(&self) {}
        }

        let sink = CountingSink(counter.clone());
        let harness = Harness::new(10);
        harness
            .run(targets, &sink, |host, _port| async move { host == "b" /* one "failure" among three */ })
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
