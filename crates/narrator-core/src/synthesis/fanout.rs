//! Concurrent synthesis of every chunk of a run
//!
//! Each chunk runs as its own task in a `JoinSet`. The join is fail-fast:
//! the first chunk that exhausts its retries aborts the rest, the set is
//! drained, and that chunk's error is returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::request::{SynthesisRequest, SynthesisSettings};
use super::retry::RetryPolicy;
use super::SpeechSynthesizer;
use crate::audio::WorkDir;
use crate::error::{Error, Result};
use crate::text::{Chunk, ChunkId};

/// Synthesized audio for one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub chunk: ChunkId,
    pub path: PathBuf,
    /// Seconds, filled in once the segment has been probed
    pub duration: Option<f64>,
}

/// Progress hooks for long runs
pub trait SynthesisObserver: Send + Sync {
    fn planned(&self, _total: usize) {}
    fn segment_ready(&self, _segment: &Segment) {}
}

/// Sends every chunk to the synthesizer concurrently
pub struct SynthesisFanout {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    settings: SynthesisSettings,
    policy: RetryPolicy,
    concurrency: Option<usize>,
    observer: Option<Arc<dyn SynthesisObserver>>,
}

impl SynthesisFanout {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        settings: SynthesisSettings,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            synthesizer,
            settings,
            policy,
            concurrency: None,
            observer: None,
        }
    }

    /// Cap the number of requests in flight.
    pub fn with_concurrency(mut self, limit: Option<usize>) -> Self {
        self.concurrency = limit;
        self
    }

    pub fn with_observer(mut self, observer: Option<Arc<dyn SynthesisObserver>>) -> Self {
        self.observer = observer;
        self
    }

    /// Synthesize `chunks` into `workdir`, returning segments in
    /// `(section, ordinal)` order.
    pub async fn run(&self, chunks: &[Chunk], workdir: &WorkDir) -> Result<Vec<Segment>> {
        if let Some(observer) = &self.observer {
            observer.planned(chunks.len());
        }
        info!("Synthesizing {} chunks", chunks.len());

        let limiter = self.concurrency.map(|n| Arc::new(Semaphore::new(n.max(1))));
        let mut tasks = JoinSet::new();

        for chunk in chunks {
            let synthesizer = Arc::clone(&self.synthesizer);
            let request = self.settings.request(&chunk.markup);
            let path = workdir.segment_path(chunk.id);
            let policy = self.policy.clone();
            let limiter = limiter.clone();
            let id = chunk.id;

            tasks.spawn(async move {
                let _permit = match limiter {
                    Some(semaphore) => Some(
                        semaphore
                            .acquire_owned()
                            .await
                            .map_err(|e| Error::Task(e.to_string()))?,
                    ),
                    None => None,
                };

                policy
                    .run(|attempt| {
                        debug!("Synthesizing {} (attempt {})", id, attempt);
                        write_segment(synthesizer.as_ref(), &request, &path)
                    })
                    .await
                    .map_err(|failure| Error::Synthesis {
                        chunk: id,
                        attempts: failure.attempts,
                        source: Box::new(failure.error),
                    })?;

                Ok::<_, Error>(Segment {
                    chunk: id,
                    path,
                    duration: None,
                })
            });
        }

        let mut segments = Vec::with_capacity(chunks.len());
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| Error::Task(e.to_string()))
                .and_then(|result| result);

            match outcome {
                Ok(segment) => {
                    if let Some(observer) = &self.observer {
                        observer.segment_ready(&segment);
                    }
                    segments.push(segment);
                }
                Err(e) => {
                    warn!("Aborting {} outstanding synthesis tasks: {}", tasks.len(), e);
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    return Err(e);
                }
            }
        }

        segments.sort_by_key(|segment| segment.chunk);
        Ok(segments)
    }
}

async fn write_segment(
    synthesizer: &dyn SpeechSynthesizer,
    request: &SynthesisRequest,
    path: &Path,
) -> Result<()> {
    let audio = synthesizer.synthesize(request).await?;
    tokio::fs::write(path, &audio).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NarratorConfig;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fails the first `failures` attempts of every markup it has not seen
    /// succeed, then echoes the markup back as audio.
    struct FlakySynthesizer {
        failures: u32,
        failure_status: u16,
        fatal_for: Option<String>,
        attempts: Mutex<HashMap<String, u32>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    impl FlakySynthesizer {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                failure_status: 503,
                fatal_for: None,
                attempts: Mutex::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        fn attempts_for(&self, markup: &str) -> u32 {
            self.attempts.lock().unwrap().get(markup).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for FlakySynthesizer {
        async fn synthesize(&self, request: &SynthesisRequest) -> Result<Bytes> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                let count = attempts.entry(request.markup.clone()).or_insert(0);
                *count += 1;
                *count
            };

            if self.fatal_for.as_deref() == Some(request.markup.as_str()) {
                return Err(Error::Api {
                    status: 403,
                    message: "permission denied".into(),
                });
            }
            if attempt <= self.failures {
                return Err(Error::Api {
                    status: self.failure_status,
                    message: "rejected".into(),
                });
            }
            Ok(Bytes::from(request.markup.clone()))
        }
    }

    fn chunks(layout: &[(usize, usize)]) -> Vec<Chunk> {
        layout
            .iter()
            .map(|&(section, ordinal)| Chunk {
                id: ChunkId::new(section, ordinal),
                text: format!("text {section}.{ordinal}"),
                markup: format!("<speak>{section}.{ordinal}</speak>"),
            })
            .collect()
    }

    fn fanout(synthesizer: Arc<FlakySynthesizer>, retries: u32) -> SynthesisFanout {
        let settings =
            SynthesisSettings::resolve(&NarratorConfig::default(), Path::new("out.mp3")).unwrap();
        SynthesisFanout::new(
            synthesizer,
            settings,
            RetryPolicy::new(retries, Duration::ZERO),
        )
    }

    fn workdir(root: &Path) -> WorkDir {
        WorkDir::temporary_in(root, "test", "mp3").unwrap()
    }

    #[tokio::test]
    async fn test_retried_chunks_succeed_in_order() {
        let root = tempfile::tempdir().unwrap();
        let work = workdir(root.path());
        let synthesizer = Arc::new(FlakySynthesizer::new(2));
        let chunks = chunks(&[(1, 0), (0, 0), (0, 1), (2, 0)]);

        let segments = fanout(synthesizer.clone(), 3)
            .run(&chunks, &work)
            .await
            .unwrap();

        let ids: Vec<_> = segments.iter().map(|s| s.chunk).collect();
        assert_eq!(
            ids,
            vec![
                ChunkId::new(0, 0),
                ChunkId::new(0, 1),
                ChunkId::new(1, 0),
                ChunkId::new(2, 0)
            ]
        );
        for segment in &segments {
            let audio = std::fs::read_to_string(&segment.path).unwrap();
            assert_eq!(
                audio,
                format!(
                    "<speak>{}.{}</speak>",
                    segment.chunk.section, segment.chunk.ordinal
                )
            );
            assert_eq!(synthesizer.attempts_for(&audio), 3);
        }
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_run() {
        let root = tempfile::tempdir().unwrap();
        let work = workdir(root.path());
        let synthesizer = Arc::new(FlakySynthesizer::new(5));

        let err = fanout(synthesizer, 3)
            .run(&chunks(&[(0, 0)]), &work)
            .await
            .unwrap_err();

        match err {
            Error::Synthesis {
                chunk,
                attempts,
                source,
            } => {
                assert_eq!(chunk, ChunkId::new(0, 0));
                assert_eq!(attempts, 3);
                assert!(matches!(*source, Error::Api { status: 503, .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fatal_error_identifies_chunk() {
        let root = tempfile::tempdir().unwrap();
        let work = workdir(root.path());
        let mut synthesizer = FlakySynthesizer::new(0);
        synthesizer.fatal_for = Some("<speak>1.2</speak>".into());
        let synthesizer = Arc::new(synthesizer);

        let err = fanout(synthesizer.clone(), 8)
            .run(&chunks(&[(0, 0), (1, 2), (2, 0)]), &work)
            .await
            .unwrap_err();

        match err {
            Error::Synthesis {
                chunk, attempts, ..
            } => {
                assert_eq!(chunk, ChunkId::new(1, 2));
                assert_eq!(attempts, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(synthesizer.attempts_for("<speak>1.2</speak>"), 1);
    }

    #[tokio::test]
    async fn test_bad_request_is_retried() {
        let root = tempfile::tempdir().unwrap();
        let work = workdir(root.path());
        let mut synthesizer = FlakySynthesizer::new(1);
        synthesizer.failure_status = 400;
        let synthesizer = Arc::new(synthesizer);

        let segments = fanout(synthesizer.clone(), 8)
            .run(&chunks(&[(0, 0)]), &work)
            .await
            .unwrap();

        assert_eq!(segments.len(), 1);
        assert_eq!(synthesizer.attempts_for("<speak>0.0</speak>"), 2);
    }

    #[tokio::test]
    async fn test_concurrency_limit_respected() {
        let root = tempfile::tempdir().unwrap();
        let work = workdir(root.path());
        let mut synthesizer = FlakySynthesizer::new(0);
        synthesizer.delay = Duration::from_millis(10);
        let synthesizer = Arc::new(synthesizer);
        let layout: Vec<_> = (0..8).map(|i| (0, i)).collect();

        let segments = fanout(synthesizer.clone(), 1)
            .with_concurrency(Some(2))
            .run(&chunks(&layout), &work)
            .await
            .unwrap();

        assert_eq!(segments.len(), 8);
        assert!(synthesizer.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_observer_sees_every_segment() {
        #[derive(Default)]
        struct Counter {
            planned: AtomicUsize,
            ready: AtomicUsize,
        }
        impl SynthesisObserver for Counter {
            fn planned(&self, total: usize) {
                self.planned.store(total, Ordering::SeqCst);
            }
            fn segment_ready(&self, _segment: &Segment) {
                self.ready.fetch_add(1, Ordering::SeqCst);
            }
        }

        let root = tempfile::tempdir().unwrap();
        let work = workdir(root.path());
        let counter = Arc::new(Counter::default());
        let observer: Arc<dyn SynthesisObserver> = counter.clone();

        fanout(Arc::new(FlakySynthesizer::new(0)), 1)
            .with_observer(Some(observer))
            .run(&chunks(&[(0, 0), (0, 1), (1, 0)]), &work)
            .await
            .unwrap();

        assert_eq!(counter.planned.load(Ordering::SeqCst), 3);
        assert_eq!(counter.ready.load(Ordering::SeqCst), 3);
    }
}
