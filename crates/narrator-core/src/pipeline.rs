//! The narration flow: sections, chunks, synthesis, reassembly, timeline

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::audio::{
    probe_all, remove_quietly, AudioMuxer, AutoProbe, DurationProbe, FfmpegMuxer, MuxRequest,
    WorkDir,
};
use crate::config::NarratorConfig;
use crate::error::{Error, Result};
use crate::synthesis::{
    GoogleSpeechClient, RetryPolicy, Segment, SpeechSynthesizer, SynthesisFanout,
    SynthesisObserver, SynthesisSettings,
};
use crate::text::{split_sections, BlockChunker, Chunk, Section};
use crate::timeline::{build_toc, Timeline, Timestamp, TocEntry};

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Narration {
    pub output: PathBuf,
    pub toc: Vec<TocEntry>,
    pub total: Timestamp,
    /// Number of synthesized segments
    pub segments: usize,
}

/// Document split into sections and carved into chunks
struct Plan {
    sections: Vec<Section>,
    counts: Vec<usize>,
    chunks: Vec<Chunk>,
}

/// Drives one document through the whole pipeline
pub struct Narrator {
    config: NarratorConfig,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    muxer: Arc<dyn AudioMuxer>,
    probe: Arc<dyn DurationProbe>,
    observer: Option<Arc<dyn SynthesisObserver>>,
    work_root: Option<PathBuf>,
}

impl Narrator {
    pub fn new(
        config: NarratorConfig,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        muxer: Arc<dyn AudioMuxer>,
        probe: Arc<dyn DurationProbe>,
    ) -> Self {
        Self {
            config,
            synthesizer,
            muxer,
            probe,
            observer: None,
            work_root: None,
        }
    }

    /// Google speech service, ffmpeg and ffprobe from `PATH`.
    pub fn with_defaults(config: NarratorConfig) -> Result<Self> {
        let client = GoogleSpeechClient::new(&config)?;
        Ok(Self::new(
            config,
            Arc::new(client),
            Arc::new(FfmpegMuxer::new()),
            Arc::new(AutoProbe::default()),
        ))
    }

    pub fn with_observer(mut self, observer: Arc<dyn SynthesisObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Create temporary work directories under `root` instead of the
    /// system temp dir.
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    pub fn config(&self) -> &NarratorConfig {
        &self.config
    }

    /// Narrate `document` into `output`.
    ///
    /// On failure nothing is left at `output` and the work directory is
    /// released; in keep mode the parts directory stays for inspection.
    pub async fn narrate(&self, document: &str, output: &Path) -> Result<Narration> {
        self.config.validate()?;
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("narrate", run = %run_id);

        async move {
            info!("Narrating {} bytes into {:?}", document.len(), output);
            let settings = SynthesisSettings::resolve(&self.config, output)?;
            let plan = self.plan(document)?;

            let extension = settings.audio.encoding.extension();
            let workdir = if self.config.keep {
                WorkDir::kept(output, extension)?
            } else {
                match &self.work_root {
                    Some(root) => WorkDir::temporary_in(root, &run_id, extension)?,
                    None => WorkDir::temporary(&run_id, extension)?,
                }
            };

            let result = self.render(&plan, settings, &workdir, output).await;
            workdir.close();

            let narration = result?;
            info!(
                "Finished {:?}: {} segments, {}",
                narration.output, narration.segments, narration.total
            );
            Ok(narration)
        }
        .instrument(span)
        .await
    }

    fn plan(&self, document: &str) -> Result<Plan> {
        let chunker = BlockChunker::new(&self.config)?;
        let sections = split_sections(document)?;

        let mut counts = Vec::with_capacity(sections.len());
        let mut chunks = Vec::new();
        for (index, section) in sections.iter().enumerate() {
            let carved = chunker.chunk_section(index, &section.content)?;
            debug!(
                "Section {} ({:?}): {} chunks",
                index,
                section.title,
                carved.len()
            );
            counts.push(carved.len());
            chunks.extend(carved);
        }

        if chunks.is_empty() {
            return Err(Error::Config("document contains no text to narrate".into()));
        }
        info!(
            "Planned {} chunks across {} sections",
            chunks.len(),
            sections.len()
        );

        Ok(Plan {
            sections,
            counts,
            chunks,
        })
    }

    async fn render(
        &self,
        plan: &Plan,
        settings: SynthesisSettings,
        workdir: &WorkDir,
        output: &Path,
    ) -> Result<Narration> {
        workdir.save_markup(&plan.chunks).await?;

        let fanout = SynthesisFanout::new(
            Arc::clone(&self.synthesizer),
            settings,
            RetryPolicy::from_config(&self.config),
        )
        .with_concurrency(self.config.concurrency)
        .with_observer(self.observer.clone());
        let mut segments = fanout.run(&plan.chunks, workdir).await?;

        let paths: Vec<PathBuf> = segments.iter().map(|s| s.path.clone()).collect();
        let written = self
            .muxer
            .concatenate(MuxRequest {
                segments: &paths,
                output,
                codec: &self.config.acodec,
                manifest: &workdir.manifest_path(),
            })
            .await?;

        let timeline = match self.measure(plan, &mut segments, &paths).await {
            Ok(timeline) => timeline,
            Err(e) => {
                remove_quietly(&written);
                return Err(e);
            }
        };

        Ok(Narration {
            output: written,
            toc: timeline.entries,
            total: timeline.total,
            segments: segments.len(),
        })
    }

    async fn measure(
        &self,
        plan: &Plan,
        segments: &mut [Segment],
        paths: &[PathBuf],
    ) -> Result<Timeline> {
        let durations = probe_all(self.probe.as_ref(), paths).await?;
        for (segment, &secs) in segments.iter_mut().zip(&durations) {
            debug!("{}: {:.3}s", segment.chunk, secs);
            segment.duration = Some(secs);
        }
        build_toc(&plan.sections, &plan.counts, &durations)
    }
}
