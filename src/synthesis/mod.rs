//! Cross-lingual speech synthesis.
//!
//! The engine is a zero-shot voice-cloning service: each request carries
//! the text to sing plus a reference prompt cut from the original vocals,
//! and the response mimics the reference voice. Chunks are independent
//! requests; one failed chunk degrades that slot to silence instead of
//! aborting the batch.

pub mod adapter;
pub mod reconciler;

use async_trait::async_trait;
use log::{error, info, warn};

use crate::audio;
use crate::config::SynthesizerConfig;
use crate::error::Result;
use crate::segment::chunker::Chunk;

/// A mono reference excerpt at the engine's expected sample rate.
#[derive(Debug, Clone)]
pub struct ReferencePrompt {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// One synthesized chunk of audio as returned by the engine.
#[derive(Debug, Clone)]
pub struct SynthesizedClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SynthesizedClip {
    pub fn duration(&self) -> f32 {
        audio::duration_in_seconds(self.samples.len(), self.sample_rate)
    }
}

/// Seam for the synthesis engine, so the batch driver and the reconciler
/// can be exercised without a running service.
#[async_trait]
pub trait SpeechSynthesizer {
    async fn synthesize(&self, text: &str, reference: &ReferencePrompt)
        -> Result<SynthesizedClip>;
}

/// Converts a mono excerpt into a reference prompt at the engine's
/// sample rate.
pub fn prepare_reference(
    samples: &[f32],
    sample_rate: u32,
    config: &SynthesizerConfig,
) -> Result<ReferencePrompt> {
    let resampled = audio::resample_to_rate(samples, sample_rate, config.prompt_sample_rate)?;
    Ok(ReferencePrompt {
        samples: resampled,
        sample_rate: config.prompt_sample_rate,
    })
}

/// Synthesizes every chunk of a plan. The output vector is index-aligned
/// with `chunks`; a `None` marks a chunk whose synthesis failed or was
/// skipped, leaving its slot silent at assembly.
pub async fn synthesize_chunks<S: SpeechSynthesizer>(
    synthesizer: &S,
    chunks: &[Chunk],
    source_sample_rate: u32,
    config: &SynthesizerConfig,
) -> Vec<Option<SynthesizedClip>> {
    let mut outputs = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        if chunk.target_text.trim().is_empty() {
            warn!("line {} has no target text, leaving silent", chunk.line_number);
            outputs.push(None);
            continue;
        }

        let reference = match prepare_reference(&chunk.audio_clip, source_sample_rate, config) {
            Ok(prompt) => prompt,
            Err(e) => {
                error!("line {}: reference preparation failed: {e}", chunk.line_number);
                outputs.push(None);
                continue;
            }
        };

        match synthesizer.synthesize(&chunk.target_text, &reference).await {
            Ok(clip) => {
                info!(
                    "line {}: synthesized {:.2}s for {:.2}s target",
                    chunk.line_number,
                    clip.duration(),
                    chunk.target_duration()
                );
                outputs.push(Some(clip));
            }
            Err(e) => {
                error!("line {}: synthesis failed: {e}", chunk.line_number);
                outputs.push(None);
            }
        }
    }

    outputs
}
