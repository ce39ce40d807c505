//! Transcript Aligner: obtains a word-level transcript for a waveform and
//! cross-validates word boundaries against detected onsets.
//!
//! The transcription engine's word boundaries are authoritative. The
//! onset comparison is advisory telemetry and is never used to snap a
//! word to an onset.

use std::path::Path;

use log::{info, warn};
use serde::Deserialize;

use super::{PhraseSpan, Transcript, WordSpan};
use crate::config::TranscriberConfig;
use crate::error::{DubError, Result};

/// Raw engine response. `words`, `segments` and `language` are all
/// optional; absence of word-level data is a valid degraded response and
/// is normalized away at ingestion instead of being checked at each use
/// site.
#[derive(Debug, Deserialize)]
struct ApiTranscription {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    words: Option<Vec<ApiWord>>,
    #[serde(default)]
    segments: Option<Vec<ApiSegment>>,
}

#[derive(Debug, Deserialize)]
struct ApiWord {
    word: String,
    start: f32,
    end: f32,
}

#[derive(Debug, Deserialize)]
struct ApiSegment {
    text: String,
    start: f32,
    end: f32,
}

/// HTTP client for the transcription collaborator.
pub struct Transcriber {
    client: reqwest::Client,
    config: TranscriberConfig,
}

impl Transcriber {
    pub fn new(config: TranscriberConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Transcribes a mono waveform file with word and segment level
    /// timestamps, then cross-validates word starts against `onset_times`
    /// (relative seconds). `region_absolute_start` anchors the absolute
    /// time frame of every word.
    pub async fn transcribe_region(
        &self,
        audio_path: &Path,
        region_absolute_start: f32,
        onset_times: &[f32],
        onset_offset_tolerance: f32,
    ) -> Result<Transcript> {
        if !audio_path.exists() {
            return Err(DubError::MissingArtifact(audio_path.to_path_buf()));
        }

        let raw = self.request_with_retry(audio_path).await?;
        Ok(ingest_transcription(
            raw,
            region_absolute_start,
            onset_times,
            onset_offset_tolerance,
        ))
    }

    /// Sends the multipart request; on failure retries once, then fails.
    /// Both collaborators are network- or model-latency-bound, so the
    /// client carries a per-request timeout.
    async fn request_with_retry(&self, audio_path: &Path) -> Result<ApiTranscription> {
        let mut last_err = None;
        for attempt in 0..2 {
            if attempt > 0 {
                warn!("transcription request failed, retrying once");
            }
            match self.request(audio_path).await {
                Ok(raw) => return Ok(raw),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| DubError::Transcription("request failed".into())))
    }

    async fn request(&self, audio_path: &Path) -> Result<ApiTranscription> {
        let bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| DubError::Transcription(format!("invalid mime type: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word")
            .text("timestamp_granularities[]", "segment");

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DubError::Transcription(format!(
                "engine returned {status}: {body}"
            )));
        }

        Ok(response.json::<ApiTranscription>().await?)
    }
}

/// Normalizes a raw engine response into a validated [`Transcript`].
fn ingest_transcription(
    raw: ApiTranscription,
    region_absolute_start: f32,
    onset_times: &[f32],
    onset_offset_tolerance: f32,
) -> Transcript {
    let mut words: Vec<WordSpan> = raw
        .words
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, w)| {
            WordSpan::from_relative(index, w.word.trim(), w.start, w.end, region_absolute_start)
        })
        .collect();

    if words.is_empty() {
        warn!("engine returned no word-level timestamps; keeping phrase-level text only");
    }

    for word in &mut words {
        word.nearest_onset_offset = nearest_onset_offset(word.relative.start, onset_times);
        if let Some(offset) = word.nearest_onset_offset {
            if offset.abs() > onset_offset_tolerance {
                warn!(
                    "word '{}' at {:.3}s is {:+.3}s from nearest onset",
                    word.text, word.relative.start, offset
                );
            }
        }
    }

    let segments = raw
        .segments
        .unwrap_or_default()
        .into_iter()
        .map(|s| PhraseSpan { text: s.text.trim().to_string(), start: s.start, end: s.end })
        .collect();

    info!(
        "transcribed {} words, language {}",
        words.len(),
        raw.language.as_deref().unwrap_or("unknown")
    );

    Transcript {
        full_text: raw.text,
        language: raw.language,
        words,
        segments,
    }
}

/// Signed offset from a word start to its nearest onset, by absolute time
/// difference. `None` when there are no onsets to compare against.
pub fn nearest_onset_offset(word_start: f32, onset_times: &[f32]) -> Option<f32> {
    onset_times
        .iter()
        .min_by(|a, b| (word_start - **a).abs().total_cmp(&(word_start - **b).abs()))
        .map(|nearest| word_start - nearest)
}
