//! Stage 2: chunk the analyzed segment, synthesize replacement lines and
//! merge them into one replacement vocal track for the segment.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use serde::Serialize;

use vocadub::audio;
use vocadub::config::{SynthesizerConfig, TargetLanguage};
use vocadub::runs;
use vocadub::segment::chunker;
use vocadub::segment::persist::{load_document, save_document};
use vocadub::synthesis::adapter::CosyVoiceClient;
use vocadub::synthesis::{reconciler, synthesize_chunks};
use vocadub::PipelineConfig;

#[derive(Parser)]
#[command(name = "generate", about = "Synthesize replacement vocals for an analyzed segment")]
struct Args {
    /// Target dub language; selects the lyric lines from lyrics.json.
    #[arg(default_value = "spanish")]
    language: TargetLanguage,

    /// Base directory holding run folders; the latest run is used.
    #[arg(long, default_value = "data/analysis")]
    run_dir: PathBuf,

    /// Synthesis service endpoint.
    #[arg(long)]
    endpoint: Option<String>,
}

/// Per-chunk report persisted next to the generated audio.
#[derive(Serialize)]
struct ChunkReport {
    line_number: usize,
    word_index_range: (usize, usize),
    source_text: String,
    target_text: String,
    target_duration: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    generated_duration: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ratio: Option<f32>,
    synthesized: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = PipelineConfig {
        language: args.language,
        run_directory: args.run_dir.clone(),
        ..PipelineConfig::default()
    };

    let run_dir = runs::find_latest_run(&config.run_directory)
        .context("no analysis run found; run analyze first")?;

    // A trimmed derivative supersedes the full analysis when present.
    let trimmed_path = run_dir.join("analysis_trimmed.json");
    let analysis_path = if trimmed_path.exists() {
        info!("using trimmed analysis");
        trimmed_path
    } else {
        run_dir.join("analysis.json")
    };
    let mut document = load_document(&analysis_path)?;
    let record = document.to_record()?;

    let segment_path = run_dir.join(&document.segment_info.extracted_segment);
    let (samples, sample_rate) = audio::decode_wav_file(&segment_path)?;

    let lines = load_lyrics(&run_dir, config.language)?;
    // Record the selected lines with the analysis for later inspection.
    document.segment_info.target_lyrics = Some(lines.clone());
    save_document(&document, &analysis_path)?;

    let mut plan = chunker::chunk_record(&record, &samples, &lines, &config)?;
    info!("{} chunks for {} words", plan.chunks.len(), record.words.len());

    let mut synth_config = SynthesizerConfig::default();
    if let Some(endpoint) = args.endpoint {
        synth_config.endpoint = endpoint;
    }
    let synthesizer = CosyVoiceClient::new(synth_config.clone())?;
    let clips = synthesize_chunks(&synthesizer, &plan.chunks, sample_rate, &synth_config).await;

    // Merge reconciled clips onto a silent copy of the segment timeline.
    let mut merged = vec![0.0f32; samples.len()];
    let mut reports = Vec::with_capacity(plan.chunks.len());
    for (chunk, clip) in plan.chunks.iter_mut().zip(clips) {
        let mut report = ChunkReport {
            line_number: chunk.line_number,
            word_index_range: chunk.word_index_range,
            source_text: chunk.source_text.clone(),
            target_text: chunk.target_text.clone(),
            target_duration: chunk.target_duration(),
            generated_duration: None,
            duration_ratio: None,
            synthesized: false,
        };

        if let Some(clip) = clip {
            chunk.generated_duration = Some(clip.duration());
            report.generated_duration = chunk.generated_duration;
            report.duration_ratio = chunk.duration_ratio();

            let fitted = reconciler::reconcile_duration(
                clip,
                chunk.target_duration(),
                config.duration_tolerance,
            )?;
            let mut resampled =
                audio::resample_to_rate(&fitted.samples, fitted.sample_rate, sample_rate)?;
            audio::apply_fade(&mut resampled, 10, sample_rate);

            let position = (chunk.relative_start * sample_rate as f32) as usize;
            audio::overlay_at(&mut merged, &resampled, position);
            report.synthesized = true;
        } else {
            warn!("line {} left silent", chunk.line_number);
        }
        reports.push(report);
    }

    let language = config.language.as_str();
    let output_wav = run_dir.join(format!("generated_{language}.wav"));
    audio::encode_wav(&merged, sample_rate, &output_wav)?;

    let report_path = run_dir.join(format!("chunks_{language}.json"));
    std::fs::write(&report_path, serde_json::to_string_pretty(&reports)?)?;

    let done = reports.iter().filter(|r| r.synthesized).count();
    println!(
        "synthesized {done}/{} chunks -> {}",
        reports.len(),
        output_wav.display()
    );
    Ok(())
}

/// Reads the per-language lyric lines from `lyrics.json` in the run folder.
fn load_lyrics(run_dir: &std::path::Path, language: TargetLanguage) -> Result<Vec<String>> {
    let path = run_dir.join("lyrics.json");
    if !path.exists() {
        bail!(
            "lyrics file not found: {} (expected an object mapping language to lyric lines)",
            path.display()
        );
    }
    let json = std::fs::read_to_string(&path)?;
    let all: HashMap<String, Vec<String>> = serde_json::from_str(&json)?;
    all.get(language.as_str())
        .cloned()
        .with_context(|| format!("no '{}' lyrics in {}", language.as_str(), path.display()))
}
