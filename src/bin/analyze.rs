//! Stage 1: extract a vocal region, analyze it and persist the record.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use vocadub::audio;
use vocadub::config::{TargetLanguage, TranscriberConfig};
use vocadub::features::extractor;
use vocadub::features::FeatureSeries;
use vocadub::runs;
use vocadub::segment::persist::{save_document, SegmentDocument};
use vocadub::segment::{SegmentRecord, WaveformRegion};
use vocadub::transcript::aligner::Transcriber;
use vocadub::transcript::enricher;
use vocadub::PipelineConfig;

#[derive(Parser)]
#[command(name = "analyze", about = "Extract and analyze a sung region of a recording")]
struct Args {
    /// Source vocal recording (WAV).
    audio: PathBuf,

    /// Target dub language, recorded with the run for later stages.
    #[arg(default_value = "spanish")]
    language: TargetLanguage,

    /// Base directory for run folders.
    #[arg(long, default_value = "data/analysis")]
    run_dir: PathBuf,

    /// Region start in seconds. Auto-detected when omitted.
    #[arg(long)]
    start: Option<f32>,

    /// Region end in seconds. Auto-detected when omitted.
    #[arg(long)]
    end: Option<f32>,

    /// Minimum auto-detected region duration in seconds.
    #[arg(long, default_value_t = 5.0)]
    min_duration: f32,

    /// Maximum auto-detected region duration in seconds.
    #[arg(long, default_value_t = 30.0)]
    max_duration: f32,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let api_key = std::env::var("OPENAI_API_KEY")
        .context("OPENAI_API_KEY is not set; the transcription engine needs it")?;

    if !args.audio.exists() {
        bail!("input file not found: {}", args.audio.display());
    }

    let (samples, sample_rate) = audio::decode_wav_file(&args.audio)?;

    let (region_start, region_end) = match (args.start, args.end) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            let bounds = extractor::detect_vocal_region(
                &samples,
                sample_rate,
                args.min_duration,
                args.max_duration,
            );
            info!("auto-detected region {:.2}s .. {:.2}s", bounds.0, bounds.1);
            bounds
        }
    };

    let region_samples = audio::slice_seconds(&samples, sample_rate, region_start, region_end);
    if region_samples.is_empty() {
        bail!("region {region_start:.2}s .. {region_end:.2}s contains no audio");
    }

    let config = PipelineConfig {
        run_directory: args.run_dir.clone(),
        language: args.language,
        ..PipelineConfig::default()
    };
    let run_dir = runs::create_run_dir(&config.run_directory)?;
    let segment_path = run_dir.join("segment.wav");
    audio::encode_wav(&region_samples, sample_rate, &segment_path)?;

    let features: FeatureSeries = extractor::extract_features(&region_samples, sample_rate);
    let silence_gaps = extractor::detect_silence_gaps(&region_samples, sample_rate);
    info!(
        "tempo {:.1} BPM, {} onsets, {} voiced frames, {} silence gaps",
        features.tempo_bpm,
        features.onset_times.len(),
        features.pitch_contour.len(),
        silence_gaps.len()
    );

    let transcriber = Transcriber::new(TranscriberConfig {
        api_key,
        ..TranscriberConfig::default()
    })?;
    let mut transcript = transcriber
        .transcribe_region(
            &segment_path,
            region_start,
            &features.onset_times,
            config.onset_offset_tolerance,
        )
        .await?;
    enricher::enrich_words(&mut transcript.words, &features);

    let region = WaveformRegion::new(&args.audio, region_start, region_end, sample_rate)?;
    let record = SegmentRecord::new(
        region,
        features,
        transcript.words,
        transcript.full_text,
        transcript.language,
        silence_gaps,
    )?;

    // The document stores the segment path relative to its run folder.
    let document =
        SegmentDocument::from_record(&record, PathBuf::from("segment.wav"), transcript.segments);
    save_document(&document, &run_dir.join("analysis.json"))?;

    println!(
        "analyzed {:.2}s region, {} words -> {}",
        record.region.duration(),
        record.words.len(),
        run_dir.display()
    );
    Ok(())
}
