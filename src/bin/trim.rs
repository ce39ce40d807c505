//! Stage 1b: cut an analyzed segment short at a chosen word.
//!
//! Writes `segment_trimmed.wav` and `analysis_trimmed.json` next to the
//! originals; the parent artifacts stay untouched.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use vocadub::audio;
use vocadub::runs;
use vocadub::segment::persist::{load_document, save_document, SegmentDocument};

#[derive(Parser)]
#[command(name = "trim", about = "Trim an analyzed segment at a target word")]
struct Args {
    /// The word to end the segment on (first case-insensitive match).
    word: String,

    /// Base directory holding run folders; the latest run is used.
    #[arg(long, default_value = "data/analysis")]
    run_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let run_dir = runs::find_latest_run(&args.run_dir)
        .context("no analysis run found; run analyze first")?;
    info!("trimming latest run {}", run_dir.display());

    let document = load_document(&run_dir.join("analysis.json"))?;
    let record = document.to_record()?;

    let Some(word) = record.find_word(&args.word) else {
        bail!(
            "word '{}' not found in transcript: {}",
            args.word,
            record.full_text
        );
    };
    let word_index = word.index;
    info!(
        "trimming at word '{}' (index {}, ends {:.2}s into the segment)",
        word.text, word_index, word.relative.end
    );

    let trimmed = record.trimmed_at_word_index(word_index)?;

    let segment_path = run_dir.join(&document.segment_info.extracted_segment);
    let (samples, sample_rate) = audio::decode_wav_file(&segment_path)?;
    let trimmed_samples =
        audio::slice_seconds(&samples, sample_rate, 0.0, trimmed.region.duration());

    let trimmed_wav = run_dir.join("segment_trimmed.wav");
    audio::encode_wav(&trimmed_samples, sample_rate, &trimmed_wav)?;

    let mut trimmed_document = SegmentDocument::from_record(
        &trimmed,
        PathBuf::from("segment_trimmed.wav"),
        Vec::new(),
    );
    trimmed_document.segment_info.target_lyrics = document.segment_info.target_lyrics.clone();
    save_document(&trimmed_document, &run_dir.join("analysis_trimmed.json"))?;

    println!(
        "trimmed to {} words, {:.2}s -> {}",
        trimmed.words.len(),
        trimmed.region.duration(),
        run_dir.display()
    );
    Ok(())
}
