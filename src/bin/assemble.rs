//! Stage 3: place generated parts on the master timeline and mix the
//! result over the instrumental bed.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use vocadub::audio;
use vocadub::timeline::{self, TimelinePlacement};

#[derive(Parser)]
#[command(name = "assemble", about = "Assemble generated parts into the final track")]
struct Args {
    /// Timeline manifest: a JSON array of part placements.
    timeline: PathBuf,

    /// Instrumental bed to mix under the assembled vocals.
    #[arg(long)]
    instrumental: Option<PathBuf>,

    /// Sample rate of the master track.
    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,

    /// Output file.
    #[arg(long, default_value = "final_mix.wav")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if !args.timeline.exists() {
        bail!("timeline manifest not found: {}", args.timeline.display());
    }
    let json = std::fs::read_to_string(&args.timeline)?;
    let placements: Vec<TimelinePlacement> = serde_json::from_str(&json)
        .with_context(|| format!("invalid timeline manifest {}", args.timeline.display()))?;
    info!("assembling {} parts", placements.len());

    let vocals = timeline::assemble_track(&placements, args.sample_rate)?;
    info!(
        "vocal master: {:.2}s",
        audio::duration_in_seconds(vocals.len(), args.sample_rate)
    );

    let master = match &args.instrumental {
        None => vocals,
        Some(path) => {
            let (samples, rate) = audio::decode_wav_file(path)?;
            let instrumental = audio::resample_to_rate(&samples, rate, args.sample_rate)?;
            timeline::mix_with_instrumental(&vocals, &instrumental)
        }
    };

    audio::encode_wav(&master, args.sample_rate, &args.output)?;
    println!(
        "assembled {:.2}s -> {}",
        audio::duration_in_seconds(master.len(), args.sample_rate),
        args.output.display()
    );
    Ok(())
}
