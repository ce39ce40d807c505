//! Duration reconciliation between synthesized clips and their slots.
//!
//! The engine makes no attempt to hit the original chunk duration, so a
//! clip may run long or short. Correction is a uniform playback-rate
//! change via resampling, which shifts pitch by the same ratio. That
//! artifact is accepted; what is not negotiable is the timeline: a clip
//! must fit its slot.

use log::info;

use super::SynthesizedClip;
use crate::audio;
use crate::error::Result;

/// Fits `clip` to `target_duration` seconds.
///
/// A clip already within `tolerance` relative drift is returned unchanged,
/// which makes the operation idempotent: a corrected clip re-entering the
/// reconciler is a no-op. Otherwise the samples are resampled so the clip
/// plays back in exactly the target duration at its own sample rate.
pub fn reconcile_duration(
    clip: SynthesizedClip,
    target_duration: f32,
    tolerance: f32,
) -> Result<SynthesizedClip> {
    let actual = clip.duration();
    if target_duration <= 0.0 || actual <= 0.0 {
        return Ok(clip);
    }

    let ratio = actual / target_duration;
    if (ratio - 1.0).abs() <= tolerance {
        info!(
            "duration {:.3}s within {:.0}% of target {:.3}s, keeping as is",
            actual,
            tolerance * 100.0,
            target_duration
        );
        return Ok(clip);
    }

    info!(
        "rate-correcting {:.3}s to {:.3}s (ratio {:.3})",
        actual, target_duration, ratio
    );
    let corrected =
        audio::resample_by_ratio(&clip.samples, 1.0 / ratio as f64, clip.sample_rate)?;
    Ok(SynthesizedClip { samples: corrected, sample_rate: clip.sample_rate })
}
