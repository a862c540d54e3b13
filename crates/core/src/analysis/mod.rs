//! Offline beatmap generation: finds note onsets in a recorded track and
//! lays them out across the finger zones.

use std::{f32::consts::PI, fmt, path::Path, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{
    beatmap::{Beatmap, Note},
    config::GeneratorConfig,
    FilletError, Result,
};

/// Maps sensitivity in `[0, 1]` onto the normalised flux threshold.
const SENSITIVITY_SCALE: f32 = 0.3;
/// Frames on each side used for the adaptive threshold's moving average.
const LOCAL_MEAN_RADIUS: usize = 8;

/// Mono PCM decoded from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decodes a WAV file and averages its channels down to mono.
pub fn read_wav_mono(path: impl AsRef<Path>) -> Result<DecodedAudio> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    tracing::debug!(sample_rate = spec.sample_rate, channels, "decoded wav");
    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Spectral-flux onset detector over Hann-windowed FFT frames.
pub struct OnsetDetector {
    sample_rate: u32,
    frame_size: usize,
    hop_size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl OnsetDetector {
    /// Creates a detector with a hop of half a frame.
    pub fn new(sample_rate: u32, frame_size: usize) -> Result<Self> {
        if sample_rate == 0 {
            return Err(FilletError::InvalidInput("sample rate must be positive"));
        }
        if frame_size < 2 {
            return Err(FilletError::InvalidInput(
                "onset detection requires frames with at least two samples",
            ));
        }

        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(frame_size);
        Ok(Self {
            sample_rate,
            frame_size,
            hop_size: frame_size / 2,
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Onset timestamps in milliseconds, ascending.
    ///
    /// `sensitivity` 0.0 keeps every flux peak, 1.0 keeps only the strongest.
    pub fn detect(&mut self, samples: &[f32], sensitivity: f32) -> Result<Vec<f64>> {
        if samples.len() < 2 {
            return Err(FilletError::InvalidInput("analysis requires at least two samples"));
        }

        let flux = self.spectral_flux(samples)?;
        let peak = flux.iter().copied().fold(0.0_f32, f32::max);
        if peak <= f32::EPSILON {
            return Ok(Vec::new());
        }
        let flux: Vec<f32> = flux.iter().map(|value| value / peak).collect();
        let delta = sensitivity.clamp(0.0, 1.0) * SENSITIVITY_SCALE;

        let mut onsets = Vec::new();
        for index in 0..flux.len() {
            let value = flux[index];
            let rising = index == 0 || value > flux[index - 1];
            let falling = flux.get(index + 1).map_or(true, |next| value >= *next);
            if !(rising && falling) || value <= f32::EPSILON {
                continue;
            }
            if value >= local_mean(&flux, index) + delta {
                onsets.push(self.frame_time_ms(index));
            }
        }

        tracing::debug!(frames = flux.len(), onsets = onsets.len(), "onset detection finished");
        Ok(onsets)
    }

    fn spectral_flux(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let frame_count = if samples.len() <= self.frame_size {
            1
        } else {
            (samples.len() - self.frame_size).div_ceil(self.hop_size) + 1
        };

        let mut previous = vec![0.0_f32; self.spectrum.len()];
        let mut flux = Vec::with_capacity(frame_count);

        for frame in 0..frame_count {
            let start = frame * self.hop_size;
            for (offset, slot) in self.input.iter_mut().enumerate() {
                let sample = samples.get(start + offset).copied().unwrap_or(0.0);
                *slot = sample * hann_value(offset, self.frame_size);
            }

            self.plan
                .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)?;

            let mut rise = 0.0;
            for (bin, last) in self.spectrum.iter().zip(previous.iter_mut()) {
                let magnitude = bin.norm();
                rise += (magnitude - *last).max(0.0);
                *last = magnitude;
            }
            flux.push(rise);
        }

        Ok(flux)
    }

    fn frame_time_ms(&self, frame: usize) -> f64 {
        let center = frame * self.hop_size + self.frame_size / 2;
        center as f64 * 1000.0 / f64::from(self.sample_rate)
    }
}

impl fmt::Debug for OnsetDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnsetDetector")
            .field("sample_rate", &self.sample_rate)
            .field("frame_size", &self.frame_size)
            .field("hop_size", &self.hop_size)
            .finish()
    }
}

/// Zone order notes cycle through: up the hand and back, `0 1 2 3 4 3 2 1`.
pub fn zone_pattern(zone_count: usize) -> Vec<usize> {
    let mut pattern: Vec<usize> = (0..zone_count).collect();
    if zone_count > 2 {
        pattern.extend((1..zone_count - 1).rev());
    }
    pattern
}

/// Drops onsets that follow the previously kept one by less than `min_gap_ms`.
pub fn enforce_min_gap(onsets_ms: &[f64], min_gap_ms: f64) -> Vec<f64> {
    let mut kept: Vec<f64> = Vec::with_capacity(onsets_ms.len());
    for &time in onsets_ms {
        if kept.last().map_or(true, |last| time - last >= min_gap_ms) {
            kept.push(time);
        }
    }
    kept
}

/// Turns ascending onset times into a beatmap with whole-millisecond times.
pub fn beatmap_from_onsets(onsets_ms: &[f64], config: &GeneratorConfig) -> Result<Beatmap> {
    let pattern = zone_pattern(config.zone_count);
    if pattern.is_empty() {
        return Err(FilletError::InvalidInput("zone_count must be positive"));
    }

    let notes = enforce_min_gap(onsets_ms, config.min_gap_ms)
        .into_iter()
        .enumerate()
        .map(|(index, time)| Note::new(time.round(), pattern[index % pattern.len()]))
        .collect();
    Ok(Beatmap::new(notes))
}

/// Full pipeline from decoded audio to a validated beatmap.
pub fn generate_beatmap(
    audio: &DecodedAudio,
    frame_size: usize,
    config: &GeneratorConfig,
) -> Result<Beatmap> {
    let mut detector = OnsetDetector::new(audio.sample_rate, frame_size)?;
    let onsets = detector.detect(&audio.samples, config.sensitivity)?;
    let beatmap = beatmap_from_onsets(&onsets, config)?;
    beatmap.validate()?;
    tracing::info!(onsets = onsets.len(), notes = beatmap.len(), "generated beatmap");
    Ok(beatmap)
}

fn local_mean(values: &[f32], index: usize) -> f32 {
    let start = index.saturating_sub(LOCAL_MEAN_RADIUS);
    let end = (index + LOCAL_MEAN_RADIUS + 1).min(values.len());
    let window = &values[start..end];
    window.iter().sum::<f32>() / window.len() as f32
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
