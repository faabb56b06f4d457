use std::path::Path;

use anyhow::{Context, Result};

/// Writes mono samples to a 16-bit PCM WAV file.
///
/// Samples are clamped to [-1, 1] and quantized as
/// `round(clamp(x) * 32767)` for both signs.
pub fn write_wav<P: AsRef<Path>>(path: P, samples: &[f64], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(path.as_ref(), spec).context("Failed to create WAV file")?;

    for &s in samples {
        let quantized = (s.clamp(-1.0, 1.0) * i16::MAX as f64).round() as i16;
        writer
            .write_sample(quantized)
            .context("Failed to write sample")?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

/// Reads a WAV file and returns mono samples normalized to [-1, 1] and the
/// sample rate. Multi-channel files are downmixed by averaging.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<f64>, u32)> {
    let reader =
        hound::WavReader::open(path.as_ref()).context("Failed to open WAV file for reading")?;
    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels as usize;

    let raw: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f64 - 1.0;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f64 / max_val))
                .collect::<Result<Vec<f64>, _>>()
                .context("Failed to read integer samples")?
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| v as f64))
            .collect::<Result<Vec<f64>, _>>()
            .context("Failed to read float samples")?,
    };

    let mono = if channels == 1 {
        raw
    } else {
        raw.chunks(channels)
            .map(|frame| frame.iter().sum::<f64>() / channels as f64)
            .collect()
    };

    Ok((mono, sample_rate))
}
