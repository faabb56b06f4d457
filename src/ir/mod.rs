//! Impulse response synthesis: per-band assembly, band-limiting, mixdown
//! and WAV export.

pub mod assembler;
pub mod convolve;
pub mod decay;
pub mod filters;
pub mod wav;

use std::path::Path;

use anyhow::{Context, Result};

use crate::sim::arrivals::ArrivalsByBand;
use crate::sim::config::FrequencyBands;

use assembler::assemble_band;
use convolve::convolve;
use filters::{design_bandpass, filter_band};

/// Peak level of the mixed impulse response.
pub const HEADROOM: f64 = 0.98;

/// A rendered multi-band impulse response.
#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    pub sample_rate: f64,
    /// Mixed mono impulse response, peak-scaled to [`HEADROOM`].
    pub samples: Vec<f64>,
    /// Band-limited per-band buffers (same scale as `samples`).
    pub band_samples: Vec<Vec<f64>>,
    /// Band center frequencies in Hz, parallel to `band_samples`.
    pub band_centers: Vec<f64>,
}

impl ImpulseResponse {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }

    /// Writes the mixed IR as a 16-bit PCM mono WAV file.
    pub fn write_wav<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        wav::write_wav(path, &self.samples, self.sample_rate.round() as u32)
            .context("Failed to write IR WAV")
    }
}

/// Renders the final impulse response from sorted per-band arrivals.
///
/// Each band is accumulated into a raw buffer, band-limited with its
/// windowed-sinc kernel, then all bands are summed (zero-extending shorter
/// buffers) and the mix is scaled so its peak sits at [`HEADROOM`].
pub fn render_impulse_response(
    arrivals: &ArrivalsByBand,
    bands: &FrequencyBands,
    sample_rate: f64,
) -> ImpulseResponse {
    let mut band_samples: Vec<Vec<f64>> = Vec::with_capacity(bands.len());
    for (band, &center) in bands.centers.iter().enumerate() {
        let raw = assemble_band(arrivals.band(band), sample_rate);
        let kernel = design_bandpass(center, sample_rate);
        band_samples.push(filter_band(&raw, &kernel));
    }

    let max_len = band_samples.iter().map(|b| b.len()).max().unwrap_or(0);
    let mut samples = vec![0.0; max_len];
    for band in &band_samples {
        for (out, &s) in samples.iter_mut().zip(band.iter()) {
            *out += s;
        }
    }

    let peak = samples.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
    if peak > 0.0 {
        let scale = HEADROOM / peak;
        for s in &mut samples {
            *s *= scale;
        }
        for band in &mut band_samples {
            for s in band.iter_mut() {
                *s *= scale;
            }
        }
    }

    ImpulseResponse {
        sample_rate,
        samples,
        band_samples,
        band_centers: bands.centers.clone(),
    }
}

/// Applies the impulse response to dry audio and normalizes the result.
pub fn auralize(dry: &[f64], ir: &ImpulseResponse) -> Vec<f64> {
    let mut wet = convolve(dry, &ir.samples);
    let peak = wet.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
    if peak > 0.0 {
        for s in &mut wet {
            *s /= peak;
        }
    }
    wet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::arrivals::Arrival;

    fn bands_and_arrivals(peaks: &[f64]) -> (FrequencyBands, ArrivalsByBand) {
        let centers: Vec<f64> = crate::sim::config::DEFAULT_BAND_FREQUENCIES
            .iter()
            .copied()
            .take(peaks.len())
            .collect();
        let bands = FrequencyBands::new(centers, vec![0.2; peaks.len()]);
        let mut arrivals = ArrivalsByBand::new(peaks.len());
        for (band, &peak) in peaks.iter().enumerate() {
            arrivals.push(band, Arrival::new(0.05, peak));
            arrivals.push(band, Arrival::new(0.15, peak / 2.0));
        }
        (bands, arrivals)
    }

    #[test]
    fn test_mix_peak_is_headroom() {
        // Per-band peaks of any size end up mixed to exactly 0.98
        let (bands, arrivals) = bands_and_arrivals(&[0.2, 1.4, 0.6, 0.9]);
        let ir = render_impulse_response(&arrivals, &bands, 44100.0);
        let peak = ir.samples.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
        assert!((peak - HEADROOM).abs() < 1e-9, "peak {peak}");
    }

    #[test]
    fn test_band_breakdown_matches_band_count() {
        let (bands, arrivals) = bands_and_arrivals(&[0.5, 0.5]);
        let ir = render_impulse_response(&arrivals, &bands, 44100.0);
        assert_eq!(ir.band_samples.len(), 2);
        assert_eq!(ir.band_centers, bands.centers);
        for band in &ir.band_samples {
            assert!(!band.is_empty());
        }
    }

    #[test]
    fn test_band_sum_equals_mix() {
        let (bands, arrivals) = bands_and_arrivals(&[0.3, 0.7, 0.2]);
        let ir = render_impulse_response(&arrivals, &bands, 44100.0);
        for (i, &s) in ir.samples.iter().enumerate() {
            let summed: f64 = ir.band_samples.iter().map(|b| b.get(i).copied().unwrap_or(0.0)).sum();
            assert!((s - summed).abs() < 1e-9, "mismatch at {i}");
        }
    }

    #[test]
    fn test_empty_arrivals_render_silence() {
        let bands = FrequencyBands::uniform(0.2);
        let arrivals = ArrivalsByBand::new(bands.len());
        let ir = render_impulse_response(&arrivals, &bands, 44100.0);
        assert!(!ir.is_empty());
        assert!(ir.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_ir_duration() {
        let bands = FrequencyBands::uniform(0.2);
        let arrivals = ArrivalsByBand::new(bands.len());
        let ir = render_impulse_response(&arrivals, &bands, 44100.0);
        assert!((ir.duration() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_auralize_click_reproduces_ir_shape() {
        let (bands, arrivals) = bands_and_arrivals(&[0.5, 0.9]);
        let ir = render_impulse_response(&arrivals, &bands, 44100.0);

        let mut click = vec![0.0; 64];
        click[0] = 1.0;
        let wet = auralize(&click, &ir);
        assert_eq!(wet.len(), click.len() + ir.len() - 1);
        let peak = wet.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
        assert!((peak - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_wav_export_round_trip() {
        let (bands, arrivals) = bands_and_arrivals(&[0.5]);
        let ir = render_impulse_response(&arrivals, &bands, 44100.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room.wav");
        ir.write_wav(&path).unwrap();

        let (samples, sr) = wav::read_wav(&path).unwrap();
        assert_eq!(sr, 44100);
        assert_eq!(samples.len(), ir.len());
    }
}
