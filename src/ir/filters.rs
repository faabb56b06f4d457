use super::convolve::convolve;

/// FIR length; odd so the kernel has an exact center tap (linear phase).
pub const NUM_TAPS: usize = 257;

/// A linear-phase windowed-sinc bandpass kernel for one frequency band.
#[derive(Debug, Clone)]
pub struct BandpassKernel {
    pub taps: Vec<f64>,
    pub center_freq: f64,
    pub low_freq: f64,
    pub high_freq: f64,
}

/// Designs the bandpass for a band centered at `center_freq`.
///
/// Bandwidth equals the center frequency: edges at `f_c / 2` and
/// `1.5 * f_c`, clamped to `[20 Hz, f_s/2 - 1]`. The difference-of-sincs
/// kernel is Hann windowed and normalized to unit magnitude response at
/// the center frequency, so band gain is determined by the simulation
/// rather than the filter.
pub fn design_bandpass(center_freq: f64, sample_rate: f64) -> BandpassKernel {
    let low_freq = (center_freq - center_freq / 2.0).max(20.0);
    let high_freq = (center_freq + center_freq / 2.0).min(sample_rate / 2.0 - 1.0);

    // Normalized edge frequencies (cycles per sample)
    let fl = low_freq / sample_rate;
    let fh = high_freq / sample_rate;
    let mid = (NUM_TAPS - 1) / 2;

    let mut taps = Vec::with_capacity(NUM_TAPS);
    for n in 0..NUM_TAPS {
        let k = n as f64 - mid as f64;
        let ideal = if n == mid {
            2.0 * (fh - fl)
        } else {
            let w = 2.0 * std::f64::consts::PI * k;
            ((w * fh).sin() - (w * fl).sin()) / (std::f64::consts::PI * k)
        };
        let window = 0.5
            * (1.0
                - (2.0 * std::f64::consts::PI * n as f64 / (NUM_TAPS as f64 - 1.0)).cos());
        taps.push(ideal * window);
    }

    let gain = magnitude_response(&taps, center_freq, sample_rate);
    if gain > 0.0 {
        for t in &mut taps {
            *t /= gain;
        }
    }

    BandpassKernel {
        taps,
        center_freq,
        low_freq,
        high_freq,
    }
}

/// Magnitude of the kernel's frequency response at a single frequency,
/// evaluated directly from the DTFT definition.
pub fn magnitude_response(taps: &[f64], freq: f64, sample_rate: f64) -> f64 {
    let omega = 2.0 * std::f64::consts::PI * freq / sample_rate;
    let mut re = 0.0;
    let mut im = 0.0;
    for (n, &t) in taps.iter().enumerate() {
        let phase = omega * n as f64;
        re += t * phase.cos();
        im -= t * phase.sin();
    }
    (re * re + im * im).sqrt()
}

/// Band-limits a signal with the kernel, compensating the group delay.
///
/// The linear-phase kernel delays everything by `(NUM_TAPS - 1) / 2`
/// samples; that lead-in is trimmed so filtered samples stay aligned with
/// the raw impulse response. The output keeps the kernel's tail beyond the
/// input length.
pub fn filter_band(signal: &[f64], kernel: &BandpassKernel) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }
    let full = convolve(signal, &kernel.taps);
    let delay = (kernel.taps.len() - 1) / 2;
    full[delay.min(full.len())..].to_vec()
}
