//! Energy decay analysis of a rendered impulse response.
//!
//! Surrounding tools read reverberation times off the IR; the engine only
//! provides the Schroeder integration and the standard line-fit estimates.

/// Schroeder backward integration of a pressure signal.
///
/// Returns the decay curve in dB, normalized to 0 dB at time zero.
pub fn schroeder_decay(samples: &[f64]) -> Vec<f64> {
    let energies: Vec<f64> = samples.iter().map(|&p| p * p).collect();
    let total: f64 = energies.iter().sum();
    if total <= 0.0 {
        return vec![f64::NEG_INFINITY; samples.len()];
    }

    let mut decay = vec![0.0; energies.len()];
    let mut cumulative = total;
    for (d, &e) in decay.iter_mut().zip(energies.iter()) {
        *d = 10.0 * (cumulative / total).log10();
        cumulative -= e;
    }
    decay
}

/// Reverberation time from a decay curve.
///
/// Fits a line to the curve between `start_db` and `end_db` and
/// extrapolates to -60 dB.
fn rt_from_decay(decay: &[f64], sample_rate: f64, start_db: f64, end_db: f64) -> Option<f64> {
    let mut i_start = None;
    let mut i_end = None;
    for (i, &val) in decay.iter().enumerate() {
        if val <= start_db && i_start.is_none() {
            i_start = Some(i);
        }
        if val <= end_db && i_end.is_none() {
            i_end = Some(i);
        }
    }
    let i_start = i_start?;
    let i_end = i_end?;
    if i_end <= i_start {
        return None;
    }

    let n = (i_end - i_start + 1) as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;
    for (i, &y) in decay.iter().enumerate().take(i_end + 1).skip(i_start) {
        let x = i as f64 / sample_rate;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x);
    if slope >= 0.0 {
        return None;
    }
    Some(-60.0 / slope)
}

/// T30-based RT60 estimate (-5 dB to -35 dB), falling back to T20.
pub fn rt60(samples: &[f64], sample_rate: f64) -> Option<f64> {
    let decay = schroeder_decay(samples);
    rt_from_decay(&decay, sample_rate, -5.0, -35.0)
        .or_else(|| rt_from_decay(&decay, sample_rate, -5.0, -25.0))
}

/// Early decay time (0 dB to -10 dB), extrapolated to -60 dB.
pub fn edt(samples: &[f64], sample_rate: f64) -> Option<f64> {
    let decay = schroeder_decay(samples);
    rt_from_decay(&decay, sample_rate, 0.0, -10.0)
}
