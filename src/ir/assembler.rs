use crate::sim::arrivals::Arrival;

/// Padding appended after the last arrival, in seconds.
const TAIL_PADDING: f64 = 0.5;

/// Minimum buffer duration in seconds.
const MIN_DURATION: f64 = 1.0;

/// Buffer length in samples for a set of arrivals.
///
/// `duration = max(tau_max + 0.5 s, 1 s)` so even an empty band produces a
/// one second buffer.
pub fn buffer_len(arrivals: &[Arrival], sample_rate: f64) -> usize {
    let tau_max = arrivals.iter().map(|a| a.time).fold(0.0_f64, f64::max);
    let duration = (tau_max + TAIL_PADDING).max(MIN_DURATION);
    (duration * sample_rate).ceil() as usize
}

/// Accumulates arrivals into a raw (unfiltered) sample buffer.
///
/// Each arrival is split across the two neighboring samples by its
/// fractional position: `a * (1 - f)` at `floor(x)` and `a * f` at the next
/// sample, where `x = tau * f_s`. If the per-band peak exceeds 1.0 the
/// buffer is scaled back down to 1.0.
pub fn assemble_band(arrivals: &[Arrival], sample_rate: f64) -> Vec<f64> {
    let n = buffer_len(arrivals, sample_rate);
    let mut buffer = vec![0.0; n];

    for arrival in arrivals {
        if arrival.time < 0.0 || !arrival.time.is_finite() {
            continue;
        }
        let x = arrival.time * sample_rate;
        let i = x.floor() as usize;
        let frac = x - i as f64;
        if i + 1 < n {
            buffer[i] += arrival.amplitude * (1.0 - frac);
            buffer[i + 1] += arrival.amplitude * frac;
        } else if i < n {
            // Clamp at the buffer end
            buffer[i] += arrival.amplitude;
        }
    }

    let peak = buffer.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
    if peak > 1.0 {
        for v in &mut buffer {
            *v /= peak;
        }
    }

    buffer
}
