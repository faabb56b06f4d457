//! Late-tail energy histograms and Poisson pulse synthesis.
//!
//! During tracing, bounces past the hybrid threshold deposit
//! receiver-visible diffuse energy into per-band time histograms. After all
//! rays finish, each histogram is converted into a cloud of signed pulses
//! approximating the diffuse reverberation tail.

use rand::Rng;

use crate::sim::arrivals::Arrival;
use crate::sim::config::RayRadiosityConfig;

/// Dense energy-time histogram covering `[0, max_time]` in `resolution`
/// wide bins.
#[derive(Debug, Clone)]
pub struct EnergyHistogram {
    /// Bin width in seconds.
    pub resolution: f64,
    bins: Vec<f64>,
}

impl EnergyHistogram {
    pub fn new(resolution: f64, max_time: f64) -> Self {
        let num_bins = (max_time / resolution).ceil() as usize;
        Self {
            resolution,
            bins: vec![0.0; num_bins],
        }
    }

    /// Bin index for a time, if within range.
    pub fn bin_index(&self, time: f64) -> Option<usize> {
        if time < 0.0 {
            return None;
        }
        let bin = (time / self.resolution) as usize;
        (bin < self.bins.len()).then_some(bin)
    }

    /// Adds energy to the bin containing `time`; out-of-range times are
    /// dropped.
    pub fn add(&mut self, time: f64, energy: f64) {
        if let Some(bin) = self.bin_index(time) {
            self.bins[bin] += energy;
        }
    }

    /// Adds energy directly to a bin index (already range-checked).
    pub fn add_to_bin(&mut self, bin: usize, energy: f64) {
        if bin < self.bins.len() {
            self.bins[bin] += energy;
        }
    }

    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn total_energy(&self) -> f64 {
        self.bins.iter().sum()
    }
}

/// Converts one band's histogram into signed pulses.
///
/// Every bin with energy above the threshold produces
/// `k = max(1, Poisson(E * density))` pulses of amplitude `sqrt(E / k)`,
/// spread uniformly inside the bin with equiprobable sign.
pub fn synthesize_pulses(
    histogram: &EnergyHistogram,
    config: &RayRadiosityConfig,
    rng: &mut impl Rng,
) -> Vec<Arrival> {
    let mut pulses = Vec::new();
    let dt = histogram.resolution;

    for (bin, &energy) in histogram.bins().iter().enumerate() {
        if energy <= config.min_energy_threshold {
            continue;
        }

        let lambda = energy * config.poisson_density;
        let k = crate::rng::poisson_sample(lambda, rng).max(1);
        let amplitude = (energy / k as f64).sqrt();
        let bin_start = bin as f64 * dt;

        for _ in 0..k {
            let t = bin_start + rng.gen::<f64>() * dt;
            let sign = if rng.gen::<bool>() { 1.0 } else { -1.0 };
            pulses.push(Arrival::new(t, amplitude * sign));
        }
    }

    pulses
}
