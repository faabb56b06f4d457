use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Default band center frequencies in Hz.
pub const DEFAULT_BAND_FREQUENCIES: [f64; 4] = [200.0, 800.0, 3200.0, 10000.0];

/// The frequency bands of a simulation: sorted center frequencies with a
/// parallel array of wall absorption coefficients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyBands {
    /// Band center frequencies in Hz, ascending.
    pub centers: Vec<f64>,
    /// Absorption coefficient per band, each in [0, 1].
    pub absorption: Vec<f64>,
}

impl FrequencyBands {
    /// Creates a band set, sorting centers (and their coefficients)
    /// ascending.
    pub fn new(centers: Vec<f64>, absorption: Vec<f64>) -> Self {
        let mut pairs: Vec<(f64, f64)> = centers.into_iter().zip(absorption).collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Self {
            centers: pairs.iter().map(|p| p.0).collect(),
            absorption: pairs.iter().map(|p| p.1).collect(),
        }
    }

    /// The default four bands with a uniform absorption coefficient.
    pub fn uniform(absorption: f64) -> Self {
        Self {
            centers: DEFAULT_BAND_FREQUENCIES.to_vec(),
            absorption: vec![absorption; DEFAULT_BAND_FREQUENCIES.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }
}

impl Default for FrequencyBands {
    fn default() -> Self {
        Self::uniform(0.2)
    }
}

/// Configuration of the hybrid radiosity tail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RayRadiosityConfig {
    /// Turns late-tail accumulation and synthesis on.
    pub enabled: bool,
    /// Specular/diffuse mix in [0, 1]; also scales diffuse energy.
    pub scattering_coeff: f64,
    /// Energy histogram bin width in seconds (>= 5e-4).
    pub histogram_resolution: f64,
    /// Tail horizon in seconds; contributions beyond are discarded.
    pub max_time: f64,
    /// Bounce index at which diffuse accumulation begins (0..=64).
    pub hybrid_bounce_threshold: usize,
    /// Mean pulse count per unit of histogram energy (>= 0.1).
    pub poisson_density: f64,
    /// Global gain applied to diffuse energy (>= 0.01).
    pub diffuse_gain: f64,
    /// Energies below this are dropped ([1e-12, 1e-3]).
    pub min_energy_threshold: f64,
}

impl Default for RayRadiosityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scattering_coeff: 0.3,
            histogram_resolution: 2.5e-3,
            max_time: 3.0,
            hybrid_bounce_threshold: 3,
            poisson_density: 10.0,
            diffuse_gain: 1.0,
            min_energy_threshold: 1e-9,
        }
    }
}

impl RayRadiosityConfig {
    fn validate(&self) -> Result<(), EngineError> {
        let fail = |msg: String| Err(EngineError::InvalidParams(msg));
        if !(0.0..=1.0).contains(&self.scattering_coeff) {
            return fail(format!(
                "scatteringCoeff {} outside [0, 1]",
                self.scattering_coeff
            ));
        }
        if self.histogram_resolution < 5e-4 {
            return fail(format!(
                "histogramResolution {} below 5e-4 s",
                self.histogram_resolution
            ));
        }
        if self.max_time < self.histogram_resolution {
            return fail(format!(
                "maxTime {} below histogramResolution {}",
                self.max_time, self.histogram_resolution
            ));
        }
        if self.hybrid_bounce_threshold > 64 {
            return fail(format!(
                "hybridBounceThreshold {} above 64",
                self.hybrid_bounce_threshold
            ));
        }
        if self.poisson_density < 0.1 {
            return fail(format!("poissonDensity {} below 0.1", self.poisson_density));
        }
        if self.diffuse_gain < 0.01 {
            return fail(format!("diffuseGain {} below 0.01", self.diffuse_gain));
        }
        if !(1e-12..=1e-3).contains(&self.min_energy_threshold) {
            return fail(format!(
                "minEnergyThreshold {} outside [1e-12, 1e-3]",
                self.min_energy_threshold
            ));
        }
        Ok(())
    }
}

/// Full parameter set for one simulation invocation.
#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub num_rays: usize,
    /// Hard cap on bounces per ray.
    pub max_bounces: usize,
    pub bands: FrequencyBands,
    /// Deterministic seed; identical seeds reproduce identical runs.
    pub seed: String,
    /// Speed of sound in m/s; converts path length to arrival time.
    pub speed_of_sound: f64,
    /// Rays per batch; trades progress cadence against overhead.
    pub batch_size: usize,
    /// Multiply arrivals recorded after `phase_bounce_threshold` bounces
    /// by a random sign.
    pub randomize_phase: bool,
    pub phase_bounce_threshold: usize,
    pub rr_config: RayRadiosityConfig,
}

impl SimulationParams {
    pub fn new() -> Self {
        Self {
            num_rays: 10_000,
            max_bounces: 50,
            bands: FrequencyBands::default(),
            seed: "default".to_string(),
            speed_of_sound: 343.0,
            batch_size: 1000,
            randomize_phase: false,
            phase_bounce_threshold: 3,
            rr_config: RayRadiosityConfig::default(),
        }
    }

    /// Checks every constraint the engine relies on.
    pub fn validate(&self) -> Result<(), EngineError> {
        let fail = |msg: String| Err(EngineError::InvalidParams(msg));
        if self.num_rays == 0 {
            return fail("numRays must be positive".into());
        }
        if self.max_bounces == 0 {
            return fail("maxBounces must be positive".into());
        }
        if self.batch_size == 0 {
            return fail("batchSize must be positive".into());
        }
        if self.bands.is_empty() {
            return fail("band set is empty".into());
        }
        if self.bands.centers.len() != self.bands.absorption.len() {
            return fail(format!(
                "{} band centers but {} absorption coefficients",
                self.bands.centers.len(),
                self.bands.absorption.len()
            ));
        }
        for &f in &self.bands.centers {
            if !f.is_finite() || f <= 0.0 {
                return fail(format!("band center {f} Hz is not positive"));
            }
        }
        for (&f, &alpha) in self.bands.centers.iter().zip(&self.bands.absorption) {
            if !(0.0..=1.0).contains(&alpha) {
                return fail(format!("absorption {alpha} at {f} Hz outside [0, 1]"));
            }
        }
        if !self.speed_of_sound.is_finite() || self.speed_of_sound <= 0.0 {
            return fail(format!(
                "speedOfSound {} must be positive",
                self.speed_of_sound
            ));
        }
        self.rr_config.validate()
    }
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self::new()
    }
}
