//! Wire types of the worker message protocol.
//!
//! All messages are JSON records tagged by a `type` field. Field names are
//! camelCase; per-band payloads are keyed by the band center frequency in
//! Hz. Messages with an unknown `type` fail to parse and are answered with
//! an `error` event.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::sim::arrivals::Arrival;
use crate::sim::config::{FrequencyBands, RayRadiosityConfig, SimulationParams};

/// Nominal center used when a run collapses to a single broadband band.
const BROADBAND_CENTER_HZ: f64 = 1000.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomGeometry {
    /// Flat `[x0, y0, z0, x1, ...]` vertex array.
    pub positions: Vec<f64>,
    /// Accepted for compatibility; intersection recomputes face normals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normals: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryData {
    pub room_geometry: RoomGeometry,
    /// Receiver sphere radius.
    pub emitter_radius: f64,
    /// Receiver sphere center.
    pub emitter_position: Position,
    /// Ray emission point; defaults to the origin when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_position: Option<Position>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSimulationParams {
    pub num_rays: usize,
    pub max_bounces: usize,
    /// When false, the run collapses to one broadband band and `complete`
    /// carries a flat `arrivals` list.
    #[serde(default = "default_true")]
    pub use_freq_dependent: bool,
    /// Absorption per band, keyed by center frequency in Hz.
    pub absorption_coeffs: BTreeMap<String, f64>,
    pub seed: String,
    #[serde(default = "default_speed_of_sound")]
    pub speed_of_sound: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub randomize_phase: bool,
    pub rr_config: RayRadiosityConfig,
}

fn default_true() -> bool {
    true
}

fn default_speed_of_sound() -> f64 {
    343.0
}

fn default_batch_size() -> usize {
    1000
}

impl WireSimulationParams {
    /// Converts the wire shape to engine parameters, validating as it goes.
    pub fn into_params(self) -> Result<SimulationParams, EngineError> {
        if self.absorption_coeffs.is_empty() {
            return Err(EngineError::InvalidParams(
                "absorptionCoeffs is empty".into(),
            ));
        }

        let mut centers = Vec::with_capacity(self.absorption_coeffs.len());
        let mut absorption = Vec::with_capacity(self.absorption_coeffs.len());
        for (key, &alpha) in &self.absorption_coeffs {
            let freq: f64 = key.parse().map_err(|_| {
                EngineError::InvalidParams(format!("band key {key:?} is not a frequency"))
            })?;
            centers.push(freq);
            absorption.push(alpha);
        }

        let bands = if self.use_freq_dependent {
            FrequencyBands::new(centers, absorption)
        } else {
            // Broadband: one band carrying the mean absorption
            let mean = absorption.iter().sum::<f64>() / absorption.len() as f64;
            FrequencyBands::new(vec![BROADBAND_CENTER_HZ], vec![mean])
        };

        let params = SimulationParams {
            num_rays: self.num_rays,
            max_bounces: self.max_bounces,
            bands,
            seed: self.seed,
            speed_of_sound: self.speed_of_sound,
            batch_size: self.batch_size,
            randomize_phase: self.randomize_phase,
            phase_bounce_threshold: SimulationParams::new().phase_bounce_threshold,
            rr_config: self.rr_config,
        };
        params.validate()?;
        Ok(params)
    }
}

/// Commands accepted by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    Init,
    SetGeometry { data: GeometryData },
    Simulate { data: WireSimulationParams },
    /// Soft stop: abandons the current run, keeps geometry and state.
    Cancel,
    /// Hard stop: disposes geometry and exits the worker.
    Terminate,
}

/// Echo of the radiosity tail attached to `complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadiositySummaryWire {
    pub enabled: bool,
    pub late_arrival_count: usize,
    pub histogram_bins: usize,
    pub rr_config: RayRadiosityConfig,
}

/// Events emitted by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    Ready,
    GeometrySet,
    #[serde(rename_all = "camelCase")]
    Progress {
        /// Completed fraction (0..=1), non-decreasing within one run.
        progress: f64,
        rays_per_second: u64,
        current_arrivals: usize,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        /// Per-band arrivals keyed by center frequency (multi-band runs).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arrivals_by_band: Option<BTreeMap<String, Vec<Arrival>>>,
        /// Flat arrival list (broadband runs).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arrivals: Option<Vec<Arrival>>,
        freq_bands: Vec<u64>,
        total_arrivals: usize,
        avg_rays_per_second: u64,
        ray_radiosity: RadiositySummaryWire,
    },
    Error {
        error: String,
    },
}

/// Formats a band center for use as a JSON object key.
pub fn format_freq(freq: f64) -> String {
    if freq.fract() == 0.0 {
        format!("{}", freq as i64)
    } else {
        format!("{freq}")
    }
}
