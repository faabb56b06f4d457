//! Batched Monte-Carlo ray tracing driver.
//!
//! Rays are emitted from a point source, bounced through the mesh with
//! frequency-banded attenuation, and recorded when they reach the receiver
//! sphere. From the hybrid bounce threshold onward, wall hits also deposit
//! diffuse energy into per-band histograms that are synthesized into late
//! pulses once all rays finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use rayon::prelude::*;

use crate::error::EngineError;
use crate::geom::sphere::Sphere;
use crate::geom::{HIT_EPS, SURFACE_OFFSET};
use crate::mesh::Mesh;
use crate::rng::{radiosity_rng, ray_rng, seed_material, unit_sphere_direction};
use crate::sim::arrivals::{Arrival, ArrivalsByBand};
use crate::sim::config::{RayRadiosityConfig, SimulationParams};
use crate::sim::radiosity::{synthesize_pulses, EnergyHistogram};
use crate::sim::reflection::{Hybrid, ReflectionModel};
use crate::Point;

/// Per-ray amplitudes below this value are treated as "dead".
pub const AMPLITUDE_EPS: f64 = 1e-10;

/// A run fails when more than this fraction of rays abort on bad numerics.
pub const MAX_ABORT_FRACTION: f64 = 0.01;

/// Snapshot reported after every batch.
#[derive(Debug, Clone, Copy)]
pub struct SimulationProgress {
    /// Completed fraction of the ray budget (0..=1).
    pub fraction_done: f64,
    /// Throughput since the run started.
    pub rays_per_second: f64,
    /// Early arrivals recorded so far (all bands).
    pub total_arrivals: usize,
    pub rays_done: usize,
    pub num_rays: usize,
}

/// Cooperative cancellation flag, checked between batches.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Summary of the radiosity tail attached to the simulation output.
#[derive(Debug, Clone)]
pub struct RadiositySummary {
    pub enabled: bool,
    /// Number of synthesized late pulses across all bands.
    pub late_arrival_count: usize,
    /// Bins per band histogram (0 when disabled).
    pub histogram_bins: usize,
    /// Echo of the configuration the tail was produced with.
    pub config: RayRadiosityConfig,
}

/// Result of a completed simulation.
pub struct SimulationOutput {
    /// Per-band arrivals, ascending by time.
    pub arrivals_by_band: ArrivalsByBand,
    pub params: SimulationParams,
    pub total_arrivals: usize,
    pub avg_rays_per_second: f64,
    pub radiosity: RadiositySummary,
    /// Rays abandoned on unexpected numerics.
    pub aborted_rays: usize,
}

trait ProgressReporter {
    fn report(&mut self, progress: &SimulationProgress);
}

struct NoProgress;
impl ProgressReporter for NoProgress {
    fn report(&mut self, _progress: &SimulationProgress) {}
}

struct FnProgress<F> {
    f: F,
}
impl<F> ProgressReporter for FnProgress<F>
where
    F: FnMut(&SimulationProgress),
{
    fn report(&mut self, progress: &SimulationProgress) {
        (self.f)(progress);
    }
}

/// What a single traced ray produced.
struct RayOutcome {
    /// Early arrival: (time, bounce count, per-band amplitudes).
    arrival: Option<(f64, usize, Vec<f64>)>,
    /// Sparse radiosity deposits: (band, bin, energy).
    tail: Vec<(usize, usize, f64)>,
    aborted: bool,
}

pub struct Simulation<'a> {
    mesh: &'a Mesh,
    source: Point,
    receiver: Sphere,
    params: SimulationParams,
}

impl<'a> Simulation<'a> {
    pub fn new(
        mesh: &'a Mesh,
        source: Point,
        receiver: Sphere,
        params: SimulationParams,
    ) -> Result<Self, EngineError> {
        params.validate()?;
        if !source.is_finite() {
            return Err(EngineError::InvalidParams(
                "source position is not finite".into(),
            ));
        }
        if !receiver.center.is_finite() || !receiver.radius.is_finite() || receiver.radius <= 0.0 {
            return Err(EngineError::InvalidParams(format!(
                "receiver radius {} must be positive",
                receiver.radius
            )));
        }
        Ok(Self {
            mesh,
            source,
            receiver,
            params,
        })
    }

    pub fn run(self) -> Result<SimulationOutput, EngineError> {
        self.run_internal(NoProgress, CancelToken::new())
    }

    /// Runs the simulation, reporting progress after every batch.
    pub fn run_with_progress<F>(self, report: F) -> Result<SimulationOutput, EngineError>
    where
        F: FnMut(&SimulationProgress),
    {
        self.run_internal(FnProgress { f: report }, CancelToken::new())
    }

    /// Runs with progress reporting and cooperative cancellation.
    ///
    /// A cancelled run stops before the next batch and returns
    /// [`EngineError::Cancelled`]; partial results are discarded.
    pub fn run_cancellable<F>(
        self,
        cancel: CancelToken,
        report: F,
    ) -> Result<SimulationOutput, EngineError>
    where
        F: FnMut(&SimulationProgress),
    {
        self.run_internal(FnProgress { f: report }, cancel)
    }

    fn run_internal<R: ProgressReporter>(
        self,
        mut reporter: R,
        cancel: CancelToken,
    ) -> Result<SimulationOutput, EngineError> {
        let params = &self.params;
        let num_rays = params.num_rays;
        let num_bands = params.bands.len();
        let rr = &params.rr_config;
        let seed = seed_material(&params.seed);

        let mut arrivals = ArrivalsByBand::new(num_bands);
        let mut histograms: Vec<EnergyHistogram> = if rr.enabled {
            (0..num_bands)
                .map(|_| EnergyHistogram::new(rr.histogram_resolution, rr.max_time))
                .collect()
        } else {
            Vec::new()
        };
        let histogram_bins = histograms.first().map_or(0, |h| h.num_bins());

        let start = Instant::now();
        let mut aborted: usize = 0;
        let mut done: usize = 0;

        while done < num_rays {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let batch_end = (done + params.batch_size).min(num_rays);

            // Rays are fully independent; each draws from its own stream so
            // the outcome does not depend on thread scheduling.
            let outcomes: Vec<RayOutcome> = (done..batch_end)
                .into_par_iter()
                .map(|ray_index| self.trace_ray(ray_index as u64, &seed))
                .collect();

            // Merge in ray order to keep accumulation deterministic.
            for outcome in outcomes {
                if outcome.aborted {
                    aborted += 1;
                    continue;
                }
                if let Some((time, _bounces, amplitudes)) = outcome.arrival {
                    for (band, amplitude) in amplitudes.into_iter().enumerate() {
                        arrivals.push(band, Arrival::new(time, amplitude));
                    }
                }
                for (band, bin, energy) in outcome.tail {
                    histograms[band].add_to_bin(bin, energy);
                }
            }

            done = batch_end;
            let elapsed = start.elapsed().as_secs_f64().max(1e-9);
            reporter.report(&SimulationProgress {
                fraction_done: done as f64 / num_rays as f64,
                rays_per_second: done as f64 / elapsed,
                total_arrivals: arrivals.total(),
                rays_done: done,
                num_rays,
            });
        }

        if aborted as f64 > MAX_ABORT_FRACTION * num_rays as f64 {
            return Err(EngineError::InternalError(format!(
                "{aborted} of {num_rays} rays aborted on bad intersection numerics"
            )));
        }

        // Late tail: one pulse cloud per band, drawn from a dedicated
        // stream so ray count changes do not shift the synthesis.
        let mut late_arrival_count = 0;
        if rr.enabled {
            let mut tail_rng = radiosity_rng(&seed);
            for (band, histogram) in histograms.iter().enumerate() {
                let pulses = synthesize_pulses(histogram, rr, &mut tail_rng);
                late_arrival_count += pulses.len();
                for pulse in pulses {
                    arrivals.push(band, pulse);
                }
            }
        }
        drop(histograms);

        arrivals.sort_by_time();

        let elapsed = start.elapsed().as_secs_f64().max(1e-9);
        let total_arrivals = arrivals.total();
        let radiosity = RadiositySummary {
            enabled: rr.enabled,
            late_arrival_count,
            histogram_bins,
            config: rr.clone(),
        };
        Ok(SimulationOutput {
            arrivals_by_band: arrivals,
            total_arrivals,
            avg_rays_per_second: num_rays as f64 / elapsed,
            radiosity,
            aborted_rays: aborted,
            params: self.params,
        })
    }

    /// Traces a single ray through its bounce budget.
    fn trace_ray(&self, ray_index: u64, seed: &[u8; 32]) -> RayOutcome {
        let params = &self.params;
        let rr = &params.rr_config;
        let num_bands = params.bands.len();
        let c = params.speed_of_sound;
        let scattering = rr.scattering_coeff;
        let reflection = Hybrid::new(scattering);

        let mut rng = ray_rng(seed, ray_index);
        let mut origin = self.source;
        let mut direction = unit_sphere_direction(&mut rng);
        let mut total_distance = 0.0_f64;
        let mut amplitude = vec![1.0_f64; num_bands];
        let mut tail: Vec<(usize, usize, f64)> = Vec::new();

        for bounce in 0..params.max_bounces {
            let receiver_t = self.receiver.intersect(origin, direction);
            let mesh_hit = self.mesh.closest_hit(origin, direction);

            let receiver_first = match (receiver_t, &mesh_hit) {
                (Some(tr), None) => tr > HIT_EPS,
                (Some(tr), Some(hit)) => tr < hit.distance && tr > HIT_EPS,
                (None, _) => false,
            };

            if receiver_first {
                total_distance += receiver_t.expect("receiver hit checked above");
                let time = total_distance / c;
                if !time.is_finite() {
                    return RayOutcome {
                        arrival: None,
                        tail,
                        aborted: true,
                    };
                }
                let sign = if params.randomize_phase && bounce > params.phase_bounce_threshold {
                    if rng.gen::<bool>() {
                        1.0
                    } else {
                        -1.0
                    }
                } else {
                    1.0
                };
                for a in &mut amplitude {
                    *a *= sign;
                }
                return RayOutcome {
                    arrival: Some((time, bounce, amplitude)),
                    tail,
                    aborted: false,
                };
            }

            let Some(hit) = mesh_hit else {
                // Escaped through an opening; nothing arrives.
                return RayOutcome {
                    arrival: None,
                    tail,
                    aborted: false,
                };
            };

            if !hit.distance.is_finite() || !hit.point.is_finite() || !hit.normal.is_finite() {
                return RayOutcome {
                    arrival: None,
                    tail,
                    aborted: true,
                };
            }

            total_distance += hit.distance;

            for (a, &alpha) in amplitude.iter_mut().zip(&params.bands.absorption) {
                *a *= (1.0 - alpha).max(0.0);
            }
            if amplitude.iter().all(|&a| a <= AMPLITUDE_EPS) {
                return RayOutcome {
                    arrival: None,
                    tail,
                    aborted: false,
                };
            }

            if rr.enabled && bounce >= rr.hybrid_bounce_threshold {
                self.deposit_tail_energy(&hit.point, total_distance, &amplitude, &mut tail);
            }

            direction = reflection.reflect(direction, hit.normal, &mut rng);
            origin = hit.point + direction * SURFACE_OFFSET;
        }

        // Bounce budget exhausted without reaching the receiver.
        RayOutcome {
            arrival: None,
            tail,
            aborted: false,
        }
    }

    /// Records the receiver-visible diffuse contribution of a wall hit.
    fn deposit_tail_energy(
        &self,
        point: &Point,
        total_distance: f64,
        amplitude: &[f64],
        tail: &mut Vec<(usize, usize, f64)>,
    ) {
        let rr = &self.params.rr_config;
        let c = self.params.speed_of_sound;

        let d_rx = point
            .distance(&self.receiver.center)
            .max((self.receiver.radius / 2.0).max(0.01));
        let time_rx = (total_distance + d_rx) / c;
        if time_rx > rr.max_time {
            return;
        }
        let bin = (time_rx / rr.histogram_resolution) as usize;

        let inv_square = 1.0 / (4.0 * std::f64::consts::PI * d_rx * d_rx).max(1e-6);
        let gain = rr.diffuse_gain * inv_square * rr.scattering_coeff.max(1e-3);

        for (band, &a) in amplitude.iter().enumerate() {
            if a <= 0.0 {
                continue;
            }
            let energy = a * a * gain;
            if energy > rr.min_energy_threshold {
                tail.push((band, bin, energy));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::config::FrequencyBands;

    fn cube_room(side: f64) -> Mesh {
        let h = side / 2.0;
        Mesh::from_box(side, side, side, Some((-h, -h, -h))).unwrap()
    }

    fn base_params() -> SimulationParams {
        let mut params = SimulationParams::new();
        params.num_rays = 500;
        params.max_bounces = 20;
        params.batch_size = 100;
        params.seed = "driver-test".into();
        params
    }

    #[test]
    fn test_direct_path_arrival_time() {
        // Cube of side 10, source at origin, receiver radius 0.5 at (3,0,0):
        // some arrival must land inside the surface-to-surface bracket.
        let mesh = cube_room(10.0);
        let receiver = Sphere::new(Point::new(3.0, 0.0, 0.0), 0.5);
        let mut params = base_params();
        params.num_rays = 4000;
        params.bands = FrequencyBands::uniform(0.3);

        let sim = Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, params).unwrap();
        let out = sim.run().unwrap();

        for band in 0..out.arrivals_by_band.num_bands() {
            let found = out.arrivals_by_band.band(band).iter().any(|a| {
                a.time >= 2.5 / 343.0 && a.time <= 3.5 / 343.0
            });
            assert!(found, "no direct arrival in band {band}");
        }
    }

    #[test]
    fn test_determinism_bitwise() {
        let mesh = cube_room(8.0);
        let receiver = Sphere::new(Point::new(2.0, 1.0, 0.0), 0.5);
        let mut params = base_params();
        params.rr_config.enabled = true;
        params.rr_config.hybrid_bounce_threshold = 2;

        let run = |params: SimulationParams| {
            Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, params)
                .unwrap()
                .run()
                .unwrap()
        };
        let a = run(params.clone());
        let b = run(params);

        assert_eq!(a.total_arrivals, b.total_arrivals);
        for band in 0..a.arrivals_by_band.num_bands() {
            let (ba, bb) = (a.arrivals_by_band.band(band), b.arrivals_by_band.band(band));
            assert_eq!(ba.len(), bb.len());
            for (x, y) in ba.iter().zip(bb.iter()) {
                assert_eq!(x.time.to_bits(), y.time.to_bits());
                assert_eq!(x.amplitude.to_bits(), y.amplitude.to_bits());
            }
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let mesh = cube_room(8.0);
        let receiver = Sphere::new(Point::new(2.0, 1.0, 0.0), 0.5);
        let mut params_a = base_params();
        params_a.num_rays = 2000;
        let mut params_b = params_a.clone();
        params_b.seed = "another-seed".into();

        let a = Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, params_a)
            .unwrap()
            .run()
            .unwrap();
        let b = Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, params_b)
            .unwrap()
            .run()
            .unwrap();

        // Arrival counts almost surely differ between unrelated streams
        let counts_a: Vec<usize> = a.arrivals_by_band.iter().map(|b| b.len()).collect();
        let counts_b: Vec<usize> = b.arrivals_by_band.iter().map(|b| b.len()).collect();
        let times_a: Vec<u64> = a
            .arrivals_by_band
            .band(0)
            .iter()
            .map(|x| x.time.to_bits())
            .collect();
        let times_b: Vec<u64> = b
            .arrivals_by_band
            .band(0)
            .iter()
            .map(|x| x.time.to_bits())
            .collect();
        assert!(counts_a != counts_b || times_a != times_b);
    }

    #[test]
    fn test_anechoic_room_single_arrivals() {
        // Full absorption: only rays aimed straight at the receiver arrive,
        // with amplitude exactly 1, and the tail stays empty.
        let mesh = cube_room(100.0);
        let receiver = Sphere::new(Point::new(5.0, 0.0, 0.0), 1.0);
        let mut params = base_params();
        params.num_rays = 1000;
        params.max_bounces = 8;
        params.bands = FrequencyBands::uniform(1.0);

        let sim = Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, params).unwrap();
        let out = sim.run().unwrap();

        assert!(out.total_arrivals > 0, "some rays must aim at the receiver");
        let direct_time_max = 6.0 / 343.0;
        for band in out.arrivals_by_band.iter() {
            for arrival in band {
                assert!((arrival.amplitude - 1.0).abs() < 1e-12);
                assert!(arrival.time <= direct_time_max);
            }
        }
    }

    #[test]
    fn test_amplitude_bounded_by_absorption_power() {
        // With absorption alpha on every wall, an arrival after b bounces
        // carries at most (1-alpha)^b.
        let mesh = cube_room(6.0);
        let receiver = Sphere::new(Point::new(1.5, 0.0, 0.0), 0.4);
        let mut params = base_params();
        params.num_rays = 2000;
        params.max_bounces = 26;
        params.bands = FrequencyBands::uniform(0.3);

        let sim = Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, params).unwrap();
        let out = sim.run().unwrap();

        // Direct arrivals have amplitude 1; everything else decays in
        // powers of 0.7. All amplitudes must be representable as 0.7^b
        // for some bounce count b <= max_bounces.
        for band in out.arrivals_by_band.iter() {
            for arrival in band {
                let a = arrival.amplitude.abs();
                assert!(a <= 1.0 + 1e-12);
                let b = a.ln() / 0.7_f64.ln();
                assert!(
                    (b - b.round()).abs() < 1e-6,
                    "amplitude {a} is not a power of 0.7"
                );
            }
        }
    }

    #[test]
    fn test_frequency_dependent_decay_ratio() {
        // For one ray arriving after b bounces, the high band amplitude
        // equals the low band amplitude times ((1-0.5)/(1-0.1))^b.
        let mesh = cube_room(6.0);
        let receiver = Sphere::new(Point::new(1.5, 0.0, 0.0), 0.4);
        let mut params = base_params();
        params.num_rays = 2000;
        params.bands = FrequencyBands::new(vec![200.0, 10000.0], vec![0.1, 0.5]);

        let sim = Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, params).unwrap();
        let out = sim.run().unwrap();

        let low = out.arrivals_by_band.band(0);
        let high = out.arrivals_by_band.band(1);
        assert_eq!(low.len(), high.len());

        let mut checked_bounced = false;
        for (l, h) in low.iter().zip(high.iter()) {
            assert_eq!(l.time.to_bits(), h.time.to_bits());
            if l.amplitude == 0.0 {
                continue;
            }
            let bounces = (l.amplitude.abs().ln() / 0.9_f64.ln()).round();
            let expected = l.amplitude * (0.5_f64 / 0.9).powf(bounces);
            assert!(
                (h.amplitude - expected).abs() < 1e-9,
                "band ratio broken at t={}: low={} high={}",
                l.time,
                l.amplitude,
                h.amplitude
            );
            if bounces > 0.0 {
                checked_bounced = true;
            }
        }
        assert!(checked_bounced, "need at least one bounced arrival");
    }

    #[test]
    fn test_no_absorption_no_escape() {
        // alpha = 0 in a closed room: every ray hits the receiver or runs
        // out of bounces; none escapes, so no ray aborts either.
        let mesh = cube_room(6.0);
        let receiver = Sphere::new(Point::new(1.5, 0.0, 0.0), 0.5);
        let mut params = base_params();
        params.num_rays = 500;
        params.max_bounces = 40;
        params.bands = FrequencyBands::uniform(0.0);

        let sim = Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, params).unwrap();
        let out = sim.run().unwrap();
        assert_eq!(out.aborted_rays, 0);
        // Amplitudes stay at 1 with zero absorption
        for band in out.arrivals_by_band.iter() {
            for arrival in band {
                assert!((arrival.amplitude.abs() - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_radiosity_tail_present_and_bounded() {
        let mesh = cube_room(10.0);
        let receiver = Sphere::new(Point::new(2.0, 0.0, 0.0), 0.5);
        let mut params = base_params();
        params.num_rays = 3000;
        params.max_bounces = 30;
        params.bands = FrequencyBands::uniform(0.2);
        params.rr_config.enabled = true;
        params.rr_config.hybrid_bounce_threshold = 3;
        params.rr_config.poisson_density = 10.0;
        params.rr_config.max_time = 3.0;
        params.rr_config.histogram_resolution = 2.5e-3;

        let sim = Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, params).unwrap();
        let out = sim.run().unwrap();

        assert!(out.radiosity.enabled);
        assert!(out.radiosity.late_arrival_count > 0);
        assert_eq!(out.radiosity.histogram_bins, 1200);
        for band in out.arrivals_by_band.iter() {
            for arrival in band {
                assert!(arrival.time <= 3.0 + 2.5e-3);
            }
        }
    }

    #[test]
    fn test_radiosity_density_monotonicity() {
        // Expected late pulse count grows with poissonDensity.
        let mesh = cube_room(8.0);
        let receiver = Sphere::new(Point::new(2.0, 0.0, 0.0), 0.5);

        let run_with_density = |density: f64, seed: &str| {
            let mut params = base_params();
            params.seed = seed.into();
            params.num_rays = 400;
            params.max_bounces = 25;
            params.bands = FrequencyBands::uniform(0.2);
            params.rr_config.enabled = true;
            params.rr_config.hybrid_bounce_threshold = 2;
            params.rr_config.poisson_density = density;
            Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, params)
                .unwrap()
                .run()
                .unwrap()
                .radiosity
                .late_arrival_count
        };

        let mut low_total = 0usize;
        let mut high_total = 0usize;
        for i in 0..20 {
            let seed = format!("density-{i}");
            low_total += run_with_density(1.0, &seed);
            high_total += run_with_density(30.0, &seed);
        }
        assert!(
            high_total > low_total,
            "density 30 total {high_total} vs density 1 total {low_total}"
        );
    }

    #[test]
    fn test_arrivals_sorted_by_time() {
        let mesh = cube_room(8.0);
        let receiver = Sphere::new(Point::new(2.0, 0.0, 0.0), 0.5);
        let mut params = base_params();
        params.num_rays = 2000;
        params.rr_config.enabled = true;
        params.rr_config.hybrid_bounce_threshold = 2;

        let sim = Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, params).unwrap();
        let out = sim.run().unwrap();
        for band in out.arrivals_by_band.iter() {
            for pair in band.windows(2) {
                assert!(pair[0].time <= pair[1].time);
            }
        }
    }

    #[test]
    fn test_progress_monotone_and_complete() {
        let mesh = cube_room(8.0);
        let receiver = Sphere::new(Point::new(2.0, 0.0, 0.0), 0.5);
        let mut params = base_params();
        params.num_rays = 1000;
        params.batch_size = 128;

        let mut fractions = Vec::new();
        let sim = Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, params).unwrap();
        let _out = sim
            .run_with_progress(|p| fractions.push(p.fraction_done))
            .unwrap();

        assert_eq!(fractions.len(), 8); // ceil(1000 / 128)
        for pair in fractions.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert!(*fractions.last().unwrap() >= 0.999);
    }

    #[test]
    fn test_cancellation_before_first_batch() {
        let mesh = cube_room(8.0);
        let receiver = Sphere::new(Point::new(2.0, 0.0, 0.0), 0.5);
        let params = base_params();

        let cancel = CancelToken::new();
        cancel.cancel();
        let sim = Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, params).unwrap();
        let result = sim.run_cancellable(cancel, |_| {});
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[test]
    fn test_cancellation_mid_run() {
        let mesh = cube_room(8.0);
        let receiver = Sphere::new(Point::new(2.0, 0.0, 0.0), 0.5);
        let mut params = base_params();
        params.num_rays = 100_000;
        params.batch_size = 1000;

        let cancel = CancelToken::new();
        let cancel_from_progress = cancel.clone();
        let sim = Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, params).unwrap();
        let result = sim.run_cancellable(cancel, move |_p| {
            // Request cancellation as soon as the first batch reports
            cancel_from_progress.cancel();
        });
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[test]
    fn test_rejects_zero_receiver_radius() {
        let mesh = cube_room(8.0);
        let receiver = Sphere::new(Point::new(2.0, 0.0, 0.0), 0.0);
        let result = Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, base_params());
        assert!(matches!(result, Err(EngineError::InvalidParams(_))));
    }

    #[test]
    fn test_phase_randomization_produces_negative_amplitudes() {
        let mesh = cube_room(6.0);
        let receiver = Sphere::new(Point::new(1.5, 0.0, 0.0), 0.5);
        let mut params = base_params();
        params.num_rays = 4000;
        params.max_bounces = 40;
        params.bands = FrequencyBands::uniform(0.05);
        params.randomize_phase = true;
        params.phase_bounce_threshold = 1;

        let sim = Simulation::new(&mesh, Point::new(0., 0., 0.), receiver, params).unwrap();
        let out = sim.run().unwrap();
        let negatives = out
            .arrivals_by_band
            .band(0)
            .iter()
            .filter(|a| a.amplitude < 0.0)
            .count();
        assert!(negatives > 0, "random sign never went negative");
    }
}
