//! Off-thread orchestrator for long-running simulations.
//!
//! The worker owns a dedicated thread, consumes JSON commands from a
//! channel and streams events back. Geometry is built once per
//! `setGeometry` and shared immutably with each run; recoverable failures
//! produce an `error` event and leave the worker in its previous state.

pub mod protocol;

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;

use anyhow::{Context, Result};

use crate::error::EngineError;
use crate::geom::sphere::Sphere;
use crate::mesh::Mesh;
use crate::sim::driver::{CancelToken, Simulation, SimulationOutput};
use crate::Point;

use protocol::{
    format_freq, Command, Event, GeometryData, RadiositySummaryWire, WireSimulationParams,
};

/// Handle to a spawned worker: post commands, drain events.
pub struct WorkerHandle {
    commands: Sender<String>,
    events: Receiver<Event>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawns the worker on its own thread.
    pub fn spawn() -> Self {
        let (command_tx, command_rx) = mpsc::channel::<String>();
        let (event_tx, event_rx) = mpsc::channel::<Event>();
        let join = std::thread::spawn(move || {
            Worker {
                commands: command_rx,
                events: event_tx,
                scene: None,
            }
            .run()
        });
        Self {
            commands: command_tx,
            events: event_rx,
            join: Some(join),
        }
    }

    /// Sends a typed command.
    pub fn send(&self, command: &Command) -> Result<()> {
        let json = serde_json::to_string(command).context("Failed to encode command")?;
        self.post(&json)
    }

    /// Posts a raw JSON message; malformed input is answered by the worker
    /// with an `error` event rather than failing here.
    pub fn post(&self, json: &str) -> Result<()> {
        self.commands
            .send(json.to_string())
            .context("Worker is gone")
    }

    /// The event stream, in emission order.
    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    /// Sends `terminate` and waits for the worker thread to exit.
    pub fn shutdown(mut self) {
        let _ = self.send(&Command::Terminate);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.send(&Command::Terminate);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Geometry shared by every run until the next `setGeometry`.
struct SceneState {
    mesh: Mesh,
    source: Point,
    receiver: Sphere,
}

enum Flow {
    Continue,
    Exit,
}

struct Worker {
    commands: Receiver<String>,
    events: Sender<Event>,
    scene: Option<SceneState>,
}

impl Worker {
    fn run(mut self) {
        while let Ok(raw) = self.commands.recv() {
            match serde_json::from_str::<Command>(&raw) {
                Ok(command) => {
                    if matches!(self.handle(command), Flow::Exit) {
                        break;
                    }
                }
                Err(e) => self.emit_error(format!("unrecognized message: {e}")),
            }
        }
    }

    fn handle(&mut self, command: Command) -> Flow {
        match command {
            Command::Init => {
                let _ = self.events.send(Event::Ready);
                Flow::Continue
            }
            Command::SetGeometry { data } => {
                match Self::build_scene(data) {
                    Ok(scene) => {
                        self.scene = Some(scene);
                        let _ = self.events.send(Event::GeometrySet);
                    }
                    Err(e) => self.emit_error(e.to_string()),
                }
                Flow::Continue
            }
            Command::Simulate { data } => self.simulate(data),
            // A cancel with no active run has nothing to stop
            Command::Cancel => Flow::Continue,
            Command::Terminate => {
                self.scene = None;
                Flow::Exit
            }
        }
    }

    fn build_scene(data: GeometryData) -> Result<SceneState, EngineError> {
        if !(data.emitter_radius.is_finite() && data.emitter_radius > 0.0) {
            return Err(EngineError::InvalidParams(format!(
                "emitterRadius {} must be positive",
                data.emitter_radius
            )));
        }
        let mesh = Mesh::build(
            &data.room_geometry.positions,
            data.room_geometry.indices.as_deref(),
        )?;
        let receiver = Sphere::new(
            Point::new(
                data.emitter_position.x,
                data.emitter_position.y,
                data.emitter_position.z,
            ),
            data.emitter_radius,
        );
        let source = data
            .source_position
            .map(|p| Point::new(p.x, p.y, p.z))
            .unwrap_or(Point::new(0.0, 0.0, 0.0));
        Ok(SceneState {
            mesh,
            source,
            receiver,
        })
    }

    fn simulate(&mut self, wire: WireSimulationParams) -> Flow {
        let Some(scene) = &self.scene else {
            self.emit_error(EngineError::NotReady.to_string());
            return Flow::Continue;
        };

        let use_freq_dependent = wire.use_freq_dependent;
        let params = match wire.into_params() {
            Ok(params) => params,
            Err(e) => {
                self.emit_error(e.to_string());
                return Flow::Continue;
            }
        };

        let simulation =
            match Simulation::new(&scene.mesh, scene.source, scene.receiver, params) {
                Ok(simulation) => simulation,
                Err(e) => {
                    self.emit_error(e.to_string());
                    return Flow::Continue;
                }
            };

        // Between batches: forward progress, then drain queued commands so
        // cancel/terminate can interrupt the run.
        let cancel = CancelToken::new();
        let mut exit_after = false;
        let result = {
            let events = self.events.clone();
            let commands = &self.commands;
            let cancel_inner = cancel.clone();
            let exit_flag = &mut exit_after;
            simulation.run_cancellable(cancel, move |progress| {
                let _ = events.send(Event::Progress {
                    progress: progress.fraction_done,
                    rays_per_second: progress.rays_per_second.round() as u64,
                    current_arrivals: progress.total_arrivals,
                });
                loop {
                    match commands.try_recv() {
                        Ok(raw) => match serde_json::from_str::<Command>(&raw) {
                            Ok(Command::Cancel) => cancel_inner.cancel(),
                            Ok(Command::Terminate) => {
                                cancel_inner.cancel();
                                *exit_flag = true;
                            }
                            Ok(_) => {
                                let _ = events.send(Event::Error {
                                    error: "busy: simulation in progress".into(),
                                });
                            }
                            Err(e) => {
                                let _ = events.send(Event::Error {
                                    error: format!("unrecognized message: {e}"),
                                });
                            }
                        },
                        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                    }
                }
            })
        };

        match result {
            Ok(output) => {
                let event = complete_event(output, use_freq_dependent);
                let _ = self.events.send(event);
            }
            // Cancellation is silent: no complete, no error
            Err(EngineError::Cancelled) => {}
            Err(e) => self.emit_error(e.to_string()),
        }

        if exit_after {
            self.scene = None;
            Flow::Exit
        } else {
            Flow::Continue
        }
    }

    fn emit_error(&self, error: String) {
        let _ = self.events.send(Event::Error { error });
    }
}

fn complete_event(output: SimulationOutput, use_freq_dependent: bool) -> Event {
    let centers = &output.params.bands.centers;
    let freq_bands: Vec<u64> = centers.iter().map(|&f| f.round() as u64).collect();
    let ray_radiosity = RadiositySummaryWire {
        enabled: output.radiosity.enabled,
        late_arrival_count: output.radiosity.late_arrival_count,
        histogram_bins: output.radiosity.histogram_bins,
        rr_config: output.radiosity.config,
    };
    let total_arrivals = output.total_arrivals;
    let avg_rays_per_second = output.avg_rays_per_second.round() as u64;

    let mut bands = output.arrivals_by_band.into_bands();
    let (arrivals_by_band, arrivals) = if use_freq_dependent {
        let mut map = BTreeMap::new();
        for (band, list) in bands.into_iter().enumerate() {
            map.insert(format_freq(centers[band]), list);
        }
        (Some(map), None)
    } else {
        (None, Some(bands.swap_remove(0)))
    };

    Event::Complete {
        arrivals_by_band,
        arrivals,
        freq_bands,
        total_arrivals,
        avg_rays_per_second,
        ray_radiosity,
    }
}
