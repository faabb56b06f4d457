use serde::{Deserialize, Serialize};

/// A single recorded arrival at the receiver.
///
/// The absolute amplitude is a pressure-like scalar; the sign carries
/// optional phase randomization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Arrival {
    /// Arrival time in seconds.
    pub time: f64,
    /// Signed pressure-like amplitude.
    pub amplitude: f64,
}

impl Arrival {
    pub fn new(time: f64, amplitude: f64) -> Self {
        Self { time, amplitude }
    }
}

/// Per-band arrival lists, unordered during collection and sorted by time
/// once the simulation finishes.
#[derive(Debug, Clone)]
pub struct ArrivalsByBand {
    bands: Vec<Vec<Arrival>>,
}

impl ArrivalsByBand {
    pub fn new(num_bands: usize) -> Self {
        Self {
            bands: vec![Vec::new(); num_bands],
        }
    }

    pub fn push(&mut self, band: usize, arrival: Arrival) {
        self.bands[band].push(arrival);
    }

    pub fn band(&self, band: usize) -> &[Arrival] {
        &self.bands[band]
    }

    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    /// Total arrival count across all bands.
    pub fn total(&self) -> usize {
        self.bands.iter().map(|b| b.len()).sum()
    }

    /// Stable sort of every band by ascending time.
    pub fn sort_by_time(&mut self) {
        for band in &mut self.bands {
            band.sort_by(|a, b| {
                a.time
                    .partial_cmp(&b.time)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &[Arrival]> {
        self.bands.iter().map(|b| b.as_slice())
    }

    pub fn into_bands(self) -> Vec<Vec<Arrival>> {
        self.bands
    }
}
