//! Seeded, reproducible random sampling.
//!
//! Every sampling function takes an explicit `Rng`; nothing in the crate
//! touches a process-wide generator. Rays draw from per-ray ChaCha streams
//! keyed by their global index, so results do not depend on how rays are
//! scheduled across threads.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::Vector;

/// Stream id reserved for radiosity pulse synthesis.
const RADIOSITY_STREAM: u64 = u64::MAX;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Expands an arbitrary string seed into 32 bytes of key material.
///
/// FNV-1a over the seed bytes, re-salted per 8-byte block so the four
/// blocks differ even for short seeds.
pub fn seed_material(seed: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut hash = FNV_OFFSET;
    for (block, chunk) in out.chunks_exact_mut(8).enumerate() {
        hash ^= block as u64 + 1;
        hash = hash.wrapping_mul(FNV_PRIME);
        for &b in seed.as_bytes() {
            hash ^= b as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        chunk.copy_from_slice(&hash.to_le_bytes());
    }
    out
}

/// Generator for the ray with the given global index.
pub fn ray_rng(seed: &[u8; 32], ray_index: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::from_seed(*seed);
    rng.set_stream(ray_index);
    rng
}

/// Generator for the radiosity pulse-synthesis pass.
pub fn radiosity_rng(seed: &[u8; 32]) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::from_seed(*seed);
    rng.set_stream(RADIOSITY_STREAM);
    rng
}

/// Uniform direction on the unit sphere via inverse-CDF mapping.
pub fn unit_sphere_direction(rng: &mut impl Rng) -> Vector {
    let u: f64 = rng.gen();
    let v: f64 = rng.gen();
    let z = 2.0 * u - 1.0;
    let phi = 2.0 * std::f64::consts::PI * v;
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vector::new(r * phi.cos(), r * phi.sin(), z)
}

/// Cosine-weighted direction in the hemisphere around a unit normal.
///
/// The tangent frame is built from whichever coordinate axis is less
/// aligned with the normal, avoiding a degenerate cross product.
pub fn cosine_weighted_hemisphere(normal: Vector, rng: &mut impl Rng) -> Vector {
    let u1: f64 = rng.gen();
    let u2: f64 = rng.gen();
    let r = u1.sqrt();
    let phi = 2.0 * std::f64::consts::PI * u2;

    let axis = if normal.dx.abs() < 0.9 {
        Vector::new(1.0, 0.0, 0.0)
    } else {
        Vector::new(0.0, 1.0, 0.0)
    };
    let tangent = axis
        .cross(normal)
        .normalize()
        .unwrap_or(Vector::new(0.0, 0.0, 1.0));
    let bitangent = normal.cross(tangent);

    let d = tangent * (r * phi.cos())
        + bitangent * (r * phi.sin())
        + normal * (1.0 - u1).max(0.0).sqrt();
    d.normalize().unwrap_or(normal)
}

/// Poisson-distributed sample via Knuth's multiplicative method.
///
/// Suitable for the small rates used in pulse synthesis; runtime grows
/// linearly with lambda, so the draw is capped defending against extreme
/// rates.
pub fn poisson_sample(lambda: f64, rng: &mut impl Rng) -> u64 {
    if lambda <= 0.0 {
        return 0;
    }
    let limit = (-lambda).exp();
    let mut k: u64 = 0;
    let mut p = 1.0;
    loop {
        p *= rng.gen::<f64>();
        if p <= limit {
            return k;
        }
        k += 1;
        if k > 100_000 {
            return k;
        }
    }
}
