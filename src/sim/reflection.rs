use rand::Rng;

use crate::rng::cosine_weighted_hemisphere;
use crate::Vector;

/// Defines how rays reflect off surfaces.
///
/// Randomness comes from the caller-provided generator; implementations
/// never touch a process-wide rng.
pub trait ReflectionModel {
    /// Computes the reflected direction given the incident direction and
    /// the hit-facing unit surface normal.
    fn reflect<R: Rng>(&self, incident: Vector, normal: Vector, rng: &mut R) -> Vector;
}

/// Perfect specular (mirror) reflection.
pub struct Specular;

impl ReflectionModel for Specular {
    fn reflect<R: Rng>(&self, incident: Vector, normal: Vector, _rng: &mut R) -> Vector {
        incident.reflect(&normal)
    }
}

/// Lambertian diffuse reflection (cosine-weighted hemisphere direction).
pub struct Diffuse;

impl ReflectionModel for Diffuse {
    fn reflect<R: Rng>(&self, _incident: Vector, normal: Vector, rng: &mut R) -> Vector {
        cosine_weighted_hemisphere(normal, rng)
    }
}

/// Hybrid reflection blending the specular and diffuse directions by a
/// scattering coefficient: `normalize((1-s)*d_s + s*d_d)`.
pub struct Hybrid {
    /// Scattering coefficient [0, 1]: 0 = pure specular, 1 = pure diffuse.
    pub scattering: f64,
}

impl Hybrid {
    pub fn new(scattering: f64) -> Self {
        Self {
            scattering: scattering.clamp(0.0, 1.0),
        }
    }
}

impl ReflectionModel for Hybrid {
    fn reflect<R: Rng>(&self, incident: Vector, normal: Vector, rng: &mut R) -> Vector {
        let specular = incident.reflect(&normal);
        if self.scattering <= 0.0 {
            return specular;
        }
        let diffuse = cosine_weighted_hemisphere(normal, rng);
        let mixed = specular * (1.0 - self.scattering) + diffuse * self.scattering;
        // The blend can only vanish for opposed directions; fall back to
        // the specular branch rather than emitting a zero vector.
        mixed.normalize().unwrap_or(specular)
    }
}
