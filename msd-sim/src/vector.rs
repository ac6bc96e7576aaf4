//! Thin helpers over [`glam::DVec3`], the vector type used for every spin,
//! flux, field and coupling vector in the engine.

use std::f64::consts::PI;

pub use glam::DVec3;
use rand::Rng;

/// Build a vector from spherical coordinates: `theta` is the azimuth in the
/// xy-plane, `phi` the elevation above it.
#[inline]
pub fn spherical(rho: f64, theta: f64, phi: f64) -> DVec3 {
    let (sin_t, cos_t) = theta.sin_cos();
    let (sin_p, cos_p) = phi.sin_cos();
    DVec3::new(rho * cos_p * cos_t, rho * cos_p * sin_t, rho * sin_p)
}

/// Draw a vector of length `rho` uniformly distributed on the sphere.
#[inline]
pub fn random_on_sphere<R: Rng + ?Sized>(rho: f64, rng: &mut R) -> DVec3 {
    let theta = 2.0 * PI * rng.gen::<f64>();
    let phi = (2.0 * rng.gen::<f64>() - 1.0).asin();
    spherical(rho, theta, phi)
}

/// Unit vector uniformly distributed on the sphere.
#[inline]
pub fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> DVec3 {
    random_on_sphere(1.0, rng)
}

/// Component-wise squares, the quantity single-ion anisotropy acts on.
#[inline]
pub fn squares(v: DVec3) -> DVec3 {
    v * v
}

/// Rescale `v` to length `mag` keeping its direction. A zero vector has no
/// direction to keep, so `fallback` supplies one.
#[inline]
pub fn with_magnitude(v: DVec3, mag: f64, fallback: DVec3) -> DVec3 {
    let norm = v.length();
    if norm > 0.0 {
        v * (mag / norm)
    } else {
        fallback.normalize_or_zero() * mag
    }
}

/// Scale a flux vector when its bound changes from `old` to `new`.
#[inline]
pub fn rescale_flux(f: DVec3, old: f64, new: f64) -> DVec3 {
    if old != 0.0 {
        f * (new / old)
    } else {
        DVec3::ZERO
    }
}

/// Clamp a flux vector so its length does not exceed `bound`.
#[inline]
pub fn clamp_flux(f: DVec3, bound: f64) -> DVec3 {
    if f.length() <= bound {
        f
    } else {
        f.normalize_or_zero() * bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    #[test]
    fn test_spherical_axes() {
        let x = spherical(2.0, 0.0, 0.0);
        assert_relative_eq!(x.x, 2.0);
        assert_relative_eq!(x.y, 0.0);

        let y = spherical(1.0, PI / 2.0, 0.0);
        assert_relative_eq!(y.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(y.x, 0.0, epsilon = 1e-12);

        let z = spherical(3.0, 1.234, PI / 2.0);
        assert_relative_eq!(z.z, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_random_on_sphere_has_requested_length() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(7);
        for _ in 0..100 {
            let v = random_on_sphere(1.5, &mut rng);
            assert_relative_eq!(v.length(), 1.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_with_magnitude_keeps_direction() {
        let v = with_magnitude(DVec3::new(0.0, 3.0, 4.0), 10.0, DVec3::X);
        assert_relative_eq!(v.y, 6.0, epsilon = 1e-12);
        assert_relative_eq!(v.z, 8.0, epsilon = 1e-12);

        // zero vectors take the fallback direction
        let z = with_magnitude(DVec3::ZERO, 2.0, DVec3::new(0.0, 5.0, 0.0));
        assert_eq!(z, DVec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_flux_helpers() {
        let f = DVec3::new(0.3, 0.0, 0.4);
        assert_eq!(rescale_flux(f, 0.0, 1.0), DVec3::ZERO);
        assert_relative_eq!(rescale_flux(f, 0.5, 1.0).length(), 1.0, epsilon = 1e-12);
        assert_eq!(clamp_flux(f, 1.0), f);
        assert_relative_eq!(clamp_flux(f, 0.25).length(), 0.25, epsilon = 1e-12);
    }
}
