use rand::Rng;

use crate::config::FlipStrategy;
use crate::vector::{random_on_sphere, DVec3};

/// Candidate generator for the spin of a single site.
pub trait Proposal {
    fn propose<R: Rng + ?Sized>(&self, spin: DVec3, rng: &mut R) -> DVec3;
}

impl Proposal for FlipStrategy {
    #[inline]
    fn propose<R: Rng + ?Sized>(&self, spin: DVec3, rng: &mut R) -> DVec3 {
        match self {
            Self::UpDown => -spin,
            Self::Continuous => random_on_sphere(spin.length(), rng),
        }
    }
}

/// New flux for a site bounded by `bound`: magnitude uniform on
/// `[0, bound)`, direction uniform on the sphere.
#[inline]
pub fn propose_flux<R: Rng + ?Sized>(bound: f64, rng: &mut R) -> DVec3 {
    let rho = bound * rng.gen::<f64>();
    random_on_sphere(rho, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    #[test]
    fn test_up_down_negates() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        let s = DVec3::new(0.0, 2.0, 0.0);
        assert_eq!(FlipStrategy::UpDown.propose(s, &mut rng), -s);
    }

    #[test]
    fn test_continuous_keeps_magnitude() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(2);
        let s = DVec3::new(0.0, 0.0, 1.5);
        for _ in 0..50 {
            let c = FlipStrategy::Continuous.propose(s, &mut rng);
            assert_relative_eq!(c.length(), 1.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_flux_within_bound() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(3);
        for _ in 0..50 {
            assert!(propose_flux(0.3, &mut rng).length() < 0.3 + 1e-12);
        }
        assert_eq!(propose_flux(0.0, &mut rng), DVec3::ZERO);
    }
}
