//! Time-weighted statistics over a sampling record.
//!
//! Snapshots are treated as samples of a piecewise-linear signal over the
//! iteration counter `t`, so unevenly spaced snapshots are weighted by the
//! span they cover. Both `X` and `X²` are integrated in closed form.

use crate::energy::{EnergyTerm, MagnetizationTerm, Results};
use crate::geometry::RegionCounts;
use crate::vector::DVec3;

/// A quantity that can be averaged over a record.
pub trait Observable: Copy {
    const ZERO: Self;
    fn add(self, other: Self) -> Self;
    fn scale(self, k: f64) -> Self;
    fn dot(self, other: Self) -> f64;
}

impl Observable for f64 {
    const ZERO: Self = 0.0;
    #[inline]
    fn add(self, other: Self) -> Self {
        self + other
    }
    #[inline]
    fn scale(self, k: f64) -> Self {
        self * k
    }
    #[inline]
    fn dot(self, other: Self) -> f64 {
        self * other
    }
}

impl Observable for DVec3 {
    const ZERO: Self = DVec3::ZERO;
    #[inline]
    fn add(self, other: Self) -> Self {
        self + other
    }
    #[inline]
    fn scale(self, k: f64) -> Self {
        self * k
    }
    #[inline]
    fn dot(self, other: Self) -> f64 {
        DVec3::dot(self, other)
    }
}

/// Running integrals of `X` and `X·X` over `t`.
struct Integral<T> {
    linear: T,
    quadratic: f64,
    span: f64,
}

impl<T: Observable> Integral<T> {
    fn over(record: &[Results], f: &impl Fn(&Results) -> T) -> Self {
        let mut acc = Self {
            linear: T::ZERO,
            quadratic: 0.0,
            span: 0.0,
        };
        for w in record.windows(2) {
            let dt = w[1].t as f64 - w[0].t as f64;
            let x0 = f(&w[0]);
            let x1 = f(&w[1]);
            let dx = x1.add(x0.scale(-1.0));
            acc.linear = acc.linear.add(x0.add(x1).scale(0.5 * dt));
            acc.quadratic += dt * (x0.dot(x0) + x0.dot(dx) + dx.dot(dx) / 3.0);
            acc.span += dt;
        }
        acc
    }
}

/// Time-weighted mean of `f` over the record. `None` for an empty record;
/// a single snapshot is its own mean.
pub fn mean<T: Observable>(record: &[Results], f: impl Fn(&Results) -> T) -> Option<T> {
    match record {
        [] => None,
        [only] => Some(f(only)),
        _ => {
            let acc = Integral::over(record, &f);
            if acc.span > 0.0 {
                Some(acc.linear.scale(1.0 / acc.span))
            } else {
                // every snapshot at the same t
                let sum = record.iter().fold(T::ZERO, |s, r| s.add(f(r)));
                Some(sum.scale(1.0 / record.len() as f64))
            }
        }
    }
}

/// `<X·X> - <X>·<X>` over the record, 0 with fewer than two snapshots.
pub fn fluctuation<T: Observable>(record: &[Results], f: impl Fn(&Results) -> T) -> f64 {
    if record.len() < 2 {
        return 0.0;
    }
    let acc = Integral::over(record, &f);
    if acc.span <= 0.0 {
        return 0.0;
    }
    let m = acc.linear.scale(1.0 / acc.span);
    acc.quadratic / acc.span - m.dot(m)
}

/// Mean of one energy term.
pub fn mean_energy(record: &[Results], term: EnergyTerm) -> Option<f64> {
    mean(record, |r| term.of(r))
}

/// Mean of one magnetization term.
pub fn mean_magnetization(record: &[Results], term: MagnetizationTerm) -> Option<DVec3> {
    mean(record, |r| term.of(r))
}

/// Specific heat of an energy term: `(<U²> - <U>²) / (n kT²)` with `n` the
/// term's particle count.
pub fn specific_heat(record: &[Results], term: EnergyTerm, counts: &RegionCounts, kt: f64) -> f64 {
    let n = term.count(counts);
    if n == 0 || kt <= 0.0 {
        return 0.0;
    }
    fluctuation(record, |r| term.of(r)) / (n as f64 * kt * kt)
}

/// Magnetic susceptibility of a magnetization term:
/// `(<M·M> - <M>·<M>) / (n kT²)`.
pub fn magnetic_susceptibility(
    record: &[Results],
    term: MagnetizationTerm,
    counts: &RegionCounts,
    kt: f64,
) -> f64 {
    let n = term.count(counts);
    if n == 0 || kt <= 0.0 {
        return 0.0;
    }
    fluctuation(record, |r| term.of(r)) / (n as f64 * kt * kt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn snap(t: u64, u: f64) -> Results {
        Results {
            t,
            u,
            m: DVec3::new(0.0, u, 0.0),
            ..Default::default()
        }
    }

    fn counts(n: usize) -> RegionCounts {
        RegionCounts {
            n,
            ..Default::default()
        }
    }

    #[test]
    fn test_mean_is_time_weighted() {
        let record = [snap(0, 0.0), snap(1, 2.0), snap(3, 2.0)];
        let m = mean_energy(&record, EnergyTerm::U).unwrap();
        // (1 * 1 + 2 * 2) / 3, not the arithmetic 4 / 3
        assert_relative_eq!(m, 5.0 / 3.0, epsilon = 1e-12);

        let mv = mean_magnetization(&record, MagnetizationTerm::M).unwrap();
        assert_relative_eq!(mv.y, 5.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mean_edge_cases() {
        assert_eq!(mean_energy(&[], EnergyTerm::U), None);
        assert_eq!(mean_energy(&[snap(4, -3.0)], EnergyTerm::U), Some(-3.0));
        let same_t = [snap(2, 1.0), snap(2, 3.0)];
        assert_eq!(mean_energy(&same_t, EnergyTerm::U), Some(2.0));
    }

    #[test]
    fn test_fluctuation_of_ramp() {
        // X = t on [0, 10]: <X> = 5, <X²> = 100 / 3
        let record = [snap(0, 0.0), snap(10, 10.0)];
        assert_relative_eq!(fluctuation(&record, |r| r.u), 100.0 / 12.0, epsilon = 1e-9);
        // splitting the ramp does not change the integral
        let split = [snap(0, 0.0), snap(4, 4.0), snap(10, 10.0)];
        assert_relative_eq!(fluctuation(&split, |r| r.u), 100.0 / 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_constant_signal_has_no_fluctuation() {
        let record = [snap(0, 2.5), snap(3, 2.5), snap(9, 2.5)];
        assert_relative_eq!(
            specific_heat(&record, EnergyTerm::U, &counts(4), 0.5),
            0.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_normalization() {
        let record = [snap(0, 0.0), snap(10, 10.0)];
        let var = 100.0 / 12.0;
        assert_relative_eq!(
            specific_heat(&record, EnergyTerm::U, &counts(4), 0.5),
            var / (4.0 * 0.25),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            magnetic_susceptibility(&record, MagnetizationTerm::M, &counts(4), 0.5),
            var / (4.0 * 0.25),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_susceptibility_scales_with_inverse_kt_squared() {
        let record = [snap(0, 0.0), snap(10, 10.0)];
        let chi = |kt| magnetic_susceptibility(&record, MagnetizationTerm::M, &counts(4), kt);
        assert_relative_eq!(chi(0.5), 100.0 / 12.0, epsilon = 1e-9);
        assert_relative_eq!(chi(0.25), 4.0 * chi(0.5), epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_records_give_zero() {
        let c = counts(10);
        assert_eq!(specific_heat(&[], EnergyTerm::U, &c, 1.0), 0.0);
        assert_eq!(specific_heat(&[snap(0, 1.0)], EnergyTerm::U, &c, 1.0), 0.0);
        assert_eq!(magnetic_susceptibility(&[], MagnetizationTerm::M, &c, 1.0), 0.0);
        assert_eq!(
            magnetic_susceptibility(&[snap(0, 1.0)], MagnetizationTerm::M, &c, 1.0),
            0.0
        );

        // no particles in the region
        let record = [snap(0, 0.0), snap(10, 10.0)];
        assert_eq!(specific_heat(&record, EnergyTerm::Um, &c, 1.0), 0.0);
    }
}
