//! Stochastic arrival generation.
//!
//! An hourly rate is turned into a per-tick Bernoulli trial: a vehicle is born
//! when a uniform draw from `[0, window)` is zero, where
//! `window = ceil(3600 / (dt * rate))`. The success probability is therefore
//! close to `rate * dt / 3600`, and exact whenever the division is exact.

use crate::vehicle::VehicleKind;
use crate::volume::VolumeRates;
use arrayvec::ArrayVec;
use rand::Rng;

/// The number of seconds in an hour.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// The vehicles born in a single tick, at most one of each kind.
pub type Births = ArrayVec<VehicleKind, 4>;

/// Computes the size of the window one arrival is drawn from,
/// or `None` if no arrival can happen.
///
/// # Parameters
/// * `dt` - The tick length in seconds
/// * `rate` - The arrival rate in vehicles/hour
pub fn arrival_window(dt: f64, rate: f64) -> Option<u64> {
    if !(dt > 0.0) || !(rate > 0.0) {
        return None;
    }
    let window = (SECONDS_PER_HOUR / (dt * rate)).ceil();
    // Saturating cast; an infinite product gives a window of zero.
    Some(u64::max(window as u64, 1))
}

/// Decides whether a vehicle is born this tick.
pub fn is_born<R: Rng + ?Sized>(dt: f64, rate: f64, rng: &mut R) -> bool {
    match arrival_window(dt, rate) {
        Some(1) => true,
        Some(window) => rng.gen_range(0..window) == 0,
        None => false,
    }
}

/// Runs one independent trial per vehicle kind, in [VehicleKind::ALL] order.
///
/// # Parameters
/// * `dt` - The tick length in seconds
/// * `rates` - The hourly rate of each vehicle kind
/// * `multiplier` - Scales every rate before it is converted
/// * `rng` - The source of randomness
pub fn generate<R: Rng + ?Sized>(
    dt: f64,
    rates: &VolumeRates,
    multiplier: f64,
    rng: &mut R,
) -> Births {
    VehicleKind::ALL
        .into_iter()
        .filter(|kind| is_born(dt, multiplier * rates.get(*kind) as f64, &mut *rng))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn window_sizes() {
        assert_eq!(arrival_window(1.0, 3600.0), Some(1));
        assert_eq!(arrival_window(0.1, 600.0), Some(60));
        assert_eq!(arrival_window(0.1, 700.0), Some(52));
        assert_eq!(arrival_window(1.0, 1e9), Some(1));
        assert_eq!(arrival_window(0.0, 600.0), None);
        assert_eq!(arrival_window(-0.1, 600.0), None);
        assert_eq!(arrival_window(f64::NAN, 600.0), None);
        assert_eq!(arrival_window(0.1, 0.0), None);
    }

    #[test]
    fn zero_rate_never_births() {
        let mut rng = StdRng::seed_from_u64(1);
        for dt in [0.01, 0.1, 1.0, 10.0, 3600.0, 1e9] {
            for _ in 0..10_000 {
                assert!(!is_born(dt, 0.0, &mut rng));
            }
        }
    }

    #[test]
    fn certain_when_window_is_one() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..1000 {
            assert!(is_born(1.0, 3600.0, &mut rng));
        }
    }

    #[test]
    fn non_positive_tick_never_births() {
        let mut rng = StdRng::seed_from_u64(3);
        let rates = VolumeRates::new(3600, 3600, 3600, 3600);
        assert!(generate(0.0, &rates, 1.0, &mut rng).is_empty());
        assert!(generate(-1.0, &rates, 1.0, &mut rng).is_empty());
    }

    #[test]
    fn generate_in_kind_order() {
        let mut rng = StdRng::seed_from_u64(4);
        let rates = VolumeRates::new(3600, 0, 3600, 3600);
        let births = generate(1.0, &rates, 1.0, &mut rng);
        assert_eq!(
            births.as_slice(),
            &[VehicleKind::Car, VehicleKind::Bus, VehicleKind::Tram]
        );
    }

    #[test]
    fn zero_multiplier_disables() {
        let mut rng = StdRng::seed_from_u64(5);
        let rates = VolumeRates::new(3600, 3600, 3600, 3600);
        assert!(generate(1.0, &rates, 0.0, &mut rng).is_empty());
    }

    #[test]
    fn arrivals_converge_to_rate() {
        let mut rng = StdRng::seed_from_u64(6);
        let (dt, rate) = (0.1, 600.0);
        let ticks = 360_000; // 10 simulated hours
        let count = (0..ticks).filter(|_| is_born(dt, rate, &mut rng)).count();
        let expected = rate * (ticks as f64 * dt) / SECONDS_PER_HOUR;
        assert!(
            (count as f64 - expected).abs() < 0.05 * expected,
            "{} arrivals, expected about {}",
            count,
            expected
        );
    }
}
