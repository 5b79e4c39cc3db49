//! Value derivation from cached entropy
//!
//! `QuantumRng` turns raw bits from a [`BitCache`] into bounded integers,
//! fixed-width integers, floats, doubles and UUIDs. Complex numbers live in
//! [`crate::complex`].
//!
//! Bounded integers use rejection sampling over the smallest bit width able
//! to represent the range, so there is no modulo bias. Floats use mantissa
//! injection: random bits are OR-ed into the significand of 1.0, the result
//! is reinterpreted as a float in `[1, 2)` and 1.0 is subtracted.

use crate::{bits::BitString, cache::BitCache, source::EntropySource, Error, Result};
use std::ops::Sub;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;
use uuid::Uuid;

const F32_ONE_BITS: u32 = 0x3F80_0000;
const F64_ONE_BITS: u64 = 0x3FF0_0000_0000_0000;

/// Bits dropped from a 32-bit draw to fit the 23-bit single mantissa
const F32_SHIFT: u32 = 32 - 23;
/// Bits dropped from a 64-bit draw to fit the 52-bit double mantissa
const F64_SHIFT: u32 = 64 - 52;

/// Minimum number of bits able to represent `delta`, i.e. `floor(log2(delta)) + 1`
///
/// `delta` must be non-zero.
pub fn bits_needed(delta: u64) -> usize {
    (u64::BITS - delta.leading_zeros()) as usize
}

/// Map 32 random bits to a single-precision value in `[0, 1)`
pub fn unit_f32(r: u32) -> f32 {
    f32::from_bits(F32_ONE_BITS | (r >> F32_SHIFT)) - 1.0
}

/// Map 64 random bits to a double-precision value in `[0, 1)`
pub fn unit_f64(r: u64) -> f64 {
    f64::from_bits(F64_ONE_BITS | (r >> F64_SHIFT)) - 1.0
}

/// Validate a half-open float range, returning it unchanged
///
/// The span `max - min` must itself be finite in `T`, otherwise scaling
/// overflows to infinity or NaN.
pub(crate) fn check_range<T>(min: T, max: T) -> Result<(T, T)>
where
    T: Copy + PartialOrd + std::fmt::Display + Into<f64> + Sub<Output = T>,
{
    let finite =
        min.into().is_finite() && max.into().is_finite() && (max - min).into().is_finite();
    // `!(max >= min)` also catches NaN
    if !finite || !(max >= min) {
        return Err(Error::invalid_range(min, max));
    }
    Ok((min, max))
}

/// Scale a unit value onto `[min, max)`
///
/// Rounding can land on `max` when the range is only a few ulps wide; such
/// results step down to the largest float below `max`.
fn scale_f32(min: f32, max: f32, unit: f32) -> f32 {
    let value = (max - min) * unit + min;
    if value >= max && max > min {
        prev_f32(max)
    } else {
        value
    }
}

fn scale_f64(min: f64, max: f64, unit: f64) -> f64 {
    let value = (max - min) * unit + min;
    if value >= max && max > min {
        prev_f64(max)
    } else {
        value
    }
}

/// Largest `f32` strictly below finite `x`
fn prev_f32(x: f32) -> f32 {
    if x == 0.0 {
        -f32::from_bits(1)
    } else if x > 0.0 {
        f32::from_bits(x.to_bits() - 1)
    } else {
        f32::from_bits(x.to_bits() + 1)
    }
}

/// Largest `f64` strictly below finite `x`
fn prev_f64(x: f64) -> f64 {
    if x == 0.0 {
        -f64::from_bits(1)
    } else if x > 0.0 {
        f64::from_bits(x.to_bits() - 1)
    } else {
        f64::from_bits(x.to_bits() + 1)
    }
}

/// Random value generator over a bit cache
pub struct QuantumRng<S> {
    cache: BitCache<S>,
    rejections: AtomicU64,
}

impl<S: EntropySource> QuantumRng<S> {
    pub fn new(cache: BitCache<S>) -> Self {
        Self {
            cache,
            rejections: AtomicU64::new(0),
        }
    }

    /// Build a generator with a fresh, empty cache over `source`
    pub fn from_source(source: S) -> Result<Self> {
        Ok(Self::new(BitCache::new(source)?))
    }

    pub fn cache(&self) -> &BitCache<S> {
        &self.cache
    }

    pub fn into_cache(self) -> BitCache<S> {
        self.cache
    }

    /// Draws discarded by rejection sampling so far
    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }

    /// Exactly `n` random bits
    pub async fn random_bits(&self, n: usize) -> Result<BitString> {
        self.cache.take(n).await
    }

    /// Uniform integer over the inclusive range `[min, max]`
    pub async fn random_int(&self, min: i64, max: i64) -> Result<i64> {
        if max < min {
            return Err(Error::invalid_range(min, max));
        }

        let delta = max.abs_diff(min);
        if delta == 0 {
            return Ok(min);
        }

        let width = bits_needed(delta);
        loop {
            let r = self.draw(width).await?;
            if r <= delta {
                // Two's complement wrap lands inside [min, max] because r <= delta
                return Ok(min.wrapping_add(r as i64));
            }
            trace!(r, delta, "Rejected out-of-range draw");
            self.rejections.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Unsigned interpretation of 32 fresh bits
    pub async fn random_int32(&self) -> Result<u32> {
        Ok(self.draw(32).await? as u32)
    }

    /// Unsigned interpretation of 64 fresh bits
    pub async fn random_int64(&self) -> Result<u64> {
        self.draw(64).await
    }

    /// Uniform single-precision value over `[0, 1)`
    pub async fn random_unit_float(&self) -> Result<f32> {
        Ok(unit_f32(self.random_int32().await?))
    }

    /// Uniform single-precision value over `[min, max)`
    pub async fn random_float(&self, min: f32, max: f32) -> Result<f32> {
        let (min, max) = check_range(min, max)?;
        let value = self.random_unit_float().await?;
        Ok(scale_f32(min, max, value))
    }

    /// Uniform double-precision value over `[0, 1)`
    pub async fn random_unit_double(&self) -> Result<f64> {
        Ok(unit_f64(self.random_int64().await?))
    }

    /// Uniform double-precision value over `[min, max)`
    pub async fn random_double(&self, min: f64, max: f64) -> Result<f64> {
        let (min, max) = check_range(min, max)?;
        let value = self.random_unit_double().await?;
        Ok(scale_f64(min, max, value))
    }

    /// Version 4 UUID built from 128 fresh bits
    pub async fn random_uuid(&self) -> Result<Uuid> {
        let bytes: [u8; 16] = self
            .cache
            .take(128)
            .await?
            .to_bytes()
            .try_into()
            .map_err(|_| Error::Validation("expected 16 bytes for a UUID".to_string()))?;
        Ok(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }

    async fn draw(&self, width: usize) -> Result<u64> {
        self.cache
            .take(width)
            .await?
            .to_u64()
            .ok_or_else(|| Error::Validation(format!("cannot draw {} bits into a u64", width)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{testing::ScriptedSource, SimulatedSource};
    use proptest::prelude::*;
    use statrs::distribution::{ChiSquared, ContinuousCDF};

    fn simulated() -> QuantumRng<SimulatedSource> {
        QuantumRng::from_source(SimulatedSource::new(64)).unwrap()
    }

    fn scripted(script: &str) -> QuantumRng<ScriptedSource> {
        QuantumRng::from_source(ScriptedSource::new(script.len(), script)).unwrap()
    }

    /// p-value of a chi-square goodness-of-fit test against equal bins
    fn uniformity_p_value(counts: &[u64]) -> f64 {
        let total: u64 = counts.iter().sum();
        let expected = total as f64 / counts.len() as f64;
        let statistic: f64 = counts
            .iter()
            .map(|&c| (c as f64 - expected).powi(2) / expected)
            .sum();
        let dist = ChiSquared::new((counts.len() - 1) as f64).unwrap();
        1.0 - dist.cdf(statistic)
    }

    #[test]
    fn test_bits_needed() {
        assert_eq!(bits_needed(1), 1);
        assert_eq!(bits_needed(2), 2);
        assert_eq!(bits_needed(3), 2);
        assert_eq!(bits_needed(4), 3);
        assert_eq!(bits_needed(255), 8);
        assert_eq!(bits_needed(256), 9);
        assert_eq!(bits_needed(u64::MAX), 64);
    }

    #[test]
    fn test_unit_float_bounds() {
        assert_eq!(unit_f32(0), 0.0);
        assert!(unit_f32(u32::MAX) < 1.0);
        assert_eq!(unit_f32(u32::MAX), 1.0 - f32::EPSILON);
        assert_eq!(unit_f64(0), 0.0);
        assert!(unit_f64(u64::MAX) < 1.0);
        assert_eq!(unit_f64(u64::MAX), 1.0 - f64::EPSILON);
    }

    #[test]
    fn test_unit_float_mantissa_resolution() {
        // The lowest kept bit moves the result by one mantissa step
        assert_eq!(unit_f32(1 << F32_SHIFT), f32::EPSILON);
        assert_eq!(unit_f64(1 << F64_SHIFT), f64::EPSILON);
        // Bits below the mantissa are dropped
        assert_eq!(unit_f32((1 << F32_SHIFT) - 1), 0.0);
    }

    #[tokio::test]
    async fn test_take_zero_is_empty() {
        let rng = scripted("1");
        assert_eq!(rng.random_bits(0).await.unwrap().to_string(), "");
    }

    #[tokio::test]
    async fn test_degenerate_range_consumes_nothing() {
        let rng = scripted("10101010");
        for _ in 0..100 {
            assert_eq!(rng.random_int(5, 5).await.unwrap(), 5);
        }
        assert_eq!(rng.cache().source().calls(), 0);
    }

    #[tokio::test]
    async fn test_reversed_range_rejected() {
        let rng = scripted("10101010");
        let err = rng.random_int(10, 3).await.unwrap_err();
        assert!(err.is_invalid_range());
        assert!(rng.random_float(1.0, 0.0).await.unwrap_err().is_invalid_range());
        assert!(rng.random_double(0.0, f64::NAN).await.unwrap_err().is_invalid_range());
        assert!(rng
            .random_double(f64::NEG_INFINITY, 0.0)
            .await
            .unwrap_err()
            .is_invalid_range());
        assert_eq!(rng.cache().source().calls(), 0);
    }

    #[tokio::test]
    async fn test_rejection_sampling_redraws() {
        // delta = 4 -> 3 bits; 111 (7) and 101 (5) are rejected, 011 (3) accepted
        let rng = scripted("111101011");
        assert_eq!(rng.random_int(10, 14).await.unwrap(), 13);
        assert_eq!(rng.rejections(), 2);
        assert_eq!(rng.cache().stats().bits_served, 9);
    }

    #[tokio::test]
    async fn test_full_i64_range() {
        let ones = "1".repeat(64);
        let rng = scripted(&ones);
        assert_eq!(rng.random_int(i64::MIN, i64::MAX).await.unwrap(), i64::MAX);

        let zeros = "0".repeat(64);
        let rng = scripted(&zeros);
        assert_eq!(rng.random_int(i64::MIN, i64::MAX).await.unwrap(), i64::MIN);
    }

    #[tokio::test]
    async fn test_fixed_width_integers() {
        let script = format!("{:032b}{:064b}", 0xDEAD_BEEFu32, 0x0123_4567_89AB_CDEFu64);
        let rng = QuantumRng::from_source(ScriptedSource::new(32, &script)).unwrap();
        assert_eq!(rng.random_int32().await.unwrap(), 0xDEAD_BEEF);
        assert_eq!(rng.random_int64().await.unwrap(), 0x0123_4567_89AB_CDEF);
    }

    #[tokio::test]
    async fn test_float_and_double_from_same_bits() {
        let script = "1".repeat(64);
        let float = scripted(&script).random_unit_float().await.unwrap();
        let double = scripted(&script).random_unit_double().await.unwrap();

        assert!((0.0..1.0).contains(&float));
        assert!((0.0..1.0).contains(&double));
        // Same bits, different mantissa widths
        assert_eq!(float, 1.0 - f32::EPSILON);
        assert_eq!(double, 1.0 - f64::EPSILON);
        assert_ne!(float as f64, double);
    }

    #[tokio::test]
    async fn test_affine_scaling() {
        // 0x8000... -> exactly 0.5
        let script = format!("{:064b}", 1u64 << 63);
        let rng = scripted(&script);
        assert_eq!(rng.random_double(-4.0, 6.0).await.unwrap(), 1.0);

        let script = format!("{:032b}", 1u32 << 31);
        let rng = QuantumRng::from_source(ScriptedSource::new(32, &script)).unwrap();
        assert_eq!(rng.random_float(2.0, 4.0).await.unwrap(), 3.0);
    }

    #[tokio::test]
    async fn test_overflowing_span_rejected() {
        let rng = scripted(&format!("{:064b}", 1u64 << 63));
        let err = rng.random_double(-f64::MAX, f64::MAX).await.unwrap_err();
        assert!(err.is_invalid_range());
        assert!(rng
            .random_float(-f32::MAX, f32::MAX)
            .await
            .unwrap_err()
            .is_invalid_range());
        assert_eq!(rng.cache().source().calls(), 0);

        // Half the span still fits
        let v = rng.random_double(-f64::MAX / 2.0, f64::MAX / 2.0).await.unwrap();
        assert!(v.is_finite());
    }

    #[tokio::test]
    async fn test_narrow_range_excludes_max() {
        let ones = "1".repeat(64);

        let max = f32::from_bits(1.0f32.to_bits() + 1);
        let v = scripted(&ones).random_float(1.0, max).await.unwrap();
        assert_eq!(v, 1.0);

        let max = f64::from_bits(1.0f64.to_bits() + 1);
        let v = scripted(&ones).random_double(1.0, max).await.unwrap();
        assert_eq!(v, 1.0);

        let min = -1.0f64 - f64::EPSILON;
        let v = scripted(&ones).random_double(min, -1.0).await.unwrap();
        assert_eq!(v, min);
    }

    #[test]
    fn test_prev_float() {
        assert_eq!(prev_f32(1.0), 1.0 - f32::EPSILON / 2.0);
        assert_eq!(prev_f64(1.0), 1.0 - f64::EPSILON / 2.0);
        assert_eq!(prev_f64(0.0), -f64::from_bits(1));
        assert_eq!(prev_f64(-1.0), -1.0 - f64::EPSILON);
    }

    #[tokio::test]
    async fn test_degenerate_float_range() {
        let rng = simulated();
        assert_eq!(rng.random_double(2.5, 2.5).await.unwrap(), 2.5);
        assert_eq!(rng.random_float(-1.0, -1.0).await.unwrap(), -1.0);
    }

    #[tokio::test]
    async fn test_random_int_coin_flip() {
        let rng = simulated();
        let mut ones = 0;
        for _ in 0..10_000 {
            ones += rng.random_int(0, 1).await.unwrap();
        }
        // 6 standard deviations around 5000
        assert!((4_700..=5_300).contains(&ones), "ones = {}", ones);
        assert_eq!(rng.rejections(), 0);
    }

    #[tokio::test]
    async fn test_random_int_uniform_chi_square() {
        let rng = simulated();
        let mut counts = [0u64; 6];
        for _ in 0..12_000 {
            let roll = rng.random_int(1, 6).await.unwrap();
            assert!((1..=6).contains(&roll));
            counts[(roll - 1) as usize] += 1;
        }
        let p = uniformity_p_value(&counts);
        assert!(p > 1e-6, "p = {}, counts = {:?}", p, counts);

        // delta = 5 uses 3 bits, accepting 6 of 8 patterns
        let rejection_rate = rng.rejections() as f64 / (12_000 + rng.rejections()) as f64;
        assert!(rejection_rate > 0.2 && rejection_rate < 0.3, "rate = {}", rejection_rate);
    }

    #[tokio::test]
    async fn test_random_double_uniform_chi_square() {
        let rng = simulated();
        let mut counts = [0u64; 10];
        for _ in 0..10_000 {
            let v = rng.random_double(-5.0, 5.0).await.unwrap();
            assert!((-5.0..5.0).contains(&v));
            counts[((v + 5.0).floor() as usize).min(9)] += 1;
        }
        let p = uniformity_p_value(&counts);
        assert!(p > 1e-6, "p = {}, counts = {:?}", p, counts);
    }

    #[tokio::test]
    async fn test_fixed_width_covers_high_range() {
        let rng = simulated();
        let mut high32 = false;
        let mut high64 = false;
        for _ in 0..64 {
            high32 |= rng.random_int32().await.unwrap() > u32::MAX / 2;
            high64 |= rng.random_int64().await.unwrap() > u64::MAX / 2;
        }
        assert!(high32 && high64);
    }

    #[tokio::test]
    async fn test_random_uuid() {
        let rng = simulated();
        let a = rng.random_uuid().await.unwrap();
        let b = rng.random_uuid().await.unwrap();
        assert_eq!(a.get_version_num(), 4);
        assert_eq!(a.get_variant(), uuid::Variant::RFC4122);
        assert_ne!(a, b);
        assert_eq!(rng.cache().stats().bits_served, 256);
    }

    proptest! {
        #[test]
        fn prop_unit_f32_in_unit_interval(r in any::<u32>()) {
            let v = unit_f32(r);
            prop_assert!((0.0..1.0).contains(&v));
        }

        #[test]
        fn prop_unit_f64_in_unit_interval(r in any::<u64>()) {
            let v = unit_f64(r);
            prop_assert!((0.0..1.0).contains(&v));
        }

        #[test]
        fn prop_bits_needed_covers_delta(delta in 1u64..) {
            let width = bits_needed(delta);
            prop_assert!(width >= 1 && width <= 64);
            // delta fits in `width` bits but not in `width - 1`
            prop_assert!(width == 64 || delta < (1u64 << width));
            prop_assert!(delta >= (1u64 << (width - 1)));
        }

        #[test]
        fn prop_random_int_in_range(min in -1_000_000i64..1_000_000, span in 0i64..1_000_000, seed in any::<u64>()) {
            let max = min + span;
            let script: String = std::iter::repeat(format!("{:064b}", seed)).take(64).collect();
            let rng = QuantumRng::from_source(ScriptedSource::new(64, &script)).unwrap();
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            // A repeating script may keep landing on rejected patterns; only judge successes
            if let Ok(v) = runtime.block_on(rng.random_int(min, max)) {
                prop_assert!(v >= min && v <= max);
            }
        }
    }
}
