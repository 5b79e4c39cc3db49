//! Random complex numbers
//!
//! Rectangular sampling draws the two components independently, each from
//! its own range. Polar sampling is area-uniform over a disk sector: the
//! radius is scaled by the square root of a unit draw, which cancels the
//! `r dr` Jacobian of the polar mapping.

use crate::{derive::check_range, source::EntropySource, Error, QuantumRng, Result};
use num_complex::Complex64;
use std::f64::consts::TAU;

/// Rectangle of the complex plane to sample from
///
/// Unset imaginary bounds fall back to the real ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplexRect {
    pub real_min: f64,
    pub real_max: f64,
    pub img_min: Option<f64>,
    pub img_max: Option<f64>,
}

impl Default for ComplexRect {
    fn default() -> Self {
        Self {
            real_min: 0.0,
            real_max: 1.0,
            img_min: None,
            img_max: None,
        }
    }
}

impl ComplexRect {
    /// Square `[min, max) x [min, max)i`
    pub fn new(real_min: f64, real_max: f64) -> Self {
        Self {
            real_min,
            real_max,
            img_min: None,
            img_max: None,
        }
    }

    pub fn with_imaginary(mut self, img_min: f64, img_max: f64) -> Self {
        self.img_min = Some(img_min);
        self.img_max = Some(img_max);
        self
    }

    /// Imaginary bounds after applying defaults
    pub fn imaginary_range(&self) -> (f64, f64) {
        (
            self.img_min.unwrap_or(self.real_min),
            self.img_max.unwrap_or(self.real_max),
        )
    }
}

/// Disk sector of radius `radius` sweeping `[0, theta)` from the positive real axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplexPolar {
    pub radius: f64,
    pub theta: f64,
}

impl Default for ComplexPolar {
    fn default() -> Self {
        Self {
            radius: 1.0,
            theta: TAU,
        }
    }
}

impl ComplexPolar {
    pub fn new(radius: f64, theta: f64) -> Self {
        Self { radius, theta }
    }

    fn validate(&self) -> Result<()> {
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        if !valid(self.radius) {
            return Err(Error::invalid_range(0.0, self.radius));
        }
        if !valid(self.theta) {
            return Err(Error::invalid_range(0.0, self.theta));
        }
        Ok(())
    }
}

impl<S: EntropySource> QuantumRng<S> {
    /// Complex number with independent uniform components
    pub async fn random_complex_rect(&self, rect: &ComplexRect) -> Result<Complex64> {
        // Both ranges are checked before any entropy is spent
        let (real_min, real_max) = check_range(rect.real_min, rect.real_max)?;
        let (img_min, img_max) = rect.imaginary_range();
        let (img_min, img_max) = check_range(img_min, img_max)?;

        let re = self.random_double(real_min, real_max).await?;
        let im = self.random_double(img_min, img_max).await?;
        Ok(Complex64::new(re, im))
    }

    /// Complex number uniform over the area of a disk sector
    pub async fn random_complex_polar(&self, polar: &ComplexPolar) -> Result<Complex64> {
        polar.validate()?;

        let r0 = polar.radius * self.random_unit_double().await?.sqrt();
        let theta0 = self.random_double(0.0, polar.theta).await?;
        Ok(Complex64::from_polar(r0, theta0))
    }
}
