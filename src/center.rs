//! Center - one kernel contributor of the field

use num_complex::Complex32;

use crate::kernel::Kernel;
use crate::metric::Metric;
use crate::point::Point;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A weighted kernel placed on the manifold.
///
/// Owns its position, complex amplitude, kernel width and local metric.
/// Only a [`Field`](crate::Field) creates or mutates centers.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Center {
    position: Point,
    coefficient: Complex32,
    epsilon: f32,
    metric: Metric,
}

impl Center {
    pub(crate) fn new(position: Point, coefficient: Complex32, epsilon: f32) -> Self {
        let metric = Metric::identity(position.dims());
        Self {
            position,
            coefficient,
            epsilon,
            metric,
        }
    }

    pub(crate) fn with_metric(
        position: Point,
        coefficient: Complex32,
        epsilon: f32,
        metric: Metric,
    ) -> Self {
        Self {
            position,
            coefficient,
            epsilon,
            metric,
        }
    }

    /// Center location.
    pub fn position(&self) -> &Point {
        &self.position
    }

    /// Complex amplitude.
    pub fn coefficient(&self) -> Complex32 {
        self.coefficient
    }

    /// Kernel width.
    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Local metric.
    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    pub(crate) fn set_coefficient(&mut self, coefficient: Complex32) {
        self.coefficient = coefficient;
    }

    pub(crate) fn metric_mut(&mut self) -> &mut Metric {
        &mut self.metric
    }

    /// Squared geodesic distance from `point`, measured with this center's metric.
    #[inline]
    pub fn distance_sq(&self, point: &Point) -> f32 {
        let delta = point.delta(&self.position);
        self.metric.quadratic_form(&delta)
    }

    /// Geodesic distance from `point`.
    pub fn distance(&self, point: &Point) -> f32 {
        self.distance_sq(point).max(0.0).sqrt()
    }

    /// `coefficient · kernel(d²)` at `point`.
    #[inline]
    pub fn contribution(&self, kernel: Kernel, point: &Point) -> Complex32 {
        self.coefficient * kernel.value(self.distance_sq(point), self.epsilon)
    }
}
