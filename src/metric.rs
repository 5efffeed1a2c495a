//! Metric - local Riemannian metric tensor
//!
//! Each center carries a symmetric positive-definite tensor `g` that defines
//! its local notion of distance: `d² = δᵀ g δ`. The determinant is refreshed
//! on every mutation, the inverse only on demand.

use nalgebra::DMatrix;

use crate::error::{FieldError, FieldResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Determinants below this magnitude are treated as singular.
pub const DEGENERACY_EPSILON: f32 = 1e-10;

/// Maximum asymmetry `|g_ij - g_ji|` accepted by [`Metric::validate`].
pub const SYMMETRY_TOLERANCE: f32 = 1e-6;

/// Row-major metric tensor with cached determinant and inverse.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Metric {
    dims: usize,
    g: Vec<f32>,
    g_inv: Vec<f32>,
    det: f32,
    valid: bool,
    inverse_current: bool,
}

impl Metric {
    /// Identity metric: flat space, determinant 1, inverse current.
    pub fn identity(dims: usize) -> Self {
        let mut g = vec![0.0; dims * dims];
        for i in 0..dims {
            g[i * dims + i] = 1.0;
        }
        Self {
            dims,
            g_inv: g.clone(),
            g,
            det: 1.0,
            valid: true,
            inverse_current: true,
        }
    }

    /// Build from a row-major `dims × dims` tensor.
    ///
    /// The determinant is computed immediately. The inverse is attempted; a
    /// singular tensor is still returned, flagged invalid.
    pub fn from_components(dims: usize, g: Vec<f32>) -> FieldResult<Self> {
        if g.len() != dims * dims {
            return Err(FieldError::InvalidArgument(format!(
                "metric of dimension {dims} needs {} components, got {}",
                dims * dims,
                g.len()
            )));
        }
        let mut metric = Self {
            dims,
            g,
            g_inv: Self::identity(dims).g,
            det: 0.0,
            valid: false,
            inverse_current: false,
        };
        metric.update();
        // A singular tensor keeps the identity placeholder and stays invalid.
        let _ = metric.compute_inverse();
        Ok(metric)
    }

    /// Restore a metric with a previously computed inverse.
    pub(crate) fn from_parts(dims: usize, g: Vec<f32>, g_inv: Vec<f32>) -> FieldResult<Self> {
        if g.len() != dims * dims || g_inv.len() != dims * dims {
            return Err(FieldError::InvalidArgument(format!(
                "metric tensors must have {} components",
                dims * dims
            )));
        }
        let mut metric = Self {
            dims,
            g,
            g_inv,
            det: 0.0,
            valid: false,
            inverse_current: false,
        };
        metric.update();
        metric.inverse_current = metric.valid;
        Ok(metric)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Get dimensions.
    #[inline]
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Component `g_ij`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.g[i * self.dims + j]
    }

    /// Row-major tensor.
    pub fn components(&self) -> &[f32] {
        &self.g
    }

    /// Row-major inverse. Only meaningful when [`Metric::inverse_is_current`].
    pub fn inverse_components(&self) -> &[f32] {
        &self.g_inv
    }

    /// Component `g^ij` of the cached inverse.
    #[inline]
    pub fn inverse(&self, i: usize, j: usize) -> f32 {
        self.g_inv[i * self.dims + j]
    }

    /// Cached determinant.
    pub fn determinant(&self) -> f32 {
        self.det
    }

    /// Validity flag maintained by [`Metric::update`].
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// False after any mutation until [`Metric::compute_inverse`] succeeds.
    pub fn inverse_is_current(&self) -> bool {
        self.inverse_current
    }

    /// Trace of `g`.
    pub fn trace(&self) -> f32 {
        (0..self.dims).map(|i| self.get(i, i)).sum()
    }

    /// True when `g` is within `tol` of the identity.
    pub fn is_identity(&self, tol: f32) -> bool {
        (0..self.dims).all(|i| {
            (0..self.dims).all(|j| {
                let expected = if i == j { 1.0 } else { 0.0 };
                (self.get(i, j) - expected).abs() <= tol
            })
        })
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Set `g_ij` and `g_ji`, then refresh the determinant.
    pub fn set(&mut self, i: usize, j: usize, value: f32) {
        self.g[i * self.dims + j] = value;
        self.g[j * self.dims + i] = value;
        self.update();
    }

    /// Replace the whole tensor, then refresh the determinant.
    pub(crate) fn set_components(&mut self, g: &[f32]) {
        debug_assert_eq!(g.len(), self.g.len());
        self.g.copy_from_slice(g);
        self.update();
    }

    /// Average `g` with its transpose.
    pub fn symmetrize(&mut self) {
        for i in 0..self.dims {
            for j in (i + 1)..self.dims {
                let avg = 0.5 * (self.get(i, j) + self.get(j, i));
                self.g[i * self.dims + j] = avg;
                self.g[j * self.dims + i] = avg;
            }
        }
        self.update();
    }

    /// Recompute the determinant and validity; mark the inverse stale.
    pub fn update(&mut self) {
        self.det = self.to_matrix().determinant() as f32;
        self.valid = self.det.is_finite() && self.det > DEGENERACY_EPSILON;
        self.inverse_current = false;
    }

    /// Recompute the cached inverse.
    ///
    /// Fails when the determinant is below [`DEGENERACY_EPSILON`]; `g_inv`
    /// is left untouched in that case.
    pub fn compute_inverse(&mut self) -> FieldResult<()> {
        if !self.det.is_finite() || self.det.abs() < DEGENERACY_EPSILON {
            return Err(FieldError::NumericalDegeneracy(format!(
                "metric determinant {} below {DEGENERACY_EPSILON}",
                self.det
            )));
        }
        let inv = self.to_matrix().try_inverse().ok_or_else(|| {
            FieldError::NumericalDegeneracy("metric is not invertible".to_string())
        })?;
        if inv.iter().any(|v| !v.is_finite()) {
            return Err(FieldError::NumericalDegeneracy(
                "metric inverse is not finite".to_string(),
            ));
        }
        let n = self.dims;
        for i in 0..n {
            for j in 0..n {
                self.g_inv[i * n + j] = inv[(i, j)] as f32;
            }
        }
        self.inverse_current = true;
        Ok(())
    }

    /// Symmetric, positive diagonal, positive determinant, and a Cholesky
    /// factorisation exists.
    pub fn validate(&self) -> bool {
        for i in 0..self.dims {
            if self.get(i, i) <= 0.0 || !self.get(i, i).is_finite() {
                return false;
            }
            for j in (i + 1)..self.dims {
                if (self.get(i, j) - self.get(j, i)).abs() > SYMMETRY_TOLERANCE {
                    return false;
                }
            }
        }
        self.valid && self.det > DEGENERACY_EPSILON && self.to_matrix().cholesky().is_some()
    }

    /// `g` widened to f64 for factorisation.
    fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_row_iterator(self.dims, self.dims, self.g.iter().map(|&v| v as f64))
    }

    // =========================================================================
    // GEOMETRY
    // =========================================================================

    /// `g δ` written into `out`.
    pub fn apply_into(&self, delta: &[f32], out: &mut [f32]) {
        debug_assert_eq!(delta.len(), self.dims);
        debug_assert_eq!(out.len(), self.dims);
        for (i, o) in out.iter_mut().enumerate() {
            let row = &self.g[i * self.dims..(i + 1) * self.dims];
            *o = row.iter().zip(delta).map(|(g, d)| g * d).sum();
        }
    }

    /// `g δ`.
    pub fn apply(&self, delta: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0; self.dims];
        self.apply_into(delta, &mut out);
        out
    }

    /// Squared distance `δᵀ g δ`.
    pub fn quadratic_form(&self, delta: &[f32]) -> f32 {
        debug_assert_eq!(delta.len(), self.dims);
        let mut sum = 0.0;
        for i in 0..self.dims {
            let row = &self.g[i * self.dims..(i + 1) * self.dims];
            let gd: f32 = row.iter().zip(delta).map(|(g, d)| g * d).sum();
            sum += delta[i] * gd;
        }
        sum
    }
}
