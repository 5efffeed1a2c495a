//! Radial-basis kernels
//!
//! Kernels are expressed as functions of the squared distance `s = d²` so
//! that gradients and Laplacians of `k(δᵀ g δ)` stay smooth at `δ = 0`:
//!
//! ```text
//! ∇k = 2 k'(s) g δ
//! Δk = 4 k''(s) |g δ|² + 2 k'(s) tr(g)
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Squared distances below this are treated as zero by the thin-plate spline.
const TPS_FLOOR: f32 = 1e-12;

/// Kernel family. `epsilon` is always a width: larger means wider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Kernel {
    /// `exp(-s / (2ε²))`
    #[default]
    Gaussian,
    /// `sqrt(1 + s/ε²)`
    Multiquadric,
    /// `1 / sqrt(1 + s/ε²)`
    InverseMultiquadric,
    /// `(u/2) ln u` with `u = s/ε²`
    ThinPlateSpline,
}

impl Kernel {
    /// Stable identifier used by the persistence format.
    pub fn id(self) -> u32 {
        match self {
            Kernel::Gaussian => 0,
            Kernel::Multiquadric => 1,
            Kernel::InverseMultiquadric => 2,
            Kernel::ThinPlateSpline => 3,
        }
    }

    /// Inverse of [`Kernel::id`].
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Kernel::Gaussian),
            1 => Some(Kernel::Multiquadric),
            2 => Some(Kernel::InverseMultiquadric),
            3 => Some(Kernel::ThinPlateSpline),
            _ => None,
        }
    }

    /// Kernel value at squared distance `s`.
    #[inline]
    pub fn value(self, s: f32, epsilon: f32) -> f32 {
        let e2 = epsilon * epsilon;
        match self {
            Kernel::Gaussian => (-s / (2.0 * e2)).exp(),
            Kernel::Multiquadric => (1.0 + s / e2).sqrt(),
            Kernel::InverseMultiquadric => 1.0 / (1.0 + s / e2).sqrt(),
            Kernel::ThinPlateSpline => {
                let u = s / e2;
                if u < TPS_FLOOR {
                    0.0
                } else {
                    0.5 * u * u.ln()
                }
            }
        }
    }

    /// Value at zero distance.
    pub fn peak(self) -> f32 {
        self.value(0.0, 1.0)
    }

    /// First derivative `dk/ds`.
    #[inline]
    pub fn d1(self, s: f32, epsilon: f32) -> f32 {
        let e2 = epsilon * epsilon;
        match self {
            Kernel::Gaussian => -self.value(s, epsilon) / (2.0 * e2),
            Kernel::Multiquadric => 1.0 / (2.0 * e2 * (1.0 + s / e2).sqrt()),
            Kernel::InverseMultiquadric => -(1.0 + s / e2).powf(-1.5) / (2.0 * e2),
            Kernel::ThinPlateSpline => {
                let u = s / e2;
                if u < TPS_FLOOR {
                    0.0
                } else {
                    0.5 * (u.ln() + 1.0) / e2
                }
            }
        }
    }

    /// Second derivative `d²k/ds²`.
    #[inline]
    pub fn d2(self, s: f32, epsilon: f32) -> f32 {
        let e2 = epsilon * epsilon;
        let e4 = e2 * e2;
        match self {
            Kernel::Gaussian => self.value(s, epsilon) / (4.0 * e4),
            Kernel::Multiquadric => -(1.0 + s / e2).powf(-1.5) / (4.0 * e4),
            Kernel::InverseMultiquadric => 0.75 * (1.0 + s / e2).powf(-2.5) / e4,
            Kernel::ThinPlateSpline => {
                let u = s / e2;
                if u < TPS_FLOOR {
                    0.0
                } else {
                    0.5 / (u * e4)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const KERNELS: [Kernel; 4] = [
        Kernel::Gaussian,
        Kernel::Multiquadric,
        Kernel::InverseMultiquadric,
        Kernel::ThinPlateSpline,
    ];

    #[test]
    fn test_gaussian_peak_and_tail() {
        assert_eq!(Kernel::Gaussian.peak(), 1.0);
        // d = ε  ->  exp(-1/2)
        assert_relative_eq!(Kernel::Gaussian.value(0.01, 0.1), (-0.5f32).exp(), epsilon = 1e-6);
        assert!(Kernel::Gaussian.value(100.0, 0.1) < 1e-30);
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let h = 1e-3f32;
        for kernel in KERNELS {
            for &s in &[0.3f32, 0.8, 1.7] {
                let eps = 0.7;
                let fd1 = (kernel.value(s + h, eps) - kernel.value(s - h, eps)) / (2.0 * h);
                let fd2 = (kernel.d1(s + h, eps) - kernel.d1(s - h, eps)) / (2.0 * h);
                assert_relative_eq!(kernel.d1(s, eps), fd1, max_relative = 1e-2);
                assert_relative_eq!(kernel.d2(s, eps), fd2, max_relative = 1e-2);
            }
        }
    }

    #[test]
    fn test_id_roundtrip() {
        for kernel in KERNELS {
            assert_eq!(Kernel::from_id(kernel.id()), Some(kernel));
        }
        assert_eq!(Kernel::from_id(42), None);
    }
}
