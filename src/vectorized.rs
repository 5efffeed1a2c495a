//! Vectorized evaluator - Gaussian kernel sums over 8 centers at a time
//!
//! A snapshot of the field in structure-of-arrays layout. Every array is
//! padded to a multiple of [`LANES`]; padded lanes carry a zero coefficient
//! and contribute nothing.

use num_complex::Complex32;

use crate::center::Center;
use crate::point::Point;

#[cfg(feature = "simd")]
use wide::f32x8;

/// Lane width of the batched path.
pub const LANES: usize = 8;

/// Structure-of-arrays snapshot of Gaussian centers.
#[derive(Clone, Debug)]
pub struct VectorizedEvaluator {
    dims: usize,
    len: usize,
    padded: usize,
    /// `positions[axis * padded + i]`
    positions: Vec<f32>,
    /// Upper triangle of each metric, `metric[pair * padded + i]` with pairs
    /// enumerated row by row (`a <= b`).
    metric: Vec<f32>,
    /// `1 / (2ε²)` per lane.
    inv_two_eps2: Vec<f32>,
    coeff_re: Vec<f32>,
    coeff_im: Vec<f32>,
}

impl VectorizedEvaluator {
    /// Snapshot `centers`, all of dimension `dims`.
    pub fn from_centers(dims: usize, centers: &[Center]) -> Self {
        let len = centers.len();
        let padded = len.div_ceil(LANES) * LANES;
        let pairs = dims * (dims + 1) / 2;

        let mut positions = vec![0.0; dims * padded];
        let mut metric = vec![0.0; pairs * padded];
        let mut inv_two_eps2 = vec![1.0; padded];
        let mut coeff_re = vec![0.0; padded];
        let mut coeff_im = vec![0.0; padded];

        for (i, center) in centers.iter().enumerate() {
            for (axis, &x) in center.position().coords().iter().enumerate() {
                positions[axis * padded + i] = x;
            }
            let mut pair = 0;
            for a in 0..dims {
                for b in a..dims {
                    let g = center.metric().get(a, b);
                    metric[pair * padded + i] = if a == b { g } else { 2.0 * g };
                    pair += 1;
                }
            }
            let eps = center.epsilon();
            inv_two_eps2[i] = 1.0 / (2.0 * eps * eps);
            coeff_re[i] = center.coefficient().re;
            coeff_im[i] = center.coefficient().im;
        }

        Self {
            dims,
            len,
            padded,
            positions,
            metric,
            inv_two_eps2,
            coeff_re,
            coeff_im,
        }
    }

    /// Number of real (unpadded) centers.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Field value at `point`, using lanes when the `simd` feature is on.
    pub fn evaluate(&self, point: &Point) -> Complex32 {
        #[cfg(feature = "simd")]
        {
            self.evaluate_lanes(point)
        }
        #[cfg(not(feature = "simd"))]
        {
            self.evaluate_scalar(point)
        }
    }

    /// One value per query point.
    pub fn evaluate_batch(&self, points: &[Point]) -> Vec<Complex32> {
        points.iter().map(|p| self.evaluate(p)).collect()
    }

    /// Scalar walk over the same layout.
    pub fn evaluate_scalar(&self, point: &Point) -> Complex32 {
        debug_assert_eq!(point.dims(), self.dims);
        let p = point.coords();
        let mut delta = vec![0.0f32; self.dims];
        let mut sum = Complex32::new(0.0, 0.0);

        for i in 0..self.len {
            for (axis, d) in delta.iter_mut().enumerate() {
                *d = p[axis] - self.positions[axis * self.padded + i];
            }
            let mut s = 0.0;
            let mut pair = 0;
            for a in 0..self.dims {
                for b in a..self.dims {
                    s += self.metric[pair * self.padded + i] * delta[a] * delta[b];
                    pair += 1;
                }
            }
            let w = (-s * self.inv_two_eps2[i]).exp();
            sum += Complex32::new(w * self.coeff_re[i], w * self.coeff_im[i]);
        }
        sum
    }

    #[cfg(feature = "simd")]
    fn evaluate_lanes(&self, point: &Point) -> Complex32 {
        debug_assert_eq!(point.dims(), self.dims);
        let p = point.coords();
        let mut delta = vec![f32x8::ZERO; self.dims];
        let mut re = f32x8::ZERO;
        let mut im = f32x8::ZERO;

        for start in (0..self.padded).step_by(LANES) {
            for (axis, d) in delta.iter_mut().enumerate() {
                *d = f32x8::splat(p[axis]) - load(&self.positions, axis * self.padded + start);
            }

            let mut s = f32x8::ZERO;
            let mut pair = 0;
            for a in 0..self.dims {
                for b in a..self.dims {
                    s += load(&self.metric, pair * self.padded + start) * delta[a] * delta[b];
                    pair += 1;
                }
            }

            let arg = (-s * load(&self.inv_two_eps2, start)).max(f32x8::splat(EXP_FLOOR));
            let w = arg.exp();
            re += w * load(&self.coeff_re, start);
            im += w * load(&self.coeff_im, start);
        }

        Complex32::new(re.reduce_add(), im.reduce_add())
    }
}

/// Lane exponent arguments are clamped here; `exp` underflows to ~0 below it.
#[cfg(feature = "simd")]
const EXP_FLOOR: f32 = -87.0;

#[cfg(feature = "simd")]
#[inline(always)]
fn load(values: &[f32], start: usize) -> f32x8 {
    let mut lane = [0.0f32; LANES];
    lane.copy_from_slice(&values[start..start + LANES]);
    f32x8::from(lane)
}
