//! Field - the core superposition of kernel centers
//!
//! Values are `Σ cᵢ · k(δᵀ gᵢ δ, εᵢ)` with `δ = x − positionᵢ`. Reads take
//! `&self`; derived structures (spatial index, vectorized snapshot, total
//! energy) are built lazily on first use and dropped by every mutation.

use std::fmt;
use std::sync::OnceLock;

use log::debug;
use num_complex::Complex32;

use crate::arena::Arena;
use crate::cache::{CacheStats, DistanceCache, PointKey};
use crate::center::Center;
use crate::config::{Approximation, FieldConfig};
use crate::error::{FieldError, FieldResult};
use crate::kernel::Kernel;
use crate::metric::Metric;
use crate::observer::{FieldEvent, FieldObserver};
use crate::point::Point;
use crate::slice::{Projection, Slice};
use crate::spatial::{IndexStats, Neighbor, SpatialIndex};
use crate::vectorized::VectorizedEvaluator;

/// Dimension of fields built by [`Field::with_capacity`].
pub const DEFAULT_DIMENSION: usize = 6;

/// Temporal dimension of a fresh field.
pub const INITIAL_TEMPORAL_DIMENSION: f32 = 1.5;

/// A capacity-bounded set of centers on an adaptive manifold.
pub struct Field {
    config: FieldConfig,

    /// Centers in insertion order. Never exceeds `config.capacity`.
    centers: Vec<Center>,

    /// Reduced 2-D mirror of `centers`.
    slice: Slice,

    temporal_dimension: f32,

    /// Accumulated simulation time.
    time: f64,

    energy: OnceLock<f32>,
    index: OnceLock<SpatialIndex>,
    vectorized: OnceLock<VectorizedEvaluator>,

    distance_cache: DistanceCache,

    /// Per-step staging for evolution, sized from the live center count.
    pub(crate) scratch: Arena<f32>,

    observers: Vec<Box<dyn FieldObserver>>,
}

impl Field {
    /// Create an empty 6-D field with default settings.
    pub fn with_capacity(capacity: usize, fractal_dimension: f32) -> FieldResult<Self> {
        Self::new(FieldConfig::new(
            DEFAULT_DIMENSION,
            capacity,
            fractal_dimension,
        ))
    }

    /// Create an empty field from a full configuration.
    pub fn new(config: FieldConfig) -> FieldResult<Self> {
        config.validate()?;
        let dims = config.dimension;

        Ok(Self {
            slice: Slice::new(Projection::xy(dims)),
            centers: Vec::new(),
            temporal_dimension: INITIAL_TEMPORAL_DIMENSION,
            time: 0.0,
            energy: OnceLock::new(),
            index: OnceLock::new(),
            vectorized: OnceLock::new(),
            distance_cache: DistanceCache::new(config.cache_capacity),
            scratch: Arena::with_capacity(0),
            observers: Vec::new(),
            config,
        })
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Append a center with an identity metric. Returns its index.
    pub fn add_center(
        &mut self,
        point: Point,
        coefficient: Complex32,
        epsilon: f32,
    ) -> FieldResult<usize> {
        let metric = Metric::identity(self.dimension());
        self.add_center_with_metric(point, coefficient, epsilon, metric)
    }

    /// Append a center with its own local metric.
    pub fn add_center_with_metric(
        &mut self,
        point: Point,
        coefficient: Complex32,
        epsilon: f32,
        metric: Metric,
    ) -> FieldResult<usize> {
        self.check_point(&point)?;
        if !coefficient.re.is_finite() || !coefficient.im.is_finite() {
            return Err(FieldError::InvalidArgument(format!(
                "coefficient must be finite, got {coefficient}"
            )));
        }
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(FieldError::InvalidArgument(format!(
                "epsilon must be > 0, got {epsilon}"
            )));
        }
        if metric.dims() != self.dimension() || !metric.validate() {
            return Err(FieldError::InvalidArgument(
                "center metric must match the field dimension and be positive-definite"
                    .to_string(),
            ));
        }
        self.push_center(Center::with_metric(point, coefficient, epsilon, metric))
    }

    /// Capacity check and bookkeeping shared by insertion and state loading.
    pub(crate) fn push_center(&mut self, center: Center) -> FieldResult<usize> {
        if self.centers.len() >= self.config.capacity {
            return Err(FieldError::CapacityExhausted {
                capacity: self.config.capacity,
            });
        }
        self.centers.push(center);
        let index = self.centers.len() - 1;

        self.invalidate_structure();
        debug!("center {index} added ({} / {})", self.centers.len(), self.config.capacity);
        self.notify(FieldEvent::CenterAdded {
            index,
            num_centers: self.centers.len(),
        });
        Ok(index)
    }

    /// Remove the center at `index`, shifting later centers down.
    pub fn remove_center(&mut self, index: usize) -> FieldResult<Center> {
        if index >= self.centers.len() {
            return Err(FieldError::IndexOutOfRange {
                index,
                len: self.centers.len(),
            });
        }
        let removed = self.centers.remove(index);

        self.invalidate_structure();
        debug!("center {index} removed ({} left)", self.centers.len());
        self.notify(FieldEvent::CenterRemoved {
            index,
            num_centers: self.centers.len(),
        });
        Ok(removed)
    }

    /// Register an observer for field events.
    pub fn subscribe(&mut self, observer: impl FieldObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub(crate) fn notify(&self, event: FieldEvent) {
        for observer in &self.observers {
            observer.on_event(event.clone());
        }
    }

    /// Drop values derived from coefficients or metrics.
    pub(crate) fn invalidate_values(&mut self) {
        self.energy.take();
        self.vectorized.take();
        self.distance_cache.clear();
        if self.slice.projection().auto_update {
            self.slice.rebuild(&self.centers);
        }
    }

    /// Drop everything derived from the center set.
    fn invalidate_structure(&mut self) {
        self.index.take();
        self.invalidate_values();
    }

    pub(crate) fn centers_mut(&mut self) -> &mut [Center] {
        &mut self.centers
    }

    pub(crate) fn advance_time(&mut self, dt: f32) {
        self.time += dt as f64;
    }

    pub(crate) fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub(crate) fn set_temporal_dimension(&mut self, temporal_dimension: f32) {
        self.temporal_dimension = temporal_dimension;
    }

    // =========================================================================
    // EVALUATION
    // =========================================================================

    fn check_point(&self, point: &Point) -> FieldResult<()> {
        if point.dims() != self.dimension() {
            return Err(FieldError::InvalidArgument(format!(
                "point has dimension {}, field has {}",
                point.dims(),
                self.dimension()
            )));
        }
        if !point.is_finite() {
            return Err(FieldError::InvalidArgument(
                "point coordinates must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Centers selected by the approximation policy, or `None` for all.
    fn candidates(&self, point: &Point) -> Option<Vec<usize>> {
        match self.config.approximation {
            Approximation::KNearest { threshold, k } if self.centers.len() > threshold => Some(
                self.spatial_index()
                    .k_nearest(point, k)
                    .into_iter()
                    .map(|n| n.index)
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Field value at `point` under the configured [`Approximation`].
    pub fn evaluate(&self, point: &Point) -> FieldResult<Complex32> {
        self.check_point(point)?;
        match self.candidates(point) {
            Some(nearest) => {
                let kernel = self.kernel();
                Ok(nearest
                    .into_iter()
                    .map(|i| self.centers[i].contribution(kernel, point))
                    .sum())
            }
            None => Ok(self.sum_all(point)),
        }
    }

    /// Field value at `point` summed over every center.
    pub fn evaluate_exact(&self, point: &Point) -> FieldResult<Complex32> {
        self.check_point(point)?;
        Ok(self.sum_all(point))
    }

    fn sum_all(&self, point: &Point) -> Complex32 {
        if cfg!(feature = "simd") && self.kernel() == Kernel::Gaussian {
            return self.vectorized_snapshot().evaluate(point);
        }
        let kernel = self.kernel();
        self.centers
            .iter()
            .map(|c| c.contribution(kernel, point))
            .sum()
    }

    /// Like [`Field::evaluate`], memoizing squared geodesic distances.
    ///
    /// Always walks centers one by one so every distance goes through the
    /// cache.
    pub fn evaluate_cached(&mut self, point: &Point) -> FieldResult<Complex32> {
        self.check_point(point)?;
        let indices: Vec<usize> = self
            .candidates(point)
            .unwrap_or_else(|| (0..self.centers.len()).collect());

        let key = PointKey::of(point);
        let kernel = self.kernel();
        let mut sum = Complex32::new(0.0, 0.0);
        for i in indices {
            let center = &self.centers[i];
            let s = match self.distance_cache.get(&key, i) {
                Some(s) => s,
                None => {
                    let s = center.distance_sq(point);
                    self.distance_cache.put(key.clone(), i, s);
                    s
                }
            };
            sum += center.coefficient() * kernel.value(s, center.epsilon());
        }
        Ok(sum)
    }

    /// Total energy `Σᵢⱼ cᵢ·conj(cⱼ)·k(sᵢⱼ)`, cached until the next mutation.
    ///
    /// `sᵢⱼ = ½(δᵀgᵢδ + δᵀgⱼδ)` and the width is `√(εᵢεⱼ)`, so the pair
    /// matrix is Hermitian and the result real.
    pub fn compute_energy(&self) -> f32 {
        *self.energy.get_or_init(|| self.energy_uncached())
    }

    fn energy_uncached(&self) -> f32 {
        let kernel = self.kernel();
        let mut total = 0.0f64;

        for (i, a) in self.centers.iter().enumerate() {
            let peak = kernel.value(0.0, a.epsilon());
            total += (a.coefficient().norm_sqr() * peak) as f64;

            for b in &self.centers[i + 1..] {
                let delta = a.position().delta(b.position());
                let s = 0.5 * (a.metric().quadratic_form(&delta) + b.metric().quadratic_form(&delta));
                let width = (a.epsilon() * b.epsilon()).sqrt();
                let cross = (a.coefficient() * b.coefficient().conj()).re;
                total += 2.0 * (cross * kernel.value(s, width)) as f64;
            }
        }
        total as f32
    }

    /// True while the cached energy reflects the current state.
    pub fn energy_cache_valid(&self) -> bool {
        self.energy.get().is_some()
    }

    /// Analytic gradient, one complex component per axis.
    pub fn gradient(&self, point: &Point) -> FieldResult<Vec<Complex32>> {
        self.check_point(point)?;
        let kernel = self.kernel();
        let dims = self.dimension();
        let mut grad = vec![Complex32::new(0.0, 0.0); dims];
        let mut g_delta = vec![0.0; dims];

        for center in &self.centers {
            let delta = point.delta(center.position());
            center.metric().apply_into(&delta, &mut g_delta);
            let s: f32 = delta.iter().zip(&g_delta).map(|(d, gd)| d * gd).sum();
            let scale = center.coefficient() * (2.0 * kernel.d1(s, center.epsilon()));
            for (out, gd) in grad.iter_mut().zip(&g_delta) {
                *out += scale * *gd;
            }
        }
        Ok(grad)
    }

    /// Analytic Laplacian `Σ cᵢ (4k''|gδ|² + 2k' tr g)`.
    pub fn laplacian(&self, point: &Point) -> FieldResult<Complex32> {
        self.check_point(point)?;
        let kernel = self.kernel();
        let mut g_delta = vec![0.0; self.dimension()];
        let mut sum = Complex32::new(0.0, 0.0);

        for center in &self.centers {
            let delta = point.delta(center.position());
            center.metric().apply_into(&delta, &mut g_delta);
            let s: f32 = delta.iter().zip(&g_delta).map(|(d, gd)| d * gd).sum();
            let g_delta_sq: f32 = g_delta.iter().map(|v| v * v).sum();
            let eps = center.epsilon();
            let radial = 4.0 * kernel.d2(s, eps) * g_delta_sq
                + 2.0 * kernel.d1(s, eps) * center.metric().trace();
            sum += center.coefficient() * radial;
        }
        Ok(sum)
    }

    // =========================================================================
    // SPATIAL QUERIES
    // =========================================================================

    fn spatial_index(&self) -> &SpatialIndex {
        self.index.get_or_init(|| {
            debug!("rebuilding spatial index over {} centers", self.centers.len());
            SpatialIndex::build(self.centers.iter().map(Center::position))
        })
    }

    fn vectorized_snapshot(&self) -> &VectorizedEvaluator {
        self.vectorized
            .get_or_init(|| VectorizedEvaluator::from_centers(self.dimension(), &self.centers))
    }

    /// Up to `k` centers nearest to `point` in Euclidean distance.
    pub fn nearest_centers(&self, point: &Point, k: usize) -> FieldResult<Vec<Neighbor>> {
        self.check_point(point)?;
        Ok(self.spatial_index().k_nearest(point, k))
    }

    /// Every center within Euclidean `radius` of `point`.
    pub fn centers_within(&self, point: &Point, radius: f32) -> FieldResult<Vec<Neighbor>> {
        self.check_point(point)?;
        Ok(self.spatial_index().within_radius(point, radius))
    }

    // =========================================================================
    // SLICE
    // =========================================================================

    /// Choose the slice axes and the values of the hidden axes.
    pub fn configure_projection(
        &mut self,
        axis1: usize,
        axis2: usize,
        slice_coords: Vec<f32>,
    ) -> FieldResult<()> {
        let mut projection = Projection::new(self.dimension(), axis1, axis2, slice_coords)?;
        projection.auto_update = self.slice.projection().auto_update;
        self.slice.set_projection(projection);
        self.slice.rebuild(&self.centers);
        Ok(())
    }

    /// Toggle automatic slice refresh after mutations.
    pub fn set_slice_auto_update(&mut self, enabled: bool) {
        self.slice.projection_mut().auto_update = enabled;
        if enabled {
            self.slice.rebuild(&self.centers);
        }
    }

    /// Rebuild the slice from the current centers.
    pub fn refresh_slice(&mut self) {
        self.slice.rebuild(&self.centers);
    }

    /// Full-space point to slice coordinates.
    pub fn project(&self, point: &Point) -> FieldResult<Point> {
        self.check_point(point)?;
        Ok(self.slice.projection().project(point))
    }

    /// Slice coordinates to a full-space point.
    pub fn lift(&self, point: &Point) -> FieldResult<Point> {
        check_planar(point)?;
        Ok(self.slice.projection().lift(point))
    }

    /// Kernel sum over the slice at a 2-D point.
    pub fn evaluate_slice(&self, point: &Point) -> FieldResult<Complex32> {
        check_planar(point)?;
        Ok(self.slice.evaluate(self.kernel(), point))
    }

    // =========================================================================
    // METRICS
    // =========================================================================

    /// Get configuration.
    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn num_centers(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    pub fn centers(&self) -> &[Center] {
        &self.centers
    }

    pub fn center(&self, index: usize) -> Option<&Center> {
        self.centers.get(index)
    }

    pub fn kernel(&self) -> Kernel {
        self.config.kernel
    }

    /// Accumulated simulation time.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn fractal_dimension(&self) -> f32 {
        self.config.fractal_dimension
    }

    pub fn temporal_dimension(&self) -> f32 {
        self.temporal_dimension
    }

    pub fn slice(&self) -> &Slice {
        &self.slice
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.distance_cache.stats()
    }

    /// Shape of the spatial index, building it if needed.
    pub fn index_stats(&self) -> IndexStats {
        self.spatial_index().stats()
    }
}

fn check_planar(point: &Point) -> FieldResult<()> {
    if point.dims() != 2 || !point.is_finite() {
        return Err(FieldError::InvalidArgument(format!(
            "slice points must be finite and 2-D, got dimension {}",
            point.dims()
        )));
    }
    Ok(())
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("dimension", &self.config.dimension)
            .field("num_centers", &self.centers.len())
            .field("capacity", &self.config.capacity)
            .field("kernel", &self.config.kernel)
            .field("time", &self.time)
            .field("temporal_dimension", &self.temporal_dimension)
            .field("energy_cache_valid", &self.energy_cache_valid())
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::ChannelObserver;
    use approx::assert_relative_eq;
    use std::sync::mpsc;

    fn c(re: f32, im: f32) -> Complex32 {
        Complex32::new(re, im)
    }

    fn scattered(field: &mut Field, n: usize) {
        let dims = field.dimension();
        for i in 0..n {
            let coords = (0..dims)
                .map(|d| (((i * 31 + d * 17) % 97) as f32 / 97.0) * 2.0 - 1.0)
                .collect();
            field
                .add_center(Point::new(coords), c(1.0 / (1.0 + i as f32), 0.1), 0.3)
                .unwrap();
        }
    }

    #[test]
    fn test_new_field() {
        let field = Field::with_capacity(10, 2.5).unwrap();
        assert_eq!(field.dimension(), 6);
        assert_eq!(field.capacity(), 10);
        assert_eq!(field.num_centers(), 0);
        assert_eq!(field.time(), 0.0);
        assert_eq!(field.fractal_dimension(), 2.5);
        assert_eq!(field.temporal_dimension(), INITIAL_TEMPORAL_DIMENSION);
    }

    #[test]
    fn test_rejects_bad_construction() {
        assert!(matches!(
            Field::with_capacity(0, 2.5),
            Err(FieldError::InvalidArgument(_))
        ));
        assert!(Field::with_capacity(10, f32::NAN).is_err());
    }

    #[test]
    fn test_single_center_peak() {
        let mut field = Field::with_capacity(10, 2.5).unwrap();
        field.add_center(Point::zeros(6), c(1.0, 0.0), 0.1).unwrap();

        let at_origin = field.evaluate(&Point::zeros(6)).unwrap();
        assert_relative_eq!(at_origin.norm(), 1.0, epsilon = 1e-5);

        let far = field.evaluate(&Point::new(vec![5.0; 6])).unwrap();
        assert!(far.norm() < 1e-6);
    }

    #[test]
    fn test_capacity_exhaustion() {
        let mut field = Field::with_capacity(10, 2.5).unwrap();
        for i in 0..10 {
            let p = Point::zeros(6).with_coord(0, i as f32);
            field.add_center(p, c(1.0, 0.0), 0.2).unwrap();
        }
        let err = field
            .add_center(Point::zeros(6), c(1.0, 0.0), 0.2)
            .unwrap_err();

        assert!(matches!(err, FieldError::CapacityExhausted { capacity: 10 }));
        assert_eq!(field.num_centers(), 10);
    }

    #[test]
    fn test_add_rejects_invalid_input() {
        let mut field = Field::with_capacity(4, 2.5).unwrap();
        assert!(field.add_center(Point::zeros(3), c(1.0, 0.0), 0.1).is_err());
        assert!(field.add_center(Point::zeros(6), c(1.0, 0.0), 0.0).is_err());
        assert!(field.add_center(Point::zeros(6), c(f32::NAN, 0.0), 0.1).is_err());
        assert!(field
            .add_center(Point::zeros(6).with_coord(2, f32::INFINITY), c(1.0, 0.0), 0.1)
            .is_err());
        assert_eq!(field.num_centers(), 0);
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut field = Field::with_capacity(4, 2.5).unwrap();
        for i in 0..3 {
            field
                .add_center(Point::zeros(6).with_coord(0, i as f32), c(i as f32, 0.0), 0.2)
                .unwrap();
        }
        let removed = field.remove_center(1).unwrap();
        assert_eq!(removed.coefficient(), c(1.0, 0.0));
        assert_eq!(field.num_centers(), 2);
        assert_eq!(field.center(1).unwrap().coefficient(), c(2.0, 0.0));

        assert!(matches!(
            field.remove_center(5),
            Err(FieldError::IndexOutOfRange { index: 5, len: 2 })
        ));
    }

    #[test]
    fn test_energy_cached_and_invalidated() {
        let mut field = Field::with_capacity(8, 2.5).unwrap();
        scattered(&mut field, 5);

        assert!(!field.energy_cache_valid());
        let e1 = field.compute_energy();
        assert!(field.energy_cache_valid());
        assert_eq!(e1.to_bits(), field.compute_energy().to_bits());

        field.add_center(Point::zeros(6), c(0.5, 0.5), 0.2).unwrap();
        assert!(!field.energy_cache_valid());
    }

    #[test]
    fn test_single_center_energy() {
        let mut field = Field::with_capacity(2, 2.5).unwrap();
        field.add_center(Point::zeros(6), c(3.0, 4.0), 0.5).unwrap();
        // |c|² · k(0)
        assert_relative_eq!(field.compute_energy(), 25.0, epsilon = 1e-4);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let mut field = Field::new(FieldConfig::new(3, 8, 2.0)).unwrap();
        let mut metric = Metric::identity(3);
        metric.set(0, 1, 0.3);
        metric.set(2, 2, 1.5);
        field
            .add_center_with_metric(Point::new(vec![0.1, -0.2, 0.3]), c(1.0, -0.5), 0.6, metric)
            .unwrap();
        field.add_center(Point::new(vec![-0.4, 0.2, 0.0]), c(0.3, 0.2), 0.4).unwrap();

        let p = Point::new(vec![0.2, 0.1, -0.1]);
        let grad = field.gradient(&p).unwrap();
        let h = 1e-3;
        for axis in 0..3 {
            let plus = field.evaluate_exact(&p.with_coord(axis, p.get(axis) + h)).unwrap();
            let minus = field.evaluate_exact(&p.with_coord(axis, p.get(axis) - h)).unwrap();
            let fd = (plus - minus) / (2.0 * h);
            assert_relative_eq!(grad[axis].re, fd.re, epsilon = 1e-2);
            assert_relative_eq!(grad[axis].im, fd.im, epsilon = 1e-2);
        }
    }

    #[test]
    fn test_laplacian_of_gaussian_peak() {
        let mut field = Field::new(FieldConfig::new(2, 4, 2.0)).unwrap();
        field.add_center(Point::zeros(2), c(1.0, 0.0), 1.0).unwrap();

        // At the peak: 2 k'(0) tr g = 2 · (-1/2) · 2 = -2
        let lap = field.laplacian(&Point::zeros(2)).unwrap();
        assert_relative_eq!(lap.re, -2.0, epsilon = 1e-5);
        assert_relative_eq!(lap.im, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_knearest_with_large_k_equals_exact() {
        let config = FieldConfig::new(4, 64, 2.0)
            .with_approximation(Approximation::KNearest { threshold: 8, k: 64 });
        let mut field = Field::new(config).unwrap();
        scattered(&mut field, 40);

        let q = Point::new(vec![0.1, 0.2, -0.3, 0.4]);
        let approx = field.evaluate(&q).unwrap();
        let exact = field.evaluate_exact(&q).unwrap();
        assert_relative_eq!(approx.re, exact.re, max_relative = 1e-4);
        assert_relative_eq!(approx.im, exact.im, max_relative = 1e-4);
    }

    #[test]
    fn test_evaluate_cached_matches_and_hits() {
        let mut field = Field::with_capacity(32, 2.5).unwrap();
        scattered(&mut field, 20);
        let q = Point::new(vec![0.1; 6]);

        let exact = field.evaluate_exact(&q).unwrap();
        let first = field.evaluate_cached(&q).unwrap();
        let second = field.evaluate_cached(&q).unwrap();

        assert_relative_eq!(first.re, exact.re, max_relative = 1e-4);
        assert_eq!(first, second);
        let stats = field.cache_stats();
        assert_eq!(stats.misses, 20);
        assert_eq!(stats.hits, 20);
    }

    #[test]
    fn test_spatial_queries() {
        let mut field = Field::new(FieldConfig::new(2, 16, 2.0)).unwrap();
        for i in 0..4 {
            field
                .add_center(Point::new(vec![i as f32, 0.0]), c(1.0, 0.0), 0.5)
                .unwrap();
        }
        let nearest = field.nearest_centers(&Point::new(vec![2.2, 0.0]), 2).unwrap();
        assert_eq!(nearest[0].index, 2);
        assert_eq!(nearest[1].index, 3);

        let within = field.centers_within(&Point::zeros(2), 1.5).unwrap();
        assert_eq!(within.len(), 2);
        assert_eq!(field.index_stats().nodes, 4);

        // Index follows structural changes.
        field.remove_center(0).unwrap();
        assert_eq!(field.index_stats().nodes, 3);
    }

    #[test]
    fn test_slice_tracks_centers() {
        let mut field = Field::new(FieldConfig::new(4, 8, 2.0)).unwrap();
        field.configure_projection(2, 3, vec![0.0, 0.0]).unwrap();
        field
            .add_center(Point::new(vec![0.0, 0.0, 1.0, 2.0]), c(1.0, 0.0), 0.5)
            .unwrap();

        assert_eq!(field.slice().len(), 1);
        let v = field.evaluate_slice(&Point::new(vec![1.0, 2.0])).unwrap();
        assert_relative_eq!(v.re, 1.0, epsilon = 1e-6);

        let lifted = field.lift(&Point::new(vec![1.0, 2.0])).unwrap();
        assert_eq!(lifted.coords(), &[0.0, 0.0, 1.0, 2.0]);
        assert!(field.configure_projection(0, 0, vec![0.0, 0.0]).is_err());
    }

    #[test]
    fn test_slice_auto_update_off() {
        let mut field = Field::new(FieldConfig::new(3, 8, 2.0)).unwrap();
        field.set_slice_auto_update(false);
        field.add_center(Point::zeros(3), c(1.0, 0.0), 0.5).unwrap();
        assert!(field.slice().is_empty());

        field.refresh_slice();
        assert_eq!(field.slice().len(), 1);
    }

    #[test]
    fn test_observers_notified() {
        let (tx, rx) = mpsc::channel();
        let mut field = Field::with_capacity(4, 2.5).unwrap();
        field.subscribe(ChannelObserver::new(tx));

        field.add_center(Point::zeros(6), c(1.0, 0.0), 0.2).unwrap();
        field.remove_center(0).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            FieldEvent::CenterAdded {
                index: 0,
                num_centers: 1
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            FieldEvent::CenterRemoved {
                index: 0,
                num_centers: 0
            }
        );
    }

    #[test]
    fn test_field_is_sync() {
        fn assert_sync<T: Sync + Send>() {}
        assert_sync::<Field>();
    }
}
