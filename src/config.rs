//! Field and evolution configuration

use crate::error::{FieldError, FieldResult};
use crate::kernel::Kernel;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How [`Field::evaluate`](crate::Field::evaluate) trades accuracy for speed.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Approximation {
    /// Always sum every center.
    Exact,
    /// Above `threshold` centers, sum only the `k` Euclidean-nearest.
    ///
    /// The KD-tree ranks by Euclidean distance while kernels use each
    /// center's own metric, so strongly anisotropic metrics can push a
    /// relevant center out of the top `k`.
    KNearest { threshold: usize, k: usize },
}

impl Default for Approximation {
    fn default() -> Self {
        Approximation::KNearest {
            threshold: 512,
            k: 64,
        }
    }
}

/// Configuration for a field.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldConfig {
    /// Dimension of the full manifold.
    pub dimension: usize,

    /// Maximum number of centers. Never grows.
    pub capacity: usize,

    /// Fractal dimension of the field.
    pub fractal_dimension: f32,

    /// Kernel family shared by every center.
    pub kernel: Kernel,

    /// Evaluation policy.
    pub approximation: Approximation,

    /// Distance cache entries (0 disables caching).
    pub cache_capacity: usize,
}

impl FieldConfig {
    /// Create a standard configuration.
    pub fn new(dimension: usize, capacity: usize, fractal_dimension: f32) -> Self {
        Self {
            dimension,
            capacity,
            fractal_dimension,
            ..Self::default()
        }
    }

    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_approximation(mut self, approximation: Approximation) -> Self {
        self.approximation = approximation;
        self
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> FieldResult<()> {
        if self.dimension < 2 {
            return Err(FieldError::InvalidArgument(format!(
                "dimension must be >= 2, got {}",
                self.dimension
            )));
        }
        if self.capacity == 0 {
            return Err(FieldError::InvalidArgument(
                "capacity must be > 0".to_string(),
            ));
        }
        if !self.fractal_dimension.is_finite() {
            return Err(FieldError::InvalidArgument(format!(
                "fractal_dimension must be finite, got {}",
                self.fractal_dimension
            )));
        }
        if let Approximation::KNearest { k, .. } = self.approximation {
            if k == 0 {
                return Err(FieldError::InvalidArgument(
                    "k-nearest approximation needs k > 0".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Load from JSON string.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> FieldResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| FieldError::InvalidArgument(format!("JSON parse error: {e}")))
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            dimension: 6,
            capacity: 1024,
            fractal_dimension: 2.5,
            kernel: Kernel::Gaussian,
            approximation: Approximation::default(),
            cache_capacity: 4096,
        }
    }
}

/// Constants of the coupled evolution rule
///
/// ```text
/// dΦ/dt = D·ΔΦ − α·Φ·|Φ|² + γ·C(Φ)
/// dg/dt = ρ·(g⁰ + α_m|Φ|²·δ − g) + κ·(T − ⟨T⟩·g)
/// ```
///
/// None of these are derived; they are tuning knobs.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EvolutionParams {
    /// Diffusion coefficient `D`.
    pub diffusion: f32,

    /// Cubic damping `α`.
    pub nonlinearity: f32,

    /// Non-local coupling strength `γ`.
    pub coupling: f32,

    /// Width of the coupling kernel.
    pub coupling_width: f32,

    /// Field-to-metric coupling `α_m` in `g⁰ + α_m|Φ|²·δ`.
    pub metric_coupling: f32,

    /// Energy-momentum relaxation `κ`.
    pub metric_relaxation: f32,

    /// Rate `ρ` at which the metric follows its field-dependent target.
    pub metric_adaptation_rate: f32,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            diffusion: 0.08,
            nonlinearity: 0.01,
            coupling: 0.02,
            coupling_width: 0.5,
            metric_coupling: 0.1,
            metric_relaxation: 0.01,
            metric_adaptation_rate: 1.0,
        }
    }
}

impl EvolutionParams {
    /// Parameters that leave the metric untouched.
    pub fn fixed_metric(mut self) -> Self {
        self.metric_coupling = 0.0;
        self.metric_relaxation = 0.0;
        self.metric_adaptation_rate = 0.0;
        self
    }

    /// Validate parameters.
    pub fn validate(&self) -> FieldResult<()> {
        let named = [
            ("diffusion", self.diffusion),
            ("nonlinearity", self.nonlinearity),
            ("coupling", self.coupling),
            ("metric_coupling", self.metric_coupling),
            ("metric_relaxation", self.metric_relaxation),
            ("metric_adaptation_rate", self.metric_adaptation_rate),
        ];
        for (name, value) in named {
            if !value.is_finite() {
                return Err(FieldError::InvalidArgument(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        if self.diffusion < 0.0 {
            return Err(FieldError::InvalidArgument(format!(
                "diffusion must be >= 0, got {}",
                self.diffusion
            )));
        }
        if !self.coupling_width.is_finite() || self.coupling_width <= 0.0 {
            return Err(FieldError::InvalidArgument(format!(
                "coupling_width must be > 0, got {}",
                self.coupling_width
            )));
        }
        Ok(())
    }

    /// Load from JSON string.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> FieldResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| FieldError::InvalidArgument(format!("JSON parse error: {e}")))
    }
}
