//! Manifold Field - radial-basis field on an adaptive Riemannian manifold
//!
//! A field is a superposition of weighted kernels. Every center carries its
//! own metric tensor, so distance (and therefore influence) bends locally.
//! Evolution updates coefficients and metrics together.
//!
//! # Core Types
//!
//! - **Field**: capacity-bounded set of centers with cached energy
//! - **Center**: position + complex coefficient + width + local metric
//! - **Metric**: symmetric positive-definite tensor with cached inverse
//!
//! # Architecture: Producers / Field / Consumers
//!
//! 1. **Producers** - anything that supplies `(point, coefficient, epsilon)`
//! 2. **Field** - the substrate: evaluation, energy, derivatives, evolution
//! 3. **Consumers** - read values, or subscribe as FieldObservers
//!
//! # Core Concepts
//!
//! - **Fixed capacity**: the center set never grows past its bound
//! - **Geodesic kernels**: `k(δᵀ g δ)` with each center's own `g`
//! - **Lazy derived state**: spatial index, vectorized snapshot and energy are
//!   rebuilt on first read after a mutation
//! - **End-to-infinite**: state persists to disk and resumes exactly
//!
//! # Performance Layer
//!
//! - [`SpatialIndex`]: KD-tree for k-nearest pruning
//! - [`DistanceCache`]: LRU memo for repeated queries
//! - [`Arena`]: per-step staging with generation-checked handles
//! - [`VectorizedEvaluator`]: 8-lane Gaussian sums (`simd` feature)
//!
//! # Example
//!
//! ```rust
//! use manifold_field::{Field, EvolutionParams, FieldEvent, FnObserver, Point};
//! use num_complex::Complex32;
//!
//! // 1. Create the Field (6-D, room for 10 centers, fractal dimension 2.5)
//! let mut field = Field::with_capacity(10, 2.5).unwrap();
//!
//! // 2. Subscribe a consumer
//! field.subscribe(FnObserver(|event| {
//!     if let FieldEvent::Degenerate { index, .. } = event {
//!         eprintln!("center {index} froze");
//!     }
//! }));
//!
//! // 3. Producers add centers
//! field.add_center(Point::zeros(6), Complex32::new(1.0, 0.0), 0.1).unwrap();
//!
//! // 4. Consumers read
//! let value = field.evaluate(&Point::zeros(6)).unwrap();
//! assert!((value.norm() - 1.0).abs() < 1e-5);
//!
//! // 5. Time advances - coefficients and metrics evolve together
//! let report = field.evolve_step(&EvolutionParams::default(), 0.001).unwrap();
//! assert!(report.degenerate.is_empty());
//! ```

mod arena;
mod cache;
mod center;
mod config;
mod error;
mod evolution;
mod field;
mod kernel;
mod metric;
mod observer;
mod persistence;
mod point;
mod slice;
mod spatial;
mod vectorized;

pub use arena::{Arena, ArenaStats, BlockId};
pub use cache::{CacheStats, DistanceCache, PointKey};
pub use center::Center;
pub use config::{Approximation, EvolutionParams, FieldConfig};
pub use error::{FieldError, FieldResult};
pub use evolution::{temporal_dimension_from_energy, StepReport};
pub use field::{Field, DEFAULT_DIMENSION, INITIAL_TEMPORAL_DIMENSION};
pub use kernel::Kernel;
pub use metric::{Metric, DEGENERACY_EPSILON, SYMMETRY_TOLERANCE};
pub use observer::{ChannelObserver, FieldEvent, FieldObserver, FnObserver};
pub use persistence::{
    crc32, load_state, save_state, verify_state_file, StateHeader, HEADER_LEN,
    MAX_STATE_CAPACITY, MAX_STATE_DIMENSION, MAX_STATE_FILE_SIZE, STATE_MAGIC, STATE_VERSION,
};
pub use point::Point;
pub use slice::{Projection, Slice};
pub use spatial::{IndexStats, Neighbor, SpatialIndex};
pub use vectorized::{VectorizedEvaluator, LANES};
