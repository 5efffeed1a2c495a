//! Evolution - explicit coupled update of coefficients and metrics
//!
//! One step reads the whole pre-step state, stages every center's next
//! coefficient and metric in the field's scratch arena, then commits.
//! All updates scale with `dt`.

use log::{debug, warn};
use num_complex::Complex32;

use crate::arena::BlockId;
use crate::config::EvolutionParams;
use crate::error::{FieldError, FieldResult};
use crate::field::Field;
use crate::observer::FieldEvent;

/// Reference energy of the temporal dimension map.
const TEMPORAL_ENERGY_REF: f32 = 1.0;
/// Energy scale of the temporal dimension map.
const TEMPORAL_ENERGY_SCALE: f32 = 0.5;
/// Upper clamp; the temporal dimension stays below 2.
const TEMPORAL_DIMENSION_MAX: f32 = 1.999;

/// Coupling weights below this are treated as no neighbours.
const COUPLING_WEIGHT_FLOOR: f32 = 1e-10;

/// Outcome of one or more evolution steps.
#[derive(Clone, Debug, PartialEq)]
pub struct StepReport {
    /// Steps taken.
    pub steps: usize,
    /// Step size used for each step.
    pub dt: f32,
    /// Simulation time after the last step.
    pub time: f64,
    /// Centers that kept their pre-step state in at least one step.
    pub degenerate: Vec<usize>,
    /// Total energy after the last step.
    pub energy: f32,
    pub temporal_dimension: f32,
}

/// `τ = 1 + ½(1 + tanh((E − 1)/0.5))`, clamped to `[1, 1.999]`.
pub fn temporal_dimension_from_energy(energy: f32) -> f32 {
    let tau = 1.0 + 0.5 * (1.0 + ((energy - TEMPORAL_ENERGY_REF) / TEMPORAL_ENERGY_SCALE).tanh());
    if tau.is_nan() {
        return 1.0;
    }
    tau.clamp(1.0, TEMPORAL_DIMENSION_MAX)
}

/// Staged next state of one center.
struct Staged {
    block: BlockId,
    frozen: bool,
}

impl Field {
    /// Largest `dt` the explicit diffusion update is expected to tolerate.
    ///
    /// `min εᵢ² / (2·D·n)`, tightened by `1 / (1 + log2(1 + N))` for density.
    /// Infinite when there is no diffusion or no center.
    pub fn stability_bound(&self, params: &EvolutionParams) -> f32 {
        if params.diffusion <= 0.0 || self.is_empty() {
            return f32::INFINITY;
        }
        let min_eps_sq = self
            .centers()
            .iter()
            .map(|c| c.epsilon() * c.epsilon())
            .fold(f32::INFINITY, f32::min);
        let density = 1.0 + (1.0 + self.num_centers() as f32).log2();
        min_eps_sq / (2.0 * params.diffusion * self.dimension() as f32) / density
    }

    /// Advance every center by `dt`.
    ///
    /// ```text
    /// dΦ/dt = D·ΔΦ − α·Φ·|Φ|² + γ·C(Φ)
    /// dg/dt = ρ·(g⁰ + α_m|Φ|²·δ − g) + κ·(T − ⟨T⟩·g)
    /// ```
    ///
    /// A center whose metric is or would become degenerate, or whose next
    /// coefficient is not finite, keeps its old state and is listed in
    /// [`StepReport::degenerate`].
    pub fn evolve_step(&mut self, params: &EvolutionParams, dt: f32) -> FieldResult<StepReport> {
        params.validate()?;
        if !dt.is_finite() || dt < 0.0 {
            return Err(FieldError::InvalidArgument(format!(
                "dt must be finite and >= 0, got {dt}"
            )));
        }
        let bound = self.stability_bound(params);
        if dt > bound {
            warn!("dt {dt} exceeds stability bound {bound}; step may diverge");
        }

        let staged = self.stage(params, dt)?;
        let degenerate = self.commit(&staged);

        self.advance_time(dt);
        self.invalidate_values();
        let energy = self.compute_energy();
        let temporal_dimension = temporal_dimension_from_energy(energy);
        self.set_temporal_dimension(temporal_dimension);

        for &index in &degenerate {
            warn!("center {index} degenerate at t = {}; state kept", self.time());
            self.notify(FieldEvent::Degenerate {
                index,
                time: self.time(),
            });
        }
        self.notify(FieldEvent::Evolved {
            time: self.time(),
            dt,
            degenerate: degenerate.len(),
        });
        debug!("evolved to t = {} (E = {energy}, tau = {temporal_dimension})", self.time());

        Ok(StepReport {
            steps: 1,
            dt,
            time: self.time(),
            degenerate,
            energy,
            temporal_dimension,
        })
    }

    /// Run `steps` evolution steps of size `dt`.
    pub fn evolve(
        &mut self,
        params: &EvolutionParams,
        dt: f32,
        steps: usize,
    ) -> FieldResult<StepReport> {
        let mut report = StepReport {
            steps: 0,
            dt,
            time: self.time(),
            degenerate: Vec::new(),
            energy: self.compute_energy(),
            temporal_dimension: self.temporal_dimension(),
        };
        for _ in 0..steps {
            let step = self.evolve_step(params, dt)?;
            report.steps += 1;
            report.time = step.time;
            report.energy = step.energy;
            report.temporal_dimension = step.temporal_dimension;
            report.degenerate.extend(step.degenerate);
        }
        report.degenerate.sort_unstable();
        report.degenerate.dedup();
        Ok(report)
    }

    // =========================================================================
    // STAGING
    // =========================================================================

    /// Compute every center's next state from the pre-step field.
    fn stage(&mut self, params: &EvolutionParams, dt: f32) -> FieldResult<Vec<Staged>> {
        let dims = self.dimension();
        let count = self.num_centers();
        // Staged coefficient (2) and metric (dims²) per center.
        let per_center = dims * dims + 2;
        let needed = count
            .checked_mul(per_center)
            .ok_or(FieldError::CapacityExhausted { capacity: count })?;
        self.scratch.reset();
        self.scratch.reserve(needed)?;

        let mut staged = Vec::with_capacity(count);
        let mut next_g = vec![0.0f32; dims * dims];

        for i in 0..count {
            let block = self.scratch.allocate(per_center)?;
            let center = &self.centers()[i];

            if !center.metric().validate() {
                staged.push(Staged { block, frozen: true });
                continue;
            }

            let position = center.position().clone();
            let phi = self.evaluate_exact(&position)?;
            let laplacian = self.laplacian(&position)?;
            let coupling = self.coupling_at(i, params.coupling_width);

            let dphi = laplacian * params.diffusion
                - phi * (phi.norm_sqr() * params.nonlinearity)
                + coupling * params.coupling;
            let coefficient = self.centers()[i].coefficient() + dphi * dt;

            let gradient = self.gradient(&position)?;
            self.next_metric(i, &gradient, phi.norm_sqr(), params, dt, &mut next_g);

            let frozen = !coefficient.re.is_finite()
                || !coefficient.im.is_finite()
                || next_g.iter().any(|v| !v.is_finite());

            if let Some(slot) = self.scratch.get_mut(block) {
                slot[0] = coefficient.re;
                slot[1] = coefficient.im;
                slot[2..].copy_from_slice(&next_g);
            }
            staged.push(Staged { block, frozen });
        }
        Ok(staged)
    }

    /// `g + dt·[ρ·(target − g) + κ·(T − ⟨T⟩·g)]` for center `i`.
    fn next_metric(
        &self,
        i: usize,
        gradient: &[Complex32],
        phi_sq: f32,
        params: &EvolutionParams,
        dt: f32,
        out: &mut [f32],
    ) {
        let dims = self.dimension();
        let metric = self.centers()[i].metric();

        // T_ab = Re(∂_a Φ* ∂_b Φ + ∂_b Φ* ∂_a Φ) = 2 Re(∂_a Φ* ∂_b Φ)
        let stress = |a: usize, b: usize| 2.0 * (gradient[a].conj() * gradient[b]).re;
        let mean_stress = (0..dims).map(|a| stress(a, a)).sum::<f32>() / dims as f32;
        let target_diag = 1.0 + params.metric_coupling * phi_sq;

        for a in 0..dims {
            for b in 0..dims {
                let g = metric.get(a, b);
                let target = if a == b { target_diag } else { 0.0 };
                let relax = params.metric_adaptation_rate * (target - g);
                let tension = params.metric_relaxation * (stress(a, b) - mean_stress * g);
                out[a * dims + b] = g + dt * (relax + tension);
            }
        }
    }

    /// Gaussian-weighted mean of the other centers' coefficients.
    fn coupling_at(&self, i: usize, width: f32) -> Complex32 {
        let centers = self.centers();
        let origin = centers[i].position();
        let two_sigma_sq = 2.0 * width * width;

        let mut sum = Complex32::new(0.0, 0.0);
        let mut total = 0.0f32;
        for (j, other) in centers.iter().enumerate() {
            if j == i {
                continue;
            }
            let w = (-origin.euclidean_distance_sq(other.position()) / two_sigma_sq).exp();
            sum += other.coefficient() * w;
            total += w;
        }
        if total > COUPLING_WEIGHT_FLOOR {
            sum / total
        } else {
            Complex32::new(0.0, 0.0)
        }
    }

    // =========================================================================
    // COMMIT
    // =========================================================================

    /// Apply staged states. Returns the indices that kept their old state.
    fn commit(&mut self, staged: &[Staged]) -> Vec<usize> {
        let mut degenerate = Vec::new();

        for (i, entry) in staged.iter().enumerate() {
            let Some(slot) = self.scratch.get(entry.block).map(<[f32]>::to_vec) else {
                degenerate.push(i);
                continue;
            };
            if entry.frozen {
                degenerate.push(i);
                continue;
            }

            let center = &mut self.centers_mut()[i];
            let previous = center.metric().clone();
            let metric = center.metric_mut();
            metric.set_components(&slot[2..]);
            metric.symmetrize();

            if !metric.validate() || metric.compute_inverse().is_err() {
                *metric = previous;
                degenerate.push(i);
                continue;
            }
            center.set_coefficient(Complex32::new(slot[0], slot[1]));
        }
        degenerate
    }
}
