//! Outer correction passes around assembly and solve.
//!
//! A pass resets patch states, reassembles, re-solves and optionally
//! under-relaxes the field. The loop runs a bounded number of passes and can
//! stop early once the first-pass initial residual of a time step falls below
//! a threshold.

use crate::field::Field;
use crate::solvers::SolverReport;
use crate::types::{FieldValue, Scalar};
use serde::{Deserialize, Serialize};

/// Serde view of the loop settings (`nCorrectors`, `residualControl`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CorrectionControls {
    #[serde(default = "one")]
    pub n_correctors: usize,
    #[serde(default)]
    pub residual_control: Option<Scalar>,
}

fn one() -> usize {
    1
}

impl Default for CorrectionControls {
    fn default() -> Self {
        Self {
            n_correctors: 1,
            residual_control: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CorrectionLoop {
    n_correctors: usize,
    residual_control: Option<Scalar>,
    pass: usize,
    first_pass_residual: Option<Scalar>,
}

impl CorrectionLoop {
    pub fn new(n_correctors: usize) -> Self {
        Self {
            n_correctors,
            residual_control: None,
            pass: 0,
            first_pass_residual: None,
        }
    }

    pub fn from_controls(controls: &CorrectionControls) -> Self {
        let mut l = Self::new(controls.n_correctors);
        l.residual_control = controls.residual_control;
        l
    }

    /// Stop once the first-pass initial residual is below `threshold`.
    pub fn with_residual_control(mut self, threshold: Scalar) -> Self {
        self.residual_control = Some(threshold);
        self
    }

    /// 1-based index of the current pass; 0 before the first.
    pub fn pass(&self) -> usize {
        self.pass
    }

    pub fn is_first_pass(&self) -> bool {
        self.pass == 1
    }

    /// True on the last pass the loop will allow.
    pub fn is_final_pass(&self) -> bool {
        self.pass >= self.n_correctors
    }

    /// Whether the residual control threshold has been met.
    pub fn residual_converged(&self) -> bool {
        matches!(
            (self.residual_control, self.first_pass_residual),
            (Some(limit), Some(r)) if r < limit
        )
    }

    /// Advance to the next pass; `false` when the loop is done.
    pub fn next_pass(&mut self) -> bool {
        if self.pass >= self.n_correctors {
            return false;
        }
        if self.pass > 0 && self.residual_converged() {
            log::info!(
                "correction loop: residual control satisfied after {} pass(es)",
                self.pass
            );
            return false;
        }
        self.pass += 1;
        log::debug!("correction pass {} of {}", self.pass, self.n_correctors);
        true
    }

    /// Reset every patch of `field` to stale at the start of a pass.
    pub fn begin_pass<T: FieldValue>(&self, field: &mut Field<T>) {
        field.reset_boundary_states();
    }

    /// Track the first-pass initial residual for residual control.
    pub fn record(&mut self, report: &SolverReport) {
        if self.is_first_pass() {
            let r = self
                .first_pass_residual
                .map_or(report.initial_residual, |r| r.max(report.initial_residual));
            self.first_pass_residual = Some(r);
        }
    }

    /// Start over for the next time step.
    pub fn reset(&mut self) {
        self.pass = 0;
        self.first_pass_residual = None;
    }
}
