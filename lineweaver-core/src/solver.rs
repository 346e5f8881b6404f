//! # Least-Squares Solver
//!
//! Bounded Levenberg-Marquardt minimisation over the varying entries of a
//! [`Parameters`] container. The Jacobian is taken by forward differences and
//! each damped normal-equation system is solved with faer's partial-pivoting
//! LU factorisation. Bounds are enforced by projecting every trial step back
//! into `[min, max]`.

use faer::linalg::solvers::Solve;
use faer::{Col, Mat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::error::{AnnotatorError, Result};
use crate::params::Parameters;

const SINGULAR_PIVOT_EPSILON: f64 = 1.0e-300;
const INITIAL_DAMPING: f64 = 1.0e-3;
const MAX_DAMPING: f64 = 1.0e12;
const DIFF_STEP: f64 = 1.0e-7;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("matrix is singular at pivot index {pivot_index}")]
    SingularMatrix { pivot_index: usize },
    #[error("right-hand side length mismatch: expected {expected}, got {actual}")]
    RhsLengthMismatch { expected: usize, actual: usize },
}

/// Iteration limits of the minimiser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub max_iterations: usize,
    /// Relative decrease of chi-square below which the fit counts as converged.
    pub tolerance: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1.0e-10,
        }
    }
}

/// Outcome of one minimisation.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub params: Parameters,
    pub chi_square: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimises the sum of squared residuals returned by `residuals`, starting
/// from `start` and adjusting only parameters flagged `vary`.
pub fn levenberg_marquardt<F>(residuals: F, start: &Parameters, options: &SolverOptions) -> Result<Minimum>
where
    F: Fn(&Parameters) -> Result<Vec<f64>>,
{
    let names: Vec<String> = start.varying().map(|p| p.name.clone()).collect();
    if names.is_empty() {
        return Err(AnnotatorError::Fit("no varying parameters".to_string()));
    }

    let mut current = start.clone();
    let mut r = residuals(&current)?;
    let mut cost = sum_of_squares(&r);
    if !cost.is_finite() {
        return Err(AnnotatorError::Fit(
            "model is not finite at the starting parameters".to_string(),
        ));
    }

    let n = names.len();
    let mut damping = INITIAL_DAMPING;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < options.max_iterations {
        iterations += 1;
        let jacobian = forward_jacobian(&residuals, &current, &names, &r)?;
        let (normal, gradient) = normal_equations(&jacobian, &r);

        let mut accepted = None;
        while damping < MAX_DAMPING {
            let mut damped = normal.clone();
            for j in 0..n {
                damped[(j, j)] += damping * normal[(j, j)].max(1.0e-12);
            }
            let rhs: Vec<f64> = (0..n).map(|j| -gradient[j]).collect();
            let Ok(step) = lu_solve(&damped, &rhs) else {
                damping *= 10.0;
                continue;
            };

            let mut trial = current.clone();
            for (name, delta) in names.iter().zip(&step) {
                if let Some(p) = trial.get_mut(name) {
                    let moved = p.value + delta;
                    p.set_value(moved);
                }
            }
            match residuals(&trial) {
                Ok(trial_r) => {
                    let trial_cost = sum_of_squares(&trial_r);
                    if trial_cost.is_finite() && trial_cost < cost {
                        accepted = Some((trial, trial_r, trial_cost));
                        damping = (damping / 10.0).max(1.0e-12);
                        break;
                    }
                }
                Err(e) => trace!("Rejected trial step: {}", e),
            }
            damping *= 10.0;
        }

        let Some((trial, trial_r, trial_cost)) = accepted else {
            // No downhill step at any damping: a (possibly bounded) minimum.
            converged = true;
            break;
        };
        let decrease = cost - trial_cost;
        current = trial;
        r = trial_r;
        cost = trial_cost;
        trace!("LM iteration {}: chi-square {:.6e}", iterations, cost);

        if decrease <= options.tolerance * cost.max(f64::MIN_POSITIVE) {
            converged = true;
            break;
        }
    }

    Ok(Minimum {
        params: current,
        chi_square: cost,
        iterations,
        converged,
    })
}

fn sum_of_squares(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

fn forward_jacobian<F>(residuals: &F, at: &Parameters, names: &[String], r0: &[f64]) -> Result<Mat<f64>>
where
    F: Fn(&Parameters) -> Result<Vec<f64>>,
{
    let mut jacobian = Mat::<f64>::zeros(r0.len(), names.len());
    for (col, name) in names.iter().enumerate() {
        let Some(param) = at.get(name) else {
            continue;
        };
        let mut h = DIFF_STEP * param.value.abs().max(1.0e-3);
        // Step away from an upper bound instead of across it.
        if param.max.is_some_and(|hi| param.value + h > hi) {
            h = -h;
        }
        let mut shifted = at.clone();
        if let Some(p) = shifted.get_mut(name) {
            p.value += h;
        }
        let r1 = residuals(&shifted)?;
        for (row, (a, b)) in r1.iter().zip(r0).enumerate() {
            let d = (a - b) / h;
            jacobian[(row, col)] = if d.is_finite() { d } else { 0.0 };
        }
    }
    Ok(jacobian)
}

/// Returns (J^T J, J^T r).
fn normal_equations(jacobian: &Mat<f64>, r: &[f64]) -> (Mat<f64>, Col<f64>) {
    let residual = Col::from_fn(r.len(), |i| r[i]);
    (jacobian.transpose() * jacobian, jacobian.transpose() * &residual)
}

/// Solves `matrix * x = rhs` for a square `matrix`.
pub fn lu_solve(matrix: &Mat<f64>, rhs: &[f64]) -> std::result::Result<Vec<f64>, SolveError> {
    let dimension = matrix.nrows();
    if rhs.len() != dimension {
        return Err(SolveError::RhsLengthMismatch {
            expected: dimension,
            actual: rhs.len(),
        });
    }
    let lu = matrix.partial_piv_lu();
    let upper = lu.U();
    if let Some(pivot_index) = (0..dimension).find(|&i| {
        let pivot = upper[(i, i)];
        pivot.abs() <= SINGULAR_PIVOT_EPSILON || !pivot.is_finite()
    }) {
        return Err(SolveError::SingularMatrix { pivot_index });
    }

    let solution = lu.solve(&Col::from_fn(dimension, |i| rhs[i]));
    let solution: Vec<f64> = (0..dimension).map(|i| solution[i]).collect();
    if solution.iter().any(|v| !v.is_finite()) {
        return Err(SolveError::SingularMatrix { pivot_index: dimension.saturating_sub(1) });
    }
    Ok(solution)
}
