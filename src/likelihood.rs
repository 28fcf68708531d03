//! Built-in di-tau mass estimator.
//!
//! Each tau is approximated as collinear with its visible decay products,
//! `p_tau = p_vis / x`, with `x` the visible energy fraction. The negative log
//! likelihood over `(x1, x2)` is
//!
//! ```text
//! NLL = 0.5 * r^T V^-1 r + kappa * ln(m_tautau)
//! ```
//!
//! where `r` is the difference between the measured MET and the summed
//! neutrino transverse momentum and `V` is the MET covariance. The most
//! probable point is found with Nelder-Mead; the mass estimate and its
//! uncertainty are the likelihood-weighted mean and spread of `m_tautau` over
//! a grid in `(x1, x2)`.

use std::convert::Infallible;

use ganesh::prelude::*;
use ganesh::{
    algorithms::{NelderMead, NelderMeadOptions},
    core::Function,
};

use crate::error::KernelError;
use crate::kinematics::{FourVector, TAU_MASS};
use crate::transform::svfit::{DecayKind, DiTauInput, DiTauMassKernel, DiTauSolution};

const MIN_FRACTION: f64 = 1e-3;
const PENALTY: f64 = 1e30;

/// Grid likelihood scan with a Nelder-Mead search for the best point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LikelihoodScan {
    /// Grid points per visible-energy-fraction axis.
    pub grid_points: usize,
    pub max_steps: usize,
}

impl Default for LikelihoodScan {
    fn default() -> Self {
        Self {
            grid_points: 60,
            max_steps: 1000,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct ScanProblem {
    visible: [FourVector; 2],
    x_min: [f64; 2],
    met: [f64; 2],
    inverse: [[f64; 2]; 2],
    kappa: f64,
}

impl ScanProblem {
    fn new(input: &DiTauInput, kappa: f64) -> Option<Self> {
        let [[c00, c01], [c10, c11]] = input.covariance;
        let det = c00 * c11 - c01 * c10;
        if !det.is_finite() || det <= 0.0 {
            return None;
        }
        let inverse = [[c11 / det, -c01 / det], [-c10 / det, c00 / det]];
        let x_min = input.leptons.map(|lepton| match lepton.kind {
            DecayKind::Hadronic => {
                let ratio = lepton.p4.mass().max(0.0) / TAU_MASS;
                (ratio * ratio).clamp(MIN_FRACTION, 0.999)
            }
            DecayKind::Electron | DecayKind::Muon => MIN_FRACTION,
        });
        Some(Self {
            visible: input.leptons.map(|lepton| lepton.p4),
            x_min,
            met: [input.met_x, input.met_y],
            inverse,
            kappa,
        })
    }

    /// Unbounded parameter to a fraction in `[x_min, 1]`.
    fn fraction(&self, i: usize, u: f64) -> f64 {
        let s = 1.0 / (1.0 + (-u).exp());
        self.x_min[i] + (1.0 - self.x_min[i]) * s
    }

    fn system(&self, x: [f64; 2]) -> FourVector {
        self.visible[0].scale(1.0 / x[0]) + self.visible[1].scale(1.0 / x[1])
    }

    fn nll(&self, x: [f64; 2]) -> f64 {
        let mut nu = [0.0; 2];
        for (vis, xi) in self.visible.iter().zip(x) {
            let weight = 1.0 / xi - 1.0;
            nu[0] += vis.px * weight;
            nu[1] += vis.py * weight;
        }
        let r = [self.met[0] - nu[0], self.met[1] - nu[1]];
        let chi2 = r[0] * (self.inverse[0][0] * r[0] + self.inverse[0][1] * r[1])
            + r[1] * (self.inverse[1][0] * r[0] + self.inverse[1][1] * r[1]);
        let mass = self.system(x).mass();
        if !(mass > 0.0) || !chi2.is_finite() {
            return PENALTY;
        }
        0.5 * chi2 + self.kappa * mass.ln()
    }

    fn best_fit(&self, max_steps: usize) -> Result<[f64; 2], Infallible> {
        let mut nm = NelderMead::new(
            *self,
            &[0.0, 0.0],
            Some(NelderMeadOptions::adaptive(2).simplex_size(0.5).build()),
        );
        nm.minimize(None, max_steps, |_| {})?;
        let (u, _) = nm.best();
        Ok([self.fraction(0, u[0]), self.fraction(1, u[1])])
    }
}

impl Function<f64, (), Infallible> for ScanProblem {
    fn evaluate(&self, u: &[f64], _args: Option<&()>) -> Result<f64, Infallible> {
        Ok(self.nll([self.fraction(0, u[0]), self.fraction(1, u[1])]))
    }
}

impl DiTauMassKernel for LikelihoodScan {
    fn solve(&self, input: &DiTauInput, kappa: f64) -> Result<Option<DiTauSolution>, KernelError> {
        let Some(problem) = ScanProblem::new(input, kappa) else {
            return Ok(None);
        };
        let best = match problem.best_fit(self.max_steps) {
            Ok(x) => x,
            Err(never) => match never {},
        };
        if problem.nll(best) >= PENALTY {
            return Ok(None);
        }

        let n = self.grid_points.max(2);
        let mut samples = Vec::with_capacity(n * n);
        let mut nll_min = f64::INFINITY;
        for i in 0..n {
            for j in 0..n {
                let x = [
                    grid_point(problem.x_min[0], i, n),
                    grid_point(problem.x_min[1], j, n),
                ];
                let nll = problem.nll(x);
                if nll < PENALTY {
                    nll_min = nll_min.min(nll);
                    samples.push((nll, problem.system(x)));
                }
            }
        }
        let (mut sum_w, mut sum_wm, mut sum_wm2) = (0.0, 0.0, 0.0);
        let mut sum_wp = FourVector::default();
        for (nll, system) in samples {
            let w = (nll_min - nll).exp();
            let mass = system.mass();
            sum_w += w;
            sum_wm += w * mass;
            sum_wm2 += w * mass * mass;
            sum_wp = sum_wp + system.scale(w);
        }
        if !(sum_w > 0.0) {
            return Ok(None);
        }
        let mass = sum_wm / sum_w;
        let mass_err = (sum_wm2 / sum_w - mass * mass).max(0.0).sqrt();
        let weighted = sum_wp.scale(1.0 / sum_w);
        let best = problem.system(best);
        if !mass.is_finite()
            || !mass_err.is_finite()
            || !best.mass().is_finite()
            || !weighted.pt().is_finite()
        {
            return Ok(None);
        }
        Ok(Some(DiTauSolution {
            best,
            weighted,
            mass,
            mass_err,
        }))
    }
}

/// Midpoint of grid cell `i` of `n` over `[x_min, 1]`.
fn grid_point(x_min: f64, i: usize, n: usize) -> f64 {
    x_min + (1.0 - x_min) * (i as f64 + 0.5) / n as f64
}
