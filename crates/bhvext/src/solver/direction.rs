//! Conjugate search directions on the Superbasic blocks.

use nalgebra::DVector;

use super::partition::{Rows, SidePartition};

/// Polak–Ribière state pooled over both sides.
#[derive(Clone, Debug)]
pub(crate) struct Conjugate {
    /// Steps taken since the last restart.
    pub counter: usize,
    prev_grad: [DVector<f64>; 2],
    prev_dir: [DVector<f64>; 2],
}

impl Conjugate {
    pub fn new() -> Self {
        Self {
            counter: 0,
            prev_grad: [DVector::zeros(0), DVector::zeros(0)],
            prev_dir: [DVector::zeros(0), DVector::zeros(0)],
        }
    }

    pub fn restart(&mut self) {
        self.counter = 0;
    }

    /// Superbasic directions for reduced gradients `g`. Steepest descent
    /// right after a restart, `ak·d_prev − g` otherwise.
    pub fn direction(&mut self, g: &[DVector<f64>; 2]) -> [DVector<f64>; 2] {
        let shapes_match = (0..2).all(|s| self.prev_grad[s].len() == g[s].len());
        let ak = if self.counter == 0 || !shapes_match {
            None
        } else {
            let denom: f64 = self.prev_grad.iter().map(|p| p.norm_squared()).sum();
            let num: f64 = (0..2).map(|s| g[s].dot(&(&g[s] - &self.prev_grad[s]))).sum();
            (denom > 0.0).then(|| num / denom)
        };
        let steepest = || [-&g[0], -&g[1]];
        let d = match ak {
            Some(ak) => {
                let d = [
                    &self.prev_dir[0] * ak - &g[0],
                    &self.prev_dir[1] * ak - &g[1],
                ];
                // Not a descent direction: fall back to steepest descent.
                let slope: f64 = (0..2).map(|s| d[s].dot(&g[s])).sum();
                if slope < 0.0 {
                    d
                } else {
                    steepest()
                }
            }
            None => steepest(),
        };
        self.prev_grad = g.clone();
        self.prev_dir = d.clone();
        d
    }
}

/// Full per-variable direction: Superbasic components as given, their
/// negatives credited to the row's Basic variable.
pub(crate) fn expand(rows: &Rows, part: &SidePartition, d_s: &DVector<f64>) -> DVector<f64> {
    let mut d = DVector::zeros(rows.n_vars());
    for (k, &s) in part.superbasic().iter().enumerate() {
        d[s] = d_s[k];
    }
    for (k, &s) in part.superbasic().iter().enumerate() {
        if let Some(b) = part.basic_of(rows, s) {
            d[b] -= d_s[k];
        }
    }
    d
}
