//! Sequential domain reduction of the Bayesian search box.
//!
//! After every guided sample the box is re-centered on the incumbent and its
//! width contracted. Contraction is fast when the incumbent oscillates
//! (`gamma_osc`) and slow when it keeps moving in one direction
//! (`gamma_pan`); `eta` is the zoom applied when the incumbent stands still.

use ndarray::Array1;

use crate::parameters::Bounds;

/// State of the shrinking search box.
#[derive(Debug, Clone)]
pub struct SequentialDomainReduction {
    gamma_osc: f64,
    gamma_pan: f64,
    eta: f64,
    minimum_window: f64,
    original: Vec<Bounds>,
    current: Vec<Bounds>,
    previous_optimal: Array1<f64>,
    current_optimal: Array1<f64>,
    previous_d: Array1<f64>,
    current_d: Array1<f64>,
    r: Array1<f64>,
}

impl SequentialDomainReduction {
    /// Start from `bounds`, centered on their midpoints.
    pub fn new(
        bounds: &[Bounds],
        gamma_osc: f64,
        gamma_pan: f64,
        eta: f64,
        minimum_window: f64,
    ) -> Self {
        let n = bounds.len();
        let center: Array1<f64> = bounds.iter().map(|b| b.min + 0.5 * b.width()).collect();
        let width: Array1<f64> = bounds.iter().map(|b| b.max - b.min).collect();

        // Zero displacement on the first step: the contraction reduces to eta
        let mut reducer = Self {
            gamma_osc,
            gamma_pan,
            eta,
            minimum_window,
            original: bounds.to_vec(),
            current: bounds.to_vec(),
            previous_optimal: center.clone(),
            current_optimal: center,
            previous_d: Array1::zeros(n),
            current_d: Array1::zeros(n),
            r: width,
        };
        reducer.contract();
        reducer
    }

    /// Current search box.
    pub fn bounds(&self) -> &[Bounds] {
        &self.current
    }

    /// Untrimmed window widths.
    pub fn window_widths(&self) -> &Array1<f64> {
        &self.r
    }

    /// Box the reduction started from.
    pub fn original_bounds(&self) -> &[Bounds] {
        &self.original
    }

    /// Re-center on `optimal` (the current incumbent) and contract.
    ///
    /// An incumbent outside the original box is projected onto it.
    ///
    /// # Returns
    ///
    /// * The new search box
    pub fn update(&mut self, optimal: &Array1<f64>) -> &[Bounds] {
        let optimal: Array1<f64> = optimal
            .iter()
            .zip(self.original.iter())
            .map(|(&v, b)| b.clamp(v))
            .collect();
        self.previous_optimal = std::mem::replace(&mut self.current_optimal, optimal);
        self.previous_d = self.current_d.clone();
        for i in 0..self.r.len() {
            let d = if self.r[i] > 0.0 {
                2.0 * (self.current_optimal[i] - self.previous_optimal[i]) / self.r[i]
            } else {
                0.0
            };
            // A jump of more than half a window would give a negative rate
            self.current_d[i] = d.clamp(-1.0, 1.0);
        }
        self.contract();

        self.current = (0..self.r.len())
            .map(|i| self.window(i))
            .collect();
        &self.current
    }

    fn contract(&mut self) {
        for i in 0..self.r.len() {
            let c = self.current_d[i] * self.previous_d[i];
            let c_hat = c.abs().sqrt() * c.signum();
            let gamma = 0.5 * (self.gamma_pan * (1.0 + c_hat) + self.gamma_osc * (1.0 - c_hat));
            let rate = self.eta + self.current_d[i].abs() * (gamma - self.eta);
            self.r[i] *= rate;
        }
    }

    /// Window of dimension `i` around the incumbent, trimmed to the original box.
    fn window(&self, i: usize) -> Bounds {
        let global = &self.original[i];
        let global_width = global.max - global.min;
        let half = 0.5 * self.r[i].max(self.minimum_window.min(global_width));

        let mut low = (self.current_optimal[i] - half).max(global.min);
        let mut high = (self.current_optimal[i] + half).min(global.max);

        // Trimming can leave a window narrower than the minimum: slide it back inside
        let min_width = self.minimum_window.min(global_width);
        if high - low < min_width {
            if low <= global.min {
                high = global.min + min_width;
            } else {
                low = global.max - min_width;
            }
        }
        if !(high > low) {
            // Collapsed window: fall back to a sliver of the original box
            let eps = f64::EPSILON * global_width.max(1.0);
            low = (self.current_optimal[i] - eps).max(global.min);
            high = (self.current_optimal[i] + eps).min(global.max);
        }

        Bounds {
            min: low,
            max: high,
        }
    }
}
