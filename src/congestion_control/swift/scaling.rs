// Copyright (c) 2024 The TSWIFT Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Scaling of the target delay curve.
//!
//! Alpha and beta shape the congestion term `alpha / cwnd + beta` of the
//! target delay, and beta doubles as the multiplicative decrease factor.
//! Both are derived from the configured operating window range `[min_cwnd,
//! max_cwnd]`, so that the congestion term spans `scale_range` across it:
//!
//! ```text
//! alpha = scale_range / (1/sqrt(min_cwnd) - 1/sqrt(max_cwnd))
//! beta  = -alpha / max_cwnd
//! ```
//!
//! Small windows use the base values instead.

use super::SwiftConfig;

/// Alpha and beta computed from the window range, before clamping.
pub fn window_range_params(min_cwnd: f64, max_cwnd: f64, scale_range: f64) -> (f64, f64) {
    let alpha = scale_range / (1.0 / min_cwnd.sqrt() - 1.0 / max_cwnd.sqrt());
    let beta = -alpha / max_cwnd;
    (alpha, beta)
}

/// Current alpha and beta of a Swift flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingEngine {
    alpha: f64,
    beta: f64,
}

impl ScalingEngine {
    /// Initial parameters: the largest alpha and the base beta.
    pub fn new(conf: &SwiftConfig) -> Self {
        Self {
            alpha: conf.alpha_max,
            beta: conf.beta_base,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Fall back to the base values.
    pub fn reset(&mut self, conf: &SwiftConfig) {
        self.alpha = conf.alpha_base;
        self.beta = conf.beta_base;
    }

    /// Keep the current values inside the configured ranges.
    pub fn clamp(&mut self, conf: &SwiftConfig) {
        self.alpha = self.alpha.clamp(conf.alpha_min, conf.alpha_max);
        self.beta = self.beta.clamp(conf.beta_min, conf.beta_max);
    }

    /// Recalculate alpha and beta at the end of a control interval.
    ///
    /// Windows below `win_thresh` segments use the base values. Otherwise the
    /// parameters are derived from the window range if at least one RTT
    /// sample was taken in the interval; without samples they are left as is.
    pub fn recalculate(&mut self, cwnd_segments: u64, has_samples: bool, conf: &SwiftConfig) {
        if cwnd_segments < conf.win_thresh {
            self.reset(conf);
        } else if has_samples {
            let (alpha, beta) = window_range_params(
                conf.min_cwnd as f64,
                conf.max_cwnd as f64,
                conf.scale_range,
            );

            self.alpha = alpha;
            self.beta = beta;
            self.clamp(conf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_window_range_params() {
        let (alpha, beta) = window_range_params(1.0, 10000.0, 1000.0);
        assert!((alpha - 1000.0 / 0.99).abs() < 1e-9);
        assert!((alpha - 1010.1).abs() < 0.01);
        assert!((beta + 0.10101).abs() < 1e-5);
    }

    #[test]
    fn scaling_initial_and_reset() {
        let conf = SwiftConfig::default();
        let mut s = ScalingEngine::new(&conf);
        assert_eq!(s.alpha(), conf.alpha_max);
        assert_eq!(s.beta(), conf.beta_base);

        s.reset(&conf);
        assert_eq!(s.alpha(), conf.alpha_base);
        assert_eq!(s.beta(), conf.beta_base);
    }

    #[test]
    fn scaling_recalculate() {
        let conf = SwiftConfig::default();
        let mut s = ScalingEngine::new(&conf);

        // Small window, base regime.
        s.recalculate(conf.win_thresh - 1, true, &conf);
        assert_eq!(s.alpha(), conf.alpha_base);
        assert_eq!(s.beta(), conf.beta_base);

        // No samples in this interval, nothing changes.
        s.recalculate(conf.win_thresh, false, &conf);
        assert_eq!(s.alpha(), conf.alpha_base);
        assert_eq!(s.beta(), conf.beta_base);

        // alpha ~ 1010.1 is clamped to alpha_max, beta ~ -0.101 to beta_min.
        s.recalculate(conf.win_thresh, true, &conf);
        assert_eq!(s.alpha(), conf.alpha_max);
        assert_eq!(s.beta(), conf.beta_min);
    }

    #[test]
    fn scaling_recalculate_within_bounds() {
        let mut conf = SwiftConfig::default();
        conf.set_alpha_range(0.0, 2000.0)
            .set_beta_range(0.0, 0.5)
            .set_cwnd_range(4, 100)
            .set_scale_range(40.0);

        let mut s = ScalingEngine::new(&conf);
        s.recalculate(50, true, &conf);

        // 40 / (1/2 - 1/10) = 100, -100 / 100 = -1 -> 0.
        assert!((s.alpha() - 100.0).abs() < 1e-9);
        assert_eq!(s.beta(), 0.0);
    }
}
