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

use std::time::Duration;

use super::SwiftConfig;

/// Target delay of a Swift flow.
///
/// The target is a fixed part, the base delay plus a per-hop term, and a
/// congestion term `alpha / cwnd + beta` in microseconds which is bounded to
/// `[0, scale_range]`. Smaller windows get a larger target, which lets flows
/// with small windows claim their share of the bottleneck.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetDelayModel {
    /// Base target delay plus the per-hop term.
    floor: Duration,

    /// Upper bound of the congestion term in microseconds.
    scale_range: f64,
}

impl TargetDelayModel {
    pub fn new(conf: &SwiftConfig) -> Self {
        let hop_delay = conf
            .hop_scale
            .checked_mul(conf.hops)
            .unwrap_or(Duration::MAX);

        Self {
            floor: conf.base_target_delay.saturating_add(hop_delay),
            scale_range: conf.scale_range,
        }
    }

    /// Lowest possible target delay.
    pub fn floor(&self) -> Duration {
        self.floor
    }

    /// Congestion term in microseconds.
    fn congestion_term(&self, alpha: f64, beta: f64, cwnd_segments: f64) -> f64 {
        let term = (alpha / cwnd_segments.max(1.0) + beta).min(self.scale_range);
        if term.is_nan() {
            return 0.0;
        }
        term.max(0.0)
    }

    /// Target delay for the given scaling parameters and window.
    pub fn target(&self, alpha: f64, beta: f64, cwnd_segments: f64) -> Duration {
        let term = self.congestion_term(alpha, beta, cwnd_segments);
        let nanos = (term * 1000.0).round() as u64;

        self.floor.saturating_add(Duration::from_nanos(nanos))
    }
}
