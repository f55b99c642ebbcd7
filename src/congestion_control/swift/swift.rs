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

//! Swift: delay is simple and effective for congestion control in the
//! datacenter.
//!
//! Swift keeps the RTT of a flow close to a target delay. Every RTT sample is
//! compared against the target: below it the window grows by an additive
//! increment per round trip, at or above it the window shrinks by a factor
//! proportional to the excess delay. A single decrease never cuts more than
//! `max_decrease_fraction` of the window.
//!
//! The target delay is the sum of a base delay, a per-hop term and a
//! congestion term `alpha / cwnd + beta` which gives small windows a larger
//! share of queueing delay. Alpha and beta are recalculated once per control
//! interval (one window of data) and fall back to their base values on loss.
//!
//! See <https://dl.acm.org/doi/10.1145/3387514.3406591>.

use std::time::Duration;

use log::*;
use serde::Deserialize;
use serde::Serialize;

use super::CongestionController;
use super::CongestionStats;
use super::SlowStart;
use super::StandardSlowStart;
use crate::CongestionState;
use crate::Error;
use crate::Result;
use crate::TcpCongState;
use rtt_tracker::RttTracker;
use scaling::ScalingEngine;
use target_delay::TargetDelayModel;

/// Swift configurable parameters.
///
/// Delays are serialized in microseconds.
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwiftConfig {
    /// Lower bound of alpha.
    alpha_min: f64,

    /// Upper bound of alpha. Also the initial alpha.
    alpha_max: f64,

    /// Alpha used for small windows and after a loss.
    alpha_base: f64,

    /// Lower bound of beta.
    beta_min: f64,

    /// Upper bound of beta.
    beta_max: f64,

    /// Beta used for small windows and after a loss. Also the initial beta.
    beta_base: f64,

    /// Windows below this number of segments use the base alpha and beta.
    win_thresh: u64,

    /// Below-target samples needed to clear the RTT-above-target state.
    theta: u32,

    /// Lower end of the operating window range in segments.
    min_cwnd: u64,

    /// Upper end of the operating window range in segments.
    max_cwnd: u64,

    /// Number of hops on the path.
    hops: u32,

    /// Target delay added per hop.
    #[serde(rename = "hop_scale_us")]
    #[serde_as(as = "serde_with::DurationMicroSeconds<u64>")]
    hop_scale: Duration,

    /// Fixed part of the target delay.
    #[serde(rename = "base_target_delay_us")]
    #[serde_as(as = "serde_with::DurationMicroSeconds<u64>")]
    base_target_delay: Duration,

    /// Upper bound of the congestion term of the target delay in
    /// microseconds.
    #[serde(rename = "scale_range_us")]
    scale_range: f64,

    /// Window growth per round trip in segments.
    additive_increment: f64,

    /// Max fraction of the window removed by a single decrease.
    max_decrease_fraction: f64,

    /// Whether the window is decreased when the RTT exceeds the target.
    decrease_enabled: bool,
}

impl SwiftConfig {
    /// Load the parameters from a JSON object. Missing fields take their
    /// default values.
    pub fn from_json(s: &str) -> Result<Self> {
        let conf: SwiftConfig = serde_json::from_str(s)?;
        conf.validate()?;
        Ok(conf)
    }

    /// Serialize the parameters to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Check the parameters.
    pub fn validate(&self) -> Result<()> {
        let floats = [
            ("alpha_min", self.alpha_min),
            ("alpha_max", self.alpha_max),
            ("alpha_base", self.alpha_base),
            ("beta_min", self.beta_min),
            ("beta_max", self.beta_max),
            ("beta_base", self.beta_base),
            ("scale_range", self.scale_range),
            ("additive_increment", self.additive_increment),
            ("max_decrease_fraction", self.max_decrease_fraction),
        ];
        for (name, v) in floats {
            if !v.is_finite() {
                return Err(Error::InvalidConfig(format!("{} is not finite", name)));
            }
        }

        if self.alpha_min < 0.0 || self.alpha_min >= self.alpha_max {
            return Err(Error::InvalidConfig(format!(
                "invalid alpha range [{}, {}]",
                self.alpha_min, self.alpha_max
            )));
        }

        if self.beta_min < 0.0 || self.beta_min >= self.beta_max || self.beta_max > 1.0 {
            return Err(Error::InvalidConfig(format!(
                "invalid beta range [{}, {}]",
                self.beta_min, self.beta_max
            )));
        }

        if !(self.alpha_min..=self.alpha_max).contains(&self.alpha_base) {
            return Err(Error::InvalidConfig(format!(
                "alpha_base {} out of range [{}, {}]",
                self.alpha_base, self.alpha_min, self.alpha_max
            )));
        }

        if !(self.beta_min..=self.beta_max).contains(&self.beta_base) {
            return Err(Error::InvalidConfig(format!(
                "beta_base {} out of range [{}, {}]",
                self.beta_base, self.beta_min, self.beta_max
            )));
        }

        if self.min_cwnd == 0 || self.min_cwnd >= self.max_cwnd {
            return Err(Error::InvalidConfig(format!(
                "invalid cwnd range [{}, {}]",
                self.min_cwnd, self.max_cwnd
            )));
        }

        if !(0.0..=1.0).contains(&self.max_decrease_fraction) {
            return Err(Error::InvalidConfig(format!(
                "invalid max_decrease_fraction {}",
                self.max_decrease_fraction
            )));
        }

        if self.additive_increment < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "invalid additive_increment {}",
                self.additive_increment
            )));
        }

        if self.scale_range <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "invalid scale_range {}",
                self.scale_range
            )));
        }

        if self.theta == 0 {
            return Err(Error::InvalidConfig("zero theta".into()));
        }

        Ok(())
    }

    /// Set the range of alpha.
    pub fn set_alpha_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.alpha_min = min;
        self.alpha_max = max;
        self
    }

    /// Set the base alpha.
    pub fn set_alpha_base(&mut self, v: f64) -> &mut Self {
        self.alpha_base = v;
        self
    }

    /// Set the range of beta.
    pub fn set_beta_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.beta_min = min;
        self.beta_max = max;
        self
    }

    /// Set the base beta.
    pub fn set_beta_base(&mut self, v: f64) -> &mut Self {
        self.beta_base = v;
        self
    }

    /// Set the window threshold in segments below which the base alpha and
    /// beta are used.
    pub fn set_win_thresh(&mut self, v: u64) -> &mut Self {
        self.win_thresh = v;
        self
    }

    pub fn set_theta(&mut self, v: u32) -> &mut Self {
        self.theta = v;
        self
    }

    /// Set the operating window range in segments.
    pub fn set_cwnd_range(&mut self, min: u64, max: u64) -> &mut Self {
        self.min_cwnd = min;
        self.max_cwnd = max;
        self
    }

    pub fn set_hops(&mut self, v: u32) -> &mut Self {
        self.hops = v;
        self
    }

    pub fn set_hop_scale(&mut self, v: Duration) -> &mut Self {
        self.hop_scale = v;
        self
    }

    pub fn set_base_target_delay(&mut self, v: Duration) -> &mut Self {
        self.base_target_delay = v;
        self
    }

    /// Set the upper bound of the congestion term in microseconds.
    pub fn set_scale_range(&mut self, v: f64) -> &mut Self {
        self.scale_range = v;
        self
    }

    /// Set the window growth per round trip in segments.
    pub fn set_additive_increment(&mut self, v: f64) -> &mut Self {
        self.additive_increment = v;
        self
    }

    pub fn set_max_decrease_fraction(&mut self, v: f64) -> &mut Self {
        self.max_decrease_fraction = v;
        self
    }

    pub fn enable_decrease(&mut self, v: bool) -> &mut Self {
        self.decrease_enabled = v;
        self
    }
}

impl Default for SwiftConfig {
    fn default() -> Self {
        Self {
            alpha_min: 0.3,
            alpha_max: 10.0,
            alpha_base: 1.0,
            beta_min: 0.125,
            beta_max: 0.5,
            beta_base: 0.5,
            win_thresh: 15,
            theta: 5,
            min_cwnd: 1,
            max_cwnd: 10000,
            hops: 1,
            hop_scale: Duration::from_micros(1),
            base_target_delay: Duration::from_micros(100),
            scale_range: 1000.0,
            additive_increment: 1.0,
            max_decrease_fraction: 0.5,
            decrease_enabled: true,
        }
    }
}

/// Swift congestion control algorithm.
///
/// Slow start is delegated to `S` while `cwnd < ssthresh`.
#[derive(Debug, Clone)]
pub struct Swift<S = StandardSlowStart> {
    /// Configurable parameters.
    config: SwiftConfig,

    /// RTT samples of the current control interval.
    rtt: RttTracker,

    /// Alpha and beta.
    scaling: ScalingEngine,

    /// Target delay derived from the configuration.
    target: TargetDelayModel,

    /// Target delay used for the latest decision.
    last_target_delay: Duration,

    /// Whether the RTT was at or above the target recently.
    rtt_above: bool,

    /// Below-target samples since the RTT was last above the target.
    rtt_low: u32,

    /// Retransmission timeouts since the last ack.
    retransmit_count: u32,

    /// Window growth in bytes not yet applied to the window, below one byte.
    cwnd_carry: f64,

    /// Slow start growth.
    slow_start: S,

    /// Congestion stats.
    stats: CongestionStats,
}

impl Swift {
    /// Create a Swift controller with standard slow start.
    pub fn new(config: SwiftConfig) -> Result<Self> {
        Self::with_slow_start(config, StandardSlowStart)
    }
}

impl<S: SlowStart> Swift<S> {
    /// Create a Swift controller with the given slow start algorithm.
    pub fn with_slow_start(config: SwiftConfig, slow_start: S) -> Result<Self> {
        config.validate()?;

        let target = TargetDelayModel::new(&config);
        Ok(Self {
            rtt: RttTracker::new(),
            scaling: ScalingEngine::new(&config),
            last_target_delay: target.floor(),
            target,
            config,
            rtt_above: false,
            rtt_low: 0,
            retransmit_count: 0,
            cwnd_carry: 0.0,
            slow_start,
            stats: Default::default(),
        })
    }

    /// Replace the parameters. Alpha and beta are kept, clamped to the new
    /// ranges. On error the controller is left untouched.
    pub fn configure(&mut self, config: SwiftConfig) -> Result<()> {
        config.validate()?;

        self.target = TargetDelayModel::new(&config);
        self.config = config;
        self.scaling.clamp(&self.config);

        debug!(
            "SWIFT reconfigured, alpha={} beta={}",
            self.scaling.alpha(),
            self.scaling.beta()
        );
        Ok(())
    }

    /// Process a loss. Alpha and beta fall back to their base values and a
    /// new control interval ending at `next_tx_sequence` is started.
    pub fn on_congestion_event(&mut self, next_tx_sequence: u64) {
        self.scaling.reset(&self.config);
        self.rtt_above = false;
        self.rtt_low = 0;
        self.cwnd_carry = 0.0;
        self.rtt.reset_interval(next_tx_sequence);
        self.slow_start.on_congestion_event();
        self.stats.loss_events = self.stats.loss_events.saturating_add(1);

        debug!(
            "SWIFT congestion event, alpha={} beta={} interval_end={}",
            self.scaling.alpha(),
            self.scaling.beta(),
            next_tx_sequence
        );
    }

    /// Target delay for the current window.
    pub fn target_delay(&self, tcb: &CongestionState) -> Duration {
        self.target.target(
            self.scaling.alpha(),
            self.scaling.beta(),
            tcb.cwnd as f64 / tcb.segment_size.max(1) as f64,
        )
    }

    /// Target delay used for the latest window decision.
    pub fn last_target_delay(&self) -> Duration {
        self.last_target_delay
    }

    pub fn config(&self) -> &SwiftConfig {
        &self.config
    }

    pub fn alpha(&self) -> f64 {
        self.scaling.alpha()
    }

    pub fn beta(&self) -> f64 {
        self.scaling.beta()
    }

    /// Minimum RTT observed.
    pub fn base_rtt(&self) -> Option<Duration> {
        self.rtt.base_rtt()
    }

    /// Maximum RTT observed.
    pub fn max_rtt(&self) -> Duration {
        self.rtt.max_rtt()
    }

    /// Average queueing delay in the current control interval.
    pub fn avg_queueing_delay(&self) -> Option<Duration> {
        self.rtt.avg_queueing_delay()
    }

    /// Maximum queueing delay observed.
    pub fn max_queueing_delay(&self) -> Option<Duration> {
        self.rtt.max_queueing_delay()
    }

    /// RTT samples in the current control interval.
    pub fn rtt_sample_count(&self) -> u32 {
        self.rtt.sample_count()
    }

    /// Sequence number ending the current control interval.
    pub fn interval_end(&self) -> u64 {
        self.rtt.interval_end()
    }

    pub fn rtt_above_target(&self) -> bool {
        self.rtt_above
    }

    pub fn retransmit_count(&self) -> u32 {
        self.retransmit_count
    }

    /// Delay based window update for one ack.
    fn update_window(&mut self, tcb: &mut CongestionState, segments_acked: u32, rtt: Duration) {
        let segment_size = tcb.segment_size.max(1);
        let target = self.target.target(
            self.scaling.alpha(),
            self.scaling.beta(),
            tcb.cwnd as f64 / segment_size as f64,
        );
        self.last_target_delay = target;

        if rtt < target {
            // Additive increase, spread over the acks of one window. Growth
            // below one byte is carried to the next ack.
            let acked = segments_acked.max(1) as f64;
            let segment_bytes = self.config.additive_increment * segment_size as f64;
            let growth = if tcb.cwnd >= segment_size {
                segment_bytes / acked
            } else {
                segment_bytes * acked
            };
            let growth = growth + self.cwnd_carry;
            let whole = growth.floor();
            self.cwnd_carry = growth - whole;
            self.stats.increase_events = self.stats.increase_events.saturating_add(1);

            if self.rtt_above {
                self.rtt_low += 1;
                if self.rtt_low >= self.config.theta {
                    self.rtt_above = false;
                    self.rtt_low = 0;
                }
            }

            tcb.cwnd = tcb.cwnd.saturating_add(whole as u64).max(segment_size);
        } else {
            self.rtt_above = true;
            self.rtt_low = 0;

            if !self.config.decrease_enabled {
                return;
            }

            let excess = (rtt - target).as_secs_f64() / rtt.as_secs_f64();
            let factor = (1.0 - self.scaling.beta() * excess)
                .max(1.0 - self.config.max_decrease_fraction);
            self.cwnd_carry = 0.0;
            self.stats.decrease_events = self.stats.decrease_events.saturating_add(1);

            let cwnd = ((tcb.cwnd as f64 * factor).ceil() as u64).min(tcb.cwnd);
            tcb.cwnd = cwnd.max(segment_size);
        }
    }

    /// End of a control interval: recalculate alpha and beta for the
    /// current window and start the next interval.
    fn on_interval_end(&mut self, tcb: &CongestionState) {
        if let (Some(avg), Some(max)) = (
            self.rtt.avg_queueing_delay(),
            self.rtt.max_queueing_delay(),
        ) {
            debug!(
                "SWIFT interval end, avg queueing delay {}us, max queueing delay {}us",
                avg.as_micros(),
                max.as_micros()
            );
        }

        self.scaling.recalculate(
            tcb.cwnd_in_segments(),
            self.rtt.sample_count() > 0,
            &self.config,
        );
        self.rtt.reset_interval(tcb.next_tx_sequence);

        debug!(
            "SWIFT recalculated alpha={} beta={} cwnd={} next interval_end={}",
            self.scaling.alpha(),
            self.scaling.beta(),
            tcb.cwnd,
            tcb.next_tx_sequence
        );
    }
}

impl<S: SlowStart + Clone + 'static> CongestionController for Swift<S> {
    fn name(&self) -> &str {
        "SWIFT"
    }

    fn on_ack(&mut self, tcb: &mut CongestionState, segments_acked: u32, rtt: Duration) {
        self.retransmit_count = 0;

        if !self.rtt.on_rtt_sample(rtt) {
            trace!("{} ON_ACK without rtt sample, ignored", self.name());
            return;
        }

        self.stats.rtt_samples = self.stats.rtt_samples.saturating_add(1);
        self.stats.segments_acked_in_total = self
            .stats
            .segments_acked_in_total
            .saturating_add(segments_acked as u64);

        self.update_window(tcb, segments_acked, rtt);

        trace!(
            "{} ON_ACK acked={} rtt={}us target={}us cwnd={} ssthresh={} rtt_above={}",
            self.name(),
            segments_acked,
            rtt.as_micros(),
            self.last_target_delay.as_micros(),
            tcb.cwnd,
            tcb.ssthresh,
            self.rtt_above
        );

        if self.rtt.interval_ended(tcb.last_acked_sequence) {
            self.on_interval_end(tcb);
        }

        if self.in_slow_start(tcb) {
            self.slow_start.on_ack(tcb, segments_acked, rtt);
            self.slow_start.slow_start(tcb, segments_acked);
            self.stats.segments_acked_in_slow_start = self
                .stats
                .segments_acked_in_slow_start
                .saturating_add(segments_acked as u64);

            trace!(
                "{} slow start, cwnd={} ssthresh={}",
                self.name(),
                tcb.cwnd,
                tcb.ssthresh
            );
        }
    }

    fn on_congestion_state_set(&mut self, tcb: &mut CongestionState, new_state: TcpCongState) {
        if new_state == TcpCongState::Loss {
            self.on_congestion_event(tcb.next_tx_sequence);
        }
    }

    fn on_retransmission_timeout(&mut self, _tcb: &mut CongestionState) {
        self.retransmit_count = self.retransmit_count.saturating_add(1);
        debug!(
            "{} retransmission timeout, count={}",
            self.name(),
            self.retransmit_count
        );
    }

    fn ssthresh(&self, tcb: &CongestionState, bytes_in_flight: u64) -> u64 {
        let segment_size = tcb.segment_size.max(1);
        let segments_in_flight = bytes_in_flight / segment_size;
        let ssthresh = ((1.0 - self.scaling.beta()) * segments_in_flight as f64).max(2.0) as u64;

        debug!(
            "{} ssthresh {} segments, bytes_in_flight={}",
            self.name(),
            ssthresh,
            bytes_in_flight
        );
        ssthresh.saturating_mul(segment_size)
    }

    fn fork(&self) -> Box<dyn CongestionController> {
        Box::new(self.clone())
    }

    fn stats(&self) -> &CongestionStats {
        &self.stats
    }
}


mod rtt_tracker;
mod scaling;
mod target_delay;
