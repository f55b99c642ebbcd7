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

//! NewReno congestion control.
//!
//! See <https://www.rfc-editor.org/rfc/rfc5681.html> and
//! <https://www.rfc-editor.org/rfc/rfc6582.html>.

use std::time::Duration;

use log::*;

use super::CongestionController;
use super::CongestionStats;
use super::SlowStart;
use super::StandardSlowStart;
use crate::CongestionState;
use crate::TcpCongState;

/// Loss based baseline controller.
#[derive(Debug, Clone, Default)]
pub struct NewReno<S = StandardSlowStart> {
    /// Slow start growth.
    slow_start: S,

    /// Congestion stats.
    stats: CongestionStats,
}

impl NewReno {
    pub fn new() -> Self {
        Self::with_slow_start(StandardSlowStart)
    }
}

impl<S: SlowStart> NewReno<S> {
    pub fn with_slow_start(slow_start: S) -> Self {
        Self {
            slow_start,
            stats: Default::default(),
        }
    }

    /// Grow the window by about one segment per window of acked data.
    fn congestion_avoidance(&mut self, tcb: &mut CongestionState, segments_acked: u32) {
        if segments_acked == 0 {
            return;
        }

        let increment =
            (tcb.segment_size.saturating_mul(tcb.segment_size) / tcb.cwnd.max(1)).max(1);
        tcb.cwnd = tcb.cwnd.saturating_add(increment);
        self.stats.increase_events = self.stats.increase_events.saturating_add(1);
    }
}

impl<S: SlowStart + Clone + 'static> CongestionController for NewReno<S> {
    fn name(&self) -> &str {
        "NEWRENO"
    }

    fn on_ack(&mut self, tcb: &mut CongestionState, segments_acked: u32, rtt: Duration) {
        if !rtt.is_zero() {
            self.stats.rtt_samples = self.stats.rtt_samples.saturating_add(1);
        }
        self.stats.segments_acked_in_total = self
            .stats
            .segments_acked_in_total
            .saturating_add(segments_acked as u64);

        let mut segments_acked = segments_acked;
        if self.in_slow_start(tcb) {
            self.slow_start.on_ack(tcb, segments_acked, rtt);
            self.stats.segments_acked_in_slow_start = self
                .stats
                .segments_acked_in_slow_start
                .saturating_add(segments_acked as u64);
            segments_acked = self.slow_start.slow_start(tcb, segments_acked);
        }

        if !self.in_slow_start(tcb) {
            self.congestion_avoidance(tcb, segments_acked);
        }

        trace!(
            "{} ON_ACK acked={} cwnd={} ssthresh={}",
            self.name(),
            segments_acked,
            tcb.cwnd,
            tcb.ssthresh
        );
    }

    fn on_congestion_state_set(&mut self, tcb: &mut CongestionState, new_state: TcpCongState) {
        if new_state == TcpCongState::Loss {
            self.slow_start.on_congestion_event();
            self.stats.loss_events = self.stats.loss_events.saturating_add(1);
            debug!("{} congestion event, cwnd={}", self.name(), tcb.cwnd);
        }
    }

    fn ssthresh(&self, tcb: &CongestionState, bytes_in_flight: u64) -> u64 {
        (bytes_in_flight / 2).max(2 * tcb.segment_size)
    }

    fn fork(&self) -> Box<dyn CongestionController> {
        Box::new(self.clone())
    }

    fn stats(&self) -> &CongestionStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_reno_slow_start() -> crate::Result<()> {
        let mut reno = NewReno::new();
        let mut tcb = CongestionState::new(1000, 2000, 4000)?;
        let rtt = Duration::from_millis(10);

        reno.on_ack(&mut tcb, 1, rtt);
        assert_eq!(tcb.cwnd, 3000);

        // Left-over segments grow the window in congestion avoidance:
        // 4000, then 1000 * 1000 / 4000.
        reno.on_ack(&mut tcb, 2, rtt);
        assert_eq!(tcb.cwnd, 4250);
        assert_eq!(reno.stats().segments_acked_in_slow_start, 3);
        assert_eq!(reno.stats().segments_acked_in_total, 3);
        assert_eq!(reno.stats().increase_events, 1);
        Ok(())
    }

    #[test]
    fn new_reno_congestion_avoidance() -> crate::Result<()> {
        let mut reno = NewReno::new();
        let mut tcb = CongestionState::new(1000, 10000, 5000)?;

        reno.on_ack(&mut tcb, 1, Duration::ZERO);
        assert_eq!(tcb.cwnd, 10100);
        assert_eq!(reno.stats().rtt_samples, 0);

        reno.on_ack(&mut tcb, 0, Duration::from_millis(10));
        assert_eq!(tcb.cwnd, 10100);

        // Growth is at least one byte.
        let mut tcb = CongestionState::new(1, 10_000_000, 1)?;
        reno.on_ack(&mut tcb, 1, Duration::from_millis(10));
        assert_eq!(tcb.cwnd, 10_000_001);
        Ok(())
    }

    #[test]
    fn new_reno_loss() -> crate::Result<()> {
        let mut reno = NewReno::new();
        let mut tcb = CongestionState::new(1460, 14600, u64::MAX)?;
        assert_eq!(reno.name(), "NEWRENO");

        assert_eq!(reno.ssthresh(&tcb, 14600), 7300);
        assert_eq!(reno.ssthresh(&tcb, 1000), 2920);

        reno.on_congestion_state_set(&mut tcb, TcpCongState::Disorder);
        assert_eq!(reno.stats().loss_events, 0);
        reno.on_congestion_state_set(&mut tcb, TcpCongState::Loss);
        assert_eq!(reno.stats().loss_events, 1);
        assert_eq!(tcb.cwnd, 14600);
        Ok(())
    }

    #[test]
    fn new_reno_fork() -> crate::Result<()> {
        let mut reno = NewReno::new();
        let mut tcb = CongestionState::new(1000, 2000, u64::MAX)?;
        reno.on_ack(&mut tcb, 1, Duration::from_millis(10));

        let mut forked = reno.fork();
        forked.on_ack(&mut tcb, 1, Duration::from_millis(10));
        assert_eq!(forked.stats().rtt_samples, 2);
        assert_eq!(reno.stats().rtt_samples, 1);
        Ok(())
    }
}
