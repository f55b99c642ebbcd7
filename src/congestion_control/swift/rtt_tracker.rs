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

/// RTT accumulator for one control interval.
///
/// A control interval covers one window of data: it ends once the sequence
/// number which was next to be sent at the start of the interval has been
/// acknowledged.
///
/// The base RTT is the minimum sample of the connection lifetime and is never
/// reset. The maximum RTT is not reset at interval boundaries either, so the
/// maximum queueing delay is measured over the whole connection.
#[derive(Debug, Clone)]
pub struct RttTracker {
    /// Sum of the RTT samples in the current interval.
    sum_rtt: Duration,

    /// Number of RTT samples in the current interval.
    cnt_rtt: u32,

    /// Minimum RTT ever observed, the propagation delay estimate.
    base_rtt: Duration,

    /// Maximum RTT observed.
    max_rtt: Duration,

    /// Sequence number ending the current interval.
    end_seq: u64,
}

impl RttTracker {
    pub fn new() -> Self {
        Self {
            sum_rtt: Duration::ZERO,
            cnt_rtt: 0,
            base_rtt: Duration::MAX,
            max_rtt: Duration::ZERO,
            end_seq: 0,
        }
    }

    /// Record an RTT sample. A zero sample carries no timing information and
    /// is ignored. Return whether the sample was recorded.
    pub fn on_rtt_sample(&mut self, rtt: Duration) -> bool {
        if rtt.is_zero() {
            return false;
        }

        self.base_rtt = self.base_rtt.min(rtt);
        self.max_rtt = self.max_rtt.max(rtt);
        self.sum_rtt = self.sum_rtt.saturating_add(rtt);
        self.cnt_rtt = self.cnt_rtt.saturating_add(1);

        true
    }

    /// Average queueing delay in the current interval, or None if no sample
    /// was recorded in this interval.
    pub fn avg_queueing_delay(&self) -> Option<Duration> {
        if self.cnt_rtt == 0 {
            return None;
        }

        Some((self.sum_rtt / self.cnt_rtt).saturating_sub(self.base_rtt))
    }

    /// Maximum queueing delay, or None if no sample was ever recorded.
    pub fn max_queueing_delay(&self) -> Option<Duration> {
        self.base_rtt()
            .map(|base_rtt| self.max_rtt.saturating_sub(base_rtt))
    }

    /// Start a new interval ending at `end_seq`. The base RTT and the
    /// maximum RTT are kept.
    pub fn reset_interval(&mut self, end_seq: u64) {
        self.end_seq = end_seq;
        self.cnt_rtt = 0;
        self.sum_rtt = Duration::ZERO;
    }

    /// Whether the interval is over once `last_acked_seq` is acknowledged.
    pub fn interval_ended(&self, last_acked_seq: u64) -> bool {
        last_acked_seq >= self.end_seq
    }

    /// Minimum RTT ever observed.
    pub fn base_rtt(&self) -> Option<Duration> {
        if self.base_rtt == Duration::MAX {
            None
        } else {
            Some(self.base_rtt)
        }
    }

    /// Maximum RTT observed.
    pub fn max_rtt(&self) -> Duration {
        self.max_rtt
    }

    /// Sum of the RTT samples in the current interval.
    pub fn sum_rtt(&self) -> Duration {
        self.sum_rtt
    }

    /// Number of RTT samples in the current interval.
    pub fn sample_count(&self) -> u32 {
        self.cnt_rtt
    }

    /// Sequence number ending the current interval.
    pub fn interval_end(&self) -> u64 {
        self.end_seq
    }
}

impl Default for RttTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtt_tracker_initial() {
        let t = RttTracker::new();
        assert_eq!(t.base_rtt(), None);
        assert_eq!(t.max_rtt(), Duration::ZERO);
        assert_eq!(t.sample_count(), 0);
        assert_eq!(t.avg_queueing_delay(), None);
        assert_eq!(t.max_queueing_delay(), None);
        assert!(t.interval_ended(0));
    }

    #[test]
    fn rtt_tracker_samples() {
        let mut t = RttTracker::new();

        assert!(!t.on_rtt_sample(Duration::ZERO));
        assert_eq!(t.sample_count(), 0);

        for ms in [40, 20, 60] {
            assert!(t.on_rtt_sample(Duration::from_millis(ms)));
        }
        assert_eq!(t.base_rtt(), Some(Duration::from_millis(20)));
        assert_eq!(t.max_rtt(), Duration::from_millis(60));
        assert_eq!(t.sum_rtt(), Duration::from_millis(120));
        assert_eq!(t.sample_count(), 3);
        assert_eq!(t.avg_queueing_delay(), Some(Duration::from_millis(20)));
        assert_eq!(t.max_queueing_delay(), Some(Duration::from_millis(40)));
    }

    #[test]
    fn rtt_tracker_reset_interval() {
        let mut t = RttTracker::new();
        t.on_rtt_sample(Duration::from_millis(30));
        t.on_rtt_sample(Duration::from_millis(90));

        t.reset_interval(5000);
        assert_eq!(t.interval_end(), 5000);
        assert!(!t.interval_ended(4999));
        assert!(t.interval_ended(5000));
        assert_eq!(t.sample_count(), 0);
        assert_eq!(t.sum_rtt(), Duration::ZERO);
        assert_eq!(t.avg_queueing_delay(), None);

        // Base and max RTT survive the interval boundary.
        assert_eq!(t.base_rtt(), Some(Duration::from_millis(30)));
        assert_eq!(t.max_rtt(), Duration::from_millis(90));

        t.on_rtt_sample(Duration::from_millis(50));
        assert_eq!(t.max_queueing_delay(), Some(Duration::from_millis(60)));
        assert_eq!(t.avg_queueing_delay(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn rtt_tracker_base_rtt_never_increases() {
        let mut t = RttTracker::new();
        let samples = [70, 50, 80, 50, 10, 90, 30];
        let mut last_base = Duration::MAX;

        for (i, ms) in samples.iter().enumerate() {
            t.on_rtt_sample(Duration::from_millis(*ms));
            let base = t.base_rtt().unwrap();
            assert!(base <= last_base);
            last_base = base;

            if i % 3 == 2 {
                t.reset_interval(i as u64);
            }
        }
        assert_eq!(last_base, Duration::from_millis(10));
    }
}
