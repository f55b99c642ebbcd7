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

#![allow(unused_variables)]

use std::fmt;
use std::time::Duration;

use crate::CongestionState;

/// Window growth during slow start, shared by congestion controllers which
/// only differ in their congestion avoidance phase.
pub trait SlowStart: fmt::Debug {
    /// Process the RTT sample of an ack received in slow start.
    fn on_ack(&mut self, tcb: &CongestionState, segments_acked: u32, rtt: Duration) {}

    /// Grow the congestion window for `segments_acked` newly acked segments.
    /// Return the number of acked segments which were not used for growth.
    fn slow_start(&mut self, tcb: &mut CongestionState, segments_acked: u32) -> u32;

    /// Process a congestion event.
    fn on_congestion_event(&mut self) {}
}

/// Standard slow start: one segment per ack, regardless of how many segments
/// it covers.
#[derive(Debug, Default, Clone)]
pub struct StandardSlowStart;

impl SlowStart for StandardSlowStart {
    fn slow_start(&mut self, tcb: &mut CongestionState, segments_acked: u32) -> u32 {
        if segments_acked == 0 {
            return 0;
        }

        tcb.cwnd = tcb.cwnd.saturating_add(tcb.segment_size);
        segments_acked - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_slow_start() -> crate::Result<()> {
        let mut ss = StandardSlowStart;
        let mut tcb = CongestionState::new(1000, 2000, u64::MAX)?;

        assert_eq!(ss.slow_start(&mut tcb, 0), 0);
        assert_eq!(tcb.cwnd, 2000);

        assert_eq!(ss.slow_start(&mut tcb, 1), 0);
        assert_eq!(tcb.cwnd, 3000);

        // A stretch ack still grows the window by a single segment.
        assert_eq!(ss.slow_start(&mut tcb, 4), 3);
        assert_eq!(tcb.cwnd, 4000);

        ss.on_ack(&tcb, 1, Duration::from_millis(10));
        ss.on_congestion_event();
        assert_eq!(tcb.cwnd, 4000);

        Ok(())
    }
}
