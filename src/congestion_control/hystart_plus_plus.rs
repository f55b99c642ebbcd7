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

//! HyStart++: Modified Slow Start for TCP.
//!
//! HyStart++ watches the minimum RTT of each round during slow start. A
//! sustained increase moves the sender into Conservative Slow Start (CSS),
//! which grows the window more slowly; if the increase persists for
//! `CSS_ROUNDS` rounds the sender leaves slow start by setting `ssthresh` to
//! the current window. A decrease while in CSS is treated as jitter and
//! resumes standard slow start.
//!
//! Rounds are delimited by TCP sequence numbers: a round ends once the
//! sequence number that was next to be sent at the start of the round has
//! been cumulatively acknowledged.
//!
//! See <https://www.rfc-editor.org/rfc/rfc9406.html>.

use std::time::Duration;

use log::*;

use super::SlowStart;
use crate::CongestionState;

/// Lower bound of the delay increase sensitivity.
///
/// See <https://www.rfc-editor.org/rfc/rfc9406.html#name-tuning-constants-and-other->.
const MIN_RTT_THRESH: Duration = Duration::from_millis(4);

/// Upper bound of the delay increase sensitivity.
const MAX_RTT_THRESH: Duration = Duration::from_millis(16);

/// Fraction of the last round's minimum RTT used as delay threshold.
const MIN_RTT_DIVISOR: u32 = 8;

/// Minimum RTT samples per round before a round is evaluated.
const N_RTT_SAMPLE: u32 = 8;

/// Growth divisor in Conservative Slow Start. MUST be at least 2.
const CSS_GROWTH_DIVISOR: u64 = 4;

/// Max rounds spent in Conservative Slow Start.
const CSS_ROUNDS: u32 = 5;

/// Max window growth per ack, in segments.
const HYSTART_L: u64 = 8;

/// HyStart++ phase.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum HystartPhase {
    /// Standard slow start.
    InStandardSlowStart,

    /// Conservative slow start.
    InConservativeSlowStart,

    /// Slow start was left on delay increase. Any later slow start, e.g.
    /// after a retransmission timeout, uses standard growth.
    Exited,
}

/// Implementation of HyStart++.
#[derive(Debug, Clone)]
pub struct HystartPlusPlus {
    /// Whether HyStart++ is enabled. If disabled, standard byte counting slow
    /// start is used.
    enabled: bool,

    phase: HystartPhase,

    /// lastRoundMinRTT: minimum RTT of the previous round.
    last_round_min_rtt: Duration,

    /// currentRoundMinRTT: minimum RTT of the current round.
    current_round_min_rtt: Duration,

    /// RTT samples in the current round.
    rtt_sample_count: u32,

    /// windowEnd: sequence number ending the current round. None until the
    /// first ack is processed.
    window_end: Option<u64>,

    /// Rounds spent in Conservative Slow Start.
    css_round_count: u32,

    /// cssBaselineMinRtt: minimum RTT when CSS was entered.
    css_baseline_min_rtt: Duration,
}

impl HystartPlusPlus {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            phase: HystartPhase::InStandardSlowStart,
            last_round_min_rtt: Duration::MAX,
            current_round_min_rtt: Duration::MAX,
            rtt_sample_count: 0,
            window_end: None,
            css_round_count: 0,
            css_baseline_min_rtt: Duration::MAX,
        }
    }

    /// Whether HyStart++ is enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether HyStart++ has exited.
    pub fn has_exited(&self) -> bool {
        self.phase == HystartPhase::Exited
    }

    /// Whether in conservative slow start phase.
    pub fn in_conservative_slow_start(&self) -> bool {
        self.phase == HystartPhase::InConservativeSlowStart
    }

    /// Whether in standard slow start phase.
    pub fn in_standard_slow_start(&self) -> bool {
        self.phase == HystartPhase::InStandardSlowStart
    }

    fn active(&self) -> bool {
        self.enabled && !self.has_exited()
    }

    /// Window growth in bytes for `acked_bytes` newly acked bytes.
    fn cwnd_increment(&self, acked_bytes: u64, segment_size: u64) -> u64 {
        let limit = HYSTART_L.saturating_mul(segment_size);
        match self.phase {
            HystartPhase::InConservativeSlowStart if self.enabled => {
                (acked_bytes / CSS_GROWTH_DIVISOR).min(limit)
            }
            _ => acked_bytes.min(limit),
        }
    }

    /// Start a new round if the current one was fully acknowledged. Return
    /// true if HyStart++ exited slow start.
    fn update_round(&mut self, tcb: &CongestionState) -> bool {
        match self.window_end {
            Some(window_end) if tcb.last_acked_sequence >= window_end => (),
            _ => return false,
        }

        self.window_end = Some(tcb.next_tx_sequence);
        self.last_round_min_rtt = self.current_round_min_rtt;
        self.current_round_min_rtt = Duration::MAX;
        self.rtt_sample_count = 0;

        if self.in_conservative_slow_start() {
            self.css_round_count += 1;
            if self.css_round_count >= CSS_ROUNDS {
                self.css_round_count = 0;
                self.phase = HystartPhase::Exited;
                return true;
            }
        }

        false
    }
}

impl SlowStart for HystartPlusPlus {
    fn on_ack(&mut self, tcb: &CongestionState, _segments_acked: u32, rtt: Duration) {
        if !self.active() || rtt.is_zero() {
            return;
        }

        if self.window_end.is_none() {
            self.window_end = Some(tcb.next_tx_sequence);
        }

        self.current_round_min_rtt = self.current_round_min_rtt.min(rtt);
        self.rtt_sample_count += 1;

        if self.rtt_sample_count < N_RTT_SAMPLE {
            return;
        }

        match self.phase {
            HystartPhase::InStandardSlowStart => {
                if self.current_round_min_rtt != Duration::MAX
                    && self.last_round_min_rtt != Duration::MAX
                {
                    let rtt_thresh = (self.last_round_min_rtt / MIN_RTT_DIVISOR)
                        .clamp(MIN_RTT_THRESH, MAX_RTT_THRESH);

                    if self.current_round_min_rtt
                        >= self.last_round_min_rtt.saturating_add(rtt_thresh)
                    {
                        trace!(
                            "HYSTART++. enter css, min_rtt {:?} -> {:?}",
                            self.last_round_min_rtt,
                            self.current_round_min_rtt
                        );
                        self.css_baseline_min_rtt = self.current_round_min_rtt;
                        self.phase = HystartPhase::InConservativeSlowStart;
                    }
                }
            }
            HystartPhase::InConservativeSlowStart => {
                if self.current_round_min_rtt < self.css_baseline_min_rtt {
                    // Spurious exit, resume standard slow start.
                    trace!("HYSTART++. resume standard slow start");
                    self.css_baseline_min_rtt = Duration::MAX;
                    self.phase = HystartPhase::InStandardSlowStart;
                    self.css_round_count = 0;
                }
            }
            HystartPhase::Exited => (),
        }
    }

    fn slow_start(&mut self, tcb: &mut CongestionState, segments_acked: u32) -> u32 {
        let acked_bytes = (segments_acked as u64).saturating_mul(tcb.segment_size);
        tcb.cwnd = tcb
            .cwnd
            .saturating_add(self.cwnd_increment(acked_bytes, tcb.segment_size));

        if self.active() && self.update_round(tcb) {
            tcb.ssthresh = tcb.cwnd;
            debug!(
                "HYSTART++. exit slow start, cwnd = ssthresh = {}",
                tcb.ssthresh
            );
        }

        0
    }

    fn on_congestion_event(&mut self) {
        if self.enabled {
            self.window_end = None;
            self.phase = HystartPhase::Exited;
        }
    }
}
