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

use core::str::FromStr;
use std::fmt;
use std::time::Duration;

use strum_macros::EnumIter;

use crate::Config;
use crate::CongestionState;
use crate::Error;
use crate::Result;
use crate::TcpCongState;
pub use hystart_plus_plus::HystartPlusPlus;
pub use new_reno::NewReno;
pub use slow_start::SlowStart;
pub use slow_start::StandardSlowStart;
pub use swift::Swift;
pub use swift::SwiftConfig;

/// Available congestion control algorithm
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, EnumIter)]
pub enum CongestionControlAlgorithm {
    /// Swift is a delay-based algorithm. It keeps the RTT close to a target
    /// delay that scales with the congestion window and the path length,
    /// using additive increase below the target and multiplicative decrease
    /// above it.
    #[default]
    Swift,

    /// NewReno grows the window by one segment per round trip in congestion
    /// avoidance and halves it on loss.
    NewReno,
}

impl FromStr for CongestionControlAlgorithm {
    type Err = Error;

    fn from_str(algor: &str) -> Result<CongestionControlAlgorithm> {
        if algor.eq_ignore_ascii_case("swift") {
            Ok(CongestionControlAlgorithm::Swift)
        } else if algor.eq_ignore_ascii_case("newreno") || algor.eq_ignore_ascii_case("new_reno")
        {
            Ok(CongestionControlAlgorithm::NewReno)
        } else {
            Err(Error::InvalidConfig("unknown".into()))
        }
    }
}

/// Congestion control statistics.
#[derive(Debug, Default, Clone)]
pub struct CongestionStats {
    /// Total RTT samples taken into account.
    pub rtt_samples: u64,

    /// Total window increases in congestion avoidance.
    pub increase_events: u64,

    /// Total multiplicative window decreases.
    pub decrease_events: u64,

    /// Total loss events.
    pub loss_events: u64,

    /// Total segments acked in slow start.
    pub segments_acked_in_slow_start: u64,

    /// Total segments acked.
    pub segments_acked_in_total: u64,
}

/// Congestion control interfaces shared by different algorithms.
///
/// The host delivers the events of one connection in order, and each
/// connection owns its own controller.
pub trait CongestionController {
    /// Name of congestion control algorithm.
    fn name(&self) -> &str;

    /// Callback for an acknowledgment which newly acked `segments_acked`
    /// segments. A zero `rtt` means that the ack carries no timing
    /// information.
    fn on_ack(&mut self, tcb: &mut CongestionState, segments_acked: u32, rtt: Duration);

    /// Callback when the host's loss/recovery state machine changes state.
    fn on_congestion_state_set(&mut self, tcb: &mut CongestionState, new_state: TcpCongState) {}

    /// Callback when the retransmission timer fires.
    fn on_retransmission_timeout(&mut self, tcb: &mut CongestionState) {}

    /// Slow start threshold in bytes to use after a loss.
    fn ssthresh(&self, tcb: &CongestionState, bytes_in_flight: u64) -> u64;

    /// Check if in slow start.
    fn in_slow_start(&self, tcb: &CongestionState) -> bool {
        tcb.cwnd < tcb.ssthresh
    }

    /// Create an independent copy of the controller with the same
    /// parameters and state, e.g. for a child connection.
    fn fork(&self) -> Box<dyn CongestionController>;

    /// Congestion stats.
    fn stats(&self) -> &CongestionStats;
}

impl fmt::Debug for dyn CongestionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "congestion controller {}.", self.name())
    }
}

/// Build a congestion controller.
pub fn build_congestion_controller(conf: &Config) -> Result<Box<dyn CongestionController>> {
    let swift_conf = conf.swift_config().clone();

    Ok(match (conf.congestion_control_algorithm(), conf.hystart_enabled()) {
        (CongestionControlAlgorithm::Swift, false) => Box::new(Swift::new(swift_conf)?),
        (CongestionControlAlgorithm::Swift, true) => Box::new(Swift::with_slow_start(
            swift_conf,
            HystartPlusPlus::new(true),
        )?),
        (CongestionControlAlgorithm::NewReno, false) => Box::new(NewReno::new()),
        (CongestionControlAlgorithm::NewReno, true) => {
            Box::new(NewReno::with_slow_start(HystartPlusPlus::new(true)))
        }
    })
}


#[path = "swift/swift.rs"]
mod swift;

mod hystart_plus_plus;
mod new_reno;
mod slow_start;
