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

//! TSWIFT is an implementation of the Swift delay-based congestion control
//! algorithm for TCP-like transports.
//!
//! Swift compares every RTT sample against a target delay that depends on
//! the congestion window and the number of hops on the path. Below the
//! target the window grows additively; at or above it the window shrinks
//! multiplicatively, bounded so that a single round trip never cuts more than
//! a configured fraction of the window.
//!
//! ## Usage
//!
//! The transport (the host) owns a [`CongestionState`] per connection and
//! feeds acknowledgment and loss events into a [`CongestionController`]:
//!
//! ```
//! use std::time::Duration;
//! use tswift::Config;
//! use tswift::TcpCongState;
//!
//! let config = Config::new();
//! let mut tcb = config.congestion_state()?;
//! let mut cc = tswift::build_congestion_controller(&config)?;
//!
//! tcb.next_tx_sequence = 10 * tcb.segment_size;
//! tcb.last_acked_sequence = tcb.segment_size;
//! cc.on_ack(&mut tcb, 1, Duration::from_micros(80));
//!
//! cc.on_congestion_state_set(&mut tcb, TcpCongState::Loss);
//! tcb.ssthresh = cc.ssthresh(&tcb, tcb.bytes_in_flight());
//! # Ok::<(), tswift::Error>(())
//! ```
//!
//! The controller never creates or destroys the congestion state. It reads
//! the sequence numbers and segment size, and writes back `cwnd`.

#![allow(unused_imports)]

use strum_macros::EnumIter;

/// The default maximum segment size in bytes.
pub const DEFAULT_SEGMENT_SIZE: u64 = 1460;

/// The default initial congestion window in segments.
const DEFAULT_INITIAL_CONGESTION_WINDOW: u64 = 10;

/// Result type for congestion control operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Recovery states of a TCP sender, as reported by the host's loss/recovery
/// state machine.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, EnumIter)]
pub enum TcpCongState {
    /// Normal state, no dubious events.
    #[default]
    Open,

    /// Duplicate acks or SACKs were received.
    Disorder,

    /// The window was reduced due to an explicit congestion notification.
    Cwr,

    /// Fast recovery after a triple duplicate ack.
    Recovery,

    /// Retransmission timeout or loss detected, all in-flight data is
    /// considered lost.
    Loss,
}

/// Per-connection congestion state owned by the host.
///
/// Congestion controllers only mutate `cwnd` (and `ssthresh` when the host
/// asks for a new threshold); all other fields are maintained by the host.
#[derive(Debug, Clone)]
pub struct CongestionState {
    /// Congestion window in bytes.
    pub cwnd: u64,

    /// Slow start threshold in bytes.
    pub ssthresh: u64,

    /// Segment size in bytes.
    pub segment_size: u64,

    /// Next sequence number to be transmitted.
    pub next_tx_sequence: u64,

    /// Highest cumulatively acknowledged sequence number.
    pub last_acked_sequence: u64,

    /// Current recovery state.
    pub cong_state: TcpCongState,
}

impl CongestionState {
    pub fn new(segment_size: u64, initial_cwnd: u64, ssthresh: u64) -> Result<Self> {
        if segment_size == 0 {
            return Err(Error::InvalidState("zero segment size".into()));
        }

        Ok(Self {
            cwnd: initial_cwnd.max(segment_size),
            ssthresh,
            segment_size,
            next_tx_sequence: 0,
            last_acked_sequence: 0,
            cong_state: TcpCongState::Open,
        })
    }

    /// Congestion window in whole segments.
    pub fn cwnd_in_segments(&self) -> u64 {
        self.cwnd / self.segment_size.max(1)
    }

    /// Bytes sent but not yet cumulatively acknowledged.
    pub fn bytes_in_flight(&self) -> u64 {
        self.next_tx_sequence
            .saturating_sub(self.last_acked_sequence)
    }
}

/// Configurations about congestion control.
#[derive(Debug, Clone)]
pub struct Config {
    /// Segment size in bytes.
    segment_size: u64,

    /// The initial congestion window in segments.
    initial_congestion_window: u64,

    /// The initial slow start threshold in bytes.
    slow_start_thresh: u64,

    /// The congestion control algorithm used for a connection.
    congestion_control_algorithm: CongestionControlAlgorithm,

    /// Use HyStart++ instead of standard slow start.
    hystart_enabled: bool,

    /// Swift parameters.
    swift: SwiftConfig,
}

impl Config {
    /// Create default configuration.
    ///
    /// The configuration may be customized by calling related set methods.
    pub fn new() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            initial_congestion_window: DEFAULT_INITIAL_CONGESTION_WINDOW,
            slow_start_thresh: u64::MAX,
            congestion_control_algorithm: CongestionControlAlgorithm::default(),
            hystart_enabled: false,
            swift: SwiftConfig::default(),
        }
    }

    /// Set the segment size in bytes. Zero is ignored.
    pub fn set_segment_size(&mut self, v: u64) {
        if v > 0 {
            self.segment_size = v;
        }
    }

    /// Set the initial congestion window in segments. The value is at least 1.
    pub fn set_initial_congestion_window(&mut self, v: u64) {
        self.initial_congestion_window = v.max(1);
    }

    /// Set the initial slow start threshold in bytes.
    pub fn set_slow_start_thresh(&mut self, v: u64) {
        self.slow_start_thresh = v;
    }

    /// Set the congestion control algorithm.
    pub fn set_congestion_control_algorithm(&mut self, v: CongestionControlAlgorithm) {
        self.congestion_control_algorithm = v;
    }

    /// Enable HyStart++ for the slow start phase. Disabled by default.
    pub fn enable_hystart(&mut self, v: bool) {
        self.hystart_enabled = v;
    }

    /// Whether HyStart++ is enabled.
    pub fn hystart_enabled(&self) -> bool {
        self.hystart_enabled
    }

    /// Set the Swift parameters. The parameters are validated when a
    /// controller is built.
    pub fn set_swift_config(&mut self, v: SwiftConfig) {
        self.swift = v;
    }

    /// Return the Swift parameters.
    pub fn swift_config(&self) -> &SwiftConfig {
        &self.swift
    }

    /// Return the selected congestion control algorithm.
    pub fn congestion_control_algorithm(&self) -> CongestionControlAlgorithm {
        self.congestion_control_algorithm
    }

    /// Create the congestion state for a new connection.
    pub fn congestion_state(&self) -> Result<CongestionState> {
        CongestionState::new(
            self.segment_size,
            self.initial_congestion_window
                .saturating_mul(self.segment_size),
            self.slow_start_thresh,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}


pub use crate::congestion_control::build_congestion_controller;
pub use crate::congestion_control::CongestionControlAlgorithm;
pub use crate::congestion_control::CongestionController;
pub use crate::congestion_control::CongestionStats;
pub use crate::congestion_control::HystartPlusPlus;
pub use crate::congestion_control::NewReno;
pub use crate::congestion_control::SlowStart;
pub use crate::congestion_control::StandardSlowStart;
pub use crate::congestion_control::Swift;
pub use crate::congestion_control::SwiftConfig;
pub use crate::error::Error;

#[path = "congestion_control/congestion_control.rs"]
pub mod congestion_control;

pub mod error;
