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

use std::collections::VecDeque;
use std::time::Duration;

use log::debug;
use log::trace;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use tswift::build_congestion_controller;
use tswift::Config;
use tswift::CongestionController;
use tswift::CongestionState;
use tswift::TcpCongState;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Return the log target. Logs go to `stderr` if no file is given.
pub fn log_target(log_file: &Option<String>) -> Result<env_logger::Target> {
    Ok(match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            env_logger::Target::Pipe(Box::new(file))
        }
        None => env_logger::Target::Stderr,
    })
}

/// A bottleneck link with a drop-tail buffer.
#[derive(Debug, Clone)]
pub struct Link {
    /// Bandwidth in bytes per second.
    pub bandwidth: u64,

    /// Round trip propagation delay.
    pub propagation_delay: Duration,

    /// Buffer size in bytes.
    pub buffer_size: u64,

    /// Max random delay added to each RTT sample.
    pub jitter: Duration,
}

impl Link {
    /// Time to serialize `bytes` onto the link.
    fn transmission_time(&self, bytes: u64) -> Duration {
        Duration::from_secs_f64(bytes as f64 / self.bandwidth.max(1) as f64)
    }

    /// Bytes queued when the link is busy until `busy_until`.
    fn queued_bytes(&self, now: Duration, busy_until: Duration) -> u64 {
        (busy_until.saturating_sub(now).as_secs_f64() * self.bandwidth as f64) as u64
    }
}

/// A segment sent over the link.
#[derive(Debug)]
struct Segment {
    /// Sequence number after the last byte of the segment.
    end_seq: u64,

    /// Time the segment was sent.
    sent: Duration,

    /// Time the ack arrives, or the loss is detected.
    acked: Duration,

    /// Dropped by the bottleneck.
    lost: bool,
}

/// State of the sender after an ack.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Time since the start of the simulation.
    pub time: Duration,

    /// Congestion window in bytes.
    pub cwnd: u64,

    /// Slow start threshold in bytes.
    pub ssthresh: u64,

    /// RTT sample of the ack.
    pub rtt: Duration,

    /// Bytes queued at the bottleneck.
    pub queued: u64,
}

/// Totals of a simulation run.
#[derive(Debug, Default, Clone)]
pub struct Summary {
    /// Bytes acknowledged.
    pub delivered: u64,

    /// Segments dropped by the bottleneck.
    pub lost_segments: u64,

    /// Loss events reported to the congestion controller.
    pub loss_events: u64,

    /// Simulated time.
    pub duration: Duration,
}

/// A single flow over a single bottleneck, driving a congestion controller
/// the way a TCP sender does.
///
/// Dropped segments are detected when their ack would have arrived and are
/// treated as repaired from then on, so only the window dynamics are modeled.
pub struct Simulator {
    link: Link,
    cc: Box<dyn CongestionController>,
    tcb: CongestionState,
    now: Duration,

    /// Time the bottleneck finishes sending the queued bytes.
    link_busy_until: Duration,
    in_flight: VecDeque<Segment>,

    /// Losses of segments sent before this sequence number belong to the
    /// current loss event.
    recovery_end: u64,
    rng: StdRng,
    summary: Summary,
}

impl Simulator {
    pub fn new(link: Link, conf: &Config, seed: u64) -> Result<Self> {
        Ok(Self {
            link,
            cc: build_congestion_controller(conf)?,
            tcb: conf.congestion_state()?,
            now: Duration::ZERO,
            link_busy_until: Duration::ZERO,
            in_flight: VecDeque::new(),
            recovery_end: 0,
            rng: StdRng::seed_from_u64(seed),
            summary: Summary::default(),
        })
    }

    /// Name of the congestion controller.
    pub fn algorithm(&self) -> &str {
        self.cc.name()
    }

    /// Run for `duration` of simulated time. `on_sample` is called after
    /// every ack.
    pub fn run<F: FnMut(&Sample)>(&mut self, duration: Duration, mut on_sample: F) -> Summary {
        loop {
            self.send();

            let seg = match self.in_flight.pop_front() {
                Some(seg) => seg,
                None => break,
            };
            if seg.acked > duration {
                break;
            }
            self.now = self.now.max(seg.acked);

            if seg.lost {
                self.on_loss(&seg);
                self.tcb.last_acked_sequence = seg.end_seq;
                continue;
            }

            self.tcb.last_acked_sequence = seg.end_seq;
            self.summary.delivered += self.tcb.segment_size;

            let jitter = self.jitter();
            let rtt = seg.acked.saturating_sub(seg.sent) + jitter;
            self.cc.on_ack(&mut self.tcb, 1, rtt);

            on_sample(&Sample {
                time: self.now,
                cwnd: self.tcb.cwnd,
                ssthresh: self.tcb.ssthresh,
                rtt,
                queued: self.link.queued_bytes(self.now, self.link_busy_until),
            });
        }

        self.summary.duration = duration;
        self.summary.loss_events = self.cc.stats().loss_events;
        self.summary.clone()
    }

    /// Send as many segments as the congestion window allows.
    fn send(&mut self) {
        let segment_size = self.tcb.segment_size;

        while self.tcb.bytes_in_flight() + segment_size <= self.tcb.cwnd {
            let queue_start = self.now.max(self.link_busy_until);
            let queued = self.link.queued_bytes(self.now, self.link_busy_until);
            let departure = queue_start + self.link.transmission_time(segment_size);
            let lost = queued + segment_size > self.link.buffer_size;
            if !lost {
                self.link_busy_until = departure;
            }

            self.tcb.next_tx_sequence += segment_size;
            self.in_flight.push_back(Segment {
                end_seq: self.tcb.next_tx_sequence,
                sent: self.now,
                acked: departure + self.link.propagation_delay,
                lost,
            });
            trace!(
                "sent seq={} queued={} lost={}",
                self.tcb.next_tx_sequence,
                queued,
                lost
            );
        }
    }

    /// Loss detection, at most one loss event per window.
    fn on_loss(&mut self, seg: &Segment) {
        self.summary.lost_segments += 1;
        if seg.end_seq <= self.recovery_end {
            return;
        }
        self.recovery_end = self.tcb.next_tx_sequence;

        self.tcb.cong_state = TcpCongState::Loss;
        self.cc.on_congestion_state_set(&mut self.tcb, TcpCongState::Loss);
        self.tcb.ssthresh = self.cc.ssthresh(&self.tcb, self.tcb.bytes_in_flight());
        self.tcb.cwnd = self.tcb.ssthresh;
        self.tcb.cong_state = TcpCongState::Open;

        debug!(
            "{:?} loss at seq {}, cwnd = ssthresh = {}",
            self.now, seg.end_seq, self.tcb.cwnd
        );
    }

    fn jitter(&mut self) -> Duration {
        let max = self.link.jitter.as_nanos() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.rng.gen_range(0..=max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tswift::CongestionControlAlgorithm;

    fn link(buffer_segments: u64) -> Link {
        Link {
            bandwidth: 1_250_000_000,
            propagation_delay: Duration::from_micros(20),
            buffer_size: buffer_segments * 1460,
            jitter: Duration::from_micros(2),
        }
    }

    #[test]
    fn simulate_swift() -> Result<()> {
        let mut sim = Simulator::new(link(1000), &Config::new(), 1)?;
        assert_eq!(sim.algorithm(), "SWIFT");

        let mut samples = 0;
        let summary = sim.run(Duration::from_millis(20), |s| {
            samples += 1;
            assert!(s.cwnd >= 1460);
        });
        assert!(samples > 0);
        assert!(summary.delivered > 0);
        Ok(())
    }

    #[test]
    fn simulate_new_reno_losses() -> Result<()> {
        let mut conf = Config::new();
        conf.set_congestion_control_algorithm(CongestionControlAlgorithm::NewReno);
        let mut sim = Simulator::new(link(8), &conf, 1)?;

        let summary = sim.run(Duration::from_millis(20), |_| ());
        assert!(summary.lost_segments > 0);
        assert!(summary.loss_events > 0);
        assert!(summary.loss_events <= summary.lost_segments);
        Ok(())
    }
}
