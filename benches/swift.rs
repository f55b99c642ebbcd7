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

use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;
use rand::Rng;

use tswift::Config;
use tswift::CongestionControlAlgorithm;
use tswift::CongestionController;
use tswift::Swift;
use tswift::SwiftConfig;
use tswift::TcpCongState;

const SAMPLES: usize = 10_000;

fn rtt_samples() -> Vec<Duration> {
    let mut rng = rand::thread_rng();
    (0..SAMPLES)
        .map(|_| Duration::from_micros(rng.gen_range(20..400)))
        .collect()
}

pub fn on_ack_benchmark(c: &mut Criterion) {
    let rtts = rtt_samples();

    for algor in [
        CongestionControlAlgorithm::Swift,
        CongestionControlAlgorithm::NewReno,
    ] {
        let mut conf = Config::new();
        conf.set_congestion_control_algorithm(algor);
        conf.set_slow_start_thresh(20 * tswift::DEFAULT_SEGMENT_SIZE);
        let mut cc = tswift::build_congestion_controller(&conf).unwrap();
        let mut tcb = conf.congestion_state().unwrap();

        let mut i = 0;
        c.bench_function(&format!("{} on_ack", cc.name()), |b| {
            b.iter(|| {
                i = (i + 1) % SAMPLES;
                tcb.last_acked_sequence += tcb.segment_size;
                tcb.next_tx_sequence = tcb.last_acked_sequence + tcb.cwnd;
                cc.on_ack(black_box(&mut tcb), 1, black_box(rtts[i]));
            })
        });
    }
}

pub fn loss_benchmark(c: &mut Criterion) {
    let mut swift = Swift::new(SwiftConfig::default()).unwrap();
    let conf = Config::new();
    let mut tcb = conf.congestion_state().unwrap();
    tcb.next_tx_sequence = 100 * tcb.segment_size;

    c.bench_function("SWIFT loss and ssthresh", |b| {
        b.iter(|| {
            swift.on_congestion_state_set(&mut tcb, TcpCongState::Loss);
            black_box(swift.ssthresh(&tcb, tcb.bytes_in_flight()))
        })
    });
}

criterion_group!(benches, on_ack_benchmark, loss_benchmark);
criterion_main!(benches);
