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

#![no_main]

use std::time::Duration;

use lazy_static::lazy_static;
use libfuzzer_sys::fuzz_target;

use tswift::CongestionController;
use tswift::CongestionState;
use tswift::Swift;
use tswift::SwiftConfig;
use tswift::TcpCongState;

lazy_static! {
    static ref CONFIG: SwiftConfig = {
        let mut conf = SwiftConfig::default();
        conf.set_max_decrease_fraction(1.0)
            .set_beta_range(0.0, 1.0)
            .set_win_thresh(4);
        conf
    };
}

const SEGMENT_SIZE: u64 = 1460;

// Every 4 bytes of input drive one event: an ack carrying a RTT sample, a
// loss, a retransmission timeout or a new ssthresh.
fuzz_target!(|data: &[u8]| {
    let mut swift = Swift::new(CONFIG.clone()).unwrap();
    let mut tcb = CongestionState::new(SEGMENT_SIZE, 10 * SEGMENT_SIZE, u64::MAX).unwrap();

    for ev in data.chunks_exact(4) {
        let arg = u16::from_le_bytes([ev[2], ev[3]]) as u64;
        match ev[0] % 8 {
            0 => {
                swift.on_congestion_state_set(&mut tcb, TcpCongState::Loss);
            }
            1 => {
                swift.on_retransmission_timeout(&mut tcb);
            }
            2 => {
                tcb.ssthresh = swift.ssthresh(&tcb, tcb.bytes_in_flight());
                assert!(tcb.ssthresh >= 2 * SEGMENT_SIZE);
            }
            _ => {
                let acked = ev[1] % 16;
                tcb.last_acked_sequence = tcb
                    .next_tx_sequence
                    .min(tcb.last_acked_sequence + acked as u64 * SEGMENT_SIZE);
                tcb.next_tx_sequence = tcb.last_acked_sequence + tcb.cwnd;

                let before = tcb.cwnd;
                swift.on_ack(&mut tcb, acked as u32, Duration::from_micros(arg));
                assert_eq!(swift.retransmit_count(), 0);
                if arg == 0 {
                    assert_eq!(tcb.cwnd, before);
                }
            }
        }

        assert!(tcb.cwnd >= SEGMENT_SIZE);
        assert!(swift.alpha() >= 0.0);
        assert!(swift.target_delay(&tcb) >= Duration::from_micros(101));
    }
});
