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

use clap::error::ErrorKind;
use clap::CommandFactory;
use clap::Parser;
use log::info;
use log::warn;
use statrs::statistics::Data;
use statrs::statistics::Distribution;
use statrs::statistics::Max;
use statrs::statistics::Min;
use statrs::statistics::OrderStatistics;

use tswift::Config;
use tswift::CongestionControlAlgorithm;
use tswift::SwiftConfig;
use tswift_tools::Link;
use tswift_tools::Result;
use tswift_tools::Simulator;

#[derive(Parser, Debug, Clone)]
#[clap(name = "tswift_sim")]
pub struct SimOpt {
    /// Congestion control algorithm.
    #[clap(long, default_value = "SWIFT")]
    pub congestion_control_algor: CongestionControlAlgorithm,

    /// Swift parameters in a JSON file. Missing fields take default values.
    #[clap(long, value_name = "FILE")]
    pub swift_config: Option<String>,

    /// Enable HyStart++.
    #[clap(long)]
    pub enable_hystart: bool,

    /// Segment size in bytes.
    #[clap(long, default_value = "1460", value_name = "NUM")]
    pub segment_size: u64,

    /// Initial congestion window in segments.
    #[clap(long, default_value = "10", value_name = "NUM")]
    pub initial_congestion_window: u64,

    /// Bottleneck bandwidth in Mbps.
    #[clap(short, long, default_value = "10000", value_name = "NUM")]
    pub bandwidth: u64,

    /// Round trip propagation delay in microseconds.
    #[clap(long, default_value = "20", value_name = "TIME")]
    pub propagation_delay: u64,

    /// Bottleneck buffer size in segments.
    #[clap(long, default_value = "500", value_name = "NUM")]
    pub buffer_size: u64,

    /// Max random delay added to each RTT sample in microseconds.
    #[clap(long, default_value = "0", value_name = "TIME")]
    pub jitter: u64,

    /// Simulated time in milliseconds.
    #[clap(short, long, default_value = "100", value_name = "TIME")]
    pub duration: u64,

    /// Trace interval in microseconds. "0" means one line per ack.
    #[clap(short, long, default_value = "1000", value_name = "TIME")]
    pub interval: u64,

    /// Seed of the jitter generator.
    #[clap(long, default_value = "0", value_name = "NUM")]
    pub seed: u64,

    /// Log level, support OFF/ERROR/WARN/INFO/DEBUG/TRACE.
    #[clap(long, default_value = "INFO", value_name = "STR")]
    pub log_level: log::LevelFilter,

    /// Log file path. If no file is specified, logs will be written to `stderr`.
    #[clap(long, value_name = "FILE")]
    pub log_file: Option<String>,
}

fn parse_option() -> std::result::Result<SimOpt, clap::error::Error> {
    let option = SimOpt::parse();

    if option.bandwidth == 0 {
        return Err(SimOpt::command().error(
            ErrorKind::InvalidValue,
            "Bandwidth must be positive",
        ));
    }

    if option.segment_size == 0 {
        return Err(SimOpt::command().error(
            ErrorKind::InvalidValue,
            "Segment size must be positive",
        ));
    }

    Ok(option)
}

fn process_option(option: &SimOpt) -> Result<Config> {
    env_logger::builder()
        .target(tswift_tools::log_target(&option.log_file)?)
        .filter_level(option.log_level)
        .format_timestamp_millis()
        .init();

    let mut config = Config::new();
    config.set_congestion_control_algorithm(option.congestion_control_algor);
    config.enable_hystart(option.enable_hystart);
    config.set_segment_size(option.segment_size);
    config.set_initial_congestion_window(option.initial_congestion_window);

    if let Some(path) = &option.swift_config {
        let swift_config = match std::fs::read_to_string(path) {
            Ok(s) => SwiftConfig::from_json(&s)?,
            Err(e) => {
                warn!("read swift config {} error: {:?}", path, e);
                return Err(Box::new(e));
            }
        };
        info!("swift config {}", swift_config.to_json()?);
        config.set_swift_config(swift_config);
    }

    Ok(config)
}

fn main() -> Result<()> {
    // Parse simulator option.
    let option = match parse_option() {
        Ok(option) => option,
        Err(e) => e.exit(),
    };

    // Process simulator option.
    let config = process_option(&option)?;

    let link = Link {
        bandwidth: option.bandwidth * 1_000_000 / 8,
        propagation_delay: Duration::from_micros(option.propagation_delay),
        buffer_size: option.buffer_size * option.segment_size,
        jitter: Duration::from_micros(option.jitter),
    };
    let mut sim = Simulator::new(link, &config, option.seed)?;
    info!("simulate {} over {}", sim.algorithm(), sim_link_desc(&option));

    let interval = Duration::from_micros(option.interval);
    let segment_size = option.segment_size as f64;
    let mut next_report = Duration::ZERO;
    let mut rtts = Vec::new();

    println!("time_us cwnd_seg ssthresh_seg rtt_us queued_bytes");
    let summary = sim.run(Duration::from_millis(option.duration), |s| {
        rtts.push(s.rtt.as_micros() as f64);
        if s.time < next_report {
            return;
        }
        next_report = s.time + interval;

        let ssthresh = if s.ssthresh == u64::MAX {
            f64::INFINITY
        } else {
            s.ssthresh as f64 / segment_size
        };
        println!(
            "{} {:.2} {:.2} {} {}",
            s.time.as_micros(),
            s.cwnd as f64 / segment_size,
            ssthresh,
            s.rtt.as_micros(),
            s.queued
        );
    });

    let goodput = summary.delivered as f64 * 8.0 / summary.duration.as_secs_f64() / 1e6;
    println!(
        "delivered {} bytes, goodput {:.2} Mbps, lost {} segments in {} loss events",
        summary.delivered, goodput, summary.lost_segments, summary.loss_events
    );

    if !rtts.is_empty() {
        let mut rtts = Data::new(rtts);
        println!(
            "rtt (us): min {:.2}, mean {:.2}, median {:.2}, p99 {:.2}, max {:.2}",
            rtts.min(),
            rtts.mean().unwrap_or(0.0),
            rtts.median(),
            rtts.percentile(99),
            rtts.max()
        );
    }

    Ok(())
}

fn sim_link_desc(option: &SimOpt) -> String {
    format!(
        "{}Mbps/{}us/{}segs",
        option.bandwidth, option.propagation_delay, option.buffer_size
    )
}
