//! Buffer Monitor
//!
//! Runs a buffer session on the simulated driver and drains the input
//! queues from the async runtime, reporting throughput.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use asio_buffers::{
    audio::{QueueStats, SharedQueue},
    config::AppConfig,
    controller::{SwitchCounts, SwitchPolicy},
    driver::{Driver, IoLatency},
    ChannelList, Controller, Sample, SimulatedDriver,
};

/// Per-input consumer state
struct InputMonitor {
    number: u32,
    queue: SharedQueue,
    samples: u64,
    next_expected: Option<Sample>,
    discontinuities: u64,
}

impl InputMonitor {
    /// The simulated driver writes a continuing ramp, so any jump means
    /// samples were lost or duplicated
    fn drain(&mut self) -> usize {
        let samples = self.queue.fetch_all();
        for &sample in &samples {
            if let Some(expected) = self.next_expected {
                if sample != expected {
                    self.discontinuities += 1;
                }
            }
            self.next_expected = Some(sample.wrapping_add(1));
        }
        self.samples += samples.len() as u64;
        samples.len()
    }
}

#[derive(Serialize)]
struct InputSummary {
    channel: u32,
    samples: u64,
    discontinuities: u64,
    queue: QueueStats,
}

#[derive(Serialize)]
struct Summary {
    driver: String,
    sample_rate: f64,
    half_buffer_frames: usize,
    latency: IoLatency,
    policy: &'static str,
    elapsed_secs: f64,
    switches: SwitchCounts,
    inputs: Vec<InputSummary>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load_or_default(config_path.as_deref()).context("Failed to load config")?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.filter.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting buffer monitor");

    let driver = SimulatedDriver::new(config.driver.simulated());
    tracing::info!("Driver: {} (version {})", driver.name(), driver.version());

    println!("\n=== Available Channels ===");
    let channels = ChannelList::enumerate(&driver)?;
    for info in channels.inputs().iter().chain(channels.outputs()) {
        println!("  {:<10} {} (group {})", info.channel.to_string(), info.name, info.group);
    }
    println!();

    let mut controller = Controller::new(driver);
    let policy: SwitchPolicy = config.session.policy.into();
    let requested = config.session.channels();

    let frames = match config.session.half_buffer_frames {
        Some(frames) => frames,
        None => controller.driver().buffer_size()?.preferred,
    };
    controller.configure(&requested, frames, policy)?;

    let mut monitors: Vec<InputMonitor> = controller
        .session()
        .context("Session missing after configure")?
        .inputs()
        .iter()
        .filter(|buffer| buffer.is_enabled())
        .map(|buffer| InputMonitor {
            number: buffer.number(),
            queue: buffer.queue(),
            samples: 0,
            next_expected: None,
            discontinuities: 0,
        })
        .collect();

    let sample_rate = controller.driver().sample_rate()?;
    let latency = controller.driver().latencies()?;
    tracing::info!(
        "{} frames per half at {} Hz ({:.2} ms), latency in/out {}/{} frames",
        frames,
        sample_rate,
        frames as f64 * 1000.0 / sample_rate,
        latency.input,
        latency.output
    );

    controller.start()?;
    let start_time = Instant::now();

    let mut interval = tokio::time::interval(Duration::from_millis(config.session.fetch_interval_ms));
    let deadline = config
        .session
        .duration_secs
        .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));
    let mut last_report = Instant::now();

    tracing::info!("Streaming - press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            _ = sleep_until(deadline) => {
                tracing::info!("Run duration reached");
                break;
            }
        }

        for monitor in &mut monitors {
            monitor.drain();
        }

        // Periodic stats logging
        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            let counts = controller.switch_counts();
            for monitor in &monitors {
                tracing::info!(
                    "Input {}: {} samples, {} discontinuities, {} switches ({} faults)",
                    monitor.number,
                    monitor.samples,
                    monitor.discontinuities,
                    counts.switches,
                    counts.faults
                );
            }
        }
    }

    controller.stop()?;
    let switches = controller.switch_counts();
    let elapsed = start_time.elapsed();
    for monitor in &mut monitors {
        monitor.drain();
    }
    controller.dispose()?;

    let summary = Summary {
        driver: controller.driver().name().to_string(),
        sample_rate,
        half_buffer_frames: frames,
        latency,
        policy: policy.name(),
        elapsed_secs: elapsed.as_secs_f64(),
        switches,
        inputs: monitors
            .iter()
            .map(|m| InputSummary {
                channel: m.number,
                samples: m.samples,
                discontinuities: m.discontinuities,
                queue: m.queue.stats(),
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
