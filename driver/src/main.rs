mod scenario;

use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use clap::Parser;
use radar_sim::{
    Sensor, SensorId,
    report::{ChannelSink, LogDraw, LogSink, ReportSink, SweepReport},
    timer::{Clock, MonotonicClock},
};

use crate::scenario::ScenarioFile;

/// Runs a radar sweep scenario without a window and logs what the sensors see.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Scenario description in YAML.
    scenario: PathBuf,
    /// Seconds of scene time to simulate. Overrides the scenario.
    #[arg(long)]
    duration: Option<f64>,
    /// Seconds per tick. Overrides the scenario.
    #[arg(long)]
    dt: Option<f64>,
    /// Pace ticks against the wall clock instead of running as fast as possible.
    #[arg(long)]
    realtime: bool,
    /// Trace every cast ray.
    #[arg(long)]
    draw_rays: bool,
}

#[derive(Debug, Default)]
struct SensorTally {
    revolutions: u64,
    detections: usize,
}

fn drain_reports(
    receiver: &flume::Receiver<SweepReport>,
    log_sink: &mut LogSink,
    tally: &mut BTreeMap<SensorId, SensorTally>,
) {
    for report in receiver.try_iter() {
        let entry = tally.entry(report.sensor).or_default();
        entry.revolutions += 1;
        entry.detections += report.detections.len();

        log_sink.report(report);
    }
}

pub fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let scenario = ScenarioFile::load(&args.scenario)?;

    let duration = args.duration.unwrap_or(scenario.duration_s);
    let dt = args.dt.unwrap_or(scenario.dt_s);
    if !(dt.is_finite() && dt > 0.) {
        anyhow::bail!("--dt must be positive, got {dt}");
    }
    if !(duration.is_finite() && duration >= 0.) {
        anyhow::bail!("--duration must not be negative, got {duration}");
    }
    let dt = Duration::try_from_secs_f64(dt)?;
    let duration = Duration::try_from_secs_f64(duration)?;

    let (sink, receiver) = ChannelSink::unbounded();
    let (mut scene_loop, mounted) = scenario.build(|| sink.clone())?;
    if args.draw_rays {
        scene_loop = scene_loop.with_debug_draw(LogDraw);
    }

    log::info!(
        "Running {} radars and {} lidars for {:.2} s at {} ms per tick",
        mounted.radars.len(),
        mounted.lidars.len(),
        duration.as_secs_f64(),
        dt.as_millis()
    );

    let mut log_sink = LogSink;
    let mut tally = BTreeMap::new();
    let wall = MonotonicClock::new();

    while scene_loop.time().elapsed() < duration {
        let summary = scene_loop.step(dt);

        for sensor in &summary.unavailable {
            log::debug!("{sensor} unavailable at {}", summary.time);
        }

        drain_reports(&receiver, &mut log_sink, &mut tally);

        if args.realtime {
            let ahead = summary.time.elapsed().saturating_sub(wall.now().elapsed());
            if !ahead.is_zero() {
                std::thread::sleep(ahead);
            }
        }
    }

    drain_reports(&receiver, &mut log_sink, &mut tally);

    for radar in &mounted.radars {
        let radar = radar.read();
        let (revolutions, detections) = tally
            .get(&radar.id())
            .map_or((0, 0), |t| (t.revolutions, t.detections));
        log::info!(
            "{}: {} steps, {} revolutions reported with {} detections, {} pending at {:.1} deg",
            radar.id(),
            radar.steps(),
            revolutions,
            detections,
            radar.detections().len(),
            radar.angle_degrees()
        );
    }

    for lidar in &mounted.lidars {
        let lidar = lidar.read();
        log::info!(
            "{}: last scan hit {} of {} beams",
            lidar.id(),
            lidar.detections().len(),
            lidar.angles().len()
        );
    }

    Ok(())
}
