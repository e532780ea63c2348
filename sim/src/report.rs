use std::time::Duration;

use crate::{
    sensors::{Detection, SensorId},
    timer::SceneTime,
};

/// Everything a sensor saw during one completed revolution.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    pub sensor: SensorId,
    pub revolution: u64,
    pub completed_at: SceneTime,
    pub detections: Vec<Detection>,
}

/// Receives one report per completed revolution.
pub trait ReportSink: Send + Sync {
    fn report(&mut self, report: SweepReport);
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn report(&mut self, _report: SweepReport) {}
}

/// Writes each detection of a revolution to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn report(&mut self, report: SweepReport) {
        log::info!(
            "{} finished revolution {} at {} with {} detections",
            report.sensor,
            report.revolution,
            report.completed_at,
            report.detections.len()
        );

        for detection in &report.detections {
            log::info!("{detection}");
        }
    }
}

/// Forwards reports over a channel. Reports sent after the receiver is gone are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: flume::Sender<SweepReport>,
}

impl ChannelSink {
    pub fn new(sender: flume::Sender<SweepReport>) -> Self {
        Self { sender }
    }

    pub fn unbounded() -> (Self, flume::Receiver<SweepReport>) {
        let (sender, receiver) = flume::unbounded();
        (Self { sender }, receiver)
    }
}

impl ReportSink for ChannelSink {
    fn report(&mut self, report: SweepReport) {
        let sensor = report.sensor;
        let revolution = report.revolution;

        if self.sender.send(report).is_err() {
            log::warn!("Dropping revolution {revolution} from {sensor}: receiver disconnected");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color(pub [f32; 4]);

impl Color {
    pub const RED: Color = Color([1., 0., 0., 1.]);
}

impl Default for Color {
    fn default() -> Self {
        Color::RED
    }
}

/// A cast ray, as handed to a visualizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugRay {
    pub origin: glam::Vec3,
    pub direction: glam::Vec3,
    pub color: Color,
    pub duration: Duration,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DrawError {
    #[error("Debug draw backend unavailable: {0}")]
    Unavailable(String),
}

/// Cosmetic ray visualization. Errors are reported to the caller, who logs and moves on.
pub trait DebugDraw {
    fn draw_ray(&mut self, ray: DebugRay) -> Result<(), DrawError>;
}

/// Traces each ray to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDraw;

impl DebugDraw for LogDraw {
    fn draw_ray(&mut self, ray: DebugRay) -> Result<(), DrawError> {
        log::trace!(
            "Ray from {} towards {} for {} ms",
            ray.origin,
            ray.direction,
            ray.duration.as_millis()
        );
        Ok(())
    }
}
