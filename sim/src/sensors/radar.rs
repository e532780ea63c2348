use std::time::Duration;

use crate::{
    math::{Ray, sweep_direction},
    report::{Color, DebugRay, NullSink, ReportSink, SweepReport},
    sensors::{
        Detection, DetectionBuffer, Sensor, SensorContext, SensorError, SensorId, TickOutcome,
        noise::{NoiseConfig, NoiseModel},
    },
    timer::{SceneTime, StepTimer},
};

/// Which position a detection records as its origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordedPosition {
    /// The sensor's world position at the time of the cast.
    #[default]
    Sensor,
    /// Always the world origin, as legacy recordings did.
    WorldOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct DebugRayStyle {
    pub enabled: bool,
    pub color: [f32; 4],
    pub duration_s: f32,
}

impl Default for DebugRayStyle {
    fn default() -> Self {
        Self {
            enabled: true,
            color: Color::RED.0,
            duration_s: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    /// Degrees added to the sweep angle per step.
    pub angle_increment_deg: f32,
    /// Seconds between a step being scheduled and it running.
    pub tick_delay_s: f64,
    pub start_angle_deg: f32,
    pub max_range: Option<f32>,
    pub noise: NoiseConfig,
    pub recorded_position: RecordedPosition,
    pub debug_ray: DebugRayStyle,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            angle_increment_deg: 5.,
            tick_delay_s: 0.05,
            start_angle_deg: 0.,
            max_range: None,
            noise: NoiseConfig::Identity,
            recorded_position: RecordedPosition::Sensor,
            debug_ray: DebugRayStyle::default(),
        }
    }
}

impl RadarConfig {
    pub fn validate(&self) -> Result<(), SensorError> {
        if !(self.angle_increment_deg.is_finite() && self.angle_increment_deg > 0.) {
            return Err(SensorError::InvalidConfiguration {
                field: "angle_increment_deg",
                reason: "must be finite and positive",
            });
        }

        // Below half an f32 step at 360 degrees the sum rounds back to the old angle.
        if 360f32 + self.angle_increment_deg == 360f32 {
            return Err(SensorError::InvalidConfiguration {
                field: "angle_increment_deg",
                reason: "is too small to move the angle",
            });
        }

        if !(self.tick_delay_s.is_finite() && self.tick_delay_s > 0.) {
            return Err(SensorError::InvalidConfiguration {
                field: "tick_delay_s",
                reason: "must be finite and positive",
            });
        }

        if !(0.0..360.0).contains(&self.start_angle_deg) {
            return Err(SensorError::InvalidConfiguration {
                field: "start_angle_deg",
                reason: "must lie in [0, 360)",
            });
        }

        if let Some(range) = self.max_range
            && !(range.is_finite() && range > 0.)
        {
            return Err(SensorError::InvalidConfiguration {
                field: "max_range",
                reason: "must be finite and positive",
            });
        }

        if !(self.debug_ray.duration_s.is_finite() && self.debug_ray.duration_s >= 0.) {
            return Err(SensorError::InvalidConfiguration {
                field: "debug_ray.duration_s",
                reason: "must be finite and not negative",
            });
        }

        self.noise.validate()
    }
}

/// Rotating single-beam ranging sensor.
///
/// Each step advances the sweep angle by a fixed increment and casts one ray in the
/// sensor's horizontal plane. Hits accumulate until the angle passes a full turn, at
/// which point they are handed to the [`ReportSink`] and the buffer starts over. The
/// angle wraps by subtracting whole turns, so a revolution that overshoots 360 degrees
/// starts the next one from the remainder.
///
/// Steps are rate limited through a [`StepTimer`]: [`RadarSweep::tick`] registers a step
/// when none is pending and runs it once its delay has elapsed. The next step is only
/// registered on the tick after that, so there is never more than one in flight.
pub struct RadarSweep {
    id: SensorId,
    increment: f32,
    delay: Duration,
    angle: f32,
    max_range: Option<f32>,
    recorded_position: RecordedPosition,
    debug_style: DebugRayStyle,
    debug_duration: Duration,
    timer: StepTimer,
    active: bool,
    unavailable: bool,
    revolution: u64,
    steps: u64,
    buffer: DetectionBuffer,
    noise: Box<dyn NoiseModel>,
    sink: Box<dyn ReportSink>,
}

impl std::fmt::Debug for RadarSweep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadarSweep")
            .field("id", &self.id)
            .field("increment", &self.increment)
            .field("delay", &self.delay)
            .field("angle", &self.angle)
            .field("timer", &self.timer)
            .field("active", &self.active)
            .field("revolution", &self.revolution)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

impl RadarSweep {
    pub fn new(id: SensorId, config: &RadarConfig) -> Result<Self, SensorError> {
        config.validate()?;

        let delay = Duration::try_from_secs_f64(config.tick_delay_s).map_err(|_| {
            SensorError::InvalidConfiguration {
                field: "tick_delay_s",
                reason: "is too large",
            }
        })?;

        let debug_duration = Duration::try_from_secs_f32(config.debug_ray.duration_s).map_err(
            |_| SensorError::InvalidConfiguration {
                field: "debug_ray.duration_s",
                reason: "is too large",
            },
        )?;

        log::info!(
            "Activating {id}: {} deg every {} s",
            config.angle_increment_deg,
            config.tick_delay_s
        );

        Ok(Self {
            id,
            increment: config.angle_increment_deg,
            delay,
            angle: config.start_angle_deg,
            max_range: config.max_range,
            recorded_position: config.recorded_position,
            debug_style: config.debug_ray,
            debug_duration,
            timer: StepTimer::new(),
            active: true,
            unavailable: false,
            revolution: 0,
            steps: 0,
            buffer: DetectionBuffer::new(),
            noise: config.noise.build()?,
            sink: Box::new(NullSink),
        })
    }

    pub fn with_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn with_noise(mut self, noise: impl NoiseModel + 'static) -> Self {
        self.noise = Box::new(noise);
        self
    }

    #[inline]
    pub fn angle_degrees(&self) -> f32 {
        self.angle
    }

    #[inline]
    pub fn angle_increment(&self) -> f32 {
        self.increment
    }

    #[inline]
    pub fn tick_delay(&self) -> Duration {
        self.delay
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.timer.is_pending()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Completed revolutions so far.
    #[inline]
    pub fn revolutions(&self) -> u64 {
        self.revolution
    }

    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Detections of the revolution in progress.
    #[inline]
    pub fn detections(&self) -> &[Detection] {
        self.buffer.as_slice()
    }

    pub fn reset_detections(&mut self) {
        self.buffer.reset();
    }

    pub fn tick(
        &mut self,
        now: SceneTime,
        ctx: &mut SensorContext<'_>,
    ) -> Result<TickOutcome, SensorError> {
        if !self.active {
            return Err(SensorError::Inactive(self.id));
        }

        if !self.timer.is_pending() {
            self.timer.schedule(now, self.delay);
            return Ok(TickOutcome::Scheduled);
        }

        if !self.timer.is_due(now) {
            return Ok(TickOutcome::Waiting);
        }

        self.perform_step(now, ctx)
    }

    /// Runs one step immediately, regardless of the timer.
    ///
    /// If the pose cannot be read the step is abandoned before the angle moves and stays
    /// pending, so the next tick retries it.
    pub fn perform_step(
        &mut self,
        now: SceneTime,
        ctx: &mut SensorContext<'_>,
    ) -> Result<TickOutcome, SensorError> {
        if !self.active {
            return Err(SensorError::Inactive(self.id));
        }

        let Some(pose) = ctx.pose.pose() else {
            if !self.unavailable {
                log::warn!("{}: pose unavailable, suspending sweep", self.id);
                self.unavailable = true;
            }
            return Err(SensorError::SensorUnavailable {
                sensor: self.id,
                collaborator: "pose",
            });
        };

        if self.unavailable {
            log::info!("{}: pose available again, resuming at {} deg", self.id, self.angle);
            self.unavailable = false;
        }

        self.angle += self.increment;

        let flushed = self.angle >= 360.;
        if flushed {
            self.flush(now);
            self.angle = self.angle.rem_euclid(360.);
        }

        let direction = pose.transform_direction(sweep_direction(self.angle));
        let ray = Ray::new(pose.position, direction);

        let hits = match ctx.raycaster.cast(&ray, self.max_range) {
            Some(hit) => {
                let origin = match self.recorded_position {
                    RecordedPosition::Sensor => pose.position,
                    RecordedPosition::WorldOrigin => glam::Vec3::ZERO,
                };

                let detection = Detection {
                    distance: self.noise.perturb(hit.distance),
                    angle_degrees: self.angle,
                    source: self.id,
                    origin,
                    object: hit.object,
                };

                log::trace!("{detection}");
                self.buffer.push(detection);
                1
            }
            None => 0,
        };

        if self.debug_style.enabled
            && let Some(debug) = ctx.debug.as_deref_mut()
        {
            let debug_ray = DebugRay {
                origin: ray.origin,
                direction: ray.direction,
                color: Color(self.debug_style.color),
                duration: self.debug_duration,
            };

            if let Err(e) = debug.draw_ray(debug_ray) {
                log::debug!("{}: ignoring debug draw failure: {e}", self.id);
            }
        }

        self.timer.complete();
        self.steps += 1;

        Ok(TickOutcome::Stepped { hits, flushed })
    }

    /// Deactivates the sweep. A pending step is dropped and never runs.
    pub fn stop(&mut self) {
        if self.timer.cancel() {
            log::debug!("{}: cancelled pending step", self.id);
        }

        if self.active {
            log::info!("Deactivating {}", self.id);
        }
        self.active = false;
    }

    /// Reactivates a stopped sweep and registers its next step one delay after `now`.
    /// The angle and buffer carry on from where they were.
    pub fn start(&mut self, now: SceneTime) {
        if self.active {
            return;
        }

        log::info!("Reactivating {} at {} deg", self.id, self.angle);
        self.active = true;
        self.timer.schedule(now, self.delay);
    }

    fn flush(&mut self, now: SceneTime) {
        let detections = self.buffer.flush();

        log::debug!(
            "{}: revolution {} complete with {} detections",
            self.id,
            self.revolution,
            detections.len()
        );

        self.sink.report(SweepReport {
            sensor: self.id,
            revolution: self.revolution,
            completed_at: now,
            detections,
        });
        self.revolution += 1;
    }
}

impl Sensor for RadarSweep {
    fn id(&self) -> SensorId {
        self.id
    }

    fn update(
        &mut self,
        now: SceneTime,
        ctx: &mut SensorContext<'_>,
    ) -> Result<TickOutcome, SensorError> {
        self.tick(now, ctx)
    }

    fn detections(&self) -> &[Detection] {
        RadarSweep::detections(self)
    }

    fn stop(&mut self) {
        RadarSweep::stop(self)
    }
}
