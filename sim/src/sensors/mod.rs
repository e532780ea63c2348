use crate::{
    math::{Pose, Ray},
    report::DebugDraw,
    scene::ObjectTag,
    timer::SceneTime,
};

pub mod detection;
pub mod lidar;
pub mod noise;
pub mod radar;

pub use detection::{Detection, DetectionBuffer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SensorId(pub u64);

impl std::fmt::Display for SensorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sensor#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub object: ObjectTag,
}

/// Source of a sensor's world pose. `None` means the pose cannot be read right now.
pub trait PoseProvider {
    fn pose(&self) -> Option<Pose>;
}

impl PoseProvider for Pose {
    fn pose(&self) -> Option<Pose> {
        Some(*self)
    }
}

/// First-collision oracle. `max_range` of `None` means unbounded.
pub trait Raycaster {
    fn cast(&self, ray: &Ray, max_range: Option<f32>) -> Option<RayHit>;
}

/// World collaborators a sensor reads during one update.
pub struct SensorContext<'a> {
    pub pose: &'a dyn PoseProvider,
    pub raycaster: &'a dyn Raycaster,
    pub debug: Option<&'a mut dyn DebugDraw>,
}

impl<'a> SensorContext<'a> {
    pub fn new(pose: &'a dyn PoseProvider, raycaster: &'a dyn Raycaster) -> Self {
        Self {
            pose,
            raycaster,
            debug: None,
        }
    }

    pub fn with_debug(mut self, debug: &'a mut dyn DebugDraw) -> Self {
        self.debug = Some(debug);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A step was registered and will run once its delay elapses.
    Scheduled,
    /// A step is pending but not yet due.
    Waiting,
    /// A step ran. `hits` counts the detections it appended, `flushed` whether it
    /// completed a revolution.
    Stepped { hits: usize, flushed: bool },
}

pub trait Sensor {
    fn id(&self) -> SensorId;

    /// Drives the sensor for one tick of the external scheduler.
    fn update(
        &mut self,
        now: SceneTime,
        ctx: &mut SensorContext<'_>,
    ) -> Result<TickOutcome, SensorError>;

    fn detections(&self) -> &[Detection];

    /// Deactivates the sensor and drops any pending work.
    fn stop(&mut self);
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("Invalid configuration: `{field}` {reason}")]
    InvalidConfiguration {
        field: &'static str,
        reason: &'static str,
    },
    #[error("{sensor} unavailable: {collaborator} could not be read")]
    SensorUnavailable {
        sensor: SensorId,
        collaborator: &'static str,
    },
    #[error("{0} is not active")]
    Inactive(SensorId),
}
