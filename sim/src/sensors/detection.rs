use crate::{scene::ObjectTag, sensors::SensorId};

/// One recorded ray/object intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub distance: f32,
    pub angle_degrees: f32,
    pub source: SensorId,
    pub origin: glam::Vec3,
    pub object: ObjectTag,
}

impl std::fmt::Display for Detection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{source} hit {object} at {distance:.3} m, {angle:.2} deg from {origin}",
            source = self.source,
            object = self.object,
            distance = self.distance,
            angle = self.angle_degrees,
            origin = self.origin,
        )
    }
}

/// Detections for the revolution in progress, in the order they were made.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionBuffer(Vec<Detection>);

impl DetectionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, detection: Detection) {
        self.0.push(detection);
    }

    #[inline]
    pub fn as_slice(&self) -> &[Detection] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Hands back the accumulated detections and leaves a fresh, empty buffer behind.
    pub fn flush(&mut self) -> Vec<Detection> {
        std::mem::take(&mut self.0)
    }

    pub fn reset(&mut self) {
        self.0 = Vec::new();
    }
}
