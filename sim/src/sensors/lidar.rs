use crate::{
    math::{Ray, sweep_direction},
    sensors::{Detection, Sensor, SensorContext, SensorError, SensorId, TickOutcome},
    timer::SceneTime,
};

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct LidarConfig {
    pub count: usize,
    pub max_range: Option<f32>,
}

impl Default for LidarConfig {
    fn default() -> Self {
        Self {
            count: 60,
            max_range: None,
        }
    }
}

/// Casts a full ring of evenly spaced rays every update and keeps only the latest scan.
#[derive(Debug, Clone)]
pub struct RingLidar {
    id: SensorId,
    angles: Vec<f32>,
    max_range: Option<f32>,
    active: bool,
    last_scan: Vec<Detection>,
}

impl RingLidar {
    pub fn new(id: SensorId, config: &LidarConfig) -> Result<Self, SensorError> {
        if config.count == 0 {
            return Err(SensorError::InvalidConfiguration {
                field: "count",
                reason: "must be at least 1",
            });
        }

        if let Some(range) = config.max_range
            && !(range.is_finite() && range > 0.)
        {
            return Err(SensorError::InvalidConfiguration {
                field: "max_range",
                reason: "must be finite and positive",
            });
        }

        let mut lidar = Self {
            id,
            angles: Vec::new(),
            max_range: config.max_range,
            active: true,
            last_scan: Vec::new(),
        };
        lidar.set_regular(config.count);

        Ok(lidar)
    }

    /// Spreads `n` beams evenly, offset by half a beam so none sits exactly on an axis.
    pub fn set_regular(&mut self, n: usize) {
        self.angles.clear();
        self.angles
            .extend((0..n).map(|i| 360. * ((i as f32 + 0.5) / n as f32)));
    }

    #[inline]
    pub fn angles(&self) -> &[f32] {
        &self.angles
    }
}

impl Sensor for RingLidar {
    fn id(&self) -> SensorId {
        self.id
    }

    fn update(
        &mut self,
        _now: SceneTime,
        ctx: &mut SensorContext<'_>,
    ) -> Result<TickOutcome, SensorError> {
        if !self.active {
            return Err(SensorError::Inactive(self.id));
        }

        let start = std::time::Instant::now();

        let pose = ctx.pose.pose().ok_or(SensorError::SensorUnavailable {
            sensor: self.id,
            collaborator: "pose",
        })?;

        let scan: Vec<Detection> = self
            .angles
            .iter()
            .filter_map(|&angle| {
                let ray = Ray::new(
                    pose.position,
                    pose.transform_direction(sweep_direction(angle)),
                );
                ctx.raycaster
                    .cast(&ray, self.max_range)
                    .map(|hit| Detection {
                        distance: hit.distance,
                        angle_degrees: angle,
                        source: self.id,
                        origin: pose.position,
                        object: hit.object,
                    })
            })
            .collect();

        log::trace!(
            "{}: {} of {} beams hit in {} us",
            self.id,
            scan.len(),
            self.angles.len(),
            start.elapsed().as_micros()
        );

        let hits = scan.len();
        self.last_scan = scan;

        Ok(TickOutcome::Stepped {
            hits,
            flushed: false,
        })
    }

    fn detections(&self) -> &[Detection] {
        &self.last_scan
    }

    fn stop(&mut self) {
        self.active = false;
        self.last_scan.clear();
    }
}

#[cfg(test)]
mod test {
    use crate::{
        math::{Aabb, Pose},
        scene::Scene3D,
        sensors::{
            Sensor, SensorContext, SensorError, SensorId,
            lidar::{LidarConfig, RingLidar},
        },
        timer::SceneTime,
    };

    #[test]
    fn test_regular_angles() {
        let lidar = RingLidar::new(
            SensorId(0),
            &LidarConfig {
                count: 4,
                max_range: None,
            },
        )
        .unwrap();

        assert_eq!(lidar.angles(), &[45., 135., 225., 315.]);
    }

    #[test]
    fn test_scan_replaces_previous() {
        let mut scene = Scene3D::new();
        // A wall ahead that the forward-facing half of the ring can see.
        scene
            .add_object(Aabb::new(glam::vec3(-50., -1., 5.), glam::vec3(50., 1., 6.)))
            .unwrap();

        let mut lidar = RingLidar::new(
            SensorId(0),
            &LidarConfig {
                count: 8,
                max_range: None,
            },
        )
        .unwrap();

        let pose = Pose::default();
        let mut ctx = SensorContext::new(&pose, &scene);

        lidar.update(SceneTime::ZERO, &mut ctx).unwrap();
        // Beams at 22.5, 67.5, 292.5 and 337.5 degrees all point into +Z.
        assert_eq!(lidar.detections().len(), 4);

        lidar.update(SceneTime::from_millis(10), &mut ctx).unwrap();
        assert_eq!(lidar.detections().len(), 4);
    }

    #[test]
    fn test_rejects_empty_ring() {
        assert!(matches!(
            RingLidar::new(
                SensorId(0),
                &LidarConfig {
                    count: 0,
                    max_range: None
                }
            ),
            Err(SensorError::InvalidConfiguration { .. })
        ));
    }
}
