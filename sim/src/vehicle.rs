use crate::{math::Pose, sensors::PoseProvider};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub position: glam::Vec3,
    /// Heading about +Y in radians. Zero faces +Z.
    pub yaw: f32,
    /// Forward speed in m/s.
    pub speed: f32,
    /// rad/s
    pub yaw_rate: f32,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            position: glam::Vec3::ZERO,
            yaw: 0.,
            speed: 0.,
            yaw_rate: 0.,
        }
    }
}

/// Kinematic body that carries sensors around the scene.
#[derive(Debug, Clone, Default)]
pub struct Vehicle {
    pub state: VehicleState,
    pub last_state: Option<VehicleState>,
}

impl Vehicle {
    pub fn new(state: VehicleState) -> Self {
        Self {
            state,
            last_state: None,
        }
    }

    #[inline]
    pub fn orientation(&self) -> glam::Quat {
        glam::Quat::from_rotation_y(self.state.yaw)
    }

    #[inline]
    pub fn forward(&self) -> glam::Vec3 {
        self.orientation() * glam::Vec3::Z
    }

    #[inline]
    pub fn current_pose(&self) -> Pose {
        Pose::new(self.state.position, self.orientation())
    }

    /// Integrates the yaw at the midpoint of the step so constant-rate turns stay on
    /// their arc.
    pub fn update(&mut self, dt: f32) {
        let VehicleState {
            yaw,
            speed,
            yaw_rate,
            ..
        } = self.state;

        self.last_state = Some(self.state);

        let mid_yaw = yaw + yaw_rate * dt / 2.;
        let forward = glam::Quat::from_rotation_y(mid_yaw) * glam::Vec3::Z;

        self.state.position += forward * speed * dt;
        self.state.yaw = (yaw + yaw_rate * dt).rem_euclid(std::f32::consts::TAU);
    }
}

impl PoseProvider for Vehicle {
    fn pose(&self) -> Option<Pose> {
        Some(self.current_pose())
    }
}
