/// Axis-aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: glam::Vec3,
    pub max: glam::Vec3,
}

impl Aabb {
    #[inline]
    pub fn new(min: glam::Vec3, max: glam::Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn from_center(center: glam::Vec3, half_extent: glam::Vec3) -> Self {
        Self {
            min: center - half_extent,
            max: center + half_extent,
        }
    }

    #[inline]
    pub fn contains(&self, point: glam::Vec3) -> bool {
        (point.cmple(self.max) & point.cmpge(self.min)).all()
    }

    #[inline]
    pub fn encase(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// `min <= max` on every axis and no corner is NaN or infinite.
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: glam::Vec3,
    pub direction: glam::Vec3,
}

impl Ray {
    #[inline]
    pub fn new(origin: glam::Vec3, direction: glam::Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }
}

/// World-space position and orientation of a sensor or body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: glam::Vec3,
    pub orientation: glam::Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: glam::Vec3::ZERO,
            orientation: glam::Quat::IDENTITY,
        }
    }
}

impl Pose {
    #[inline]
    pub fn new(position: glam::Vec3, orientation: glam::Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Rotates a local-frame direction into world space. Translation is not applied.
    #[inline]
    pub fn transform_direction(&self, local: glam::Vec3) -> glam::Vec3 {
        self.orientation * local
    }
}

/// Unit direction in the local horizontal plane for a sweep angle, measured clockwise
/// from +Z towards +X.
#[inline]
pub fn sweep_direction(angle_degrees: f32) -> glam::Vec3 {
    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    glam::vec3(sin, 0., cos)
}

/// Slab test. Returns the entry distance, or the exit distance when the ray starts inside
/// the box.
#[inline]
pub fn intersect_ray_aabb(ray: &Ray, Aabb { min, max }: Aabb) -> Option<f32> {
    let origin = ray.origin.to_array();
    let dir = ray.direction.to_array();
    let min = min.to_array();
    let max = max.to_array();

    let mut t_n = f32::NEG_INFINITY;
    let mut t_f = f32::INFINITY;

    for axis in 0..3 {
        if dir[axis].abs() < f32::EPSILON {
            // Parallel to this slab, so the origin must already lie between its planes.
            if origin[axis] < min[axis] || origin[axis] > max[axis] {
                return None;
            }
            continue;
        }

        let inv = 1.0 / dir[axis];
        let t1 = (min[axis] - origin[axis]) * inv;
        let t2 = (max[axis] - origin[axis]) * inv;

        t_n = t_n.max(t1.min(t2));
        t_f = t_f.min(t1.max(t2));
    }

    if t_n > t_f || t_f < f32::EPSILON {
        None
    } else if t_n < f32::EPSILON {
        Some(t_f)
    } else {
        Some(t_n)
    }
}

#[cfg(test)]
mod test {
    use crate::math::{Aabb, Pose, Ray, intersect_ray_aabb, sweep_direction};

    fn unit_box(center: glam::Vec3) -> Aabb {
        Aabb::from_center(center, glam::Vec3::splat(0.25))
    }

    #[test]
    fn test_collisions() {
        let forward = Ray::new(glam::Vec3::ZERO, glam::Vec3::Z);

        assert_eq!(
            intersect_ray_aabb(&forward, unit_box(glam::vec3(0., 0., 0.5))),
            Some(0.25)
        );

        // Origin inside the box reports the exit distance.
        assert_eq!(
            intersect_ray_aabb(&forward, unit_box(glam::Vec3::ZERO)),
            Some(0.25)
        );

        assert_eq!(
            intersect_ray_aabb(&forward, unit_box(glam::vec3(0., 0., -0.5))),
            None
        );

        let right = Ray::new(glam::Vec3::ZERO, glam::Vec3::X);

        assert_eq!(
            intersect_ray_aabb(&right, unit_box(glam::vec3(0.5, 0., 0.))),
            Some(0.25)
        );

        assert_eq!(
            intersect_ray_aabb(&right, unit_box(glam::vec3(-0.5, 0., 0.))),
            None
        );
    }

    #[test]
    fn test_parallel_ray_misses_offset_box() {
        let forward = Ray::new(glam::Vec3::ZERO, glam::Vec3::Z);

        // Same depth as a hit, but lifted above the ray's plane.
        assert_eq!(
            intersect_ray_aabb(&forward, unit_box(glam::vec3(0., 5., 0.5))),
            None
        );
        assert_eq!(
            intersect_ray_aabb(&forward, unit_box(glam::vec3(3., 0., 0.5))),
            None
        );
    }

    #[test]
    fn test_sweep_direction() {
        assert!(sweep_direction(0.).abs_diff_eq(glam::Vec3::Z, 1e-6));
        assert!(sweep_direction(90.).abs_diff_eq(glam::Vec3::X, 1e-6));
        assert!(sweep_direction(180.).abs_diff_eq(glam::Vec3::NEG_Z, 1e-6));
        assert!(sweep_direction(270.).abs_diff_eq(glam::Vec3::NEG_X, 1e-6));
    }

    #[test]
    fn test_pose_rotates_directions() {
        let pose = Pose::new(
            glam::vec3(1., 2., 3.),
            glam::Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        );

        // A quarter turn about +Y takes the local forward axis onto +X.
        assert!(
            pose.transform_direction(glam::Vec3::Z)
                .abs_diff_eq(glam::Vec3::X, 1e-6)
        );
    }

    #[test]
    fn test_well_formed() {
        assert!(unit_box(glam::Vec3::ONE).is_well_formed());
        assert!(!Aabb::new(glam::Vec3::ONE, glam::Vec3::ZERO).is_well_formed());
        assert!(!Aabb::new(glam::Vec3::NAN, glam::Vec3::ONE).is_well_formed());
    }
}
