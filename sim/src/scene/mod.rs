use crate::{
    math::{Aabb, Ray, intersect_ray_aabb},
    sensors::{RayHit, Raycaster},
};

pub mod scene_loop;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectTag(pub u64);

impl std::fmt::Display for ObjectTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneObject {
    pub tag: ObjectTag,
    pub bounds: Aabb,
}

/// Static collision geometry made of axis-aligned boxes.
#[derive(Debug, Clone, Default)]
pub struct Scene3D {
    objects: Vec<SceneObject>,
    bounds: Option<Aabb>,
    next_tag: u64,
}

impl Scene3D {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_boxes(boxes: impl IntoIterator<Item = Aabb>) -> Result<Self, SceneError> {
        let mut scene = Self::new();
        for bx in boxes {
            scene.add_object(bx)?;
        }

        Ok(scene)
    }

    pub fn add_object(&mut self, bounds: Aabb) -> Result<ObjectTag, SceneError> {
        if !bounds.is_well_formed() {
            return Err(SceneError::InvalidBounds(bounds.min, bounds.max));
        }

        let tag = ObjectTag(self.next_tag);
        self.next_tag += 1;

        self.bounds = Some(match self.bounds {
            Some(b) => b.encase(&bounds),
            None => bounds,
        });
        self.objects.push(SceneObject { tag, bounds });

        Ok(tag)
    }

    /// Removes an object. Returns `false` if no object has that tag.
    pub fn remove_object(&mut self, tag: ObjectTag) -> bool {
        let before = self.objects.len();
        self.objects.retain(|o| o.tag != tag);

        if self.objects.len() == before {
            return false;
        }

        self.bounds = self
            .objects
            .iter()
            .map(|o| o.bounds)
            .reduce(|a, b| a.encase(&b));
        true
    }

    #[inline]
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[inline]
    pub fn get(&self, tag: ObjectTag) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.tag == tag)
    }

    /// Nearest object hit along `ray`, no further than `max_range` when one is given.
    pub fn cast_ray(&self, ray: &Ray, max_range: Option<f32>) -> Option<RayHit> {
        // Cheap reject against the union of all objects first.
        let bounds = self.bounds?;
        if !bounds.contains(ray.origin) && intersect_ray_aabb(ray, bounds).is_none() {
            return None;
        }

        let limit = max_range.unwrap_or(f32::INFINITY);

        self.objects
            .iter()
            .filter_map(|o| {
                intersect_ray_aabb(ray, o.bounds).map(|distance| RayHit {
                    distance,
                    object: o.tag,
                })
            })
            .filter(|hit| hit.distance <= limit)
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

impl Raycaster for Scene3D {
    fn cast(&self, ray: &Ray, max_range: Option<f32>) -> Option<RayHit> {
        self.cast_ray(ray, max_range)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("Invalid Bounds: min {0} is not below max {1} on every axis, or not finite")]
    InvalidBounds(glam::Vec3, glam::Vec3),
}
