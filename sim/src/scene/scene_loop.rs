use std::{sync::Arc, time::Duration};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::{
    math::Pose,
    report::DebugDraw,
    scene::Scene3D,
    sensors::{PoseProvider, Sensor, SensorContext, SensorError, SensorId, TickOutcome},
    timer::{Clock, ManualClock, SceneTime},
    vehicle::Vehicle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VehicleId(u64);

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vehicle#{}", self.0)
    }
}

pub type SharedSensor = Arc<RwLock<dyn Sensor + Send + Sync>>;

/// Typed view of a mounted sensor.
pub type Handle<S> = Arc<RwLock<S>>;

struct Mount {
    id: SensorId,
    vehicle: VehicleId,
    sensor: SharedSensor,
}

/// Pose source for sensors whose vehicle has left the scene.
struct Detached;

impl PoseProvider for Detached {
    fn pose(&self) -> Option<Pose> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepSummary {
    pub time: SceneTime,
    /// Sensors that ran a step this tick.
    pub stepped: usize,
    pub hits: usize,
    pub revolutions: usize,
    pub unavailable: Vec<SensorId>,
    pub inactive: Vec<SensorId>,
}

/// Drives vehicles and their sensors from a single simulated clock.
///
/// Every call to [`SceneLoop::step`] is one tick of the external scheduler: vehicles move
/// first, then each mounted sensor is updated once, in mounting order, against the new
/// poses.
pub struct SceneLoop {
    scene: Scene3D,
    clock: ManualClock,
    vehicles: FxHashMap<VehicleId, Vehicle>,
    mounts: Vec<Mount>,
    debug: Option<Box<dyn DebugDraw + Send>>,
    next_vehicle: u64,
    next_sensor: u64,
}

impl std::fmt::Debug for SceneLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneLoop")
            .field("time", &self.clock.now())
            .field("objects", &self.scene.len())
            .field("vehicles", &self.vehicles.len())
            .field("sensors", &self.mounts.len())
            .finish_non_exhaustive()
    }
}

impl SceneLoop {
    pub fn new(scene: Scene3D) -> Self {
        Self {
            scene,
            clock: ManualClock::new(),
            vehicles: FxHashMap::default(),
            mounts: Vec::new(),
            debug: None,
            next_vehicle: 0,
            next_sensor: 0,
        }
    }

    pub fn with_debug_draw(mut self, debug: impl DebugDraw + Send + 'static) -> Self {
        self.debug = Some(Box::new(debug));
        self
    }

    #[inline]
    pub fn time(&self) -> SceneTime {
        self.clock.now()
    }

    #[inline]
    pub fn scene(&self) -> &Scene3D {
        &self.scene
    }

    #[inline]
    pub fn scene_mut(&mut self) -> &mut Scene3D {
        &mut self.scene
    }

    pub fn add_vehicle(&mut self, vehicle: Vehicle) -> VehicleId {
        let id = VehicleId(self.next_vehicle);
        self.next_vehicle += 1;
        self.vehicles.insert(id, vehicle);

        id
    }

    /// Sensors mounted on the vehicle stay mounted and report themselves unavailable
    /// until they are unmounted.
    pub fn remove_vehicle(&mut self, id: VehicleId) -> Option<Vehicle> {
        let removed = self.vehicles.remove(&id);
        if removed.is_some() {
            log::info!("Removed {id} from the scene");
        }
        removed
    }

    #[inline]
    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    #[inline]
    pub fn vehicle_mut(&mut self, id: VehicleId) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(&id)
    }

    /// Hands out a fresh id for a sensor about to be mounted.
    pub fn allocate_sensor_id(&mut self) -> SensorId {
        let id = SensorId(self.next_sensor);
        self.next_sensor += 1;
        id
    }

    /// Mounts `sensor` on `vehicle` and returns a typed handle for reading it between
    /// steps.
    pub fn mount<S>(
        &mut self,
        vehicle: VehicleId,
        sensor: S,
    ) -> Result<Handle<S>, SceneLoopError>
    where
        S: Sensor + Send + Sync + 'static,
    {
        if !self.vehicles.contains_key(&vehicle) {
            return Err(SceneLoopError::UnknownVehicle(vehicle));
        }

        let id = sensor.id();
        if self.mounts.iter().any(|m| m.id == id) {
            return Err(SceneLoopError::DuplicateSensor(id));
        }

        let handle = Arc::new(RwLock::new(sensor));
        let shared: SharedSensor = handle.clone();
        self.mounts.push(Mount {
            id,
            vehicle,
            sensor: shared,
        });

        log::info!("Mounted {id} on {vehicle}");
        Ok(handle)
    }

    /// Stops and detaches a sensor. Returns `false` if it was not mounted.
    pub fn unmount(&mut self, id: SensorId) -> bool {
        let Some(index) = self.mounts.iter().position(|m| m.id == id) else {
            return false;
        };

        let mount = self.mounts.remove(index);
        mount.sensor.write().stop();
        log::info!("Unmounted {id} from {}", mount.vehicle);

        true
    }

    pub fn sensor(&self, id: SensorId) -> Option<SharedSensor> {
        self.mounts
            .iter()
            .find(|m| m.id == id)
            .map(|m| Arc::clone(&m.sensor))
    }

    pub fn sensor_ids(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.mounts.iter().map(|m| m.id)
    }

    pub fn step(&mut self, dt: Duration) -> StepSummary {
        let now = self.clock.advance(dt);
        let dt = dt.as_secs_f32();

        for vehicle in self.vehicles.values_mut() {
            vehicle.update(dt);
        }

        let mut summary = StepSummary {
            time: now,
            ..Default::default()
        };

        for mount in &self.mounts {
            let pose: &dyn PoseProvider = match self.vehicles.get(&mount.vehicle) {
                Some(vehicle) => vehicle,
                None => &Detached,
            };

            let mut ctx = SensorContext::new(pose, &self.scene);
            if let Some(debug) = self.debug.as_deref_mut() {
                ctx = ctx.with_debug(debug);
            }

            match mount.sensor.write().update(now, &mut ctx) {
                Ok(TickOutcome::Stepped { hits, flushed }) => {
                    summary.stepped += 1;
                    summary.hits += hits;
                    summary.revolutions += usize::from(flushed);
                }
                Ok(TickOutcome::Scheduled | TickOutcome::Waiting) => {}
                Err(SensorError::SensorUnavailable { sensor, .. }) => {
                    summary.unavailable.push(sensor);
                }
                Err(SensorError::Inactive(sensor)) => {
                    summary.inactive.push(sensor);
                }
                Err(e) => {
                    log::error!("{}: {e}", mount.id);
                }
            }
        }

        summary
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SceneLoopError {
    #[error("Unknown Vehicle: {0}")]
    UnknownVehicle(VehicleId),
    #[error("Duplicate Sensor: {0} is already mounted")]
    DuplicateSensor(SensorId),
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use crate::{
        math::Aabb,
        report::ChannelSink,
        scene::{
            Scene3D,
            scene_loop::{SceneLoop, SceneLoopError},
        },
        sensors::{
            Sensor,
            lidar::{LidarConfig, RingLidar},
            radar::{RadarConfig, RadarSweep},
        },
        timer::SceneTime,
        vehicle::{Vehicle, VehicleState},
    };

    /// A ring of four walls around the origin, ten metres out.
    fn walled_yard() -> Scene3D {
        Scene3D::from_boxes([
            Aabb::new(glam::vec3(-20., -2., 10.), glam::vec3(20., 2., 11.)),
            Aabb::new(glam::vec3(-20., -2., -11.), glam::vec3(20., 2., -10.)),
            Aabb::new(glam::vec3(10., -2., -20.), glam::vec3(11., 2., 20.)),
            Aabb::new(glam::vec3(-11., -2., -20.), glam::vec3(-10., 2., 20.)),
        ])
        .unwrap()
    }

    fn config() -> RadarConfig {
        RadarConfig {
            angle_increment_deg: 10.,
            tick_delay_s: 0.05,
            ..Default::default()
        }
    }

    #[test]
    fn test_radar_sweeps_yard() {
        let mut scene_loop = SceneLoop::new(walled_yard());
        let car = scene_loop.add_vehicle(Vehicle::default());

        let (sink, reports) = ChannelSink::unbounded();
        let id = scene_loop.allocate_sensor_id();
        let radar = scene_loop
            .mount(car, RadarSweep::new(id, &config()).unwrap().with_sink(sink))
            .unwrap();

        // Every other 50 ms tick runs a step, so 36 steps need 72 ticks.
        let mut revolutions = 0;
        for _ in 0..72 {
            revolutions += scene_loop.step(Duration::from_millis(50)).revolutions;
        }

        assert_eq!(scene_loop.time(), SceneTime::from_millis(3600));
        assert_eq!(radar.read().steps(), 36);
        assert_eq!(revolutions, 1);

        let report = reports.try_recv().unwrap();
        // Walls surround the yard, so every bearing before the wrap hits something.
        assert_eq!(report.detections.len(), 35);
        assert!(
            report
                .detections
                .iter()
                .all(|d| (10.0 - 1e-3..=10.0 * std::f32::consts::SQRT_2 + 1e-3).contains(&d.distance))
        );
    }

    #[test]
    fn test_removed_vehicle_makes_sensor_unavailable() {
        let mut scene_loop = SceneLoop::new(walled_yard());
        let car = scene_loop.add_vehicle(Vehicle::default());
        let id = scene_loop.allocate_sensor_id();
        let radar = scene_loop
            .mount(car, RadarSweep::new(id, &config()).unwrap())
            .unwrap();

        scene_loop.step(Duration::from_millis(50));
        scene_loop.remove_vehicle(car);

        let summary = scene_loop.step(Duration::from_millis(50));
        assert_eq!(summary.unavailable, vec![id]);
        assert_eq!(radar.read().angle_degrees(), 0.);
        assert!(radar.read().is_pending());
    }

    #[test]
    fn test_unmount_stops_sensor() {
        let mut scene_loop = SceneLoop::new(walled_yard());
        let car = scene_loop.add_vehicle(Vehicle::default());
        let id = scene_loop.allocate_sensor_id();
        let radar = scene_loop
            .mount(car, RadarSweep::new(id, &config()).unwrap())
            .unwrap();

        scene_loop.step(Duration::from_millis(50));
        assert!(scene_loop.unmount(id));
        assert!(!scene_loop.unmount(id));

        assert!(!radar.read().is_active());
        assert!(!radar.read().is_pending());
        assert!(scene_loop.sensor(id).is_none());
    }

    #[test]
    fn test_mount_errors() {
        let mut scene_loop = SceneLoop::new(walled_yard());
        let car = scene_loop.add_vehicle(Vehicle::default());
        let id = scene_loop.allocate_sensor_id();

        scene_loop
            .mount(car, RadarSweep::new(id, &config()).unwrap())
            .unwrap();

        assert_eq!(
            scene_loop
                .mount(car, RadarSweep::new(id, &config()).unwrap())
                .err(),
            Some(SceneLoopError::DuplicateSensor(id))
        );

        scene_loop.remove_vehicle(car);
        let other = scene_loop.allocate_sensor_id();
        assert_eq!(
            scene_loop
                .mount(car, RadarSweep::new(other, &config()).unwrap())
                .err(),
            Some(SceneLoopError::UnknownVehicle(car))
        );
    }

    #[test]
    fn test_lidar_follows_vehicle() {
        let mut scene_loop = SceneLoop::new(walled_yard());
        let car = scene_loop.add_vehicle(Vehicle::new(VehicleState {
            speed: 2.,
            ..Default::default()
        }));
        let id = scene_loop.allocate_sensor_id();
        let lidar = scene_loop
            .mount(
                car,
                RingLidar::new(
                    id,
                    &LidarConfig {
                        count: 36,
                        max_range: None,
                    },
                )
                .unwrap(),
            )
            .unwrap();

        scene_loop.step(Duration::from_secs(1));
        let lidar = lidar.read();

        // Driving 2 m towards +Z leaves the sensor 8 m from the far wall.
        let ahead = lidar
            .detections()
            .iter()
            .find(|d| (d.angle_degrees - 5.).abs() < 1e-3)
            .unwrap();
        assert!(ahead.origin.abs_diff_eq(glam::vec3(0., 0., 2.), 1e-4));
        assert!((ahead.distance * 5f32.to_radians().cos() - 8.).abs() < 1e-3);
    }
}
