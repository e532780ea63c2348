pub mod math;
pub mod report;
pub mod scene;
pub mod sensors;
pub mod timer;
pub mod vehicle;

pub use scene::{Scene3D, scene_loop::SceneLoop};
pub use sensors::{Detection, Sensor, SensorError, SensorId, lidar::RingLidar, radar::RadarSweep};
pub use timer::SceneTime;
pub use vehicle::Vehicle;
