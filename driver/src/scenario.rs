use std::path::Path;

use anyhow::Context;
use radar_sim::{
    RadarSweep, RingLidar, Scene3D, SceneLoop,
    math::Aabb,
    report::ReportSink,
    scene::scene_loop::Handle,
    sensors::{lidar::LidarConfig, radar::RadarConfig},
    vehicle::{Vehicle, VehicleState},
};

#[derive(Debug, serde::Deserialize)]
pub struct ScenarioFile {
    #[serde(default = "default_duration")]
    pub duration_s: f64,
    #[serde(default = "default_dt")]
    pub dt_s: f64,
    #[serde(default)]
    pub objects: Vec<ObjectFile>,
    #[serde(default)]
    pub vehicles: Vec<VehicleFile>,
}

fn default_duration() -> f64 {
    10.
}

fn default_dt() -> f64 {
    1. / 60.
}

#[derive(Debug, serde::Deserialize)]
pub struct ObjectFile {
    #[serde(deserialize_with = "glam_vec3")]
    pub min: glam::Vec3,
    #[serde(deserialize_with = "glam_vec3")]
    pub max: glam::Vec3,
}

#[derive(Debug, serde::Deserialize)]
pub struct VehicleFile {
    #[serde(default, deserialize_with = "glam_vec3")]
    pub position: glam::Vec3,
    #[serde(default)]
    pub yaw_deg: f32,
    #[serde(default)]
    pub speed: f32,
    #[serde(default)]
    pub yaw_rate_deg: f32,
    #[serde(default)]
    pub sensors: Vec<SensorFile>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorFile {
    Radar(RadarConfig),
    Lidar(LidarConfig),
}

fn glam_vec3<'de, D>(d: D) -> Result<glam::Vec3, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(field_identifier, rename_all = "lowercase")]
    enum Field {
        X,
        Y,
        Z,
    }

    struct GlamVec3Visitor;

    impl<'de1> serde::de::Visitor<'de1> for GlamVec3Visitor {
        type Value = glam::Vec3;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("`[x, y, z]` or `{x, y, z}`")
        }

        fn visit_seq<V>(self, mut seq: V) -> Result<glam::Vec3, V::Error>
        where
            V: serde::de::SeqAccess<'de1>,
        {
            let x = seq
                .next_element()?
                .ok_or_else(|| serde::de::Error::invalid_length(0, &self))?;
            let y = seq
                .next_element()?
                .ok_or_else(|| serde::de::Error::invalid_length(1, &self))?;
            let z = seq
                .next_element()?
                .ok_or_else(|| serde::de::Error::invalid_length(2, &self))?;
            Ok(glam::vec3(x, y, z))
        }

        fn visit_map<V>(self, mut map: V) -> Result<glam::Vec3, V::Error>
        where
            V: serde::de::MapAccess<'de1>,
        {
            let mut x = None;
            let mut y = None;
            let mut z = None;
            while let Some(key) = map.next_key()? {
                let (slot, name) = match key {
                    Field::X => (&mut x, "x"),
                    Field::Y => (&mut y, "y"),
                    Field::Z => (&mut z, "z"),
                };
                if slot.is_some() {
                    return Err(serde::de::Error::duplicate_field(name));
                }
                *slot = Some(map.next_value()?);
            }
            let x = x.ok_or_else(|| serde::de::Error::missing_field("x"))?;
            let y = y.ok_or_else(|| serde::de::Error::missing_field("y"))?;
            let z = z.ok_or_else(|| serde::de::Error::missing_field("z"))?;
            Ok(glam::vec3(x, y, z))
        }
    }

    d.deserialize_any(GlamVec3Visitor)
}

/// Sensors created from a scenario, kept for reading between steps.
#[derive(Default)]
pub struct Mounted {
    pub radars: Vec<Handle<RadarSweep>>,
    pub lidars: Vec<Handle<RingLidar>>,
}

impl ScenarioFile {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading {path:?}");

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let scenario: ScenarioFile = serde_norway::from_str(contents)?;

        if !(scenario.dt_s.is_finite() && scenario.dt_s > 0.) {
            anyhow::bail!("`dt_s` must be positive, got {}", scenario.dt_s);
        }
        if !(scenario.duration_s.is_finite() && scenario.duration_s >= 0.) {
            anyhow::bail!("`duration_s` must not be negative, got {}", scenario.duration_s);
        }

        Ok(scenario)
    }

    /// Builds the scene loop. `sink` is called once per radar to give it a report sink.
    pub fn build<S, F>(&self, mut sink: F) -> anyhow::Result<(SceneLoop, Mounted)>
    where
        S: ReportSink + 'static,
        F: FnMut() -> S,
    {
        let scene = Scene3D::from_boxes(self.objects.iter().map(|o| Aabb::new(o.min, o.max)))
            .context("building scene geometry")?;

        log::info!("Scene has {} objects", scene.len());

        let mut scene_loop = SceneLoop::new(scene);
        let mut mounted = Mounted::default();

        for (index, file) in self.vehicles.iter().enumerate() {
            let vehicle = scene_loop.add_vehicle(Vehicle::new(VehicleState {
                position: file.position,
                yaw: file.yaw_deg.to_radians(),
                speed: file.speed,
                yaw_rate: file.yaw_rate_deg.to_radians(),
            }));

            for sensor in &file.sensors {
                let id = scene_loop.allocate_sensor_id();
                match sensor {
                    SensorFile::Radar(config) => {
                        let radar = RadarSweep::new(id, config)
                            .with_context(|| format!("radar on vehicle {index}"))?
                            .with_sink(sink());
                        mounted.radars.push(scene_loop.mount(vehicle, radar)?);
                    }
                    SensorFile::Lidar(config) => {
                        let lidar = RingLidar::new(id, config)
                            .with_context(|| format!("lidar on vehicle {index}"))?;
                        mounted.lidars.push(scene_loop.mount(vehicle, lidar)?);
                    }
                }
            }
        }

        Ok((scene_loop, mounted))
    }
}

#[cfg(test)]
mod test {
    use radar_sim::{
        report::NullSink,
        sensors::{noise::NoiseConfig, radar::RecordedPosition},
    };

    use crate::scenario::{ScenarioFile, SensorFile};

    const YARD: &str = r#"
duration_s: 2.0
dt_s: 0.05
objects:
  - { min: [-20, -2, 10], max: [20, 2, 11] }
  - min: { x: -20, y: -2, z: -11 }
    max: { x: 20, y: 2, z: -10 }
vehicles:
  - position: [0, 0.5, 0]
    yaw_deg: 90
    sensors:
      - type: radar
        angle_increment_deg: 7
        noise: { kind: uniform, fraction: 0.05, seed: 3 }
        recorded_position: world_origin
      - type: lidar
        count: 12
"#;

    #[test]
    fn test_parse_yard() {
        let scenario = ScenarioFile::parse(YARD).unwrap();

        assert_eq!(scenario.objects.len(), 2);
        assert_eq!(scenario.objects[1].min, glam::vec3(-20., -2., -11.));
        assert_eq!(scenario.vehicles[0].position, glam::vec3(0., 0.5, 0.));

        let SensorFile::Radar(radar) = &scenario.vehicles[0].sensors[0] else {
            panic!("expected a radar");
        };
        assert_eq!(radar.angle_increment_deg, 7.);
        assert_eq!(radar.tick_delay_s, 0.05);
        assert_eq!(radar.recorded_position, RecordedPosition::WorldOrigin);
        assert_eq!(
            radar.noise,
            NoiseConfig::Uniform {
                fraction: 0.05,
                seed: Some(3)
            }
        );

        assert!(matches!(
            scenario.vehicles[0].sensors[1],
            SensorFile::Lidar(lidar) if lidar.count == 12
        ));
    }

    #[test]
    fn test_build_mounts_sensors() {
        let scenario = ScenarioFile::parse(YARD).unwrap();
        let (scene_loop, mounted) = scenario.build(|| NullSink).unwrap();

        assert_eq!(scene_loop.scene().len(), 2);
        assert_eq!(mounted.radars.len(), 1);
        assert_eq!(mounted.lidars.len(), 1);
        assert_eq!(scene_loop.sensor_ids().count(), 2);
    }

    #[test]
    fn test_rejects_bad_radar() {
        let scenario = ScenarioFile::parse(
            r#"
vehicles:
  - sensors:
      - type: radar
        angle_increment_deg: 0
"#,
        )
        .unwrap();

        assert!(scenario.build(|| NullSink).is_err());
    }

    #[test]
    fn test_bundled_scenario_runs() {
        let scenario = ScenarioFile::load(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/scenarios/parking_lot.yaml"
        ))
        .unwrap();
        let (mut scene_loop, mounted) = scenario.build(|| NullSink).unwrap();

        let dt = std::time::Duration::from_secs_f64(scenario.dt_s);
        for _ in 0..120 {
            let summary = scene_loop.step(dt);
            assert!(summary.unavailable.is_empty());
        }

        assert_eq!(mounted.radars.len(), 2);
        assert!(mounted.radars.iter().all(|r| r.read().steps() > 0));
    }

    #[test]
    fn test_rejects_bad_step() {
        assert!(ScenarioFile::parse("dt_s: 0").is_err());
        assert!(ScenarioFile::parse("objects: [{ min: [0, 0], max: [1, 1, 1] }]").is_err());
    }
}
