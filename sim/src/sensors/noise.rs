use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::sensors::SensorError;

/// Maps a true range to the range the sensor reports.
pub trait NoiseModel: Send + Sync {
    fn perturb(&mut self, distance: f32) -> f32;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl NoiseModel for Identity {
    #[inline]
    fn perturb(&mut self, distance: f32) -> f32 {
        distance
    }
}

/// Scales each reading by a factor drawn uniformly from `[1 - fraction, 1 + fraction]`.
#[derive(Debug, Clone)]
pub struct UniformNoise {
    fraction: f32,
    rng: StdRng,
}

impl UniformNoise {
    pub fn new(fraction: f32, seed: Option<u64>) -> Result<Self, SensorError> {
        check_fraction(fraction)?;

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self { fraction, rng })
    }

}

fn check_fraction(fraction: f32) -> Result<(), SensorError> {
    if (0.0..1.0).contains(&fraction) {
        Ok(())
    } else {
        Err(SensorError::InvalidConfiguration {
            field: "noise.fraction",
            reason: "must lie in [0, 1)",
        })
    }
}

impl NoiseModel for UniformNoise {
    fn perturb(&mut self, distance: f32) -> f32 {
        if self.fraction == 0.0 {
            return distance;
        }

        let scale = self
            .rng
            .random_range((1.0 - self.fraction)..=(1.0 + self.fraction));
        (distance * scale).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoiseConfig {
    #[default]
    Identity,
    Uniform {
        fraction: f32,
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl NoiseConfig {
    pub fn validate(&self) -> Result<(), SensorError> {
        match *self {
            NoiseConfig::Identity => Ok(()),
            NoiseConfig::Uniform { fraction, .. } => check_fraction(fraction),
        }
    }

    pub fn build(&self) -> Result<Box<dyn NoiseModel>, SensorError> {
        Ok(match *self {
            NoiseConfig::Identity => Box::new(Identity),
            NoiseConfig::Uniform { fraction, seed } => Box::new(UniformNoise::new(fraction, seed)?),
        })
    }
}

#[cfg(test)]
mod test {
    use crate::sensors::{
        SensorError,
        noise::{Identity, NoiseConfig, NoiseModel, UniformNoise},
    };

    #[test]
    fn test_identity() {
        assert_eq!(Identity.perturb(50.), 50.);
    }

    #[test]
    fn test_uniform_within_bounds() {
        let mut noise = UniformNoise::new(0.1, Some(7)).unwrap();

        for _ in 0..1000 {
            let d = noise.perturb(50.);
            assert!((45.0..=55.0).contains(&d), "{d} outside 10% band");
        }
    }

    #[test]
    fn test_uniform_is_reproducible_with_seed() {
        let mut a = UniformNoise::new(0.2, Some(42)).unwrap();
        let mut b = UniformNoise::new(0.2, Some(42)).unwrap();

        for _ in 0..16 {
            assert_eq!(a.perturb(10.), b.perturb(10.));
        }
    }

    #[test]
    fn test_rejects_bad_fraction() {
        assert!(matches!(
            UniformNoise::new(1.5, None),
            Err(SensorError::InvalidConfiguration { .. })
        ));
        assert!(
            NoiseConfig::Uniform {
                fraction: -0.1,
                seed: None
            }
            .validate()
            .is_err()
        );
        assert!(NoiseConfig::Identity.validate().is_ok());
    }
}
