//! Seeded coherent noise layers using FastNoiseLite
//!
//! Every layer is a pure function of (x, z) for a fixed seed, so the same
//! field can be rebuilt on any worker thread and sampled without locks.

use fastnoise_lite::{FastNoiseLite, NoiseType};

use crate::constants::{ROAD_HEIGHT_SCALE, ROAD_SHAPE_SCALE};
use crate::core::biome::Biome;

/// Pre-configured noise layers for one world seed
pub struct NoiseField {
    noise_grassland: FastNoiseLite,
    noise_desert: FastNoiseLite,
    noise_mountain: FastNoiseLite,
    noise_road_shape: FastNoiseLite,
    noise_road_height: FastNoiseLite,
    seed: u32,
}

impl NoiseField {
    pub fn new(seed: u32) -> Self {
        NoiseField {
            noise_grassland: Self::create_noise(seed, Biome::Grassland.noise_scale()),
            noise_desert: Self::create_noise(seed.wrapping_add(1), Biome::Desert.noise_scale()),
            noise_mountain: Self::create_noise(seed.wrapping_add(2), Biome::Mountain.noise_scale()),
            noise_road_shape: Self::create_noise(seed.wrapping_add(3), ROAD_SHAPE_SCALE),
            noise_road_height: Self::create_noise(seed.wrapping_add(4), ROAD_HEIGHT_SCALE),
            seed,
        }
    }

    fn create_noise(seed: u32, frequency: f32) -> FastNoiseLite {
        let mut noise = FastNoiseLite::with_seed(seed as i32);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_frequency(Some(frequency));
        noise
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Raw biome noise in [-1, 1]
    pub fn biome_noise(&self, biome: Biome, x: f32, z: f32) -> f32 {
        let layer = match biome {
            Biome::Grassland => &self.noise_grassland,
            Biome::Desert => &self.noise_desert,
            Biome::Mountain => &self.noise_mountain,
        };
        layer.get_noise_2d(x, z)
    }

    /// Terrain height contributed by a single biome
    pub fn biome_height(&self, biome: Biome, x: f32, z: f32) -> f32 {
        self.biome_noise(biome, x, z) * biome.noise_amplitude() + biome.base_height()
    }

    /// Road centreline field; the road runs along its zero contour
    pub fn road_value(&self, x: f32, z: f32) -> f32 {
        self.noise_road_shape.get_noise_2d(x, z)
    }

    /// Normalised road elevation noise in [-1, 1]
    pub fn road_elevation(&self, x: f32, z: f32) -> f32 {
        self.noise_road_height.get_noise_2d(x, z)
    }
}

impl Clone for NoiseField {
    fn clone(&self) -> Self {
        Self::new(self.seed)
    }
}
