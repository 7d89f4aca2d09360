use crate::constants::MOUNTAIN_BASE_HEIGHT;

/// Surface biomes, visited in this order along the radial biome cycle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Biome {
    #[default]
    Grassland,
    Desert,
    Mountain,
}

impl Biome {
    pub const ALL: [Biome; 3] = [Biome::Grassland, Biome::Desert, Biome::Mountain];

    pub fn color(&self) -> [f32; 3] {
        match self {
            Biome::Grassland => [0.576, 0.929, 0.521],
            Biome::Desert => [1.0, 0.874, 0.517],
            Biome::Mountain => [0.666, 0.666, 0.666],
        }
    }

    pub fn noise_scale(&self) -> f32 {
        match self {
            Biome::Grassland => 0.003,
            Biome::Desert => 0.002,
            Biome::Mountain => 0.003,
        }
    }

    pub fn noise_amplitude(&self) -> f32 {
        match self {
            Biome::Grassland => 17.0,
            Biome::Desert => 75.0,
            Biome::Mountain => 350.0,
        }
    }

    /// Offset added on top of the biome's noise height
    pub fn base_height(&self) -> f32 {
        match self {
            Biome::Mountain => MOUNTAIN_BASE_HEIGHT,
            _ => 0.0,
        }
    }

    /// The biome the cycle blends into after this one
    pub fn next(&self) -> Biome {
        match self {
            Biome::Grassland => Biome::Desert,
            Biome::Desert => Biome::Mountain,
            Biome::Mountain => Biome::Grassland,
        }
    }
}
