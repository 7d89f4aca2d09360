//! Height and colour field: radial biome cycle, road ribbon, snow caps.

use crate::constants::*;
use crate::core::biome::Biome;
use crate::world::noise::NoiseField;

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

#[inline]
pub fn lerp_color(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t)]
}

/// Where a point sits inside the biome cycle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiomeBlend {
    pub from: Biome,
    pub to: Biome,
    /// 0 inside a biome plateau, ramps to 1 across a blend band
    pub t: f32,
}

impl BiomeBlend {
    fn pure(biome: Biome) -> Self {
        Self {
            from: biome,
            to: biome,
            t: 0.0,
        }
    }

    fn band(from: Biome, start: f32, cyclic: f32) -> Self {
        Self {
            from,
            to: from.next(),
            t: (cyclic - start) / BIOME_BLEND_RANGE,
        }
    }

    pub fn dominant(&self) -> Biome {
        if self.t < 0.5 { self.from } else { self.to }
    }
}

/// Cycle boundaries, in chunks
struct CycleBands {
    grassland_end: f32,
    desert_start: f32,
    desert_end: f32,
    mountain_start: f32,
    mountain_end: f32,
    length: f32,
}

const BANDS: CycleBands = {
    let grassland_end = BIOME_GRASSLAND_END;
    let desert_start = grassland_end + BIOME_BLEND_RANGE;
    let desert_end = BIOME_DESERT_END;
    let mountain_start = desert_end + BIOME_BLEND_RANGE;
    let mountain_end = mountain_start + (desert_end - desert_start);
    CycleBands {
        grassland_end,
        desert_start,
        desert_end,
        mountain_start,
        mountain_end,
        length: mountain_end + BIOME_BLEND_RANGE,
    }
};

pub fn biome_cycle_length() -> f32 {
    BANDS.length
}

pub fn biome_blend(cyclic: f32) -> BiomeBlend {
    if cyclic < BANDS.grassland_end {
        BiomeBlend::pure(Biome::Grassland)
    } else if cyclic < BANDS.desert_start {
        BiomeBlend::band(Biome::Grassland, BANDS.grassland_end, cyclic)
    } else if cyclic < BANDS.desert_end {
        BiomeBlend::pure(Biome::Desert)
    } else if cyclic < BANDS.mountain_start {
        BiomeBlend::band(Biome::Desert, BANDS.desert_end, cyclic)
    } else if cyclic < BANDS.mountain_end {
        BiomeBlend::pure(Biome::Mountain)
    } else {
        BiomeBlend::band(Biome::Mountain, BANDS.mountain_end, cyclic)
    }
}

/// Road membership of a single point
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoadSample {
    pub distance: f32,
    pub on_pavement: bool,
    pub on_shoulder: bool,
    pub height: f32,
    /// Biome to road blend weight on the shoulder (1 on pavement)
    pub blend: f32,
}

impl RoadSample {
    const NONE: RoadSample = RoadSample {
        distance: f32::INFINITY,
        on_pavement: false,
        on_shoulder: false,
        height: 0.0,
        blend: 0.0,
    };

    pub fn is_road(&self) -> bool {
        self.on_pavement || self.on_shoulder
    }
}

/// Approximate perpendicular distance to the zero contour of a field with
/// value `value` and gradient `(gx, gz)`. A flat gradient means no nearby
/// contour.
pub fn contour_distance(value: f32, gx: f32, gz: f32) -> f32 {
    let magnitude = (gx * gx + gz * gz).sqrt();
    if magnitude.is_nan() || magnitude < ROAD_MIN_GRADIENT {
        return f32::INFINITY;
    }
    value.abs() / magnitude
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSample {
    pub height: f32,
    pub color: [f32; 3],
    pub biome: Biome,
    pub road: RoadSample,
}

/// Deterministic terrain surface for one world seed
#[derive(Clone)]
pub struct BiomeField {
    noise: NoiseField,
    chunk_size: f32,
}

impl BiomeField {
    pub fn new(seed: u32, chunk_size: f32) -> Self {
        Self {
            noise: NoiseField::new(seed),
            chunk_size,
        }
    }

    pub fn seed(&self) -> u32 {
        self.noise.seed()
    }

    pub fn chunk_size(&self) -> f32 {
        self.chunk_size
    }

    /// Radial distance from the origin in chunks, wrapped to the biome cycle
    pub fn cyclic_distance(&self, x: f32, z: f32) -> f32 {
        let dist = (x * x + z * z).sqrt() / self.chunk_size;
        dist % BANDS.length
    }

    pub fn road(&self, x: f32, z: f32) -> RoadSample {
        let eps = ROAD_GRADIENT_EPSILON;
        let value = self.noise.road_value(x, z);
        let gx = (self.noise.road_value(x + eps, z) - self.noise.road_value(x - eps, z)) / (2.0 * eps);
        let gz = (self.noise.road_value(x, z + eps) - self.noise.road_value(x, z - eps)) / (2.0 * eps);
        let distance = contour_distance(value, gx, gz);

        let half_pavement = ROAD_PAVEMENT_WIDTH / 2.0;
        let total_half_width = half_pavement + ROAD_SHOULDER_WIDTH;
        let on_pavement = distance <= half_pavement;
        let on_shoulder = !on_pavement && distance <= total_half_width;
        if !on_pavement && !on_shoulder {
            return RoadSample { distance, ..RoadSample::NONE };
        }

        let height = self.noise.road_elevation(x, z) * ROAD_HEIGHT_AMPLITUDE + ROAD_BASE_HEIGHT;
        let blend = if on_shoulder {
            ((total_half_width - distance) / ROAD_SHOULDER_WIDTH).clamp(0.0, 1.0).powi(2)
        } else {
            1.0
        };

        RoadSample {
            distance,
            on_pavement,
            on_shoulder,
            height,
            blend,
        }
    }

    pub fn sample(&self, x: f32, z: f32) -> SurfaceSample {
        let blend = biome_blend(self.cyclic_distance(x, z));
        let from_height = self.noise.biome_height(blend.from, x, z);
        let (biome_height, biome_color) = if blend.from == blend.to {
            (from_height, blend.from.color())
        } else {
            let to_height = self.noise.biome_height(blend.to, x, z);
            (
                lerp(from_height, to_height, blend.t),
                lerp_color(blend.from.color(), blend.to.color(), blend.t),
            )
        };

        let road = self.road(x, z);
        let (height, mut color) = if road.on_pavement {
            (road.height, COLOR_ROAD)
        } else if road.on_shoulder {
            (
                lerp(biome_height, road.height, road.blend),
                lerp_color(biome_color, COLOR_ROAD, road.blend),
            )
        } else {
            (biome_height, biome_color)
        };

        if !road.on_pavement && is_dark_tile(x, z) {
            color = color.map(|c| c * CHECKER_SHADE);
        }

        if height > MOUNTAIN_SNOW_HEIGHT {
            let snow = ((height - MOUNTAIN_SNOW_HEIGHT) / (BIOME_BLEND_RANGE * 5.0)).min(1.0);
            color = lerp_color(color, COLOR_SNOW, snow);
        }

        SurfaceSample {
            height,
            color,
            biome: blend.dominant(),
            road,
        }
    }

    pub fn height_and_color(&self, x: f32, z: f32) -> (f32, [f32; 3]) {
        let sample = self.sample(x, z);
        (sample.height, sample.color)
    }
}

fn is_dark_tile(x: f32, z: f32) -> bool {
    let cx = (x / CHECKER_TILE_SIZE).floor() as i64;
    let cz = (z / CHECKER_TILE_SIZE).floor() as i64;
    (cx + cz).rem_euclid(2) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_layout() {
        assert_eq!(biome_cycle_length(), 41.0);
        assert_eq!(biome_blend(0.0), BiomeBlend::pure(Biome::Grassland));
        assert_eq!(biome_blend(15.0), BiomeBlend::pure(Biome::Desert));
        assert_eq!(biome_blend(30.0), BiomeBlend::pure(Biome::Mountain));

        let mid = biome_blend(8.0);
        assert_eq!((mid.from, mid.to), (Biome::Grassland, Biome::Desert));
        assert!((mid.t - 0.5).abs() < 1e-6);

        let wrap = biome_blend(40.0);
        assert_eq!((wrap.from, wrap.to), (Biome::Mountain, Biome::Grassland));
        assert!((wrap.t - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_cyclic_distance_wraps() {
        let field = BiomeField::new(1, 128.0);
        let d = field.cyclic_distance(128.0 * 43.0, 0.0);
        assert!((d - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_flat_gradient_is_infinitely_far() {
        assert_eq!(contour_distance(0.0, 0.0, 0.0), f32::INFINITY);
        assert_eq!(contour_distance(0.3, 1e-12, 0.0), f32::INFINITY);
        assert_eq!(contour_distance(0.3, f32::NAN, 0.0), f32::INFINITY);
        assert!((contour_distance(-0.5, 0.0, 0.01) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_sample_is_deterministic() {
        let a = BiomeField::new(42, 128.0);
        let b = BiomeField::new(42, 128.0);
        for i in 0..64 {
            let x = i as f32 * 97.3 - 3000.0;
            let z = i as f32 * -41.7 + 1500.0;
            let sa = a.sample(x, z);
            let sb = b.sample(x, z);
            assert_eq!(sa.height.to_bits(), sb.height.to_bits());
            assert_eq!(sa.color, sb.color);
        }
    }

    #[test]
    fn test_heights_and_colors_are_finite() {
        let field = BiomeField::new(7, 128.0);
        for i in 0..200 {
            let x = (i as f32 * 311.0) % 12000.0 - 6000.0;
            let z = (i as f32 * 173.0) % 12000.0 - 6000.0;
            let s = field.sample(x, z);
            assert!(s.height.is_finite());
            assert!(s.color.iter().all(|&c| (-1e-4..=1.0 + 1e-4).contains(&c)));
            if s.road.on_pavement {
                assert_eq!(s.height, s.road.height);
            }
        }
    }

    #[test]
    fn test_checkerboard_parity() {
        assert!(!is_dark_tile(1.0, 1.0));
        assert!(is_dark_tile(26.0, 1.0));
        assert!(is_dark_tile(-1.0, 1.0));
        assert!(!is_dark_tile(-1.0, -1.0));
    }
}
