//! Thread-safe chunk generation
//!
//! Samples the biome field over a chunk's vertex grid and places collectibles
//! on the resulting surface. Runs on background workers; the output depends
//! only on the seed, the generation params and the requested
//! (coordinate, subdivision).

use crate::core::content::{ContentKind, ManifestEntry};
use crate::core::coord::ChunkCoord;
use crate::core::pattern::PatternLibrary;
use crate::world::field::{BiomeField, lerp};
use crate::world::placement::{
    CellCache, CellPattern, GenerationParams, cells_reaching, decide_cell, pattern_rings, place_bonus, place_coins,
};

/// Geometry and content for one chunk at one subdivision
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkData {
    pub coord: ChunkCoord,
    pub subdivision: u32,
    /// Generation-params revision the data was built with
    pub epoch: u32,
    /// Row-major `(subdivision + 1)²` grid of chunk-local `(x, height, z)`
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 3]>,
    pub manifest: Vec<ManifestEntry>,
}

impl ChunkData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn coins(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.manifest.iter().filter(|e| e.kind == ContentKind::Coin)
    }

    pub fn bonus(&self) -> Option<&ManifestEntry> {
        self.manifest.iter().find(|e| matches!(e.kind, ContentKind::Bonus(_)))
    }
}

/// Bilinear height lookup over an already generated vertex grid
#[derive(Clone, Copy)]
pub struct HeightGrid<'a> {
    positions: &'a [[f32; 3]],
    subdivision: usize,
    chunk_size: f32,
}

impl<'a> HeightGrid<'a> {
    /// Returns `None` when `positions` is not a `(subdivision + 1)²` grid.
    pub fn new(positions: &'a [[f32; 3]], subdivision: u32, chunk_size: f32) -> Option<Self> {
        let subdivision = subdivision as usize;
        let row = subdivision + 1;
        if subdivision == 0 || positions.len() != row * row {
            return None;
        }
        Some(Self {
            positions,
            subdivision,
            chunk_size,
        })
    }

    /// Height at a chunk-local point; points outside the chunk clamp to its edge cells.
    pub fn height_at(&self, local_x: f32, local_z: f32) -> f32 {
        let seg = self.subdivision;
        let row = seg + 1;
        let gx = (local_x / self.chunk_size + 0.5) * seg as f32;
        let gz = (local_z / self.chunk_size + 0.5) * seg as f32;
        let x1 = (gx.floor().max(0.0) as usize).min(seg - 1);
        let z1 = (gz.floor().max(0.0) as usize).min(seg - 1);
        let tx = (gx - x1 as f32).clamp(0.0, 1.0);
        let tz = (gz - z1 as f32).clamp(0.0, 1.0);

        let y = |x: usize, z: usize| self.positions[z * row + x][1];
        let near = lerp(y(x1, z1), y(x1 + 1, z1), tx);
        let far = lerp(y(x1, z1 + 1), y(x1 + 1, z1 + 1), tx);
        lerp(near, far, tz)
    }
}

/// Chunk generator bound to one seed, pattern library and params set
#[derive(Clone)]
pub struct TerrainGenerator {
    field: BiomeField,
    patterns: PatternLibrary,
    params: GenerationParams,
    /// Cell rings scanned per chunk, sized to the widest template
    rings: i32,
}

impl TerrainGenerator {
    pub fn new(seed: u32, patterns: PatternLibrary, params: GenerationParams) -> Self {
        let rings = pattern_rings(patterns.max_radius() as f64, &params);
        Self {
            field: BiomeField::new(seed, params.chunk_size),
            patterns,
            params,
            rings,
        }
    }

    pub fn seed(&self) -> u32 {
        self.field.seed()
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn field(&self) -> &BiomeField {
        &self.field
    }

    pub fn cell_rings(&self) -> i32 {
        self.rings
    }

    /// Rebuilds the field if the chunk footprint changed
    pub fn set_params(&mut self, params: GenerationParams) {
        if params.chunk_size != self.params.chunk_size {
            self.field = BiomeField::new(self.seed(), params.chunk_size);
        }
        self.rings = pattern_rings(self.patterns.max_radius() as f64, &params);
        self.params = params;
    }

    pub fn generate(&self, coord: ChunkCoord, subdivision: u32) -> ChunkData {
        self.build(coord, subdivision, |cell| {
            decide_cell(cell, self.seed(), &self.params, self.patterns.len())
        })
    }

    /// Same output as [`generate`](Self::generate), memoising cell decisions in `cache`.
    pub fn generate_cached(&self, coord: ChunkCoord, subdivision: u32, cache: &mut CellCache) -> ChunkData {
        let seed = self.seed();
        self.build(coord, subdivision, |cell| {
            cache.get_or_decide(coord, cell, || {
                decide_cell(cell, seed, &self.params, self.patterns.len())
            })
        })
    }

    /// Vertex positions and colours for a `(subdivision + 1)²` grid
    pub fn sample_grid(&self, coord: ChunkCoord, subdivision: u32) -> (Vec<[f32; 3]>, Vec<[f32; 3]>) {
        let seg = subdivision.max(1);
        let row = seg as usize + 1;
        let size = self.params.chunk_size;
        let half = size / 2.0;
        let (center_x, center_z) = coord.center(size);

        let mut positions = Vec::with_capacity(row * row);
        let mut colors = Vec::with_capacity(row * row);
        for iy in 0..=seg {
            let local_z = (iy as f32 / seg as f32) * size - half;
            for ix in 0..=seg {
                let local_x = (ix as f32 / seg as f32) * size - half;
                let (height, color) = self.field.height_and_color(center_x + local_x, center_z + local_z);
                positions.push([local_x, height, local_z]);
                colors.push(color);
            }
        }
        (positions, colors)
    }

    fn build<F>(&self, coord: ChunkCoord, subdivision: u32, mut decide: F) -> ChunkData
    where
        F: FnMut(ChunkCoord) -> Option<CellPattern>,
    {
        let subdivision = subdivision.max(1);
        let (positions, colors) = self.sample_grid(coord, subdivision);
        let size = self.params.chunk_size;

        let mut manifest = Vec::new();
        if let Some(grid) = HeightGrid::new(&positions, subdivision, size) {
            let height_at = |x: f32, z: f32| grid.height_at(x, z);
            for cell in cells_reaching(coord, self.params.pattern_cell_size, self.rings) {
                let Some(pattern) = decide(cell) else {
                    continue;
                };
                if let Some(template) = self.patterns.get(pattern.template) {
                    manifest.extend(place_coins(coord, &pattern, template, size, height_at));
                }
            }
            manifest.extend(place_bonus(coord, self.seed(), &self.params, height_at));
        }

        ChunkData {
            coord,
            subdivision,
            epoch: 0,
            positions,
            colors,
            manifest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MIN_VALID_HEIGHT;
    use crate::core::pattern::{PatternOffset, PatternTemplate};

    fn generator(seed: u32) -> TerrainGenerator {
        TerrainGenerator::new(seed, PatternLibrary::builtin(), GenerationParams::default())
    }

    fn sorted_manifest(data: &ChunkData) -> Vec<(u32, u32, u32)> {
        let mut entries: Vec<_> = data
            .manifest
            .iter()
            .map(|e| (e.position.x.to_bits(), e.position.y.to_bits(), e.position.z.to_bits()))
            .collect();
        entries.sort_unstable();
        entries
    }

    #[test]
    fn test_generate_is_deterministic() {
        let a = generator(42).generate(ChunkCoord::new(3, -2), 16);
        let b = generator(42).generate(ChunkCoord::new(3, -2), 16);
        assert_eq!(a.positions.len(), b.positions.len());
        for (pa, pb) in a.positions.iter().zip(&b.positions) {
            assert_eq!(pa.map(f32::to_bits), pb.map(f32::to_bits));
        }
        assert_eq!(a.colors, b.colors);
        assert_eq!(sorted_manifest(&a), sorted_manifest(&b));
    }

    #[test]
    fn test_cached_generation_matches_pure() {
        let generator = generator(5);
        let mut cache = CellCache::new();
        for x in -3..3 {
            for z in -3..3 {
                let coord = ChunkCoord::new(x, z);
                let pure = generator.generate(coord, 8);
                let cached = generator.generate_cached(coord, 8, &mut cache);
                assert_eq!(pure, cached);
            }
        }
        assert!(!cache.is_empty());
    }

    #[test]
    fn test_regenerate_origin_chunk() {
        let first = generator(42).generate(ChunkCoord::new(0, 0), 16);
        let second = generator(42).generate(ChunkCoord::new(0, 0), 16);
        assert_eq!(first.vertex_count(), 17 * 17);
        assert_eq!(second.vertex_count(), 17 * 17);
        assert!((first.positions[0][1] - second.positions[0][1]).abs() <= f32::EPSILON);
    }

    #[test]
    fn test_grid_layout() {
        let data = generator(1).generate(ChunkCoord::new(-1, 4), 4);
        assert_eq!(data.positions.len(), 25);
        assert_eq!(data.colors.len(), 25);
        assert_eq!([data.positions[0][0], data.positions[0][2]], [-64.0, -64.0]);
        assert_eq!([data.positions[4][0], data.positions[4][2]], [64.0, -64.0]);
        assert_eq!([data.positions[5][0], data.positions[5][2]], [-64.0, -32.0]);
        assert_eq!([data.positions[24][0], data.positions[24][2]], [64.0, 64.0]);
    }

    #[test]
    fn test_seams_match_across_subdivisions() {
        let generator = generator(42);
        let fine = generator.generate(ChunkCoord::new(0, 0), 32);
        let coarse = generator.generate(ChunkCoord::new(1, 0), 4);
        for iz in 0..=4usize {
            let fine_edge = fine.positions[iz * 8 * 33 + 32];
            let coarse_edge = coarse.positions[iz * 5];
            assert_eq!(fine_edge[2], coarse_edge[2]);
            assert_eq!(fine_edge[1].to_bits(), coarse_edge[1].to_bits());
        }
    }

    #[test]
    fn test_height_grid_hits_vertices() {
        let data = generator(11).generate(ChunkCoord::new(2, 2), 8);
        let grid = HeightGrid::new(&data.positions, 8, 128.0).unwrap();
        for p in &data.positions {
            assert!((grid.height_at(p[0], p[2]) - p[1]).abs() < 1e-3);
        }
        assert!(HeightGrid::new(&data.positions, 4, 128.0).is_none());
    }

    #[test]
    fn test_manifest_entries_are_valid() {
        let generator = generator(42);
        for x in -6..6 {
            for z in -6..6 {
                let data = generator.generate(ChunkCoord::new(x, z), 8);
                let grid = HeightGrid::new(&data.positions, 8, 128.0).unwrap();
                let bonuses = data.manifest.iter().filter(|e| e.kind != ContentKind::Coin).count();
                assert!(bonuses <= 1);
                for entry in &data.manifest {
                    assert!(entry.position.x >= -64.0 && entry.position.x <= 64.0);
                    assert!(entry.position.z >= -64.0 && entry.position.z <= 64.0);
                    assert!(entry.ground_y >= MIN_VALID_HEIGHT);
                    assert_eq!(entry.ground_y, grid.height_at(entry.position.x, entry.position.z));
                }
            }
        }
    }

    #[test]
    fn test_coins_are_not_duplicated_across_chunks() {
        let generator = generator(42);
        let mut seen = std::collections::HashSet::new();
        let mut total = 0;
        for x in -4..=4 {
            for z in -4..=4 {
                let coord = ChunkCoord::new(x, z);
                let data = generator.generate(coord, 4);
                let (cx, cz) = coord.center(128.0);
                for coin in data.coins() {
                    total += 1;
                    let key = ((cx + coin.position.x).round() as i32, (cz + coin.position.z).round() as i32, coin.lift.to_bits());
                    assert!(seen.insert(key), "coin {:?} placed twice", key);
                }
            }
        }
        assert!(total > 0);
    }

    #[test]
    fn test_wide_templates_widen_the_cell_scan() {
        let line = (0..60)
            .map(|i| PatternOffset::new((i as f32 - 29.5) * 15.0, 0.0, 0.0))
            .collect();
        let library = PatternLibrary::new(vec![PatternTemplate::new("line", line)]).unwrap();
        let mut wide = TerrainGenerator::new(9, library, GenerationParams::default());
        assert_eq!(wide.cell_rings(), 2);

        let mut params = GenerationParams::default();
        params.pattern_cell_size = 1;
        wide.set_params(params);
        assert_eq!(wide.cell_rings(), 4);
        assert_eq!(generator(9).cell_rings(), 1);
    }

    #[test]
    fn test_zero_subdivision_is_clamped() {
        let data = generator(3).generate(ChunkCoord::new(0, 0), 0);
        assert_eq!(data.subdivision, 1);
        assert_eq!(data.vertex_count(), 4);
    }
}
