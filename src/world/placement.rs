//! Deterministic placement of collectibles.
//!
//! Bonus pickups are rolled per chunk. Coin patterns are decided once per
//! pattern cell (a square of `cell_size` chunks) and then clipped into each
//! querying chunk, so a shape spanning a chunk border is neither cut off nor
//! duplicated: every coin falls into exactly one chunk's half-open footprint.
//! Every decision is a pure function of coordinates and seed.

use std::f64::consts::TAU;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::core::content::{BonusKind, ContentKind, ManifestEntry};
use crate::core::coord::ChunkCoord;
use crate::core::pattern::PatternTemplate;

/// Hash of (a, b, seed) into [0, 1).
pub fn seeded_random(a: f64, b: f64, seed: u32) -> f64 {
    let dot = a * 12.9898 + b * 78.233 + seed as f64 * 45.543;
    let s = dot.sin() * 43758.5453;
    let r = s - s.floor();
    if r >= 1.0 { 0.0 } else { r }
}

/// Per-type bonus spawn probabilities
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BonusChances {
    pub powerup: f64,
    pub speedup: f64,
    pub sunrise: f64,
    pub xray: f64,
}

impl BonusChances {
    pub fn chance(&self, kind: BonusKind) -> f64 {
        match kind {
            BonusKind::Powerup => self.powerup,
            BonusKind::Speedup => self.speedup,
            BonusKind::Sunrise => self.sunrise,
            BonusKind::XRay => self.xray,
        }
    }
}

impl Default for BonusChances {
    fn default() -> Self {
        Self {
            powerup: BonusKind::Powerup.default_chance(),
            speedup: BonusKind::Speedup.default_chance(),
            sunrise: BonusKind::Sunrise.default_chance(),
            xray: BonusKind::XRay.default_chance(),
        }
    }
}

/// Everything besides the seed that shapes generated chunks
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationParams {
    pub chunk_size: f32,
    pub pattern_cell_size: i32,
    pub pattern_spawn_chance: f64,
    pub bonus_chances: BonusChances,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            pattern_cell_size: PATTERN_CELL_SIZE,
            pattern_spawn_chance: PATTERN_SPAWN_CHANCE,
            bonus_chances: BonusChances::default(),
        }
    }
}

/// Chunk-local placement with `x, z` in `[-size / 2, size / 2)`
pub fn clip_to_chunk(coord: ChunkCoord, chunk_size: f32, world_x: f64, world_z: f64) -> Option<(f32, f32)> {
    let size = chunk_size as f64;
    let half = size / 2.0;
    let local_x = world_x - coord.x as f64 * size;
    let local_z = world_z - coord.z as f64 * size;
    let inside = |v: f64| (-half..half).contains(&v);
    if inside(local_x) && inside(local_z) {
        Some((local_x as f32, local_z as f32))
    } else {
        None
    }
}

// ---- Bonuses ----

pub fn bonus_roll(coord: ChunkCoord, kind: BonusKind, seed: u32) -> f64 {
    let (mx, mz) = kind.seed_multipliers();
    seeded_random(coord.x as f64 * mx as f64, coord.z as f64 * mz as f64, seed)
}

/// Picks at most one bonus for a chunk: the first kind in roll order whose
/// roll succeeds and whose ground height is valid.
pub fn place_bonus<H>(coord: ChunkCoord, seed: u32, params: &GenerationParams, height_at: H) -> Option<ManifestEntry>
where
    H: Fn(f32, f32) -> f32,
{
    let size = params.chunk_size as f64;
    for kind in BonusKind::ALL {
        if bonus_roll(coord, kind, seed) >= params.bonus_chances.chance(kind) {
            continue;
        }
        let (mx, mz) = kind.seed_multipliers();
        let cx = coord.x as f64;
        let cz = coord.z as f64;
        let local_x = ((seeded_random(cx * mx as f64, cz * mx as f64, seed) - 0.5) * size) as f32;
        let local_z = ((seeded_random(cx * mz as f64, cz * mz as f64, seed) - 0.5) * size) as f32;
        let ground_y = height_at(local_x, local_z);
        if ground_y < MIN_VALID_HEIGHT {
            continue;
        }
        let y = ground_y + kind.scale() / 2.0 + COIN_HOVER_HEIGHT * 2.0;
        return Some(ManifestEntry {
            kind: ContentKind::Bonus(kind),
            position: glam::Vec3::new(local_x, y, local_z),
            ground_y,
            lift: 0.0,
        });
    }
    None
}

// ---- Coin patterns ----

pub fn pattern_cell(coord: ChunkCoord, cell_size: i32) -> ChunkCoord {
    let cell_size = cell_size.max(1);
    ChunkCoord::new(coord.x.div_euclid(cell_size), coord.z.div_euclid(cell_size))
}

/// Rings of neighbouring cells a chunk must scan so that no template of
/// `max_radius` is cut off. A cell's pattern origin stays inside the cell, so
/// its coins reach at most `max_radius` past the cell's edge.
pub fn pattern_rings(max_radius: f64, params: &GenerationParams) -> i32 {
    let span = params.chunk_size as f64 * params.pattern_cell_size.max(1) as f64;
    if !max_radius.is_finite() || span <= 0.0 {
        return 1;
    }
    ((max_radius / span).ceil() as i32).max(1)
}

/// Cells whose pattern can reach into `coord`: its own cell and `rings`
/// rings around it.
pub fn cells_reaching(coord: ChunkCoord, cell_size: i32, rings: i32) -> impl Iterator<Item = ChunkCoord> {
    pattern_cell(coord, cell_size).square_around(rings)
}

/// World-space decision for one pattern cell
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellPattern {
    pub template: usize,
    pub origin_x: f64,
    pub origin_z: f64,
    pub angle: f64,
}

impl CellPattern {
    /// World-space `(x, z, lift)` of every coin in the template
    pub fn world_offsets<'a>(&self, template: &'a PatternTemplate) -> impl Iterator<Item = (f64, f64, f32)> + 'a {
        let (sin, cos) = self.angle.sin_cos();
        let (ox, oz) = (self.origin_x, self.origin_z);
        template.offsets.iter().map(move |offset| {
            let x = offset.x as f64;
            let z = offset.z as f64;
            (ox + x * cos - z * sin, oz + x * sin + z * cos, offset.y)
        })
    }
}

pub fn decide_cell(cell: ChunkCoord, seed: u32, params: &GenerationParams, template_count: usize) -> Option<CellPattern> {
    if template_count == 0 {
        return None;
    }
    let gx = cell.x as f64;
    let gz = cell.z as f64;
    if seeded_random(gx * 7.0, gz * 13.0, seed) > params.pattern_spawn_chance {
        return None;
    }

    let template = ((seeded_random(gx * 17.0, gz * 19.0, seed) * template_count as f64) as usize).min(template_count - 1);
    let span = params.chunk_size as f64 * params.pattern_cell_size.max(1) as f64;
    let offset_x = (seeded_random(gx * 23.0, gz * 29.0, seed) - 0.5) * span;
    let offset_z = (seeded_random(gx * 31.0, gz * 37.0, seed) - 0.5) * span;
    // Cells are laid out on chunk centres, so shift by half a chunk to the cell's corner
    let corner = -(params.chunk_size as f64) / 2.0;

    Some(CellPattern {
        template,
        origin_x: corner + (gx + 0.5) * span + offset_x,
        origin_z: corner + (gz + 0.5) * span + offset_z,
        angle: seeded_random(gx, gz, seed) * TAU,
    })
}

/// Clips a cell's pattern into `coord` and resolves coin heights.
pub fn place_coins<H>(
    coord: ChunkCoord,
    pattern: &CellPattern,
    template: &PatternTemplate,
    chunk_size: f32,
    height_at: H,
) -> Vec<ManifestEntry>
where
    H: Fn(f32, f32) -> f32,
{
    pattern
        .world_offsets(template)
        .filter_map(|(wx, wz, lift)| {
            let (local_x, local_z) = clip_to_chunk(coord, chunk_size, wx, wz)?;
            let ground_y = height_at(local_x, local_z);
            if !(MIN_VALID_HEIGHT..=COIN_MAX_GROUND).contains(&ground_y) {
                return None;
            }
            let y = ground_y + lift + 1.5 * COIN_SCALE + COIN_HOVER_HEIGHT;
            Some(ManifestEntry {
                kind: ContentKind::Coin,
                position: glam::Vec3::new(local_x, y, local_z),
                ground_y,
                lift,
            })
        })
        .collect()
}

/// Worker-side memo of pattern-cell decisions, reference counted by the
/// chunks that queried each cell.
#[derive(Default)]
pub struct CellCache {
    cells: FxHashMap<ChunkCoord, CachedCell>,
}

struct CachedCell {
    pattern: Option<CellPattern>,
    chunks: FxHashSet<ChunkCoord>,
}

impl CellCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_decide<F>(&mut self, chunk: ChunkCoord, cell: ChunkCoord, decide: F) -> Option<CellPattern>
    where
        F: FnOnce() -> Option<CellPattern>,
    {
        let entry = self.cells.entry(cell).or_insert_with(|| CachedCell {
            pattern: decide(),
            chunks: FxHashSet::default(),
        });
        entry.chunks.insert(chunk);
        entry.pattern
    }

    /// Drops `chunk`'s reference; the cell entry goes once no chunk holds it.
    pub fn release(&mut self, chunk: ChunkCoord, cell: ChunkCoord) {
        if let Some(entry) = self.cells.get_mut(&cell) {
            entry.chunks.remove(&chunk);
            if entry.chunks.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    pub fn release_chunk(&mut self, chunk: ChunkCoord, cell_size: i32, rings: i32) {
        for cell in cells_reaching(chunk, cell_size, rings) {
            self.release(chunk, cell);
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
