//! Collectible content produced by the terrain generator.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Bonus pickups; a chunk holds at most one of each.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum BonusKind {
    Powerup,
    Speedup,
    Sunrise,
    XRay,
}

impl BonusKind {
    /// Roll order used by the generator
    pub const ALL: [BonusKind; 4] = [
        BonusKind::Powerup,
        BonusKind::Speedup,
        BonusKind::Sunrise,
        BonusKind::XRay,
    ];

    /// Coordinate multipliers that decorrelate the rolls of bonus kinds sharing a chunk
    pub fn seed_multipliers(self) -> (i32, i32) {
        match self {
            BonusKind::Powerup => (11, 12),
            BonusKind::Speedup => (21, 22),
            BonusKind::Sunrise => (31, 32),
            BonusKind::XRay => (41, 42),
        }
    }

    pub fn default_chance(self) -> f64 {
        match self {
            BonusKind::Powerup => POWERUP_SPAWN_CHANCE,
            BonusKind::Speedup => SPEEDUP_SPAWN_CHANCE,
            BonusKind::Sunrise => SUNRISE_SPAWN_CHANCE,
            BonusKind::XRay => XRAY_SPAWN_CHANCE,
        }
    }

    pub fn scale(self) -> f32 {
        BONUS_SCALE
    }

    /// Slot index inside a chunk's bonus table
    pub fn index(self) -> usize {
        match self {
            BonusKind::Powerup => 0,
            BonusKind::Speedup => 1,
            BonusKind::Sunrise => 2,
            BonusKind::XRay => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BonusKind::Powerup => "powerup",
            BonusKind::Speedup => "speedup",
            BonusKind::Sunrise => "sunrise",
            BonusKind::XRay => "xray",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ContentKind {
    Coin,
    Bonus(BonusKind),
}

/// One placeable entity emitted alongside a chunk's geometry.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub kind: ContentKind,
    /// Chunk-local spawn position; `y` already includes hover height
    pub position: Vec3,
    pub ground_y: f32,
    /// Vertical offset taken from the pattern template (coins only)
    pub lift: f32,
}

impl ManifestEntry {
    pub fn world_position(&self, chunk_center: (f32, f32)) -> Vec3 {
        Vec3::new(
            chunk_center.0 + self.position.x,
            self.position.y,
            chunk_center.1 + self.position.z,
        )
    }
}

/// Stable coin identity built from rounded world coordinates.
///
/// The ground height depends on the mesh subdivision the coin was placed on,
/// so it is left out and only the template lift contributes on the Y axis.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct CoinId {
    pub x: i32,
    pub lift: i32,
    pub z: i32,
}

impl CoinId {
    pub fn new(world_x: f32, world_z: f32, lift: f32) -> Self {
        Self {
            x: world_x.round() as i32,
            lift: lift.round() as i32,
            z: world_z.round() as i32,
        }
    }
}
