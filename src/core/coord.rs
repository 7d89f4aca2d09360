use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Integer chunk address on the XZ plane.
///
/// Chunk `(x, z)` is centred on world position `(x * size, z * size)` and
/// covers `[-size / 2, size / 2)` around that centre on both axes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the given world-space XZ point
    pub fn from_world(world_x: f32, world_z: f32, chunk_size: f32) -> Self {
        let half = chunk_size / 2.0;
        Self {
            x: ((world_x + half) / chunk_size).floor() as i32,
            z: ((world_z + half) / chunk_size).floor() as i32,
        }
    }

    pub fn from_position(position: Vec3, chunk_size: f32) -> Self {
        Self::from_world(position.x, position.z, chunk_size)
    }

    /// World-space centre of this chunk
    pub fn center(self, chunk_size: f32) -> (f32, f32) {
        (self.x as f32 * chunk_size, self.z as f32 * chunk_size)
    }

    /// Square-footprint (ring) distance in chunks
    pub fn chebyshev(self, other: ChunkCoord) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    pub fn distance_sq(self, other: ChunkCoord) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dz * dz
    }

    /// Every coordinate within `radius` rings of `self`, row by row.
    pub fn square_around(self, radius: i32) -> impl Iterator<Item = ChunkCoord> {
        let radius = radius.max(0);
        (-radius..=radius).flat_map(move |dz| {
            (-radius..=radius).map(move |dx| ChunkCoord::new(self.x + dx, self.z + dz))
        })
    }
}

impl From<(i32, i32)> for ChunkCoord {
    fn from((x, z): (i32, i32)) -> Self {
        Self { x, z }
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}
