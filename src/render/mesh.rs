use glam::Vec3;

use crate::world::generator::HeightGrid;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

/// Pushes the two triangles of one grid cell.
///
/// `a` and `d` are the near corners, `b` and `c` the far ones, wound so the
/// face normal points up.
pub fn add_cell(indices: &mut Vec<u32>, a: u32, b: u32, c: u32, d: u32) {
    indices.extend_from_slice(&[a, b, d, b, c, d]);
}

/// Renderable terrain mesh for one chunk
#[derive(Clone, Debug)]
pub struct ChunkMesh {
    subdivision: u32,
    chunk_size: f32,
    positions: Vec<[f32; 3]>,
    vertices: Vec<TerrainVertex>,
    indices: Vec<u32>,
}

impl ChunkMesh {
    /// Builds the mesh from a generated vertex grid. Returns `None` if the
    /// buffers do not form a `(subdivision + 1)²` grid.
    pub fn build(positions: Vec<[f32; 3]>, colors: &[[f32; 3]], subdivision: u32, chunk_size: f32) -> Option<Self> {
        HeightGrid::new(&positions, subdivision, chunk_size)?;
        if colors.len() != positions.len() {
            return None;
        }

        let seg = subdivision;
        let row = seg + 1;
        let mut indices = Vec::with_capacity((seg * seg * 6) as usize);
        for iy in 0..seg {
            for ix in 0..seg {
                let a = ix + row * iy;
                let b = ix + row * (iy + 1);
                let c = ix + 1 + row * (iy + 1);
                let d = ix + 1 + row * iy;
                add_cell(&mut indices, a, b, c, d);
            }
        }

        // Smooth normals: accumulate face normals per vertex
        let mut normals = vec![Vec3::ZERO; positions.len()];
        for tri in indices.chunks_exact(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let p0 = Vec3::from(positions[i0]);
            let face = (Vec3::from(positions[i1]) - p0).cross(Vec3::from(positions[i2]) - p0);
            normals[i0] += face;
            normals[i1] += face;
            normals[i2] += face;
        }

        let vertices = positions
            .iter()
            .zip(colors)
            .zip(&normals)
            .map(|((&position, &color), normal)| TerrainVertex {
                position,
                normal: normal.try_normalize().unwrap_or(Vec3::Y).to_array(),
                color,
            })
            .collect();

        Some(ChunkMesh {
            subdivision,
            chunk_size,
            positions,
            vertices,
            indices,
        })
    }

    pub fn subdivision(&self) -> u32 {
        self.subdivision
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertices(&self) -> &[TerrainVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Surface height at a chunk-local point, interpolated like content placement
    pub fn height_at(&self, local_x: f32, local_z: f32) -> f32 {
        match HeightGrid::new(&self.positions, self.subdivision, self.chunk_size) {
            Some(grid) => grid.height_at(local_x, local_z),
            None => 0.0,
        }
    }

    /// Local-space `(min, max)` corners
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let half = self.chunk_size / 2.0;
        let (min_y, max_y) = self
            .positions
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p[1]), hi.max(p[1])));
        (Vec3::new(-half, min_y, -half), Vec3::new(half, max_y, half))
    }
}
