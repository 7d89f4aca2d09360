//! Rendering-side modules
//! Contains the terrain mesh builder and the scene boundary used by chunk streaming.

pub mod mesh;
pub mod scene;

// Re-export commonly used types
pub use mesh::{ChunkMesh, TerrainVertex, add_cell};
pub use scene::{ContentHandles, HeadlessScene, SceneHandle, SceneObject, SceneSink};
