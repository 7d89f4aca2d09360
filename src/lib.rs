// Core module with coordinates, biomes and collectible content
pub mod core;

// Render module with the terrain mesh and scene boundary
pub mod render;

// World module with generation and streaming
pub mod world;

// Other modules
pub mod constants;
pub mod save;
pub mod utils;

// Re-exports
pub use constants::*;
pub use crate::core::{Biome, BonusKind, ChunkCoord, CoinId, ContentKind, ManifestEntry, PatternLibrary, RunState};
pub use render::{ChunkMesh, HeadlessScene, SceneSink, TerrainVertex};
pub use save::{DEFAULT_SESSION_FILE, SaveError, SavedSession, load_session, save_session};
pub use utils::{LiveSettings, SettingsError, StreamSettings};
pub use world::{
    ChunkEvent, ChunkManager, ContentRef, GenerationChannel, GenerationParams, InlineChannel, LodTable,
    TerrainGenerator, WorkerPool,
};
