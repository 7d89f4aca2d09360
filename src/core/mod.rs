//! Core data structures shared by generation and streaming
//! Contains chunk coordinates, biomes, collectible content, and coin patterns.

pub mod biome;
pub mod content;
pub mod coord;
pub mod pattern;
pub mod run_state;

// Re-export commonly used types
pub use biome::Biome;
pub use content::{BonusKind, CoinId, ContentKind, ManifestEntry};
pub use coord::ChunkCoord;
pub use pattern::{PatternError, PatternLibrary, PatternOffset, PatternTemplate};
pub use run_state::RunState;
