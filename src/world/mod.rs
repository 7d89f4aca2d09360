//! World generation and streaming
//! Contains the noise and biome fields, content placement, the terrain
//! generator, background generation workers, and the chunk lifecycle.

pub mod chunk;
pub mod field;
pub mod generator;
pub mod loader;
pub mod lod;
pub mod manager;
pub mod noise;
pub mod placement;

// Re-export commonly used types
pub use chunk::{Chunk, ChunkState, ContentEntity, RequestStatus};
pub use field::{BiomeBlend, BiomeField, RoadSample, SurfaceSample};
pub use generator::{ChunkData, HeightGrid, TerrainGenerator};
pub use loader::{
    ChannelError, ChunkRequest, GenerationChannel, GenerationWorker, InlineChannel, WorkerPool, WorkerRequest,
    WorkerResponse,
};
pub use lod::{LodLevel, LodTable, LodTableError};
pub use manager::{ApplyOutcome, ChunkEvent, ChunkManager, ContentRef, ManagerError, ReconcileReport, StreamStats};
pub use noise::NoiseField;
pub use placement::{BonusChances, CellCache, GenerationParams};
