// World constants
pub const CHUNK_SIZE: f32 = 128.0;
pub const RENDER_DISTANCE: i32 = 14;
pub const UNLOAD_MARGIN: i32 = 3;

// Streaming constants
pub const CHUNKS_PER_FRAME: usize = 2;
pub const ASYNC_WORKER_COUNT: usize = 2;
pub const REQUEST_TIMEOUT_SECS: f32 = 5.0;
pub const WORKER_QUEUE_CAPACITY: usize = 256;
pub const RESULT_QUEUE_CAPACITY: usize = 64;

// LOD table: (max chunk distance, grid subdivision)
pub const LOD_LEVELS: [(f32, u32); 5] = [(8.0, 32), (15.0, 16), (32.0, 8), (128.0, 4), (256.0, 1)];

// Biome cycle, measured in chunks from the origin
pub const BIOME_BLEND_RANGE: f32 = 2.0;
pub const BIOME_GRASSLAND_END: f32 = 7.0;
pub const BIOME_DESERT_END: f32 = 23.0;
pub const MOUNTAIN_BASE_HEIGHT: f32 = 350.0;
pub const MOUNTAIN_SNOW_HEIGHT: f32 = 435.0;

// Road ribbon
pub const ROAD_SHAPE_SCALE: f32 = 0.00019;
pub const ROAD_HEIGHT_SCALE: f32 = 0.0008;
pub const ROAD_HEIGHT_AMPLITUDE: f32 = 40.0;
pub const ROAD_BASE_HEIGHT: f32 = 15.0;
pub const ROAD_PAVEMENT_WIDTH: f32 = 135.0;
pub const ROAD_SHOULDER_WIDTH: f32 = 130.0;
pub const ROAD_GRADIENT_EPSILON: f32 = 1.0;
pub const ROAD_MIN_GRADIENT: f32 = 1e-9;

// Surface colouring
pub const CHECKER_TILE_SIZE: f32 = 25.0;
pub const CHECKER_SHADE: f32 = 0.9;
pub const COLOR_ROAD: [f32; 3] = [0.5, 0.5, 0.5];
pub const COLOR_SNOW: [f32; 3] = [1.0, 1.0, 1.0];

// Collectibles
pub const PATTERN_CELL_SIZE: i32 = 3;
pub const PATTERN_SPAWN_CHANCE: f64 = 1.0;
pub const COIN_SCALE: f32 = 6.0;
pub const COIN_HOVER_HEIGHT: f32 = 6.0;
pub const COIN_MAX_GROUND: f32 = 200.0;
pub const BONUS_SCALE: f32 = 20.0;
pub const MIN_VALID_HEIGHT: f32 = -500.0;
pub const POWERUP_SPAWN_CHANCE: f64 = 0.05;
pub const SPEEDUP_SPAWN_CHANCE: f64 = 0.05;
pub const SUNRISE_SPAWN_CHANCE: f64 = 0.005;
pub const XRAY_SPAWN_CHANCE: f64 = 0.05;

// Simulated player
pub const PLAYER_RUN_SPEED: f32 = 60.0;
pub const SIMULATION_TICK: f32 = 1.0 / 60.0;
pub const PICKUP_RADIUS: f32 = 12.0;
