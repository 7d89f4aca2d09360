use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use glam::Vec3;
use thiserror::Error;

use runner_world::core::PatternError;
use runner_world::utils::live;
use runner_world::world::{ChannelError, ManagerError};
use runner_world::{
    BonusKind, ChunkCoord, ChunkEvent, ChunkManager, CoinId, ContentRef, DEFAULT_SESSION_FILE, HeadlessScene,
    PICKUP_RADIUS, PLAYER_RUN_SPEED, PatternLibrary, RunState, SIMULATION_TICK, SaveError, SavedSession,
    SettingsError, StreamSettings, WorkerPool, load_session, save_session,
};

/// Headless infinite-runner world streamer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// World seed (random when omitted)
    #[arg(long)]
    seed: Option<u32>,

    /// Streaming settings file (defaults to the per-user config file)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Coin pattern library in TOML
    #[arg(long)]
    patterns: Option<PathBuf>,

    /// Number of frames to simulate
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Player speed in world units per second
    #[arg(long, default_value_t = PLAYER_RUN_SPEED)]
    speed: f32,

    /// Running direction in degrees, 0 is +X
    #[arg(long, default_value_t = 0.0)]
    heading: f32,

    /// Override the generation worker count
    #[arg(long)]
    workers: Option<usize>,

    /// Write the session here on exit
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_SESSION_FILE)]
    save: Option<PathBuf>,

    /// Resume a saved session
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Do not sleep between frames
    #[arg(long, default_value_t = false)]
    fast: bool,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Patterns(#[from] PatternError),
    #[error(transparent)]
    Save(#[from] SaveError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Manager(#[from] ManagerError),
}

fn load_settings(args: &Args) -> Result<StreamSettings, SettingsError> {
    if let Some(path) = &args.config {
        return StreamSettings::load(path);
    }
    match StreamSettings::default_path() {
        Some(path) => StreamSettings::load_or_default(path),
        None => Ok(StreamSettings::default()),
    }
}

type Manager = ChunkManager<WorkerPool, HeadlessScene>;

/// Picks up every coin and bonus within reach of the player
fn collect_nearby(manager: &mut Manager, run: &mut RunState, position: Vec3) {
    let size = manager.params().chunk_size;
    let here = ChunkCoord::from_position(position, size);
    let mut picked: Vec<(ChunkCoord, ContentRef)> = Vec::new();

    for coord in here.square_around(1) {
        let Some(chunk) = manager.chunk(coord) else {
            continue;
        };
        let in_reach = |p: Vec3| Vec3::new(p.x - position.x, 0.0, p.z - position.z).length() <= PICKUP_RADIUS;
        for coin in chunk.coins() {
            if let Some(id) = coin.coin_id
                && in_reach(coin.position)
            {
                picked.push((coord, ContentRef::Coin(id)));
            }
        }
        for kind in BonusKind::ALL {
            if chunk.bonus(kind).is_some_and(|b| in_reach(b.position)) {
                picked.push((coord, ContentRef::Bonus(kind)));
            }
        }
    }

    for (coord, content) in picked {
        if !manager.remove_content(coord, content) {
            continue;
        }
        match content {
            ContentRef::Coin(_) => run.record_coin(),
            ContentRef::Bonus(kind) => tracing::info!("Picked up {} in chunk {}", kind.name(), coord),
        }
    }
}

pub fn run() -> Result<(), AppError> {
    let args = Args::parse();

    let settings = load_settings(&args)?;
    let patterns = match &args.patterns {
        Some(path) => PatternLibrary::load(path)?,
        None => PatternLibrary::builtin(),
    };
    let resumed = match &args.resume {
        Some(path) => Some(load_session(path)?),
        None => None,
    };

    let seed = resumed
        .as_ref()
        .map(|session| session.seed)
        .or(args.seed)
        .unwrap_or_else(rand::random::<u32>);
    let mut position = resumed
        .as_ref()
        .map(|session| Vec3::from(session.player))
        .unwrap_or(Vec3::ZERO);
    let mut run = match &resumed {
        Some(session) => RunState::resumed(session.chunks_traversed, session.coins_collected),
        None => RunState::new(),
    };

    let worker_count = args.workers.unwrap_or_else(|| settings.effective_worker_count());
    let pool = WorkerPool::new(worker_count)?;
    tracing::info!("Seed {}, {} patterns, {} workers", seed, patterns.len(), worker_count);

    let mut manager = ChunkManager::new(pool, HeadlessScene::new(), live(settings), seed, patterns)?;
    if let Some(session) = &resumed {
        manager.mark_collected(session.collected.iter().copied());
        tracing::info!(
            "Resumed at ({:.1}, {:.1}) with {} coins already collected",
            position.x,
            position.z,
            session.collected.len()
        );
    }

    let heading = args.heading.to_radians();
    let direction = Vec3::new(heading.cos(), 0.0, heading.sin());
    let tick = Duration::from_secs_f32(SIMULATION_TICK);
    let started = Instant::now();

    for frame in 0..args.frames {
        let now = Instant::now();
        position += direction * args.speed * SIMULATION_TICK;
        if let Some(height) = manager.ground_height(position.x, position.z) {
            position.y = height;
        }

        manager.update(&mut run, position, now);
        collect_nearby(&mut manager, &mut run, position);

        for event in manager.drain_events() {
            match event {
                ChunkEvent::Ready { coord, subdivision } => {
                    tracing::trace!("Chunk {} shown at {}", coord, subdivision)
                }
                ChunkEvent::Unloaded(coord) => tracing::trace!("Chunk {} unloaded", coord),
            }
        }

        if frame % 60 == 0 {
            tracing::info!(
                "Frame {}: chunk {}, {} live / {} ready, {} queued, {} coins",
                frame,
                ChunkCoord::from_position(position, manager.params().chunk_size),
                manager.loaded_count(),
                manager.ready_count(),
                manager.queue_len(),
                run.coins_collected()
            );
        }

        if !args.fast {
            thread::sleep(tick.saturating_sub(now.elapsed()));
        }
    }

    let stats = manager.stats();
    tracing::info!(
        "Done in {:.1}s: {} reconciles, {} applied, {} stale, {} orphaned, {} retried, {} chunks traversed",
        started.elapsed().as_secs_f32(),
        stats.reconciles,
        stats.applied,
        stats.stale,
        stats.orphaned,
        stats.retried,
        run.chunks_traversed()
    );

    if let Some(path) = &args.save {
        let collected: Vec<CoinId> = manager.collected_coins().copied().collect();
        let session = SavedSession::capture(seed, position.to_array(), &collected, &run);
        save_session(path, &session)?;
        tracing::info!("Session saved to {}", path.display());
    }

    manager.shutdown();
    Ok(())
}
