//! Chunk lifecycle.
//!
//! Keeps the set of live chunks matched to the player's neighbourhood: chunks
//! in range are created and requested, chunks past the unload ring are
//! released, and chunks whose distance band changed are re-requested at the
//! new subdivision. Responses are applied only if they answer a chunk's
//! latest request; everything else is dropped.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use glam::Vec3;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::core::content::{BonusKind, CoinId};
use crate::core::coord::ChunkCoord;
use crate::core::pattern::PatternLibrary;
use crate::core::run_state::RunState;
use crate::render::mesh::ChunkMesh;
use crate::render::scene::SceneSink;
use crate::utils::settings::{LiveSettings, SettingsError, StreamSettings};
use crate::world::chunk::{Chunk, RequestStatus};
use crate::world::generator::ChunkData;
use crate::world::loader::{ChannelError, ChunkRequest, GenerationChannel, WorkerRequest, WorkerResponse};
use crate::world::lod::LodTable;
use crate::world::placement::GenerationParams;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkEvent {
    /// A mesh at `subdivision` is now displayed
    Ready { coord: ChunkCoord, subdivision: u32 },
    Unloaded(ChunkCoord),
}

/// Content addressed for removal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentRef {
    Coin(CoinId),
    Bonus(BonusKind),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Superseded by a newer request or generated with old parameters
    Stale,
    /// The chunk was unloaded while the request was in flight
    Orphaned,
    Malformed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: Vec<ChunkCoord>,
    pub destroyed: Vec<ChunkCoord>,
    pub requeued: Vec<ChunkCoord>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub reconciles: u64,
    pub dispatched: u64,
    pub applied: u64,
    pub stale: u64,
    pub orphaned: u64,
    pub malformed: u64,
    pub retried: u64,
}

pub struct ChunkManager<C: GenerationChannel, S: SceneSink> {
    channel: C,
    scene: S,
    settings: LiveSettings,
    active: StreamSettings,
    params: GenerationParams,
    lod: LodTable,
    seed: u32,
    epoch: u32,
    chunks: FxHashMap<ChunkCoord, Chunk>,
    queue: VecDeque<ChunkCoord>,
    queued: FxHashSet<ChunkCoord>,
    center: Option<ChunkCoord>,
    collected: FxHashSet<CoinId>,
    events: Vec<ChunkEvent>,
    stats: StreamStats,
}

impl<C: GenerationChannel, S: SceneSink> ChunkManager<C, S> {
    /// Validates the current settings and initializes the generation workers.
    pub fn new(
        mut channel: C,
        scene: S,
        settings: LiveSettings,
        seed: u32,
        patterns: PatternLibrary,
    ) -> Result<Self, ManagerError> {
        let active = settings.read().clone();
        active.validate()?;
        let lod = active.lod_table().map_err(SettingsError::from)?;
        let params = active.generation_params();
        channel.send(WorkerRequest::Init {
            seed,
            patterns,
            params,
        })?;
        tracing::info!(
            "Chunk streaming started: seed {}, render distance {}",
            seed,
            active.world.render_distance
        );

        Ok(Self {
            channel,
            scene,
            settings,
            active,
            params,
            lod,
            seed,
            epoch: 0,
            chunks: FxHashMap::default(),
            queue: VecDeque::new(),
            queued: FxHashSet::default(),
            center: None,
            collected: FxHashSet::default(),
            events: Vec::new(),
            stats: StreamStats::default(),
        })
    }

    /// One frame of streaming work.
    pub fn update(&mut self, run: &mut RunState, player_position: Vec3, now: Instant) {
        self.poll_responses();

        let coord = ChunkCoord::from_position(player_position, self.active.world.chunk_size);
        if run.enter_chunk(coord) {
            self.reconcile(coord);
        }

        self.retry_stalled(now);
        self.dispatch(now);
    }

    /// Brings the live set in line with a player standing in `center`.
    pub fn reconcile(&mut self, center: ChunkCoord) -> ReconcileReport {
        self.refresh_settings();
        self.center = Some(center);
        self.stats.reconciles += 1;

        let render = self.active.world.render_distance;
        let keep = render + self.active.world.unload_margin;
        let mut report = ReconcileReport::default();

        let mut doomed: Vec<ChunkCoord> = self
            .chunks
            .keys()
            .filter(|coord| coord.chebyshev(center) > keep)
            .copied()
            .collect();
        doomed.sort();
        for coord in doomed {
            self.unload(coord);
            report.destroyed.push(coord);
        }

        for coord in center.square_around(render) {
            if self.chunks.contains_key(&coord) {
                continue;
            }
            let subdivision = self.lod.select(coord.chebyshev(center) as f32);
            self.chunks.insert(coord, Chunk::new(coord, subdivision));
            self.enqueue(coord);
            report.created.push(coord);
        }

        let mut changed: Vec<(ChunkCoord, u32)> = self
            .chunks
            .values()
            .filter_map(|chunk| {
                let required = self.lod.select(chunk.coord().chebyshev(center) as f32);
                (chunk.requested_subdivision() != required).then_some((chunk.coord(), required))
            })
            .collect();
        changed.sort();
        for (coord, subdivision) in changed {
            if let Some(chunk) = self.chunks.get_mut(&coord) {
                chunk.request(subdivision);
            }
            self.enqueue(coord);
            report.requeued.push(coord);
        }

        self.sort_queue();
        tracing::debug!(
            "Reconciled around {}: +{} -{} ~{} ({} live, {} queued)",
            center,
            report.created.len(),
            report.destroyed.len(),
            report.requeued.len(),
            self.chunks.len(),
            self.queue.len()
        );
        report
    }

    /// Picks up edits made through the shared settings handle.
    fn refresh_settings(&mut self) {
        let latest = self.settings.read().clone();
        if latest == self.active {
            return;
        }
        if let Err(err) = latest.validate() {
            tracing::warn!("Ignoring settings change: {}", err);
            return;
        }

        if latest.lod != self.active.lod {
            match latest.lod_table() {
                Ok(table) => self.lod = table,
                Err(err) => {
                    tracing::warn!("Keeping previous LOD table: {}", err);
                }
            }
        }

        let params = latest.generation_params();
        if params != self.params {
            self.epoch = self.epoch.wrapping_add(1);
            self.params = params;
            if let Err(err) = self.channel.send(WorkerRequest::Configure(params)) {
                tracing::warn!("Failed to reconfigure generation workers: {}", err);
            }
            let mut coords: Vec<ChunkCoord> = self.chunks.keys().copied().collect();
            coords.sort();
            for coord in coords {
                if let Some(chunk) = self.chunks.get_mut(&coord) {
                    let subdivision = chunk.requested_subdivision();
                    chunk.request(subdivision);
                }
                self.enqueue(coord);
            }
            tracing::info!("Generation parameters changed, regenerating {} chunks", self.chunks.len());
        }

        self.active = latest;
    }

    fn enqueue(&mut self, coord: ChunkCoord) {
        if self.queued.insert(coord) {
            self.queue.push_back(coord);
        }
    }

    /// Nearest ring first, then Euclidean distance, then coordinate.
    fn sort_queue(&mut self) {
        let chunks = &self.chunks;
        let queued = &mut self.queued;
        self.queue.retain(|coord| {
            let live = chunks.contains_key(coord);
            if !live {
                queued.remove(coord);
            }
            live
        });
        if let Some(center) = self.center {
            self.queue
                .make_contiguous()
                .sort_by_key(|coord| (coord.chebyshev(center), coord.distance_sq(center), *coord));
        }
    }

    fn unload(&mut self, coord: ChunkCoord) {
        let Some(mut chunk) = self.chunks.remove(&coord) else {
            return;
        };
        chunk.release(&mut self.scene);
        if let Err(err) = self.channel.send(WorkerRequest::UnregisterChunk(coord)) {
            tracing::warn!("Failed to unregister chunk {}: {}", coord, err);
        }
        self.events.push(ChunkEvent::Unloaded(coord));
        tracing::trace!("Unloaded chunk {}", coord);
    }

    /// Sends at most `chunks_per_frame` queued requests.
    pub fn dispatch(&mut self, now: Instant) -> usize {
        let budget = self.active.streaming.chunks_per_frame;
        let mut sent = 0;
        while sent < budget {
            let Some(coord) = self.queue.pop_front() else {
                break;
            };
            self.queued.remove(&coord);
            let Some(chunk) = self.chunks.get_mut(&coord) else {
                continue;
            };
            if chunk.status() != RequestStatus::Queued {
                continue;
            }

            let request = ChunkRequest {
                coord,
                subdivision: chunk.requested_subdivision(),
                epoch: self.epoch,
            };
            match self.channel.send(WorkerRequest::GenerateChunk(request)) {
                Ok(()) => {
                    chunk.mark_in_flight(now);
                    sent += 1;
                }
                Err(err) => {
                    tracing::warn!("Failed to request chunk {}: {}", coord, err);
                    self.queued.insert(coord);
                    self.queue.push_front(coord);
                    break;
                }
            }
        }
        self.stats.dispatched += sent as u64;
        sent
    }

    /// Re-queues requests that have been in flight longer than the timeout.
    pub fn retry_stalled(&mut self, now: Instant) -> usize {
        let timeout = Duration::from_secs_f32(self.active.streaming.request_timeout_secs);
        let mut stalled: Vec<ChunkCoord> = self
            .chunks
            .values()
            .filter(|chunk| match chunk.status() {
                RequestStatus::InFlight { since } => now.saturating_duration_since(since) >= timeout,
                _ => false,
            })
            .map(Chunk::coord)
            .collect();
        if stalled.is_empty() {
            return 0;
        }

        stalled.sort();
        for &coord in &stalled {
            if let Some(chunk) = self.chunks.get_mut(&coord) {
                let subdivision = chunk.requested_subdivision();
                chunk.request(subdivision);
                tracing::warn!("Chunk {} request timed out, retrying at {}", coord, subdivision);
            }
            self.enqueue(coord);
        }
        self.stats.retried += stalled.len() as u64;
        self.sort_queue();
        stalled.len()
    }

    /// Applies every response the workers have produced so far.
    pub fn poll_responses(&mut self) -> usize {
        let mut applied = 0;
        while let Some(response) = self.channel.try_recv() {
            match response {
                WorkerResponse::Ready => tracing::info!("Generation workers ready"),
                WorkerResponse::ChunkDataReady(data) => {
                    if self.apply_response(data) == ApplyOutcome::Applied {
                        applied += 1;
                    }
                }
            }
        }
        applied
    }

    pub fn apply_response(&mut self, data: ChunkData) -> ApplyOutcome {
        let coord = data.coord;
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            tracing::trace!("Dropping data for unloaded chunk {}", coord);
            // the job re-registered its cells after the unload's release
            if let Err(err) = self.channel.send(WorkerRequest::UnregisterChunk(coord)) {
                tracing::warn!("Failed to unregister chunk {}: {}", coord, err);
            }
            self.stats.orphaned += 1;
            return ApplyOutcome::Orphaned;
        };
        if data.epoch != self.epoch || !chunk.accepts(data.subdivision) {
            tracing::trace!(
                "Dropping stale data for chunk {} at {} (epoch {}, want {} epoch {})",
                coord,
                data.subdivision,
                data.epoch,
                chunk.requested_subdivision(),
                self.epoch
            );
            self.stats.stale += 1;
            return ApplyOutcome::Stale;
        }

        let ChunkData {
            subdivision,
            positions,
            colors,
            manifest,
            ..
        } = data;
        let Some(mesh) = ChunkMesh::build(positions, &colors, subdivision, self.params.chunk_size) else {
            tracing::warn!("Malformed mesh data for chunk {} at {}", coord, subdivision);
            self.stats.malformed += 1;
            return ApplyOutcome::Malformed;
        };

        chunk.apply(mesh, &manifest, self.params.chunk_size, &self.collected, &mut self.scene);
        tracing::trace!("Chunk {} ready at {} ({} content)", coord, subdivision, chunk.content_count());
        self.events.push(ChunkEvent::Ready { coord, subdivision });
        self.stats.applied += 1;
        ApplyOutcome::Applied
    }

    /// Removes a collected entity. Collected coins stay gone across rebuilds.
    pub fn remove_content(&mut self, coord: ChunkCoord, content: ContentRef) -> bool {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return false;
        };
        match content {
            ContentRef::Coin(id) => {
                self.collected.insert(id);
                chunk.remove_coin(id, &mut self.scene)
            }
            ContentRef::Bonus(kind) => chunk.remove_bonus(kind, &mut self.scene),
        }
    }

    /// Marks coins as collected without touching live chunks, e.g. on resume
    pub fn mark_collected<I: IntoIterator<Item = CoinId>>(&mut self, ids: I) {
        self.collected.extend(ids);
    }

    pub fn collected_coins(&self) -> impl Iterator<Item = &CoinId> {
        self.collected.iter()
    }

    /// Height of the displayed terrain under a world XZ point
    pub fn ground_height(&self, world_x: f32, world_z: f32) -> Option<f32> {
        let size = self.params.chunk_size;
        let coord = ChunkCoord::from_world(world_x, world_z, size);
        let mesh = self.chunks.get(&coord)?.mesh()?;
        let (cx, cz) = coord.center(size);
        Some(mesh.height_at(world_x - cx, world_z - cz))
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn loaded_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn ready_count(&self) -> usize {
        self.chunks.values().filter(|chunk| chunk.is_ready()).count()
    }

    /// Every mesh currently on display
    pub fn meshes(&self) -> impl Iterator<Item = (ChunkCoord, &ChunkMesh)> {
        self.chunks
            .values()
            .filter_map(|chunk| chunk.mesh().map(|mesh| (chunk.coord(), mesh)))
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.chunks
            .values()
            .filter(|chunk| matches!(chunk.status(), RequestStatus::InFlight { .. }))
            .count()
    }

    /// Nothing queued and nothing in flight
    pub fn is_settled(&self) -> bool {
        self.chunks.values().all(|chunk| chunk.status() == RequestStatus::Idle)
    }

    pub fn drain_events(&mut self) -> Vec<ChunkEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn center(&self) -> Option<ChunkCoord> {
        self.center
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn lod(&self) -> &LodTable {
        &self.lod
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn settings(&self) -> &LiveSettings {
        &self.settings
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Releases every chunk and stops the workers
    pub fn shutdown(&mut self) {
        let mut coords: Vec<ChunkCoord> = self.chunks.keys().copied().collect();
        coords.sort();
        for coord in coords {
            if let Some(mut chunk) = self.chunks.remove(&coord) {
                chunk.release(&mut self.scene);
            }
        }
        self.queue.clear();
        self.queued.clear();
        if let Err(err) = self.channel.send(WorkerRequest::Shutdown) {
            tracing::debug!("Workers already gone: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::scene::HeadlessScene;
    use crate::utils::settings::live;
    use crate::world::lod::LodLevel;
    use crate::world::loader::InlineChannel;

    type TestManager = ChunkManager<InlineChannel, HeadlessScene>;

    fn settings(render_distance: i32, unload_margin: i32, lod: &[(f32, u32)]) -> StreamSettings {
        let mut settings = StreamSettings::default();
        settings.world.render_distance = render_distance;
        settings.world.unload_margin = unload_margin;
        settings.streaming.chunks_per_frame = 1000;
        settings.lod = lod
            .iter()
            .map(|&(max_distance, subdivision)| LodLevel {
                max_distance,
                subdivision,
            })
            .collect();
        settings
    }

    fn manager(channel: InlineChannel, settings: StreamSettings) -> TestManager {
        ChunkManager::new(channel, HeadlessScene::new(), live(settings), 42, PatternLibrary::builtin()).unwrap()
    }

    /// Dispatch and apply until every chunk is idle
    fn settle(manager: &mut TestManager, now: Instant) {
        for _ in 0..100 {
            manager.dispatch(now);
            manager.poll_responses();
            if manager.is_settled() {
                return;
            }
        }
        panic!("streaming did not settle");
    }

    #[test]
    fn test_initial_reconcile_fills_square() {
        let mut manager = manager(InlineChannel::manual(), settings(2, 1, &[(1.0, 8), (100.0, 2)]));
        let report = manager.reconcile(ChunkCoord::new(0, 0));
        assert_eq!(report.created.len(), 25);
        assert!(report.destroyed.is_empty());
        assert!(report.requeued.is_empty());
        assert_eq!(manager.loaded_count(), 25);
        assert_eq!(manager.chunk(ChunkCoord::new(1, -1)).unwrap().requested_subdivision(), 8);
        assert_eq!(manager.chunk(ChunkCoord::new(2, 0)).unwrap().requested_subdivision(), 2);

        manager.dispatch(Instant::now());
        let order: Vec<ChunkCoord> = manager.channel().queued().map(|r| r.coord).collect();
        assert_eq!(order[0], ChunkCoord::new(0, 0));
        assert!(order[1..9].iter().all(|c| c.chebyshev(ChunkCoord::new(0, 0)) == 1));
        // edge neighbours before corners within a ring
        assert_eq!(order[1].distance_sq(ChunkCoord::new(0, 0)), 1);
    }

    #[test]
    fn test_dispatch_is_bounded_per_frame() {
        let mut config = settings(2, 0, &[(100.0, 4)]);
        config.streaming.chunks_per_frame = 3;
        let mut manager = manager(InlineChannel::manual(), config);
        manager.reconcile(ChunkCoord::new(0, 0));

        let now = Instant::now();
        assert_eq!(manager.dispatch(now), 3);
        assert_eq!(manager.dispatch(now), 3);
        assert_eq!(manager.channel().queued().count(), 6);
        assert_eq!(manager.in_flight_count(), 6);
        assert_eq!(manager.queue_len(), 19);
    }

    #[test]
    fn test_moving_one_chunk_swaps_a_column() {
        let mut manager = manager(InlineChannel::new(), settings(5, 0, &[(1000.0, 4)]));
        manager.reconcile(ChunkCoord::new(10, 10));
        settle(&mut manager, Instant::now());
        assert_eq!(manager.loaded_count(), 121);

        let report = manager.reconcile(ChunkCoord::new(11, 10));
        let column = |x: i32| -> Vec<ChunkCoord> { (5..=15).map(|z| ChunkCoord::new(x, z)).collect() };
        let mut created = report.created.clone();
        created.sort();
        assert_eq!(created, column(16));
        assert_eq!(report.destroyed, column(5));
        assert!(report.requeued.is_empty());
        assert_eq!(manager.loaded_count(), 121);

        let unloaded: Vec<ChunkEvent> = manager
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, ChunkEvent::Unloaded(_)))
            .collect();
        assert_eq!(unloaded.len(), 11);

        settle(&mut manager, Instant::now());
        assert_eq!(manager.scene().mesh_count(), 121);
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let target = ChunkCoord::new(2, 5);
        let mut manager = manager(InlineChannel::manual(), settings(3, 0, &[(0.0, 8), (100.0, 4)]));
        let now = Instant::now();

        manager.reconcile(target);
        manager.dispatch(now);
        assert_eq!(manager.chunk(target).unwrap().requested_subdivision(), 8);

        let report = manager.reconcile(ChunkCoord::new(4, 5));
        assert!(report.requeued.contains(&target));
        manager.dispatch(now);

        // the newer request finishes first
        let channel = manager.channel_mut();
        assert_eq!(channel.process_matching(|r| r.coord == target && r.subdivision == 4), 1);
        manager.poll_responses();
        assert_eq!(manager.chunk(target).unwrap().applied_subdivision(), Some(4));
        assert!(manager.chunk(target).unwrap().is_ready());

        let channel = manager.channel_mut();
        assert_eq!(channel.process_matching(|r| r.coord == target && r.subdivision == 8), 1);
        manager.poll_responses();
        assert_eq!(manager.chunk(target).unwrap().applied_subdivision(), Some(4));
        assert_eq!(manager.stats().stale, 1);
    }

    #[test]
    fn test_orphaned_response_is_ignored() {
        let mut manager = manager(InlineChannel::manual(), settings(1, 0, &[(100.0, 2)]));
        let now = Instant::now();
        manager.reconcile(ChunkCoord::new(0, 0));
        manager.dispatch(now);

        manager.reconcile(ChunkCoord::new(50, 50));
        assert!(manager.chunk(ChunkCoord::new(0, 0)).is_none());
        manager.channel_mut().process_matching(|r| r.coord.x < 10);
        manager.poll_responses();

        assert_eq!(manager.stats().orphaned, 9);
        assert_eq!(manager.loaded_count(), 9);
        assert!(manager.chunks().all(|c| c.coord().chebyshev(ChunkCoord::new(50, 50)) <= 1));
        assert_eq!(manager.scene().mesh_count(), 0);
        let unregistered = manager
            .channel()
            .sent()
            .iter()
            .filter(|r| matches!(r, WorkerRequest::UnregisterChunk(_)))
            .count();
        // once on unload, once more when each orphaned response arrives
        assert_eq!(unregistered, 18);
    }

    #[test]
    fn test_orphaned_job_releases_worker_cells() {
        let mut manager = manager(InlineChannel::manual(), settings(1, 0, &[(100.0, 2)]));
        let now = Instant::now();
        manager.reconcile(ChunkCoord::new(0, 0));
        manager.dispatch(now);
        manager.reconcile(ChunkCoord::new(50, 50));
        manager.channel_mut().process_matching(|r| r.coord.x < 10);
        let worker = manager.channel().worker().unwrap();
        assert!(worker.cached_cells() > 0);

        manager.poll_responses();
        assert_eq!(manager.stats().orphaned, 9);
        assert_eq!(manager.channel().worker().unwrap().cached_cells(), 0);
    }

    #[test]
    fn test_lost_request_is_retried_after_timeout() {
        let mut manager = manager(InlineChannel::manual(), settings(0, 0, &[(100.0, 2)]));
        let start = Instant::now();
        manager.reconcile(ChunkCoord::new(0, 0));
        manager.dispatch(start);
        assert_eq!(manager.channel_mut().drop_queued(), 1);

        assert_eq!(manager.retry_stalled(start + Duration::from_secs(1)), 0);
        let later = start + Duration::from_secs(6);
        assert_eq!(manager.retry_stalled(later), 1);
        assert_eq!(manager.dispatch(later), 1);
        manager.channel_mut().process_all();
        manager.poll_responses();
        assert!(manager.chunk(ChunkCoord::new(0, 0)).unwrap().is_ready());
        assert_eq!(manager.stats().retried, 1);
    }

    #[test]
    fn test_no_duplicate_chunks_while_wandering() {
        let mut manager = manager(InlineChannel::new(), settings(2, 1, &[(1.0, 8), (100.0, 2)]));
        let path = [(0, 0), (1, 0), (2, 1), (1, 1), (-3, 4), (-3, 5), (0, 0)];
        let now = Instant::now();
        for (x, z) in path {
            let center = ChunkCoord::new(x, z);
            manager.reconcile(center);
            manager.dispatch(now);
            manager.poll_responses();
            let coords: FxHashSet<ChunkCoord> = manager.chunks().map(Chunk::coord).collect();
            assert_eq!(coords.len(), manager.loaded_count());
            assert!(coords.iter().all(|c| c.chebyshev(center) <= 3));
            assert!(center.square_around(2).all(|c| coords.contains(&c)));
            assert!(manager.scene().mesh_count() <= manager.loaded_count());
        }
        settle(&mut manager, now);
        assert_eq!(manager.scene().mesh_count(), manager.loaded_count());
    }

    #[test]
    fn test_update_reconciles_on_chunk_change_only() {
        let mut manager = manager(InlineChannel::new(), settings(1, 0, &[(100.0, 2)]));
        let mut run = RunState::new();
        let now = Instant::now();

        manager.update(&mut run, Vec3::new(10.0, 0.0, 10.0), now);
        manager.update(&mut run, Vec3::new(20.0, 0.0, -30.0), now);
        assert_eq!(manager.stats().reconciles, 1);

        manager.update(&mut run, Vec3::new(70.0, 0.0, 0.0), now);
        assert_eq!(manager.stats().reconciles, 2);
        assert_eq!(manager.center(), Some(ChunkCoord::new(1, 0)));
        assert_eq!(run.chunks_traversed(), 1);
    }

    #[test]
    fn test_settings_change_applies_on_next_reconcile() {
        let config = settings(2, 0, &[(100.0, 2)]);
        let mut manager = manager(InlineChannel::new(), config.clone());
        manager.reconcile(ChunkCoord::new(0, 0));
        settle(&mut manager, Instant::now());
        assert_eq!(manager.loaded_count(), 25);

        manager.settings().write().world.render_distance = 1;
        assert_eq!(manager.loaded_count(), 25);
        let report = manager.reconcile(ChunkCoord::new(0, 0));
        assert_eq!(report.destroyed.len(), 16);
        assert_eq!(manager.loaded_count(), 9);
        assert_eq!(manager.epoch(), 0);

        // invalid edits are ignored
        manager.settings().write().lod.clear();
        manager.reconcile(ChunkCoord::new(0, 0));
        assert_eq!(manager.lod().levels().len(), 1);
    }

    #[test]
    fn test_parameter_change_regenerates_and_drops_old_epoch() {
        let mut manager = manager(InlineChannel::manual(), settings(1, 0, &[(100.0, 2)]));
        let now = Instant::now();
        manager.reconcile(ChunkCoord::new(0, 0));
        manager.dispatch(now);

        manager.settings().write().content.bonus.powerup = 1.0;
        let report = manager.reconcile(ChunkCoord::new(0, 0));
        assert!(report.created.is_empty());
        assert_eq!(manager.epoch(), 1);
        assert_eq!(manager.queue_len(), 9);

        // responses generated before the change are dropped
        manager.channel_mut().process_all();
        manager.poll_responses();
        assert_eq!(manager.stats().stale, 9);

        manager.dispatch(now);
        manager.channel_mut().process_all();
        manager.poll_responses();
        assert!(manager.chunks().all(Chunk::is_ready));
        assert!(manager.chunks().all(|c| c.bonus(BonusKind::Powerup).is_some()));
    }

    #[test]
    fn test_collected_coins_stay_collected() {
        let mut manager = manager(InlineChannel::new(), settings(2, 0, &[(1.0, 8), (100.0, 4)]));
        let now = Instant::now();
        manager.reconcile(ChunkCoord::new(0, 0));
        settle(&mut manager, now);

        let (coord, id) = manager
            .chunks()
            .find_map(|c| c.coins().first().and_then(|coin| coin.coin_id.map(|id| (c.coord(), id))))
            .expect("some chunk near the origin has coins");
        let before = manager.chunk(coord).unwrap().coins().len();
        assert!(manager.remove_content(coord, ContentRef::Coin(id)));
        assert_eq!(manager.chunk(coord).unwrap().coins().len(), before - 1);

        // force a rebuild of every chunk
        manager.settings().write().content.bonus.xray = 0.5;
        manager.reconcile(ChunkCoord::new(0, 0));
        settle(&mut manager, now);
        let chunk = manager.chunk(coord).unwrap();
        assert_eq!(chunk.coins().len(), before - 1);
        assert!(chunk.coins().iter().all(|coin| coin.coin_id != Some(id)));
        assert!(manager.collected_coins().any(|c| *c == id));
    }

    #[test]
    fn test_ground_height_follows_mesh() {
        let mut manager = manager(InlineChannel::new(), settings(1, 0, &[(100.0, 8)]));
        assert_eq!(manager.ground_height(0.0, 0.0), None);
        manager.reconcile(ChunkCoord::new(0, 0));
        settle(&mut manager, Instant::now());

        let mesh = manager.chunk(ChunkCoord::new(0, 0)).unwrap().mesh().unwrap();
        let corner = mesh.vertices()[0].position;
        let height = manager.ground_height(corner[0], corner[2]).unwrap();
        assert!((height - corner[1]).abs() < 1e-3);
        assert!(manager.ground_height(1000.0, 0.0).is_none());
    }

    #[test]
    fn test_ready_events_and_shutdown() {
        let mut manager = manager(InlineChannel::new(), settings(1, 0, &[(100.0, 2)]));
        manager.reconcile(ChunkCoord::new(0, 0));
        settle(&mut manager, Instant::now());
        let ready = manager
            .drain_events()
            .iter()
            .filter(|e| matches!(e, ChunkEvent::Ready { subdivision: 2, .. }))
            .count();
        assert_eq!(ready, 9);
        assert!(manager.drain_events().is_empty());

        manager.shutdown();
        assert!(manager.scene().is_empty());
        assert_eq!(manager.loaded_count(), 0);
        assert!(!manager.channel().is_ready());
    }
}
