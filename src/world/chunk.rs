use std::time::Instant;

use glam::Vec3;
use rustc_hash::FxHashSet;

use crate::core::content::{BonusKind, CoinId, ContentKind, ManifestEntry};
use crate::core::coord::ChunkCoord;
use crate::render::mesh::ChunkMesh;
use crate::render::scene::{ContentHandles, SceneHandle, SceneSink};

/// Where the chunk's latest generation request is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestStatus {
    /// Nothing outstanding
    Idle,
    /// Waiting in the manager's dispatch queue
    Queued,
    InFlight { since: Instant },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    Pending(u32),
    Ready(u32),
}

/// Spawned collectible with its scene handles
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContentEntity {
    pub kind: ContentKind,
    pub coin_id: Option<CoinId>,
    pub position: Vec3,
    pub ground_y: f32,
    pub handles: ContentHandles,
}

/// One streamed terrain tile. Only the chunk manager creates and destroys these.
pub struct Chunk {
    coord: ChunkCoord,
    mesh: Option<ChunkMesh>,
    mesh_handle: Option<SceneHandle>,
    applied_subdivision: Option<u32>,
    requested_subdivision: u32,
    status: RequestStatus,
    coins: Vec<ContentEntity>,
    bonuses: [Option<ContentEntity>; 4],
}

impl Chunk {
    /// New chunk waiting for its first mesh
    pub fn new(coord: ChunkCoord, subdivision: u32) -> Self {
        Chunk {
            coord,
            mesh: None,
            mesh_handle: None,
            applied_subdivision: None,
            requested_subdivision: subdivision,
            status: RequestStatus::Queued,
            coins: Vec::new(),
            bonuses: [None; 4],
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn mesh(&self) -> Option<&ChunkMesh> {
        self.mesh.as_ref()
    }

    pub fn applied_subdivision(&self) -> Option<u32> {
        self.applied_subdivision
    }

    pub fn requested_subdivision(&self) -> u32 {
        self.requested_subdivision
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn state(&self) -> ChunkState {
        match (self.status, self.applied_subdivision) {
            (RequestStatus::Idle, Some(applied)) if applied == self.requested_subdivision => {
                ChunkState::Ready(applied)
            }
            _ => ChunkState::Pending(self.requested_subdivision),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state(), ChunkState::Ready(_))
    }

    pub fn coins(&self) -> &[ContentEntity] {
        &self.coins
    }

    pub fn bonus(&self, kind: BonusKind) -> Option<&ContentEntity> {
        self.bonuses[kind.index()].as_ref()
    }

    pub fn bonuses(&self) -> impl Iterator<Item = &ContentEntity> {
        self.bonuses.iter().flatten()
    }

    pub fn content_count(&self) -> usize {
        self.coins.len() + self.bonuses().count()
    }

    /// Marks a new latest request; the chunk stays pending until it is applied
    pub(crate) fn request(&mut self, subdivision: u32) {
        self.requested_subdivision = subdivision;
        self.status = RequestStatus::Queued;
    }

    pub(crate) fn mark_in_flight(&mut self, now: Instant) {
        self.status = RequestStatus::InFlight { since: now };
    }

    /// Whether a response at `subdivision` is the one this chunk is waiting for
    pub fn accepts(&self, subdivision: u32) -> bool {
        self.status != RequestStatus::Idle && subdivision == self.requested_subdivision
    }

    /// Replaces the mesh and content with a freshly generated set.
    pub(crate) fn apply<S: SceneSink>(
        &mut self,
        mesh: ChunkMesh,
        manifest: &[ManifestEntry],
        chunk_size: f32,
        collected: &FxHashSet<CoinId>,
        scene: &mut S,
    ) {
        if let Some(handle) = self.mesh_handle.take() {
            scene.remove_mesh(handle);
        }
        self.despawn_content(scene);

        self.mesh_handle = Some(scene.add_mesh(self.coord, &mesh));
        self.applied_subdivision = Some(mesh.subdivision());
        self.mesh = Some(mesh);
        self.status = RequestStatus::Idle;

        let center = self.coord.center(chunk_size);
        for entry in manifest {
            let position = entry.world_position(center);
            match entry.kind {
                ContentKind::Coin => {
                    let id = CoinId::new(position.x, position.z, entry.lift);
                    if collected.contains(&id) {
                        continue;
                    }
                    let handles = scene.spawn_content(entry.kind, position, entry.ground_y);
                    self.coins.push(ContentEntity {
                        kind: entry.kind,
                        coin_id: Some(id),
                        position,
                        ground_y: entry.ground_y,
                        handles,
                    });
                }
                ContentKind::Bonus(kind) => {
                    let slot = &mut self.bonuses[kind.index()];
                    if let Some(previous) = slot.take() {
                        scene.despawn_content(previous.handles);
                    }
                    let handles = scene.spawn_content(entry.kind, position, entry.ground_y);
                    *slot = Some(ContentEntity {
                        kind: entry.kind,
                        coin_id: None,
                        position,
                        ground_y: entry.ground_y,
                        handles,
                    });
                }
            }
        }
    }

    pub(crate) fn remove_coin<S: SceneSink>(&mut self, id: CoinId, scene: &mut S) -> bool {
        let Some(index) = self.coins.iter().position(|c| c.coin_id == Some(id)) else {
            return false;
        };
        let coin = self.coins.swap_remove(index);
        scene.despawn_content(coin.handles);
        true
    }

    pub(crate) fn remove_bonus<S: SceneSink>(&mut self, kind: BonusKind, scene: &mut S) -> bool {
        match self.bonuses[kind.index()].take() {
            Some(bonus) => {
                scene.despawn_content(bonus.handles);
                true
            }
            None => false,
        }
    }

    fn despawn_content<S: SceneSink>(&mut self, scene: &mut S) {
        for coin in self.coins.drain(..) {
            scene.despawn_content(coin.handles);
        }
        for bonus in self.bonuses.iter_mut().filter_map(Option::take) {
            scene.despawn_content(bonus.handles);
        }
    }

    /// Releases every scene resource held by this chunk
    pub(crate) fn release<S: SceneSink>(&mut self, scene: &mut S) {
        if let Some(handle) = self.mesh_handle.take() {
            scene.remove_mesh(handle);
        }
        self.mesh = None;
        self.despawn_content(scene);
    }
}
