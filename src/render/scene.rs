//! Boundary to the renderer.
//!
//! The lifecycle manager never touches GPU state directly; it hands meshes and
//! content visuals to a [`SceneSink`] and keeps the returned handles so it can
//! release them on rebuild or unload.

use glam::Vec3;
use rustc_hash::FxHashMap;

use crate::core::content::ContentKind;
use crate::core::coord::ChunkCoord;
use crate::render::mesh::ChunkMesh;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneHandle(pub u64);

/// Visual plus ground shadow of one content entity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentHandles {
    pub visual: SceneHandle,
    pub shadow: SceneHandle,
}

pub trait SceneSink {
    fn add_mesh(&mut self, coord: ChunkCoord, mesh: &ChunkMesh) -> SceneHandle;

    fn remove_mesh(&mut self, handle: SceneHandle);

    /// `ground_y` anchors the shadow under the hovering visual
    fn spawn_content(&mut self, kind: ContentKind, position: Vec3, ground_y: f32) -> ContentHandles;

    fn despawn_content(&mut self, handles: ContentHandles);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SceneObject {
    Mesh { coord: ChunkCoord, subdivision: u32 },
    Content { kind: ContentKind, position: Vec3 },
    Shadow { position: Vec3 },
}

/// Scene that only records what is alive
#[derive(Default)]
pub struct HeadlessScene {
    next_handle: u64,
    objects: FxHashMap<SceneHandle, SceneObject>,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, object: SceneObject) -> SceneHandle {
        self.next_handle += 1;
        let handle = SceneHandle(self.next_handle);
        self.objects.insert(handle, object);
        handle
    }

    fn remove(&mut self, handle: SceneHandle) {
        if self.objects.remove(&handle).is_none() {
            tracing::warn!("Released unknown scene handle {:?}", handle);
        }
    }

    pub fn get(&self, handle: SceneHandle) -> Option<&SceneObject> {
        self.objects.get(&handle)
    }

    pub fn mesh_count(&self) -> usize {
        self.objects
            .values()
            .filter(|o| matches!(o, SceneObject::Mesh { .. }))
            .count()
    }

    pub fn content_count(&self) -> usize {
        self.objects
            .values()
            .filter(|o| matches!(o, SceneObject::Content { .. }))
            .count()
    }

    pub fn shadow_count(&self) -> usize {
        self.objects
            .values()
            .filter(|o| matches!(o, SceneObject::Shadow { .. }))
            .count()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl SceneSink for HeadlessScene {
    fn add_mesh(&mut self, coord: ChunkCoord, mesh: &ChunkMesh) -> SceneHandle {
        self.insert(SceneObject::Mesh {
            coord,
            subdivision: mesh.subdivision(),
        })
    }

    fn remove_mesh(&mut self, handle: SceneHandle) {
        self.remove(handle);
    }

    fn spawn_content(&mut self, kind: ContentKind, position: Vec3, ground_y: f32) -> ContentHandles {
        let visual = self.insert(SceneObject::Content { kind, position });
        let shadow = self.insert(SceneObject::Shadow {
            position: Vec3::new(position.x, ground_y, position.z),
        });
        ContentHandles { visual, shadow }
    }

    fn despawn_content(&mut self, handles: ContentHandles) {
        self.remove(handles.visual);
        self.remove(handles.shadow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_spawns_visual_and_shadow() {
        let mut scene = HeadlessScene::new();
        let handles = scene.spawn_content(ContentKind::Coin, Vec3::new(1.0, 20.0, 2.0), 5.0);
        assert_ne!(handles.visual, handles.shadow);
        assert_eq!(scene.content_count(), 1);
        assert_eq!(
            scene.get(handles.shadow),
            Some(&SceneObject::Shadow {
                position: Vec3::new(1.0, 5.0, 2.0)
            })
        );
        scene.despawn_content(handles);
        assert!(scene.is_empty());
    }
}
