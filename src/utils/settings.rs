use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::*;
use crate::world::lod::{LodLevel, LodTable, LodTableError, default_levels};
use crate::world::placement::{BonusChances, GenerationParams};

const SETTINGS_FILE: &str = "world.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings parse: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("settings serialize: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("invalid lod table: {0}")]
    Lod(#[from] LodTableError),
}

/// Settings shared with whoever edits them at runtime. The chunk manager
/// takes a snapshot at the start of every reconcile pass.
pub type LiveSettings = Arc<RwLock<StreamSettings>>;

pub fn live(settings: StreamSettings) -> LiveSettings {
    Arc::new(RwLock::new(settings))
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StreamSettings {
    #[serde(default)]
    pub world: WorldSettings,
    #[serde(default)]
    pub streaming: StreamingSettings,
    #[serde(default)]
    pub content: ContentSettings,
    #[serde(default = "default_levels")]
    pub lod: Vec<LodLevel>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            world: WorldSettings::default(),
            streaming: StreamingSettings::default(),
            content: ContentSettings::default(),
            lod: default_levels(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WorldSettings {
    pub chunk_size: f32,
    /// Chebyshev radius, in chunks, kept loaded around the player
    pub render_distance: i32,
    pub unload_margin: i32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            render_distance: RENDER_DISTANCE,
            unload_margin: UNLOAD_MARGIN,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StreamingSettings {
    pub chunks_per_frame: usize,
    pub request_timeout_secs: f32,
    /// 0 picks one worker per spare core
    pub worker_count: usize,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            chunks_per_frame: CHUNKS_PER_FRAME,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            worker_count: ASYNC_WORKER_COUNT,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ContentSettings {
    pub pattern_cell_size: i32,
    pub pattern_spawn_chance: f64,
    pub bonus: BonusChances,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            pattern_cell_size: PATTERN_CELL_SIZE,
            pattern_spawn_chance: PATTERN_SPAWN_CHANCE,
            bonus: BonusChances::default(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn check_chance(field: &'static str, value: f64) -> Result<(), SettingsError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("{} is outside [0, 1]", value)))
    }
}

impl StreamSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        let world = &self.world;
        if !world.chunk_size.is_finite() || world.chunk_size <= 0.0 {
            return Err(invalid("world.chunk_size", "must be positive"));
        }
        if world.render_distance < 0 {
            return Err(invalid("world.render_distance", "must not be negative"));
        }
        if world.unload_margin < 0 {
            return Err(invalid("world.unload_margin", "must not be negative"));
        }
        if self.streaming.chunks_per_frame == 0 {
            return Err(invalid("streaming.chunks_per_frame", "must be at least 1"));
        }
        let timeout = self.streaming.request_timeout_secs;
        if !timeout.is_finite() || timeout <= 0.0 {
            return Err(invalid("streaming.request_timeout_secs", "must be positive"));
        }
        if self.content.pattern_cell_size < 1 {
            return Err(invalid("content.pattern_cell_size", "must be at least 1"));
        }
        check_chance("content.pattern_spawn_chance", self.content.pattern_spawn_chance)?;
        let bonus = &self.content.bonus;
        check_chance("content.bonus.powerup", bonus.powerup)?;
        check_chance("content.bonus.speedup", bonus.speedup)?;
        check_chance("content.bonus.sunrise", bonus.sunrise)?;
        check_chance("content.bonus.xray", bonus.xray)?;
        self.lod_table()?;
        Ok(())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        let settings: StreamSettings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Missing file means defaults; a broken one is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Per-user config location, e.g. `~/.config/runner-world/world.toml`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "runner-world")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            chunk_size: self.world.chunk_size,
            pattern_cell_size: self.content.pattern_cell_size,
            pattern_spawn_chance: self.content.pattern_spawn_chance,
            bonus_chances: self.content.bonus,
        }
    }

    pub fn lod_table(&self) -> Result<LodTable, LodTableError> {
        LodTable::new(self.lod.clone())
    }

    /// Resolves `worker_count = 0` against the machine
    pub fn effective_worker_count(&self) -> usize {
        match self.streaming.worker_count {
            0 => num_cpus::get().saturating_sub(1).max(1),
            n => n,
        }
    }
}
