//! Multi-coin arrangements placed once per pattern cell.

use std::f32::consts::TAU;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("failed to read pattern file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse pattern file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("pattern `{0}` has no offsets")]
    EmptyTemplate(String),
}

/// Offset of one coin relative to the pattern origin.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternOffset {
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    pub z: f32,
}

impl PatternOffset {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternTemplate {
    pub name: String,
    pub offsets: Vec<PatternOffset>,
}

impl PatternTemplate {
    pub fn new(name: impl Into<String>, offsets: Vec<PatternOffset>) -> Self {
        Self {
            name: name.into(),
            offsets,
        }
    }
}

#[derive(Deserialize)]
struct PatternFile {
    #[serde(rename = "pattern", default)]
    patterns: Vec<PatternTemplate>,
}

/// Read-only template set shared by every generation worker.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternLibrary {
    templates: Arc<[PatternTemplate]>,
}

impl PatternLibrary {
    pub fn new(templates: Vec<PatternTemplate>) -> Result<Self, PatternError> {
        if let Some(empty) = templates.iter().find(|t| t.offsets.is_empty()) {
            return Err(PatternError::EmptyTemplate(empty.name.clone()));
        }
        Ok(Self {
            templates: templates.into(),
        })
    }

    pub fn empty() -> Self {
        Self {
            templates: Arc::from(Vec::new()),
        }
    }

    /// Parses `[[pattern]]` tables with `name` and `offsets = [{ x, y, z }]`.
    pub fn from_toml_str(source: &str) -> Result<Self, PatternError> {
        let file: PatternFile = toml::from_str(source)?;
        Self::new(file.patterns)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PatternError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn builtin() -> Self {
        Self {
            templates: builtin_templates().into(),
        }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PatternTemplate> {
        self.templates.get(index)
    }

    pub fn templates(&self) -> &[PatternTemplate] {
        &self.templates
    }

    /// Farthest horizontal reach of any coin from its template origin
    pub fn max_radius(&self) -> f32 {
        self.templates
            .iter()
            .flat_map(|t| t.offsets.iter())
            .map(|o| (o.x * o.x + o.z * o.z).sqrt())
            .fold(0.0, f32::max)
    }
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

const COIN_SPACING: f32 = 15.0;

fn builtin_templates() -> Vec<PatternTemplate> {
    let line = (0..7)
        .map(|i| PatternOffset::new((i as f32 - 3.0) * COIN_SPACING, 0.0, 0.0))
        .collect();

    // Jump arc: coins rise and fall along X
    let arc = (0..9)
        .map(|i| {
            let t = i as f32 / 8.0;
            let lift = 4.0 * t * (1.0 - t) * 30.0;
            PatternOffset::new((i as f32 - 4.0) * COIN_SPACING, lift, 0.0)
        })
        .collect();

    let ring = (0..10)
        .map(|i| {
            let angle = i as f32 / 10.0 * TAU;
            PatternOffset::new(angle.cos() * 40.0, 0.0, angle.sin() * 40.0)
        })
        .collect();

    let zigzag = (0..8)
        .map(|i| {
            let side = if i % 2 == 0 { -1.0 } else { 1.0 };
            PatternOffset::new((i as f32 - 3.5) * COIN_SPACING, 0.0, side * 12.0)
        })
        .collect();

    let mut cross = vec![PatternOffset::new(0.0, 0.0, 0.0)];
    for step in 1..=3 {
        let d = step as f32 * COIN_SPACING;
        cross.push(PatternOffset::new(d, 0.0, 0.0));
        cross.push(PatternOffset::new(-d, 0.0, 0.0));
        cross.push(PatternOffset::new(0.0, 0.0, d));
        cross.push(PatternOffset::new(0.0, 0.0, -d));
    }

    vec![
        PatternTemplate::new("line", line),
        PatternTemplate::new("arc", arc),
        PatternTemplate::new("ring", ring),
        PatternTemplate::new("zigzag", zigzag),
        PatternTemplate::new("cross", cross),
    ]
}
