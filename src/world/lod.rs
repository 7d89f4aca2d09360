//! Distance to mesh-subdivision lookup

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::LOD_LEVELS;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LodLevel {
    /// Inclusive upper bound, in chunks
    pub max_distance: f32,
    pub subdivision: u32,
}

#[derive(Debug, Error, PartialEq)]
pub enum LodTableError {
    #[error("LOD table is empty")]
    Empty,
    #[error("LOD level {index} has an invalid distance {distance}")]
    InvalidDistance { index: usize, distance: f32 },
    #[error("LOD level {index} distance {distance} does not exceed the previous {previous}")]
    NonIncreasingDistance { index: usize, previous: f32, distance: f32 },
    #[error("LOD level {index} subdivision {subdivision} is finer than the previous {previous}")]
    IncreasingSubdivision { index: usize, previous: u32, subdivision: u32 },
    #[error("LOD level {index} has zero subdivision")]
    ZeroSubdivision { index: usize },
}

/// Validated, ascending-distance LOD table
#[derive(Clone, Debug, PartialEq)]
pub struct LodTable {
    levels: Vec<LodLevel>,
}

impl LodTable {
    pub fn new(levels: Vec<LodLevel>) -> Result<Self, LodTableError> {
        if levels.is_empty() {
            return Err(LodTableError::Empty);
        }
        for (index, level) in levels.iter().enumerate() {
            if !level.max_distance.is_finite() || level.max_distance < 0.0 {
                return Err(LodTableError::InvalidDistance {
                    index,
                    distance: level.max_distance,
                });
            }
            if level.subdivision == 0 {
                return Err(LodTableError::ZeroSubdivision { index });
            }
        }
        for (index, pair) in levels.windows(2).enumerate() {
            let (prev, next) = (pair[0], pair[1]);
            if next.max_distance <= prev.max_distance {
                return Err(LodTableError::NonIncreasingDistance {
                    index: index + 1,
                    previous: prev.max_distance,
                    distance: next.max_distance,
                });
            }
            if next.subdivision > prev.subdivision {
                return Err(LodTableError::IncreasingSubdivision {
                    index: index + 1,
                    previous: prev.subdivision,
                    subdivision: next.subdivision,
                });
            }
        }
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[LodLevel] {
        &self.levels
    }

    /// First level whose bound covers `distance`, else the coarsest level.
    pub fn select(&self, distance: f32) -> u32 {
        self.levels
            .iter()
            .find(|level| distance <= level.max_distance)
            .unwrap_or_else(|| self.coarsest())
            .subdivision
    }

    pub fn coarsest(&self) -> &LodLevel {
        &self.levels[self.levels.len() - 1]
    }

    pub fn finest(&self) -> &LodLevel {
        &self.levels[0]
    }
}

pub fn default_levels() -> Vec<LodLevel> {
    LOD_LEVELS
        .iter()
        .map(|&(max_distance, subdivision)| LodLevel {
            max_distance,
            subdivision,
        })
        .collect()
}

impl Default for LodTable {
    fn default() -> Self {
        Self {
            levels: default_levels(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(max_distance: f32, subdivision: u32) -> LodLevel {
        LodLevel {
            max_distance,
            subdivision,
        }
    }

    #[test]
    fn test_default_table_is_valid() {
        let table = LodTable::new(default_levels()).unwrap();
        assert_eq!(table, LodTable::default());
        assert_eq!(table.select(0.0), 32);
        assert_eq!(table.select(8.0), 32);
        assert_eq!(table.select(9.0), 16);
        assert_eq!(table.select(200.0), 1);
        assert_eq!(table.select(10_000.0), 1);
    }

    #[test]
    fn test_select_is_monotonic() {
        let table = LodTable::default();
        let mut previous = u32::MAX;
        for d in 0..400 {
            let sub = table.select(d as f32 * 0.75);
            assert!(sub <= previous);
            previous = sub;
        }
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert_eq!(LodTable::new(vec![]), Err(LodTableError::Empty));
        assert!(matches!(
            LodTable::new(vec![level(8.0, 32), level(8.0, 16)]),
            Err(LodTableError::NonIncreasingDistance { index: 1, .. })
        ));
        assert!(matches!(
            LodTable::new(vec![level(8.0, 16), level(12.0, 32)]),
            Err(LodTableError::IncreasingSubdivision { index: 1, .. })
        ));
        assert!(matches!(
            LodTable::new(vec![level(8.0, 0)]),
            Err(LodTableError::ZeroSubdivision { index: 0 })
        ));
        assert!(matches!(
            LodTable::new(vec![level(f32::NAN, 4)]),
            Err(LodTableError::InvalidDistance { index: 0, .. })
        ));
    }
}
