use crate::core::coord::ChunkCoord;

/// Traversal state owned by one run of the game.
///
/// Holds the chunk the player was last ticked in, so the chunk-changed edge
/// trigger cannot leak between runs or manager instances.
#[derive(Debug, Default, Clone)]
pub struct RunState {
    last_ticked_chunk: Option<ChunkCoord>,
    chunks_traversed: u64,
    coins_collected: u32,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues counters from a saved session
    pub fn resumed(chunks_traversed: u64, coins_collected: u32) -> Self {
        Self {
            last_ticked_chunk: None,
            chunks_traversed,
            coins_collected,
        }
    }

    /// Records the player's current chunk. Returns true when it differs from
    /// the last recorded one (including the first call of a run).
    pub fn enter_chunk(&mut self, coord: ChunkCoord) -> bool {
        if self.last_ticked_chunk == Some(coord) {
            return false;
        }
        if self.last_ticked_chunk.is_some() {
            self.chunks_traversed += 1;
        }
        self.last_ticked_chunk = Some(coord);
        true
    }

    /// Forces the next `enter_chunk` to report a change
    pub fn invalidate(&mut self) {
        self.last_ticked_chunk = None;
    }

    pub fn last_ticked_chunk(&self) -> Option<ChunkCoord> {
        self.last_ticked_chunk
    }

    pub fn chunks_traversed(&self) -> u64 {
        self.chunks_traversed
    }

    pub fn record_coin(&mut self) {
        self.coins_collected += 1;
    }

    pub fn coins_collected(&self) -> u32 {
        self.coins_collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_chunk_is_edge_triggered() {
        let mut run = RunState::new();
        assert!(run.enter_chunk(ChunkCoord::new(0, 0)));
        assert!(!run.enter_chunk(ChunkCoord::new(0, 0)));
        assert!(run.enter_chunk(ChunkCoord::new(1, 0)));
        assert_eq!(run.chunks_traversed(), 1);
        assert_eq!(run.last_ticked_chunk(), Some(ChunkCoord::new(1, 0)));
    }

    #[test]
    fn test_separate_runs_do_not_share_state() {
        let mut first = RunState::new();
        first.enter_chunk(ChunkCoord::new(4, 4));
        let mut second = RunState::new();
        assert!(second.enter_chunk(ChunkCoord::new(4, 4)));
    }

    #[test]
    fn test_invalidate_retriggers() {
        let mut run = RunState::new();
        run.enter_chunk(ChunkCoord::new(2, 2));
        run.invalidate();
        assert!(run.enter_chunk(ChunkCoord::new(2, 2)));
    }
}
