use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use thiserror::Error;

use crate::core::content::CoinId;
use crate::core::run_state::RunState;

const MAGIC_HEADER: &[u8; 4] = b"RWSS";
const VERSION: u32 = 1;
const HEADER_LEN: u64 = 16;

pub const SESSION_FILE_EXTENSION: &str = "rws";
pub const DEFAULT_SESSION_FILE: &str = "session.rws";

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("session io: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a session file")]
    BadMagic,
    #[error("unsupported session version {0}")]
    UnsupportedVersion(u32),
    #[error("session encoding: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("session declares {declared} bytes but only {available} follow the header")]
    Truncated { declared: u64, available: u64 },
}

/// Everything needed to resume a run: the world seed, where the player
/// stood, and which coins are already gone.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SavedSession {
    pub seed: u32,
    pub player: [f32; 3],
    pub collected: Vec<CoinId>,
    pub chunks_traversed: u64,
    pub coins_collected: u32,
}

impl SavedSession {
    pub fn capture<'a, I>(seed: u32, player: [f32; 3], collected: I, run: &RunState) -> Self
    where
        I: IntoIterator<Item = &'a CoinId>,
    {
        let mut collected: Vec<CoinId> = collected.into_iter().copied().collect();
        // stable files for identical sessions
        collected.sort_by_key(|id| (id.x, id.z, id.lift));
        SavedSession {
            seed,
            player,
            collected,
            chunks_traversed: run.chunks_traversed(),
            coins_collected: run.coins_collected(),
        }
    }
}

pub fn save_session<P: AsRef<Path>>(path: P, session: &SavedSession) -> Result<(), SaveError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(MAGIC_HEADER)?;
    writer.write_all(&VERSION.to_le_bytes())?;

    let data = bincode::serialize(session)?;
    writer.write_all(&(data.len() as u64).to_le_bytes())?;
    writer.write_all(&data)?;
    writer.flush()?;
    Ok(())
}

pub fn load_session<P: AsRef<Path>>(path: P) -> Result<SavedSession, SaveError> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC_HEADER {
        return Err(SaveError::BadMagic);
    }

    let mut version_bytes = [0u8; 4];
    reader.read_exact(&mut version_bytes)?;
    let version = u32::from_le_bytes(version_bytes);
    if version != VERSION {
        return Err(SaveError::UnsupportedVersion(version));
    }

    let mut size_bytes = [0u8; 8];
    reader.read_exact(&mut size_bytes)?;
    let declared = u64::from_le_bytes(size_bytes);
    let available = file_len.saturating_sub(HEADER_LEN);
    if declared > available {
        return Err(SaveError::Truncated { declared, available });
    }

    let mut data = vec![0u8; declared as usize];
    reader.read_exact(&mut data)?;
    Ok(bincode::deserialize(&data)?)
}
