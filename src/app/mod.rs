//! Headless driver: runs a simulated player through the streamed world

mod game;

pub use game::{AppError, run};
