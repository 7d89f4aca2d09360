pub mod settings;

pub use settings::{LiveSettings, SettingsError, StreamSettings, live};
