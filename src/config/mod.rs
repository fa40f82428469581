//! Configuration loaded from `credvault.toml`.

mod settings;

pub use settings::Settings;
