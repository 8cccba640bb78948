pub mod engine;
pub mod model;
pub mod registry;

pub use engine::{Departure, Lobby};
pub use model::{GameState, SettingsPatch};
