pub mod game;
pub mod roster;
pub mod stats;
