pub mod attack;
pub mod board;
pub mod brain;
pub mod clock;
pub mod config;
pub mod game;
pub mod monster;
pub mod pillow;
pub mod player;
pub mod scheduler;
pub mod server;
