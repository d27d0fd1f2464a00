//! Play chess by voice: spoken phrases become SAN moves, each one is
//! confirmed out loud before it is played, and a UCI engine answers.

pub mod command;
pub mod config;
pub mod confirm;
pub mod dialogue;
pub mod engine;
pub mod game;
pub mod interpret;
pub mod normalize;
pub mod speech;
pub mod ui;
