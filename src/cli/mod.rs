//! Terminal commands

pub mod close;
pub mod rate;
pub mod setup;
pub mod tables;
pub mod ui;
