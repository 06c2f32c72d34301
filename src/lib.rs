//! Box availability, booking and conflict tracking on top of the scheduling API.

pub mod availability;
pub mod client;
pub mod clock;
pub mod commands;
pub mod config;
pub mod conflicts;
pub mod error;
pub mod interval;
pub mod models;
pub mod push;
pub mod settings;
pub mod slots;
pub mod stats;
pub mod view;
pub mod web;
pub mod wizard;
