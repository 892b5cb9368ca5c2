//! Windy service: keeps the latest GFS wind field rendered and serves it
//! over HTTP.

pub mod artifact;
pub mod config;
pub mod server;
pub mod updater;

pub use artifact::{EncodedImage, ImageFormat, WindArtifact};
pub use config::{Args, Limit};
pub use server::{router, AppState};
pub use updater::{Updater, UPDATE_INTERVAL};
