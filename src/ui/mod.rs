//! Terminal presentation shared by the CLI commands.

pub mod icons;
pub mod progress;

pub use progress::{finish_spinner, spinner};
