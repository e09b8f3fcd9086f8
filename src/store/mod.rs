//! Embedded SQLite persistence for gardens, plant beds, plants, logbook
//! entries, tasks and users.

pub mod db;
pub mod letter_code;
pub mod models;

pub use db::{DbHandle, TuinDb};
pub use letter_code::next_letter_code;
