pub mod audit;
pub mod config;
pub mod errors;
pub mod services;
pub mod store;
pub mod telemetry;
pub mod tools;
pub mod ui;
pub mod web;
