pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod controller;
pub mod dom;
pub mod format;
pub mod model;
pub mod output;
pub mod render;
pub mod select;
pub mod summary;
pub mod utils;

#[cfg(test)]
mod tests;
