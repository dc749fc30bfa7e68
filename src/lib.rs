pub mod analysis;
pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod extractors;
pub mod meals;
pub mod nutrition;
pub mod state;
pub mod storage;

#[cfg(test)]
mod testing;
