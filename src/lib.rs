pub mod capacity;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod nps;
pub mod report;
