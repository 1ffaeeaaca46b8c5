pub mod app_config;
pub mod chain;
pub mod db;
pub mod error;
pub mod middleware;
pub mod orm;
pub mod polls;
pub mod session;
pub mod stats;
pub mod store;
pub mod user;
pub mod web;
