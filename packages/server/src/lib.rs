// Douyin Comment Harvester - API Core
//
// This crate provides the backend API for ingesting video comments from a
// self-hosted Douyin scraper, persisting them in Postgres, and tracking
// the long-running ingestion tasks that do the work.

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
