// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod errors;
pub mod telemetry;
pub mod db;
pub mod tables;
pub mod block_store;
pub mod progress;
pub mod events;
pub mod replay;
pub mod processors;
pub mod server;
