//! Read API over the snapshot cache and store, plus run status and OpenAPI docs.

pub mod config;
pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
