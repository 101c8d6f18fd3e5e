//! HTTP API for the conversational stock channel.

pub mod app;
