//! Infrastructure layer: event store, dispatch pipeline, read models,
//! projections and the application services built on them.

pub mod access;
pub mod classification;
pub mod command_dispatcher;
pub mod event_fanout;
pub mod event_store;
pub mod notifications;
pub mod projections;
pub mod read_model;
pub mod tokens;
pub mod workflow;

#[cfg(test)]
mod integration_tests;
