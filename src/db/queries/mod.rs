//! Database queries

pub mod catalog;
pub mod timeline;
pub mod trip;
