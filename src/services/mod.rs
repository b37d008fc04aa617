//! Scheduling services

pub mod candidates;
pub mod catalog;
pub mod geo;
pub mod opening_hours;
pub mod patcher;
pub mod plan_diff;
pub mod scheduler;
pub mod settings;
pub mod timeline;
