//! # approver-daemon
//!
//! The webhook daemon around [`approver_core`]: an axum HTTP surface that
//! verifies deliveries, routes them through the approval engine or the
//! merge alerter, and fans the computed result back out to the forge.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod app;
pub mod dispatch;
pub mod effector;
pub mod merge_alerts;
pub mod telemetry;
