//! # approver-core
//!
//! Core library for the team approver: a stateless policy engine that
//! decides, per pull-request event, whether the teams named by a
//! repository's review policy have approved the change.
//!
//! The crate is organised around the flow of a single event:
//!
//! - [`webhook`]: signature verification and the decoded event model.
//! - [`configuration`]: the per-repository YAML policy.
//! - [`forge`]: the client contract against the hosting service, plus the
//!   GitHub implementation.
//! - [`approval`]: the engine that matches rules, filters reviewers and
//!   produces the final [`approval::EvaluationResult`].
//! - [`alerts`]: merge-event alert selection and message rendering.
//! - [`secrets`]: how secret material (webhook tokens, private keys) is
//!   read at startup.
//!
//! No state survives an event; everything the engine produces is fully
//! determined by the policy and the forge's view of the pull request.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod alerts;
pub mod approval;
pub mod configuration;
pub mod forge;
pub mod github;
pub mod secrets;
pub mod webhook;

pub use approval::{Approval, EvaluationResult, PullRequest, Status};
pub use configuration::Configuration;
pub use forge::{ForgeClient, ForgeError};
