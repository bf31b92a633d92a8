//! Quality-gated report generation over AirSaas project data.
//!
//! The workflow is an ordered ten-step state machine ([`workflow`]) over a
//! persisted, resumable session ([`session`]). Generation runs through a
//! bounded generate/evaluate loop ([`generation`]) and the whole thing is
//! tied together by the [`orchestrator`].

pub mod config;
pub mod errors;
pub mod generation;
pub mod orchestrator;
pub mod session;
pub mod smartview;
pub mod workflow;
