//! qaloop - an iterative QA loop orchestrator
//!
//! Each iteration probes the collaborators, extracts a specification from the
//! target web application, designs and executes test cases, analyzes the
//! failures, and decides whether another iteration is worth running. Stages
//! whose collaborator is unreachable fall back to collaborator-free behavior.

pub mod artifact;
pub mod collaborators;
pub mod config;
pub mod domain;
pub mod error;
pub mod health;
pub mod id;
pub mod integration;
pub mod launcher;
pub mod orchestrator;
pub mod report;
pub mod stages;
pub mod storage;

pub use error::{CollaboratorError, QaLoopError, Result};
