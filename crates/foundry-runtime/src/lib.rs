//! # foundry-runtime
//!
//! The deploy path of foundry-deploy:
//!
//! | Stage | Module | Failure |
//! |-------|--------|---------|
//! | Cloud session | [`session`] | [`DeployError::Authentication`] |
//! | Resource group | [`group`] | [`DeployError::Provisioning`] |
//! | Template deployment | [`deployer`] | [`DeployError::Deployment`] |
//! | Output report | [`report`] | never fails on missing outputs |
//!
//! [`Orchestrator`] chains the stages, emitting a [`StageEvent`] for each
//! transition. Provider access goes through the ports in [`provider`].
//!
//! The permission path ([`diagnostics`]) is separate: it resolves the same
//! session, audits role assignments, and only grants a role when asked to
//! and when the audit shows it missing.

pub mod deployer;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod group;
pub mod orchestrator;
pub mod provider;
pub mod report;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use diagnostics::{DiagnosticError, GrantOutcome, PermissionDiagnostics, ScopeTarget};
pub use error::DeployError;
pub use events::{EventSink, Stage, StageEvent, TracingEventSink};
pub use orchestrator::{Clock, DeploymentOutcome, Orchestrator, PreviewOutcome};
pub use provider::{DeploymentApi, ResourceGroupApi, SessionProvider};
