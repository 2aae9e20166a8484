use crate::deployer::{self, resolve_name};
use crate::error::DeployError;
use crate::events::{EventSink, Stage, StageEvent, TracingEventSink};
use crate::group::ensure_group;
use crate::provider::{DeploymentApi, ResourceGroupApi, SessionProvider};
use crate::session::ensure_session;
use chrono::{DateTime, Utc};
use foundry_core::{DeploymentRequest, DeploymentResult, GroupRef, Identity, WhatIfReport};
use std::error::Error;
use std::sync::Arc;
use uuid::Uuid;

/// `err` followed by each of its sources, separated by `": "`.
fn error_chain(err: &(dyn Error + 'static)) -> String {
    std::iter::successors(Some(err), |&e| e.source())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

/// Source of "now" for deployment names.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A finished, successful run.
#[derive(Debug, Clone)]
pub struct DeploymentOutcome {
    pub run_id: Uuid,
    pub identity: Identity,
    pub group: GroupRef,
    pub deployment_name: String,
    pub result: DeploymentResult,
}

/// A what-if run. `preview` is `None` when the group does not exist yet.
#[derive(Debug, Clone)]
pub struct PreviewOutcome {
    pub identity: Identity,
    pub group_name: String,
    pub preview: Option<WhatIfReport>,
}

/// Runs the deploy pipeline: session, resource group, deployment.
///
/// Stages run strictly one after another and the first failure ends the run.
pub struct Orchestrator {
    session: Arc<dyn SessionProvider>,
    groups: Arc<dyn ResourceGroupApi>,
    deployments: Arc<dyn DeploymentApi>,
    events: Arc<dyn EventSink>,
    clock: Clock,
}

impl Orchestrator {
    pub fn new(
        session: Arc<dyn SessionProvider>,
        groups: Arc<dyn ResourceGroupApi>,
        deployments: Arc<dyn DeploymentApi>,
    ) -> Self {
        Self {
            session,
            groups,
            deployments,
            events: Arc::new(TracingEventSink),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Deploy `request` end-to-end.
    pub async fn run(&self, request: &DeploymentRequest) -> Result<DeploymentOutcome, DeployError> {
        let run_id = Uuid::new_v4();
        self.emit(run_id, Stage::Start, None);

        match self.run_stages(run_id, request).await {
            Ok(outcome) => {
                self.emit(run_id, Stage::Deployed, Some(outcome.deployment_name.clone()));
                Ok(outcome)
            }
            Err(err) => {
                self.emit(run_id, Stage::Failed, Some(error_chain(&err)));
                Err(err)
            }
        }
    }

    async fn run_stages(
        &self,
        run_id: Uuid,
        request: &DeploymentRequest,
    ) -> Result<DeploymentOutcome, DeployError> {
        request.validate()?;

        let ctx = ensure_session(self.session.as_ref(), request.subscription.as_deref()).await?;
        self.emit(run_id, Stage::SessionReady, Some(ctx.identity.user.clone()));

        let group = ensure_group(
            &ctx,
            self.groups.as_ref(),
            &request.resource_group,
            &request.location,
        )
        .await?;
        self.emit(run_id, Stage::GroupReady, Some(group.name.clone()));

        let deployment_name = resolve_name(request, (self.clock)())?;
        self.emit(run_id, Stage::Deploying, Some(deployment_name.clone()));

        let result = deployer::deploy(
            &ctx,
            self.deployments.as_ref(),
            &group,
            &deployment_name,
            request,
        )
        .await?;

        Ok(DeploymentOutcome {
            run_id,
            identity: ctx.identity,
            group,
            deployment_name,
            result,
        })
    }

    /// Preview `request` without changing anything, not even creating the group.
    pub async fn preview(
        &self,
        request: &DeploymentRequest,
    ) -> Result<PreviewOutcome, DeployError> {
        request.validate()?;
        let ctx = ensure_session(self.session.as_ref(), request.subscription.as_deref()).await?;

        let existing = self
            .groups
            .get(&ctx, &request.resource_group)
            .await
            .map_err(|source| DeployError::Provisioning {
                group: request.resource_group.clone(),
                source,
            })?;

        let preview = match &existing {
            Some(group) => {
                Some(deployer::preview(&ctx, self.deployments.as_ref(), group, request).await?)
            }
            None => None,
        };

        Ok(PreviewOutcome {
            identity: ctx.identity,
            group_name: request.resource_group.clone(),
            preview,
        })
    }

    fn emit(&self, run_id: Uuid, stage: Stage, detail: Option<String>) {
        self.events.record(StageEvent {
            run_id,
            stage,
            occurred_at: Utc::now(),
            detail,
        });
    }
}
