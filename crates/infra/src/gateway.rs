use std::sync::Arc;

use schoolgate_auth::{
    ApprovalRequest, ApprovalStatus, Identity, ResolvedIdentity, RouteDecision, RouteExplanation,
    RoutePolicy, TeacherProfile,
};
use schoolgate_core::{RequestId, UserId};

use crate::error::GatewayError;
use crate::resolver::IdentityResolver;
use crate::store::{AccountStore, ApprovalStore, NotificationSink, RoleStore, SessionSource};
use crate::workflow::{ApprovalWorkflow, DecisionOutcome};

/// Type-erased store handles the gateway is built from.
#[derive(Clone)]
pub struct GatewayStores {
    pub roles: Arc<dyn RoleStore>,
    pub approvals: Arc<dyn ApprovalStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub notifications: Arc<dyn NotificationSink>,
}

/// Entry point for callers: resolution, route decisions and approval decisions.
#[derive(Clone)]
pub struct AccessGateway {
    resolver: IdentityResolver,
    policy: Arc<RoutePolicy>,
    workflow: ApprovalWorkflow,
}

impl AccessGateway {
    pub fn new(stores: GatewayStores, policy: RoutePolicy) -> Self {
        Self {
            resolver: IdentityResolver::new(stores.roles.clone(), stores.approvals.clone()),
            policy: Arc::new(policy),
            workflow: ApprovalWorkflow::new(
                stores.roles,
                stores.approvals,
                stores.accounts,
                stores.notifications,
            ),
        }
    }

    pub fn policy(&self) -> &RoutePolicy {
        &self.policy
    }

    pub async fn resolve_identity(&self, session: &dyn SessionSource) -> ResolvedIdentity {
        self.resolver.resolve_current(session).await
    }

    pub async fn resolve(&self, identity: Option<&Identity>) -> ResolvedIdentity {
        self.resolver.resolve(identity).await
    }

    pub fn decide_route(&self, resolved: &ResolvedIdentity, path: &str) -> RouteDecision {
        self.policy.decide(resolved, path)
    }

    pub fn explain_route(&self, resolved: &ResolvedIdentity, path: &str) -> RouteExplanation {
        self.policy.explain(resolved, path)
    }

    pub async fn approve_teacher(&self, id: RequestId, decider: &UserId) -> Result<DecisionOutcome, GatewayError> {
        self.workflow.approve(id, decider).await
    }

    pub async fn reject_teacher(
        &self,
        id: RequestId,
        decider: &UserId,
        reason: &str,
    ) -> Result<DecisionOutcome, GatewayError> {
        self.workflow.reject(id, decider, reason).await
    }

    pub async fn retry_activation(&self, id: RequestId) -> Result<ApprovalRequest, GatewayError> {
        self.workflow.retry_activation(id).await
    }

    pub async fn list_requests(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<ApprovalRequest>, GatewayError> {
        self.workflow.list_requests(status).await
    }

    pub async fn submit_registration(
        &self,
        identity: &Identity,
        profile: TeacherProfile,
    ) -> Result<ApprovalRequest, GatewayError> {
        self.workflow.submit_registration(identity, profile).await
    }
}
