//! Infrastructure layer: stores, identity resolution, the approval workflow
//! and the gateway facade that ties them together.

pub mod error;
pub mod gateway;
pub mod resolver;
pub mod store;
pub mod workflow;

#[cfg(test)]
mod integration_tests;

pub use error::GatewayError;
pub use gateway::{AccessGateway, GatewayStores};
pub use resolver::{IdentityResolver, PROBE_ORDER};
pub use store::{
    AccountStore, ApprovalStore, InMemoryStores, Notification, NotificationKind, NotificationSink,
    RoleStore, SessionSource, StaticSession, StoreError,
};
pub use workflow::{ApprovalWorkflow, CleanupStep, CleanupWarning, DecisionOutcome};
