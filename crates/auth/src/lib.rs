//! `schoolgate-auth`: pure identity/authorization boundary for the school portal.
//!
//! No HTTP or storage here. The crate holds the principal (`Identity`), the
//! stored rows (`RoleRecord`, `ApprovalRequest`), the resolver's verdict
//! (`ResolvedIdentity`) and the navigation rules (`RoutePolicy`).

pub mod approval;
pub mod claims;
pub mod identity;
pub mod policy;
pub mod record;
pub mod resolved;
pub mod roles;

pub use approval::{
    ApprovalCommand, ApprovalDecision, ApprovalRequest, ApprovalStatus, ApprovalTransitionError,
    NewApprovalRequest,
};
pub use claims::{ClaimsError, SessionClaims, validate_claims};
pub use identity::{Email, Identity};
pub use policy::{RouteDecision, RouteExplanation, RoutePolicy, home_path_for};
pub use record::{RoleRecord, TeacherProfile, TeacherStanding, TeacherStatus};
pub use resolved::ResolvedIdentity;
pub use roles::Role;
