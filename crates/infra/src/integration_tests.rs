//! End-to-end tests through the gateway facade.
//!
//! Session → Resolver → Policy, and Decision → Stores → next resolution.

use std::sync::Arc;

use chrono::Utc;

use schoolgate_auth::{
    ApprovalStatus, Email, Identity, NewApprovalRequest, ResolvedIdentity, Role, RoleRecord,
    RouteDecision, RoutePolicy, TeacherStatus,
};
use schoolgate_core::{RequestId, UserId};

use crate::error::GatewayError;
use crate::gateway::AccessGateway;
use crate::store::{InMemoryStores, StaticSession};

fn setup() -> (InMemoryStores, AccessGateway) {
    let stores = InMemoryStores::new();
    let gateway = AccessGateway::new(stores.stores(), RoutePolicy::default());
    (stores, gateway)
}

fn email(s: &str) -> Email {
    Email::parse(s).unwrap()
}

fn user(s: &str) -> UserId {
    UserId::new(s).unwrap()
}

fn session(id: &str, addr: &str) -> StaticSession {
    StaticSession::signed_in(Identity::new(user(id), email(addr)))
}

fn pending_request(stores: &InMemoryStores, id: i64, teacher_id: &str, addr: &str) {
    stores
        .approvals
        .insert(
            NewApprovalRequest {
                teacher_id: user(teacher_id),
                teacher_email: email(addr),
                fullname: Some("Teacher Person".to_string()),
                avatar_url: None,
                requested_at: Utc::now(),
            }
            .into_request(RequestId::new(id)),
        )
        .unwrap();
}

#[tokio::test]
async fn scenario_a_no_session_is_sent_to_login() {
    let (_, gateway) = setup();
    let resolved = gateway.resolve_identity(&StaticSession::anonymous()).await;

    assert_eq!(resolved, ResolvedIdentity::Unauthenticated);
    assert_eq!(
        gateway.decide_route(&resolved, "/dashboard"),
        RouteDecision::Redirect {
            target: "/login".to_string(),
            return_to: Some("/dashboard".to_string()),
        }
    );
}

#[tokio::test]
async fn scenario_b_hod_renders_dashboard() {
    let (stores, gateway) = setup();
    stores.roles.insert(Role::Hod, RoleRecord::new(email("hod@x.com"))).unwrap();

    let resolved = gateway.resolve_identity(&session("h-1", "hod@x.com")).await;
    assert_eq!(resolved.role(), Some(Role::Hod));
    assert_eq!(gateway.decide_route(&resolved, "/dashboard"), RouteDecision::Render);
}

#[tokio::test]
async fn scenario_c_pending_teacher_sees_pending_surface_everywhere() {
    let (stores, gateway) = setup();
    stores
        .roles
        .insert(
            Role::Teacher,
            RoleRecord::new(email("teacher@x.com")).with_teacher_status(TeacherStatus::Pending),
        )
        .unwrap();
    pending_request(&stores, 1, "t-1", "teacher@x.com");

    let resolved = gateway.resolve_identity(&session("t-1", "teacher@x.com")).await;
    assert_eq!(
        resolved,
        ResolvedIdentity::PendingApproval {
            status: ApprovalStatus::Pending
        }
    );
    for path in ["/dashboard", "/teacher-profile", "/complete-profile", "/chat"] {
        assert_eq!(gateway.decide_route(&resolved, path), RouteDecision::RenderPending);
    }
}

#[tokio::test]
async fn scenario_d_approval_creates_active_teacher() {
    let (stores, gateway) = setup();
    pending_request(&stores, 42, "t-1", "teacher@x.com");

    let outcome = gateway
        .approve_teacher(RequestId::new(42), &user("admin-7"))
        .await
        .unwrap();
    assert_eq!(outcome.request.status, ApprovalStatus::Approved);

    let record = stores.roles.get(Role::Teacher, &email("teacher@x.com")).unwrap();
    assert_eq!(record.teacher_status(), Some(TeacherStatus::Active));
    assert_eq!(
        record.teacher.as_ref().and_then(|t| t.approved_by.clone()),
        Some(user("admin-7"))
    );
    assert_eq!(record.fullname.as_deref(), Some("Teacher Person"));

    let resolved = gateway.resolve_identity(&session("t-1", "teacher@x.com")).await;
    assert_eq!(resolved.role(), Some(Role::Teacher));
    assert_eq!(gateway.decide_route(&resolved, "/dashboard"), RouteDecision::Render);
}

#[tokio::test]
async fn scenario_e_blank_reason_is_rejected_without_side_effects() {
    let (stores, gateway) = setup();
    pending_request(&stores, 43, "t-1", "teacher@x.com");
    stores.accounts.insert(email("teacher@x.com")).unwrap();

    let err = gateway
        .reject_teacher(RequestId::new(43), &user("hod-3"), "")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));
    assert_eq!(
        stores.approvals.snapshot(RequestId::new(43)).unwrap().status,
        ApprovalStatus::Pending
    );
    assert!(stores.accounts.contains(&email("teacher@x.com")));
    assert!(stores.notifications.sent().is_empty());
}

#[tokio::test]
async fn decided_requests_stay_decided() {
    let (stores, gateway) = setup();
    pending_request(&stores, 10, "t-1", "a@x.com");
    pending_request(&stores, 11, "t-2", "b@x.com");

    gateway.approve_teacher(RequestId::new(10), &user("admin-7")).await.unwrap();
    gateway
        .reject_teacher(RequestId::new(11), &user("hod-3"), "incomplete")
        .await
        .unwrap();

    for id in [10, 11] {
        let id = RequestId::new(id);
        let before = stores.approvals.snapshot(id).unwrap();
        assert!(matches!(
            gateway.approve_teacher(id, &user("admin-8")).await,
            Err(GatewayError::AlreadyDecided { .. })
        ));
        assert!(matches!(
            gateway.reject_teacher(id, &user("admin-8"), "again").await,
            Err(GatewayError::AlreadyDecided { .. })
        ));
        assert_eq!(stores.approvals.snapshot(id).unwrap(), before);
    }
}

#[tokio::test]
async fn rejected_teacher_loses_access_even_when_cleanup_fails() {
    let (stores, gateway) = setup();
    stores
        .roles
        .insert(
            Role::Teacher,
            RoleRecord::new(email("t@x.com")).with_teacher_status(TeacherStatus::Pending),
        )
        .unwrap();
    pending_request(&stores, 7, "t-1", "t@x.com");
    stores.accounts.fail_writes(true);
    stores.notifications.fail_writes(true);

    let outcome = gateway
        .reject_teacher(RequestId::new(7), &user("hod-3"), "not a teacher")
        .await
        .unwrap();
    assert_eq!(outcome.warnings.len(), 2);

    let resolved = gateway.resolve_identity(&session("t-1", "t@x.com")).await;
    assert_eq!(
        resolved,
        ResolvedIdentity::PendingApproval {
            status: ApprovalStatus::Rejected
        }
    );
    for path in ["/dashboard", "/teacher-profile"] {
        assert!(!gateway.decide_route(&resolved, path).is_render());
    }
}

#[tokio::test]
async fn concurrent_deciders_only_one_wins() {
    let (stores, gateway) = setup();
    pending_request(&stores, 50, "t-1", "t@x.com");
    let gateway = Arc::new(gateway);

    let approve = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.approve_teacher(RequestId::new(50), &user("admin-7")).await })
    };
    let reject = {
        let gateway = gateway.clone();
        tokio::spawn(async move {
            gateway
                .reject_teacher(RequestId::new(50), &user("hod-3"), "duplicate")
                .await
        })
    };

    let approve = approve.await.unwrap();
    let reject = reject.await.unwrap();
    assert!(approve.is_ok() ^ reject.is_ok());

    let status = stores.approvals.snapshot(RequestId::new(50)).unwrap().status;
    assert!(status.is_terminal());

    // The teacher row always matches the winning decision.
    let record = stores.roles.get(Role::Teacher, &email("t@x.com"));
    if approve.is_ok() {
        assert_eq!(status, ApprovalStatus::Approved);
        assert!(record.is_some_and(|r| r.is_active_teacher()));
    } else {
        assert_eq!(status, ApprovalStatus::Rejected);
        assert!(record.is_none());
    }
}

#[tokio::test]
async fn registration_then_approval_round_trip() {
    let (stores, gateway) = setup();
    let identity = Identity::new(user("t-5"), email("fresh@x.com"));

    let resolved = gateway.resolve(Some(&identity)).await;
    assert_eq!(resolved, ResolvedIdentity::NewUnregistered);
    assert_eq!(gateway.decide_route(&resolved, "/complete-profile"), RouteDecision::Render);

    let request = gateway
        .submit_registration(
            &identity,
            schoolgate_auth::TeacherProfile {
                fullname: "Fresh Teacher".to_string(),
                avatar_url: None,
                department: None,
                qualifications: Some("MSc".to_string()),
            },
        )
        .await
        .unwrap();

    let resolved = gateway.resolve(Some(&identity)).await;
    assert_eq!(gateway.decide_route(&resolved, "/dashboard"), RouteDecision::RenderPending);

    let queue = gateway.list_requests(Some(ApprovalStatus::Pending)).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, request.id);

    gateway.approve_teacher(request.id, &user("hod-1")).await.unwrap();
    let resolved = gateway.resolve(Some(&identity)).await;
    assert_eq!(resolved.role(), Some(Role::Teacher));
    let record = stores.roles.get(Role::Teacher, &email("fresh@x.com")).unwrap();
    assert_eq!(record.attributes["qualifications"], "MSc");
}
