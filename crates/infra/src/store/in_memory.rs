//! In-memory stores for tests/dev.
//!
//! Each store carries fault switches so callers can exercise the
//! must-succeed / best-effort failure paths without a real backend.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use schoolgate_auth::{
    ApprovalDecision, ApprovalRequest, ApprovalStatus, Email, Identity, NewApprovalRequest,
    RoleRecord, Role,
};
use schoolgate_core::RequestId;

use super::{
    AccountStore, ApprovalStore, Notification, NotificationSink, RoleStore, SessionSource,
    StoreError,
};
use crate::gateway::GatewayStores;

fn poisoned() -> StoreError {
    StoreError::Storage("lock poisoned".to_string())
}

/// Read/write fault switches shared by the in-memory stores.
#[derive(Debug, Default)]
struct Faults {
    reads: AtomicBool,
    writes: AtomicBool,
}

impl Faults {
    fn check_read(&self, store: &str) -> Result<(), StoreError> {
        if self.reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{store}: injected read fault")));
        }
        Ok(())
    }

    fn check_write(&self, store: &str) -> Result<(), StoreError> {
        if self.writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{store}: injected write fault")));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Session source with a fixed principal (or a fixed failure).
#[derive(Debug, Clone)]
pub struct StaticSession {
    identity: Option<Identity>,
    unavailable: bool,
}

impl StaticSession {
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            unavailable: false,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            identity: None,
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            identity: None,
            unavailable: true,
        }
    }
}

#[async_trait::async_trait]
impl SessionSource for StaticSession {
    async fn current_identity(&self) -> Result<Option<Identity>, StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("session source unreachable".to_string()));
        }
        Ok(self.identity.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Role tables
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    tables: RwLock<HashMap<Role, HashMap<Email, RoleRecord>>>,
    faults: Faults,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly (registration flows live outside the gateway).
    pub fn insert(&self, role: Role, record: RoleRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        tables.entry(role).or_default().insert(record.email.clone(), record);
        Ok(())
    }

    pub fn get(&self, role: Role, email: &Email) -> Option<RoleRecord> {
        let tables = self.tables.read().ok()?;
        tables.get(&role)?.get(email).cloned()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.faults.reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.faults.writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn find_role_record(&self, role: Role, email: &Email) -> Result<Option<RoleRecord>, StoreError> {
        self.faults.check_read("role store")?;
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables.get(&role).and_then(|t| t.get(email)).cloned())
    }

    async fn upsert_role_record(&self, role: Role, record: RoleRecord) -> Result<(), StoreError> {
        self.faults.check_write("role store")?;
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        tables.entry(role).or_default().insert(record.email.clone(), record);
        Ok(())
    }

    async fn delete_role_record(&self, role: Role, email: &Email) -> Result<bool, StoreError> {
        self.faults.check_write("role store")?;
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        Ok(tables.get_mut(&role).and_then(|t| t.remove(email)).is_some())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Approval requests
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct InMemoryApprovalStore {
    requests: RwLock<BTreeMap<RequestId, ApprovalRequest>>,
    next_id: AtomicI64,
    faults: Faults,
}

impl Default for InMemoryApprovalStore {
    fn default() -> Self {
        Self {
            requests: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            faults: Faults::default(),
        }
    }
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a request with a fixed id.
    pub fn insert(&self, request: ApprovalRequest) -> Result<(), StoreError> {
        let mut requests = self.requests.write().map_err(|_| poisoned())?;
        self.next_id.fetch_max(request.id.value() + 1, Ordering::SeqCst);
        requests.insert(request.id, request);
        Ok(())
    }

    pub fn snapshot(&self, id: RequestId) -> Option<ApprovalRequest> {
        self.requests.read().ok()?.get(&id).cloned()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.faults.reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.faults.writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn find_by_email(&self, email: &Email) -> Result<Option<ApprovalRequest>, StoreError> {
        self.faults.check_read("approval store")?;
        let requests = self.requests.read().map_err(|_| poisoned())?;
        Ok(requests
            .values()
            .filter(|r| &r.teacher_email == email)
            .max_by_key(|r| (r.requested_at, r.id))
            .cloned())
    }

    async fn get(&self, id: RequestId) -> Result<Option<ApprovalRequest>, StoreError> {
        self.faults.check_read("approval store")?;
        let requests = self.requests.read().map_err(|_| poisoned())?;
        Ok(requests.get(&id).cloned())
    }

    async fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<ApprovalRequest>, StoreError> {
        self.faults.check_read("approval store")?;
        let requests = self.requests.read().map_err(|_| poisoned())?;
        let mut listed: Vec<ApprovalRequest> = requests
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        listed.sort_by(|a, b| (b.requested_at, b.id).cmp(&(a.requested_at, a.id)));
        Ok(listed)
    }

    async fn create(&self, request: NewApprovalRequest) -> Result<ApprovalRequest, StoreError> {
        self.faults.check_write("approval store")?;
        // Checked under the write lock, like the partial unique index in Postgres.
        let mut requests = self.requests.write().map_err(|_| poisoned())?;
        if let Some(open) = requests
            .values()
            .find(|r| r.is_pending() && r.teacher_email == request.teacher_email)
        {
            return Err(StoreError::Conflict(format!(
                "{} already has pending approval request {}",
                request.teacher_email, open.id
            )));
        }
        let id = RequestId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let created = request.into_request(id);
        requests.insert(id, created.clone());
        Ok(created)
    }

    async fn record_decision(&self, decision: &ApprovalDecision) -> Result<ApprovalRequest, StoreError> {
        self.faults.check_write("approval store")?;
        // Check and write under one lock: concurrent deciders serialize here.
        let mut requests = self.requests.write().map_err(|_| poisoned())?;
        let request = requests
            .get_mut(&decision.request_id)
            .ok_or(StoreError::NotFound)?;
        if request.status != ApprovalStatus::Pending {
            return Err(StoreError::NotPending(request.status));
        }
        request.apply(decision);
        Ok(request.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Accounts & notifications
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashSet<Email>>,
    faults: Faults,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, email: Email) -> Result<(), StoreError> {
        self.accounts.write().map_err(|_| poisoned())?.insert(email);
        Ok(())
    }

    pub fn contains(&self, email: &Email) -> bool {
        self.accounts
            .read()
            .map(|accounts| accounts.contains(email))
            .unwrap_or(false)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.faults.writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn delete_account(&self, email: &Email) -> Result<bool, StoreError> {
        self.faults.check_write("account store")?;
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        Ok(accounts.remove(email))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryNotificationSink {
    sent: Mutex<Vec<Notification>>,
    faults: Faults,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.faults.writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn enqueue(&self, notification: Notification) -> Result<(), StoreError> {
        self.faults.check_write("notification sink")?;
        self.sent.lock().map_err(|_| poisoned())?.push(notification);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bundle
// ─────────────────────────────────────────────────────────────────────────────

/// Concrete in-memory stores, kept around so tests can seed and inspect them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStores {
    pub roles: Arc<InMemoryRoleStore>,
    pub approvals: Arc<InMemoryApprovalStore>,
    pub accounts: Arc<InMemoryAccountStore>,
    pub notifications: Arc<InMemoryNotificationSink>,
}

impl InMemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Type-erased handles for the gateway.
    pub fn stores(&self) -> GatewayStores {
        GatewayStores {
            roles: self.roles.clone(),
            approvals: self.approvals.clone(),
            accounts: self.accounts.clone(),
            notifications: self.notifications.clone(),
        }
    }
}
