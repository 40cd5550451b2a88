use schoolgate_auth::Identity;
use schoolgate_infra::{SessionSource, StoreError};

/// Session context for a request: the principal from a verified bearer token,
/// or none.
///
/// Inserted by the session middleware on every request it wraps; it also acts
/// as the per-request `SessionSource` the resolver consumes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionContext {
    identity: Option<Identity>,
}

impl SessionContext {
    pub fn new(identity: Option<Identity>) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }
}

#[async_trait::async_trait]
impl SessionSource for SessionContext {
    async fn current_identity(&self) -> Result<Option<Identity>, StoreError> {
        Ok(self.identity.clone())
    }
}
