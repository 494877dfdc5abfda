//! In-memory fakes for the external collaborators of the session bridge.

use sso_bridge::{SsoError, TenantDirectory, TenantSecurityConfig, UserRecord, UserStore};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// An enabled, not-logged-out user record.
#[must_use]
pub fn enabled_user(login_id: &str, tenant_id: &str) -> UserRecord {
    UserRecord {
        login_id: login_id.to_string(),
        tenant_id: tenant_id.to_string(),
        enabled: true,
        has_logged_out: true,
    }
}

/// In-memory [`UserStore`] with switchable failure modes.
///
/// `fail_persist` makes `persist` return an error; `veto_logout` makes the
/// logout check reject every user. Persisted records are captured for
/// assertions.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<String, UserRecord>>,
    persisted: Mutex<Vec<UserRecord>>,
    fail_persist: AtomicBool,
    veto_logout: AtomicBool,
    fail_lookup: AtomicBool,
}

impl InMemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(self, record: UserRecord) -> Self {
        self.users
            .lock()
            .expect("user map lock")
            .insert(record.login_id.clone(), record);
        self
    }

    pub fn set_fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    pub fn set_veto_logout(&self, veto: bool) {
        self.veto_logout.store(veto, Ordering::SeqCst);
    }

    pub fn set_fail_lookup(&self, fail: bool) {
        self.fail_lookup.store(fail, Ordering::SeqCst);
    }

    /// Records handed to `persist`, in call order.
    #[must_use]
    pub fn persisted(&self) -> Vec<UserRecord> {
        self.persisted.lock().expect("persist log lock").clone()
    }
}

impl UserStore for InMemoryUserStore {
    fn find_user(
        &self,
        login_id: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, SsoError>> + Send {
        let result = if self.fail_lookup.load(Ordering::SeqCst) {
            Err(SsoError::UserStore("simulated lookup failure".to_string()))
        } else {
            Ok(self
                .users
                .lock()
                .expect("user map lock")
                .get(login_id)
                .cloned())
        };
        async move { result }
    }

    fn persist(
        &self,
        record: &UserRecord,
    ) -> impl Future<Output = Result<(), SsoError>> + Send {
        let result = if self.fail_persist.load(Ordering::SeqCst) {
            Err(SsoError::UserStore("simulated persist failure".to_string()))
        } else {
            self.persisted
                .lock()
                .expect("persist log lock")
                .push(record.clone());
            self.users
                .lock()
                .expect("user map lock")
                .insert(record.login_id.clone(), record.clone());
            Ok(())
        };
        async move { result }
    }

    fn logout_check(
        &self,
        record: &UserRecord,
    ) -> impl Future<Output = Result<Option<UserRecord>, SsoError>> + Send {
        let result = if self.veto_logout.load(Ordering::SeqCst) {
            Ok(None)
        } else {
            Ok(Some(record.clone()))
        };
        async move { result }
    }
}

/// Fixed tenant-to-configuration mapping with a switchable lookup failure.
#[derive(Default)]
pub struct StaticTenantDirectory {
    configs: HashMap<String, TenantSecurityConfig>,
    fail_lookup: AtomicBool,
}

impl StaticTenantDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant_id: &str, config: TenantSecurityConfig) -> Self {
        self.configs.insert(tenant_id.to_string(), config);
        self
    }

    pub fn set_fail_lookup(&self, fail: bool) {
        self.fail_lookup.store(fail, Ordering::SeqCst);
    }
}

impl TenantDirectory for StaticTenantDirectory {
    fn security_config(
        &self,
        tenant_id: &str,
    ) -> impl Future<Output = Result<Option<TenantSecurityConfig>, SsoError>> + Send {
        let result = if self.fail_lookup.load(Ordering::SeqCst) {
            Err(SsoError::Configuration(
                "simulated tenant lookup failure".to_string(),
            ))
        } else {
            Ok(self.configs.get(tenant_id).cloned())
        };
        async move { result }
    }
}
