//! Account lifecycle: list, fetch and delete linked external accounts.
//!
//! Accounts are created by the platform during a linking flow; the gateway
//! never creates them. Reads are scoped to the calling tenant. The one
//! cross-tenant operation is the cascade delete for an app, which fans out
//! independent deletes and reports every individual outcome.

use crate::error::{ErrorKind, GatewayError, Result};
use crate::identity::TenantId;
use crate::model::{AccountFilter, ExternalAccount};
use crate::platform::{paginate, ConnectPlatform};
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;


/// One account the cascade could not delete.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FailedDeletion {
    pub id: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Aggregate result of deleting every account bound to an app.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CascadeOutcome {
    pub app_id: String,
    pub total: usize,
    pub deleted: Vec<String>,
    pub failed: Vec<FailedDeletion>,
}

impl CascadeOutcome {
    /// True when at least one delete failed.
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }

    /// The outcome as a `PartialFailure` error, if anything failed.
    pub fn failure(&self) -> Option<GatewayError> {
        self.is_partial().then(|| GatewayError::PartialFailure {
            failed: self.failed.len(),
            total: self.total,
        })
    }
}

/// Account Lifecycle Manager.
pub struct AccountManager {
    platform: Arc<dyn ConnectPlatform>,
    request_timeout: Duration,
    max_concurrency: usize,
}

impl AccountManager {
    /// # Arguments
    /// * `request_timeout` - Bound on each single delete, cascade included
    /// * `max_concurrency` - Deletes in flight at once during a cascade
    pub fn new(
        platform: Arc<dyn ConnectPlatform>,
        request_timeout: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            platform,
            request_timeout,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// List every account matching `filter`, following pagination to the end.
    ///
    /// Credentials are omitted entirely unless `filter.include_credentials`.
    pub async fn list_accounts(&self, filter: &AccountFilter) -> Result<Vec<ExternalAccount>> {
        let include_credentials = filter.include_credentials;
        let platform = Arc::clone(&self.platform);
        let query = filter.clone();

        let accounts: Vec<ExternalAccount> = paginate(move |cursor| {
            let platform = Arc::clone(&platform);
            let query = query.clone();
            async move { platform.list_accounts(&query, cursor.as_deref()).await }
        })
        .try_collect()
        .await?;

        debug!(count = accounts.len(), app = ?filter.app, "Listed accounts");

        Ok(accounts
            .into_iter()
            .map(|a| a.normalized(include_credentials))
            .collect())
    }

    /// Fetch one account owned by `tenant`.
    ///
    /// Accounts owned by another tenant are reported as `NotFound`.
    pub async fn get_account(
        &self,
        tenant: &TenantId,
        account_id: &str,
        include_credentials: bool,
    ) -> Result<ExternalAccount> {
        let account_id = require_id(account_id)?;
        let account = self
            .platform
            .get_account(account_id, include_credentials)
            .await?;

        if account.tenant != tenant.as_str() {
            warn!(
                tenant = %tenant,
                account_id = %account_id,
                "Account requested outside caller's scope"
            );
            return Err(not_found(account_id));
        }

        Ok(account.normalized(include_credentials))
    }

    /// Delete one account owned by `tenant`.
    ///
    /// Deleting an unknown or already-deleted account is `NotFound`.
    pub async fn delete_account(&self, tenant: &TenantId, account_id: &str) -> Result<()> {
        let account = self.get_account(tenant, account_id, false).await?;

        delete_with_timeout(&self.platform, &account.account_id, self.request_timeout)
            .await
            .map_err(|e| match e {
                GatewayError::NotFound(_) => not_found(&account.account_id),
                other => other,
            })?;

        info!(
            tenant = %tenant,
            account_id = %account.account_id,
            app = %account.app.slug,
            "Account deleted"
        );
        Ok(())
    }

    /// Delete every account bound to `app_id`, across all tenants.
    ///
    /// Deletes run concurrently (bounded by `max_concurrency`), each in its own
    /// task with the single-delete timeout. Individual failures never abort the
    /// cascade; they are collected into the outcome. Only a failure to
    /// enumerate the accounts is returned as `Err`.
    ///
    /// Dropping the returned future stops new deletes from being dispatched;
    /// deletes already dispatched run to completion and their results are
    /// discarded.
    pub async fn delete_all_for_app(&self, app_id: &str) -> Result<CascadeOutcome> {
        let app_id = require_id(app_id)?;
        let operation_id = Uuid::new_v4();

        let filter = AccountFilter {
            app: Some(app_id.to_string()),
            ..AccountFilter::default()
        };
        let ids: Vec<String> = self
            .list_accounts(&filter)
            .await?
            .into_iter()
            .map(|a| a.account_id)
            .collect();

        info!(
            operation_id = %operation_id,
            app_id = %app_id,
            accounts = ids.len(),
            max_concurrency = self.max_concurrency,
            "Starting cascade delete"
        );

        let timeout = self.request_timeout;
        let mut results: Vec<(usize, String, Result<()>)> =
            futures::stream::iter(ids.into_iter().enumerate())
                .map(|(index, id)| {
                    let platform = Arc::clone(&self.platform);
                    let task_id = id.clone();
                    let handle = tokio::spawn(async move {
                        delete_with_timeout(&platform, &task_id, timeout).await
                    });
                    async move {
                        let result = match handle.await {
                            Ok(result) => result,
                            Err(e) => Err(GatewayError::upstream(format!(
                                "delete task failed: {}",
                                e
                            ))),
                        };
                        (index, id, result)
                    }
                })
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;

        results.sort_by_key(|(index, _, _)| *index);

        let total = results.len();
        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for (_, id, result) in results {
            match result {
                Ok(()) => deleted.push(id),
                Err(e) => {
                    warn!(
                        operation_id = %operation_id,
                        account_id = %id,
                        error = %e,
                        "Cascade delete failed for account"
                    );
                    failed.push(FailedDeletion {
                        id,
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            operation_id = %operation_id,
            app_id = %app_id,
            deleted = deleted.len(),
            failed = failed.len(),
            "Cascade delete finished"
        );

        Ok(CascadeOutcome {
            app_id: app_id.to_string(),
            total,
            deleted,
            failed,
        })
    }
}

/// One remote delete bounded by `timeout`.
async fn delete_with_timeout(
    platform: &Arc<dyn ConnectPlatform>,
    account_id: &str,
    timeout: Duration,
) -> Result<()> {
    match tokio::time::timeout(timeout, platform.delete_account(account_id)).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::upstream(format!(
            "delete of account {} timed out after {:?}",
            account_id, timeout
        ))),
    }
}

fn require_id(id: &str) -> Result<&str> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::invalid("id must not be empty"));
    }
    Ok(trimmed)
}

fn not_found(account_id: &str) -> GatewayError {
    GatewayError::not_found(format!("account {} not found", account_id))
}
