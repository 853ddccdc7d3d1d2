use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An integrable third-party service from the remote catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalApp {
    pub app_id: String,
    /// Human-readable key, e.g. `slack` or `google_sheets`
    pub slug: String,
    pub display_name: String,
}

/// A linked credential set owned by one tenant for one app.
///
/// # Security
/// `credentials` is only populated when explicitly requested; otherwise the
/// field is absent from the serialized form entirely.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalAccount {
    pub account_id: String,
    /// Owning tenant's external user id
    pub tenant: String,
    pub app: ExternalApp,
    /// Last known usable state
    pub healthy: bool,
    /// Permanently revoked
    pub dead: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExternalAccount {
    /// Enforce `dead => !healthy` and drop credentials unless they were asked for.
    pub fn normalized(mut self, include_credentials: bool) -> Self {
        if self.dead {
            self.healthy = false;
        }
        if !include_credentials {
            self.credentials = None;
        }
        self
    }
}

/// Filter for account listings. All fields are optional and combine with AND.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountFilter {
    /// App id or slug
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub oauth_app_id: Option<String>,
    #[serde(default)]
    pub external_user_id: Option<String>,
    #[serde(default)]
    pub include_credentials: bool,
}

/// Short-lived, origin-restricted token authorizing one account-linking flow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub tenant: String,
    pub allowed_origins: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_link_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(dead: bool, healthy: bool) -> ExternalAccount {
        ExternalAccount {
            account_id: "apn_1".to_string(),
            tenant: "user-1".to_string(),
            app: ExternalApp {
                app_id: "app_slack".to_string(),
                slug: "slack".to_string(),
                display_name: "Slack".to_string(),
            },
            healthy,
            dead,
            credentials: Some(serde_json::json!({"oauth_access_token": "xoxb-secret"})),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_dead_account_is_never_healthy() {
        let normalized = account(true, true).normalized(false);
        assert!(normalized.dead);
        assert!(!normalized.healthy);
    }

    #[test]
    fn test_credentials_field_absent_when_not_requested() {
        let normalized = account(false, true).normalized(false);
        let json = serde_json::to_value(&normalized).unwrap();
        assert!(json.get("credentials").is_none());
        assert!(!json.to_string().contains("xoxb-secret"));
    }

    #[test]
    fn test_credentials_kept_when_requested() {
        let normalized = account(false, true).normalized(true);
        let json = serde_json::to_value(&normalized).unwrap();
        assert_eq!(
            json["credentials"]["oauth_access_token"],
            "xoxb-secret"
        );
    }

    #[test]
    fn test_account_filter_from_query_string() {
        let filter: AccountFilter =
            serde_urlencoded::from_str("app=slack&include_credentials=true").unwrap();
        assert_eq!(filter.app.as_deref(), Some("slack"));
        assert!(filter.include_credentials);
        assert_eq!(filter.oauth_app_id, None);

        let filter: AccountFilter = serde_urlencoded::from_str("").unwrap();
        assert_eq!(filter, AccountFilter::default());
    }
}
