use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use kemah_ledger::schema::officer;
use kemah_ledger::Buyer;
use kemah_store::RecordStore;
use kemah_types::MembershipTier;

use crate::error::{ServerError, ServerResult};

pub const HEADER_EMAIL: &str = "x-user-email";
pub const HEADER_NAME: &str = "x-user-name";
pub const HEADER_TIER: &str = "x-membership-tier";

/// Caller identity as asserted by the upstream identity provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub name: String,
    pub tier: MembershipTier,
}

impl Identity {
    pub fn new(email: impl Into<String>, name: impl Into<String>, tier: MembershipTier) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            tier,
        }
    }

    /// Read the identity headers. The email is required; the name falls
    /// back to the email and a missing tier prices as a new member.
    pub fn from_headers(headers: &HeaderMap) -> ServerResult<Self> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .unwrap_or("")
        };
        let email = header(HEADER_EMAIL);
        if email.is_empty() {
            return Err(ServerError::Unauthenticated(format!("missing {HEADER_EMAIL} header")));
        }
        let name = match header(HEADER_NAME) {
            "" => email,
            name => name,
        };
        Ok(Self::new(email, name, MembershipTier::from_claim(header(HEADER_TIER))))
    }

    pub fn buyer(&self) -> Buyer {
        Buyer::new(self.name.clone(), self.email.clone(), self.tier)
    }
}

/// Decides who may use officer endpoints.
#[async_trait]
pub trait OfficerRoster: Send + Sync {
    async fn is_officer(&self, email: &str) -> ServerResult<bool>;
}

/// Roster read from the `Registration Officer` table on every check, so
/// officers added to the sheet gain access without a restart.
pub struct SheetOfficerRoster {
    store: Arc<dyn RecordStore>,
    table: String,
}

impl SheetOfficerRoster {
    pub fn new(store: Arc<dyn RecordStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }
}

#[async_trait]
impl OfficerRoster for SheetOfficerRoster {
    async fn is_officer(&self, email: &str) -> ServerResult<bool> {
        let wanted = email.trim();
        if wanted.is_empty() {
            return Ok(false);
        }
        let records = self.store.read_all(&self.table).await?;
        Ok(records
            .iter()
            .any(|record| record.get_any(officer::EMAIL).eq_ignore_ascii_case(wanted)))
    }
}

impl std::fmt::Debug for SheetOfficerRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetOfficerRoster").field("table", &self.table).finish()
    }
}

/// Fixed roster, for tests and single-officer deployments.
#[derive(Clone, Debug, Default)]
pub struct StaticOfficerRoster {
    emails: BTreeSet<String>,
}

impl StaticOfficerRoster {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails.into_iter().map(|e| e.as_ref().trim().to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl OfficerRoster for StaticOfficerRoster {
    async fn is_officer(&self, email: &str) -> ServerResult<bool> {
        Ok(self.emails.contains(&email.trim().to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use kemah_store::InMemoryRecordStore;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn identity_from_headers() {
        let id = Identity::from_headers(&headers(&[
            (HEADER_EMAIL, " siti@example.com "),
            (HEADER_NAME, "Siti"),
            (HEADER_TIER, "Alumni"),
        ]))
        .unwrap();
        assert_eq!(id, Identity::new("siti@example.com", "Siti", MembershipTier::Alumni));
        assert_eq!(id.buyer().tier, MembershipTier::Alumni);
    }

    #[test]
    fn identity_defaults() {
        let id = Identity::from_headers(&headers(&[(HEADER_EMAIL, "budi@example.com")])).unwrap();
        assert_eq!(id.name, "budi@example.com");
        assert_eq!(id.tier, MembershipTier::NewMember);
    }

    #[test]
    fn missing_email_is_unauthenticated() {
        let err = Identity::from_headers(&headers(&[(HEADER_NAME, "Siti")])).unwrap_err();
        assert!(matches!(err, ServerError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn sheet_roster_matches_case_insensitively() {
        let store = Arc::new(InMemoryRecordStore::new().with_table(
            "Registration Officer",
            &["Full Name", "Email Address"],
            &[&["Ahmad", "Ahmad@Kemah.id"]],
        ));
        let roster = SheetOfficerRoster::new(store, "Registration Officer");
        assert!(roster.is_officer("ahmad@kemah.id").await.unwrap());
        assert!(!roster.is_officer("siti@example.com").await.unwrap());
        assert!(!roster.is_officer("").await.unwrap());
    }

    #[tokio::test]
    async fn static_roster() {
        let roster = StaticOfficerRoster::new(["Officer@Kemah.id"]);
        assert!(roster.is_officer("officer@kemah.id").await.unwrap());
        assert!(!roster.is_officer("other@kemah.id").await.unwrap());
    }
}
