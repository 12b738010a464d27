use kemah_types::MembershipTier;
use serde::{Deserialize, Serialize};

/// The verified identity placing an order or booking.
///
/// Always taken from the identity provider, never from the request body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub tier: MembershipTier,
}

impl Buyer {
    pub fn new(name: impl Into<String>, email: impl Into<String>, tier: MembershipTier) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            tier,
        }
    }

    /// Case-insensitive email comparison.
    pub fn owns(&self, email: &str) -> bool {
        same_email(&self.email, email)
    }
}

pub(crate) fn same_email(a: &str, b: &str) -> bool {
    !a.trim().is_empty() && a.trim().eq_ignore_ascii_case(b.trim())
}
