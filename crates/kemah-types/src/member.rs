use std::fmt;

use serde::{Deserialize, Serialize};

/// Membership tier of a buyer, as asserted by the identity provider.
///
/// The tier selects which column of an event's price table applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipTier {
    Alumni,
    General,
    NewMember,
}

impl MembershipTier {
    /// Interpret a tier claim. Anything that is not `alumni` or `general`
    /// is priced as a new member.
    pub fn from_claim(claim: &str) -> Self {
        match claim.trim().to_ascii_lowercase().as_str() {
            "alumni" => Self::Alumni,
            "general" => Self::General,
            _ => Self::NewMember,
        }
    }

    /// Label written to the reservation sheet's `Jenis Anggota` column.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Alumni => "Alumni",
            Self::General => "General",
            Self::NewMember => "New Member",
        }
    }
}

impl Default for MembershipTier {
    fn default() -> Self {
        Self::NewMember
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
