use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Membership tier. Ordered from least to most privileged, so tier
/// comparisons read naturally (`Tier::Admin > Tier::Member`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Basic,
    Member,
    Admin,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Member => "member",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTier(pub String);

impl fmt::Display for UnknownTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown membership tier '{}'", self.0)
    }
}

impl std::error::Error for UnknownTier {}

impl FromStr for Tier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownTier(other.to_string())),
        }
    }
}

/// The authenticated identity for one request.
///
/// Always rebuilt from the current `users` row, never cached across
/// requests, so tier and profile changes show up on the next request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub avatar_ref: String,
    pub tier: Tier,
}

/// A post as shown to a particular viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub owner_id: Uuid,
    pub owner: String,
    pub owner_avatar: String,
    /// Tier of the post's owner, not of the viewer.
    pub owner_tier: Tier,
    pub owned_by_viewer: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parses_known_values_only() {
        assert_eq!("basic".parse::<Tier>(), Ok(Tier::Basic));
        assert_eq!("admin".parse::<Tier>(), Ok(Tier::Admin));
        assert!("Admin".parse::<Tier>().is_err());
        assert!("gold".parse::<Tier>().is_err());
    }

    #[test]
    fn tier_ordering_follows_privilege() {
        assert!(Tier::Basic < Tier::Member);
        assert!(Tier::Member < Tier::Admin);
    }

    #[test]
    fn tier_serializes_lowercase() {
        let json = serde_json::to_string(&Tier::Member).unwrap();
        assert_eq!(json, "\"member\"");
    }
}
