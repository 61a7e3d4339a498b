//! Semantic roles bound to remote objects

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SyncError;

/// What a remote object stands for in the avatar rig
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Mouth closed image
    Closed,
    /// Mouth open image
    Open,
    /// Mouth wide open image (three-tier rigs only)
    Loud,
    /// Body the mouth images sit on
    Base,
}

impl Role {
    /// Every role, in binding order
    pub const ALL: [Role; 4] = [Role::Closed, Role::Open, Role::Loud, Role::Base];

    /// Roles that are toggled by the viseme tier
    pub const MOUTH: [Role; 3] = [Role::Closed, Role::Open, Role::Loud];

    /// Roles that must be bound before the engine may start
    pub const REQUIRED: [Role; 2] = [Role::Closed, Role::Open];

    /// Roles that receive the bobbing offset, base first
    pub const MOTION: [Role; 4] = [Role::Base, Role::Open, Role::Closed, Role::Loud];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Closed => "closed",
            Role::Open => "open",
            Role::Loud => "loud",
            Role::Base => "base",
        }
    }

    #[inline]
    pub fn is_mouth(self) -> bool {
        !matches!(self, Role::Base)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "closed" => Ok(Role::Closed),
            "open" => Ok(Role::Open),
            "loud" | "ahh" => Ok(Role::Loud),
            "base" | "body" => Ok(Role::Base),
            _ => Err(SyncError::UnknownRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("closed".parse::<Role>().unwrap(), Role::Closed);
        assert_eq!(" OPEN ".parse::<Role>().unwrap(), Role::Open);
        assert_eq!("ahh".parse::<Role>().unwrap(), Role::Loud);
        assert_eq!("body".parse::<Role>().unwrap(), Role::Base);
        assert!("jaw".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_sets() {
        assert!(Role::MOUTH.iter().all(|r| r.is_mouth()));
        assert!(!Role::Base.is_mouth());
        assert_eq!(Role::MOTION[0], Role::Base);
    }
}
