use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::OwnerId;

/// Role assigned by the upstream access layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Moderator,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Moderator => "moderator",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner" | "user" => Some(Self::Owner),
            "moderator" | "admin" => Some(Self::Moderator),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Already-authenticated caller. Credentials are verified before this is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub user_id: OwnerId,
    pub role: Role,
}

impl CallerIdentity {
    pub fn owner(user_id: impl Into<String>) -> Self {
        Self {
            user_id: OwnerId(user_id.into()),
            role: Role::Owner,
        }
    }

    pub fn moderator(user_id: impl Into<String>) -> Self {
        Self {
            user_id: OwnerId(user_id.into()),
            role: Role::Moderator,
        }
    }

    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("caller identity is missing")]
    Unauthenticated,
    #[error("role '{required}' required, caller has '{actual}'")]
    Forbidden { required: Role, actual: Role },
    #[error("invalid caller identity: {0}")]
    Malformed(String),
}

pub fn require_moderator(caller: &CallerIdentity) -> Result<(), AccessError> {
    if caller.is_moderator() {
        Ok(())
    } else {
        Err(AccessError::Forbidden {
            required: Role::Moderator,
            actual: caller.role,
        })
    }
}
