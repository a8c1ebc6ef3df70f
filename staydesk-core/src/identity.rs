use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Custom-claim role carried by an operator session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Agency,
    Hotelier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Agency => "AGENCY",
            Role::Hotelier => "HOTELIER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AGENCY" => Ok(Role::Agency),
            "HOTELIER" => Ok(Role::Hotelier),
            other => Err(format!("unknown role {}", other)),
        }
    }
}

/// Whoever is performing a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Agency { user_id: String },
    Hotelier { user_id: String, hotel_id: Uuid },
    Guest { link_id: Uuid },
}

impl Actor {
    pub fn role(&self) -> Option<Role> {
        match self {
            Actor::Agency { .. } => Some(Role::Agency),
            Actor::Hotelier { .. } => Some(Role::Hotelier),
            Actor::Guest { .. } => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Actor::Agency { user_id } => format!("agency:{}", user_id),
            Actor::Hotelier { user_id, .. } => format!("hotelier:{}", user_id),
            Actor::Guest { link_id } => format!("guest:{}", link_id),
        }
    }

    /// Agency sees every tenant; a hotelier only its own.
    pub fn can_access_hotel(&self, hotel_id: Uuid) -> bool {
        match self {
            Actor::Agency { .. } => true,
            Actor::Hotelier { hotel_id: own, .. } => *own == hotel_id,
            Actor::Guest { .. } => false,
        }
    }
}
