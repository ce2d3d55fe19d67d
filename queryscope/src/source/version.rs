// queryscope/src/source/version.rs
//
// Log export generations. Each generation marks hand-typed searches with a
// different `search_type` value; everything else is scheduled or internal.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::User;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataVersion {
    Diag2012,
    Storm2013,
    #[default]
    Diag2014,
}

impl DataVersion {
    /// The `search_type` value that marks a manual, interactive search.
    pub fn interactive_search_type(self) -> &'static str {
        match self {
            Self::Diag2014 => "adhoc",
            Self::Diag2012 | Self::Storm2013 => "historical",
        }
    }

    pub fn is_interactive(self, search_type: Option<&str>) -> bool {
        search_type == Some(self.interactive_search_type())
    }

    /// Set `is_interactive` on every query of `user`.
    pub fn mark_interactive(self, user: &mut User) {
        for q in &mut user.queries {
            q.is_interactive = self.is_interactive(q.search_type.as_deref());
        }
    }
}

impl FromStr for DataVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "diag_2012" | "diag2012" => Ok(Self::Diag2012),
            "storm_2013" | "storm2013" => Ok(Self::Storm2013),
            "diag_2014" | "diag2014" => Ok(Self::Diag2014),
            other => Err(Error::UnknownVersion(other.to_string())),
        }
    }
}

impl std::fmt::Display for DataVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Diag2012 => write!(f, "diag_2012"),
            Self::Storm2013 => write!(f, "storm_2013"),
            Self::Diag2014 => write!(f, "diag_2014"),
        }
    }
}
