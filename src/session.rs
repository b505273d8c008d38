//! Signed-in identity and chat scope
//!
//! Passed explicitly into the runtime; nothing here is global.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which knowledge area a question is asked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scope {
    #[default]
    #[serde(rename = "MAIN")]
    Main,
    #[serde(rename = "FAI/IS")]
    FaiIs,
    #[serde(rename = "BICIOT")]
    Biciot,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::Main, Scope::FaiIs, Scope::Biciot];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Main => "MAIN",
            Scope::FaiIs => "FAI/IS",
            Scope::Biciot => "BICIOT",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown scope: {0}")]
pub struct UnknownScope(pub String);

impl FromStr for Scope {
    type Err = UnknownScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownScope(s.to_string()))
    }
}

/// Account details as returned by the auth service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub faculty: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub joined: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// Guest or signed-in; picks the default suggestions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Guest,
    Student,
}

/// Current identity and scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub scope: Scope,
}

impl Session {
    pub fn guest(scope: Scope) -> Self {
        Self { user: None, scope }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn role(&self) -> Role {
        if self.is_authenticated() {
            Role::Student
        } else {
            Role::Guest
        }
    }

    pub fn course(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|u| u.course.as_str())
            .filter(|c| !c.is_empty())
    }

    pub fn access_token(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.access_token.as_deref())
    }
}
