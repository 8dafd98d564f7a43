//! Request and response shapes for the HTTP API.
//!
//! Skills and executions are passed through as raw JSON; only the fields
//! the client itself reads are typed.

use ih_protocol::ExecutionStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An account as returned by login, register and `/api/auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Any other fields the server sends.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    pub access_token: String,
    pub user: UserInfo,
}

/// Response of `POST /api/executions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionCreated {
    #[serde(rename = "executionId")]
    pub execution_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Filters for `GET /api/skills`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillQuery {
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for SkillQuery {
    fn default() -> Self {
        Self {
            category: None,
            difficulty: None,
            limit: 50,
            offset: 0,
        }
    }
}

impl SkillQuery {
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = Some(difficulty.into());
        self
    }

    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// Filters for `GET /api/executions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub status: Option<ExecutionStatus>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            status: None,
            limit: 50,
            offset: 0,
        }
    }
}

impl HistoryQuery {
    pub fn status(mut self, status: ExecutionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}
