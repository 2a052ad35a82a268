use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LeadStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Pending => "PENDING",
            LeadStatus::Approved => "APPROVED",
            LeadStatus::Rejected => "REJECTED",
            LeadStatus::Withdrawn => "WITHDRAWN",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(LeadStatus::Pending),
            "APPROVED" => Ok(LeadStatus::Approved),
            "REJECTED" => Ok(LeadStatus::Rejected),
            "WITHDRAWN" => Ok(LeadStatus::Withdrawn),
            other => anyhow::bail!("unknown lead status {other:?}"),
        }
    }
}

/// A contact-form submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String, // country code + number
    pub message: String,
    pub status: LeadStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
}

/// Admin listing filter. `search` is matched as a substring.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}
