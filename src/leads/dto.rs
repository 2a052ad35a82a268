use serde::{Deserialize, Serialize};

use super::repo_types::{Lead, LeadStatus};

/// Body of the public contact form.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub country_code: Option<String>,
    pub phone: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: LeadStatus,
}

#[derive(Debug, Deserialize)]
pub struct LeadQuery {
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct LeadResponse {
    pub message: &'static str,
    pub lead: Lead,
}

#[derive(Debug, Serialize)]
pub struct LeadPage {
    pub total: i64,
    pub leads: Vec<Lead>,
}
