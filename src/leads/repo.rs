use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::StoreError;
use crate::leads::repo_types::{Lead, LeadFilter, LeadStatus, NewLead};

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn insert(&self, lead: NewLead) -> Result<Lead, StoreError>;
    /// Matching leads newest first, plus the total match count.
    async fn list(&self, filter: &LeadFilter) -> Result<(Vec<Lead>, i64), StoreError>;
    async fn update_status(&self, id: Uuid, status: LeadStatus)
        -> Result<Option<Lead>, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Debug, FromRow)]
struct LeadRow {
    id: Uuid,
    name: String,
    email: String,
    phone: String,
    message: String,
    status: String,
    created_at: OffsetDateTime,
}

impl TryFrom<LeadRow> for Lead {
    type Error = StoreError;

    fn try_from(r: LeadRow) -> Result<Self, Self::Error> {
        Ok(Lead {
            id: r.id,
            name: r.name,
            email: r.email,
            phone: r.phone,
            message: r.message,
            status: r.status.parse().map_err(StoreError::Corrupt)?,
            created_at: r.created_at,
        })
    }
}

/// `%term%` for ILIKE, with the pattern metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[derive(Clone)]
pub struct PgLeadStore {
    db: PgPool,
}

impl PgLeadStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn insert(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let row = sqlx::query_as::<_, LeadRow>(
            r#"
            INSERT INTO leads (id, name, email, phone, message, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, phone, message, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.message)
        .bind(LeadStatus::Pending.as_str())
        .fetch_one(&self.db)
        .await?;
        Lead::try_from(row)
    }

    async fn list(&self, filter: &LeadFilter) -> Result<(Vec<Lead>, i64), StoreError> {
        let pattern = filter.search.as_deref().map(like_pattern);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
              FROM leads
             WHERE $1::text IS NULL OR name ILIKE $1 OR email ILIKE $1 OR phone LIKE $1
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, LeadRow>(
            r#"
            SELECT id, name, email, phone, message, status, created_at
              FROM leads
             WHERE $1::text IS NULL OR name ILIKE $1 OR email ILIKE $1 OR phone LIKE $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.db)
        .await?;

        let leads = rows
            .into_iter()
            .map(Lead::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((leads, total))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: LeadStatus,
    ) -> Result<Option<Lead>, StoreError> {
        sqlx::query_as::<_, LeadRow>(
            r#"
            UPDATE leads SET status = $1
             WHERE id = $2
            RETURNING id, name, email, phone, message, status, created_at
            "#,
        )
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(Lead::try_from)
        .transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone, Default)]
pub struct MemoryLeadStore {
    leads: Arc<RwLock<HashMap<Uuid, Lead>>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_search(lead: &Lead, term: &str) -> bool {
    let term_lower = term.to_lowercase();
    lead.name.to_lowercase().contains(&term_lower)
        || lead.email.to_lowercase().contains(&term_lower)
        || lead.phone.contains(term)
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn insert(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let record = Lead {
            id: Uuid::new_v4(),
            name: lead.name,
            email: lead.email,
            phone: lead.phone,
            message: lead.message,
            status: LeadStatus::Pending,
            created_at: OffsetDateTime::now_utc(),
        };
        self.leads.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list(&self, filter: &LeadFilter) -> Result<(Vec<Lead>, i64), StoreError> {
        let leads = self.leads.read().await;
        let mut matched: Vec<Lead> = leads
            .values()
            .filter(|l| filter.search.as_deref().map_or(true, |t| matches_search(l, t)))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: LeadStatus,
    ) -> Result<Option<Lead>, StoreError> {
        let mut leads = self.leads.write().await;
        Ok(leads.get_mut(&id).map(|l| {
            l.status = status;
            l.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.leads.write().await.remove(&id).is_some())
    }
}
