use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    leads::{
        dto::{ContactRequest, LeadPage, LeadQuery},
        repo::LeadStore,
        repo_types::{Lead, LeadFilter, LeadStatus, NewLead},
    },
};

const DEFAULT_COUNTRY_CODE: &str = "+91";
const MAX_PAGE_SIZE: i64 = 100;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Country codes with a known national number length, longest prefix first.
const TEN_DIGIT_CODES: [(&str, &str); 3] = [
    ("+91", "Indian number must be 10 digits"),
    ("+44", "UK number must be 10 digits"),
    ("+1", "US number must be 10 digits"),
];

/// Splits a submitted phone into (country code, national number).
///
/// A `+`-prefixed phone carries its own code and `country_code` is ignored.
/// An unrecognised `+` prefix is kept whole as `("+", digits)`, so joining
/// the two parts always gives back what the client sent.
fn split_phone<'a>(phone: &'a str, country_code: &'a str) -> (&'a str, &'a str) {
    match phone.strip_prefix('+') {
        Some(rest) => TEN_DIGIT_CODES
            .iter()
            .find(|(code, _)| phone.starts_with(code))
            .map(|(code, _)| (*code, &phone[code.len()..]))
            .unwrap_or(("+", rest)),
        None => (country_code, phone),
    }
}

/// Collects every problem with a contact form, in field order.
fn validate_contact(req: &ContactRequest, country_code: &str, national: &str) -> Vec<&'static str> {
    let mut errors = Vec::new();
    if req.name.trim().is_empty() {
        errors.push("Name is required");
    }
    if !is_valid_email(req.email.trim()) {
        errors.push("Valid email is required");
    }

    if national.is_empty() {
        errors.push("Phone number is required");
    } else if !national.chars().all(|c| c.is_ascii_digit()) {
        errors.push("Phone number must contain digits only");
    } else if let Some((_, msg)) = TEN_DIGIT_CODES.iter().find(|(code, _)| *code == country_code) {
        if national.len() != 10 {
            errors.push(*msg);
        }
    }

    if req.message.trim().is_empty() {
        errors.push("Message is required");
    }
    errors
}

#[derive(Clone)]
pub struct LeadService {
    store: Arc<dyn LeadStore>,
}

impl LeadService {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self { store }
    }

    pub async fn submit(&self, req: ContactRequest) -> Result<Lead, AppError> {
        let country_code = req
            .country_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_COUNTRY_CODE);
        let (code, national) = split_phone(req.phone.trim(), country_code);

        let errors = validate_contact(&req, code, national);
        if !errors.is_empty() {
            warn!(count = errors.len(), "contact form rejected");
            return Err(AppError::Validation(errors.join("; ")));
        }

        let lead = self
            .store
            .insert(NewLead {
                name: req.name.trim().to_string(),
                email: req.email.trim().to_string(),
                phone: format!("{code}{national}"),
                message: req.message.trim().to_string(),
            })
            .await?;
        info!(lead_id = %lead.id, "lead captured");
        Ok(lead)
    }

    pub async fn list(&self, query: LeadQuery) -> Result<LeadPage, AppError> {
        let filter = LeadFilter {
            search: query
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            limit: query.limit.clamp(1, MAX_PAGE_SIZE),
            offset: query.offset.max(0),
        };
        let (leads, total) = self.store.list(&filter).await?;
        Ok(LeadPage { total, leads })
    }

    pub async fn update_status(&self, id: Uuid, status: LeadStatus) -> Result<Lead, AppError> {
        let lead = self
            .store
            .update_status(id, status)
            .await?
            .ok_or_else(|| AppError::NotFound("Lead not found".into()))?;
        info!(lead_id = %id, status = %status, "lead status updated");
        Ok(lead)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if !self.store.delete(id).await? {
            return Err(AppError::NotFound("Lead not found".into()));
        }
        info!(lead_id = %id, "lead deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::repo::MemoryLeadStore;

    fn service() -> LeadService {
        LeadService::new(Arc::new(MemoryLeadStore::new()))
    }

    fn contact(name: &str, email: &str, phone: &str) -> ContactRequest {
        ContactRequest {
            name: name.into(),
            email: email.into(),
            country_code: None,
            phone: phone.into(),
            message: "Need help with the Jan Arogya Card".into(),
        }
    }

    fn query(search: Option<&str>, limit: i64, offset: i64) -> LeadQuery {
        LeadQuery {
            search: search.map(Into::into),
            limit,
            offset,
        }
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("asha@example.com"));
        assert!(!is_valid_email("asha@example"));
        assert!(!is_valid_email("asha example.com"));
        assert!(!is_valid_email(""));
    }

    #[tokio::test]
    async fn submit_defaults_to_indian_code_and_pending() {
        let svc = service();
        let lead = svc
            .submit(contact("Asha", "asha@example.com", "9999999999"))
            .await
            .expect("submit");
        assert_eq!(lead.phone, "+919999999999");
        assert_eq!(lead.status, LeadStatus::Pending);
    }

    #[tokio::test]
    async fn submit_reports_every_invalid_field() {
        let svc = service();
        let err = svc
            .submit(ContactRequest {
                message: " ".into(),
                ..contact("", "not-an-email", "12345")
            })
            .await
            .unwrap_err();
        let AppError::Validation(msg) = &err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(msg.contains("Name is required"));
        assert!(msg.contains("Valid email is required"));
        assert!(msg.contains("Indian number must be 10 digits"));
        assert!(msg.contains("Message is required"));
    }

    #[tokio::test]
    async fn submit_applies_length_rule_only_to_known_codes() {
        let svc = service();
        let err = svc
            .submit(ContactRequest {
                country_code: Some("+44".into()),
                ..contact("Asha", "asha@example.com", "12345")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "UK number must be 10 digits"));

        let lead = svc
            .submit(ContactRequest {
                country_code: Some("+971".into()),
                ..contact("Asha", "asha@example.com", "501234567")
            })
            .await
            .expect("other codes accept any digit count");
        assert_eq!(lead.phone, "+971501234567");
    }

    #[tokio::test]
    async fn submit_rejects_non_digit_phone() {
        let err = service()
            .submit(contact("Asha", "asha@example.com", "99999-9999"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn split_phone_reads_code_from_plus_prefix() {
        assert_eq!(split_phone("+919999999999", "+1"), ("+91", "9999999999"));
        assert_eq!(split_phone("+14155551234", "+91"), ("+1", "4155551234"));
        assert_eq!(split_phone("+971501234567", "+91"), ("+", "971501234567"));
        assert_eq!(split_phone("9999999999", "+44"), ("+44", "9999999999"));
    }

    #[tokio::test]
    async fn submit_accepts_full_international_phone() {
        let svc = service();
        let lead = svc
            .submit(contact("Asha", "asha@example.com", "+919999999999"))
            .await
            .expect("prefixed indian number");
        assert_eq!(lead.phone, "+919999999999");

        let lead = svc
            .submit(ContactRequest {
                country_code: Some("+44".into()),
                ..contact("Asha", "asha@example.com", "+14155551234")
            })
            .await
            .expect("prefix wins over countryCode");
        assert_eq!(lead.phone, "+14155551234");

        let err = svc
            .submit(contact("Asha", "asha@example.com", "+9199999"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Indian number must be 10 digits"));
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let svc = service();
        svc.submit(contact("Asha", "asha@example.com", "9999999999")).await.unwrap();
        svc.submit(contact("Ravi", "ravi@example.com", "8888888888")).await.unwrap();
        svc.submit(contact("Meena", "meena@clinic.in", "7777777777")).await.unwrap();

        let page = svc.list(query(None, 2, 0)).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.leads.len(), 2);

        let page = svc.list(query(None, 2, 2)).await.unwrap();
        assert_eq!(page.leads.len(), 1);

        let page = svc.list(query(Some("EXAMPLE.com"), 20, 0)).await.unwrap();
        assert_eq!(page.total, 2);

        let page = svc.list(query(Some("77777"), 20, 0)).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.leads[0].name, "Meena");

        // Out-of-range paging is clamped instead of rejected.
        let page = svc.list(query(Some("  "), 0, -5)).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.leads.len(), 1);
    }

    #[tokio::test]
    async fn update_status_and_delete() {
        let svc = service();
        let lead = svc
            .submit(contact("Asha", "asha@example.com", "9999999999"))
            .await
            .unwrap();

        let updated = svc.update_status(lead.id, LeadStatus::Approved).await.unwrap();
        assert_eq!(updated.status, LeadStatus::Approved);

        svc.delete(lead.id).await.expect("delete");
        assert!(matches!(svc.delete(lead.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            svc.update_status(lead.id, LeadStatus::Rejected).await,
            Err(AppError::NotFound(_))
        ));
    }
}
