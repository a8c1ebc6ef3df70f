use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use staydesk_shared::Masked;
use std::fmt;

use crate::booking::deposit_of;

/// Everything the guest submits through the wizard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestData {
    pub primary: PrimaryGuest,
    pub travelers: Vec<FellowTraveler>,
    pub documents: Vec<GuestDocument>,
    pub payment: PaymentChoice,
    pub special_requests: Option<String>,
    pub arrival_time: Option<NaiveTime>,
    pub accepted_terms: bool,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryGuest {
    pub first_name: String,
    pub last_name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
    pub birth_date: Masked<NaiveDate>,
    pub nationality: String,
    pub street: Masked<String>,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub is_company: bool,
    pub company_name: Option<String>,
    pub vat_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FellowTraveler {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Masked<NaiveDate>,
    pub is_child: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    IdCard,
    Passport,
    Other,
}

impl DocumentType {
    /// Segment used in object storage paths.
    pub fn path_segment(&self) -> &'static str {
        match self {
            DocumentType::IdCard => "id_card",
            DocumentType::Passport => "passport",
            DocumentType::Other => "other",
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, DocumentType::IdCard | DocumentType::Passport)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestDocument {
    pub file_type: DocumentType,
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    BankTransfer,
    OnSite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentAmount {
    Full,
    Deposit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChoice {
    pub method: PaymentMethod,
    pub amount: PaymentAmount,
}

impl GuestData {
    pub fn child_count(&self) -> usize {
        self.travelers.iter().filter(|t| t.is_child).count()
    }

    pub fn party_size(&self) -> usize {
        1 + self.travelers.len()
    }

    /// Amount the guest owes up front, in cents.
    pub fn amount_due_cents(&self, total_cents: i64, deposit_percentage: u8) -> i64 {
        match self.payment.amount {
            PaymentAmount::Full => total_cents,
            PaymentAmount::Deposit => deposit_of(total_cents, deposit_percentage),
        }
    }
}

/// Whole years between `birth` and `on`; `None` when born after `on`.
pub fn age_on(birth: NaiveDate, on: NaiveDate) -> Option<u32> {
    on.years_since(birth)
}
