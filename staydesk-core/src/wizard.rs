//! The guest data wizard: five linear steps, each with its own checks, some
//! of which depend on what was entered earlier or on the hotel's settings.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use staydesk_shared::Masked;

use crate::booking::Booking;
use crate::guest::{
    age_on, FellowTraveler, GuestData, GuestDocument, PaymentAmount, PaymentChoice, PaymentMethod,
    PrimaryGuest,
};
use crate::hotel::BookingConfig;
use crate::storage;
use crate::validation::{FieldError, Validator};
use crate::{CoreError, CoreResult};

const MAX_REQUEST_LEN: usize = 2000;
const ADULT_AGE: u32 = 18;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WizardStep {
    #[default]
    Contact,
    Travelers,
    Documents,
    Payment,
    Review,
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        WizardStep::Contact,
        WizardStep::Travelers,
        WizardStep::Documents,
        WizardStep::Payment,
        WizardStep::Review,
    ];

    /// 1-based position shown to the guest.
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0) + 1
    }

    pub fn next(&self) -> Option<WizardStep> {
        Self::ALL.get(self.index()).copied()
    }

    pub fn previous(&self) -> Option<WizardStep> {
        match self.index() {
            1 => None,
            i => Self::ALL.get(i - 2).copied(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    pub first_name: String,
    pub last_name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
    pub birth_date: Option<Masked<NaiveDate>>,
    pub nationality: String,
    pub street: Masked<String>,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub is_company: bool,
    pub company_name: Option<String>,
    pub vat_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelerForm {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<Masked<NaiveDate>>,
    pub is_child: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentForm {
    pub method: Option<PaymentMethod>,
    pub amount: Option<PaymentAmount>,
}

/// Work in progress, persisted between requests so the guest can resume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardDraft {
    pub step: WizardStep,
    pub contact: ContactForm,
    pub travelers: Vec<TravelerForm>,
    pub documents: Vec<GuestDocument>,
    pub payment: PaymentForm,
    pub special_requests: Option<String>,
    pub arrival_time: Option<String>,
    pub accepted_terms: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// What the checks need to know besides the draft itself.
#[derive(Debug, Clone, Copy)]
pub struct WizardContext<'a> {
    pub booking: &'a Booking,
    pub config: &'a BookingConfig,
    pub has_bank_details: bool,
    pub storage_base_url: &'a str,
}

impl WizardDraft {
    /// Takes the guest's form values but never their claimed step; the
    /// server decides progress.
    pub fn merge_form(&mut self, incoming: WizardDraft) {
        let step = self.step;
        *self = incoming;
        self.step = step;
        self.updated_at = Some(Utc::now());
    }

    pub fn advance(&mut self, ctx: &WizardContext<'_>) -> CoreResult<WizardStep> {
        let errors = validate_step(self.step, self, ctx);
        if !errors.is_empty() {
            return Err(CoreError::ValidationError(errors));
        }
        if let Some(next) = self.step.next() {
            self.step = next;
            self.updated_at = Some(Utc::now());
        }
        Ok(self.step)
    }

    pub fn back(&mut self) -> WizardStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
            self.updated_at = Some(Utc::now());
        }
        self.step
    }

    /// Final assembly. Runs every step's checks regardless of where the
    /// draft claims to be.
    pub fn into_guest_data(self, ctx: &WizardContext<'_>, now: DateTime<Utc>) -> CoreResult<GuestData> {
        let errors = validate_step(WizardStep::Review, &self, ctx);
        if !errors.is_empty() {
            return Err(CoreError::ValidationError(errors));
        }

        let contact = self.contact;
        let birth_date = contact
            .birth_date
            .ok_or_else(|| CoreError::invalid("contact.birth_date", "is required"))?;
        let primary = PrimaryGuest {
            first_name: contact.first_name.trim().to_string(),
            last_name: contact.last_name.trim().to_string(),
            email: Masked(contact.email.trim().to_string()),
            phone: Masked(contact.phone.trim().to_string()),
            birth_date,
            nationality: contact.nationality.trim().to_string(),
            street: Masked(contact.street.trim().to_string()),
            postal_code: contact.postal_code.trim().to_string(),
            city: contact.city.trim().to_string(),
            country: contact.country.trim().to_string(),
            is_company: contact.is_company,
            company_name: contact.company_name.filter(|_| contact.is_company),
            vat_id: contact.vat_id.filter(|_| contact.is_company),
        };

        let mut travelers = Vec::with_capacity(self.travelers.len());
        for (i, t) in self.travelers.into_iter().enumerate() {
            let birth_date = t.birth_date.ok_or_else(|| {
                CoreError::invalid(&format!("travelers[{}].birth_date", i), "is required")
            })?;
            travelers.push(FellowTraveler {
                first_name: t.first_name.trim().to_string(),
                last_name: t.last_name.trim().to_string(),
                birth_date,
                is_child: t.is_child,
            });
        }

        let (method, amount) = match (self.payment.method, self.payment.amount) {
            (Some(method), Some(amount)) => (method, amount),
            _ => return Err(CoreError::invalid("payment.method", "is required")),
        };

        Ok(GuestData {
            primary,
            travelers,
            documents: self.documents,
            payment: PaymentChoice { method, amount },
            special_requests: self
                .special_requests
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            arrival_time: self.arrival_time.as_deref().and_then(parse_arrival_time),
            accepted_terms: self.accepted_terms,
            submitted_at: now,
        })
    }
}

fn parse_arrival_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// Errors for one step. `Review` includes every earlier step.
pub fn validate_step(step: WizardStep, draft: &WizardDraft, ctx: &WizardContext<'_>) -> Vec<FieldError> {
    let mut v = Validator::new();
    match step {
        WizardStep::Contact => check_contact(&mut v, &draft.contact, ctx),
        WizardStep::Travelers => check_travelers(&mut v, &draft.travelers, ctx),
        WizardStep::Documents => check_documents(&mut v, &draft.documents, ctx),
        WizardStep::Payment => check_payment(&mut v, &draft.payment, ctx),
        WizardStep::Review => {
            check_contact(&mut v, &draft.contact, ctx);
            check_travelers(&mut v, &draft.travelers, ctx);
            check_documents(&mut v, &draft.documents, ctx);
            check_payment(&mut v, &draft.payment, ctx);
            check_review(&mut v, draft);
        }
    }
    v.into_errors()
}

fn check_contact(v: &mut Validator, c: &ContactForm, ctx: &WizardContext<'_>) {
    v.require("contact.first_name", &c.first_name);
    v.require("contact.last_name", &c.last_name);
    v.email("contact.email", c.email.expose());
    v.phone("contact.phone", c.phone.expose());
    match &c.birth_date {
        None => v.push("contact.birth_date", "is required"),
        Some(birth) => match age_on(*birth.expose(), ctx.booking.check_in) {
            None => v.push("contact.birth_date", "lies in the future"),
            Some(age) => v.check(
                age >= ADULT_AGE,
                "contact.birth_date",
                "the booking guest must be an adult at arrival",
            ),
        },
    }
    v.require("contact.nationality", &c.nationality);
    v.require("contact.street", c.street.expose());
    v.require("contact.postal_code", &c.postal_code);
    v.require("contact.city", &c.city);
    v.require("contact.country", &c.country);

    if c.is_company {
        v.require("contact.company_name", c.company_name.as_deref().unwrap_or_default());
        v.require("contact.vat_id", c.vat_id.as_deref().unwrap_or_default());
    }
}

fn check_travelers(v: &mut Validator, travelers: &[TravelerForm], ctx: &WizardContext<'_>) {
    let expected = ctx.booking.guest_count().saturating_sub(1);
    if travelers.len() != expected {
        v.push(
            "travelers",
            &format!("expected {} fellow travelers, got {}", expected, travelers.len()),
        );
    }

    for (i, t) in travelers.iter().enumerate() {
        let field = |name: &str| format!("travelers[{}].{}", i, name);
        v.require(&field("first_name"), &t.first_name);
        v.require(&field("last_name"), &t.last_name);
        match &t.birth_date {
            None => v.push(&field("birth_date"), "is required"),
            Some(birth) => match age_on(*birth.expose(), ctx.booking.check_in) {
                None => v.push(&field("birth_date"), "lies in the future"),
                Some(age) if t.is_child && age >= ADULT_AGE => {
                    v.push(&field("birth_date"), "a child must be under 18 at arrival")
                }
                Some(age) if !t.is_child && age < ADULT_AGE => {
                    v.push(&field("is_child"), "travelers under 18 must be marked as children")
                }
                Some(_) => {}
            },
        }
    }

    let children = travelers.iter().filter(|t| t.is_child).count();
    if children != ctx.booking.child_count() {
        v.push(
            "travelers",
            &format!("the booking lists {} children, got {}", ctx.booking.child_count(), children),
        );
    }
}

fn check_documents(v: &mut Validator, documents: &[GuestDocument], ctx: &WizardContext<'_>) {
    v.check(
        documents.iter().any(|d| d.file_type.is_identity()),
        "documents",
        "an ID card or passport is required",
    );
    for (i, doc) in documents.iter().enumerate() {
        v.check(
            storage::is_booking_object(ctx.storage_base_url, ctx.booking.id, &doc.url),
            &format!("documents[{}].url", i),
            "does not belong to this booking",
        );
    }
}

fn check_payment(v: &mut Validator, payment: &PaymentForm, ctx: &WizardContext<'_>) {
    match payment.method {
        None => v.push("payment.method", "is required"),
        Some(PaymentMethod::BankTransfer) => v.check(
            ctx.has_bank_details,
            "payment.method",
            "bank transfer is not available at this hotel",
        ),
        Some(PaymentMethod::OnSite) => {}
    }
    match payment.amount {
        None => v.push("payment.amount", "is required"),
        Some(PaymentAmount::Deposit) => {
            if ctx.config.deposit_percentage == 0 {
                v.push("payment.amount", "this hotel does not take deposits");
            } else if payment.method != Some(PaymentMethod::BankTransfer) {
                v.push("payment.amount", "a deposit can only be paid by bank transfer");
            }
        }
        Some(PaymentAmount::Full) => {}
    }
}

fn check_review(v: &mut Validator, draft: &WizardDraft) {
    v.check(draft.accepted_terms, "accepted_terms", "the terms must be accepted");
    if let Some(time) = draft.arrival_time.as_deref().filter(|t| !t.trim().is_empty()) {
        v.check(parse_arrival_time(time).is_some(), "arrival_time", "must be HH:MM");
    }
    if let Some(requests) = &draft.special_requests {
        v.check(
            requests.chars().count() <= MAX_REQUEST_LEN,
            "special_requests",
            "is too long",
        );
    }
}
