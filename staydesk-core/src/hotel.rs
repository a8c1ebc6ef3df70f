use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use staydesk_shared::Masked;
use uuid::Uuid;

use crate::identity::Role;
use crate::validation::{self, Validator};
use crate::{CoreError, CoreResult};

pub const REDACTED: &str = "********";

/// A hotel tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotel {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub branding: Branding,
    pub contact: ContactInfo,
    pub bank: Option<BankDetails>,
    pub smtp: Option<SmtpSettings>,
    pub booking_config: BookingConfig,
    pub permissions: HotelPermissions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branding {
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub accent_color: Option<String>,
    pub welcome_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankDetails {
    pub account_holder: String,
    pub bank_name: Option<String>,
    pub iban: String,
    pub bic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Masked<String>,
    pub from_address: String,
    pub from_name: Option<String>,
    #[serde(default = "default_true")]
    pub use_tls: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingConfig {
    #[serde(default)]
    pub meal_types: Vec<String>,
    #[serde(default)]
    pub room_categories: Vec<String>,
    #[serde(default)]
    pub deposit_percentage: u8,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "EUR".to_string()
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            meal_types: Vec::new(),
            room_categories: Vec::new(),
            deposit_percentage: 0,
            currency: default_currency(),
        }
    }
}

/// Which sections a hotelier may edit without the agency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelPermissions {
    #[serde(default)]
    pub can_edit_profile: bool,
    #[serde(default)]
    pub can_edit_bank_details: bool,
    #[serde(default)]
    pub can_edit_smtp: bool,
    #[serde(default)]
    pub can_edit_booking_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotelSection {
    Branding,
    Contact,
    Bank,
    Smtp,
    BookingConfig,
    Permissions,
}

impl HotelSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            HotelSection::Branding => "branding",
            HotelSection::Contact => "contact",
            HotelSection::Bank => "bank",
            HotelSection::Smtp => "smtp",
            HotelSection::BookingConfig => "booking_config",
            HotelSection::Permissions => "permissions",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "section", content = "data", rename_all = "snake_case")]
pub enum HotelUpdate {
    Branding(Branding),
    Contact(ContactInfo),
    Bank(BankDetails),
    Smtp(SmtpSettings),
    BookingConfig(BookingConfig),
    Permissions(HotelPermissions),
}

impl HotelUpdate {
    pub fn section(&self) -> HotelSection {
        match self {
            HotelUpdate::Branding(_) => HotelSection::Branding,
            HotelUpdate::Contact(_) => HotelSection::Contact,
            HotelUpdate::Bank(_) => HotelSection::Bank,
            HotelUpdate::Smtp(_) => HotelSection::Smtp,
            HotelUpdate::BookingConfig(_) => HotelSection::BookingConfig,
            HotelUpdate::Permissions(_) => HotelSection::Permissions,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHotel {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub branding: Branding,
    pub contact: ContactInfo,
    pub bank: Option<BankDetails>,
    pub smtp: Option<SmtpSettings>,
    #[serde(default)]
    pub booking_config: BookingConfig,
    #[serde(default)]
    pub permissions: HotelPermissions,
}

/// What a guest sees of the hotel on the wizard pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicHotelProfile {
    pub id: Uuid,
    pub name: String,
    pub branding: Branding,
    pub contact: ContactInfo,
    pub bank: Option<BankDetails>,
    pub booking_config: BookingConfig,
}

impl NewHotel {
    pub fn validate(&self) -> CoreResult<()> {
        let mut v = Validator::new();
        v.require("name", &self.name);
        if let Some(slug) = &self.slug {
            v.check(is_slug(slug), "slug", "may only contain a-z, 0-9 and dashes");
        }
        v.extend(self.branding.errors());
        v.extend(self.contact.errors());
        if let Some(bank) = &self.bank {
            v.extend(bank.errors());
        }
        if let Some(smtp) = &self.smtp {
            v.extend(smtp.errors());
        }
        v.extend(self.booking_config.errors());
        v.finish()
    }
}

impl Hotel {
    pub fn create(new: NewHotel) -> CoreResult<Self> {
        new.validate()?;
        let now = Utc::now();
        let id = Uuid::new_v4();
        let slug = match new.slug {
            Some(slug) => slug,
            None => derive_slug(&new.name, id),
        };
        Ok(Self {
            id,
            name: new.name.trim().to_string(),
            slug,
            branding: new.branding,
            contact: new.contact,
            bank: new.bank.map(BankDetails::normalized),
            smtp: new.smtp,
            booking_config: new.booking_config.normalized(),
            permissions: new.permissions,
            created_at: now,
            updated_at: now,
        })
    }

    /// Agency may edit everything; a hotelier only the sections the agency
    /// unlocked, and never the permission flags themselves.
    pub fn may_edit(&self, role: Role, section: HotelSection) -> bool {
        match role {
            Role::Agency => true,
            Role::Hotelier => match section {
                HotelSection::Branding | HotelSection::Contact => self.permissions.can_edit_profile,
                HotelSection::Bank => self.permissions.can_edit_bank_details,
                HotelSection::Smtp => self.permissions.can_edit_smtp,
                HotelSection::BookingConfig => self.permissions.can_edit_booking_config,
                HotelSection::Permissions => false,
            },
        }
    }

    pub fn apply(&mut self, role: Role, update: HotelUpdate) -> CoreResult<()> {
        let section = update.section();
        if !self.may_edit(role, section) {
            return Err(CoreError::PermissionDenied(format!(
                "{} may not edit {}",
                role,
                section.as_str()
            )));
        }

        match update {
            HotelUpdate::Branding(branding) => {
                validate_errors(branding.errors())?;
                self.branding = branding;
            }
            HotelUpdate::Contact(contact) => {
                validate_errors(contact.errors())?;
                self.contact = contact;
            }
            HotelUpdate::Bank(bank) => {
                validate_errors(bank.errors())?;
                self.bank = Some(bank.normalized());
            }
            HotelUpdate::Smtp(mut smtp) => {
                // blank or redacted password keeps the stored one
                let keep = smtp.password.is_empty() || smtp.password.as_str() == REDACTED;
                if keep {
                    match &self.smtp {
                        Some(existing) => smtp.password = existing.password.clone(),
                        None => return Err(CoreError::invalid("smtp.password", "is required")),
                    }
                }
                validate_errors(smtp.errors())?;
                self.smtp = Some(smtp);
            }
            HotelUpdate::BookingConfig(config) => {
                validate_errors(config.errors())?;
                self.booking_config = config.normalized();
            }
            HotelUpdate::Permissions(permissions) => {
                self.permissions = permissions;
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Copy safe to return to operators: SMTP password replaced.
    pub fn redacted(&self) -> Hotel {
        let mut hotel = self.clone();
        if let Some(smtp) = hotel.smtp.as_mut() {
            smtp.password = Masked(REDACTED.to_string());
        }
        hotel
    }

    pub fn public_profile(&self) -> PublicHotelProfile {
        PublicHotelProfile {
            id: self.id,
            name: self.name.clone(),
            branding: self.branding.clone(),
            contact: self.contact.clone(),
            bank: self.bank.clone(),
            booking_config: self.booking_config.clone(),
        }
    }

    pub fn sender_name(&self) -> String {
        self.smtp
            .as_ref()
            .and_then(|s| s.from_name.clone())
            .unwrap_or_else(|| self.name.clone())
    }
}

fn validate_errors(errors: Vec<validation::FieldError>) -> CoreResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CoreError::ValidationError(errors))
    }
}

impl Branding {
    fn errors(&self) -> Vec<validation::FieldError> {
        let mut v = Validator::new();
        for (field, color) in [
            ("branding.primary_color", &self.primary_color),
            ("branding.accent_color", &self.accent_color),
        ] {
            if let Some(color) = color {
                v.check(validation::is_hex_color(color), field, "must be a #RRGGBB color");
            }
        }
        if let Some(url) = &self.logo_url {
            v.check(is_http_url(url), "branding.logo_url", "must be an http(s) URL");
        }
        v.into_errors()
    }
}

impl ContactInfo {
    fn errors(&self) -> Vec<validation::FieldError> {
        let mut v = Validator::new();
        v.email("contact.email", &self.email);
        if let Some(phone) = self.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            v.check(validation::is_phone(phone), "contact.phone", "is not a valid phone number");
        }
        if let Some(website) = &self.website {
            v.check(is_http_url(website), "contact.website", "must be an http(s) URL");
        }
        v.into_errors()
    }
}

impl BankDetails {
    fn errors(&self) -> Vec<validation::FieldError> {
        let mut v = Validator::new();
        v.require("bank.account_holder", &self.account_holder);
        if v.require("bank.iban", &self.iban) {
            v.check(validation::is_valid_iban(&self.iban), "bank.iban", "is not a valid IBAN");
        }
        if let Some(bic) = self.bic.as_deref().filter(|b| !b.trim().is_empty()) {
            v.check(validation::is_valid_bic(bic), "bank.bic", "is not a valid BIC");
        }
        v.into_errors()
    }

    fn normalized(self) -> Self {
        Self {
            iban: validation::normalize_iban(&self.iban),
            bic: self.bic.map(|b| b.trim().to_ascii_uppercase()),
            ..self
        }
    }

    /// Grouped in fours for mail bodies.
    pub fn formatted_iban(&self) -> String {
        self.iban
            .as_bytes()
            .chunks(4)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl SmtpSettings {
    fn errors(&self) -> Vec<validation::FieldError> {
        let mut v = Validator::new();
        v.require("smtp.host", &self.host);
        v.check(self.port != 0, "smtp.port", "must be greater than zero");
        v.require("smtp.username", &self.username);
        v.require("smtp.password", self.password.expose());
        v.email("smtp.from_address", &self.from_address);
        v.into_errors()
    }
}

impl BookingConfig {
    fn errors(&self) -> Vec<validation::FieldError> {
        let mut v = Validator::new();
        check_options(&mut v, "booking_config.meal_types", &self.meal_types);
        check_options(&mut v, "booking_config.room_categories", &self.room_categories);
        v.check(
            self.deposit_percentage <= 100,
            "booking_config.deposit_percentage",
            "must be between 0 and 100",
        );
        v.check(
            self.currency.len() == 3 && self.currency.chars().all(|c| c.is_ascii_alphabetic()),
            "booking_config.currency",
            "must be a three-letter currency code",
        );
        v.into_errors()
    }

    fn normalized(self) -> Self {
        Self {
            meal_types: self.meal_types.iter().map(|m| m.trim().to_string()).collect(),
            room_categories: self.room_categories.iter().map(|r| r.trim().to_string()).collect(),
            currency: self.currency.to_ascii_uppercase(),
            ..self
        }
    }

    /// An empty list means the hotel accepts any value.
    pub fn allows_room_category(&self, category: &str) -> bool {
        self.room_categories.is_empty()
            || self.room_categories.iter().any(|c| c.eq_ignore_ascii_case(category.trim()))
    }

    pub fn allows_meal_type(&self, meal: &str) -> bool {
        self.meal_types.is_empty()
            || self.meal_types.iter().any(|m| m.eq_ignore_ascii_case(meal.trim()))
    }
}

fn check_options(v: &mut Validator, field: &str, values: &[String]) {
    let mut seen: Vec<String> = Vec::new();
    for value in values {
        let key = value.trim().to_lowercase();
        if key.is_empty() {
            v.push(field, "entries may not be empty");
        } else if seen.contains(&key) {
            v.push(field, &format!("duplicate entry {}", value.trim()));
        } else {
            seen.push(key);
        }
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}

pub fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('-')
        && !value.ends_with('-')
        && value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Slug from the hotel name; names without any latin letters or digits
/// fall back to `hotel-{first 8 hex of the id}`.
pub fn derive_slug(name: &str, id: Uuid) -> String {
    let slug = slugify(name);
    if is_slug(&slug) {
        slug
    } else {
        format!("hotel-{}", &id.simple().to_string()[..8])
    }
}

pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        let mapped = match c {
            'ä' | 'Ä' => "ae",
            'ö' | 'Ö' => "oe",
            'ü' | 'Ü' => "ue",
            'ß' => "ss",
            c if c.is_ascii_alphanumeric() => {
                slug.push(c.to_ascii_lowercase());
                continue;
            }
            _ => "-",
        };
        if mapped == "-" && (slug.is_empty() || slug.ends_with('-')) {
            continue;
        }
        slug.push_str(mapped);
    }
    slug.trim_end_matches('-').to_string()
}
