//! Email bodies for the booking flow. Delivery is someone else's job: a
//! rendered message is wrapped with the tenant's SMTP settings and handed to
//! a `MailOutbox`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::guest::{GuestData, PaymentAmount, PaymentMethod};
use crate::hotel::{Hotel, SmtpSettings};
use crate::{CoreError, CoreResult};

const DEFAULT_COLOR: &str = "#2F4858";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub reply_to: Option<String>,
}

/// Envelope consumed by the SMTP relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMail {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub from_name: String,
    pub smtp: SmtpSettings,
    pub message: EmailMessage,
    pub created_at: DateTime<Utc>,
}

impl OutboundMail {
    pub fn for_hotel(hotel: &Hotel, message: EmailMessage) -> CoreResult<Self> {
        let smtp = hotel.smtp.clone().ok_or(CoreError::SmtpNotConfigured(hotel.id))?;
        Ok(Self {
            id: Uuid::new_v4(),
            hotel_id: hotel.id,
            from_name: hotel.sender_name(),
            smtp,
            message,
            created_at: Utc::now(),
        })
    }
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn format_money(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    format!("{}{}.{:02} {}", sign, cents / 100, cents % 100, currency)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Short code guests put on their bank transfer.
pub fn payment_reference(booking: &Booking) -> String {
    booking.id.simple().to_string()[..8].to_ascii_uppercase()
}

fn layout(hotel: &Hotel, heading: &str, inner_html: &str) -> String {
    let color = hotel.branding.primary_color.as_deref().unwrap_or(DEFAULT_COLOR);
    let logo = hotel
        .branding
        .logo_url
        .as_deref()
        .map(|url| {
            format!(
                "<img src=\"{}\" alt=\"{}\" style=\"max-height:60px\"/>",
                escape_html(url),
                escape_html(&hotel.name)
            )
        })
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html><html><body style=\"font-family:sans-serif;color:#222\">\
<div style=\"border-top:6px solid {color};padding:16px\">{logo}<h2 style=\"color:{color}\">{heading}</h2>{inner}\
<hr/><p style=\"font-size:12px;color:#777\">{name} &middot; {email}</p></div></body></html>",
        color = escape_html(color),
        logo = logo,
        heading = escape_html(heading),
        inner = inner_html,
        name = escape_html(&hotel.name),
        email = escape_html(&hotel.contact.email),
    )
}

fn stay_lines(booking: &Booking) -> Vec<(String, String)> {
    let rooms = booking
        .rooms
        .iter()
        .map(|r| match &r.meal_type {
            Some(meal) => format!("{} ({})", r.category, meal),
            None => r.category.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ");
    vec![
        ("Arrival".to_string(), format_date(booking.check_in)),
        ("Departure".to_string(), format_date(booking.check_out)),
        ("Nights".to_string(), booking.nights().to_string()),
        ("Rooms".to_string(), rooms),
        ("Guests".to_string(), booking.guest_count().to_string()),
        ("Total".to_string(), format_money(booking.total_price_cents, &booking.currency)),
    ]
}

fn html_table(rows: &[(String, String)]) -> String {
    let body: String = rows
        .iter()
        .map(|(k, v)| format!("<tr><td><b>{}</b></td><td>{}</td></tr>", escape_html(k), escape_html(v)))
        .collect();
    format!("<table cellpadding=\"4\">{}</table>", body)
}

fn text_table(rows: &[(String, String)]) -> String {
    rows.iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

fn guest_address(booking: &Booking) -> CoreResult<String> {
    booking
        .guest_email
        .as_ref()
        .map(|e| e.expose().clone())
        .ok_or_else(|| CoreError::invalid("guest_email", "is required to email the guest"))
}

/// Invitation carrying the wizard link.
pub fn booking_link_email(hotel: &Hotel, booking: &Booking, link_url: &str) -> CoreResult<EmailMessage> {
    let to = guest_address(booking)?;
    let rows = stay_lines(booking);
    let greeting = format!("Dear {},", booking.guest_name());
    let intro = hotel
        .branding
        .welcome_text
        .clone()
        .unwrap_or_else(|| format!("thank you for booking with {}.", hotel.name));

    let inner = format!(
        "<p>{}</p><p>{}</p>{}<p>Please complete your stay details here:</p>\
<p><a href=\"{}\" style=\"font-weight:bold\">Complete your booking</a></p>\
<p style=\"font-size:12px\">This link can be used once.</p>",
        escape_html(&greeting),
        escape_html(&intro),
        html_table(&rows),
        escape_html(link_url),
    );

    Ok(EmailMessage {
        to,
        subject: format!("Your stay at {}: please complete your details", hotel.name),
        html_body: layout(hotel, "Your booking", &inner),
        text_body: format!(
            "{}\n\n{}\n\n{}\n\nComplete your stay details: {}\nThis link can be used once.\n",
            greeting,
            intro,
            text_table(&rows),
            link_url
        ),
        reply_to: Some(hotel.contact.email.clone()),
    })
}

fn payment_lines(hotel: &Hotel, booking: &Booking, data: &GuestData) -> Vec<(String, String)> {
    let due = data.amount_due_cents(booking.total_price_cents, hotel.booking_config.deposit_percentage);
    match data.payment.method {
        PaymentMethod::OnSite => vec![(
            "Payment".to_string(),
            format!("{} on arrival", format_money(booking.total_price_cents, &booking.currency)),
        )],
        PaymentMethod::BankTransfer => {
            let label = match data.payment.amount {
                PaymentAmount::Full => "Amount due",
                PaymentAmount::Deposit => "Deposit due",
            };
            let mut rows = vec![
                (label.to_string(), format_money(due, &booking.currency)),
                ("Reference".to_string(), payment_reference(booking)),
            ];
            if let Some(bank) = &hotel.bank {
                rows.push(("Account holder".to_string(), bank.account_holder.clone()));
                rows.push(("IBAN".to_string(), bank.formatted_iban()));
                if let Some(bic) = &bank.bic {
                    rows.push(("BIC".to_string(), bic.clone()));
                }
                if let Some(name) = &bank.bank_name {
                    rows.push(("Bank".to_string(), name.clone()));
                }
            }
            rows
        }
    }
}

/// Receipt to the guest after submission.
pub fn guest_confirmation_email(hotel: &Hotel, booking: &Booking, data: &GuestData) -> EmailMessage {
    let stay = stay_lines(booking);
    let payment = payment_lines(hotel, booking, data);
    let greeting = format!("Dear {} {},", data.primary.first_name, data.primary.last_name);

    let inner = format!(
        "<p>{}</p><p>we have received your details. Summary of your stay:</p>{}<h3>Payment</h3>{}",
        escape_html(&greeting),
        html_table(&stay),
        html_table(&payment),
    );

    EmailMessage {
        to: data.primary.email.expose().clone(),
        subject: format!("{}: we received your details", hotel.name),
        html_body: layout(hotel, "Thank you", &inner),
        text_body: format!(
            "{}\n\nwe have received your details. Summary of your stay:\n\n{}\n\nPayment\n{}\n",
            greeting,
            text_table(&stay),
            text_table(&payment)
        ),
        reply_to: Some(hotel.contact.email.clone()),
    }
}

/// Heads-up to the hotel inbox. Personal data stays in the admin view.
pub fn hotel_notification_email(hotel: &Hotel, booking: &Booking, data: &GuestData) -> EmailMessage {
    let mut rows = stay_lines(booking);
    rows.insert(0, ("Guest".to_string(), booking.guest_name()));
    rows.push(("Travelers".to_string(), data.party_size().to_string()));
    rows.push(("Documents".to_string(), data.documents.len().to_string()));
    rows.push((
        "Payment".to_string(),
        match (data.payment.method, data.payment.amount) {
            (PaymentMethod::OnSite, _) => "on site".to_string(),
            (PaymentMethod::BankTransfer, PaymentAmount::Full) => "bank transfer, full amount".to_string(),
            (PaymentMethod::BankTransfer, PaymentAmount::Deposit) => "bank transfer, deposit".to_string(),
        },
    ));
    if let Some(time) = data.arrival_time {
        rows.push(("Arrival time".to_string(), time.format("%H:%M").to_string()));
    }
    if let Some(requests) = &data.special_requests {
        rows.push(("Special requests".to_string(), requests.clone()));
    }

    let inner = format!(
        "<p>Guest data was submitted for booking {}.</p>{}",
        escape_html(&payment_reference(booking)),
        html_table(&rows)
    );

    EmailMessage {
        to: hotel.contact.email.clone(),
        subject: format!("Guest data received: {}", booking.guest_name()),
        html_body: layout(hotel, "New guest data", &inner),
        text_body: format!(
            "Guest data was submitted for booking {}.\n\n{}\n",
            payment_reference(booking),
            text_table(&rows)
        ),
        reply_to: Some(data.primary.email.expose().clone()),
    }
}

/// Guest notice for the statuses a guest cares about; `None` otherwise.
pub fn status_changed_email(hotel: &Hotel, booking: &Booking) -> CoreResult<Option<EmailMessage>> {
    let (subject, sentence) = match booking.status {
        BookingStatus::Confirmed => ("is confirmed", "your booking is confirmed. We look forward to welcoming you."),
        BookingStatus::PartialPayment => ("payment received", "we have received your deposit. Thank you."),
        BookingStatus::Cancelled => ("was cancelled", "your booking has been cancelled."),
        _ => return Ok(None),
    };
    let to = guest_address(booking)?;
    let rows = stay_lines(booking);
    let greeting = format!("Dear {},", booking.guest_name());

    Ok(Some(EmailMessage {
        to,
        subject: format!("Your booking at {} {}", hotel.name, subject),
        html_body: layout(
            hotel,
            booking.status.label(),
            &format!("<p>{}</p><p>{}</p>{}", escape_html(&greeting), escape_html(sentence), html_table(&rows)),
        ),
        text_body: format!("{}\n\n{}\n\n{}\n", greeting, sentence, text_table(&rows)),
        reply_to: Some(hotel.contact.email.clone()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::tests::{sample_booking, sample_config};
    use crate::hotel::tests::sample_new_hotel;
    use crate::wizard::tests::{complete_draft, BASE};
    use crate::wizard::WizardContext;

    fn fixtures() -> (Hotel, Booking, GuestData) {
        let hotel = Hotel::create(sample_new_hotel()).unwrap();
        let mut booking = sample_booking();
        booking.hotel_id = hotel.id;
        let config = sample_config();
        let ctx = WizardContext {
            booking: &booking,
            config: &config,
            has_bank_details: true,
            storage_base_url: BASE,
        };
        let data = complete_draft(&booking).into_guest_data(&ctx, Utc::now()).unwrap();
        (hotel, booking, data)
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"Tom & Jerry's\"</b>"), "&lt;b&gt;&quot;Tom &amp; Jerry&#39;s&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(123_450, "EUR"), "1234.50 EUR");
        assert_eq!(format_money(5, "CHF"), "0.05 CHF");
    }

    #[test]
    fn test_link_email_requires_guest_address() {
        let (hotel, mut booking, _) = fixtures();
        let mail = booking_link_email(&hotel, &booking, "https://guest.example/links/abc").unwrap();
        assert_eq!(mail.to, "anna@example.com");
        assert!(mail.html_body.contains("https://guest.example/links/abc"));
        assert!(mail.text_body.contains("01.07.2030"));
        assert!(mail.html_body.contains("#1A2B3C"));

        booking.guest_email = None;
        assert!(booking_link_email(&hotel, &booking, "x").is_err());
    }

    #[test]
    fn test_link_email_escapes_guest_input() {
        let (hotel, mut booking, _) = fixtures();
        booking.guest_first_name = "<script>".to_string();
        let mail = booking_link_email(&hotel, &booking, "https://guest.example").unwrap();
        assert!(!mail.html_body.contains("<script>"));
        assert!(mail.html_body.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_confirmation_contains_bank_transfer_details() {
        let (hotel, booking, data) = fixtures();
        let mail = guest_confirmation_email(&hotel, &booking, &data);
        assert!(mail.text_body.contains("Deposit due: 370.35 EUR"));
        assert!(mail.text_body.contains("IBAN: DE89 3704 0044 0532 0130 00"));
        assert!(mail.text_body.contains(&payment_reference(&booking)));
    }

    #[test]
    fn test_hotel_notification_goes_to_hotel_inbox() {
        let (hotel, booking, data) = fixtures();
        let mail = hotel_notification_email(&hotel, &booking, &data);
        assert_eq!(mail.to, "info@alpenhof.example");
        assert_eq!(mail.reply_to.as_deref(), Some("anna@example.com"));
        assert!(mail.text_body.contains("Arrival time: 21:30"));
    }

    #[test]
    fn test_status_email_only_for_guest_facing_statuses() {
        let (hotel, mut booking, _) = fixtures();
        booking.status = BookingStatus::Completed;
        assert!(status_changed_email(&hotel, &booking).unwrap().is_none());

        booking.status = BookingStatus::Confirmed;
        let mail = status_changed_email(&hotel, &booking).unwrap().unwrap();
        assert!(mail.subject.ends_with("is confirmed"));
    }

    #[test]
    fn test_outbound_requires_smtp() {
        let (mut hotel, booking, _) = fixtures();
        let message = booking_link_email(&hotel, &booking, "https://guest.example").unwrap();
        let outbound = OutboundMail::for_hotel(&hotel, message.clone()).unwrap();
        assert_eq!(outbound.from_name, "Alpenhof Tirol");

        hotel.smtp = None;
        assert!(matches!(
            OutboundMail::for_hotel(&hotel, message),
            Err(CoreError::SmtpNotConfigured(_))
        ));
    }
}
