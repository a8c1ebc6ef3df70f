use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use staydesk_api::auth::issue_session_token;
use staydesk_api::middleware::SessionClaims;
use staydesk_api::state::{AuthConfig, GuestSettings};
use staydesk_api::{app, AppState};
use staydesk_core::identity::Role;
use staydesk_core::memory::{MemoryDraftStore, MemoryStore, RecordingOutbox, RecordingPublisher};

const PUBLIC_BASE: &str = "https://book.example.com";
const STORAGE_BASE: &str = "https://files.example.com/uploads";

struct TestApp {
    router: Router,
    auth: AuthConfig,
    publisher: Arc<RecordingPublisher>,
    outbox: Arc<RecordingOutbox>,
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let outbox = Arc::new(RecordingOutbox::new());
    let auth = AuthConfig {
        secret: "test-session-secret".to_string(),
        expiration: 3600,
        identity_secret: "test-identity-secret".to_string(),
        cookie_secure: false,
    };

    let state = AppState {
        hotel_repo: store.clone(),
        booking_repo: store.clone(),
        link_repo: store,
        drafts: Arc::new(MemoryDraftStore::new()),
        events: publisher.clone(),
        mail: outbox.clone(),
        redis: None,
        rate_limit_per_minute: 100,
        auth: auth.clone(),
        guest: GuestSettings {
            public_base_url: PUBLIC_BASE.to_string(),
            storage_base_url: STORAGE_BASE.to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            draft_ttl_seconds: 3600,
            arrival_horizon_days: 7,
        },
    };

    TestApp {
        router: app(state),
        auth,
        publisher,
        outbox,
    }
}

impl TestApp {
    fn agency_token(&self) -> String {
        issue_session_token(&self.auth, "agency-1", "ops@agency.example", Role::Agency, None)
            .unwrap()
            .0
    }

    fn hotelier_token(&self, hotel_id: Uuid) -> String {
        issue_session_token(&self.auth, "hotelier-1", "desk@alpenhof.example", Role::Hotelier, Some(hotel_id))
            .unwrap()
            .0
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, headers, body }
    }

    async fn create_hotel(&self, name: &str) -> Value {
        let res = self
            .send(Method::POST, "/v1/agency/hotels", Some(&self.agency_token()), Some(hotel_body(name)))
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
        res.body
    }

    async fn create_booking(&self, hotel_id: &str) -> Value {
        let res = self
            .send(
                Method::POST,
                &format!("/v1/hotels/{}/bookings", hotel_id),
                Some(&self.agency_token()),
                Some(booking_body()),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
        res.body
    }

    async fn issue_link(&self, hotel_id: &str, booking_id: &str, send_email: bool) -> Value {
        let res = self
            .send(
                Method::POST,
                &format!("/v1/hotels/{}/bookings/{}/link", hotel_id, booking_id),
                Some(&self.agency_token()),
                Some(json!({ "send_email": send_email })),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "{}", res.body);
        res.body
    }
}

fn hotel_body(name: &str) -> Value {
    json!({
        "name": name,
        "branding": { "primary_color": "#1A2B3C" },
        "contact": { "email": "info@alpenhof.example", "phone": "+43 512 123456" },
        "bank": {
            "account_holder": "Alpenhof GmbH",
            "iban": "DE89 3704 0044 0532 0130 00",
            "bic": "COBADEFFXXX"
        },
        "smtp": {
            "host": "smtp.alpenhof.example",
            "port": 587,
            "username": "mailer",
            "password": "s3cret",
            "from_address": "bookings@alpenhof.example"
        },
        "booking_config": {
            "meal_types": ["Breakfast", "Half board"],
            "room_categories": ["Double", "Suite"],
            "deposit_percentage": 30,
            "currency": "EUR"
        }
    })
}

fn booking_body() -> Value {
    json!({
        "guest_first_name": "Anna",
        "guest_last_name": "Berger",
        "guest_email": "anna@example.com",
        "check_in": "2030-07-01",
        "check_out": "2030-07-08",
        "total_price_cents": 123450,
        "rooms": [{
            "category": "Double",
            "meal_type": "Breakfast",
            "adults": 2,
            "children": 1,
            "child_ages": [6]
        }]
    })
}

fn contact_form() -> Value {
    json!({
        "first_name": "Anna",
        "last_name": "Berger",
        "email": "anna@example.com",
        "phone": "+43 660 1234567",
        "birth_date": "1988-03-14",
        "nationality": "AT",
        "street": "Hauptstrasse 1",
        "postal_code": "6020",
        "city": "Innsbruck",
        "country": "AT"
    })
}

fn complete_draft(document_url: &str) -> Value {
    json!({
        "contact": contact_form(),
        "travelers": [
            { "first_name": "Bernd", "last_name": "Berger", "birth_date": "1986-05-02", "is_child": false },
            { "first_name": "Clara", "last_name": "Berger", "birth_date": "2024-01-09", "is_child": true }
        ],
        "documents": [
            { "file_type": "PASSPORT", "url": document_url, "uploaded_at": "2030-06-01T10:00:00Z" }
        ],
        "payment": { "method": "BANK_TRANSFER", "amount": "DEPOSIT" },
        "special_requests": "Late check-in",
        "arrival_time": "21:30",
        "accepted_terms": true
    })
}

fn fields(body: &Value) -> Vec<String> {
    body["fields"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["field"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let res = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "ok");
}

#[tokio::test]
async fn test_agency_routes_require_agency_session() {
    let app = test_app();

    let res = app.send(Method::GET, "/v1/agency/hotels", None, None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["success"], false);

    let res = app.send(Method::GET, "/v1/agency/hotels", Some("not-a-jwt"), None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let hotelier = app.hotelier_token(Uuid::new_v4());
    let res = app.send(Method::GET, "/v1/agency/hotels", Some(&hotelier), None).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_hotel_lifecycle() {
    let app = test_app();
    let agency = app.agency_token();

    let hotel = app.create_hotel("Alpenhof Tirol").await;
    assert_eq!(hotel["slug"], "alpenhof-tirol");
    assert_eq!(hotel["smtp"]["password"], "********");
    assert_eq!(hotel["bank"]["iban"], "DE89370400440532013000");
    let hotel_id = hotel["id"].as_str().unwrap().to_string();

    assert_eq!(app.publisher.topics().await, vec!["hotel.created".to_string()]);

    // slug is unique across tenants
    let res = app
        .send(Method::POST, "/v1/agency/hotels", Some(&agency), Some(hotel_body("Alpenhof Tirol")))
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app
        .send(Method::POST, "/v1/agency/hotels", Some(&agency), Some(json!({
            "name": "",
            "contact": { "email": "nope" }
        })))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let invalid = fields(&res.body);
    assert!(invalid.contains(&"name".to_string()));
    assert!(invalid.contains(&"contact.email".to_string()));

    let res = app.send(Method::GET, "/v1/agency/hotels", Some(&agency), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body.as_array().unwrap().len(), 1);

    let booking = app.create_booking(&hotel_id).await;
    let booking_id = booking["id"].as_str().unwrap();

    let res = app
        .send(Method::DELETE, &format!("/v1/agency/hotels/{}", hotel_id), Some(&agency), None)
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app
        .send(Method::GET, &format!("/v1/agency/hotels/{}", hotel_id), Some(&agency), None)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .send(
            Method::GET,
            &format!("/v1/hotels/{}/bookings/{}", hotel_id, booking_id),
            Some(&agency),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_hotelier_sections_follow_permissions() {
    let app = test_app();
    let agency = app.agency_token();
    let hotel = app.create_hotel("Seehotel Wien").await;
    let hotel_id = hotel["id"].as_str().unwrap().to_string();
    let own = app.hotelier_token(hotel_id.parse().unwrap());

    let res = app.send(Method::GET, &format!("/v1/hotels/{}", hotel_id), Some(&own), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["smtp"]["password"], "********");

    let stranger = app.hotelier_token(Uuid::new_v4());
    let res = app
        .send(Method::GET, &format!("/v1/hotels/{}", hotel_id), Some(&stranger), None)
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let branding = json!({ "primary_color": "#FFAA00", "welcome_text": "Servus!" });
    let uri = format!("/v1/hotels/{}/branding", hotel_id);
    let res = app.send(Method::PUT, &uri, Some(&own), Some(branding.clone())).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .send(
            Method::PUT,
            &format!("/v1/agency/hotels/{}/permissions", hotel_id),
            Some(&agency),
            Some(json!({ "can_edit_profile": true })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["permissions"]["can_edit_profile"], true);

    let res = app.send(Method::PUT, &uri, Some(&own), Some(branding)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["branding"]["welcome_text"], "Servus!");

    let res = app
        .send(Method::PUT, &uri, Some(&own), Some(json!({ "primary_color": "orange" })))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(fields(&res.body), vec!["branding.primary_color".to_string()]);

    // still locked
    let res = app
        .send(
            Method::PUT,
            &format!("/v1/hotels/{}/smtp", hotel_id),
            Some(&own),
            Some(json!({
                "host": "smtp.other.example",
                "port": 25,
                "username": "x",
                "password": "",
                "from_address": "x@other.example"
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    // agency keeps the stored password when the masked value comes back
    let res = app
        .send(
            Method::PUT,
            &format!("/v1/hotels/{}/smtp", hotel_id),
            Some(&agency),
            Some(json!({
                "host": "smtp.seehotel.example",
                "port": 465,
                "username": "mailer",
                "password": "********",
                "from_address": "bookings@seehotel.example"
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["smtp"]["host"], "smtp.seehotel.example");
    assert_eq!(res.body["smtp"]["password"], "********");
}

#[tokio::test]
async fn test_booking_crud_and_status_changes() {
    let app = test_app();
    let hotel = app.create_hotel("Alpenhof Tirol").await;
    let hotel_id = hotel["id"].as_str().unwrap().to_string();
    let token = app.hotelier_token(hotel_id.parse().unwrap());
    let base = format!("/v1/hotels/{}/bookings", hotel_id);

    let mut invalid = booking_body();
    invalid["check_out"] = json!("2030-06-01");
    invalid["rooms"][0]["category"] = json!("Penthouse");
    let res = app.send(Method::POST, &base, Some(&token), Some(invalid)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let invalid_fields = fields(&res.body);
    assert!(invalid_fields.contains(&"check_out".to_string()));
    assert!(invalid_fields.contains(&"rooms[0].category".to_string()));

    let res = app.send(Method::POST, &base, Some(&token), Some(booking_body())).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["status"], "PENDING");
    assert_eq!(res.body["currency"], "EUR");
    let booking_id = res.body["id"].as_str().unwrap().to_string();
    let booking_uri = format!("{}/{}", base, booking_id);

    let res = app
        .send(Method::PUT, &booking_uri, Some(&token), Some(json!({ "notes": "Anniversary" })))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["notes"], "Anniversary");

    let res = app
        .send(Method::GET, &format!("{}?status=PENDING", base), Some(&token), None)
        .await;
    assert_eq!(res.body.as_array().unwrap().len(), 1);
    let res = app
        .send(Method::GET, &format!("{}?status=CONFIRMED", base), Some(&token), None)
        .await;
    assert!(res.body.as_array().unwrap().is_empty());
    let res = app
        .send(Method::GET, &format!("{}?status=SOMEDAY", base), Some(&token), None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let status_uri = format!("{}/status", booking_uri);

    // reserved to the guest flow
    let res = app
        .send(Method::POST, &status_uri, Some(&token), Some(json!({ "status": "DATA_PROVIDED" })))
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app
        .send(
            Method::POST,
            &status_uri,
            Some(&token),
            Some(json!({ "status": "CONFIRMED", "notify_guest": true })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["previous_status"], "PENDING");
    assert_eq!(res.body["booking"]["status"], "CONFIRMED");
    assert_eq!(res.body["guest_notified"], true);

    let mails = app.outbox.mails().await;
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].message.to, "anna@example.com");
    assert_eq!(mails[0].smtp.host, "smtp.alpenhof.example");

    let events = app.publisher.events().await;
    let changed = events
        .iter()
        .find(|e| e.topic == "booking.status_changed")
        .expect("status event");
    let payload: Value = serde_json::from_str(&changed.payload).unwrap();
    assert_eq!(payload["from"], "PENDING");
    assert_eq!(payload["to"], "CONFIRMED");
    assert_eq!(payload["actor"], "hotelier:hotelier-1");

    // confirmed bookings are frozen
    let res = app
        .send(Method::PUT, &booking_uri, Some(&token), Some(json!({ "notes": "late" })))
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app
        .send(Method::POST, &status_uri, Some(&token), Some(json!({ "status": "PENDING" })))
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app
        .send(Method::GET, &format!("/v1/hotels/{}/stats", hotel_id), Some(&token), None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["total"], 1);
    assert_eq!(res.body["by_status"]["CONFIRMED"], 1);
    assert_eq!(res.body["secured_revenue_cents"], 123450);

    let res = app.send(Method::DELETE, &booking_uri, Some(&token), None).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    let res = app.send(Method::GET, &booking_uri, Some(&token), None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_link_is_reused_and_resent() {
    let app = test_app();
    let hotel = app.create_hotel("Alpenhof Tirol").await;
    let hotel_id = hotel["id"].as_str().unwrap().to_string();
    let booking = app.create_booking(&hotel_id).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let resend_uri = format!("/v1/hotels/{}/bookings/{}/link/resend", hotel_id, booking_id);
    let res = app.send(Method::POST, &resend_uri, Some(&app.agency_token()), None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let first = app.issue_link(&hotel_id, &booking_id, true).await;
    assert_eq!(first["reused"], false);
    assert_eq!(first["emailed"], true);
    assert_eq!(first["status"], "ACTIVE");
    let token = first["token"].as_str().unwrap();
    assert_eq!(token.len(), 32);
    assert_eq!(first["url"], format!("{}/links/{}", PUBLIC_BASE, token));

    let second = app.issue_link(&hotel_id, &booking_id, false).await;
    assert_eq!(second["reused"], true);
    assert_eq!(second["token"], first["token"]);

    let res = app.send(Method::POST, &resend_uri, Some(&app.agency_token()), None).await;
    assert_eq!(res.status, StatusCode::OK);

    let mails = app.outbox.mails().await;
    assert_eq!(mails.len(), 2);
    assert!(mails[0].message.html_body.contains(token));

    let topics = app.publisher.topics().await;
    assert_eq!(topics.iter().filter(|t| *t == "link.issued").count(), 1);
}

#[tokio::test]
async fn test_link_email_needs_smtp() {
    let app = test_app();
    let mut body = hotel_body("Pension Ohne Mail");
    body.as_object_mut().unwrap().remove("smtp");
    let res = app
        .send(Method::POST, "/v1/agency/hotels", Some(&app.agency_token()), Some(body))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let hotel_id = res.body["id"].as_str().unwrap().to_string();
    let booking = app.create_booking(&hotel_id).await;

    let res = app
        .send(
            Method::POST,
            &format!("/v1/hotels/{}/bookings/{}/link", hotel_id, booking["id"].as_str().unwrap()),
            Some(&app.agency_token()),
            Some(json!({ "send_email": true })),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(app.outbox.mails().await.is_empty());
}

#[tokio::test]
async fn test_wizard_steps_and_drafts() {
    let app = test_app();
    let hotel = app.create_hotel("Alpenhof Tirol").await;
    let hotel_id = hotel["id"].as_str().unwrap().to_string();
    let booking = app.create_booking(&hotel_id).await;
    let link = app.issue_link(&hotel_id, booking["id"].as_str().unwrap(), false).await;
    let token = link["token"].as_str().unwrap().to_string();
    let base = format!("/v1/links/{}", token);

    let res = app.send(Method::GET, &base, None, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["hotel"]["name"], "Alpenhof Tirol");
    assert!(res.body["hotel"].get("smtp").is_none());
    assert_eq!(res.body["booking"]["nights"], 7);
    assert_eq!(res.body["deposit_cents"], 37035);
    assert_eq!(res.body["draft"]["step"], "CONTACT");

    let res = app
        .send(Method::POST, &format!("{}/draft/advance", base), None, Some(json!({})))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(fields(&res.body).contains(&"contact.first_name".to_string()));

    let mut company = contact_form();
    company["is_company"] = json!(true);
    let res = app
        .send(
            Method::POST,
            &format!("{}/draft/advance", base),
            None,
            Some(json!({ "contact": company })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let missing = fields(&res.body);
    assert!(missing.contains(&"contact.company_name".to_string()));
    assert!(missing.contains(&"contact.vat_id".to_string()));

    let res = app
        .send(
            Method::POST,
            &format!("{}/draft/advance", base),
            None,
            Some(json!({ "step": "REVIEW", "contact": contact_form() })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["step"], "TRAVELERS");
    assert_eq!(res.body["step_index"], 2);

    let res = app
        .send(
            Method::POST,
            &format!("{}/draft/advance", base),
            None,
            Some(json!({
                "contact": contact_form(),
                "travelers": [
                    { "first_name": "Bernd", "last_name": "Berger", "birth_date": "1986-05-02" }
                ]
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(fields(&res.body).contains(&"travelers".to_string()));

    let res = app.send(Method::POST, &format!("{}/draft/back", base), None, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["step"], "CONTACT");

    // the guest can resume where they left
    let res = app.send(Method::GET, &base, None, None).await;
    assert_eq!(res.body["draft"]["contact"]["city"], "Innsbruck");
    assert_eq!(res.body["draft"]["travelers"][0]["first_name"], "Bernd");
}

#[tokio::test]
async fn test_upload_tickets() {
    let app = test_app();
    let hotel = app.create_hotel("Alpenhof Tirol").await;
    let hotel_id = hotel["id"].as_str().unwrap().to_string();
    let booking = app.create_booking(&hotel_id).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();
    let link = app.issue_link(&hotel_id, &booking_id, false).await;
    let uri = format!("/v1/links/{}/uploads", link["token"].as_str().unwrap());

    let res = app
        .send(
            Method::POST,
            &uri,
            None,
            Some(json!({
                "file_type": "ID_CARD",
                "filename": "../../Ausweis Vorderseite.jpg",
                "content_type": "image/jpeg",
                "size_bytes": 204800
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let path = res.body["path"].as_str().unwrap();
    assert!(path.starts_with(&format!("bookings/{}/id_card_", booking_id)));
    assert!(path.ends_with("_Ausweis_Vorderseite.jpg"));
    assert_eq!(res.body["public_url"], format!("{}/{}", STORAGE_BASE, path));

    let res = app
        .send(
            Method::POST,
            &uri,
            None,
            Some(json!({
                "file_type": "OTHER",
                "filename": "setup.exe",
                "content_type": "application/x-msdownload",
                "size_bytes": 20 * 1024 * 1024
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let rejected = fields(&res.body);
    assert!(rejected.contains(&"content_type".to_string()));
    assert!(rejected.contains(&"size_bytes".to_string()));
}

#[tokio::test]
async fn test_guest_submission_is_single_use() {
    let app = test_app();
    let hotel = app.create_hotel("Alpenhof Tirol").await;
    let hotel_id = hotel["id"].as_str().unwrap().to_string();
    let booking = app.create_booking(&hotel_id).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();
    let link = app.issue_link(&hotel_id, &booking_id, true).await;
    let token = link["token"].as_str().unwrap().to_string();
    let base = format!("/v1/links/{}", token);

    let res = app
        .send(
            Method::POST,
            &format!("{}/uploads", base),
            None,
            Some(json!({
                "file_type": "PASSPORT",
                "filename": "passport.pdf",
                "content_type": "application/pdf",
                "size_bytes": 1024
            })),
        )
        .await;
    let document_url = res.body["public_url"].as_str().unwrap().to_string();

    // a document from another booking's folder is refused
    let foreign = format!("{}/bookings/{}/passport_1_p.pdf", STORAGE_BASE, Uuid::new_v4());
    let res = app
        .send(Method::POST, &format!("{}/submit", base), None, Some(complete_draft(&foreign)))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(fields(&res.body).contains(&"documents[0].url".to_string()));

    let res = app
        .send(Method::POST, &format!("{}/submit", base), None, Some(complete_draft(&document_url)))
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["status"], "DATA_PROVIDED");
    let completion = format!("{}/links/{}/complete", PUBLIC_BASE, token);
    assert_eq!(res.body["redirect_url"], completion);

    let res = app
        .send(Method::POST, &format!("{}/submit", base), None, Some(complete_draft(&document_url)))
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app.send(Method::PUT, &format!("{}/draft", base), None, Some(json!({}))).await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app.send(Method::GET, &base, None, None).await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.headers[header::LOCATION], completion.as_str());

    let res = app
        .send(
            Method::GET,
            &format!("/v1/hotels/{}/bookings/{}", hotel_id, booking_id),
            Some(&app.agency_token()),
            None,
        )
        .await;
    assert_eq!(res.body["status"], "DATA_PROVIDED");
    assert_eq!(res.body["link_id"], link["link_id"]);
    assert_eq!(res.body["guest_data"]["primary"]["city"], "Innsbruck");
    assert_eq!(res.body["guest_data"]["travelers"].as_array().unwrap().len(), 2);
    assert_eq!(res.body["guest_data"]["payment"]["amount"], "DEPOSIT");

    // link invitation, guest receipt, hotel notification
    let mails = app.outbox.mails().await;
    assert_eq!(mails.len(), 3);
    assert_eq!(mails[1].message.to, "anna@example.com");
    assert_eq!(mails[2].message.to, "info@alpenhof.example");

    let topics = app.publisher.topics().await;
    assert!(topics.contains(&"guest.data_submitted".to_string()));
    assert!(topics.contains(&"booking.status_changed".to_string()));
}

#[tokio::test]
async fn test_unknown_links() {
    let app = test_app();

    let res = app.send(Method::GET, "/v1/links/not-a-token", None, None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .send(Method::GET, &format!("/v1/links/{}", Uuid::new_v4().simple()), None, None)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["success"], false);
}

#[tokio::test]
async fn test_session_exchange() {
    let app = test_app();
    let hotel_id = Uuid::new_v4();

    let identity = SessionClaims {
        sub: "idp|42".to_string(),
        email: "desk@alpenhof.example".to_string(),
        role: Role::Hotelier,
        hotel_id: Some(hotel_id),
        exp: (chrono::Utc::now().timestamp() + 300) as usize,
    };
    let id_token = encode(
        &Header::default(),
        &identity,
        &EncodingKey::from_secret(app.auth.identity_secret.as_bytes()),
    )
    .unwrap();

    let res = app
        .send(Method::POST, "/v1/session", None, Some(json!({ "id_token": id_token })))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["role"], "HOTELIER");
    assert_eq!(res.body["hotel_id"], hotel_id.to_string());
    let cookie = res.headers[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));

    // the cookie alone authenticates; this hotel does not exist yet
    let session_cookie = cookie.split(';').next().unwrap().to_string();
    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/v1/hotels/{}", hotel_id))
        .header(header::COOKIE, session_cookie.as_str())
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.dispatch(request).await.status, StatusCode::NOT_FOUND);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/v1/agency/hotels")
        .header(header::COOKIE, session_cookie.as_str())
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.dispatch(request).await.status, StatusCode::FORBIDDEN);

    // signed with the wrong secret
    let forged = encode(
        &Header::default(),
        &identity,
        &EncodingKey::from_secret(b"somebody-else"),
    )
    .unwrap();
    let res = app
        .send(Method::POST, "/v1/session", None, Some(json!({ "id_token": forged })))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let unbound = SessionClaims { hotel_id: None, ..identity };
    let id_token = encode(
        &Header::default(),
        &unbound,
        &EncodingKey::from_secret(app.auth.identity_secret.as_bytes()),
    )
    .unwrap();
    let res = app
        .send(Method::POST, "/v1/session", None, Some(json!({ "id_token": id_token })))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/v1/session")
        .header(header::COOKIE, session_cookie.as_str())
        .body(Body::empty())
        .unwrap();
    let res = app.dispatch(request).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    let cleared = res.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.starts_with("session="));
}

#[tokio::test]
async fn test_bookings_of_other_hotels_are_out_of_reach() {
    let app = test_app();
    let own_hotel = app.create_hotel("Alpenhof Tirol").await;
    let own_id = own_hotel["id"].as_str().unwrap().to_string();
    let other_hotel = app.create_hotel("Seehotel Wien").await;
    let other_id = other_hotel["id"].as_str().unwrap().to_string();

    let booking = app.create_booking(&other_id).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();
    let link = app.issue_link(&other_id, &booking_id, false).await;
    let link_uri = format!("/v1/links/{}", link["token"].as_str().unwrap());

    let own = app.hotelier_token(own_id.parse().unwrap());

    // through their own hotel path the foreign booking does not exist
    let res = app
        .send(
            Method::DELETE,
            &format!("/v1/hotels/{}/bookings/{}", own_id, booking_id),
            Some(&own),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    let res = app.send(Method::GET, &link_uri, None, None).await;
    assert_eq!(res.status, StatusCode::OK);

    // and the other hotel's path is guarded
    let foreign = format!("/v1/hotels/{}/bookings", other_id);
    let res = app.send(Method::GET, &foreign, Some(&own), None).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    let res = app
        .send(Method::DELETE, &format!("{}/{}", foreign, booking_id), Some(&own), None)
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    let res = app
        .send(
            Method::POST,
            &format!("{}/{}/status", foreign, booking_id),
            Some(&own),
            Some(json!({ "status": "CANCELLED" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    let res = app
        .send(Method::POST, &format!("{}/{}/link", foreign, booking_id), Some(&own), None)
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.send(Method::GET, &link_uri, None, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["hotel"]["name"], "Seehotel Wien");
}

#[tokio::test]
async fn test_links_close_when_booking_leaves_pending() {
    let app = test_app();
    let agency = app.agency_token();
    let hotel = app.create_hotel("Alpenhof Tirol").await;
    let hotel_id = hotel["id"].as_str().unwrap().to_string();

    for next in ["CANCELLED", "CONFIRMED"] {
        let booking = app.create_booking(&hotel_id).await;
        let booking_id = booking["id"].as_str().unwrap().to_string();
        let booking_uri = format!("/v1/hotels/{}/bookings/{}", hotel_id, booking_id);
        let link = app.issue_link(&hotel_id, &booking_id, false).await;
        let link_uri = format!("/v1/links/{}", link["token"].as_str().unwrap());

        let res = app
            .send(Method::POST, &format!("{}/status", booking_uri), Some(&agency), Some(json!({ "status": next })))
            .await;
        assert_eq!(res.status, StatusCode::OK, "{}", res.body);

        let res = app.send(Method::GET, &link_uri, None, None).await;
        assert_eq!(res.status, StatusCode::CONFLICT, "open after {}", next);
        let res = app
            .send(Method::PUT, &format!("{}/draft", link_uri), None, Some(json!({ "contact": contact_form() })))
            .await;
        assert_eq!(res.status, StatusCode::CONFLICT);
        let res = app
            .send(Method::POST, &format!("{}/submit", link_uri), None, Some(complete_draft("https://x")))
            .await;
        assert_eq!(res.status, StatusCode::CONFLICT);

        let res = app
            .send(Method::POST, &format!("{}/link", booking_uri), Some(&agency), None)
            .await;
        assert_eq!(res.status, StatusCode::CONFLICT, "issue after {}", next);
        let res = app
            .send(Method::POST, &format!("{}/link/resend", booking_uri), Some(&agency), None)
            .await;
        assert_eq!(res.status, StatusCode::CONFLICT);

        let res = app.send(Method::GET, &booking_uri, Some(&agency), None).await;
        assert_eq!(res.body["status"], next);
        assert!(res.body["guest_data"].is_null());
    }
}

#[tokio::test]
async fn test_hotels_with_non_latin_names() {
    let app = test_app();

    let first = app.create_hotel("東京ホテル").await;
    let second = app.create_hotel("東京ホテル").await;

    let first_slug = first["slug"].as_str().unwrap();
    let second_slug = second["slug"].as_str().unwrap();
    assert!(first_slug.starts_with("hotel-"));
    assert!(second_slug.starts_with("hotel-"));
    assert_ne!(first_slug, second_slug);
}

#[tokio::test]
async fn test_concurrent_submissions_have_one_winner() {
    let app = test_app();
    let hotel = app.create_hotel("Alpenhof Tirol").await;
    let hotel_id = hotel["id"].as_str().unwrap().to_string();
    let booking = app.create_booking(&hotel_id).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();
    let link = app.issue_link(&hotel_id, &booking_id, false).await;
    let base = format!("/v1/links/{}", link["token"].as_str().unwrap());

    let res = app
        .send(
            Method::POST,
            &format!("{}/uploads", base),
            None,
            Some(json!({
                "file_type": "PASSPORT",
                "filename": "passport.pdf",
                "content_type": "application/pdf",
                "size_bytes": 1024
            })),
        )
        .await;
    let document_url = res.body["public_url"].as_str().unwrap().to_string();
    let submit_uri = format!("{}/submit", base);

    let (a, b) = tokio::join!(
        app.send(Method::POST, &submit_uri, None, Some(complete_draft(&document_url))),
        app.send(Method::POST, &submit_uri, None, Some(complete_draft(&document_url))),
    );
    let mut statuses = vec![a.status.as_u16(), b.status.as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![200, 409]);

    let submitted = app
        .publisher
        .topics()
        .await
        .into_iter()
        .filter(|t| t == "guest.data_submitted")
        .count();
    assert_eq!(submitted, 1);

    let res = app.send(Method::GET, &base, None, None).await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
}
