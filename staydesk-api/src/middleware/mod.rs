pub mod auth;

pub use auth::{agency_guard, hotel_guard, SessionClaims, SESSION_COOKIE};
