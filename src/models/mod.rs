//! Data models for the GIKonnect application.
//!
//! Field names serialize in camelCase to match the web client.

mod event;
mod food;
mod otp;
mod revision;
mod timetable;
mod user;

pub use event::*;
pub use food::*;
pub use otp::*;
pub use revision::*;
pub use timetable::*;
pub use user::*;
