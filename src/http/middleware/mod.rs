//! Pipeline stage middleware owned by the HTTP layer.

pub mod body;
pub mod errors;
pub mod form;
pub mod uploads;

pub use body::{form_body_middleware, json_body_middleware, BodyLimits, ParsedBody};
pub use errors::{error_stage_middleware, panic_response};
pub use uploads::mount_uploads;
