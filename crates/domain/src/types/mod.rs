//! Request and response values exchanged with the issuance API

pub mod request;
pub mod response;

// Re-export request/response types for convenience
pub use request::{Accept, HttpMethod, MultipartPart, RequestBody, RequestSpec};
pub use response::{AsyncMarker, ResponseBody, TypedResponse};
