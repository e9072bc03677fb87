//! Conversion of vendor telemetry into the canonical GenAI schema
//!
//! - `index`: grouping of flattened `prefix.N.member.field` keys
//! - `openinference`: OpenInference span attributes
//! - `responses`: OpenAI Responses API input/output items

pub mod index;
pub mod openinference;
pub mod responses;

pub use self::openinference::{convert_openinference, is_openinference_span};
pub use self::responses::{convert_responses_inputs, convert_responses_outputs};
