pub mod deadline;
pub mod json;
