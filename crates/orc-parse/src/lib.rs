//! Free-form model output -> structured artifacts: plan parsing, code
//! sanitization, syntax validation, and audit-response parsing.

pub mod audit;
pub mod plan;
pub mod sanitize;
pub mod syntax;

pub use audit::parse_audit_response;
pub use plan::parse_plan;
pub use sanitize::sanitize;
pub use syntax::{looks_like_code, validate_syntax, SyntaxCheck};
