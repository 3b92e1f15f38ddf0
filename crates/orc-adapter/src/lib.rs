pub mod adapter;
pub mod cli;
pub mod error;
pub mod fallback;

pub use adapter::{Adapter, AdapterInfo, AdapterRequest, AdapterResponse};
pub use cli::CliAdapter;
pub use error::{AdapterError, AdapterErrorKind};
pub use fallback::{AuthFailurePolicy, FallbackAdapter};
