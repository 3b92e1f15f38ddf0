pub mod config;
pub mod validate;

pub use config::{
    AgentsConfig, AuthFailurePolicy, ExecutionConfig, GitConfig, ProjectConfig, RecoveryConfig,
    TestConfig,
};
pub use validate::validate;
