//! Resolves project configuration into the four per-role `FallbackAdapter`
//! chains the engine drives: `agents.architect`/`executor`/`auditor`/
//! `consultant` each name an ordered list of adapters registered by name.

use orc_adapter::{Adapter, AuthFailurePolicy as AdapterAuthPolicy, FallbackAdapter};
use orc_config::{AuthFailurePolicy as ConfigAuthPolicy, ProjectConfig};
use orc_core::types::Role;
use std::collections::HashMap;
use std::sync::Arc;

/// Named, pre-built adapters available for assignment to pipeline roles.
/// Typically populated from a tool/model catalog at startup (e.g. "premium"
/// -> claude-code CliAdapter, "balanced" -> gemini-cli CliAdapter).
pub type AdapterRegistry = HashMap<String, Arc<dyn Adapter>>;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("role {role} references unknown adapter '{name}'")]
    UnknownAdapter { role: Role, name: String },
    #[error("role {role} has no adapters configured")]
    EmptyChain { role: Role },
}

fn convert_policy(policy: ConfigAuthPolicy) -> AdapterAuthPolicy {
    match policy {
        ConfigAuthPolicy::FailFast => AdapterAuthPolicy::FailFast,
        ConfigAuthPolicy::SkipToNext => AdapterAuthPolicy::SkipToNext,
    }
}

fn build_chain(
    registry: &AdapterRegistry,
    names: &[String],
    role: Role,
) -> Result<Vec<Arc<dyn Adapter>>, SchedulerError> {
    if names.is_empty() {
        return Err(SchedulerError::EmptyChain { role });
    }

    names
        .iter()
        .map(|name| {
            registry
                .get(name)
                .cloned()
                .ok_or_else(|| SchedulerError::UnknownAdapter { role, name: name.clone() })
        })
        .collect()
}

/// Build the four role-keyed `FallbackAdapter`s named by `config.agents`,
/// resolving each adapter name against `registry`.
pub fn build_role_adapters(
    config: &ProjectConfig,
    registry: &AdapterRegistry,
) -> Result<HashMap<Role, FallbackAdapter>, SchedulerError> {
    let policy = convert_policy(config.agents.auth_failure_policy);

    let mut roles = HashMap::new();
    roles.insert(
        Role::Architect,
        FallbackAdapter::new(
            build_chain(registry, &config.agents.architect, Role::Architect)?,
            Role::Architect,
            policy,
        ),
    );
    roles.insert(
        Role::Executor,
        FallbackAdapter::new(
            build_chain(registry, &config.agents.executor, Role::Executor)?,
            Role::Executor,
            policy,
        ),
    );
    roles.insert(
        Role::Auditor,
        FallbackAdapter::new(
            build_chain(registry, &config.agents.auditor, Role::Auditor)?,
            Role::Auditor,
            policy,
        ),
    );
    roles.insert(
        Role::Consultant,
        FallbackAdapter::new(
            build_chain(registry, &config.agents.consultant, Role::Consultant)?,
            Role::Consultant,
            policy,
        ),
    );

    Ok(roles)
}
