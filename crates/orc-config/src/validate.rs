//! Eager config validation. Invalid values are a startup error, never a
//! silently-applied default (SPEC_FULL.md section 6).

use crate::config::ProjectConfig;
use anyhow::{Result, bail};

pub fn validate(config: &ProjectConfig) -> Result<()> {
    validate_execution(config)?;
    validate_test(config)?;
    validate_recovery(config)?;
    validate_agents(config)?;
    Ok(())
}

fn validate_execution(config: &ProjectConfig) -> Result<()> {
    if config.execution.max_concurrency < 1 {
        bail!(
            "execution.maxConcurrency must be >= 1 (got {})",
            config.execution.max_concurrency
        );
    }
    if config.execution.max_iterations < 1 {
        bail!(
            "execution.maxIterations must be >= 1 (got {})",
            config.execution.max_iterations
        );
    }
    if config.execution.timeout == 0 {
        bail!("execution.timeout must be > 0 (got 0)");
    }
    Ok(())
}

fn validate_test(config: &ProjectConfig) -> Result<()> {
    if config.test.run_after_generation && config.test.command.is_none() {
        // A missing command is fine: TestRunner auto-detects. Only a
        // zero timeout with testing enabled is a real misconfiguration.
        if config.test.timeout == 0 {
            bail!("test.timeout must be > 0 when test.runAfterGeneration is set");
        }
    }
    Ok(())
}

fn validate_recovery(config: &ProjectConfig) -> Result<()> {
    if config.recovery.max_attempts < 1 {
        bail!(
            "recovery.maxAttempts must be >= 1 (got {})",
            config.recovery.max_attempts
        );
    }
    if config.recovery.timeout == 0 {
        bail!("recovery.timeout must be > 0 (got 0)");
    }
    Ok(())
}

fn validate_agents(config: &ProjectConfig) -> Result<()> {
    if config.agents.architect.is_empty() {
        bail!("agents.architect must list at least one adapter");
    }
    if config.agents.executor.is_empty() {
        bail!("agents.executor must list at least one adapter");
    }
    if config.agents.auditor.is_empty() {
        bail!("agents.auditor must list at least one adapter");
    }
    if config.agents.consultant.is_empty() {
        bail!("agents.consultant must list at least one adapter");
    }
    Ok(())
}
