use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{CarrierError, Result};
use crate::plan::Action;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = CarrierError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.scheduler,
            raw.concurrency,
            raw.runners,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_scheduler(cfg)?;
    validate_concurrency(cfg)?;
    validate_runners(cfg)?;
    Ok(())
}

fn validate_scheduler(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scheduler.heartbeat_interval_ms == 0 {
        return Err(CarrierError::ConfigError(
            "[scheduler].heartbeat_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.scheduler.failover_file.trim().is_empty() {
        return Err(CarrierError::ConfigError(
            "[scheduler].failover_file must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_concurrency(cfg: &RawConfigFile) -> Result<()> {
    if cfg.concurrency.default == 0 {
        return Err(CarrierError::ConfigError(
            "[concurrency].default must be >= 1 (got 0)".to_string(),
        ));
    }
    for (action, ceiling) in &cfg.concurrency.actions {
        if action.is_validation() {
            return Err(CarrierError::ConfigError(format!(
                "[concurrency.actions].{} is not allowed: {} is never throttled",
                action,
                Action::CompareResults
            )));
        }
        if *ceiling == 0 {
            return Err(CarrierError::ConfigError(format!(
                "[concurrency.actions].{action} must be >= 1 (got 0)"
            )));
        }
    }
    Ok(())
}

fn validate_runners(cfg: &RawConfigFile) -> Result<()> {
    for (key, cmd) in [
        ("source", &cfg.runners.source),
        ("destination", &cfg.runners.destination),
    ] {
        if cmd.trim().is_empty() {
            return Err(CarrierError::ConfigError(format!(
                "[runners].{key} must not be empty"
            )));
        }
    }
    Ok(())
}
