// src/config/validate.rs

use tracing::warn;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, RawConfigFile, normalize_dir};
use crate::errors::{Result, WasmtestError};
use crate::exec::ProcessSpec;
use crate::install::InstallConfig;

/// Variables the run environment is expected to set.
const TARGET_ENV_VARS: [&str; 2] = ["GOOS", "GOARCH"];

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = WasmtestError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_install(&raw)?;
        validate_run(&raw)?;

        let install_timeout = duration_field("[install].timeout", &raw.install.timeout)?;
        let run_timeout = duration_field("[run].timeout", &raw.run.timeout)?;
        let drain_grace = duration_field("[run].drain_grace", &raw.run.drain_grace)?;

        if install_timeout.is_zero() {
            return Err(config_error("[install].timeout must be greater than zero"));
        }
        if run_timeout.is_zero() {
            return Err(config_error("[run].timeout must be greater than zero"));
        }
        if install_timeout > run_timeout {
            return Err(config_error(format!(
                "[install].timeout ({install_timeout:?}) must not exceed [run].timeout ({run_timeout:?})"
            )));
        }

        warn_missing_target_env(&raw);

        let install = InstallConfig {
            candidates: raw.install.candidates,
            command: raw.install.command,
            timeout: install_timeout,
        };
        let process = ProcessSpec {
            program: raw.run.program,
            args: raw.run.args,
            env: raw.run.env.into_iter().collect(),
            dir: Some(normalize_dir(&raw.run.dir)),
            drain_grace,
        };

        Ok(ConfigFile::new_unchecked(
            install,
            process,
            run_timeout,
            raw.shim.enabled,
        ))
    }
}

fn validate_install(cfg: &RawConfigFile) -> Result<()> {
    if cfg.install.candidates.is_empty() {
        return Err(config_error("[install].candidates must list at least one executable"));
    }
    if let Some(blank) = cfg.install.candidates.iter().find(|c| c.trim().is_empty()) {
        return Err(config_error(format!(
            "[install].candidates contains a blank name ({blank:?})"
        )));
    }
    if cfg.install.command.first().is_none_or(|p| p.trim().is_empty()) {
        return Err(config_error("[install].command must start with a program name"));
    }
    Ok(())
}

fn validate_run(cfg: &RawConfigFile) -> Result<()> {
    if cfg.run.program.trim().is_empty() {
        return Err(config_error("[run].program must not be empty"));
    }
    if let Some(key) = cfg.run.env.keys().find(|k| k.is_empty() || k.contains('=')) {
        return Err(config_error(format!(
            "[run.env] has an invalid variable name {key:?}"
        )));
    }
    Ok(())
}

/// Absence is a caller mistake the runner does not check, so only warn.
fn warn_missing_target_env(cfg: &RawConfigFile) {
    for var in TARGET_ENV_VARS {
        if !cfg.run.env.contains_key(var) {
            warn!(var, "[run.env] does not set {var}; the test binary may not target wasm");
        }
    }
}

fn duration_field(field: &str, value: &str) -> Result<std::time::Duration> {
    parse_duration(value).map_err(|e| config_error(format!("{field}: {e}")))
}

fn config_error(msg: impl Into<String>) -> WasmtestError {
    WasmtestError::ConfigError(msg.into())
}
