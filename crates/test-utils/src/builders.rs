#![allow(dead_code)]

use std::collections::BTreeMap;

use wasmtest::config::{ConfigFile, RawConfigFile};
use wasmtest::message::Message;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_dir(mut self, dir: &str) -> Self {
        self.config.run.dir = dir.to_string();
        self
    }

    pub fn with_command(mut self, program: &str, args: &[&str]) -> Self {
        self.config.run.program = program.to_string();
        self.config.run.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.config.run.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config.run.env = BTreeMap::new();
        self
    }

    /// Sets the run timeout and caps the install timeout to match.
    pub fn with_timeout(mut self, timeout: &str) -> Self {
        self.config.run.timeout = timeout.to_string();
        self.config.install.timeout = timeout.to_string();
        self
    }

    pub fn with_install(mut self, candidates: &[&str], command: &[&str], timeout: &str) -> Self {
        self.config.install.candidates = candidates.iter().map(|c| c.to_string()).collect();
        self.config.install.command = command.iter().map(|c| c.to_string()).collect();
        self.config.install.timeout = timeout.to_string();
        self
    }

    pub fn with_shim(mut self, enabled: bool) -> Self {
        self.config.shim.enabled = enabled;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Typical `go test -v` output for a passing suite.
pub fn passing_run() -> Vec<Message> {
    vec![
        Message::out("=== RUN   TestAdd"),
        Message::out("--- PASS: TestAdd (0.00s)"),
        Message::out("PASS"),
        Message::out("ok  \texample.com/wasm_test\t0.412s"),
        Message::exit_ok(),
    ]
}

/// Typical `go test -v` output with one failing test.
pub fn failing_run(test: &str) -> Vec<Message> {
    vec![
        Message::out(format!("=== RUN   {test}")),
        Message::out("    math_test.go:12: got 3, want 4"),
        Message::out(format!("--- FAIL: {test} (0.00s)")),
        Message::out("FAIL"),
        Message::err("exit status 1"),
        Message::exit_error("exit status 1"),
    ]
}
