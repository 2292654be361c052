//! fsmgen - declarative state machine checker
//!
//! Reads a timer/event state machine specification, loads it into a typed
//! model and certifies it before any code is generated from it.
//!
//! ```no_run
//! use fsmgen::{CheckConfig, Checker};
//!
//! let text = std::fs::read_to_string("door.json")?;
//! let machine = Checker::new(CheckConfig::from_env()).check_str(&text)?;
//! println!("{} states, checksum {}", machine.states().len(), machine.checksum()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;

pub use config::{CheckConfig, ChecksConfig, ConfigError, ReaderConfig};
pub use fsmgen_core::{
    parse, validate, CallbackName, CallbackShape, CoreError, ParseError, ParseErrorKind, Pass,
    StateMachine, ValidationError, Validator, Violation, ViolationKind,
};
pub use fsmgen_token::{read_str, ReadError, Token};

/// Runs the reader, loader and every enabled validation pass.
#[derive(Debug, Clone, Default)]
pub struct Checker {
    config: CheckConfig,
}

impl Checker {
    pub fn new(config: CheckConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Reads, loads and validates specification text.
    pub fn check_str(&self, text: &str) -> Result<StateMachine, CoreError> {
        let token = read_str(text, &self.config.reader.options())?;
        self.check_token(&token)
    }

    /// Loads and validates an already parsed JSON document.
    pub fn check_value(&self, value: &serde_json::Value) -> Result<StateMachine, CoreError> {
        self.check_token(&Token::from_value(value))
    }

    /// Loads and validates a token tree.
    pub fn check_token(&self, token: &Token) -> Result<StateMachine, CoreError> {
        let machine = parse(token)?;
        self.run_passes(&machine)?;
        Ok(machine)
    }

    /// Runs the enabled passes and returns the union of their violations.
    pub fn run_passes(&self, machine: &StateMachine) -> Result<(), ValidationError> {
        let checks = &self.config.checks;
        let validator = Validator::new(machine);
        let mut violations = Vec::new();

        for pass in [Pass::Paths, Pass::UnusedTimers, Pass::CallbackNames] {
            let enabled = match pass {
                Pass::Paths => checks.paths,
                Pass::UnusedTimers => checks.unused_timers,
                Pass::CallbackNames => checks.callback_names,
            };
            if !enabled {
                tracing::debug!("Skipping {:?} check", pass);
                continue;
            }

            let result = match pass {
                Pass::Paths => validator.validate_paths(),
                Pass::UnusedTimers => validator.check_unused_timers(),
                Pass::CallbackNames => validator.check_callback_names(),
            };
            match result {
                Ok(()) => tracing::info!("{:?} check passed", pass),
                Err(err) => {
                    tracing::info!("{:?} check found {} violations", pass, err.len());
                    violations.extend(err.into_violations());
                }
            }
        }

        ValidationError::check(violations)
    }
}
