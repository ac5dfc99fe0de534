//! Command safety gate and injection actuator.
//!
//! Validation is conservative: a rejected command is never injected, and
//! there is no "dangerous but allowed with confirmation" tier.

mod injector;
mod validator;

pub use injector::{CommandInjector, InjectionResult};
pub use validator::{validate_command, CommandValidation};
