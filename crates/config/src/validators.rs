//! Small validation helpers shared by config loading and `validator`-derived config structs.

use std::fmt;
use std::path::Path;

use validator::ValidationErrors;

use crate::ConfigError;

/// Checks that a path given on the command line or in a custom config file actually exists.
pub(crate) fn validate_path_exists(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        Ok(())
    } else {
        Err(ConfigError::IOError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Config file not found: {}", path.display()),
        )))
    }
}

/// A `validator::ValidationErrors` wrapped so it can be converted into a [`ConfigError`] and
/// printed with full field-level detail.
#[derive(Debug)]
pub struct ParsedValidationErrors(pub ValidationErrors);

impl fmt::Display for ParsedValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParsedValidationErrors {}

impl From<ValidationErrors> for ParsedValidationErrors {
    fn from(errors: ValidationErrors) -> Self {
        Self(errors)
    }
}
