//! The `Validate` trait implemented by every configuration section

/// Checks a configuration section, describing the first problem found
pub trait Validate {
    fn validate(&self) -> Result<(), String>;

    /// Validate and prefix any error with the section it came from
    fn validate_section(&self, section: &str) -> Result<(), String> {
        self.validate()
            .map_err(|e| format!("{} config error: {}", section, e))
    }
}
