pub mod fake_smtp;

use simplelog::{Config, LevelFilter, SimpleLogger};

/// Safe to call from every test; only the first call installs the logger.
pub fn setup_logging() {
    let _ = SimpleLogger::init(LevelFilter::Debug, Config::default());
}

/// Sets an environment variable, restoring the previous value on drop.
pub struct TemporaryEnv(&'static str, Option<String>);

impl TemporaryEnv {
    pub fn new(key: &'static str, value: impl AsRef<str>) -> Self {
        let old_value = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        Self(key, old_value)
    }
}

impl Drop for TemporaryEnv {
    fn drop(&mut self) {
        if let Some(value) = self.1.as_ref() {
            std::env::set_var(self.0, value);
        } else {
            std::env::remove_var(self.0);
        }
    }
}
