//! Configuration for tntdriver
//!
//! Connection target and socket settings with sensible defaults.

use std::time::Duration;

use crate::error::{DriverError, Result};

/// Connection configuration for a single session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Target
    // -------------------------------------------------------------------------
    /// Server host name or IP address
    pub host: String,

    /// Server port
    pub port: u16,

    // -------------------------------------------------------------------------
    // Credentials
    // -------------------------------------------------------------------------
    /// User name (not negotiated by the driver)
    pub user: Option<String>,

    /// Password (not negotiated by the driver)
    pub password: Option<String>,

    // -------------------------------------------------------------------------
    // Socket Configuration
    // -------------------------------------------------------------------------
    /// Connect timeout (milliseconds, 0 = OS default)
    pub connect_timeout_ms: u64,

    /// Read timeout (milliseconds, 0 = block indefinitely)
    pub read_timeout_ms: u64,

    /// Write timeout (milliseconds, 0 = block indefinitely)
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3301,
            user: None,
            password: None,
            connect_timeout_ms: 0,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Build a config from named options, starting from the defaults.
    ///
    /// Recognized names: `host`, `port`, `user`, `password`,
    /// `connect_timeout_ms`, `read_timeout_ms`, `write_timeout_ms`.
    pub fn from_options<I, K, V>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Config::default();
        for (name, value) in options {
            config.set_option(name.as_ref(), value.as_ref())?;
        }
        Ok(config)
    }

    /// Set a single named option
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "host" => self.host = value.to_string(),
            "port" => self.port = parse_option(name, value)?,
            "user" => self.user = Some(value.to_string()),
            "password" => self.password = Some(value.to_string()),
            "connect_timeout_ms" => self.connect_timeout_ms = parse_option(name, value)?,
            "read_timeout_ms" => self.read_timeout_ms = parse_option(name, value)?,
            "write_timeout_ms" => self.write_timeout_ms = parse_option(name, value)?,
            _ => {
                return Err(DriverError::Config(format!("unknown option '{}'", name)));
            }
        }
        Ok(())
    }

    /// `host:port` form of the target
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        millis(self.write_timeout_ms)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn parse_option<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        DriverError::Config(format!("invalid value '{}' for option '{}'", value, name))
    })
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the user name
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.user = Some(user.into());
        self
    }

    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
