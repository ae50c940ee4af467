//! Client and metrics configuration.

/// Default maximum key size in bytes (memcached default is 250).
pub const DEFAULT_MAX_KEY_LEN: usize = 250;

/// Default maximum number of keys in a multi-GET command (batch size).
pub const DEFAULT_MAX_KEYS: usize = 1024;

/// Default maximum value size in bytes, the largest data block the reply
/// parser accepts.
pub const DEFAULT_MAX_VALUE_LEN: usize = protocol_memcache::MAX_VALUE_DATA_LEN;

/// Default namespace prefixed to every metric name.
pub const DEFAULT_NAMESPACE: &str = "memcache";

/// Configuration for [`MemcacheClient`](crate::MemcacheClient).
#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    /// Maximum key size in bytes.
    pub max_key_len: usize,
    /// Maximum number of keys in a multi-GET command.
    pub max_keys: usize,
    /// Maximum value size in bytes for storage commands. Larger values are
    /// rejected before they reach the transport.
    pub max_value_len: usize,
    /// Reject keys that are empty, too long, or contain whitespace or
    /// control characters before they reach the transport.
    pub validate_keys: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    /// Create a new client config with default values.
    pub const fn new() -> Self {
        Self {
            max_key_len: DEFAULT_MAX_KEY_LEN,
            max_keys: DEFAULT_MAX_KEYS,
            max_value_len: DEFAULT_MAX_VALUE_LEN,
            validate_keys: true,
        }
    }

    /// Set the maximum key length.
    pub const fn max_key_len(mut self, len: usize) -> Self {
        self.max_key_len = len;
        self
    }

    /// Set the maximum number of keys in a multi-GET.
    pub const fn max_keys(mut self, max: usize) -> Self {
        self.max_keys = max;
        self
    }

    /// Set the maximum value size for storage commands.
    pub const fn max_value_len(mut self, len: usize) -> Self {
        self.max_value_len = len;
        self
    }

    /// Enable or disable key validation.
    pub const fn validate_keys(mut self, validate: bool) -> Self {
        self.validate_keys = validate;
        self
    }
}

/// Configuration for [`MetricsRegistry`](crate::MetricsRegistry).
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Prefix for every metric name: `<namespace>.<operation>.<metric>`.
    pub namespace: String,
    /// Latency histogram grouping power (relative error is `2^-p`).
    pub latency_grouping_power: u8,
    /// Latency histogram max value power; values up to `2^n - 1` nanoseconds.
    pub latency_max_value_power: u8,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            latency_grouping_power: 7,
            latency_max_value_power: 64,
        }
    }
}

impl MetricsConfig {
    /// Default config under a different namespace.
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.max_key_len, 250);
        assert_eq!(config.max_keys, 1024);
        assert_eq!(config.max_value_len, 1024 * 1024);
        assert!(config.validate_keys);
    }

    #[test]
    fn client_builder() {
        let config = ClientConfig::new()
            .max_key_len(16)
            .max_keys(2)
            .max_value_len(64)
            .validate_keys(false);
        assert_eq!(config.max_key_len, 16);
        assert_eq!(config.max_keys, 2);
        assert_eq!(config.max_value_len, 64);
        assert!(!config.validate_keys);
    }

    #[test]
    fn metrics_namespace() {
        assert_eq!(MetricsConfig::default().namespace, "memcache");
        let config = MetricsConfig::with_namespace("app.cache");
        assert_eq!(config.namespace, "app.cache");
        assert_eq!(config.latency_grouping_power, 7);
    }
}
