use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capture duration used when the host never supplies one.
pub const DEFAULT_DURATION_MS: u64 = 5_000;

/// Configuration delivered by the host on every render.
///
/// Every field defaults so a partial payload still parses; the host only
/// guarantees the shape `{disabled, args: {duration}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Disables user interaction without affecting an in-flight capture.
    pub disabled: bool,
    pub args: RenderArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderArgs {
    /// Capture duration in milliseconds for the next activation.
    pub duration: u64,
}

impl Default for RenderArgs {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION_MS,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            args: RenderArgs::default(),
        }
    }
}

impl RenderConfig {
    /// Effective capture duration. A zero duration from the host is invalid
    /// and falls back to the default.
    pub fn capture_duration(&self) -> Duration {
        if self.args.duration == 0 {
            log::warn!(
                "Configured duration is 0 ms, falling back to {} ms",
                DEFAULT_DURATION_MS
            );
            return Duration::from_millis(DEFAULT_DURATION_MS);
        }
        Duration::from_millis(self.args.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_parses_to_defaults() {
        let config: RenderConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.disabled);
        assert_eq!(config.args.duration, DEFAULT_DURATION_MS);
    }

    #[test]
    fn partial_args_parse() {
        let config: RenderConfig =
            serde_json::from_str(r#"{"disabled":true,"args":{}}"#).unwrap();
        assert!(config.disabled);
        assert_eq!(config.args.duration, DEFAULT_DURATION_MS);
    }

    #[test]
    fn full_payload_parses() {
        let config: RenderConfig =
            serde_json::from_str(r#"{"disabled":false,"args":{"duration":1000}}"#).unwrap();
        assert_eq!(config.capture_duration(), Duration::from_millis(1000));
    }

    #[test]
    fn zero_duration_falls_back_to_default() {
        let config: RenderConfig =
            serde_json::from_str(r#"{"args":{"duration":0}}"#).unwrap();
        assert_eq!(
            config.capture_duration(),
            Duration::from_millis(DEFAULT_DURATION_MS)
        );
    }
}
