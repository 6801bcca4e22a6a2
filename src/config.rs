//! Engine and game configuration.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::board::Color;
use crate::constants::{
    ANALYSIS_TIMEOUT, DEFAULT_AI_TIME_LIMIT, DEFAULT_KOMI, DEFAULT_SUGGESTION_STRENGTH,
    POLL_INTERVAL, STARTUP_GRACE, VISITS_PER_UNIT,
};

/// Environment variable naming the engine binary.
pub const ENV_BINARY: &str = "WEIQI_KATAGO_BIN";
/// Environment variable naming the network model file.
pub const ENV_MODEL: &str = "WEIQI_KATAGO_MODEL";
/// Environment variable naming the analysis config file.
pub const ENV_CONFIG: &str = "WEIQI_KATAGO_CONFIG";

/// How to launch and talk to the analysis engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Engine executable, either a path or a name looked up on `PATH`
    pub binary: PathBuf,
    /// Neural network model passed as `-model`
    pub model: PathBuf,
    /// Analysis config passed as `-config`
    pub config: PathBuf,
    /// Time the process gets to fail before it counts as started
    pub startup_grace: Duration,
    /// Wall-clock budget for one synchronous analysis
    pub request_timeout: Duration,
    /// Channel poll interval for consumers
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("katago"),
            model: PathBuf::from("model.bin.gz"),
            config: PathBuf::from("analysis.cfg"),
            startup_grace: STARTUP_GRACE,
            request_timeout: ANALYSIS_TIMEOUT,
            poll_interval: POLL_INTERVAL,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `WEIQI_KATAGO_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the variable names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(v) = lookup(ENV_BINARY) {
            cfg.binary = v.into();
        }
        if let Some(v) = lookup(ENV_MODEL) {
            cfg.model = v.into();
        }
        if let Some(v) = lookup(ENV_CONFIG) {
            cfg.config = v.into();
        }
        cfg
    }
}

/// Ruleset tracked by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Rules {
    #[default]
    Chinese,
    Japanese,
    Korean,
}

impl fmt::Display for Rules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rules::Chinese => "chinese",
            Rules::Japanese => "japanese",
            Rules::Korean => "korean",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Rules {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chinese" => Ok(Rules::Chinese),
            "japanese" => Ok(Rules::Japanese),
            "korean" => Ok(Rules::Korean),
            other => Err(format!("unknown rules: {other}")),
        }
    }
}

impl Rules {
    /// Map a free-form ruleset hint from imported material.
    pub fn from_hint(hint: &str) -> Option<Self> {
        let hint = hint.to_ascii_lowercase();
        if hint.contains("chinese") || hint.contains("cn") {
            Some(Rules::Chinese)
        } else if hint.contains("japanese") || hint.contains("jp") {
            Some(Rules::Japanese)
        } else {
            None
        }
    }
}

/// Per-session settings. Changes take effect with the next analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSettings {
    /// Color played by the human in a game against the engine
    pub player_color: Color,
    pub komi: f64,
    pub rules: Rules,
    /// Opponent thinking budget; visits = limit * 100
    pub ai_time_limit: f64,
    /// Suggestion strength 1..=10; visits = strength * 100
    pub suggestion_strength: u32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            player_color: Color::Black,
            komi: DEFAULT_KOMI,
            rules: Rules::default(),
            ai_time_limit: DEFAULT_AI_TIME_LIMIT,
            suggestion_strength: DEFAULT_SUGGESTION_STRENGTH,
        }
    }
}

impl GameSettings {
    /// Visit budget for the opponent's move.
    pub fn ai_visits(&self) -> u32 {
        ((self.ai_time_limit * VISITS_PER_UNIT) as u32).max(1)
    }

    /// Visit budget for realtime suggestions.
    pub fn suggestion_visits(&self) -> u32 {
        ((self.suggestion_strength as f64 * VISITS_PER_UNIT) as u32).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lookup_overrides() {
        let cfg = EngineConfig::from_lookup(|key| match key {
            ENV_MODEL => Some("/models/kata.bin.gz".to_string()),
            _ => None,
        });
        assert_eq!(cfg.binary, PathBuf::from("katago"));
        assert_eq!(cfg.model, PathBuf::from("/models/kata.bin.gz"));
        assert_eq!(cfg.request_timeout, ANALYSIS_TIMEOUT);
    }

    #[test]
    fn test_rules_parse_and_hint() {
        assert_eq!("Japanese".parse::<Rules>(), Ok(Rules::Japanese));
        assert!("aga".parse::<Rules>().is_err());
        assert_eq!(Rules::from_hint("Chinese (area)"), Some(Rules::Chinese));
        assert_eq!(Rules::from_hint("JP"), Some(Rules::Japanese));
        assert_eq!(Rules::from_hint("AGA"), None);
    }

    #[test]
    fn test_visit_budgets() {
        let mut settings = GameSettings::default();
        assert_eq!(settings.ai_visits(), 300);
        assert_eq!(settings.suggestion_visits(), 1000);
        settings.ai_time_limit = 0.001;
        assert_eq!(settings.ai_visits(), 1);
    }
}
