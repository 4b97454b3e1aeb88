//! Enumerated configuration values

use serde::Deserialize;
use std::fmt;

/// Deployment target; selects default RPC and pricing endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    #[default]
    Local,
    Test,
    Main,
}

impl Chain {
    /// Environment variable holding the Alchemy key for hosted chains
    pub fn alchemy_key_var(&self) -> Option<&'static str> {
        match self {
            Chain::Local => None,
            Chain::Test => Some("TEST_ORACLE_ALCHEMY_API_KEY"),
            Chain::Main => Some("ORACLE_ALCHEMY_API_KEY"),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Local => write!(f, "local"),
            Chain::Test => write!(f, "test"),
            Chain::Main => write!(f, "main"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
