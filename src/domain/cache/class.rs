//! Named cache partitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// A logical cache partition owning an independent tiered cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheClass {
    /// Language-model responses
    Llm,
    /// Experiment results
    Experiment,
    /// Embedding vectors
    Embedding,
    /// Everything else
    General,
}

impl CacheClass {
    pub const ALL: [CacheClass; 4] = [
        CacheClass::Llm,
        CacheClass::Experiment,
        CacheClass::Embedding,
        CacheClass::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheClass::Llm => "llm",
            CacheClass::Experiment => "experiment",
            CacheClass::Embedding => "embedding",
            CacheClass::General => "general",
        }
    }
}

impl fmt::Display for CacheClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheClass {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "llm" => Ok(CacheClass::Llm),
            "experiment" => Ok(CacheClass::Experiment),
            "embedding" => Ok(CacheClass::Embedding),
            "general" => Ok(CacheClass::General),
            _ => Err(DomainError::not_found(format!(
                "Unknown cache class: {}. Valid classes: llm, experiment, embedding, general",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_class_from_str() {
        assert_eq!("llm".parse::<CacheClass>().unwrap(), CacheClass::Llm);
        assert_eq!("EXPERIMENT".parse::<CacheClass>().unwrap(), CacheClass::Experiment);
        assert_eq!("embedding".parse::<CacheClass>().unwrap(), CacheClass::Embedding);
        assert_eq!("general".parse::<CacheClass>().unwrap(), CacheClass::General);
    }

    #[test]
    fn test_cache_class_from_str_invalid() {
        assert!("redis".parse::<CacheClass>().is_err());
    }

    #[test]
    fn test_cache_class_display_round_trips() {
        for class in CacheClass::ALL {
            assert_eq!(class.to_string().parse::<CacheClass>().unwrap(), class);
        }
    }
}
