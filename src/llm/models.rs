use serde::{Deserialize, Serialize};

/// Model tiers available for test generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Model {
    /// Speed tier - fast, cheap model for quick drafts (gpt-oss-120b)
    Speed,
    /// Smart tier - best reasoning for test generation (claude-sonnet-4.5)
    #[default]
    Smart,
}

/// Maximum completion tokens for all model tiers
pub const MODEL_MAX_TOKENS: u32 = 16384;

impl Model {
    pub fn id(&self) -> &'static str {
        match self {
            Model::Speed => "openai/gpt-oss-120b",
            Model::Smart => "anthropic/claude-sonnet-4.5",
        }
    }

    pub fn max_tokens(&self) -> u32 {
        MODEL_MAX_TOKENS
    }
}

/// API usage information from OpenRouter
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
    /// Actual cost in USD as reported by OpenRouter.
    /// OpenRouter returns this as `total_cost` in the usage object.
    #[serde(default, alias = "total_cost")]
    pub cost: Option<f64>,
}

impl Usage {
    /// Get the actual cost for this usage from OpenRouter.
    /// Returns the cost reported by OpenRouter, or 0.0 if not available.
    /// We don't estimate costs - hardcoded rates are always wrong.
    pub fn cost(&self) -> f64 {
        self.cost.unwrap_or(0.0)
    }

    /// Combine usage across rounds; either side may be absent.
    pub fn merge(primary: Option<Usage>, secondary: Option<Usage>) -> Option<Usage> {
        match (primary, secondary) {
            (Some(p), Some(s)) => Some(Usage {
                prompt_tokens: p.prompt_tokens + s.prompt_tokens,
                completion_tokens: p.completion_tokens + s.completion_tokens,
                total_tokens: p.total_tokens + s.total_tokens,
                cost: match (p.cost, s.cost) {
                    (Some(pc), Some(sc)) => Some(pc + sc),
                    (Some(pc), None) => Some(pc),
                    (None, Some(sc)) => Some(sc),
                    (None, None) => None,
                },
            }),
            (Some(p), None) => Some(p),
            (None, Some(s)) => Some(s),
            (None, None) => None,
        }
    }
}
