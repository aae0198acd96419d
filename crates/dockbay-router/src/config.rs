use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_FAILURES: u32 = 3;
pub const DEFAULT_COOLDOWN_SECONDS: u64 = 120;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Configured order.
    #[default]
    Failover,
    /// Weighted rotation, position kept in the caller's context.
    #[serde(alias = "round_robin")]
    RoundRobin,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StickyMode {
    /// One sticky target for every operation.
    #[default]
    Global,
    /// Separate sticky target per operation (`raw`, `stream`).
    PerOp,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> i64 {
    1
}

/// One entry of `[[router.targets]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSettings {
    pub id: String,
    #[serde(default = "default_true")]
    pub supports_tools: bool,
    #[serde(default = "default_true")]
    pub supports_stream: bool,
    #[serde(default = "default_weight")]
    pub weight: i64,
}

impl TargetSettings {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), supports_tools: true, supports_stream: true, weight: 1 }
    }
}

/// `[router]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub name: String,
    pub strategy: Strategy,
    pub sticky: bool,
    pub sticky_mode: StickyMode,
    pub max_failures: u32,
    pub cooldown_seconds: u64,
    pub targets: Vec<TargetSettings>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            strategy: Strategy::Failover,
            sticky: false,
            sticky_mode: StickyMode::Global,
            max_failures: DEFAULT_MAX_FAILURES,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            targets: Vec::new(),
        }
    }
}

impl RouterConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn sticky(mut self, mode: StickyMode) -> Self {
        self.sticky = true;
        self.sticky_mode = mode;
        self
    }

    pub fn max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    pub fn cooldown_seconds(mut self, seconds: u64) -> Self {
        self.cooldown_seconds = seconds;
        self
    }
}
