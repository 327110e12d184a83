use crate::engine::event::{Signal, StrategyId};
use std::collections::HashMap;

//decides how much to trade for a signal
pub trait Sizer: Send {
    fn quantity(&self, signal: &Signal) -> f64;
}

//fixed reference quantity, optionally overridden per strategy
//signal strength only contributes its sign
#[derive(Debug, Clone)]
pub struct FixedQuantity {
    default_quantity: f64,
    overrides: HashMap<StrategyId, f64>,
}

impl FixedQuantity {
    pub fn new(default_quantity: f64) -> Self {
        FixedQuantity {
            default_quantity,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, strategy: StrategyId, quantity: f64) -> Self {
        self.overrides.insert(strategy, quantity);
        self
    }
}

impl Default for FixedQuantity {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Sizer for FixedQuantity {
    fn quantity(&self, signal: &Signal) -> f64 {
        self.overrides
            .get(&signal.target)
            .copied()
            .unwrap_or(self.default_quantity)
    }
}
