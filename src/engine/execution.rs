use crate::data::DataFeed;
use crate::engine::event::{Fill, Order};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("No current bar for {0}: the data feed has not started")]
    NoCurrentBar(String),
    #[error("Cost model returned invalid costs (commission {commission}, slippage {slippage})")]
    InvalidCosts { commission: f64, slippage: f64 },
}

//transaction costs derived from a fill's notional
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TransactionCosts {
    pub commission: f64,
    pub slippage: f64,
}

//maps a signed notional cost to commission and slippage
pub trait CostModel: Send + Sync {
    fn costs(&self, cost: f64) -> TransactionCosts;
}

//any (cost) -> (commission, slippage) function is a cost model
impl<F> CostModel for F
where
    F: Fn(f64) -> (f64, f64) + Send + Sync,
{
    fn costs(&self, cost: f64) -> TransactionCosts {
        let (commission, slippage) = self(cost);
        TransactionCosts {
            commission,
            slippage,
        }
    }
}

//proportional costs on the absolute notional
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentageCostModel {
    pub commission_rate: f64,
    pub slippage_rate: f64,
}

impl PercentageCostModel {
    pub fn new(commission_rate: f64, slippage_rate: f64) -> Self {
        PercentageCostModel {
            commission_rate,
            slippage_rate,
        }
    }
}

impl Default for PercentageCostModel {
    fn default() -> Self {
        PercentageCostModel {
            commission_rate: 0.001,
            slippage_rate: 0.0,
        }
    }
}

impl CostModel for PercentageCostModel {
    fn costs(&self, cost: f64) -> TransactionCosts {
        TransactionCosts {
            commission: self.commission_rate * cost.abs(),
            slippage: self.slippage_rate * cost.abs(),
        }
    }
}

//turns an order into exactly one fill
pub trait ExecutionHandler: Send {
    fn execute_order(&mut self, order: &Order, feed: &DataFeed) -> Result<Fill, ExecutionError>;
}

//fills every market order instantly at the current bar's close
pub struct SimulatedExecution {
    next_fill_id: u64,
    cost_model: Box<dyn CostModel>,
}

impl SimulatedExecution {
    pub fn new(cost_model: Box<dyn CostModel>) -> Self {
        SimulatedExecution {
            next_fill_id: 1,
            cost_model,
        }
    }
}

impl Default for SimulatedExecution {
    fn default() -> Self {
        Self::new(Box::new(PercentageCostModel::default()))
    }
}

impl ExecutionHandler for SimulatedExecution {
    fn execute_order(&mut self, order: &Order, feed: &DataFeed) -> Result<Fill, ExecutionError> {
        let bar = feed
            .latest_bar(&order.symbol)
            .ok_or_else(|| ExecutionError::NoCurrentBar(order.symbol.clone()))?;
        let timestamp = feed.current_timestamp().unwrap_or(bar.timestamp);

        let cost = order.signed_quantity() * bar.close;
        let fill = Fill::from_order(
            self.next_fill_id,
            order,
            timestamp,
            cost,
            self.cost_model.as_ref(),
        );

        let valid = |v: f64| v.is_finite() && v >= 0.0;
        if !valid(fill.commission) || !valid(fill.slippage) {
            return Err(ExecutionError::InvalidCosts {
                commission: fill.commission,
                slippage: fill.slippage,
            });
        }

        self.next_fill_id += 1;
        debug!(
            "filled order {} as fill {}: {} {} {} @ {}",
            order.id, fill.id, fill.direction, fill.quantity, fill.symbol, bar.close
        );
        Ok(fill)
    }
}
