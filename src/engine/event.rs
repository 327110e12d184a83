use crate::engine::execution::CostModel;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("Signal strength must be finite and non-zero, got {0}")]
    InvalidStrength(f64),
    #[error("Order quantity must be finite and positive, got {0}")]
    InvalidQuantity(f64),
}

//identifies the strategy that owns a signal and everything it causes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrategyId(String);

impl StrategyId {
    pub fn new(id: impl Into<String>) -> Self {
        StrategyId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    //converts to quantity sign (Long = +1, Short = -1)
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    //direction implied by the sign of a signal strength, none for zero or nan
    pub fn from_strength(strength: f64) -> Option<Self> {
        if strength > 0.0 {
            Some(Direction::Long)
        } else if strength < 0.0 {
            Some(Direction::Short)
        } else {
            None
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("LONG"),
            Direction::Short => f.write_str("SHORT"),
        }
    }
}

//order type, the simulator only knows market orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
}

//a new bar is available for every tracked symbol
//addressed to all registered strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub timestamp: i64,
}

//a strategy's directional intent, not yet sized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub target: StrategyId,
    pub symbol: String,
    pub timestamp: i64,
    pub strength: f64,
}

impl Signal {
    //zero strength carries no direction and is never emitted
    pub fn new(
        target: StrategyId,
        symbol: impl Into<String>,
        timestamp: i64,
        strength: f64,
    ) -> Result<Self, EventError> {
        if !strength.is_finite() || strength == 0.0 {
            return Err(EventError::InvalidStrength(strength));
        }
        Ok(Signal {
            target,
            symbol: symbol.into(),
            timestamp,
            strength,
        })
    }

    pub fn direction(&self) -> Direction {
        if self.strength > 0.0 {
            Direction::Long
        } else {
            Direction::Short
        }
    }
}

//a sized, directional trade request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub target: StrategyId,
    pub symbol: String,
    pub order_type: OrderType,
    pub quantity: f64,
    pub direction: Direction,
}

impl Order {
    //creates a new market order
    pub fn market(
        id: u64,
        target: StrategyId,
        symbol: impl Into<String>,
        quantity: f64,
        direction: Direction,
    ) -> Result<Self, EventError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(EventError::InvalidQuantity(quantity));
        }
        Ok(Order {
            id,
            target,
            symbol: symbol.into(),
            order_type: OrderType::Market,
            quantity,
            direction,
        })
    }

    //returns the signed quantity (positive for long, negative for short)
    pub fn signed_quantity(&self) -> f64 {
        self.quantity * self.direction.sign()
    }
}

//the simulated outcome of an order
//cost is the notional signed by direction, commission and slippage are fixed at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub id: u64,
    pub order_id: u64,
    pub target: StrategyId,
    pub symbol: String,
    pub timestamp: i64,
    pub quantity: f64,
    pub direction: Direction,
    pub cost: f64,
    pub commission: f64,
    pub slippage: f64,
}

impl Fill {
    pub fn from_order(
        fill_id: u64,
        order: &Order,
        timestamp: i64,
        cost: f64,
        cost_model: &dyn CostModel,
    ) -> Self {
        let costs = cost_model.costs(cost);
        Fill {
            id: fill_id,
            order_id: order.id,
            target: order.target.clone(),
            symbol: order.symbol.clone(),
            timestamp,
            quantity: order.quantity,
            direction: order.direction,
            cost,
            commission: costs.commission,
            slippage: costs.slippage,
        }
    }

    //signed position change
    pub fn signed_quantity(&self) -> f64 {
        self.quantity * self.direction.sign()
    }

    //cash change on settlement
    pub fn cash_delta(&self) -> f64 {
        -(self.cost + self.commission + self.slippage)
    }
}

//the closed set of events the dispatch loop understands
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Market(MarketEvent),
    Signal(Signal),
    Order(Order),
    Fill(Fill),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Market(_) => EventKind::Market,
            Event::Signal(_) => EventKind::Signal,
            Event::Order(_) => EventKind::Order,
            Event::Fill(_) => EventKind::Fill,
        }
    }

    //owning strategy, none for broadcast market ticks
    pub fn target(&self) -> Option<&StrategyId> {
        match self {
            Event::Market(_) => None,
            Event::Signal(signal) => Some(&signal.target),
            Event::Order(order) => Some(&order.target),
            Event::Fill(fill) => Some(&fill.target),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Market,
    Signal,
    Order,
    Fill,
}

//strict fifo queue shared by every component through the orchestrator
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
