//! Economic Components
//!
//! Workplaces (staff, stock, capital, customers, investors) and the
//! investor ledger carried by agents.

use bevy_ecs::prelude::*;
use std::collections::{BTreeMap, VecDeque};

/// Constants for workplaces and trading
pub mod economy_constants {
    pub const MAX_WORKERS: usize = 5;
    pub const BASE_WAGE: f32 = 10.0;
    pub const MAX_INVENTORY: f32 = 100.0;
    pub const STARTING_CAPITAL: f32 = 1000.0;
    pub const MIN_OPERATING_CAPITAL: f32 = 100.0;
    pub const SALE_PRICE: f32 = 25.0;
    pub const OPERATING_COSTS: f32 = 5.0;
    /// Cost of a food purchase
    pub const FOOD_COST: f32 = 5.0;
    /// Food units received per purchase
    pub const FOOD_PER_PURCHASE: f32 = 30.0;
    /// Money paid per food unit sold to a workplace
    pub const SELL_PRICE_PER_UNIT: f32 = 0.5;
    /// Money per unit of food in agent-to-agent trades
    pub const TRADE_FOOD_PRICE: f32 = 0.6;
    /// Food per unit of money in agent-to-agent trades
    pub const TRADE_MONEY_RATE: f32 = 1.5;
    pub const INVESTMENT_RETURN_RATE: f32 = 0.1;
    pub const MAX_INVESTMENT: f32 = 50.0;
}

/// Workplace status as shown to a renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkplaceDisplay {
    Operational,
    Understaffed,
    OutOfStock,
    Broke,
    Closed,
}

impl WorkplaceDisplay {
    pub fn label(self) -> &'static str {
        match self {
            WorkplaceDisplay::Operational => "operational",
            WorkplaceDisplay::Understaffed => "understaffed",
            WorkplaceDisplay::OutOfStock => "out-of-stock",
            WorkplaceDisplay::Broke => "broke",
            WorkplaceDisplay::Closed => "closed",
        }
    }
}

/// A stake an investor holds in a workplace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stake {
    pub investor: Entity,
    pub amount: f32,
    pub return_rate: f32,
}

/// A business agents can work at, buy from, sell to and invest in
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Workplace {
    pub workers: Vec<Entity>,
    pub max_workers: usize,
    pub base_wage: f32,
    /// Wages paid to each worker since the last economic update
    pub wages: BTreeMap<Entity, f32>,
    pub inventory: f32,
    pub max_inventory: f32,
    pub capital: f32,
    pub min_operating_capital: f32,
    pub price: f32,
    pub operating_costs: f32,
    pub productivity: f32,
    pub revenue: f32,
    pub expenses: f32,
    pub profit: f32,
    pub customer_queue: VecDeque<Entity>,
    pub investors: Vec<Stake>,
    pub has_staff: bool,
    pub has_stock: bool,
    pub is_funded: bool,
    pub is_profitable: bool,
}

impl Default for Workplace {
    fn default() -> Self {
        use economy_constants::*;
        let mut workplace = Self {
            workers: Vec::new(),
            max_workers: MAX_WORKERS,
            base_wage: BASE_WAGE,
            wages: BTreeMap::new(),
            inventory: MAX_INVENTORY,
            max_inventory: MAX_INVENTORY,
            capital: STARTING_CAPITAL,
            min_operating_capital: MIN_OPERATING_CAPITAL,
            price: SALE_PRICE,
            operating_costs: OPERATING_COSTS,
            productivity: 1.0,
            revenue: 0.0,
            expenses: 0.0,
            profit: 0.0,
            customer_queue: VecDeque::new(),
            investors: Vec::new(),
            has_staff: false,
            has_stock: false,
            is_funded: false,
            is_profitable: false,
        };
        workplace.refresh_flags();
        workplace
    }
}

impl Workplace {
    pub fn with_max_workers(max_workers: usize) -> Self {
        Self {
            max_workers,
            ..Self::default()
        }
    }

    pub fn is_full(&self) -> bool {
        self.workers.len() >= self.max_workers
    }

    pub fn employs(&self, agent: Entity) -> bool {
        self.workers.contains(&agent)
    }

    /// Adds a worker if there is room. Already-employed agents count as hired.
    pub fn hire(&mut self, agent: Entity) -> bool {
        if self.employs(agent) {
            return true;
        }
        if self.is_full() {
            return false;
        }
        self.workers.push(agent);
        self.has_staff = true;
        true
    }

    /// Removes an agent from staff, customers and investors.
    pub fn release(&mut self, agent: Entity) {
        self.workers.retain(|w| *w != agent);
        self.wages.remove(&agent);
        self.customer_queue.retain(|c| *c != agent);
        self.investors.retain(|s| s.investor != agent);
        self.has_staff = !self.workers.is_empty();
    }

    pub fn enqueue_customer(&mut self, agent: Entity) {
        if !self.customer_queue.contains(&agent) {
            self.customer_queue.push_back(agent);
        }
    }

    /// Pays up to `amount` out of capital, returning what was paid.
    pub fn pay_out(&mut self, amount: f32) -> f32 {
        let paid = amount.max(0.0).min(self.capital.max(0.0));
        self.capital -= paid;
        paid
    }

    pub fn record_wage(&mut self, worker: Entity, amount: f32) {
        *self.wages.entry(worker).or_insert(0.0) += amount;
    }

    pub fn add_inventory(&mut self, amount: f32) {
        self.inventory = (self.inventory + amount.max(0.0)).min(self.max_inventory);
        self.has_stock = self.inventory > 0.0;
    }

    pub fn take_inventory(&mut self, amount: f32) -> f32 {
        let taken = amount.max(0.0).min(self.inventory);
        self.inventory -= taken;
        self.has_stock = self.inventory > 0.0;
        taken
    }

    pub fn add_stake(&mut self, investor: Entity, amount: f32, return_rate: f32) {
        if let Some(stake) = self.investors.iter_mut().find(|s| s.investor == investor) {
            stake.amount += amount;
            stake.return_rate = return_rate;
        } else {
            self.investors.push(Stake {
                investor,
                amount,
                return_rate,
            });
        }
        self.capital += amount;
        self.refresh_flags();
    }

    /// Recomputes the derived status flags from raw counts.
    pub fn refresh_flags(&mut self) {
        self.has_staff = !self.workers.is_empty();
        self.has_stock = self.inventory > 0.0;
        self.is_funded = self.capital > self.min_operating_capital;
    }

    /// `revenue - (wages + operating_costs)` for the current period.
    pub fn calculate_profit(&mut self) -> f32 {
        self.expenses = self.wages.values().sum::<f32>() + self.operating_costs;
        self.profit = self.revenue - self.expenses;
        self.is_profitable = self.profit > 0.0;
        self.profit
    }

    /// Clears per-period revenue and wage accounting.
    pub fn close_period(&mut self) {
        self.revenue = 0.0;
        self.wages.clear();
    }

    pub fn display_state(&self) -> WorkplaceDisplay {
        match (self.has_staff, self.has_stock, self.is_funded) {
            (true, true, true) => WorkplaceDisplay::Operational,
            (false, true, true) => WorkplaceDisplay::Understaffed,
            (_, false, true) => WorkplaceDisplay::OutOfStock,
            (true, _, false) => WorkplaceDisplay::Broke,
            (false, _, false) => WorkplaceDisplay::Closed,
        }
    }
}

/// One investment held by an agent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Holding {
    pub workplace: Entity,
    pub amount: f32,
    pub return_rate: f32,
}

/// Investment ledger of an agent
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct Investor {
    pub holdings: Vec<Holding>,
    pub total_returns: f32,
}

impl Investor {
    pub fn record(&mut self, workplace: Entity, amount: f32, return_rate: f32) {
        if let Some(h) = self.holdings.iter_mut().find(|h| h.workplace == workplace) {
            h.amount += amount;
            h.return_rate = return_rate;
        } else {
            self.holdings.push(Holding {
                workplace,
                amount,
                return_rate,
            });
        }
    }

    pub fn total_invested(&self) -> f32 {
        self.holdings.iter().map(|h| h.amount).sum()
    }
}
