//! Bond: the pricing and accounting engine
//!
//! Owns a [`Factory`], custody of the reserve asset, and one market per token.
//! The factory's [`Authority`](crate::Authority) is the only way to mint the
//! tokens it creates and to move the bond's reserve custody. Tokens created
//! directly through [`Bond::factory`] get a market on first use.
//!
//! # Locking
//! Each market sits behind its own mutex, so trades on one token are
//! linearized while trades on different tokens run in parallel. Locks are
//! always taken in the order: market map, factory registry, market, token
//! ledger, reserve ledger. Holder-side token calls take only the token lock.
//!
//! # Atomicity
//! A trade quotes first and moves value last. The first mutation is the one
//! that can still fail on the caller's side (pulling reserve on a buy,
//! burning tokens on a sell); every later step moves funds the bond already
//! holds, so a returned error always means nothing changed.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bonding_curve::{BuyQuote, LinearCurve, SellQuote};
use crate::config::BondConfig;
use crate::error::{BondError, BondResult};
use crate::events::{BondEvent, EventSink, InMemoryEventLog};
use crate::factory::Factory;
use crate::math::Rounding;
use crate::token::{Token, TokenHandle};
use crate::{Address, Amount};

struct Market {
    token: TokenHandle,
    curve: LinearCurve,
    reserve_balance: Amount,
}

/// Result of a settled buy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyReceipt {
    pub token: Address,
    pub tokens_out: Amount,
    pub reserve_in: Amount,
    pub tax_amount: Amount,
    pub beneficiary: Address,
}

/// Result of a settled sell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellReceipt {
    pub token: Address,
    pub tokens_in: Amount,
    pub refund: Amount,
    pub tax_amount: Amount,
    pub beneficiary: Address,
}

/// Consistent snapshot of one market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketState {
    pub token: Address,
    pub supply: Amount,
    pub reserve_balance: Amount,
    pub current_price: Amount,
    pub max_supply: Amount,
    pub reserve_ratio: Amount,
    pub slope: Amount,
}

pub struct Bond {
    address: Address,
    config: BondConfig,
    reserve: TokenHandle,
    factory: Factory,
    markets: RwLock<HashMap<Address, Arc<Mutex<Market>>>>,
    events: Arc<dyn EventSink>,
}

impl Bond {
    /// Bond at `address` trading against `reserve`, recording events in memory
    pub fn new(address: Address, reserve: TokenHandle, config: BondConfig) -> BondResult<Self> {
        Self::with_event_sink(address, reserve, config, Arc::new(InMemoryEventLog::new()))
    }

    pub fn with_event_sink(
        address: Address,
        reserve: TokenHandle,
        config: BondConfig,
        events: Arc<dyn EventSink>,
    ) -> BondResult<Self> {
        config.validate()?;
        if config.default_beneficiary == address {
            return Err(BondError::InvalidParameters(
                "default beneficiary cannot be the bond itself".to_string(),
            ));
        }
        let factory = Factory::new(address, config.max_supply_limit, Arc::clone(&events));
        reserve.lock().register_custody(factory.authority())?;
        info!(
            "Bond {} online: buy tax {} bps, sell tax {} bps, treasury {}",
            address, config.buy_tax_bps, config.sell_tax_bps, config.default_beneficiary
        );
        Ok(Self {
            address,
            config,
            reserve,
            factory,
            markets: RwLock::new(HashMap::new()),
            events,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &BondConfig {
        &self.config
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    pub fn reserve_token(&self) -> &TokenHandle {
        &self.reserve
    }

    /// Market of `token`, opened with an empty reserve on first use when the
    /// token was created directly through the factory
    fn market(&self, token: &Address) -> BondResult<Arc<Mutex<Market>>> {
        let existing = self.markets.read().get(token).cloned();
        if let Some(market) = existing {
            return Ok(market);
        }

        let mut markets = self.markets.write();
        if let Some(market) = markets.get(token) {
            return Ok(Arc::clone(market));
        }
        let info = self.factory.token_info(token)?;
        let market = Arc::new(Mutex::new(Market {
            token: self.factory.token(token)?,
            curve: self.curve_for(info.max_supply)?,
            reserve_balance: 0,
        }));
        markets.insert(*token, Arc::clone(&market));
        debug!("Opened market for factory token {} ({})", token, info.symbol);
        Ok(market)
    }

    fn curve_for(&self, max_supply: Amount) -> BondResult<LinearCurve> {
        LinearCurve::new(max_supply, self.config.full_curve_reserve_ratio)
    }

    fn resolve_beneficiary(&self, beneficiary: Option<Address>) -> Address {
        match beneficiary {
            Some(address) if !address.is_zero() && address != self.address => address,
            _ => self.config.default_beneficiary,
        }
    }

    /// Create a token through the factory and open its market with an empty reserve
    pub fn create_token(&self, name: &str, symbol: &str, max_supply: Amount) -> BondResult<Address> {
        let mut markets = self.markets.write();
        let (address, handle, curve) =
            self.factory
                .create_token_with(name, symbol, max_supply, |_, _| self.curve_for(max_supply))?;
        markets.insert(
            address,
            Arc::new(Mutex::new(Market {
                token: handle,
                curve,
                reserve_balance: 0,
            })),
        );
        Ok(address)
    }

    /// Create a token and buy into it in one step.
    ///
    /// If the buy fails the token is never registered.
    #[allow(clippy::too_many_arguments)]
    pub fn create_and_buy(
        &self,
        caller: &Address,
        name: &str,
        symbol: &str,
        max_supply: Amount,
        reserve_amount_in: Amount,
        min_tokens_out: Amount,
        beneficiary: Option<Address>,
    ) -> BondResult<(Address, BuyReceipt)> {
        let mut markets = self.markets.write();
        let (address, handle, (curve, reserve_balance, receipt)) =
            self.factory
                .create_token_with(name, symbol, max_supply, |address, ledger| {
                    let curve = self.curve_for(max_supply)?;
                    let mut reserve_balance = 0;
                    let mut reserve = self.reserve.lock();
                    let receipt = self.settle_buy(
                        address,
                        &curve,
                        &mut reserve_balance,
                        ledger,
                        &mut reserve,
                        caller,
                        reserve_amount_in,
                        min_tokens_out,
                        beneficiary,
                    )?;
                    Ok((curve, reserve_balance, receipt))
                })?;

        markets.insert(
            address,
            Arc::new(Mutex::new(Market {
                token: handle,
                curve,
                reserve_balance,
            })),
        );
        self.record_buy(caller, &receipt);
        Ok((address, receipt))
    }

    /// Spend `reserve_amount_in` of the reserve asset on `token`.
    ///
    /// The caller must have approved the bond on the reserve asset. Tax goes to
    /// `beneficiary`, or to the configured treasury when none is given.
    pub fn buy(
        &self,
        caller: &Address,
        token: &Address,
        reserve_amount_in: Amount,
        min_tokens_out: Amount,
        beneficiary: Option<Address>,
    ) -> BondResult<BuyReceipt> {
        let market = self.market(token)?;
        let mut market = market.lock();
        let ledger_handle = Arc::clone(&market.token);
        let mut ledger = ledger_handle.lock();
        let mut reserve = self.reserve.lock();

        let curve = market.curve;
        let receipt = self.settle_buy(
            token,
            &curve,
            &mut market.reserve_balance,
            &mut ledger,
            &mut reserve,
            caller,
            reserve_amount_in,
            min_tokens_out,
            beneficiary,
        )?;

        self.record_buy(caller, &receipt);
        Ok(receipt)
    }

    /// Burn `token_amount_in` of `token` for a reserve refund.
    ///
    /// The caller must have approved the bond on `token` for at least the amount sold.
    pub fn sell(
        &self,
        caller: &Address,
        token: &Address,
        token_amount_in: Amount,
        min_reserve_out: Amount,
        beneficiary: Option<Address>,
    ) -> BondResult<SellReceipt> {
        let market = self.market(token)?;
        let mut market = market.lock();
        let ledger_handle = Arc::clone(&market.token);
        let mut ledger = ledger_handle.lock();
        let mut reserve = self.reserve.lock();

        let held = ledger.balance_of(caller);
        if held < token_amount_in {
            return Err(BondError::InsufficientBalance {
                have: held,
                need: token_amount_in,
            });
        }

        let quote = market.curve.quote_sell(
            ledger.total_supply(),
            market.reserve_balance,
            token_amount_in,
            self.config.sell_tax_bps,
        )?;
        Self::check_slippage(token, quote.net_refund, min_reserve_out)?;

        let beneficiary = self.resolve_beneficiary(beneficiary);

        let authority = self.factory.authority();
        ledger.burn_from_as(authority, caller, token_amount_in)?;
        reserve.transfer_as(authority, caller, quote.net_refund)?;
        if quote.tax_amount > 0 {
            reserve.transfer_as(authority, &beneficiary, quote.tax_amount)?;
        }
        market.reserve_balance -= quote.gross_refund;

        let receipt = SellReceipt {
            token: *token,
            tokens_in: token_amount_in,
            refund: quote.net_refund,
            tax_amount: quote.tax_amount,
            beneficiary,
        };

        info!(
            "Sell on {}: {} burned by {}, refund {}, tax {} to {}",
            token, token_amount_in, caller, quote.net_refund, quote.tax_amount, beneficiary
        );
        self.events.record(BondEvent::Sell {
            token_address: *token,
            seller: *caller,
            amount_burned: token_amount_in,
            refund_amount: quote.net_refund,
            beneficiary,
            tax_amount: quote.tax_amount,
        });
        Ok(receipt)
    }

    #[allow(clippy::too_many_arguments)]
    fn settle_buy(
        &self,
        token: &Address,
        curve: &LinearCurve,
        reserve_balance: &mut Amount,
        ledger: &mut Token,
        reserve: &mut Token,
        caller: &Address,
        reserve_amount_in: Amount,
        min_tokens_out: Amount,
        beneficiary: Option<Address>,
    ) -> BondResult<BuyReceipt> {
        let authority = self.factory.authority();
        ledger.ensure_minter(authority)?;

        let quote = curve
            .quote_buy(
                ledger.total_supply(),
                *reserve_balance,
                reserve_amount_in,
                self.config.buy_tax_bps,
            )
            .map_err(|e| {
                if let BondError::ExceededMaxSupply { .. } = e {
                    warn!("Buy on {} rejected: {}", token, e);
                }
                e
            })?;
        Self::check_slippage(token, quote.tokens_out, min_tokens_out)?;

        let beneficiary = self.resolve_beneficiary(beneficiary);

        reserve.transfer_from_as(authority, caller, &self.address, reserve_amount_in)?;
        if quote.tax_amount > 0 {
            reserve.transfer_as(authority, &beneficiary, quote.tax_amount)?;
        }
        ledger.mint(authority, caller, quote.tokens_out)?;
        *reserve_balance += quote.net_reserve;

        Ok(BuyReceipt {
            token: *token,
            tokens_out: quote.tokens_out,
            reserve_in: reserve_amount_in,
            tax_amount: quote.tax_amount,
            beneficiary,
        })
    }

    fn record_buy(&self, caller: &Address, receipt: &BuyReceipt) {
        info!(
            "Buy on {}: {} minted to {} for {}, tax {} to {}",
            receipt.token,
            receipt.tokens_out,
            caller,
            receipt.reserve_in,
            receipt.tax_amount,
            receipt.beneficiary
        );
        self.events.record(BondEvent::Buy {
            token_address: receipt.token,
            buyer: *caller,
            amount_minted: receipt.tokens_out,
            reserve_amount: receipt.reserve_in,
            beneficiary: receipt.beneficiary,
            tax_amount: receipt.tax_amount,
        });
    }

    fn check_slippage(token: &Address, actual: Amount, minimum: Amount) -> BondResult<()> {
        if actual < minimum {
            warn!(
                "Slippage exceeded on {}: got {}, expected at least {}",
                token, actual, minimum
            );
            return Err(BondError::SlippageLimitExceeded { actual, minimum });
        }
        Ok(())
    }

    /// What `buy` would mint and tax right now
    pub fn estimate_buy(&self, token: &Address, reserve_amount_in: Amount) -> BondResult<BuyQuote> {
        let market = self.market(token)?;
        let market = market.lock();
        let supply = market.token.lock().total_supply();
        market.curve.quote_buy(
            supply,
            market.reserve_balance,
            reserve_amount_in,
            self.config.buy_tax_bps,
        )
    }

    /// What `sell` would refund and tax right now
    pub fn estimate_sell(&self, token: &Address, token_amount_in: Amount) -> BondResult<SellQuote> {
        let market = self.market(token)?;
        let market = market.lock();
        let supply = market.token.lock().total_supply();
        market.curve.quote_sell(
            supply,
            market.reserve_balance,
            token_amount_in,
            self.config.sell_tax_bps,
        )
    }

    /// Marginal price `m * supply`
    pub fn current_price(&self, token: &Address) -> BondResult<Amount> {
        let market = self.market(token)?;
        let market = market.lock();
        let supply = market.token.lock().total_supply();
        market.curve.price_at_supply(supply)
    }

    pub fn reserve_balance(&self, token: &Address) -> BondResult<Amount> {
        Ok(self.market(token)?.lock().reserve_balance)
    }

    /// Live total supply of the token
    pub fn token_supply(&self, token: &Address) -> BondResult<Amount> {
        let market = self.market(token)?;
        let market = market.lock();
        let supply = market.token.lock().total_supply();
        Ok(supply)
    }

    /// Reserve the curve requires for the current supply, rounded up
    pub fn curve_reserve(&self, token: &Address) -> BondResult<Amount> {
        let market = self.market(token)?;
        let market = market.lock();
        let supply = market.token.lock().total_supply();
        market.curve.reserve_at_supply(supply, Rounding::Up)
    }

    pub fn market_state(&self, token: &Address) -> BondResult<MarketState> {
        let market = self.market(token)?;
        let market = market.lock();
        let supply = market.token.lock().total_supply();
        Ok(MarketState {
            token: *token,
            supply,
            reserve_balance: market.reserve_balance,
            current_price: market.curve.price_at_supply(supply)?,
            max_supply: market.curve.max_supply,
            reserve_ratio: market.curve.reserve_ratio,
            slope: market.curve.slope()?,
        })
    }

    pub fn market_state_json(&self, token: &Address) -> anyhow::Result<Vec<u8>> {
        let state = self.market_state(token)?;
        serde_json::to_vec(&state)
            .with_context(|| format!("failed to serialize market state of {}", token))
    }
}
