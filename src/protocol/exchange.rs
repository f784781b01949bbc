// ============================================================================
// Exchange Service
// Request dispatch over the market and the credential directory
// ============================================================================

use super::messages::{Currency, Request, Response};
use crate::domain::UserId;
use crate::engine::Market;
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Exchange shared between connection tasks; every request holds the lock
/// for the whole dispatch
pub type SharedExchange = Arc<Mutex<Exchange>>;

#[derive(Debug, Clone, Copy)]
struct Credential {
    user_id: UserId,
    pw_hash: u64,
}

pub struct Exchange {
    market: Market,
    credentials: HashMap<String, Credential>,
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new(Market::default())
    }
}

impl Exchange {
    pub fn new(market: Market) -> Self {
        Self {
            market,
            credentials: HashMap::new(),
        }
    }

    pub fn into_shared(self) -> SharedExchange {
        Arc::new(Mutex::new(self))
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn market_mut(&mut self) -> &mut Market {
        &mut self.market
    }

    /// Open an account for a new username. `None` when the name is taken.
    pub fn register(&mut self, username: &str, pw_hash: u64) -> Option<UserId> {
        if self.credentials.contains_key(username) {
            tracing::info!(username, "registration refused, username taken");
            return None;
        }

        let user_id = self.market.register_user(username);
        self.credentials
            .insert(username.to_string(), Credential { user_id, pw_hash });

        if let Err(err) = self
            .market
            .store()
            .record_user(user_id.value(), username, pw_hash)
        {
            tracing::warn!(%user_id, error = %err, "failed to persist user");
        }

        Some(user_id)
    }

    pub fn login(&self, username: &str, pw_hash: u64) -> Option<UserId> {
        self.credentials
            .get(username)
            .filter(|credential| credential.pw_hash == pw_hash)
            .map(|credential| credential.user_id)
    }

    /// Dispatch one request. Failures come back as [`Response::Error`].
    pub fn handle(&mut self, request: Request) -> Response {
        tracing::debug!(?request, "handling request");

        match self.dispatch(request) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "request rejected");
                Response::error(err.to_string())
            },
        }
    }

    fn dispatch(&mut self, request: Request) -> Result<Response> {
        let response = match request {
            Request::Register { username, pw_hash } => {
                let user_id = self.register(&username, pw_hash);
                Response::Registration {
                    success: user_id.is_some(),
                    user_id,
                }
            },
            Request::Login { username, pw_hash } => {
                let user_id = self.login(&username, pw_hash);
                Response::Login {
                    success: user_id.is_some(),
                    user_id,
                }
            },
            Request::Balance { user_id } => {
                let balance = self.market.balance(user_id)?;
                Response::Balance {
                    usd: balance.usd,
                    rub: balance.rub,
                }
            },
            Request::ActiveOffers { user_id } => {
                Response::active_offers(&self.market.active_offers(user_id)?)
            },
            Request::ClosedDeals { user_id } => {
                Response::closed_deals(user_id, &self.market.closed_deals(user_id)?)
            },
            Request::PostOffer {
                user_id,
                offer_side,
                price,
                amount,
            } => {
                let outcome = self.market.post_offer(user_id, offer_side, price, amount)?;
                Response::PostOffer {
                    offer_id: outcome.offer_id,
                }
            },
            Request::Quotes { user_id } => {
                self.market.account(user_id)?;
                let quotes = self.market.ask_bid_quotes();
                Response::quotes(self.market.quote(), quotes)
            },
            Request::Cancel { user_id, offer_id } => Response::Cancel {
                success: self.market.cancel_offer(user_id, offer_id)?,
            },
            Request::Deposit {
                user_id,
                currency,
                amount,
            } => {
                match currency {
                    Currency::Usd => self.market.deposit_usd(user_id, amount)?,
                    Currency::Rub => self.market.deposit_rub(user_id, amount)?,
                }
                let balance = self.market.balance(user_id)?;
                Response::Deposit {
                    usd: balance.usd,
                    rub: balance.rub,
                }
            },
        };

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OfferId, Side};
    use crate::interfaces::{InMemoryEventStore, StoreRecord, Table};
    use crate::protocol::{DealEntry, OfferEntry};

    fn register(exchange: &mut Exchange, username: &str) -> UserId {
        match exchange.handle(Request::Register {
            username: username.to_string(),
            pw_hash: 42,
        }) {
            Response::Registration {
                success: true,
                user_id: Some(user_id),
            } => user_id,
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn test_register_and_login() {
        let mut exchange = Exchange::default();
        let user = register(&mut exchange, "alice");

        assert_eq!(
            exchange.handle(Request::Register {
                username: "alice".to_string(),
                pw_hash: 7,
            }),
            Response::Registration {
                success: false,
                user_id: None
            }
        );
        assert_eq!(
            exchange.handle(Request::Login {
                username: "alice".to_string(),
                pw_hash: 42,
            }),
            Response::Login {
                success: true,
                user_id: Some(user)
            }
        );
        assert_eq!(exchange.login("alice", 41), None);
        assert_eq!(exchange.login("bob", 42), None);
    }

    #[test]
    fn test_registration_is_persisted() {
        let store = Arc::new(InMemoryEventStore::new());
        let mut exchange = Exchange::new(Market::new(store.clone()));
        register(&mut exchange, "alice");

        assert_eq!(
            store.records(),
            vec![StoreRecord::User {
                id: 0,
                username: "alice".to_string(),
                pw_hash: 42,
            }]
        );
        assert_eq!(store.count(Table::User), 1);
    }

    #[test]
    fn test_post_offer_and_reports() {
        let mut exchange = Exchange::default();
        let seller = register(&mut exchange, "seller");
        let buyer = register(&mut exchange, "buyer");

        assert_eq!(
            exchange.handle(Request::post_offer(seller, Side::Sell, 70, 10)),
            Response::PostOffer {
                offer_id: OfferId::new(0)
            }
        );
        exchange.handle(Request::post_offer(buyer, Side::Buy, 75, 4));

        assert_eq!(
            exchange.handle(Request::Balance { user_id: buyer }),
            Response::Balance { usd: 4, rub: -280 }
        );
        assert_eq!(
            exchange.handle(Request::ActiveOffers { user_id: seller }),
            Response::ActiveOffers {
                buy: vec![],
                sell: vec![OfferEntry {
                    offer_id: OfferId::new(0),
                    price: 70,
                    amount: 6
                }],
            }
        );
        assert_eq!(
            exchange.handle(Request::ClosedDeals { user_id: seller }),
            Response::ClosedDeals {
                buy: vec![],
                sell: vec![DealEntry {
                    price: 70,
                    amount: 4
                }],
                buy_sell: vec![],
            }
        );
        assert_eq!(
            exchange.handle(Request::Quotes { user_id: buyer }),
            Response::Quotes {
                quote: Some(70),
                ask_quote: None,
                bid_quote: Some(70),
                spread: None,
            }
        );
    }

    #[test]
    fn test_cancel_reports_success() {
        let mut exchange = Exchange::default();
        let user = register(&mut exchange, "alice");
        exchange.handle(Request::post_offer(user, Side::Buy, 60, 5));

        let cancel = Request::Cancel {
            user_id: user,
            offer_id: OfferId::new(0),
        };
        assert_eq!(
            exchange.handle(cancel.clone()),
            Response::Cancel { success: true }
        );
        assert_eq!(exchange.handle(cancel), Response::Cancel { success: false });
    }

    #[test]
    fn test_deposit_returns_balance() {
        let mut exchange = Exchange::default();
        let user = register(&mut exchange, "alice");

        exchange.handle(Request::Deposit {
            user_id: user,
            currency: Currency::Rub,
            amount: 1000,
        });
        assert_eq!(
            exchange.handle(Request::Deposit {
                user_id: user,
                currency: Currency::Usd,
                amount: 15,
            }),
            Response::Deposit { usd: 15, rub: 1000 }
        );
    }

    #[test]
    fn test_overflowing_deposit_is_an_error() {
        let mut exchange = Exchange::default();
        let user = register(&mut exchange, "alice");
        let deposit = Request::Deposit {
            user_id: user,
            currency: Currency::Usd,
            amount: i64::MAX as u64,
        };

        assert_eq!(
            exchange.handle(deposit.clone()),
            Response::Deposit { usd: i64::MAX, rub: 0 }
        );
        assert_eq!(
            exchange.handle(deposit),
            Response::error(format!("balance of user {user} would overflow"))
        );
        assert_eq!(
            exchange.handle(Request::Balance { user_id: user }),
            Response::Balance { usd: i64::MAX, rub: 0 }
        );
    }

    #[test]
    fn test_errors_become_error_responses() {
        let mut exchange = Exchange::default();
        let user = register(&mut exchange, "alice");

        assert!(matches!(
            exchange.handle(Request::Balance {
                user_id: UserId::new(99)
            }),
            Response::Error { .. }
        ));
        assert_eq!(
            exchange.handle(Request::post_offer(user, Side::Buy, 60, 0)),
            Response::error("offer quantity must be positive")
        );
        assert!(exchange.market().active_offers(user).unwrap().is_empty());
    }
}
