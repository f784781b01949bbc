// ============================================================================
// Exchange Actor
// Single writer thread owning the exchange, fed through a command channel
// ============================================================================

use crate::protocol::{Exchange, Request, Response};
use crossbeam::channel::{self, Receiver, Sender};
use std::io;
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActorError {
    #[error("exchange actor has stopped")]
    Stopped,

    #[error("failed to spawn exchange actor thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("exchange actor thread panicked")]
    Panicked,
}

enum Command {
    Handle {
        request: Request,
        reply: Sender<Response>,
    },
    Shutdown,
}

/// Cloneable sender side of the actor
#[derive(Clone)]
pub struct ExchangeHandle {
    commands: Sender<Command>,
}

impl ExchangeHandle {
    /// Send `request` and block until the actor answers
    pub fn call(&self, request: Request) -> Result<Response, ActorError> {
        let (reply, response) = channel::bounded(1);
        self.commands
            .send(Command::Handle { request, reply })
            .map_err(|_| ActorError::Stopped)?;
        response.recv().map_err(|_| ActorError::Stopped)
    }
}

/// Requests are applied one at a time in arrival order, so the exchange
/// needs no lock of its own.
pub struct ExchangeActor {
    handle: ExchangeHandle,
    thread: JoinHandle<Exchange>,
}

impl ExchangeActor {
    pub fn spawn(exchange: Exchange) -> Result<Self, ActorError> {
        let (commands, inbox) = channel::unbounded();
        let thread = thread::Builder::new()
            .name("exchange-actor".to_string())
            .spawn(move || run(exchange, inbox))?;

        Ok(Self {
            handle: ExchangeHandle { commands },
            thread,
        })
    }

    pub fn handle(&self) -> ExchangeHandle {
        self.handle.clone()
    }

    /// Stop after the requests already queued and hand the exchange back.
    /// Outstanding handles get [`ActorError::Stopped`] from then on.
    pub fn shutdown(self) -> Result<Exchange, ActorError> {
        // A send error means the thread is already gone; join reports why.
        let _ = self.handle.commands.send(Command::Shutdown);
        self.thread.join().map_err(|_| ActorError::Panicked)
    }
}

fn run(mut exchange: Exchange, inbox: Receiver<Command>) -> Exchange {
    tracing::info!("exchange actor started");

    while let Ok(command) = inbox.recv() {
        match command {
            Command::Handle { request, reply } => {
                let response = exchange.handle(request);
                if reply.send(response).is_err() {
                    tracing::debug!("caller went away before the reply");
                }
            },
            Command::Shutdown => break,
        }
    }

    tracing::info!("exchange actor stopped");
    exchange
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Side, UserId};

    fn register(handle: &ExchangeHandle, username: &str) -> UserId {
        match handle
            .call(Request::Register {
                username: username.to_string(),
                pw_hash: 1,
            })
            .unwrap()
        {
            Response::Registration {
                user_id: Some(user_id),
                ..
            } => user_id,
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn test_actor_serializes_requests() {
        let actor = ExchangeActor::spawn(Exchange::default()).unwrap();
        let handle = actor.handle();
        let seller = register(&handle, "seller");

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let handle = actor.handle();
                thread::spawn(move || {
                    let buyer = register(&handle, &format!("buyer{i}"));
                    for _ in 0..10 {
                        handle
                            .call(Request::post_offer(buyer, Side::Buy, 100, 1))
                            .unwrap();
                    }
                    buyer
                })
            })
            .collect();
        let buyers: Vec<UserId> = workers.into_iter().map(|w| w.join().unwrap()).collect();

        handle
            .call(Request::post_offer(seller, Side::Sell, 100, 40))
            .unwrap();

        let exchange = actor.shutdown().unwrap();
        let market = exchange.market();
        assert_eq!(market.balance(seller).unwrap().usd, -40);
        assert_eq!(market.balance(seller).unwrap().rub, 4000);
        for buyer in buyers {
            assert_eq!(market.balance(buyer).unwrap().usd, 10);
            assert!(market.active_offers(buyer).unwrap().is_empty());
        }
    }

    #[test]
    fn test_calls_after_shutdown_fail() {
        let actor = ExchangeActor::spawn(Exchange::default()).unwrap();
        let handle = actor.handle();
        register(&handle, "alice");

        let exchange = actor.shutdown().unwrap();
        assert_eq!(exchange.market().user_count(), 1);

        assert!(matches!(
            handle.call(Request::Quotes {
                user_id: UserId::new(0)
            }),
            Err(ActorError::Stopped)
        ));
    }
}
