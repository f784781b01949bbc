// ============================================================================
// TCP Front End
// One task per connection; each frame is dispatched under the exchange lock
// ============================================================================

use crate::domain::ExchangeConfig;
use crate::protocol::{
    decode_request, encode_response, FrameDecoder, ProtocolError, Response, SharedExchange,
};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const READ_CHUNK: usize = 1024;

pub struct ExchangeServer {
    listener: TcpListener,
    exchange: SharedExchange,
    max_frame_len: usize,
}

impl ExchangeServer {
    pub async fn bind(config: &ExchangeConfig, exchange: SharedExchange) -> io::Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).await?;

        Ok(Self {
            listener,
            exchange,
            max_frame_len: config.max_frame_len,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the process ends
    pub async fn run(self) -> io::Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves. Connections already
    /// accepted keep running on their own tasks.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> io::Result<()> {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("listener shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    tracing::info!(%peer, "connection accepted");

                    let exchange = self.exchange.clone();
                    let max_frame_len = self.max_frame_len;
                    tokio::spawn(async move {
                        if let Err(err) = serve_connection(stream, exchange, max_frame_len).await {
                            tracing::warn!(%peer, error = %err, "connection failed");
                        }
                        tracing::info!(%peer, "connection closed");
                    });
                }
            }
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    exchange: SharedExchange,
    max_frame_len: usize,
) -> io::Result<()> {
    let mut decoder = FrameDecoder::new(max_frame_len);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            if let Some(frame) = decoder.finish() {
                let reply = respond(&exchange, Ok(frame))?;
                stream.write_all(&reply).await?;
            }
            return Ok(());
        }
        decoder.extend(&chunk[..read]);

        loop {
            let reply = match decoder.next_frame() {
                Ok(Some(frame)) => respond(&exchange, Ok(frame))?,
                Ok(None) => break,
                Err(err) => respond(&exchange, Err(err))?,
            };
            stream.write_all(&reply).await?;
        }
    }
}

/// Encoded reply for one frame. The lock is released before any await.
fn respond(
    exchange: &SharedExchange,
    frame: Result<Vec<u8>, ProtocolError>,
) -> io::Result<Vec<u8>> {
    let response = match frame.and_then(|frame| decode_request(&frame)) {
        Ok(request) => exchange.lock().handle(request),
        Err(err) => {
            tracing::warn!(error = %err, "undecodable frame");
            Response::error(err.to_string())
        },
    };

    encode_response(&response).map_err(io::Error::other)
}
