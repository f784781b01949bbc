// ============================================================================
// Protocol Module
// Request/response messages, their dispatch and the JSON wire codec
// ============================================================================

#[cfg(feature = "serde")]
mod codec;
mod exchange;
mod messages;

#[cfg(feature = "serde")]
pub use codec::{decode_request, encode_response, FrameDecoder, ProtocolError};
pub use exchange::{Exchange, SharedExchange};
pub use messages::{Currency, DealEntry, OfferEntry, Request, Response};
