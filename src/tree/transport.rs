//! Blocking request/response transports between the tree parties.
//!
//! The tag party drives every exchange through a [`Transport`]. [`InProcess`] calls the peer's
//! [`Handler`] directly. [`ChannelTransport`] hands requests to a peer that runs [`serve()`] on
//! its own thread, so both parties are independently scheduled actors that only share messages.

use derive_more::From;
use displaydoc::Display;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::{
    protocol::{Request, Response},
    TreeError,
};

/// Errors which can occur while exchanging a message with the peer.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer has shut down and the request channel is closed.
    ChannelClosed,
    /// The peer dropped the request without a response.
    NoResponse,
    /// The peer failed to handle the request: {0}.
    Peer(String),
}

/// The peer side of the exchange.
pub trait Handler {
    /// Handles a request of the tag party.
    ///
    /// # Errors
    /// Fails if the request cannot be served with the local state.
    fn handle(&mut self, request: Request) -> Result<Response, TreeError>;
}

/// A blocking "send a request, await the reply" exchange with the peer.
pub trait Transport {
    /// Sends a request and waits for the response.
    ///
    /// # Errors
    /// Fails if the peer is gone or could not handle the request.
    fn request(&mut self, request: Request) -> Result<Response, TransportError>;
}

/// A transport calling the peer's handler in the same thread.
pub struct InProcess<H> {
    handler: H,
}

impl<H: Handler> InProcess<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    /// Gets the peer's handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_inner(self) -> H {
        self.handler
    }
}

impl<H: Handler> Transport for InProcess<H> {
    fn request(&mut self, request: Request) -> Result<Response, TransportError> {
        self.handler
            .handle(request)
            .map_err(|err| TransportError::Peer(err.to_string()))
    }
}

/// A channel for the peer to send the response to a [`Request`].
pub type ResponseSender = oneshot::Sender<Result<Response, String>>;

/// A handle to send requests to a peer running [`serve()`].
#[derive(Clone, From, Debug)]
pub struct ChannelTransport(mpsc::UnboundedSender<(Request, ResponseSender)>);

impl Transport for ChannelTransport {
    fn request(&mut self, request: Request) -> Result<Response, TransportError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.0
            .send((request, resp_tx))
            .map_err(|_| TransportError::ChannelClosed)?;
        resp_rx
            .blocking_recv()
            .map_err(|_| TransportError::NoResponse)?
            .map_err(TransportError::Peer)
    }
}

/// The receiver half of the request channel, consumed by [`serve()`].
#[derive(From, Debug)]
pub struct RequestReceiver(mpsc::UnboundedReceiver<(Request, ResponseSender)>);

impl RequestReceiver {
    /// Creates a new request channel and returns the [`RequestReceiver`] as well as the
    /// [`ChannelTransport`] half.
    pub fn new() -> (Self, ChannelTransport) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RequestReceiver::from(rx), ChannelTransport::from(tx))
    }
}

/// Serves requests with the handler until a [`Request::Shutdown`] arrives or every transport is
/// dropped, then returns the handler.
///
/// Blocks the calling thread and must not run inside an asynchronous runtime.
pub fn serve<H: Handler>(mut receiver: RequestReceiver, mut handler: H) -> H {
    while let Some((request, resp_tx)) = receiver.0.blocking_recv() {
        let shutdown = matches!(request, Request::Shutdown);
        let response = handler.handle(request).map_err(|err| {
            warn!("failed to handle request: {}", err);
            err.to_string()
        });
        if resp_tx.send(response).is_err() {
            warn!("failed to send response: receiver shut down");
        }
        if shutdown {
            break;
        }
    }
    debug!("stopped serving requests");
    handler
}
