//! Caller sessions against a federation gateway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fedstore_core::{Error, Operation, OperationResult};

use crate::{CachePolicy, Dispatcher, FederationGateway};

/// A caller's session with a [`FederationGateway`].
///
/// Connections are cheap; they hold nothing but the gateway.
#[derive(Debug)]
pub struct FederationConnection {
    gateway: Arc<FederationGateway>,
    closed: AtomicBool,
}

impl FederationConnection {
    pub(crate) fn new(gateway: Arc<FederationGateway>) -> Self {
        FederationConnection {
            gateway,
            closed: AtomicBool::new(false),
        }
    }

    pub fn source_name(&self) -> Option<&str> {
        self.gateway.source_name()
    }

    pub fn default_cache_policy(&self) -> Option<CachePolicy> {
        self.gateway.default_cache_policy()
    }

    /// True if `operation` is cheap enough to run inline: any single
    /// request, or a composite of at most one member.
    pub fn should_process_synchronously(&self, operation: &Operation) -> bool {
        match operation {
            Operation::Single(_) => true,
            Operation::Composite(requests) => requests.len() <= 1,
        }
    }

    /// Execute an operation against the federation.
    ///
    /// Unknown workspace names fail the whole call. Every other failure is
    /// reported against the member it concerns.
    pub fn submit(&self, operation: &Operation) -> Result<OperationResult, Error> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        if self.gateway.is_shut_down() {
            return Err(Error::execution("federation gateway is shut down"));
        }
        for request in operation.requests() {
            self.gateway.workspace(request.workspace.as_deref())?;
        }

        let dispatcher = Dispatcher::new(&self.gateway);
        let requests = operation.requests();
        if self.should_process_synchronously(operation) {
            tracing::trace!(members = requests.len(), "executing inline");
            Ok(dispatcher.execute_inline(requests))
        } else {
            Ok(dispatcher.dispatch(requests))
        }
    }

    /// True while the connection is open and the gateway is running.
    pub fn ping(&self) -> bool {
        !self.is_closed() && !self.gateway.is_shut_down()
    }

    /// Close the connection. Calling this again has no effect.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::trace!("federation connection closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
