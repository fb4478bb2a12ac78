//! The boundary to backing content sources.

use std::sync::Arc;

use crate::{Error, Request, Response};

/// An open session with one backing source.
///
/// A connection is used by one worker at a time, so it only needs to be
/// `Send`.
pub trait Connection: Send {
    /// Name of the source this connection talks to.
    fn source_name(&self) -> &str;

    /// Execute one request against the source.
    fn execute(&mut self, request: &Request) -> Result<Response, Error>;

    /// Release the connection. Calling this more than once has no effect.
    fn close(&mut self);
}

/// Opens connections to named sources.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn WorkSource>`.
pub trait WorkSource: Send + Sync {
    fn create_connection(&self, source_name: &str) -> Result<Box<dyn Connection>, Error>;
}

impl<W: WorkSource + ?Sized> WorkSource for Arc<W> {
    fn create_connection(&self, source_name: &str) -> Result<Box<dyn Connection>, Error> {
        (**self).create_connection(source_name)
    }
}

impl<W: WorkSource + ?Sized> WorkSource for Box<W> {
    fn create_connection(&self, source_name: &str) -> Result<Box<dyn Connection>, Error> {
        (**self).create_connection(source_name)
    }
}
