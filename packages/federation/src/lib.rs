//! Federation of independent graph sources into one namespace.
//!
//! A [`FederationGateway`] holds named [`FederatedWorkspace`]s. Each
//! workspace is an ordered list of [`Projection`]s, and each projection
//! mounts subtrees of one source at federated paths through its
//! [`ProjectionRule`]s:
//!
//! ```text
//! /          => /            mirror the whole source
//! /Aircraft  => /Vehicles/Air  graft a subtree at /Aircraft
//! ```
//!
//! Callers talk to a [`FederationConnection`]. Single requests are run
//! inline; composite batches go through the [`Dispatcher`], which forks the
//! batch into one [`Channel`] per source, drains every channel on the
//! gateway's [`WorkerPool`], and joins the results back into federated
//! paths.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use fedstore_core::{path, Command, Operation, Request, Response};
//! use fedstore_federation::{FederationGateway, GatewayConfig};
//! use fedstore_memory::InMemoryRepository;
//!
//! let config = GatewayConfig::from_json(r#"{
//!     "name": "fleet",
//!     "workspaces": [{
//!         "name": "main",
//!         "projections": [{ "source_name": "cars", "rules": ["/ => /"] }]
//!     }]
//! }"#).unwrap();
//!
//! let source = InMemoryRepository::new().with_source("cars", &[]);
//! let gateway = FederationGateway::start(config, Arc::new(source)).unwrap();
//! let connection = gateway.connect();
//!
//! let result = connection
//!     .submit(&Operation::from(Request::new(Command::ReadChildren { of: path!("/") })))
//!     .unwrap();
//! assert_eq!(
//!     result.into_single().unwrap(),
//!     Response::Children { of: path!("/"), children: vec![] }
//! );
//! ```

mod channel;
mod config;
mod connection;
mod dispatcher;
mod gateway;
mod pool;
mod projection;
mod workspace;

pub use channel::{Channel, ChannelIter, CompletionLatch, QueuedRequest, Ticket};
pub use config::{CacheConfig, GatewayConfig, ProjectionConfig, WorkspaceConfig};
pub use connection::FederationConnection;
pub use dispatcher::Dispatcher;
pub use gateway::FederationGateway;
pub use pool::WorkerPool;
pub use projection::{Projection, ProjectionRule};
pub use workspace::{CachePolicy, CacheProjection, Contribution, FederatedWorkspace, ProjectedNode};
