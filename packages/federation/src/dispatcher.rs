//! Fork/join execution of federated requests.
//!
//! Forking plans every member of a batch: it finds the owning projections,
//! rewrites the request into each source namespace, and groups the parts by
//! source. A read goes to every owner of its path, a write only to the first
//! declared one. Joining rewrites each source response back into the
//! federated namespace, merges the owners' responses, and adds the
//! placeholders of deeper mounts.

use std::collections::BTreeMap;
use std::sync::Arc;

use fedstore_core::{
    Command, Connection, Error, Node, OperationResult, Path, Request, Response, Segment,
};

use crate::channel::{connect, Channel, Ticket};
use crate::{FederatedWorkspace, FederationGateway, ProjectedNode};

/// How one member of a batch is carried out.
enum Route {
    /// Planning failed; the member fails without reaching a source.
    Failed(Error),
    /// A placeholder read answered without a source.
    Local(Response),
    /// Sent to the source of every owner taking part.
    Sources(Vec<Part>),
}

/// A member as rewritten for one of its owners.
struct Part {
    owner: ProjectedNode,
    request: Request,
}

/// One member of a batch after planning.
struct FederatedRequest {
    workspace: Option<Arc<FederatedWorkspace>>,
    original: Request,
    route: Route,
}

impl FederatedRequest {
    fn parts(&self) -> &[Part] {
        match &self.route {
            Route::Sources(parts) => parts,
            _ => &[],
        }
    }
}

/// Runs batches of federated requests for one gateway.
pub struct Dispatcher<'a> {
    gateway: &'a FederationGateway,
}

impl<'a> Dispatcher<'a> {
    pub fn new(gateway: &'a FederationGateway) -> Self {
        Dispatcher { gateway }
    }

    /// Run a batch concurrently: one channel per source, each drained on
    /// the gateway's worker pool. Returns once every channel has completed.
    ///
    /// Requests to the same source run in batch order on one connection.
    /// A failing member does not stop the others.
    pub fn dispatch(&self, requests: &[Request]) -> OperationResult {
        let plans = self.fork(requests);

        let mut channels: Vec<(Channel, Option<Error>)> = Vec::new();
        let mut channel_of: BTreeMap<&str, usize> = BTreeMap::new();
        for part in plans.iter().flat_map(FederatedRequest::parts) {
            let source_name = part.owner.source_name.as_str();
            if !channel_of.contains_key(source_name) {
                channel_of.insert(source_name, channels.len());
                let channel = Channel::new(source_name);
                let started = self.start(&channel).err();
                channels.push((channel, started));
            }
        }
        tracing::debug!(
            members = plans.len(),
            channels = channels.len(),
            "dispatching batch"
        );

        let tickets: Vec<Vec<Result<Ticket, Error>>> = plans
            .iter()
            .map(|plan| {
                plan.parts()
                    .iter()
                    .map(|part| {
                        let (channel, failed) =
                            &channels[channel_of[part.owner.source_name.as_str()]];
                        match failed {
                            Some(e) => Err(e.clone()),
                            None => channel.add(part.request.clone()),
                        }
                    })
                    .collect()
            })
            .collect();

        for (channel, _) in &channels {
            channel.done();
        }
        for (channel, failed) in &channels {
            if failed.is_none() {
                channel.await_completion();
            }
        }

        let outcomes = plans
            .into_iter()
            .zip(tickets)
            .map(|(plan, tickets)| {
                let outcomes = tickets
                    .into_iter()
                    .map(|ticket| {
                        ticket.and_then(|ticket| {
                            ticket
                                .outcome()
                                .unwrap_or_else(|| Err(Error::execution("request did not run")))
                        })
                    })
                    .collect();
                join(plan, outcomes)
            })
            .collect();
        OperationResult::new(outcomes)
    }

    /// Run a batch on the calling thread, one connection per source.
    pub fn execute_inline(&self, requests: &[Request]) -> OperationResult {
        let plans = self.fork(requests);
        let mut connections: BTreeMap<String, Result<Box<dyn Connection>, Error>> =
            BTreeMap::new();

        let outcomes = plans
            .into_iter()
            .map(|plan| {
                let outcomes = plan
                    .parts()
                    .iter()
                    .map(|part| {
                        let source_name = &part.owner.source_name;
                        let connection =
                            connections.entry(source_name.clone()).or_insert_with(|| {
                                connect(
                                    self.gateway.work_source().as_ref(),
                                    source_name,
                                    self.gateway.retry_limit(),
                                )
                            });
                        match connection {
                            Ok(connection) => connection.execute(&part.request),
                            Err(e) => Err(e.clone()),
                        }
                    })
                    .collect();
                join(plan, outcomes)
            })
            .collect();

        for connection in connections.values_mut().filter_map(|c| c.as_mut().ok()) {
            connection.close();
        }
        OperationResult::new(outcomes)
    }

    fn start(&self, channel: &Channel) -> Result<(), Error> {
        let pool = self.gateway.pool()?;
        channel.start(
            &pool,
            Arc::clone(self.gateway.work_source()),
            self.gateway.retry_limit(),
        )
    }

    /// Plan every member of a batch.
    fn fork(&self, requests: &[Request]) -> Vec<FederatedRequest> {
        requests
            .iter()
            .map(|request| match self.gateway.workspace(request.workspace.as_deref()) {
                Ok(workspace) => {
                    let route = plan(&workspace, request);
                    FederatedRequest {
                        workspace: Some(workspace),
                        original: request.clone(),
                        route,
                    }
                }
                Err(e) => FederatedRequest {
                    workspace: None,
                    original: request.clone(),
                    route: Route::Failed(e),
                },
            })
            .collect()
    }
}

fn plan(workspace: &FederatedWorkspace, request: &Request) -> Route {
    let path = request.path();
    if let Some(route) = plan_mount_create(workspace, &request.command) {
        return route;
    }

    let mut owners = workspace.owners(path);
    let Some(first) = owners.first() else {
        if !workspace.is_placeholder(path) {
            return Route::Failed(Error::NoSourceForPath { path: path.clone() });
        }
        return match placeholder_response(workspace, &request.command) {
            Ok(response) => Route::Local(response),
            Err(e) => Route::Failed(e),
        };
    };
    if !request.is_read_only() {
        if first.read_only {
            return Route::Failed(Error::ReadOnly { path: path.clone() });
        }
        owners.truncate(1);
    }

    let parts = owners
        .into_iter()
        .map(|owner| {
            let request = Request {
                workspace: owner.workspace_name.clone(),
                command: request.command.with_path(owner.source_path.clone()),
            };
            tracing::trace!(
                command = request.command.name(),
                %path,
                source = %owner.source_name,
                source_path = %owner.source_path,
                "routed"
            );
            Part { owner, request }
        })
        .collect();
    Route::Sources(parts)
}

/// Route a create whose new node would sit exactly on a mount point to the
/// first rule mounted there, as a create of that rule's source path.
fn plan_mount_create(workspace: &FederatedWorkspace, command: &Command) -> Option<Route> {
    let Command::CreateNode {
        under,
        name,
        properties,
    } = command
    else {
        return None;
    };
    let target = under.child(Segment::try_new(name.clone(), 1).ok()?);
    let owner = workspace.mounted_at(&target).into_iter().next()?;

    // A mount of the source root always exists and cannot be created.
    let (Some(parent), Some(last)) = (owner.source_path.parent(), owner.source_path.last_segment())
    else {
        return Some(Route::Failed(Error::ReadOnly { path: target }));
    };
    if owner.read_only {
        return Some(Route::Failed(Error::ReadOnly { path: target }));
    }

    let request = Request {
        workspace: owner.workspace_name.clone(),
        command: Command::CreateNode {
            under: parent,
            name: last.name().to_string(),
            properties: properties.clone(),
        },
    };
    tracing::trace!(
        path = %target,
        source = %owner.source_name,
        source_path = %owner.source_path,
        "routed create of mount point"
    );
    Some(Route::Sources(vec![Part { owner, request }]))
}

/// The response of a read at a path that exists only to reach deeper
/// mounts. Writes there fail.
fn placeholder_response(
    workspace: &FederatedWorkspace,
    command: &Command,
) -> Result<Response, Error> {
    match command {
        Command::ReadNode { at } => Ok(Response::Node(
            Node::new(at.clone()).with_children(workspace.placeholder_children(at)),
        )),
        Command::ReadChildren { of } => Ok(Response::Children {
            of: of.clone(),
            children: workspace.placeholder_children(of),
        }),
        Command::ReadProperty { on, name } => Ok(Response::Property {
            on: on.clone(),
            name: name.clone(),
            value: None,
        }),
        Command::VerifyNodeExists { at } => Ok(Response::Exists {
            at: at.clone(),
            exists: true,
        }),
        other => Err(Error::ReadOnly {
            path: other.path().clone(),
        }),
    }
}

/// Turn a member's source outcomes, one per part, into its federated
/// outcome.
///
/// The responses of the parts that succeeded are merged in declaration
/// order. A member fails only if every part failed.
fn join(plan: FederatedRequest, outcomes: Vec<Result<Response, Error>>) -> Result<Response, Error> {
    let (workspace, parts) = match (plan.route, plan.workspace) {
        (Route::Failed(e), _) => return Err(e),
        (Route::Local(response), _) => return Ok(response),
        (Route::Sources(parts), Some(workspace)) => (workspace, parts),
        (Route::Sources(_), None) => {
            return Err(Error::execution("routed request lost its workspace"))
        }
    };
    let path = plan.original.path();

    let mut merged: Option<Response> = None;
    let mut failure: Option<Error> = None;
    for (part, outcome) in parts.iter().zip(outcomes) {
        let outcome =
            outcome.and_then(|response| to_federation(&workspace, &part.owner, path, response));
        match outcome {
            Ok(response) => {
                merged = Some(match merged {
                    Some(merged) => merge(merged, response),
                    None => response,
                });
            }
            Err(e) => {
                if parts.len() > 1 {
                    tracing::debug!(
                        %path,
                        source = %part.owner.source_name,
                        error = %e,
                        "owner failed"
                    );
                }
                // Report the first real failure over a missing path.
                if failure.as_ref().map_or(true, |f| matches!(f, Error::PathNotFound { .. })) {
                    failure = Some(e);
                }
            }
        }
    }

    if let Some(response) = merged {
        return Ok(with_placeholders(&workspace, path, response));
    }
    match failure {
        Some(Error::PathNotFound { .. })
            if plan.original.is_read_only() && workspace.is_placeholder(path) =>
        {
            placeholder_response(&workspace, &plan.original.command)
        }
        Some(Error::PathNotFound { .. }) => Err(Error::PathNotFound { path: path.clone() }),
        Some(e) => Err(e),
        None => Err(Error::execution("routed request has no outcome")),
    }
}

/// Rewrite one source response into the federated namespace.
fn to_federation(
    workspace: &FederatedWorkspace,
    owner: &ProjectedNode,
    path: &Path,
    response: Response,
) -> Result<Response, Error> {
    Ok(match response {
        Response::Node(node) => Response::Node(Node {
            path: path.clone(),
            properties: node.properties,
            children: projected_children(workspace, owner, &node.children),
        }),
        Response::Children { children, .. } => Response::Children {
            of: path.clone(),
            children: projected_children(workspace, owner, &children),
        },
        Response::Property { name, value, .. } => Response::Property {
            on: path.clone(),
            name,
            value,
        },
        Response::Exists { exists, .. } => Response::Exists {
            at: path.clone(),
            exists,
        },
        Response::Created { path: created } => Response::Created {
            path: owner.rule.path_in_federation(&created).ok_or_else(|| {
                Error::execution(format!(
                    "created {} in source '{}', which the workspace does not project",
                    created, owner.source_name
                ))
            })?,
        },
        Response::Updated { .. } => Response::Updated { on: path.clone() },
        Response::Deleted { .. } => Response::Deleted { at: path.clone() },
    })
}

/// The owner's children that it projects and that no deeper mount hides.
fn projected_children(
    workspace: &FederatedWorkspace,
    owner: &ProjectedNode,
    found: &[Path],
) -> Vec<Path> {
    found
        .iter()
        .filter_map(|child| owner.rule.path_in_federation(child))
        .filter(|child| !workspace.is_shadowed(child))
        .collect()
}

/// Combine the responses of two owners of one path. The first keeps its
/// property values and child order; the second adds what the first lacks.
fn merge(first: Response, second: Response) -> Response {
    match (first, second) {
        (Response::Node(mut node), Response::Node(other)) => {
            for (name, value) in other.properties {
                node.properties.entry(name).or_insert(value);
            }
            extend_unique(&mut node.children, other.children);
            Response::Node(node)
        }
        (
            Response::Children { of, mut children },
            Response::Children {
                children: other, ..
            },
        ) => {
            extend_unique(&mut children, other);
            Response::Children { of, children }
        }
        (Response::Property { on, name, value }, Response::Property { value: other, .. }) => {
            Response::Property {
                on,
                name,
                value: value.or(other),
            }
        }
        (Response::Exists { at, exists }, Response::Exists { exists: other, .. }) => {
            Response::Exists {
                at,
                exists: exists || other,
            }
        }
        (first, _) => first,
    }
}

/// Add the mount points below `path` to a read of it.
fn with_placeholders(workspace: &FederatedWorkspace, path: &Path, response: Response) -> Response {
    match response {
        Response::Node(mut node) => {
            extend_unique(&mut node.children, workspace.placeholder_children(path));
            Response::Node(node)
        }
        Response::Children { of, mut children } => {
            extend_unique(&mut children, workspace.placeholder_children(path));
            Response::Children { of, children }
        }
        Response::Exists { at, exists } => Response::Exists {
            exists: exists || workspace.is_placeholder(&at),
            at,
        },
        other => other,
    }
}

fn extend_unique(paths: &mut Vec<Path>, more: Vec<Path>) {
    for path in more {
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
}
