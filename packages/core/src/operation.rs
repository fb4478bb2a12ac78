//! Path-addressed requests and their responses.
//!
//! A [`Request`] pairs a [`Command`] with an optional workspace name. An
//! [`Operation`] is either one request or a composite batch; executing one
//! yields an [`OperationResult`] with an outcome per member.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Node, Path, Value};

/// The catalog of graph commands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Read a node's properties and children.
    ReadNode { at: Path },
    /// Read the paths of a node's children.
    ReadChildren { of: Path },
    ReadProperty { on: Path, name: String },
    VerifyNodeExists { at: Path },
    /// Create a child named `name` under `under`. An existing sibling with
    /// the same name gives the new node the next index.
    CreateNode {
        under: Path,
        name: String,
        #[serde(default)]
        properties: BTreeMap<String, Value>,
    },
    /// Set properties; a `None` value removes the property.
    UpdateProperties {
        on: Path,
        properties: BTreeMap<String, Option<Value>>,
    },
    /// Delete a node and everything below it. Deleting the root removes
    /// its properties and children but keeps the root itself.
    DeleteBranch { at: Path },
}

impl Command {
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Command::ReadNode { .. }
                | Command::ReadChildren { .. }
                | Command::ReadProperty { .. }
                | Command::VerifyNodeExists { .. }
        )
    }

    /// The path that decides where the command is routed. For
    /// `CreateNode` this is the parent.
    pub fn path(&self) -> &Path {
        match self {
            Command::ReadNode { at }
            | Command::VerifyNodeExists { at }
            | Command::DeleteBranch { at } => at,
            Command::ReadChildren { of } => of,
            Command::ReadProperty { on, .. } | Command::UpdateProperties { on, .. } => on,
            Command::CreateNode { under, .. } => under,
        }
    }

    /// The same command addressed at another path.
    #[must_use]
    pub fn with_path(&self, path: Path) -> Command {
        let mut command = self.clone();
        match &mut command {
            Command::ReadNode { at }
            | Command::VerifyNodeExists { at }
            | Command::DeleteBranch { at } => *at = path,
            Command::ReadChildren { of } => *of = path,
            Command::ReadProperty { on, .. } | Command::UpdateProperties { on, .. } => *on = path,
            Command::CreateNode { under, .. } => *under = path,
        }
        command
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::ReadNode { .. } => "read_node",
            Command::ReadChildren { .. } => "read_children",
            Command::ReadProperty { .. } => "read_property",
            Command::VerifyNodeExists { .. } => "verify_node_exists",
            Command::CreateNode { .. } => "create_node",
            Command::UpdateProperties { .. } => "update_properties",
            Command::DeleteBranch { .. } => "delete_branch",
        }
    }
}

/// A command addressed to a workspace. `None` means the default one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    pub fn new(command: Command) -> Self {
        Request {
            workspace: None,
            command,
        }
    }

    pub fn in_workspace(workspace: impl Into<String>, command: Command) -> Self {
        Request {
            workspace: Some(workspace.into()),
            command,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.command.is_read_only()
    }

    pub fn path(&self) -> &Path {
        self.command.path()
    }
}

/// A single request or a composite batch.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Single(Request),
    Composite(Vec<Request>),
}

impl Operation {
    /// Number of member requests; 1 for a single request.
    pub fn size(&self) -> usize {
        match self {
            Operation::Single(_) => 1,
            Operation::Composite(requests) => requests.len(),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Operation::Composite(_))
    }

    pub fn is_read_only(&self) -> bool {
        self.requests().iter().all(Request::is_read_only)
    }

    pub fn requests(&self) -> &[Request] {
        match self {
            Operation::Single(request) => std::slice::from_ref(request),
            Operation::Composite(requests) => requests,
        }
    }

    pub fn into_requests(self) -> Vec<Request> {
        match self {
            Operation::Single(request) => vec![request],
            Operation::Composite(requests) => requests,
        }
    }
}

impl From<Request> for Operation {
    fn from(request: Request) -> Self {
        Operation::Single(request)
    }
}

impl From<Vec<Request>> for Operation {
    fn from(requests: Vec<Request>) -> Self {
        Operation::Composite(requests)
    }
}

/// The successful result of one command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum Response {
    Node(Node),
    Children { of: Path, children: Vec<Path> },
    Property {
        on: Path,
        name: String,
        value: Option<Value>,
    },
    Exists { at: Path, exists: bool },
    /// The path actually created, including any assigned index.
    Created { path: Path },
    Updated { on: Path },
    Deleted { at: Path },
}

/// Per-member outcomes of an [`Operation`], in member order.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationResult {
    outcomes: Vec<Result<Response, Error>>,
}

impl OperationResult {
    pub fn new(outcomes: Vec<Result<Response, Error>>) -> Self {
        OperationResult { outcomes }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// True if every member succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(Result::is_ok)
    }

    pub fn first_error(&self) -> Option<&Error> {
        self.outcomes.iter().find_map(|o| o.as_ref().err())
    }

    pub fn get(&self, index: usize) -> Option<&Result<Response, Error>> {
        self.outcomes.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Result<Response, Error>> {
        self.outcomes.iter()
    }

    pub fn into_outcomes(self) -> Vec<Result<Response, Error>> {
        self.outcomes
    }

    /// The outcome of the only member, for single-request operations.
    pub fn into_single(self) -> Result<Response, Error> {
        self.outcomes
            .into_iter()
            .next()
            .unwrap_or_else(|| Err(Error::execution("operation produced no outcome")))
    }
}

impl IntoIterator for OperationResult {
    type Item = Result<Response, Error>;
    type IntoIter = std::vec::IntoIter<Result<Response, Error>>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}
