//! The `fedstore` subcommands. Each writes its report to `out`.

use std::io::Write;
use std::sync::Arc;

use fedstore_core::{Command, Connection, Error, Operation, Path, Request, Response};
use fedstore_federation::{Contribution, FederationGateway, GatewayConfig, ProjectionConfig};
use fedstore_memory::InMemoryRepository;
use fedstore_path_expr::{
    remove_all_predicates_except_indexes, remove_unused_predicates, ExpressionError, PathPattern,
    RepositoryPath,
};

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    Fedstore(#[from] Error),

    #[error("node '{0}' must name its source, as in 'source:workspace:/path'")]
    UnqualifiedNode(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Match each path against an expression.
pub fn match_paths(expression: &str, paths: &[String], out: &mut impl Write) -> Result<()> {
    let pattern = PathPattern::compile(expression)?;
    for path in paths {
        let matched = pattern.matcher(path);
        if !matched.matches() {
            writeln!(out, "{}: no match", path)?;
            continue;
        }
        writeln!(
            out,
            "{}: selected {}",
            path,
            matched.selected_node_path().unwrap_or("-")
        )?;
        if let Some(repository) = matched.selected_repository_name() {
            writeln!(out, "  repository {}", repository)?;
        }
        if let Some(workspace) = matched.selected_workspace_name() {
            writeln!(out, "  workspace {}", workspace)?;
        }
        for n in 1..=matched.group_count() {
            writeln!(out, "  group {} {}", n, matched.group(n).unwrap_or("-"))?;
        }
    }
    Ok(())
}

/// Print both predicate-stripping forms of an expression.
pub fn strip(expression: &str, out: &mut impl Write) -> Result<()> {
    writeln!(out, "unused removed:  {}", remove_unused_predicates(expression))?;
    writeln!(
        out,
        "indexes only:    {}",
        remove_all_predicates_except_indexes(expression)
    )?;
    Ok(())
}

/// Print the entries each federated path resolves to.
pub fn resolve(
    config: &GatewayConfig,
    workspace: Option<&str>,
    paths: &[String],
    out: &mut impl Write,
) -> Result<()> {
    let workspaces = config.build_workspaces()?;
    let workspace = match workspace {
        None => workspaces.first(),
        Some(name) => workspaces.iter().find(|w| w.name() == name),
    }
    .ok_or_else(|| Error::InvalidWorkspace {
        name: workspace.unwrap_or_default().to_string(),
    })?;

    for path in paths {
        let path = Path::parse(path)?;
        writeln!(out, "{}", path)?;
        match workspace.resolve(&path) {
            Ok(entries) => {
                for entry in entries {
                    let contribution = match entry.contribution {
                        Contribution::Full => "full",
                        Contribution::Placeholder => "placeholder",
                    };
                    writeln!(
                        out,
                        "  [{}] {}:{}:{} {} via {}{}",
                        entry.ordinal,
                        entry.source_name,
                        entry.workspace_name.as_deref().unwrap_or(""),
                        entry.source_path,
                        contribution,
                        entry.rule,
                        if entry.read_only { " (read-only)" } else { "" }
                    )?;
                }
            }
            Err(e) => writeln!(out, "  {}", e)?,
        }
    }
    Ok(())
}

/// Read each path as one batch against an in-memory federation of the
/// configured sources, seeded with `nodes`.
pub fn read(
    config: GatewayConfig,
    workspace: Option<&str>,
    nodes: &[String],
    paths: &[String],
    out: &mut impl Write,
) -> Result<()> {
    let repository = InMemoryRepository::new();
    for projection in config.workspaces.iter().flat_map(|w| {
        w.projections
            .iter()
            .chain(w.cache.as_ref().map(|c| &c.projection))
    }) {
        add_source(&repository, projection)?;
    }
    for node in nodes {
        seed(&repository, node)?;
    }

    let requests = paths
        .iter()
        .map(|path| {
            let command = Command::ReadNode {
                at: Path::parse(path)?,
            };
            Ok(match workspace {
                Some(workspace) => Request::in_workspace(workspace, command),
                None => Request::new(command),
            })
        })
        .collect::<std::result::Result<Vec<_>, Error>>()?;

    let gateway = FederationGateway::start(config, Arc::new(repository))?;
    let connection = gateway.connect();
    let result = connection.submit(&Operation::Composite(requests));
    connection.close();
    gateway.shutdown();

    for (path, outcome) in paths.iter().zip(result?) {
        match outcome {
            Ok(response) => writeln!(out, "{}", serde_json::to_string(&response)?)?,
            Err(e) => writeln!(out, "{}: {}", path, e)?,
        }
    }
    Ok(())
}

fn add_source(repository: &InMemoryRepository, projection: &ProjectionConfig) -> Result<()> {
    let workspaces: Vec<&str> = projection.workspace_name.as_deref().into_iter().collect();
    repository.add_source(&projection.source_name, &workspaces)?;
    Ok(())
}

/// Create a node named `source:workspace:/path`, and any missing
/// ancestors, directly in the repository.
fn seed(repository: &InMemoryRepository, node: &str) -> Result<()> {
    let qualified = RepositoryPath::parse(node);
    let source = qualified
        .repository_name()
        .ok_or_else(|| CliError::UnqualifiedNode(node.to_string()))?;
    let path = Path::parse(qualified.path())?;

    let workspaces: Vec<&str> = qualified.workspace_name().into_iter().collect();
    repository.add_source(source, &workspaces)?;
    let mut connection = repository.connection(source)?;
    let request = |command| match qualified.workspace_name() {
        Some(workspace) => Request::in_workspace(workspace, command),
        None => Request::new(command),
    };

    for depth in 1..=path.len() {
        let at = path.truncate(depth);
        let exists = connection.execute(&request(Command::VerifyNodeExists { at: at.clone() }))?;
        if let Response::Exists { exists: true, .. } = exists {
            continue;
        }
        let (Some(under), Some(segment)) = (at.parent(), at.last_segment()) else {
            continue;
        };
        connection.execute(&request(Command::CreateNode {
            under,
            name: segment.name().to_string(),
            properties: Default::default(),
        }))?;
    }
    connection.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLEET: &str = r#"{
        "workspaces": [{ "name": "main", "projections": [
            { "source_name": "cars", "rules": ["/ => /"] },
            { "source_name": "planes", "workspace_name": "live", "read_only": true,
              "rules": ["/Aircraft => /Vehicles/Air"] }
        ]}]
    }"#;

    fn output(run: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut out = Vec::new();
        run(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn match_reports_selection_and_groups() {
        let text = output(|out| {
            match_paths("/a(//c)[d/e/@x]", &strings(&["/a/b/c/d/e/@x", "/x"]), out)
        });
        assert_eq!(
            text,
            "/a/b/c/d/e/@x: selected /a/b/c\n  group 1 /b/c\n/x: no match\n"
        );
    }

    #[test]
    fn match_rejects_bad_expression() {
        let mut out = Vec::new();
        assert!(matches!(
            match_paths("", &[], &mut out),
            Err(CliError::Expression(ExpressionError::Blank))
        ));
    }

    #[test]
    fn strip_prints_both_forms() {
        let text = output(|out| strip("/a/b/c[@title]", out));
        assert_eq!(
            text,
            "unused removed:  /a/b/c[@title]\nindexes only:    /a/b/c\n"
        );
    }

    #[test]
    fn resolve_lists_owner_and_placeholders() {
        let config = GatewayConfig::from_json(FLEET).unwrap();
        let text = output(|out| resolve(&config, None, &strings(&["/", "/Aircraft/B-52"]), out));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "/");
        assert!(lines[1].contains("cars::/ full"));
        assert!(lines[2].contains("planes:live:/Vehicles/Air placeholder"));
        assert!(lines[2].ends_with("(read-only)"));
        assert_eq!(lines[3], "/Aircraft/B-52");
        assert!(lines[4].contains("planes:live:/Vehicles/Air/B-52 full"));
    }

    #[test]
    fn resolve_unknown_workspace() {
        let config = GatewayConfig::from_json(FLEET).unwrap();
        let mut out = Vec::new();
        assert!(matches!(
            resolve(&config, Some("nope"), &[], &mut out),
            Err(CliError::Fedstore(Error::InvalidWorkspace { .. }))
        ));
    }

    #[test]
    fn read_seeded_federation() {
        let config = GatewayConfig::from_json(FLEET).unwrap();
        let text = output(|out| {
            read(
                config,
                None,
                &strings(&["cars::/Cars/Hybrid", "planes:live:/Vehicles/Air/B-52"]),
                &strings(&["/", "/Aircraft", "/Boats"]),
                out,
            )
        });
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);

        let root: Response = serde_json::from_str(lines[0]).unwrap();
        let Response::Node(root) = root else {
            panic!("expected a node, got {:?}", root);
        };
        assert_eq!(
            root.children,
            vec![Path::parse("/Cars").unwrap(), Path::parse("/Aircraft").unwrap()]
        );

        let aircraft: Response = serde_json::from_str(lines[1]).unwrap();
        let Response::Node(aircraft) = aircraft else {
            panic!("expected a node, got {:?}", aircraft);
        };
        assert_eq!(aircraft.children, vec![Path::parse("/Aircraft/B-52").unwrap()]);

        assert!(lines[2].starts_with("/Boats: "));
    }

    #[test]
    fn seed_requires_a_source() {
        let config = GatewayConfig::from_json(FLEET).unwrap();
        let mut out = Vec::new();
        assert!(matches!(
            read(config, None, &strings(&["/Cars"]), &[], &mut out),
            Err(CliError::UnqualifiedNode(_))
        ));
    }
}
