//! `nova targets` command

use anyhow::Result;

use super::Session;
use crate::cli::TargetsArgs;
use nova::core::NamespaceInfo;
use nova::util::fs::relative_path;
use nova::{BuildGraph, ConfigError, TargetId};

pub fn execute(session: &Session, args: TargetsArgs) -> Result<()> {
    let graph = session.configure()?;

    let namespaces: Vec<&NamespaceInfo> = match &args.namespace {
        Some(name) => vec![graph
            .namespace(name)
            .ok_or_else(|| ConfigError::UnknownNamespace { name: name.clone() })?],
        None => graph.namespaces().iter().collect(),
    };

    for ns in namespaces {
        let targets: Vec<(&TargetId, Option<&str>)> = ns
            .targets()
            .iter()
            .map(|id| (id, graph.graph().recipe(id).map(|r| r.name())))
            .filter(|(id, recipe)| args.all || recipe.is_some() || id.is_pseudo())
            .collect();

        if session.shell.is_json() {
            let value = serde_json::json!({
                "reason": "namespace",
                "name": ns.name,
                "root": ns.root,
                "default": ns.default.as_ref().map(ToString::to_string),
                "imports": ns.imports,
                "targets": targets
                    .iter()
                    .map(|(id, recipe)| serde_json::json!({
                        "target": id.to_string(),
                        "recipe": recipe,
                    }))
                    .collect::<Vec<_>>(),
            });
            session.shell.json_event(&value);
            continue;
        }

        print_namespace(session, &graph, ns, &targets);
    }
    Ok(())
}

fn print_namespace(
    session: &Session,
    graph: &BuildGraph,
    ns: &NamespaceInfo,
    targets: &[(&TargetId, Option<&str>)],
) {
    let shell = &session.shell;
    shell.print_out(format!("{} ({})", ns.name, ns.root.display()));
    if let Some(default) = &ns.default {
        shell.print_out(format!("  default: {default}"));
    }
    if !ns.imports.is_empty() {
        shell.print_out(format!("  imports: {}", ns.imports.join(", ")));
    }

    for (id, recipe) in targets {
        let shown = match id.path() {
            Some(path) => relative_path(&ns.root, path).display().to_string(),
            None => id.to_string(),
        };
        let owner = graph.owner(id).filter(|owner| *owner != ns.name);
        match (recipe, owner) {
            (Some(recipe), None) => shell.print_out(format!("  {shown} [{recipe}]")),
            (Some(recipe), Some(owner)) => {
                shell.print_out(format!("  {shown} [{recipe} in {owner}]"))
            }
            (None, _) => shell.print_out(format!("  {shown}")),
        }
    }
}
