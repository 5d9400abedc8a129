//! `nova flags` command

use anyhow::Result;

use super::Session;
use crate::cli::FlagsArgs;
use nova::ConfigError;

pub fn execute(session: &Session, args: FlagsArgs) -> Result<()> {
    let graph = session.configure()?;
    let ns = graph
        .namespace(&args.namespace)
        .ok_or_else(|| ConfigError::UnknownNamespace {
            name: args.namespace.clone(),
        })?;

    if session.shell.is_json() {
        let value = serde_json::json!({
            "reason": "flags",
            "namespace": ns.name,
            "flags": ns.flags,
        });
        session.shell.json_event(&value);
        return Ok(());
    }

    if ns.flags.is_empty() {
        session.shell.note(format!("namespace `{}` has no flags", ns.name));
        return Ok(());
    }
    for (class, flags) in ns.flags.classes() {
        if !flags.is_empty() {
            session.shell.print_out(format!("{class}: {}", flags.join(" ")));
        }
    }
    Ok(())
}
