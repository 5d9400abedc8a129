//! `nova clean` command

use anyhow::Result;

use super::Session;
use crate::cli::CleanArgs;
use nova::config::manifest::CLEAN_TARGET;

pub fn execute(session: &Session, args: CleanArgs) -> Result<()> {
    let graph = session.configure()?;
    let target = graph.resolve(Some(CLEAN_TARGET))?;
    session.build(&graph, &target, session.options(args.jobs, None))?;
    Ok(())
}
