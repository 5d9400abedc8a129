//! `nova build` command

use anyhow::{bail, Result};

use super::Session;
use crate::cli::BuildArgs;
use nova::BuildError;

pub fn execute(session: &Session, args: BuildArgs) -> Result<()> {
    let graph = session.configure()?;
    let target = graph.resolve(args.target.as_deref())?;
    let options = session.options(args.jobs, args.timeout);

    match session.build(&graph, &target, options) {
        Ok(_) => Ok(()),
        // The failing recipe was already reported as it happened.
        Err(BuildError::RecipeExecution { .. }) => bail!("could not build `{target}`"),
        Err(err) => Err(err.into()),
    }
}
