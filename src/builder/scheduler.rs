//! Staleness-aware parallel execution of a build graph.
//!
//! A build runs in two phases:
//!
//! 1. **Planning.** The closure of the requested target is computed on a
//!    private copy of the graph. Every target whose recipe leaves a
//!    dependency listing gets the listed prerequisites injected, and the
//!    closure is recomputed until nothing new turns up. Cycles are reported
//!    here, before any recipe runs.
//! 2. **Execution.** A coordinator on the calling thread owns the state of
//!    every target. Once all prerequisites of a target are satisfied it is
//!    judged; stale targets are handed to a worker pool and report back over
//!    a channel.
//!
//! Staleness rules:
//!
//! - A pseudo-target with a recipe always runs. Pseudo-targets only order
//!   their dependents: they carry no timestamp, never count as changed, and
//!   so never force a rebuild. A file that needs a header must depend on it
//!   directly or learn it from a dependency listing.
//! - A file with a recipe runs when it is missing, when a prerequisite was
//!   rebuilt in this run, or when a prerequisite is newer than it.
//! - A file without a recipe must exist. The exception is a file only known
//!   from a dependency listing: if it disappeared, its dependent is rebuilt
//!   so the listing gets refreshed.
//!
//! Cancellation is strict: after the first failure no new recipe starts,
//! recipes already running finish, and the first failure is the one
//! reported.

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use petgraph::graph::NodeIndex;
use tracing::{debug, info, warn};

use crate::builder::depfile;
use crate::builder::error::BuildError;
use crate::builder::events::{BuildEvent, EventSink, NullSink};
use crate::core::build_graph::BuildGraph;
use crate::core::error::ConfigError;
use crate::core::flags::FlagSet;
use crate::core::graph::{EdgeKind, TargetGraph};
use crate::core::recipe::{Recipe, RecipeContext, RecipeError};
use crate::core::target::TargetId;
use crate::util::fs::modified;

static NULL_SINK: NullSink = NullSink;

/// Knobs for one build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Maximum number of recipes running at once.
    pub jobs: usize,
    /// Upper bound on each external process a recipe spawns.
    pub timeout: Option<Duration>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            timeout: None,
        }
    }
}

impl BuildOptions {
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// What a successful build did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// The requested target.
    pub target: TargetId,
    /// Targets whose recipe ran, in completion order.
    pub executed: Vec<TargetId>,
    /// Targets with a recipe that were already up to date.
    pub fresh: Vec<TargetId>,
}

impl BuildReport {
    pub fn ran(&self, id: &TargetId) -> bool {
        self.executed.contains(id)
    }

    pub fn is_noop(&self) -> bool {
        self.executed.is_empty()
    }
}

/// The state a satisfied target hands to its dependents.
#[derive(Debug, Clone, Copy)]
struct Outcome {
    /// Newest timestamp the target stands for.
    mtime: Option<SystemTime>,
    /// Whether anything it stands for changed during this run.
    changed: bool,
}

impl Outcome {
    /// What a pseudo-target hands its dependents.
    const ORDER_ONLY: Outcome = Outcome {
        mtime: None,
        changed: false,
    };
}

enum Verdict {
    Satisfied(Outcome),
    Run,
}

/// Result a worker sends back to the coordinator.
struct Finished {
    node: NodeIndex,
    result: Result<(), RecipeError>,
    elapsed: Duration,
}

/// Executes targets of a [`BuildGraph`].
pub struct Scheduler<'a> {
    build: &'a BuildGraph,
    options: BuildOptions,
    sink: &'a dyn EventSink,
}

impl<'a> Scheduler<'a> {
    pub fn new(build: &'a BuildGraph, options: BuildOptions) -> Self {
        Scheduler {
            build,
            options,
            sink: &NULL_SINK,
        }
    }

    pub fn with_sink(mut self, sink: &'a dyn EventSink) -> Self {
        self.sink = sink;
        self
    }

    /// Bring `target` and everything it depends on up to date.
    pub fn build(&self, target: &TargetId) -> Result<BuildReport, BuildError> {
        let started = Instant::now();
        let (graph, closure) = self.plan(target)?;

        info!("building {} ({} targets)", target, closure.len());
        self.sink.emit(BuildEvent::BuildStarted {
            target: target.to_string(),
            profile: self.build.env().profile().to_string(),
            total: closure.len() as u64,
        });

        let result = self.execute(&graph, &closure, target);

        let (success, executed, fresh) = match &result {
            Ok(report) => (true, report.executed.len(), report.fresh.len()),
            Err(_) => (false, 0, 0),
        };
        self.sink.emit(BuildEvent::BuildFinished {
            success,
            executed: executed as u64,
            fresh: fresh as u64,
            duration_ms: started.elapsed().as_millis() as u64,
        });
        result
    }

    /// Inject dependency listings until the closure of `target` is stable.
    fn plan(&self, target: &TargetId) -> Result<(TargetGraph, Vec<NodeIndex>), BuildError> {
        let mut graph = self.build.graph().clone();
        let start = graph
            .node_index(target)
            .ok_or_else(|| ConfigError::UnknownTarget {
                namespace: self.build.owner(target).unwrap_or_default().to_string(),
                reference: target.to_string(),
            })?;
        let base = self.build.env().cwd().to_path_buf();

        let mut loaded: HashSet<NodeIndex> = HashSet::new();
        loop {
            let closure = graph.closure_of(start)?;

            let listings: Vec<_> = closure
                .iter()
                .filter(|node| loaded.insert(**node))
                .filter_map(|&node| {
                    let id = &graph.node(node).id;
                    let recipe = graph.node(node).recipe()?;
                    recipe.dependency_listing(id).map(|path| (id.clone(), path))
                })
                .collect();

            let mut added = 0;
            for (id, listing) in listings {
                added += depfile::inject(&mut graph, &id, &listing, &base);
            }
            if added == 0 {
                debug!("planned {} targets for {}", closure.len(), target);
                return Ok((graph, closure));
            }
            debug!("{} discovered prerequisites, recomputing closure", added);
        }
    }

    fn execute(
        &self,
        graph: &TargetGraph,
        closure: &[NodeIndex],
        requested: &TargetId,
    ) -> Result<BuildReport, BuildError> {
        let members: HashSet<NodeIndex> = closure.iter().copied().collect();
        let mut waiting: HashMap<NodeIndex, usize> = closure
            .iter()
            .map(|&node| (node, graph.children(node).len()))
            .collect();
        let mut ready: VecDeque<NodeIndex> = closure
            .iter()
            .copied()
            .filter(|node| waiting.get(node) == Some(&0))
            .collect();

        let mut outcomes: HashMap<NodeIndex, Outcome> = HashMap::new();
        let mut executed = Vec::new();
        let mut fresh = Vec::new();
        let mut failure: Option<BuildError> = None;

        let jobs = self.options.jobs.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("nova-worker-{i}"))
            .build()?;
        let empty_flags = FlagSet::new();
        let (tx, rx) = mpsc::channel::<Finished>();

        pool.in_place_scope(|scope| {
            let mut running = 0usize;

            loop {
                while failure.is_none() && running < jobs {
                    let Some(node) = ready.pop_front() else {
                        break;
                    };
                    match self.judge(graph, node, &members, &outcomes) {
                        Ok(Verdict::Satisfied(outcome)) => {
                            let id = &graph.node(node).id;
                            if graph.node(node).recipe().is_some() {
                                debug!("{} is up to date", id);
                                fresh.push(id.clone());
                            }
                            outcomes.insert(node, outcome);
                            release(graph, node, &mut waiting, &mut ready);
                        }
                        Ok(Verdict::Run) => {
                            let Some(recipe) = graph.node(node).recipe().cloned() else {
                                continue;
                            };
                            self.spawn(scope, graph, node, recipe, &empty_flags, tx.clone());
                            running += 1;
                        }
                        Err(e) => failure = Some(e),
                    }
                }

                if running == 0 {
                    break;
                }
                let Ok(finished) = rx.recv() else {
                    break;
                };
                running -= 1;

                let node = finished.node;
                let id = &graph.node(node).id;
                let namespace = self.build.owner(id).unwrap_or_default().to_string();
                match finished.result {
                    Ok(()) => {
                        let recipe = graph
                            .node(node)
                            .recipe()
                            .map(|r| r.name().to_string())
                            .unwrap_or_default();
                        debug!("{} finished in {:?}", id, finished.elapsed);
                        self.sink.emit(BuildEvent::TargetFinished {
                            target: id.to_string(),
                            namespace,
                            recipe,
                            duration_ms: finished.elapsed.as_millis() as u64,
                        });
                        let outcome = after_run(graph, node);
                        outcomes.insert(node, outcome);
                        executed.push(id.clone());
                        release(graph, node, &mut waiting, &mut ready);
                    }
                    Err(source) => {
                        self.sink.emit(BuildEvent::TargetFailed {
                            target: id.to_string(),
                            namespace: namespace.clone(),
                            message: source.to_string(),
                        });
                        if failure.is_none() {
                            failure = Some(BuildError::RecipeExecution {
                                target: id.to_string(),
                                namespace,
                                source,
                            });
                        } else {
                            warn!("`{}` also failed: {}", id, source);
                        }
                    }
                }
            }
        });

        if let Some(failure) = failure {
            return Err(failure);
        }
        Ok(BuildReport {
            target: requested.clone(),
            executed,
            fresh,
        })
    }

    /// Decide whether `node` is satisfied or has to run.
    fn judge(
        &self,
        graph: &TargetGraph,
        node: NodeIndex,
        members: &HashSet<NodeIndex>,
        outcomes: &HashMap<NodeIndex, Outcome>,
    ) -> Result<Verdict, BuildError> {
        let target = graph.node(node);
        let inherited = inherited(graph, node, outcomes);
        let Outcome {
            mtime: newest,
            changed,
        } = inherited;

        let Some(path) = target.id.path() else {
            if target.recipe().is_some() {
                return Ok(Verdict::Run);
            }
            return Ok(Verdict::Satisfied(Outcome::ORDER_ONLY));
        };

        let own = modified(path).map_err(|source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if target.recipe().is_some() {
            let stale = match own {
                None => true,
                Some(own) => changed || newest.is_some_and(|newest| newest > own),
            };
            if stale {
                debug!(
                    "{} is stale (exists: {}, prerequisite changed: {})",
                    target.id,
                    own.is_some(),
                    changed
                );
                return Ok(Verdict::Run);
            }
            return Ok(Verdict::Satisfied(Outcome {
                mtime: own,
                changed: false,
            }));
        }

        match own {
            Some(own) => Ok(Verdict::Satisfied(Outcome {
                mtime: newest.max(Some(own)),
                changed,
            })),
            None if target.is_discovered() => {
                debug!("discovered prerequisite {} is gone", target.id);
                Ok(Verdict::Satisfied(Outcome {
                    mtime: newest,
                    changed: true,
                }))
            }
            None => {
                let needed_by = graph
                    .parents(node)
                    .find(|(parent, kind)| members.contains(parent) && *kind == EdgeKind::Declared)
                    .map(|(parent, _)| graph.node(parent).id.to_string());
                Err(BuildError::MissingPrerequisite {
                    target: target.id.to_string(),
                    needed_by,
                })
            }
        }
    }

    fn spawn<'s>(
        &'s self,
        scope: &rayon::Scope<'s>,
        graph: &'s TargetGraph,
        node: NodeIndex,
        recipe: Arc<dyn Recipe>,
        empty_flags: &'s FlagSet,
        tx: mpsc::Sender<Finished>,
    ) {
        let id = &graph.node(node).id;
        let namespace = self.build.owner(id).unwrap_or_default();
        let flags = self.build.flags_for(id).unwrap_or(empty_flags);
        let env = self.build.env();
        let timeout = self.options.timeout;

        let mut prerequisites = Vec::new();
        let mut discovered = Vec::new();
        for (child, kind) in graph.children(node) {
            let child = graph.node(child).id.clone();
            match kind {
                EdgeKind::Declared => prerequisites.push(child),
                EdgeKind::Discovered => discovered.push(child),
            }
        }

        self.sink.emit(BuildEvent::TargetStarted {
            target: id.to_string(),
            namespace: namespace.to_string(),
            recipe: recipe.name().to_string(),
        });
        debug!("running {} for {}", recipe.name(), id);

        scope.spawn(move |_| {
            let ctx = RecipeContext {
                target: id,
                namespace,
                flags,
                env,
                prerequisites: &prerequisites,
                discovered: &discovered,
                timeout,
            };
            let started = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(|| recipe.execute(&ctx)))
                .unwrap_or_else(|payload| {
                    Err(RecipeError::Other(anyhow::anyhow!(
                        "recipe `{}` panicked: {}",
                        recipe.name(),
                        panic_message(payload.as_ref())
                    )))
                });
            // The coordinator only stops listening once nothing is running.
            let _ = tx.send(Finished {
                node,
                result,
                elapsed: started.elapsed(),
            });
        });
    }
}

/// Mark `node` satisfied for its dependents inside the closure.
fn release(
    graph: &TargetGraph,
    node: NodeIndex,
    waiting: &mut HashMap<NodeIndex, usize>,
    ready: &mut VecDeque<NodeIndex>,
) {
    for (parent, _) in graph.parents(node) {
        if let Some(count) = waiting.get_mut(&parent) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                ready.push_back(parent);
            }
        }
    }
}

/// Newest timestamp and change state over the prerequisites of `node`.
fn inherited(
    graph: &TargetGraph,
    node: NodeIndex,
    outcomes: &HashMap<NodeIndex, Outcome>,
) -> Outcome {
    let mut inherited = Outcome {
        mtime: None,
        changed: false,
    };
    for (child, _) in graph.children(node) {
        if let Some(outcome) = outcomes.get(&child) {
            inherited.mtime = inherited.mtime.max(outcome.mtime);
            inherited.changed |= outcome.changed;
        }
    }
    inherited
}

/// Outcome of a target whose recipe just succeeded.
fn after_run(graph: &TargetGraph, node: NodeIndex) -> Outcome {
    let id = &graph.node(node).id;
    let Some(path) = id.path() else {
        return Outcome::ORDER_ONLY;
    };
    let mtime = match modified(path) {
        Ok(Some(mtime)) => mtime,
        Ok(None) | Err(_) => {
            warn!("recipe for {} succeeded but did not create it", id);
            SystemTime::now()
        }
    };
    Outcome {
        mtime: Some(mtime),
        changed: true,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
