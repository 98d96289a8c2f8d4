//! Job queue
//!
//! [`JobQueue`] is the seam components schedule work through.
//! [`LocalJobQueue`] keeps jobs in memory and runs them on demand, in
//! dependency order, through a caller-supplied [`JobHandler`].
//!
//! ## Guarantees
//!
//! - Job ids are unique; resubmitting an id is rejected
//! - Dependencies must already be known when a job is submitted
//! - A job runs only after all its dependencies succeeded
//! - Dependents of a failed job are marked failed without running

use crate::error::{JobError, Result};
use crate::job::{Job, JobStatus};
use parking_lot::Mutex;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Accepts jobs for later execution.
pub trait JobQueue: Send + Sync {
    /// Enqueue `job` after `dependencies`; returns the job id.
    fn submit(&self, job: Job, dependencies: &[String]) -> Result<String>;
}

/// Executes one job.
pub trait JobHandler {
    /// Run `job`. An error marks it failed.
    fn handle(&self, job: &Job) -> Result<()>;
}

impl<F> JobHandler for F
where
    F: Fn(&Job) -> Result<()>,
{
    fn handle(&self, job: &Job) -> Result<()> {
        self(job)
    }
}

/// Outcome of [`LocalJobQueue::run_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ids that succeeded, in execution order
    pub succeeded: Vec<String>,
    /// Ids that failed (directly or through a dependency), in execution order
    pub failed: Vec<String>,
}

impl RunSummary {
    /// Total jobs processed
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

#[derive(Debug, Default)]
struct QueueState {
    jobs: Vec<Job>,
    index: HashMap<String, usize>,
}

impl QueueState {
    fn get(&self, id: &str) -> Option<&Job> {
        self.index.get(id).map(|&i| &self.jobs[i])
    }

    fn set_status(&mut self, id: &str, status: JobStatus, error: Option<String>) {
        if let Some(&i) = self.index.get(id) {
            self.jobs[i].status = status;
            self.jobs[i].error = error;
        }
    }
}

/// In-process job queue.
#[derive(Debug, Default)]
pub struct LocalJobQueue {
    state: Mutex<QueueState>,
}

impl LocalJobQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Status of a job
    pub fn status(&self, id: &str) -> Option<JobStatus> {
        self.state.lock().get(id).map(|j| j.status)
    }

    /// Snapshot of a job
    pub fn get(&self, id: &str) -> Option<Job> {
        self.state.lock().get(id).cloned()
    }

    /// Snapshot of every job, in submission order
    pub fn jobs(&self) -> Vec<Job> {
        self.state.lock().jobs.clone()
    }

    /// Number of jobs not yet run
    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .count()
    }

    /// Total jobs ever submitted
    pub fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }

    /// True when nothing was ever submitted
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every pending job in dependency order.
    ///
    /// The handler runs without the queue lock held, so it may submit new
    /// jobs; those are picked up by the next call.
    pub fn run_all(&self, handler: &dyn JobHandler) -> Result<RunSummary> {
        let order = self.pending_order()?;
        let mut summary = RunSummary::default();

        for id in order {
            let job = {
                let mut state = self.state.lock();
                let Some(job) = state.get(&id).cloned() else {
                    continue;
                };
                if job.status != JobStatus::Pending {
                    continue;
                }
                let failed_dep = job.dependencies.iter().find(|dep| {
                    state.get(dep).map(|d| d.status) != Some(JobStatus::Success)
                });
                if let Some(dep) = failed_dep {
                    let reason = format!("dependency {} did not succeed", dep);
                    warn!(job = %id, dependency = %dep, "Skipping job: dependency did not succeed");
                    state.set_status(&id, JobStatus::Failed, Some(reason));
                    summary.failed.push(id);
                    continue;
                }
                state.set_status(&id, JobStatus::Running, None);
                job
            };

            debug!(job = %job.id, task = job.kind.name(), "Running job");
            let outcome = handler.handle(&job);

            let mut state = self.state.lock();
            match outcome {
                Ok(()) => {
                    state.set_status(&job.id, JobStatus::Success, None);
                    summary.succeeded.push(job.id);
                }
                Err(e) => {
                    warn!(job = %job.id, task = job.kind.name(), error = %e, "Job failed");
                    state.set_status(&job.id, JobStatus::Failed, Some(e.to_string()));
                    summary.failed.push(job.id);
                }
            }
        }

        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            "Job run complete"
        );
        Ok(summary)
    }

    /// Topological order of the pending jobs.
    fn pending_order(&self) -> Result<Vec<String>> {
        let state = self.state.lock();
        let pending: Vec<&Job> = state
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .collect();

        let mut graph = DiGraph::<&str, ()>::new();
        let nodes: HashMap<&str, _> = pending
            .iter()
            .map(|j| (j.id.as_str(), graph.add_node(j.id.as_str())))
            .collect();

        // Edge from dependency to dependent; finished dependencies need no edge.
        for job in &pending {
            for dep in &job.dependencies {
                if let (Some(&from), Some(&to)) = (nodes.get(dep.as_str()), nodes.get(job.id.as_str())) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        let sorted = toposort(&graph, None)
            .map_err(|cycle| JobError::CycleDetected(graph[cycle.node_id()].to_string()))?;
        Ok(sorted.into_iter().map(|n| graph[n].to_string()).collect())
    }
}

impl JobQueue for LocalJobQueue {
    fn submit(&self, mut job: Job, dependencies: &[String]) -> Result<String> {
        let mut state = self.state.lock();
        if state.index.contains_key(&job.id) {
            return Err(JobError::DuplicateJob(job.id));
        }
        for dep in dependencies {
            if !state.index.contains_key(dep) {
                return Err(JobError::UnknownDependency {
                    job: job.id,
                    dependency: dep.clone(),
                });
            }
            if !job.dependencies.contains(dep) {
                job.dependencies.push(dep.clone());
            }
        }

        let id = job.id.clone();
        info!(
            job = %id,
            task = job.kind.name(),
            dependencies = job.dependencies.len(),
            "Submitted job"
        );
        let position = state.jobs.len();
        state.index.insert(id.clone(), position);
        state.jobs.push(job);
        Ok(id)
    }
}
