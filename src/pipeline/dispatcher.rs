//! Sequential and grouped pipeline dispatch.
//!
//! Sequential services run one after another, each awaited to a terminal
//! status before the next is triggered. Then every group runs, in group name
//! order; the members of a group are triggered and polled concurrently, one
//! scoped thread each. A failing member fails its group, but only after every
//! other member has finished.

use super::{CiClient, PipelineHandle, PipelineRun, PipelineStatus, Variable};
use crate::domain::{ConcurrencyClass, Service};
use crate::error::{ReleaseError, Result};
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Services to dispatch, split by concurrency class
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchPlan {
    pub sequential: Vec<Service>,
    pub groups: BTreeMap<String, Vec<Service>>,
}

impl DispatchPlan {
    /// Split services by class, keeping their relative order
    pub fn from_services(services: &[Service]) -> Self {
        let mut plan = DispatchPlan::default();
        for service in services {
            match &service.class {
                ConcurrencyClass::Sequential => plan.sequential.push(service.clone()),
                ConcurrencyClass::Group(name) => plan
                    .groups
                    .entry(name.clone())
                    .or_default()
                    .push(service.clone()),
            }
        }
        plan
    }

    pub fn len(&self) -> usize {
        self.sequential.len() + self.groups.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Branch or tag the pipelines run on
    pub git_ref: String,
    /// Sent with every pipeline
    pub variables: Vec<Variable>,
    /// Sent only when the project does not define the variable itself
    pub override_variable: Option<Variable>,
    pub poll_interval: Duration,
    /// Ceiling on the wait for one pipeline
    pub timeout: Duration,
}

impl DispatchOptions {
    pub fn new(git_ref: impl Into<String>) -> Self {
        DispatchOptions {
            git_ref: git_ref.into(),
            variables: Vec::new(),
            override_variable: None,
            poll_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(60 * 60),
        }
    }
}

/// Runs in completion order
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub runs: Vec<PipelineRun>,
}

impl DispatchReport {
    pub fn run(&self, service: &str) -> Option<&PipelineRun> {
        self.runs.iter().find(|r| r.service == service)
    }
}

/// Progress notifications; all methods default to doing nothing.
///
/// Called from worker threads during group dispatch.
pub trait DispatchObserver: Sync {
    fn group_started(&self, _group: &str, _members: &[Service]) {}
    fn triggered(&self, _service: &Service, _handle: &PipelineHandle) {}
    fn polled(&self, _service: &Service, _status: &PipelineStatus) {}
    fn finished(&self, _run: &PipelineRun) {}
}

impl DispatchObserver for () {}

pub struct PipelineDispatcher<'a> {
    client: &'a dyn CiClient,
    observer: &'a dyn DispatchObserver,
}

impl<'a> PipelineDispatcher<'a> {
    pub fn new(client: &'a dyn CiClient) -> Self {
        PipelineDispatcher {
            client,
            observer: &(),
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn DispatchObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn dispatch(&self, plan: &DispatchPlan, options: &DispatchOptions) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();

        for service in &plan.sequential {
            info!(service = %service.name, git_ref = %options.git_ref, "dispatching sequential service");
            report.runs.push(self.run_service(service, options)?);
        }

        for (group, members) in &plan.groups {
            info!(group = %group, members = members.len(), "dispatching group");
            self.observer.group_started(group, members);
            report.runs.extend(self.run_group(members, options)?);
        }

        Ok(report)
    }

    fn run_group(&self, members: &[Service], options: &DispatchOptions) -> Result<Vec<PipelineRun>> {
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            for service in members {
                let tx = tx.clone();
                scope.spawn(move || {
                    let outcome = self.run_service(service, options);
                    // The receiver outlives the scope
                    let _ = tx.send(outcome);
                });
            }
        });
        drop(tx);

        let mut runs = Vec::new();
        let mut first_failure = None;
        for outcome in rx {
            match outcome {
                Ok(run) => runs.push(run),
                Err(e) => {
                    warn!("{}", e);
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(runs),
        }
    }

    fn trigger_variables(&self, service: &Service, options: &DispatchOptions) -> Result<Vec<Variable>> {
        let mut variables = options.variables.clone();

        if let Some(candidate) = &options.override_variable {
            match self.client.get_variable(&service.project, &candidate.key)? {
                Some(value) if !value.trim().is_empty() => {
                    debug!(service = %service.name, key = %candidate.key, "project defines variable, not overriding");
                }
                _ => variables.push(candidate.clone()),
            }
        }

        Ok(variables)
    }

    fn run_service(&self, service: &Service, options: &DispatchOptions) -> Result<PipelineRun> {
        self.trigger_and_await(service, options)
            .map_err(|e| e.for_service(&service.name))
    }

    fn trigger_and_await(&self, service: &Service, options: &DispatchOptions) -> Result<PipelineRun> {
        let variables = self.trigger_variables(service, options)?;

        let dispatched_at = Instant::now();
        let handle = self
            .client
            .create_pipeline(&service.project, &options.git_ref, &variables)?;
        info!(service = %service.name, pipeline = handle.id, url = %handle.web_url, "pipeline created");
        self.observer.triggered(service, &handle);

        let status = self.await_terminal(service, &handle, options)?;
        let run = PipelineRun {
            service: service.name.clone(),
            pipeline_id: handle.id,
            web_url: handle.web_url,
            status: status.clone(),
            dispatched_at,
            finished_at: Instant::now(),
        };
        self.observer.finished(&run);

        if !status.is_success() {
            return Err(ReleaseError::PipelineFailed {
                id: run.pipeline_id,
                status: status.to_string(),
            });
        }
        Ok(run)
    }

    fn await_terminal(
        &self,
        service: &Service,
        handle: &PipelineHandle,
        options: &DispatchOptions,
    ) -> Result<PipelineStatus> {
        let started = Instant::now();
        loop {
            let status = self.client.pipeline_status(&service.project, handle.id)?;
            self.observer.polled(service, &status);

            if status.is_terminal() {
                info!(service = %service.name, pipeline = handle.id, status = %status, "pipeline finished");
                return Ok(status);
            }
            debug!(service = %service.name, pipeline = handle.id, status = %status, "waiting");

            if started.elapsed() >= options.timeout {
                return Err(ReleaseError::timeout(format!(
                    "pipeline {} still {} after {}s",
                    handle.id,
                    status,
                    options.timeout.as_secs()
                )));
            }
            thread::sleep(options.poll_interval);
        }
    }
}

/// Dispatch `plan` without progress notifications
pub fn dispatch(
    client: &dyn CiClient,
    plan: &DispatchPlan,
    options: &DispatchOptions,
) -> Result<DispatchReport> {
    PipelineDispatcher::new(client).dispatch(plan, options)
}
