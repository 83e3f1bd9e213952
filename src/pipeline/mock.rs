use super::{CiClient, PipelineHandle, PipelineStatus, Variable};
use crate::error::{ReleaseError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct MockState {
    next_id: u64,
    /// pipeline id -> (project, polls answered so far)
    pipelines: HashMap<u64, (String, usize)>,
    triggered: HashMap<String, Vec<Variable>>,
    events: Vec<String>,
}

/// CI client answering from scripted status sequences
///
/// Each project replays its script one status per poll; the last status
/// repeats. Projects without a script succeed on the first poll. Every call
/// is logged, e.g. `create backend/a`, `status backend/a running`.
pub struct MockCiClient {
    scripts: HashMap<String, Vec<PipelineStatus>>,
    variables: HashMap<(String, String), String>,
    failing_triggers: HashSet<String>,
    poll_delay: Duration,
    state: Mutex<MockState>,
}

impl MockCiClient {
    pub fn new() -> Self {
        MockCiClient {
            scripts: HashMap::new(),
            variables: HashMap::new(),
            failing_triggers: HashSet::new(),
            poll_delay: Duration::ZERO,
            state: Mutex::new(MockState {
                next_id: 1,
                ..MockState::default()
            }),
        }
    }

    /// Statuses returned by successive polls of `project`'s pipeline
    pub fn script(&mut self, project: impl Into<String>, statuses: Vec<PipelineStatus>) {
        self.scripts.insert(project.into(), statuses);
    }

    pub fn set_variable(
        &mut self,
        project: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.variables.insert((project.into(), key.into()), value.into());
    }

    /// Make pipeline creation for `project` fail with HTTP 400
    pub fn fail_trigger(&mut self, project: impl Into<String>) {
        self.failing_triggers.insert(project.into());
    }

    /// Sleep this long inside every status call
    pub fn set_poll_delay(&mut self, delay: Duration) {
        self.poll_delay = delay;
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().map(|s| s.events.clone()).unwrap_or_default()
    }

    /// Variables the pipeline of `project` was created with
    pub fn triggered_with(&self, project: &str) -> Option<Vec<Variable>> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.triggered.get(project).cloned())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MockState>> {
        self.state
            .lock()
            .map_err(|_| ReleaseError::validation("mock CI state poisoned"))
    }
}

impl Default for MockCiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CiClient for MockCiClient {
    fn get_variable(&self, project: &str, key: &str) -> Result<Option<String>> {
        self.lock()?
            .events
            .push(format!("variable {} {}", project, key));
        Ok(self
            .variables
            .get(&(project.to_string(), key.to_string()))
            .cloned())
    }

    fn create_pipeline(
        &self,
        project: &str,
        git_ref: &str,
        variables: &[Variable],
    ) -> Result<PipelineHandle> {
        let mut state = self.lock()?;
        state.events.push(format!("create {}", project));

        if self.failing_triggers.contains(project) {
            return Err(ReleaseError::RemoteApi {
                status: 400,
                body: format!("{{\"message\":{{\"base\":[\"Reference not found: {}\"]}}}}", git_ref),
            });
        }

        let id = state.next_id;
        state.next_id += 1;
        state.pipelines.insert(id, (project.to_string(), 0));
        state
            .triggered
            .insert(project.to_string(), variables.to_vec());

        Ok(PipelineHandle {
            id,
            web_url: format!("https://ci.test/{}/-/pipelines/{}", project, id),
        })
    }

    fn pipeline_status(&self, project: &str, pipeline_id: u64) -> Result<PipelineStatus> {
        if !self.poll_delay.is_zero() {
            thread::sleep(self.poll_delay);
        }

        let mut state = self.lock()?;
        let polls = match state.pipelines.get_mut(&pipeline_id) {
            Some((owner, polls)) if owner == project => {
                *polls += 1;
                *polls
            }
            _ => {
                return Err(ReleaseError::RemoteApi {
                    status: 404,
                    body: "{\"message\":\"404 Not found\"}".to_string(),
                })
            }
        };

        let status = match self.scripts.get(project) {
            Some(script) if !script.is_empty() => script[(polls - 1).min(script.len() - 1)].clone(),
            _ => PipelineStatus::Success,
        };
        state.events.push(format!("status {} {}", project, status));
        Ok(status)
    }
}
