// tests/dispatch_test.rs
use release_train::domain::{ConcurrencyClass, Service};
use release_train::pipeline::{
    dispatch, DispatchObserver, DispatchOptions, DispatchPlan, MockCiClient, PipelineDispatcher,
    PipelineHandle, PipelineRun, PipelineStatus, Variable,
};
use release_train::ReleaseError;
use std::sync::Mutex;
use std::time::Duration;

fn sequential(name: &str) -> Service {
    Service::new(name, name, format!("backend/{}", name), ConcurrencyClass::Sequential)
}

fn grouped(name: &str, group: &str) -> Service {
    Service::new(
        name,
        name,
        format!("backend/{}", name),
        ConcurrencyClass::Group(group.to_string()),
    )
}

fn options() -> DispatchOptions {
    DispatchOptions {
        poll_interval: Duration::from_millis(2),
        timeout: Duration::from_secs(10),
        variables: vec![Variable::new("CI_PIPELINE_SOURCE", "web")],
        ..DispatchOptions::new("release-12.0")
    }
}

fn position(events: &[String], wanted: &str) -> usize {
    events
        .iter()
        .position(|e| e == wanted)
        .unwrap_or_else(|| panic!("no event '{}' in {:?}", wanted, events))
}

#[test]
fn test_sequential_services_finish_before_groups_start() {
    let mut ci = MockCiClient::new();
    for name in ["s1", "s2", "s3", "s4"] {
        ci.script(
            format!("backend/{}", name),
            vec![PipelineStatus::Pending, PipelineStatus::Running, PipelineStatus::Success],
        );
    }
    let plan = DispatchPlan::from_services(&[
        sequential("s1"),
        sequential("s2"),
        grouped("s3", "g1"),
        grouped("s4", "g1"),
    ]);

    let report = dispatch(&ci, &plan, &options()).unwrap();
    assert_eq!(report.runs.len(), 4);

    let s1 = report.run("s1").unwrap();
    let s2 = report.run("s2").unwrap();
    let s3 = report.run("s3").unwrap();
    let s4 = report.run("s4").unwrap();
    assert!(s1.finished_at <= s2.dispatched_at);
    assert!(s2.finished_at <= s3.dispatched_at);
    assert!(s2.finished_at <= s4.dispatched_at);
    assert!(report.runs.iter().all(|r| r.status == PipelineStatus::Success));

    let events = ci.events();
    assert!(position(&events, "status backend/s1 success") < position(&events, "create backend/s2"));
    assert!(position(&events, "status backend/s2 success") < position(&events, "create backend/s3"));
    assert!(position(&events, "status backend/s2 success") < position(&events, "create backend/s4"));
    assert_eq!(
        ci.triggered_with("backend/s3"),
        Some(vec![Variable::new("CI_PIPELINE_SOURCE", "web")])
    );
}

#[test]
fn test_group_members_run_concurrently() {
    let mut ci = MockCiClient::new();
    ci.set_poll_delay(Duration::from_millis(20));
    for name in ["a", "b", "c"] {
        ci.script(
            format!("backend/{}", name),
            vec![PipelineStatus::Running, PipelineStatus::Success],
        );
    }
    let plan = DispatchPlan::from_services(&[
        grouped("a", "g"),
        grouped("b", "g"),
        grouped("c", "g"),
    ]);

    let report = dispatch(&ci, &plan, &options()).unwrap();

    // Every pipeline is created before any of them reaches its terminal poll
    let events = ci.events();
    let last_create = ["a", "b", "c"]
        .iter()
        .map(|n| position(&events, &format!("create backend/{}", n)))
        .max()
        .unwrap();
    let first_success = ["a", "b", "c"]
        .iter()
        .map(|n| position(&events, &format!("status backend/{} success", n)))
        .min()
        .unwrap();
    assert!(last_create < first_success, "{:?}", events);
    assert_eq!(report.runs.len(), 3);
}

#[test]
fn test_group_failure_waits_for_siblings() {
    let mut ci = MockCiClient::new();
    for name in ["a", "c"] {
        ci.script(
            format!("backend/{}", name),
            vec![
                PipelineStatus::Pending,
                PipelineStatus::Running,
                PipelineStatus::Running,
                PipelineStatus::Success,
            ],
        );
    }
    ci.fail_trigger("backend/b");
    let plan = DispatchPlan::from_services(&[
        grouped("a", "g"),
        grouped("b", "g"),
        grouped("c", "g"),
    ]);

    let err = dispatch(&ci, &plan, &options()).unwrap_err();
    match &err {
        ReleaseError::Service { service, error } => {
            assert_eq!(service, "b");
            assert!(matches!(**error, ReleaseError::RemoteApi { status: 400, .. }));
        }
        other => panic!("unexpected error {:?}", other),
    }

    let events = ci.events();
    assert!(events.contains(&"status backend/a success".to_string()));
    assert!(events.contains(&"status backend/c success".to_string()));
}

#[test]
fn test_sequential_failure_stops_the_train() {
    let mut ci = MockCiClient::new();
    ci.script("backend/s1", vec![PipelineStatus::Running, PipelineStatus::Failed]);
    let plan = DispatchPlan::from_services(&[
        sequential("s1"),
        sequential("s2"),
        grouped("s3", "g1"),
    ]);

    let err = dispatch(&ci, &plan, &options()).unwrap_err();
    assert_eq!(err.to_string(), "s1: Pipeline 1 finished with status 'failed'");

    let events = ci.events();
    assert!(!events.iter().any(|e| e == "create backend/s2"));
    assert!(!events.iter().any(|e| e == "create backend/s3"));
}

#[test]
fn test_groups_run_in_name_order() {
    let ci = MockCiClient::new();
    let plan = DispatchPlan::from_services(&[
        grouped("web", "zeta"),
        grouped("api", "alpha"),
    ]);

    dispatch(&ci, &plan, &options()).unwrap();

    let events = ci.events();
    assert!(position(&events, "status backend/api success") < position(&events, "create backend/web"));
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, entry: String) {
        self.seen.lock().unwrap().push(entry);
    }
}

impl DispatchObserver for Recorder {
    fn group_started(&self, group: &str, members: &[Service]) {
        self.push(format!("group {} {}", group, members.len()));
    }

    fn triggered(&self, service: &Service, handle: &PipelineHandle) {
        self.push(format!("triggered {} #{}", service.name, handle.id));
    }

    fn finished(&self, run: &PipelineRun) {
        self.push(format!("finished {} {}", run.service, run.status));
    }
}

#[test]
fn test_observer_sees_progress() {
    let ci = MockCiClient::new();
    let recorder = Recorder::default();
    let plan = DispatchPlan::from_services(&[sequential("s1"), grouped("s2", "g1")]);

    PipelineDispatcher::new(&ci)
        .with_observer(&recorder)
        .dispatch(&plan, &options())
        .unwrap();

    let seen = recorder.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            "triggered s1 #1",
            "finished s1 success",
            "group g1 1",
            "triggered s2 #2",
            "finished s2 success",
        ]
    );
}

#[test]
fn test_empty_plan_dispatches_nothing() {
    let ci = MockCiClient::new();
    let report = dispatch(&ci, &DispatchPlan::default(), &options()).unwrap();
    assert!(report.runs.is_empty());
    assert!(ci.events().is_empty());
}
