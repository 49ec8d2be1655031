//! Session harness scenarios against the in-memory runtime.

use std::collections::HashSet;
use std::time::Duration;

use agentcore_core::cloud::{RuntimeControl, RuntimeSpec};
use agentcore_core::fakes::FakeCloud;
use agentcore_core::harness::Persona;
use agentcore_core::{HarnessTimings, RuntimeTester, SessionId, MIN_SESSION_ID_LEN};

fn quick() -> HarnessTimings {
    HarnessTimings {
        pause: Duration::ZERO,
        after_stop: Duration::from_secs(15),
        idle: Duration::from_secs(90),
        countdown_step: Duration::from_secs(30),
    }
}

async fn tester(cloud: &FakeCloud) -> RuntimeTester {
    let handle = cloud
        .control
        .create_runtime(&RuntimeSpec {
            name: "demo".to_string(),
            container_uri: "repo:latest".to_string(),
            role_arn: "arn:aws:iam::1:role/r".to_string(),
            network_mode: "PUBLIC".to_string(),
        })
        .await
        .expect("create runtime");
    RuntimeTester::connect(cloud.control.as_ref(), cloud.data.clone(), &handle.id)
        .await
        .expect("connect")
        .with_timings(quick())
}

#[tokio::test(start_paused = true)]
async fn standard_scenario_keeps_sessions_apart() {
    let cloud = FakeCloud::new();
    let tester = tester(&cloud).await;

    let report = tester.run_standard().await;

    assert!(report.succeeded(), "report: {:?}", report);
    assert_eq!(report.steps.len(), 4);
    let recalled: Vec<Option<bool>> = report.steps.iter().map(|s| s.recalled).collect();
    assert_eq!(
        recalled,
        vec![Some(true), Some(false), Some(true), Some(false)]
    );
    assert_eq!(report.steps[1].as_expected(), Some(true));
    assert_eq!(report.steps[2].as_expected(), Some(true));
    assert_eq!(report.stop.as_ref().and_then(|s| s.status_code), Some(200));

    // Two sessions, passed through unmodified and never merged.
    let invocations = cloud.data.invocations();
    assert_eq!(invocations.len(), 4);
    let sessions: HashSet<String> = invocations
        .iter()
        .map(|i| i.session_id.clone().expect("session id set"))
        .collect();
    assert_eq!(sessions.len(), 2);
    for id in &sessions {
        assert!(id.len() >= MIN_SESSION_ID_LEN);
    }
    assert_eq!(invocations[0].session_id, invocations[2].session_id);
    assert_ne!(invocations[0].session_id, invocations[1].session_id);
    assert!(invocations.iter().all(|i| i.qualifier == "DEFAULT"));
}

#[tokio::test(start_paused = true)]
async fn failed_invocation_stops_the_scenario() {
    let cloud = FakeCloud::new();
    let tester = tester(&cloud).await;
    cloud.data.set_failing(true);

    let report = tester.run_standard().await;

    assert!(!report.succeeded());
    assert_eq!(report.steps.len(), 1);
    assert!(report.steps[0].error.is_some());
    assert!(report.stop.is_none());
}

#[tokio::test(start_paused = true)]
async fn timeout_scenario_idles_for_the_configured_period() {
    let cloud = FakeCloud::new();
    let tester = tester(&cloud).await;

    let start = tokio::time::Instant::now();
    let report = tester.run_timeout().await;

    assert!(report.succeeded());
    assert_eq!(report.steps.len(), 2);
    assert!(start.elapsed() >= Duration::from_secs(90));
    // The fake keeps session memory forever, so the persona is recalled.
    assert_eq!(report.steps[1].recalled, Some(true));
}

#[tokio::test(start_paused = true)]
async fn custom_scenario_recalls_within_session() {
    let cloud = FakeCloud::new();
    let tester = tester(&cloud).await;

    let report = tester.run_custom().await;

    assert!(report.succeeded());
    assert_eq!(report.steps[1].as_expected(), Some(true));
}

#[tokio::test]
async fn invoke_with_session_reports_agent_timestamps() {
    let cloud = FakeCloud::new();
    let tester = tester(&cloud).await;
    let session = SessionId::generate("manual");

    let record = tester
        .invoke_with_session(&Persona::ALICE.introduction(), &session)
        .await
        .expect("invoke");

    assert!(record.response_text.contains("Alice"));
    let response_ts = record.response_timestamp.expect("response timestamp");
    assert!(record.request_timestamp <= response_ts);
    assert!(record.invocation_timestamp <= record.request_timestamp);
    assert_eq!(
        cloud.data.transcript(session.as_str()),
        vec![Persona::ALICE.introduction()]
    );
}

#[tokio::test]
async fn connect_to_unknown_runtime_fails() {
    let cloud = FakeCloud::new();
    let result = RuntimeTester::connect(cloud.control.as_ref(), cloud.data.clone(), "rt-404").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn harness_sessions_are_distinct_per_run() {
    let cloud = FakeCloud::new();
    let tester = tester(&cloud).await;
    tester.run_custom().await;
    tester.run_custom().await;
    let sessions: HashSet<_> = cloud
        .data
        .invocations()
        .into_iter()
        .filter_map(|i| i.session_id)
        .collect();
    assert_eq!(sessions.len(), 2);
}
