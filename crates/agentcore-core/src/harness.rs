//! Session test harness for a deployed runtime.
//!
//! Drives real invocations against a runtime and reports what the remote
//! side remembered per session. Persistence and expiry belong to the
//! runtime; the harness only observes them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::cloud::{RuntimeControl, RuntimeData, StopSessionOutcome};
use crate::domain::{DeployError, Result, SessionId};
use crate::envelope::ResponseEnvelope;
use crate::invoke::{invoke, DEFAULT_QUALIFIER};

/// Pauses used by the scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessTimings {
    /// Between consecutive steps
    pub pause: Duration,
    /// After stopping a session, before using it again
    pub after_stop: Duration,
    /// Idle period of the timeout scenario
    pub idle: Duration,
    /// Countdown granularity while idling
    pub countdown_step: Duration,
}

impl Default for HarnessTimings {
    fn default() -> Self {
        Self {
            pause: Duration::from_secs(2),
            after_stop: Duration::from_secs(15),
            idle: Duration::from_secs(15 * 60),
            countdown_step: Duration::from_secs(30),
        }
    }
}

/// A user who introduces themselves and later asks to be recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: &'static str,
    pub company: &'static str,
}

impl Persona {
    pub const ALICE: Persona = Persona {
        name: "Alice",
        company: "ABC Technologies",
    };

    pub const BOB: Persona = Persona {
        name: "Bob",
        company: "XYZ Systems",
    };

    pub fn introduction(&self) -> String {
        format!(
            "Hello! My name is {} and I work at {}.",
            self.name, self.company
        )
    }

    pub fn question(&self) -> &'static str {
        "Do you know who I am?"
    }

    /// Whether `text` mentions this persona's name or company.
    pub fn recognised_in(&self, text: &str) -> bool {
        let marker = self.company.split_whitespace().next().unwrap_or(self.company);
        text.contains(self.name) || text.contains(marker)
    }
}

/// One decoded invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub invocation_timestamp: DateTime<Utc>,
    pub request_timestamp: DateTime<Utc>,
    pub response_timestamp: Option<DateTime<Utc>>,
    pub response_text: String,
    pub full_response: Value,
}

/// Result of one scenario step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub label: String,
    pub session_id: String,
    pub response_text: Option<String>,
    pub error: Option<String>,
    /// Whether the persona was recognised in the reply
    pub recalled: Option<bool>,
    /// `None` when the step only observes
    pub expect_recall: Option<bool>,
}

impl StepReport {
    pub fn completed(&self) -> bool {
        self.error.is_none()
    }

    /// `Some(true)` when the observed recall matched the expectation.
    pub fn as_expected(&self) -> Option<bool> {
        match (self.recalled, self.expect_recall) {
            (Some(recalled), Some(expected)) => Some(recalled == expected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub steps: Vec<StepReport>,
    pub stop: Option<StopSessionOutcome>,
}

impl ScenarioReport {
    fn new(scenario: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            steps: Vec::new(),
            stop: None,
        }
    }

    /// No invocation failed and at least one ran.
    pub fn succeeded(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(StepReport::completed)
    }
}

/// Invokes a deployed runtime with explicit session ids.
pub struct RuntimeTester {
    data: Arc<dyn RuntimeData>,
    agent_id: String,
    agent_arn: String,
    timings: HarnessTimings,
}

impl RuntimeTester {
    /// Resolve the runtime ARN from its id.
    pub async fn connect(
        control: &dyn RuntimeControl,
        data: Arc<dyn RuntimeData>,
        agent_id: &str,
    ) -> Result<Self> {
        let runtime = control.get_runtime(agent_id).await?;
        info!(agent_id = %agent_id, agent_arn = %runtime.arn, "resolved runtime");
        Ok(Self {
            data,
            agent_id: agent_id.to_string(),
            agent_arn: runtime.arn,
            timings: HarnessTimings::default(),
        })
    }

    pub fn with_timings(mut self, timings: HarnessTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn agent_arn(&self) -> &str {
        &self.agent_arn
    }

    pub async fn invoke_with_session(
        &self,
        prompt: &str,
        session: &SessionId,
    ) -> Result<InvocationRecord> {
        let invocation_timestamp = Utc::now();
        info!(session = %session, prompt = %prompt, at = %invocation_timestamp, "invoking");

        let full_response = invoke(self.data.as_ref(), &self.agent_arn, prompt, Some(session)).await?;
        let envelope: ResponseEnvelope = serde_json::from_value(full_response.clone())
            .map_err(|e| DeployError::Invocation(format!("unexpected response shape: {}", e)))?;
        if let Some(error) = &envelope.output.error {
            return Err(DeployError::Invocation(format!("agent error: {}", error)));
        }
        let response_text = envelope.text().unwrap_or_default();

        info!(
            request_timestamp = %envelope.output.request_timestamp,
            response_timestamp = ?envelope.output.response_timestamp,
            "agent replied"
        );
        Ok(InvocationRecord {
            invocation_timestamp,
            request_timestamp: envelope.output.request_timestamp,
            response_timestamp: envelope.output.response_timestamp,
            response_text,
            full_response,
        })
    }

    pub async fn stop_session(&self, session: &SessionId) -> Result<StopSessionOutcome> {
        let outcome = self
            .data
            .stop_session(&self.agent_arn, session.as_str(), DEFAULT_QUALIFIER)
            .await?;
        info!(session = %session, status_code = ?outcome.status_code, "session stopped");
        Ok(outcome)
    }

    /// Introduce, ask from another session, ask again, stop and ask once more.
    pub async fn run_standard(&self) -> ScenarioReport {
        let mut report = ScenarioReport::new("standard");
        let persona = Persona::ALICE;
        let session_a = SessionId::generate("session-A");
        let session_b = SessionId::generate("session-B");

        let intro = persona.introduction();
        let plan: [(&str, &SessionId, &str, Option<bool>); 3] = [
            ("introduce identity", &session_a, intro.as_str(), None),
            ("cross-session recall", &session_b, persona.question(), Some(false)),
            ("same-session recall", &session_a, persona.question(), Some(true)),
        ];
        for (label, session, prompt, expect) in plan {
            if !self
                .step(&mut report, &persona, label, session, prompt, expect)
                .await
            {
                return report;
            }
            tokio::time::sleep(self.timings.pause).await;
        }

        match self.stop_session(&session_a).await {
            Ok(outcome) => report.stop = Some(outcome),
            Err(e) => warn!(session = %session_a, error = %e, "failed to stop session"),
        }
        tokio::time::sleep(self.timings.after_stop).await;
        self.step(
            &mut report,
            &persona,
            "recall after stop",
            &session_a,
            persona.question(),
            None,
        )
        .await;
        report
    }

    /// Introduce, stay idle for the configured period, then ask.
    pub async fn run_timeout(&self) -> ScenarioReport {
        let mut report = ScenarioReport::new("timeout");
        let persona = Persona::BOB;
        let session = SessionId::generate("timeout-test");

        let intro = persona.introduction();
        if !self
            .step(&mut report, &persona, "introduce identity", &session, &intro, None)
            .await
        {
            return report;
        }
        self.idle(self.timings.idle).await;
        self.step(
            &mut report,
            &persona,
            "recall after idle",
            &session,
            persona.question(),
            None,
        )
        .await;
        report
    }

    /// Introduce and ask on one session.
    pub async fn run_custom(&self) -> ScenarioReport {
        let mut report = ScenarioReport::new("custom");
        let persona = Persona::ALICE;
        let session = SessionId::generate("custom-test");

        let intro = persona.introduction();
        if !self
            .step(&mut report, &persona, "introduce identity", &session, &intro, None)
            .await
        {
            return report;
        }
        self.step(
            &mut report,
            &persona,
            "same-session recall",
            &session,
            persona.question(),
            Some(true),
        )
        .await;
        report
    }

    /// Run one invocation and record it. Returns false if it failed.
    async fn step(
        &self,
        report: &mut ScenarioReport,
        persona: &Persona,
        label: &str,
        session: &SessionId,
        prompt: &str,
        expect_recall: Option<bool>,
    ) -> bool {
        let (response_text, error, recalled) = match self.invoke_with_session(prompt, session).await
        {
            Ok(record) => {
                let recalled = persona.recognised_in(&record.response_text);
                (Some(record.response_text), None, Some(recalled))
            }
            Err(e) => {
                warn!(step = %label, session = %session, error = %e, "invocation failed");
                (None, Some(e.to_string()), None)
            }
        };
        let ok = error.is_none();
        report.steps.push(StepReport {
            label: label.to_string(),
            session_id: session.to_string(),
            response_text,
            error,
            recalled,
            expect_recall,
        });
        ok
    }

    async fn idle(&self, total: Duration) {
        info!(minutes = total.as_secs() / 60, "waiting");
        let mut remaining = total;
        while !remaining.is_zero() {
            let secs = remaining.as_secs();
            info!(remaining = %format!("{:02}:{:02}", secs / 60, secs % 60), "time remaining");
            let chunk = remaining.min(self.timings.countdown_step.max(Duration::from_secs(1)));
            tokio::time::sleep(chunk).await;
            remaining -= chunk;
        }
        info!("wait complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persona_recognition() {
        let alice = Persona::ALICE;
        assert!(alice.recognised_in("You are Alice."));
        assert!(alice.recognised_in("You work at ABC."));
        assert!(!alice.recognised_in("I don't know who you are."));
        assert!(alice.introduction().contains("ABC Technologies"));
    }

    #[test]
    fn test_step_expectation() {
        let step = StepReport {
            label: "x".to_string(),
            session_id: "s".to_string(),
            response_text: Some("hi".to_string()),
            error: None,
            recalled: Some(false),
            expect_recall: Some(false),
        };
        assert_eq!(step.as_expected(), Some(true));
        assert!(step.completed());
    }

    #[test]
    fn test_empty_report_is_not_success() {
        assert!(!ScenarioReport::new("standard").succeeded());
    }
}
