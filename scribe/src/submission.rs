//! Knowledge submission: the multi-step form-fill transaction.
//!
//! The flow is an explicit step machine so the report can say exactly how
//! far a failed attempt got. Success is a weak contract: the entry form was
//! opened and the submit control was found. Field fills and clicks are
//! best-effort; only failure to open the form aborts the remaining steps.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::HostConfig;
use crate::engine::BrowserEngine;
use crate::locator::Locator;
use crate::selector::Role;
use crate::session::settle;
use crate::types::{KnowledgeEntry, ProjectIdentity};

/// All the pauses the transaction takes, in one place.
#[derive(Debug, Clone)]
pub struct SubmissionTiming {
    /// Bounded wait for the knowledge page after navigation.
    pub idle_timeout: Duration,
    /// Fixed settle after opening the entry form.
    pub form_settle: Duration,
    /// Fixed settle after pressing submit, before reporting back.
    pub post_submit_settle: Duration,
}

impl Default for SubmissionTiming {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(15),
            form_settle: Duration::from_secs(2),
            post_submit_settle: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmitStep {
    Navigate,
    OpenForm,
    AwaitForm,
    FillTitle,
    FillBody,
    Submit,
    Settle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: SubmitStep,
    pub ok: bool,
    pub detail: String,
}

/// What happened, step by step. `succeeded` means the form was opened and a
/// submit control was pressed; it does not prove the entry persisted, and
/// re-running a "failed" attempt can duplicate an entry that actually went
/// through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub succeeded: bool,
    pub steps: Vec<StepOutcome>,
}

impl SubmissionReport {
    fn record(&mut self, step: SubmitStep, ok: bool, detail: impl Into<String>) {
        self.steps.push(StepOutcome {
            step,
            ok,
            detail: detail.into(),
        });
    }
}

pub struct KnowledgeSubmission {
    engine: Arc<dyn BrowserEngine>,
    locator: Locator,
    timing: SubmissionTiming,
}

impl KnowledgeSubmission {
    pub fn new(engine: Arc<dyn BrowserEngine>, locator: Locator) -> Self {
        Self {
            engine,
            locator,
            timing: SubmissionTiming::default(),
        }
    }

    pub fn with_timing(mut self, timing: SubmissionTiming) -> Self {
        self.timing = timing;
        self
    }

    pub async fn run(
        &self,
        project: &ProjectIdentity,
        entry: &KnowledgeEntry,
        config: &HostConfig,
    ) -> SubmissionReport {
        let mut report = SubmissionReport {
            succeeded: false,
            steps: Vec::new(),
        };

        let url = config.knowledge_url(&project.id);
        if let Err(e) = self.engine.navigate(&url).await {
            report.record(SubmitStep::Navigate, false, e.to_string());
            return report;
        }
        report.record(SubmitStep::Navigate, true, url);
        if let Err(e) = self.engine.wait_for_idle(self.timing.idle_timeout).await {
            debug!(error = %e, "knowledge page never settled, proceeding");
        }

        // The add-entry control is the gate: without it there is no form to
        // fill and the remaining steps would act on the wrong page.
        let opened = match self.locator.locate(Role::AddEntryAction).await {
            Some(handle) => {
                let detail = handle.selector().to_string();
                match handle.click().await {
                    Ok(()) => report.record(SubmitStep::OpenForm, true, detail),
                    Err(e) => {
                        warn!(error = %e, "add-entry control found but click failed");
                        report.record(SubmitStep::OpenForm, false, e.to_string());
                    }
                }
                true
            }
            None => {
                report.record(SubmitStep::OpenForm, false, "no add-entry control found");
                return report;
            }
        };

        settle(self.timing.form_settle).await;
        report.record(SubmitStep::AwaitForm, true, format!("{:?}", self.timing.form_settle));

        self.fill_role(&mut report, SubmitStep::FillTitle, Role::TitleField, &entry.title)
            .await;
        self.fill_role(
            &mut report,
            SubmitStep::FillBody,
            Role::BodyField,
            &entry.formatted_body(),
        )
        .await;

        let submitted = match self.locator.locate(Role::SubmitAction).await {
            Some(handle) => {
                let detail = handle.selector().to_string();
                match handle.click().await {
                    Ok(()) => report.record(SubmitStep::Submit, true, detail),
                    Err(e) => {
                        warn!(error = %e, "submit control found but click failed");
                        report.record(SubmitStep::Submit, false, e.to_string());
                    }
                }
                true
            }
            None => {
                report.record(SubmitStep::Submit, false, "no submit control found");
                false
            }
        };

        settle(self.timing.post_submit_settle).await;
        report.record(
            SubmitStep::Settle,
            true,
            format!("{:?}", self.timing.post_submit_settle),
        );

        report.succeeded = opened && submitted;
        report
    }

    async fn fill_role(
        &self,
        report: &mut SubmissionReport,
        step: SubmitStep,
        role: Role,
        text: &str,
    ) {
        match self.locator.locate(role).await {
            Some(handle) => match handle.fill(text).await {
                Ok(()) => report.record(step, true, handle.selector().to_string()),
                Err(e) => {
                    warn!(?step, error = %e, "field found but fill failed");
                    report.record(step, false, e.to_string());
                }
            },
            None => {
                warn!(?step, "field not found, submitting without it");
                report.record(step, false, format!("no {role:?} field found"));
            }
        }
    }
}
