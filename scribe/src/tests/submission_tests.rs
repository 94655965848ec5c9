use std::sync::Arc;

use crate::config::HostConfig;
use crate::locator::Locator;
use crate::selector::{ChainTable, Selector};
use crate::submission::{KnowledgeSubmission, SubmitStep};
use crate::tests::fake_engine::FakeEngine;
use crate::types::{KnowledgeEntry, ProjectIdentity};

fn project() -> ProjectIdentity {
    ProjectIdentity::new(
        "proj-1",
        "Demo",
        "https://claude.ai/project/proj-1",
    )
}

fn submission(engine: Arc<FakeEngine>) -> KnowledgeSubmission {
    let locator = Locator::new(engine.clone(), Arc::new(ChainTable::default()));
    KnowledgeSubmission::new(engine, locator)
}

fn add_entry_selector() -> Selector {
    Selector::Text {
        tag: "button".to_string(),
        needle: "add knowledge".to_string(),
    }
}

fn title_selector() -> Selector {
    Selector::Css("input[name=\"title\"]".to_string())
}

fn body_selector() -> Selector {
    Selector::Css("textarea[name=\"content\"]".to_string())
}

fn submit_selector() -> Selector {
    Selector::Text {
        tag: "button".to_string(),
        needle: "save".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn full_flow_succeeds_and_fills_the_formatted_body() {
    let engine = Arc::new(FakeEngine::new());
    engine.set_count(&add_entry_selector(), 1);
    engine.set_count(&title_selector(), 1);
    engine.set_count(&body_selector(), 1);
    engine.set_count(&submit_selector(), 1);

    let mut entry = KnowledgeEntry::new("Deploy runbook", "Steps:\n1. ship it");
    entry.category = "ops".to_string();
    entry.tags = vec!["deploy".to_string(), "runbook".to_string()];
    entry.importance = 5;

    let report = submission(engine.clone())
        .run(&project(), &entry, &HostConfig::default())
        .await;

    assert!(report.succeeded);
    assert_eq!(
        engine.navigations(),
        vec!["https://claude.ai/project/proj-1/knowledge".to_string()]
    );
    assert_eq!(
        engine.clicks(),
        vec![
            add_entry_selector().to_string(),
            submit_selector().to_string()
        ]
    );

    let fills = engine.fills();
    assert_eq!(fills[0], (title_selector().to_string(), "Deploy runbook".to_string()));
    assert_eq!(fills[1].0, body_selector().to_string());
    assert_eq!(
        fills[1].1,
        "Category: ops\nTags: deploy, runbook\nImportance: 5/5\n\nSteps:\n1. ship it"
    );
}

#[tokio::test(start_paused = true)]
async fn missing_add_entry_control_aborts_before_any_fill() {
    let engine = Arc::new(FakeEngine::new());
    // Fields exist, but there is no way to open the form.
    engine.set_count(&title_selector(), 1);
    engine.set_count(&submit_selector(), 1);

    let report = submission(engine.clone())
        .run(&project(), &KnowledgeEntry::new("t", "b"), &HostConfig::default())
        .await;

    assert!(!report.succeeded);
    let last = report.steps.last().expect("has steps");
    assert_eq!(last.step, SubmitStep::OpenForm);
    assert!(!last.ok);
    assert!(engine.clicks().is_empty());
    assert!(engine.fills().is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_fields_do_not_flip_success() {
    // Weak contract: the form opened and submit was pressed, so the attempt
    // counts as succeeded even though no field could be filled.
    let engine = Arc::new(FakeEngine::new());
    engine.set_count(&add_entry_selector(), 1);
    engine.set_count(&submit_selector(), 1);

    let report = submission(engine.clone())
        .run(&project(), &KnowledgeEntry::new("t", "b"), &HostConfig::default())
        .await;

    assert!(report.succeeded);
    let title_step = report
        .steps
        .iter()
        .find(|s| s.step == SubmitStep::FillTitle)
        .expect("title step recorded");
    assert!(!title_step.ok);
    assert!(engine.fills().is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_submit_control_fails_the_attempt() {
    let engine = Arc::new(FakeEngine::new());
    engine.set_count(&add_entry_selector(), 1);
    engine.set_count(&title_selector(), 1);
    engine.set_count(&body_selector(), 1);

    let report = submission(engine.clone())
        .run(&project(), &KnowledgeEntry::new("t", "b"), &HostConfig::default())
        .await;

    assert!(!report.succeeded);
    assert_eq!(engine.fills().len(), 2, "fills still happen before the verdict");
}

#[tokio::test(start_paused = true)]
async fn click_failure_on_a_located_control_is_recorded_not_fatal() {
    let engine = Arc::new(FakeEngine::new());
    engine.set_count(&add_entry_selector(), 1);
    engine.set_count(&submit_selector(), 1);
    engine.fail_selector(&submit_selector());

    let report = submission(engine)
        .run(&project(), &KnowledgeEntry::new("t", "b"), &HostConfig::default())
        .await;

    // The submit control was never located (its selector errors), so this
    // attempt fails outright.
    assert!(!report.succeeded);
}

#[tokio::test(start_paused = true)]
async fn navigation_failure_short_circuits_everything() {
    struct DeadEngine;

    #[async_trait::async_trait]
    impl crate::engine::BrowserEngine for DeadEngine {
        async fn navigate(&self, _url: &str) -> Result<(), crate::AutomationError> {
            Err(crate::AutomationError::SessionUnavailable("gone".to_string()))
        }
        async fn current_url(&self) -> Result<String, crate::AutomationError> {
            unreachable!()
        }
        async fn title(&self) -> Result<String, crate::AutomationError> {
            unreachable!()
        }
        async fn content(&self) -> Result<String, crate::AutomationError> {
            unreachable!()
        }
        async fn open_pages(&self) -> Result<Vec<crate::PageInfo>, crate::AutomationError> {
            unreachable!()
        }
        async fn page_title(&self, _: &str) -> Result<String, crate::AutomationError> {
            unreachable!()
        }
        async fn count(&self, _: &crate::Selector) -> Result<usize, crate::AutomationError> {
            unreachable!()
        }
        async fn click(&self, _: &crate::Selector) -> Result<(), crate::AutomationError> {
            unreachable!()
        }
        async fn fill(
            &self,
            _: &crate::Selector,
            _: &str,
        ) -> Result<(), crate::AutomationError> {
            unreachable!()
        }
        async fn text_of(&self, _: &crate::Selector) -> Result<String, crate::AutomationError> {
            unreachable!()
        }
        async fn collect_links(
            &self,
            _: &crate::Selector,
        ) -> Result<Vec<crate::LinkInfo>, crate::AutomationError> {
            unreachable!()
        }
        async fn wait_for_idle(
            &self,
            _: std::time::Duration,
        ) -> Result<(), crate::AutomationError> {
            unreachable!()
        }
        async fn close(&self) -> Result<(), crate::AutomationError> {
            Ok(())
        }
    }

    let engine: Arc<dyn crate::engine::BrowserEngine> = Arc::new(DeadEngine);
    let locator = Locator::new(engine.clone(), Arc::new(ChainTable::default()));
    let report = KnowledgeSubmission::new(engine, locator)
        .run(&project(), &KnowledgeEntry::new("t", "b"), &HostConfig::default())
        .await;

    assert!(!report.succeeded);
    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.steps[0].step, SubmitStep::Navigate);
}
