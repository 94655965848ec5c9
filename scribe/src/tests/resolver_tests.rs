use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::HostConfig;
use crate::errors::AutomationError;
use crate::probes::{ContextProbe, LocalHistoryProbe, NoteStore};
use crate::resolver::ContextResolver;
use crate::types::{DetectionResult, DetectionSource, NoteRecord, ProjectIdentity};

/// Scripted probe: a fixed outcome, a call counter, an optional sleep.
struct StaticProbe {
    source: DetectionSource,
    outcome: Result<Option<DetectionResult>, AutomationError>,
    deadline: Option<Duration>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl StaticProbe {
    fn hit(source: DetectionSource, id: &str) -> (Self, Arc<AtomicUsize>) {
        let identity = ProjectIdentity::new(id, format!("Project {id}"), format!("https://x/{id}"));
        Self::build(source, Ok(Some(DetectionResult::new(identity, source))))
    }

    fn miss(source: DetectionSource) -> (Self, Arc<AtomicUsize>) {
        Self::build(source, Ok(None))
    }

    fn broken(source: DetectionSource) -> (Self, Arc<AtomicUsize>) {
        Self::build(
            source,
            Err(AutomationError::SourceUnavailable("scripted".to_string())),
        )
    }

    fn build(
        source: DetectionSource,
        outcome: Result<Option<DetectionResult>, AutomationError>,
    ) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                source,
                outcome,
                deadline: None,
                delay: None,
                calls: calls.clone(),
            },
            calls,
        )
    }

    fn with_deadline(mut self, deadline: Duration, delay: Duration) -> Self {
        self.deadline = Some(deadline);
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ContextProbe for StaticProbe {
    fn source(&self) -> DetectionSource {
        self.source
    }

    fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    async fn attempt(&self) -> Result<Option<DetectionResult>, AutomationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.outcome {
            Ok(v) => Ok(v.clone()),
            Err(e) => Err(AutomationError::SourceUnavailable(e.to_string())),
        }
    }
}

#[tokio::test]
async fn first_hit_short_circuits_the_cascade() {
    let (hit, hit_calls) = StaticProbe::hit(DetectionSource::Config, "p1");
    let (later, later_calls) = StaticProbe::hit(DetectionSource::ProcessTable, "p2");
    let resolver = ContextResolver::with_probes(vec![Box::new(hit), Box::new(later)]);

    let found = resolver.resolve().await.expect("should detect");
    assert_eq!(found.identity.id, "p1");
    assert_eq!(found.source, DetectionSource::Config);
    assert_eq!(found.confidence, 5);
    assert_eq!(hit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(later_calls.load(Ordering::SeqCst), 0, "later probe must not run");
}

#[tokio::test]
async fn probe_error_is_equivalent_to_no_evidence() {
    let (broken, _) = StaticProbe::broken(DetectionSource::LocalHistory);
    let (hit, _) = StaticProbe::hit(DetectionSource::ProcessTable, "p3");
    let resolver = ContextResolver::with_probes(vec![Box::new(broken), Box::new(hit)]);

    let found = resolver.resolve().await.expect("should fall through");
    assert_eq!(found.source, DetectionSource::ProcessTable);
    assert_eq!(found.confidence, 3);
}

#[tokio::test]
async fn all_probes_empty_yields_none() {
    let (a, _) = StaticProbe::miss(DetectionSource::Config);
    let (b, _) = StaticProbe::broken(DetectionSource::LocalHistory);
    let (c, _) = StaticProbe::miss(DetectionSource::LiveSession);
    let resolver = ContextResolver::with_probes(vec![Box::new(a), Box::new(b), Box::new(c)]);
    assert!(resolver.resolve().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn deadline_breach_moves_on_instead_of_hanging() {
    let (slow, _) = StaticProbe::hit(DetectionSource::LiveSession, "slow");
    let slow = slow.with_deadline(Duration::from_secs(10), Duration::from_secs(11));
    let (next, _) = StaticProbe::hit(DetectionSource::ProcessTable, "fast");
    let resolver = ContextResolver::with_probes(vec![Box::new(slow), Box::new(next)]);

    let found = resolver.resolve().await.expect("next probe should answer");
    assert_eq!(found.identity.id, "fast");
}

#[tokio::test(start_paused = true)]
async fn delay_inside_the_deadline_still_wins() {
    let (slow, _) = StaticProbe::hit(DetectionSource::LiveSession, "slow-but-fine");
    let slow = slow.with_deadline(Duration::from_secs(10), Duration::from_secs(9));
    let (next, next_calls) = StaticProbe::hit(DetectionSource::ProcessTable, "unused");
    let resolver = ContextResolver::with_probes(vec![Box::new(slow), Box::new(next)]);

    let found = resolver.resolve().await.expect("should detect");
    assert_eq!(found.identity.id, "slow-but-fine");
    assert_eq!(next_calls.load(Ordering::SeqCst), 0);
}

struct FakeStore {
    notes: Vec<NoteRecord>,
}

#[async_trait]
impl NoteStore for FakeStore {
    async fn read_recent_notes(&self, limit: usize) -> Result<Vec<NoteRecord>, AutomationError> {
        Ok(self.notes.iter().take(limit).cloned().collect())
    }
}

fn note(title: &str, content: &str) -> NoteRecord {
    NoteRecord {
        title: title.to_string(),
        content: content.to_string(),
        created_at: "2026-08-29T12:00:00Z".to_string(),
    }
}

#[tokio::test]
async fn local_history_takes_the_newest_matching_note() {
    let id = "11111111-2222-3333-4444-555555555555";
    let store = Arc::new(FakeStore {
        notes: vec![
            note("Grocery list", "milk, eggs"),
            note(
                "API sketches",
                &format!("see https://claude.ai/project/{id} for context"),
            ),
            note(
                "Older project",
                "https://claude.ai/project/99999999-8888-7777-6666-555555555555",
            ),
        ],
    });
    let probe = LocalHistoryProbe::new(HostConfig::default(), store);
    let resolver = ContextResolver::with_probes(vec![Box::new(probe)]);

    let found = resolver.resolve().await.expect("should detect");
    assert_eq!(found.identity.id, id);
    assert_eq!(found.identity.display_name, "API sketches");
    assert_eq!(found.source, DetectionSource::LocalHistory);
    assert_eq!(found.confidence, 4);
}

#[tokio::test]
async fn local_history_ignores_malformed_tokens() {
    let store = Arc::new(FakeStore {
        notes: vec![note("Short id", "https://claude.ai/project/abc123")],
    });
    let probe = LocalHistoryProbe::new(HostConfig::default(), store);
    assert!(probe.attempt().await.expect("no error").is_none());
}

mod config_probe {
    use super::*;
    use crate::probes::ConfigProbe;

    // Each test uses its own env var names so parallel tests cannot race.
    fn config(suffix: &str) -> HostConfig {
        let mut config = HostConfig::default();
        config.env_project_id = format!("SCRIBE_TEST_PROJECT_ID_{suffix}");
        config.env_project_name = format!("SCRIBE_TEST_PROJECT_NAME_{suffix}");
        config
    }

    #[tokio::test]
    async fn explicit_configuration_wins_with_top_confidence() {
        let config = config("WINS");
        std::env::set_var(&config.env_project_id, "proj-123");
        std::env::set_var(&config.env_project_name, "Demo");

        let probe = ConfigProbe::new(config.clone());
        let found = probe.attempt().await.expect("no error").expect("detects");
        assert_eq!(found.identity.id, "proj-123");
        assert_eq!(found.identity.display_name, "Demo");
        assert_eq!(found.identity.canonical_url, config.project_url("proj-123"));
        assert_eq!(found.confidence, 5);

        std::env::remove_var(&config.env_project_id);
        std::env::remove_var(&config.env_project_name);
    }

    #[tokio::test]
    async fn missing_name_gets_a_placeholder() {
        let config = config("PLACEHOLDER");
        std::env::set_var(&config.env_project_id, "abcdefgh-rest-of-the-id");

        let probe = ConfigProbe::new(config.clone());
        let found = probe.attempt().await.expect("no error").expect("detects");
        assert_eq!(found.identity.display_name, "Project abcdefgh");

        std::env::remove_var(&config.env_project_id);
    }

    #[tokio::test]
    async fn empty_id_is_no_evidence() {
        let config = config("EMPTY");
        std::env::set_var(&config.env_project_id, "   ");
        let probe = ConfigProbe::new(config.clone());
        assert!(probe.attempt().await.expect("no error").is_none());
        std::env::remove_var(&config.env_project_id);
    }

    #[tokio::test]
    async fn unset_id_is_no_evidence() {
        let probe = ConfigProbe::new(config("UNSET"));
        assert!(probe.attempt().await.expect("no error").is_none());
    }

    #[tokio::test]
    async fn config_detection_short_circuits_the_real_cascade() {
        let config = config("E2E");
        std::env::set_var(&config.env_project_id, "proj-123");
        std::env::set_var(&config.env_project_name, "Demo");

        let probe = ConfigProbe::new(config.clone());
        let (later, later_calls) = StaticProbe::hit(DetectionSource::LiveSession, "other");
        let resolver = ContextResolver::with_probes(vec![Box::new(probe), Box::new(later)]);

        let found = resolver.resolve().await.expect("detects");
        assert_eq!(found.source, DetectionSource::Config);
        assert_eq!(found.identity.id, "proj-123");
        assert_eq!(found.identity.display_name, "Demo");
        assert_eq!(found.confidence, 5);
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);

        std::env::remove_var(&config.env_project_id);
        std::env::remove_var(&config.env_project_name);
    }
}
