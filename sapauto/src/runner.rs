//! Sequential batch over work items
//!
//! Items are processed strictly one after another; at most one session is
//! open at any time. A failing item never stops the batch.

use crate::credentials::PasswordResolver;
use crate::errors::AutomationError;
use crate::platforms::ScriptingEngine;
use crate::session::{Automator, PlaceholderTask, Task};
use crate::types::{Timings, WorkItem};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Logged on, ran the task and logged off.
    Completed,
    /// No password, nothing was attempted.
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReport {
    pub item: WorkItem,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|r| r.status == status).count()
    }

    pub fn completed(&self) -> usize {
        self.count(ItemStatus::Completed)
    }

    pub fn skipped(&self) -> usize {
        self.count(ItemStatus::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(ItemStatus::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

pub struct BatchRunner<'e> {
    engine: &'e dyn ScriptingEngine,
    timings: Timings,
    task: Box<dyn Task + 'e>,
}

impl<'e> BatchRunner<'e> {
    pub fn new(engine: &'e dyn ScriptingEngine, timings: Timings) -> Self {
        Self {
            engine,
            timings,
            task: Box::new(PlaceholderTask),
        }
    }

    /// Replace the placeholder with a real unit of work.
    pub fn with_task(mut self, task: impl Task + 'e) -> Self {
        self.task = Box::new(task);
        self
    }

    pub async fn run<R>(
        &self,
        items: impl IntoIterator<Item = WorkItem>,
        resolver: &R,
    ) -> BatchReport
    where
        R: PasswordResolver + ?Sized,
    {
        let mut report = BatchReport::default();
        let mut current_sheet: Option<String> = None;

        for item in items {
            if item.sheet.is_some() && item.sheet != current_sheet {
                current_sheet = item.sheet.clone();
                info!(
                    "Processing sheet: {}",
                    current_sheet.as_deref().unwrap_or_default()
                );
            }
            report.items.push(self.run_item(item, resolver).await);
        }

        info!(
            completed = report.completed(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Finished processing all entries"
        );
        report
    }

    /// Process one item: resolve, connect, run the task, log off.
    pub async fn run_item<R>(&self, item: WorkItem, resolver: &R) -> ItemReport
    where
        R: PasswordResolver + ?Sized,
    {
        let started = Instant::now();
        let finish = |item: WorkItem, status: ItemStatus, reason: Option<String>| ItemReport {
            item,
            status,
            reason,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        let Some(password) = resolver.resolve(&item) else {
            let reason = AutomationError::MissingPassword {
                system: item.system_name.clone(),
                client: item.client.clone(),
                user: item.user.clone(),
            };
            warn!("{}. Skipping.", reason);
            return finish(item, ItemStatus::Skipped, Some(reason.to_string()));
        };

        let mut automator = Automator::new(self.engine, item.clone(), password, self.timings);
        if let Err(e) = automator.connect().await {
            error!(
                "Failed to complete the process for user {} on system {} {}",
                item.user, item.system_name, item.client
            );
            return finish(item, ItemStatus::Failed, Some(e.to_string()));
        }

        let task_result = automator.perform_task(self.task.as_ref()).await;
        automator.disconnect().await;

        match task_result {
            Ok(()) => finish(item, ItemStatus::Completed, None),
            Err(e) => {
                error!("Task '{}' failed for {}: {}", self.task.name(), item, e);
                finish(item, ItemStatus::Failed, Some(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;
    use crate::platforms::simulated::{SimulatedEngine, SystemBehavior};
    use crate::platforms::GuiSession;
    use async_trait::async_trait;
    use std::cell::Cell;

    struct FailingTask;

    #[async_trait(?Send)]
    impl Task for FailingTask {
        fn name(&self) -> &str {
            "failing"
        }

        async fn run(
            &self,
            _session: &dyn GuiSession,
            _timings: &Timings,
        ) -> Result<(), AutomationError> {
            Err(AutomationError::scripting("task", "transaction aborted"))
        }
    }

    struct CountingTask<'a>(&'a Cell<usize>);

    #[async_trait(?Send)]
    impl Task for CountingTask<'_> {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(
            &self,
            _session: &dyn GuiSession,
            _timings: &Timings,
        ) -> Result<(), AutomationError> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_task_still_logs_off() {
        let engine = SimulatedEngine::new();
        let mut store = CredentialStore::default();
        store.insert("SYS1", "alice", "100", "pw1");

        let runner = BatchRunner::new(&engine, Timings::default()).with_task(FailingTask);
        let report = runner
            .run(vec![WorkItem::new("SYS1", "100", "alice")], &store)
            .await;

        assert_eq!(report.failed(), 1);
        assert!(report.items[0]
            .reason
            .as_deref()
            .unwrap()
            .contains("transaction aborted"));
        assert_eq!(engine.logoffs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_task_runs_once_per_connected_item() {
        let engine = SimulatedEngine::new().with_system("BAD", SystemBehavior::failing("down"));
        let runs = Cell::new(0);
        let resolver = |_: &WorkItem| Some("pw".to_string());

        let runner = BatchRunner::new(&engine, Timings::default()).with_task(CountingTask(&runs));
        let report = runner
            .run(
                vec![
                    WorkItem::new("SYS1", "100", "alice"),
                    WorkItem::new("BAD", "100", "alice"),
                    WorkItem::new("SYS2", "200", "bob"),
                ],
                &resolver,
            )
            .await;

        assert_eq!(runs.get(), 2);
        assert_eq!(report.completed(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.items[1].status, ItemStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_covers_the_connect_wait() {
        let engine =
            SimulatedEngine::new().with_system("SLOW", SystemBehavior::never_ready());
        let resolver = |_: &WorkItem| Some("pw".to_string());

        let report = BatchRunner::new(&engine, Timings::default())
            .run(vec![WorkItem::new("SLOW", "100", "alice")], &resolver)
            .await;

        assert_eq!(report.items[0].status, ItemStatus::Failed);
        assert_eq!(report.items[0].duration_ms, 15_000);
    }

    #[test]
    fn test_report_serializes_status_lowercase() {
        let report = BatchReport {
            items: vec![ItemReport {
                item: WorkItem::new("SYS1", "100", "alice"),
                status: ItemStatus::Skipped,
                reason: Some("no password".into()),
                duration_ms: 0,
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["items"][0]["status"], "skipped");
        assert_eq!(json["items"][0]["item"]["system_name"], "SYS1");
        assert!(json["items"][0]["item"].get("sheet").is_none());
    }
}
