//! Cycle manager.
//!
//! Drives periodic collection cycles: fan out to every agent, then (when
//! anything came back) run the assessment and the breaking-news fetch
//! side by side, and publish one [`CycleUpdate`] per cycle.
//!
//! Everything the manager has to say goes out on a single event channel:
//! cycle updates, per-agent progress and activity-log lines.
//!
//! `stop` only disarms the timer. Cycles already in flight run to
//! completion and still publish their update. Overlapping cycles (a manual
//! refresh landing on a timer tick) are allowed to run side by side; each
//! gets its own cycle number.

use crate::agent::{collect_all, Briefing, Collector, FanoutPolicy, QueryStrategy};
use crate::analysis::{fetch_breaking, synthesize};
use crate::gateway::ModelGateway;
use crate::models::{
    Agent, AgentProgress, AgentStatus, CycleUpdate, LogEvent, LogKind, PipelineEvent,
};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shortest accepted refresh interval.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Per-cycle pipeline settings.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub briefing: Briefing,
    pub strategy: QueryStrategy,
    pub fanout: FanoutPolicy,
    /// Model asked for the situation assessment.
    pub synthesis_model: String,
}

struct Shared {
    gateway: Arc<dyn ModelGateway>,
    api_key: String,
    agents: Vec<Agent>,
    settings: CycleSettings,
    events: UnboundedSender<PipelineEvent>,
    cycle_count: AtomicU64,
    running: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the scheduler; clones share state.
#[derive(Clone)]
pub struct CycleManager {
    shared: Arc<Shared>,
}

impl CycleManager {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        api_key: String,
        agents: Vec<Agent>,
        settings: CycleSettings,
        events: UnboundedSender<PipelineEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                gateway,
                api_key,
                agents,
                settings,
                events,
                cycle_count: AtomicU64::new(0),
                running: AtomicBool::new(false),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Number of cycles started so far.
    pub fn cycle_count(&self) -> u64 {
        self.shared.cycle_count.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Run one cycle now and arm the timer for the following ones.
    ///
    /// Does nothing when already started. Must be called inside a tokio
    /// runtime.
    pub fn start(&self, interval: Duration) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            debug!("Cycle manager already running");
            return;
        }

        let interval = interval.max(MIN_INTERVAL);
        self.shared.log(
            format!(
                "System started - {} agents activated, refresh every {}s",
                self.shared.agents.len(),
                interval.as_secs()
            ),
            LogKind::System,
        );

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared.run_cycle().await;
        });

        // The timer must not keep the manager alive once every handle is gone.
        let weak = Arc::downgrade(&self.shared);
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    debug!("Cycle manager dropped, timer exiting");
                    break;
                };
                if shared.running.load(Ordering::SeqCst) {
                    tokio::spawn(async move {
                        shared.run_cycle().await;
                    });
                }
            }
        });

        if let Ok(mut timer) = self.shared.timer.lock() {
            if let Some(old) = timer.replace(handle) {
                old.abort();
            }
        }
    }

    /// Disarm the timer. In-flight cycles are not cancelled.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Ok(mut timer) = self.shared.timer.lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
        self.shared.log("System stopped", LogKind::System);
    }

    /// Run one cycle immediately, regardless of the timer.
    pub async fn manual_refresh(&self) -> CycleUpdate {
        self.shared.log("Manual refresh", LogKind::System);
        self.shared.run_cycle().await
    }
}

impl Shared {
    fn emit(&self, event: PipelineEvent) {
        // A closed receiver just means nobody is listening any more.
        let _ = self.events.send(event);
    }

    fn log(&self, message: impl Into<String>, kind: LogKind) {
        let event = LogEvent::new(message, kind);
        match kind {
            LogKind::Error | LogKind::Alert => warn!("{}", event.message),
            _ => info!("{}", event.message),
        }
        self.emit(PipelineEvent::Log(event));
    }

    fn on_progress(&self, progress: AgentProgress) {
        match progress.status {
            AgentStatus::Done => self.log(
                format!(
                    "{}: {} reports",
                    progress.agent_id.to_uppercase(),
                    progress.count.unwrap_or(0)
                ),
                LogKind::Success,
            ),
            AgentStatus::Error => self.log(
                format!(
                    "{}: ERROR - {}",
                    progress.agent_id.to_uppercase(),
                    progress.message.as_deref().unwrap_or("unknown error")
                ),
                LogKind::Error,
            ),
            AgentStatus::Running => {}
        }
        self.emit(PipelineEvent::Progress(progress));
    }

    async fn run_cycle(&self) -> CycleUpdate {
        let cycle = self.cycle_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.log(
            format!("Cycle #{} - launching {} agents", cycle, self.agents.len()),
            LogKind::System,
        );

        let settings = &self.settings;
        let collector = Collector {
            gateway: self.gateway.as_ref(),
            api_key: &self.api_key,
            briefing: &settings.briefing,
            strategy: settings.strategy,
        };

        let intel = collect_all(&collector, &self.agents, settings.fanout, |p| {
            self.on_progress(p)
        })
        .await;

        let total: usize = intel.values().map(Vec::len).sum();
        let mut analysis = None;
        let mut breaking = Vec::new();

        if total > 0 {
            let critical = intel.values().flatten().filter(|i| i.is_critical()).count();
            if critical > 0 {
                self.log(
                    format!("{} critical reports in cycle #{}", critical, cycle),
                    LogKind::Alert,
                );
            }

            self.log("Strategic analysis + breaking news...", LogKind::System);
            let (analysis_outcome, breaking_outcome) = tokio::join!(
                synthesize(
                    self.gateway.as_ref(),
                    &self.api_key,
                    &intel,
                    &self.agents,
                    &settings.briefing,
                    &settings.synthesis_model,
                ),
                fetch_breaking(self.gateway.as_ref(), &self.api_key, &settings.briefing),
            );

            match analysis_outcome {
                Ok(Some(a)) => {
                    self.log("Analysis complete", LogKind::Success);
                    analysis = Some(a);
                }
                Ok(None) => self.log("Analysis returned no usable assessment", LogKind::Info),
                Err(e) => self.log(
                    format!("Analysis failed: {}", truncate(&e.to_string(), 80)),
                    LogKind::Error,
                ),
            }

            match breaking_outcome {
                Ok(entries) => breaking = entries,
                Err(e) => self.log(
                    format!("Breaking news failed: {}", truncate(&e.to_string(), 80)),
                    LogKind::Error,
                ),
            }
        } else {
            self.log(
                "No reports collected - check the API key and credit",
                LogKind::Error,
            );
        }

        let update = CycleUpdate {
            cycle,
            timestamp: Utc::now(),
            intel,
            analysis,
            breaking,
        };
        self.emit(PipelineEvent::Update(update.clone()));

        self.log(
            format!("Cycle #{} complete - {} reports", cycle, total),
            if total > 0 {
                LogKind::Success
            } else {
                LogKind::Error
            },
        );

        update
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{test_agent, test_briefing};
    use crate::gateway::testing::ScriptedGateway;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    const STRIKE: &str = r#"[{"headline":"Strike reported","summary":"...", "source":"X","time":"1h ago","severity":9}]"#;
    const ASSESSMENT: &str = r#"{"threat_level": 8, "threat_label": "HIGH", "recommendation": "Shelter"}"#;
    const TICKER: &str = r#"[{"text":"Sirens in the north","severity":4,"time":"now"}]"#;

    fn settings() -> CycleSettings {
        CycleSettings {
            briefing: test_briefing(),
            strategy: QueryStrategy::Combined,
            fanout: FanoutPolicy::Concurrent,
            synthesis_model: "synth".to_string(),
        }
    }

    fn working_gateway() -> ScriptedGateway {
        ScriptedGateway::new()
            .reply_when("Based on these", ASSESSMENT)
            .reply_when("absolute latest", TICKER)
            .reply_otherwise(STRIKE)
    }

    fn manager(
        gateway: ScriptedGateway,
        agents: Vec<Agent>,
    ) -> (CycleManager, UnboundedReceiver<PipelineEvent>, Arc<ScriptedGateway>) {
        let gateway = Arc::new(gateway);
        let (tx, rx) = unbounded_channel();
        let manager = CycleManager::new(
            gateway.clone(),
            "key".to_string(),
            agents,
            settings(),
            tx,
        );
        (manager, rx, gateway)
    }

    async fn next_update(rx: &mut UnboundedReceiver<PipelineEvent>) -> CycleUpdate {
        loop {
            match rx.recv().await {
                Some(PipelineEvent::Update(update)) => return update,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    }

    fn drain(rx: &mut UnboundedReceiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_full_cycle() {
        let (manager, mut rx, _) = manager(working_gateway(), vec![test_agent("sigint")]);

        let update = manager.manual_refresh().await;

        assert_eq!(update.cycle, 1);
        assert_eq!(update.intel["sigint"].len(), 1);
        assert_eq!(update.intel["sigint"][0].severity, 5);
        assert_eq!(update.analysis.as_ref().unwrap().threat_level, Some(8));
        assert_eq!(update.breaking.len(), 1);

        let events = drain(&mut rx);
        let updates = events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::Update(_)))
            .count();
        assert_eq!(updates, 1);

        let logs: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Log(l) => Some(l),
                _ => None,
            })
            .collect();
        assert!(logs.iter().any(|l| l.kind == LogKind::Alert));
        assert!(logs.iter().any(|l| l.message == "Analysis complete"));
        assert!(logs
            .iter()
            .any(|l| l.message == "Cycle #1 complete - 1 reports" && l.kind == LogKind::Success));

        let progress: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Progress(p) => Some(p.status),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![AgentStatus::Running, AgentStatus::Done]);
    }

    #[tokio::test]
    async fn test_failing_cycle_still_emits_update() {
        let (manager, mut rx, gateway) = manager(
            ScriptedGateway::new().fail_when("query", 503),
            vec![test_agent("sigint"), test_agent("osint")],
        );

        let update = manager.manual_refresh().await;

        assert_eq!(update.total_items(), 0);
        assert_eq!(update.intel.len(), 2);
        assert!(update.analysis.is_none());
        assert!(update.breaking.is_empty());
        // no analysis or ticker call without data
        assert_eq!(gateway.calls(), 2);

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::Update(u) if u.cycle == 1)));
    }

    #[tokio::test]
    async fn test_analysis_failure_is_isolated() {
        let gateway = ScriptedGateway::new()
            .fail_when("Based on these", 500)
            .reply_when("absolute latest", TICKER)
            .reply_otherwise(STRIKE);
        let (manager, mut rx, _) = manager(gateway, vec![test_agent("sigint")]);

        let update = manager.manual_refresh().await;
        assert!(update.analysis.is_none());
        assert_eq!(update.breaking.len(), 1);
        assert_eq!(update.total_items(), 1);

        let failed = drain(&mut rx).into_iter().any(|e| {
            matches!(e, PipelineEvent::Log(ref l) if l.kind == LogKind::Error && l.message.starts_with("Analysis failed"))
        });
        assert!(failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_runs_one_cycle() {
        let (manager, mut rx, _) = manager(working_gateway(), vec![test_agent("sigint")]);

        manager.start(Duration::from_secs(60));
        manager.start(Duration::from_secs(60));

        let update = next_update(&mut rx).await;
        assert_eq!(update.cycle, 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(manager.cycle_count(), 1);
        assert!(manager.is_running());
        manager.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_drives_next_cycle() {
        let (manager, mut rx, _) = manager(working_gateway(), vec![test_agent("sigint")]);
        manager.start(Duration::from_secs(60));

        assert_eq!(next_update(&mut rx).await.cycle, 1);
        let started = tokio::time::Instant::now();
        assert_eq!(next_update(&mut rx).await.cycle, 2);
        assert!(started.elapsed() >= Duration::from_secs(55));
        manager.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_future_cycles() {
        let (manager, mut rx, _) = manager(working_gateway(), vec![test_agent("sigint")]);
        manager.start(Duration::from_secs(60));
        next_update(&mut rx).await;

        manager.stop();
        assert!(!manager.is_running());
        tokio::time::sleep(Duration::from_secs(180)).await;

        assert_eq!(manager.cycle_count(), 1);
        let late_updates = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, PipelineEvent::Update(_)))
            .count();
        assert_eq!(late_updates, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_manager_stops_timer() {
        let (manager, mut rx, gateway) = manager(working_gateway(), vec![test_agent("sigint")]);
        manager.start(Duration::from_secs(60));
        next_update(&mut rx).await;
        let calls = gateway.calls();

        drop(manager);
        tokio::time::sleep(Duration::from_secs(301)).await;

        assert_eq!(gateway.calls(), calls);
        let late_updates = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, PipelineEvent::Update(_)))
            .count();
        assert_eq!(late_updates, 0);
    }

    #[tokio::test]
    async fn test_severity_four_raises_alert() {
        let gateway = ScriptedGateway::new()
            .reply_when("Based on these", ASSESSMENT)
            .reply_when("absolute latest", TICKER)
            .reply_otherwise(r#"[{"headline":"Convoy spotted","severity":4},{"headline":"Quiet night","severity":2}]"#);
        let (manager, mut rx, _) = manager(gateway, vec![test_agent("sigint")]);

        let update = manager.manual_refresh().await;
        assert_eq!(update.critical_items(), 1);

        let alert = drain(&mut rx).into_iter().find_map(|e| match e {
            PipelineEvent::Log(l) if l.kind == LogKind::Alert => Some(l.message),
            _ => None,
        });
        assert_eq!(alert.as_deref(), Some("1 critical reports in cycle #1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let (manager, mut rx, _) = manager(working_gateway(), vec![test_agent("sigint")]);
        manager.start(Duration::from_secs(60));
        next_update(&mut rx).await;
        manager.stop();

        manager.start(Duration::from_secs(60));
        assert_eq!(next_update(&mut rx).await.cycle, 2);
        manager.stop();
    }
}
