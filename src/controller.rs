/*!
 * The top-level agent loop
 *
 * One cycle: check connectivity, persist pending document changes, reconcile
 * villages with the remote overview, discover world features, run every
 * village, then sleep. [`supervise`] wraps a whole run and restarts it a
 * bounded number of times after a crash.
 */

use crate::commands::init::InteractiveSetup;
use crate::config::{Bootstrap, ConfigDocument, ConfigStore, NoBootstrap, Slot};
use crate::entity::{Entity, EntityFactory, OverviewVillage};
use crate::error::{AgentError, Result};
use crate::logging;
use crate::orchestrator::{CycleReport, EntityOrchestrator};
use crate::remote::{ConnectivityGate, HttpProbe, HttpTransport, MarkupExtractor, TransportError};
use crate::settings::RuntimeSettings;
use crate::world::{discover_world_flags, WorldSync};
use chrono::Timelike;
use outpost_core_schedule::{ScheduleDecision, SleepPolicy};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Blocks the loop between cycles
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Network or overview unavailable; waited and did nothing else
    Offline,
    Completed(CycleReport),
}

/// Collaborators the controller drives
pub struct Collaborators {
    pub gate: Box<dyn ConnectivityGate>,
    pub world: WorldSync,
    pub orchestrator: EntityOrchestrator,
    pub sleeper: Box<dyn Sleeper>,
}

pub struct Controller {
    store: ConfigStore,
    doc: ConfigDocument,
    gate: Box<dyn ConnectivityGate>,
    world: WorldSync,
    orchestrator: EntityOrchestrator,
    sleeper: Box<dyn Sleeper>,
    rng: StdRng,
    clock: Box<dyn Fn() -> u32>,
    max_cycles: u64,
    cycles: u64,
}

impl Controller {
    pub fn new(store: ConfigStore, doc: ConfigDocument, parts: Collaborators) -> Self {
        Self {
            store,
            doc,
            gate: parts.gate,
            world: parts.world,
            orchestrator: parts.orchestrator,
            sleeper: parts.sleeper,
            rng: StdRng::from_os_rng(),
            clock: Box::new(|| chrono::Local::now().hour()),
            max_cycles: 0,
            cycles: 0,
        }
    }

    /// Stop `run` after this many cycles; 0 runs forever
    pub fn with_max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Replace the wall-clock hour source
    pub fn with_clock(mut self, clock: impl Fn() -> u32 + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.doc
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Build a controller for a real run from `settings`
    pub fn from_settings(settings: &RuntimeSettings) -> Result<Self> {
        let mut store = ConfigStore::new(settings.storage());
        let bootstrap: &dyn Bootstrap = if settings.interactive {
            &InteractiveSetup
        } else {
            &NoBootstrap
        };
        let doc = startup(&mut store, bootstrap)?;

        let transport = Arc::new(HttpTransport::from_document(&doc)?);
        let extractor = Arc::new(MarkupExtractor);
        let gate = HttpProbe::new(
            settings.probe_url.clone(),
            settings.probe_connect_timeout(),
            settings.probe_timeout(),
        )?;

        let world = WorldSync::new(transport.clone(), extractor.clone());
        let factory: EntityFactory = Box::new(move |id: &str| -> Box<dyn Entity> {
            Box::new(OverviewVillage::new(id, transport.clone(), extractor.clone()))
        });

        let parts = Collaborators {
            gate: Box::new(gate),
            world,
            orchestrator: EntityOrchestrator::new(factory),
            sleeper: Box::new(ThreadSleeper),
        };
        Ok(Controller::new(store, doc, parts).with_max_cycles(settings.max_cycles))
    }

    /// Run one cycle, including the sleep that follows it
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        if !self.gate.is_reachable() {
            info!("Internet seems to be down, waiting till it's back online...");
            self.pause()?;
            return Ok(CycleOutcome::Offline);
        }

        self.store.update_if_changed(&self.doc);

        let reconciled = match self.world.reconcile(&mut self.store, &mut self.doc) {
            Ok(reconciled) => reconciled,
            Err(TransportError::SessionExpired) => return Err(AgentError::SessionExpired),
            Err(e) => {
                warn!("Could not load the village overview, backing off: {}", e);
                self.pause()?;
                return Ok(CycleOutcome::Offline);
            }
        };

        if discover_world_flags(&reconciled.overview, &mut self.doc) {
            info!("Updated world options");
            self.store.update_if_changed(&self.doc);
        }

        let report = self
            .orchestrator
            .dispatch(&self.doc, reconciled.known_ids.as_ref())?;
        info!(
            completed = report.completed(),
            skipped = report.skipped(),
            failed = report.failed(),
            under_attack = report.defense_states.values().filter(|v| **v).count(),
            "Cycle finished"
        );

        self.pause()?;
        Ok(CycleOutcome::Completed(report))
    }

    /// Run cycles until `max_cycles` is reached or an error escapes a cycle
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.run_cycle()?;
            self.cycles += 1;
            if self.max_cycles > 0 && self.cycles >= self.max_cycles {
                info!(cycles = self.cycles, "Cycle limit reached, stopping");
                return Ok(());
            }
        }
    }

    fn sleep_policy(&self) -> Result<SleepPolicy> {
        let corrupt = |reason: String| AgentError::CorruptConfig {
            path: self.store.storage().location(Slot::Primary),
            reason,
        };
        let bot = self.doc.bot_settings().map_err(|e| corrupt(e.to_string()))?;
        bot.sleep_policy()
            .map_err(|e| corrupt(format!("bot.active_hours: {}", e)))
    }

    fn pause(&mut self) -> Result<ScheduleDecision> {
        let decision = self.sleep_policy()?.decide((self.clock)(), &mut self.rng);
        logging::log_sleep(decision.delay);
        self.sleeper.sleep(decision.delay);
        Ok(decision)
    }
}

/// Load the document and bring it up to the template's schema
pub fn startup(store: &mut ConfigStore, bootstrap: &dyn Bootstrap) -> Result<ConfigDocument> {
    let doc = store.load(bootstrap)?;
    let doc = match store.load_template()? {
        Some(template) => store.migrate_if_needed(doc, &template),
        None => doc,
    };

    let bot = doc.bot_settings().map_err(|e| AgentError::CorruptConfig {
        path: store.storage().location(Slot::Primary),
        reason: format!("bot section: {}", e),
    })?;
    bot.active_window().map_err(|e| AgentError::CorruptConfig {
        path: store.storage().location(Slot::Primary),
        reason: format!("bot.active_hours: {}", e),
    })?;

    Ok(doc)
}

/// Run `start` then the controller it builds, restarting after crashes.
///
/// At most `max_runs` runs are attempted. Fatal errors end immediately
/// without using the remaining budget.
pub fn supervise<F>(max_runs: u32, mut start: F) -> Result<()>
where
    F: FnMut() -> Result<Controller>,
{
    let max_runs = max_runs.max(1);
    for attempt in 1..=max_runs {
        match start().and_then(|mut controller| controller.run()) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(
                    attempt,
                    max = max_runs,
                    category = %e.category(),
                    "Run crashed: {}",
                    e
                );
            }
        }
    }

    Err(AgentError::RestartBudgetExhausted { attempts: max_runs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStorage;
    use crate::remote::Transport;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Mutex;

    struct Online(bool);

    impl ConnectivityGate for Online {
        fn is_reachable(&self) -> bool {
            self.0
        }
    }

    struct Recorder(Arc<Mutex<Vec<Duration>>>);

    impl Sleeper for Recorder {
        fn sleep(&mut self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    struct FixedPage(std::result::Result<String, TransportError>);

    impl Transport for FixedPage {
        fn get(&self, _path: &str) -> std::result::Result<String, TransportError> {
            self.0.clone()
        }
    }

    const DOC: &str = r#"{
        "build": {"version": "2"},
        "bot": {"active_hours": "6-23", "active_delay": 100, "inactive_delay": 1000},
        "world": {},
        "villages": {"1": {}},
        "village_template": {}
    }"#;

    fn controller(
        online: bool,
        page: std::result::Result<String, TransportError>,
    ) -> (Controller, Arc<Mutex<Vec<Duration>>>) {
        crate::logging::init_test_logging();
        let doc = ConfigDocument::from_json(DOC).unwrap();
        let storage = MemoryStorage::new().with(Slot::Primary, DOC);
        let mut store = ConfigStore::new(storage);
        store.save(&doc);

        let transport: Arc<dyn Transport> = Arc::new(FixedPage(page));
        let extractor = Arc::new(MarkupExtractor);
        let factory_transport = transport.clone();
        let factory: EntityFactory = Box::new(move |id: &str| -> Box<dyn Entity> {
            Box::new(OverviewVillage::new(
                id,
                factory_transport.clone(),
                Arc::new(MarkupExtractor),
            ))
        });
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let parts = Collaborators {
            gate: Box::new(Online(online)),
            world: WorldSync::new(transport, extractor),
            orchestrator: EntityOrchestrator::new(factory),
            sleeper: Box::new(Recorder(sleeps.clone())),
        };
        let controller = Controller::new(store, doc, parts)
            .with_clock(|| 12)
            .with_rng(StdRng::seed_from_u64(7));
        (controller, sleeps)
    }

    #[test]
    fn test_offline_cycle_only_sleeps() {
        let (mut controller, sleeps) = controller(false, Ok(String::new()));
        assert_eq!(controller.run_cycle().unwrap(), CycleOutcome::Offline);

        let sleeps = sleeps.lock().unwrap();
        assert_eq!(sleeps.len(), 1);
        assert!((120..=220).contains(&sleeps[0].as_secs()));
    }

    #[test]
    fn test_completed_cycle_runs_villages() {
        let (mut controller, sleeps) = controller(true, Ok("<html>screen=flags</html>".to_string()));
        let outcome = controller.run_cycle().unwrap();

        let CycleOutcome::Completed(report) = outcome else {
            panic!("expected a completed cycle");
        };
        assert_eq!(report.completed(), 1);
        assert_eq!(sleeps.lock().unwrap().len(), 1);
        assert_eq!(
            controller.document().get("world", "flags_enabled"),
            Some(&serde_json::Value::Bool(true))
        );
        assert_eq!(controller.store().snapshot(), Some(controller.document()));
    }

    #[test]
    fn test_overview_failure_backs_off() {
        let (mut controller, sleeps) =
            controller(true, Err(TransportError::Timeout("slow".to_string())));
        assert_eq!(controller.run_cycle().unwrap(), CycleOutcome::Offline);
        assert_eq!(sleeps.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_session_loss_escapes_cycle() {
        let (mut controller, _) = controller(true, Err(TransportError::SessionExpired));
        assert!(matches!(
            controller.run_cycle(),
            Err(AgentError::SessionExpired)
        ));
    }

    #[test]
    fn test_run_honours_max_cycles() {
        let (controller, sleeps) = controller(true, Ok(String::new()));
        let mut controller = controller.with_max_cycles(3);
        controller.run().unwrap();
        assert_eq!(controller.cycles(), 3);
        assert_eq!(sleeps.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_supervise_stops_after_budget() {
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();
        let result = supervise(3, move || {
            counter.set(counter.get() + 1);
            Err(AgentError::TransientNetwork("boom".to_string()))
        });

        assert!(matches!(
            result,
            Err(AgentError::RestartBudgetExhausted { attempts: 3 })
        ));
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_supervise_fatal_is_not_retried() {
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();
        let result = supervise(3, move || {
            counter.set(counter.get() + 1);
            Err(AgentError::Bootstrap("declined".to_string()))
        });

        assert!(matches!(result, Err(AgentError::Bootstrap(_))));
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_supervise_recovers() {
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();
        let result = supervise(3, move || {
            counter.set(counter.get() + 1);
            if counter.get() < 2 {
                return Err(AgentError::SessionExpired);
            }
            let (controller, _) = controller(true, Ok(String::new()));
            Ok(controller.with_max_cycles(1))
        });

        assert!(result.is_ok());
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn test_startup_migrates_outdated_document() {
        let storage = MemoryStorage::new()
            .with(Slot::Primary, r#"{"build": {"version": "1"}, "bot": {"active_delay": 5}, "villages": {}}"#)
            .with(Slot::Template, DOC);
        let mut store = ConfigStore::new(storage.clone());
        let doc = startup(&mut store, &NoBootstrap).unwrap();

        assert_eq!(doc.version(), Some(&serde_json::json!("2")));
        assert_eq!(doc.get("bot", "active_delay"), Some(&serde_json::json!(5)));
        assert_eq!(storage.writes(), vec![Slot::Backup, Slot::Primary]);
    }

    #[test]
    fn test_startup_rejects_bad_active_hours() {
        let storage = MemoryStorage::new().with(
            Slot::Primary,
            r#"{"build": {"version": "2"}, "bot": {"active_hours": "late"}}"#,
        );
        let mut store = ConfigStore::new(storage);
        assert!(matches!(
            startup(&mut store, &NoBootstrap),
            Err(AgentError::CorruptConfig { .. })
        ));
    }
}
