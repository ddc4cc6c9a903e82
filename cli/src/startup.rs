//! Simulated client boot.
//!
//! Modules load in an order nobody controls, while the settings loader and the
//! capability lookup publish their results at arbitrary points in between. The
//! broker makes every interleaving end in the same state:
//!
//! ```text
//!   load mail ─────┐
//!   publish caps ──┼──► Broker<Signal> ──► settings ─────────► module.language
//!   load drive ────┤                   ├─► capabilities ─────► settings pane shown/hidden
//!   publish sets ──┘                   └─► capabilities:<x> ─► module enabled
//! ```
//!
//! A module whose capability is missing never sees `capabilities:<x>`; that
//! subscription stays pending and is listed as unresolved in the report.

use std::{cell::RefCell, collections::BTreeMap, fmt, rc::Rc};

use anyhow::{Result, bail};
use log::{info, warn};
use rand::{SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;
use rusty_ready::{Broker, BrokerStats, Topic};

use crate::capabilities::Capabilities;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub language: String,
}

/// Payload carried by every startup topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Settings(Settings),
    Capabilities(Capabilities),
    /// Published on `capabilities:<name>` for each enabled capability.
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Module {
    pub name: &'static str,
    /// Capability gating the module's settings pane. `None` is always shown.
    pub capability: Option<&'static str>,
}

pub const MODULES: &[Module] = &[
    Module { name: "mail", capability: Some("webmail") },
    Module { name: "calendar", capability: Some("calendar") },
    Module { name: "contacts", capability: Some("contacts") },
    Module { name: "drive", capability: Some("infostore") },
    Module { name: "tasks", capability: Some("tasks") },
    Module { name: "portal", capability: None },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Load(Module),
    PublishSettings,
    PublishCapabilities,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Load(module) => write!(f, "load {}", module.name),
            Step::PublishSettings => f.write_str("publish settings"),
            Step::PublishCapabilities => f.write_str("publish capabilities"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Pane {
    #[default]
    Pending,
    Registered,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReport {
    pub name: &'static str,
    /// Language from the settings payload, once delivered.
    pub language: Option<String>,
    pub pane: Pane,
    /// True once the module's capability topic fired (always for ungated modules).
    pub enabled: bool,
}

impl ModuleReport {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            language: None,
            pane: Pane::Pending,
            enabled: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub seed: u64,
    /// Module names to load; empty loads all of [`MODULES`].
    pub modules: Vec<String>,
    pub capabilities: Capabilities,
    pub language: String,
    pub publish_settings: bool,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            modules: Vec::new(),
            capabilities: Capabilities::new(["webmail", "calendar", "contacts", "infostore", "tasks"]),
            language: "en_US".into(),
            publish_settings: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StartupReport {
    pub seed: u64,
    pub steps: Vec<Step>,
    pub modules: Vec<ModuleReport>,
    /// Settings panes in the order they were registered.
    pub panes: Vec<&'static str>,
    pub unresolved: Vec<(Topic, usize)>,
    pub stats: BrokerStats,
}

/// Resolves the module list and shuffles the boot steps with `config.seed`.
pub fn plan(config: &StartupConfig) -> Result<Vec<Step>> {
    let modules = if config.modules.is_empty() {
        MODULES.to_vec()
    } else {
        let mut selected = Vec::with_capacity(config.modules.len());
        for name in &config.modules {
            match MODULES.iter().find(|m| m.name == name.as_str()) {
                Some(module) if !selected.contains(module) => selected.push(*module),
                Some(_) => {}
                None => bail!("unknown module '{name}'"),
            }
        }
        selected
    };

    let mut steps: Vec<Step> = modules.into_iter().map(Step::Load).collect();
    steps.push(Step::PublishCapabilities);
    if config.publish_settings {
        steps.push(Step::PublishSettings);
    }
    steps.shuffle(&mut ChaCha8Rng::seed_from_u64(config.seed));
    Ok(steps)
}

/// Runs one simulated boot and reports the resulting state.
pub fn run(config: &StartupConfig) -> Result<StartupReport> {
    let steps = plan(config)?;
    let boot = Boot::default();
    for step in &steps {
        info!("step: {step}");
        match *step {
            Step::Load(module) => boot.load(module)?,
            Step::PublishSettings => boot.publish_settings(&config.language)?,
            Step::PublishCapabilities => boot.publish_capabilities(&config.capabilities)?,
        }
    }
    Ok(boot.finish(config.seed, steps))
}

type Reports = Rc<RefCell<BTreeMap<&'static str, ModuleReport>>>;

#[derive(Default)]
struct Boot {
    broker: Broker<Signal>,
    reports: Reports,
    panes: Rc<RefCell<Vec<&'static str>>>,
}

impl Boot {
    fn load(&self, module: Module) -> Result<()> {
        self.reports
            .borrow_mut()
            .insert(module.name, ModuleReport::new(module.name));

        let reports = Rc::clone(&self.reports);
        self.broker.ready(move |signal| match signal {
            Signal::Settings(settings) => update(&reports, module.name, |r| {
                r.language = Some(settings.language.clone());
            }),
            other => warn!("module '{}' expected settings, got {other:?}", module.name),
        })?;

        let reports = Rc::clone(&self.reports);
        let panes = Rc::clone(&self.panes);
        self.broker.subscribe(Topic::CAPABILITIES, move |signal| {
            let Signal::Capabilities(caps) = signal else {
                warn!("module '{}' expected capabilities, got {signal:?}", module.name);
                return;
            };
            let visible = module.capability.is_none_or(|cap| caps.has(cap));
            if visible {
                panes.borrow_mut().push(module.name);
            }
            update(&reports, module.name, |r| {
                r.pane = if visible { Pane::Registered } else { Pane::Hidden };
            });
        })?;

        match module.capability {
            Some(cap) => {
                let reports = Rc::clone(&self.reports);
                self.broker
                    .subscribe(Topic::CAPABILITIES.scoped(cap)?, move |_| {
                        update(&reports, module.name, |r| r.enabled = true);
                    })?;
            }
            None => update(&self.reports, module.name, |r| r.enabled = true),
        }
        Ok(())
    }

    fn publish_settings(&self, language: &str) -> Result<()> {
        let delivery = self.broker.publish_ready(Signal::Settings(Settings {
            language: language.to_string(),
        }))?;
        info!("settings delivered to {} waiting module(s)", delivery.delivered);
        Ok(())
    }

    fn publish_capabilities(&self, caps: &Capabilities) -> Result<()> {
        self.broker
            .publish(Topic::CAPABILITIES, Signal::Capabilities(caps.clone()))?;
        for name in caps.iter() {
            self.broker
                .publish(Topic::CAPABILITIES.scoped(name)?, Signal::Enabled)?;
        }
        Ok(())
    }

    fn finish(self, seed: u64, steps: Vec<Step>) -> StartupReport {
        let unresolved = self.broker.unresolved();
        for (topic, pending) in &unresolved {
            warn!("topic '{topic}' never fired; {pending} subscriber(s) still waiting");
        }
        StartupReport {
            seed,
            steps,
            modules: self.reports.borrow().values().cloned().collect(),
            panes: self.panes.borrow().clone(),
            unresolved,
            stats: self.broker.stats(),
        }
    }
}

fn update(reports: &Reports, name: &'static str, f: impl FnOnce(&mut ModuleReport)) {
    if let Some(report) = reports.borrow_mut().get_mut(name) {
        f(report);
    }
}

impl fmt::Display for StartupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "boot order (seed {}):", self.seed)?;
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "  {:>2}. {step}", i + 1)?;
        }

        writeln!(f, "modules:")?;
        for m in &self.modules {
            writeln!(
                f,
                "  {:<10} language={:<8} pane={:<10} enabled={}",
                m.name,
                m.language.as_deref().unwrap_or("-"),
                format!("{:?}", m.pane).to_lowercase(),
                if m.enabled { "yes" } else { "no" },
            )?;
        }

        writeln!(f, "panes: {}", self.panes.join(", "))?;
        if self.unresolved.is_empty() {
            writeln!(f, "unresolved: none")?;
        } else {
            let waiting: Vec<_> = self
                .unresolved
                .iter()
                .map(|(topic, n)| format!("{topic} ({n} pending)"))
                .collect();
            writeln!(f, "unresolved: {}", waiting.join(", "))?;
        }
        write!(
            f,
            "broker: {} publication(s), {} queued deliveries, {} replays, {} failures",
            self.stats.publications,
            self.stats.queued_deliveries,
            self.stats.replays,
            self.stats.failures
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, r: &StartupReport) -> ModuleReport {
        r.modules
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .unwrap_or_else(|| panic!("no report for {name}"))
    }

    // ==================== Plan ====================

    #[test]
    fn plan_contains_every_step_once() {
        let steps = plan(&StartupConfig::default()).unwrap();

        assert_eq!(steps.len(), MODULES.len() + 2);
        assert_eq!(steps.iter().filter(|s| **s == Step::PublishSettings).count(), 1);
        assert_eq!(steps.iter().filter(|s| **s == Step::PublishCapabilities).count(), 1);
    }

    #[test]
    fn plan_is_deterministic_per_seed() {
        let cfg = StartupConfig {
            seed: 42,
            ..Default::default()
        };

        assert_eq!(plan(&cfg).unwrap(), plan(&cfg).unwrap());
    }

    #[test]
    fn plan_rejects_unknown_module() {
        let cfg = StartupConfig {
            modules: vec!["mail".into(), "spreadsheet".into()],
            ..Default::default()
        };

        let err = plan(&cfg).unwrap_err();

        assert_eq!(err.to_string(), "unknown module 'spreadsheet'");
    }

    #[test]
    fn plan_ignores_duplicate_modules() {
        let cfg = StartupConfig {
            modules: vec!["mail".into(), "mail".into()],
            publish_settings: false,
            ..Default::default()
        };

        assert_eq!(plan(&cfg).unwrap().len(), 2);
    }

    // ==================== Boot ====================

    #[test]
    fn every_interleaving_reaches_the_same_state() {
        for seed in 0..32 {
            let r = run(&StartupConfig {
                seed,
                ..Default::default()
            })
            .unwrap();

            assert_eq!(r.modules.len(), MODULES.len(), "seed {seed}");
            for m in &r.modules {
                assert_eq!(m.language.as_deref(), Some("en_US"), "seed {seed} {}", m.name);
                assert_eq!(m.pane, Pane::Registered, "seed {seed} {}", m.name);
                assert!(m.enabled, "seed {seed} {}", m.name);
            }
            assert_eq!(r.panes.len(), MODULES.len(), "seed {seed}");
            assert!(r.unresolved.is_empty(), "seed {seed}");
            assert_eq!(r.stats.failures, 0);
        }
    }

    #[test]
    fn missing_capability_hides_pane_and_leaves_topic_pending() {
        let r = run(&StartupConfig {
            seed: 3,
            capabilities: Capabilities::new(["webmail", "calendar", "contacts", "infostore"]),
            ..Default::default()
        })
        .unwrap();

        let tasks = report("tasks", &r);
        assert_eq!(tasks.pane, Pane::Hidden);
        assert!(!tasks.enabled);
        assert_eq!(tasks.language.as_deref(), Some("en_US"));
        assert!(!r.panes.contains(&"tasks"));
        assert_eq!(
            r.unresolved,
            [(Topic::CAPABILITIES.scoped("tasks").unwrap(), 1)]
        );
    }

    #[test]
    fn skipped_settings_are_reported_unresolved() {
        let r = run(&StartupConfig {
            seed: 9,
            modules: vec!["mail".into(), "portal".into()],
            publish_settings: false,
            ..Default::default()
        })
        .unwrap();

        assert!(r.modules.iter().all(|m| m.language.is_none()));
        assert_eq!(r.unresolved, [(Topic::SETTINGS, 2)]);
        assert!(report("portal", &r).enabled);
    }

    #[test]
    fn report_renders_summary() {
        let r = run(&StartupConfig {
            modules: vec!["portal".into()],
            ..Default::default()
        })
        .unwrap();

        let text = r.to_string();

        assert!(text.starts_with("boot order (seed 0):"));
        assert!(text.contains("portal"));
        assert!(text.contains("panes: portal"));
        assert!(text.contains("unresolved: none"));
    }
}
