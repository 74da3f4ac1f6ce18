//! Concurrent first-access stress harness for the lazy singleton holders.
//!
//! Every round builds a fresh holder, lines up `callers` threads on a
//! barrier and lets them all race for the first access. The constructor
//! counts its invocations and sleeps for the configured delay so racers
//! really do pile up on the slow path.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::Deserialize;

use crate::config::StressConfig;
use crate::error::{PatternError, Result};
use crate::singleton::{DoubleCheckedSlot, LazySlot, LockedSlot, OnceSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Locked,
    DoubleChecked,
    Once,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Locked, Variant::DoubleChecked, Variant::Once];

    pub fn name(&self) -> &'static str {
        match self {
            Variant::Locked => "locked",
            Variant::DoubleChecked => "double_checked",
            Variant::Once => "once",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StressReport {
    pub variant: Variant,
    pub rounds: usize,
    pub callers: usize,
    /// Worst round: constructor invocations.
    pub max_constructions: usize,
    /// Worst round: distinct instances handed back to callers.
    pub max_identities: usize,
    pub elapsed: Duration,
}

impl StressReport {
    pub fn verify(&self) -> Result<()> {
        if self.max_constructions == 1 && self.max_identities == 1 {
            Ok(())
        } else {
            Err(PatternError::InvariantViolated {
                variant: self.variant.to_string(),
                constructions: self.max_constructions,
                identities: self.max_identities,
            })
        }
    }
}

// Non-zero-sized so every allocation has its own address.
#[derive(Debug)]
struct Probe {
    serial: usize,
}

pub fn run(variant: Variant, config: &StressConfig) -> Result<StressReport> {
    match variant {
        Variant::Locked => run_slot::<LockedSlot<Probe>>(variant, config),
        Variant::DoubleChecked => run_slot::<DoubleCheckedSlot<Probe>>(variant, config),
        Variant::Once => run_slot::<OnceSlot<Probe>>(variant, config),
    }
}

fn run_slot<S>(variant: Variant, config: &StressConfig) -> Result<StressReport>
where
    S: LazySlot<Probe> + Default + Sync,
{
    config.validate()?;

    let start = Instant::now();
    let mut max_constructions = 0;
    let mut max_identities = 0;

    for round in 0..config.rounds {
        let (constructions, identities) = run_round::<S>(variant, config)?;
        debug!(
            "{} round {}: {} constructions, {} identities",
            variant, round, constructions, identities
        );
        max_constructions = max_constructions.max(constructions);
        max_identities = max_identities.max(identities);
    }

    let report = StressReport {
        variant,
        rounds: config.rounds,
        callers: config.callers,
        max_constructions,
        max_identities,
        elapsed: start.elapsed(),
    };
    info!(
        "{}: {} rounds x {} callers in {:?}",
        variant, report.rounds, report.callers, report.elapsed
    );
    Ok(report)
}

fn run_round<S>(variant: Variant, config: &StressConfig) -> Result<(usize, usize)>
where
    S: LazySlot<Probe> + Default + Sync,
{
    let slot = S::default();
    let constructions = AtomicUsize::new(0);
    let barrier = Barrier::new(config.callers);
    let delay = config.construction_delay();
    let (slot, constructions, barrier) = (&slot, &constructions, &barrier);

    let observed = crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = (0..config.callers)
            .map(|_| {
                scope.spawn(move |_| {
                    barrier.wait();
                    let probe = slot.get_or_init(|| {
                        let serial = constructions.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(delay);
                        Probe { serial }
                    });
                    (probe as *const Probe as usize, probe.serial)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join())
            .collect::<thread::Result<Vec<_>>>()
    })
    .map_err(|_| worker_panicked(variant))?
    .map_err(|_| worker_panicked(variant))?;

    let identities = observed.iter().collect::<HashSet<_>>().len();
    Ok((constructions.load(Ordering::SeqCst), identities))
}

fn worker_panicked(variant: Variant) -> PatternError {
    PatternError::WorkerPanicked {
        variant: variant.to_string(),
    }
}
