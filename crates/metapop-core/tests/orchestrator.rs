//! Integration tests for the orchestrator: wiring, tick loop, birth
//! notifications, determinism, and visualization delegation.

#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::rc::Rc;

use metapop_core::{
    BirthAware, BirthBatch, BirthsAuthority, CollectingSink, Component, ComponentError, ComponentFactory,
    ConfigurationError, FigureIter, ModelContext, ModelView, OverrideOutcome, ParameterSet, Phase, Plottable,
    RunError, VisualizeMode,
};
use metapop_core::model::Model;
use metapop_types::{Figure, FigureKind, Patch, PatchDataset};
use rand::Rng as _;

fn scenario() -> PatchDataset {
    PatchDataset::new(vec![
        Patch::new("north", 1_000, 12.0, 8.5),
        Patch::new("central", 5_000, 10.0, 8.0),
        Patch::new("south", 250, 7.5, 7.0),
    ])
    .unwrap()
}

fn params(nticks: i64, seed: i64) -> ParameterSet {
    let mut params = ParameterSet::defaults();
    params.set("nticks", nticks);
    params.set("seed", seed);
    params
}

/// Creates a fixed number of newborns in patch 0 at tick 0 only.
struct FixedBirths {
    at_tick_zero: u64,
    pending: Option<BirthBatch>,
}

impl Component for FixedBirths {
    fn name(&self) -> &str {
        "FixedBirths"
    }

    fn as_phase(&mut self) -> Option<&mut dyn Phase> {
        Some(self)
    }

    fn as_births_authority(&mut self) -> Option<&mut dyn BirthsAuthority> {
        Some(self)
    }
}

impl Phase for FixedBirths {
    fn step(&mut self, ctx: &mut ModelContext<'_>, tick: usize) -> Result<(), ComponentError> {
        let count = if tick == 0 { self.at_tick_zero } else { 0 };
        let dob = i64::try_from(tick).unwrap_or(i64::MAX);
        let agents = ctx.state.population.add_agents(count, 0, dob)?;
        let next = tick.saturating_add(1);
        let current = ctx.state.patches.get(next, 0)?;
        ctx.state.patches.set(next, 0, current.saturating_add(count))?;
        let mut per_patch = vec![0; ctx.npatches()];
        if let Some(first) = per_patch.first_mut() {
            *first = count;
        }
        self.pending = Some(BirthBatch {
            tick,
            agents,
            per_patch,
        });
        Ok(())
    }
}

impl BirthsAuthority for FixedBirths {
    fn take_births(&mut self) -> Option<BirthBatch> {
        self.pending.take()
    }
}

/// Marks newborns susceptible and records every notification.
struct SusceptibilityInitializer {
    seen: Rc<RefCell<Vec<(usize, usize)>>>,
}

impl Component for SusceptibilityInitializer {
    fn name(&self) -> &str {
        "SusceptibilityInitializer"
    }

    fn as_birth_aware(&mut self) -> Option<&mut dyn BirthAware> {
        Some(self)
    }
}

impl BirthAware for SusceptibilityInitializer {
    fn on_birth(&mut self, ctx: &mut ModelContext<'_>, births: &BirthBatch) -> Result<(), ComponentError> {
        self.seen.borrow_mut().push((births.tick, births.len()));
        let values = ctx.state.population.property_mut("susceptibility")?;
        if let Some(newborns) = values.get_mut(births.agents.clone()) {
            newborns.fill(1);
        }
        Ok(())
    }
}

/// Moves a random number of people between the first two patches.
struct Shuffle;

impl Component for Shuffle {
    fn name(&self) -> &str {
        "Shuffle"
    }

    fn as_phase(&mut self) -> Option<&mut dyn Phase> {
        Some(self)
    }

    fn as_plottable(&self) -> Option<&dyn Plottable> {
        Some(self)
    }
}

impl Phase for Shuffle {
    fn step(&mut self, ctx: &mut ModelContext<'_>, tick: usize) -> Result<(), ComponentError> {
        let next = tick.saturating_add(1);
        let from = ctx.state.patches.get(next, 0)?;
        let moved = ctx.state.rng.random_range(0..=from.min(10));
        ctx.state.patches.set(next, 0, from.saturating_sub(moved))?;
        let to = ctx.state.patches.get(next, 1)?;
        ctx.state.patches.set(next, 1, to.saturating_add(moved))?;
        Ok(())
    }
}

impl Plottable for Shuffle {
    fn plots<'a>(&'a self, view: ModelView<'a>) -> FigureIter<'a> {
        Box::new(std::iter::once_with(move || {
            let nticks = view.state.patches.nticks();
            let total = view.state.patches.total(nticks)?;
            #[allow(clippy::cast_precision_loss)]
            let value = total as f64;
            Ok(Figure::new(
                "Final population",
                FigureKind::Bar {
                    bars: vec![metapop_types::PieSlice {
                        label: "total".to_owned(),
                        value,
                    }],
                },
            ))
        }))
    }
}

fn fixed_births(count: u64) -> ComponentFactory {
    ComponentFactory::new("FixedBirths", move |_ctx| {
        let component: Box<dyn Component> = Box::new(FixedBirths {
            at_tick_zero: count,
            pending: None,
        });
        Ok(component)
    })
}

fn initializer(seen: &Rc<RefCell<Vec<(usize, usize)>>>) -> ComponentFactory {
    let seen = Rc::clone(seen);
    ComponentFactory::new("SusceptibilityInitializer", move |ctx| {
        ctx.state.population.add_property("susceptibility", 0)?;
        let component: Box<dyn Component> = Box::new(SusceptibilityInitializer {
            seen: Rc::clone(&seen),
        });
        Ok(component)
    })
}

fn shuffle() -> ComponentFactory {
    ComponentFactory::new("Shuffle", |_ctx| {
        let component: Box<dyn Component> = Box::new(Shuffle);
        Ok(component)
    })
}

#[test]
fn default_phase_only_carries_populations_forward() {
    let mut model = Model::new(scenario(), params(3, 1), "default").unwrap();
    model.set_components(Vec::new()).unwrap();
    let summary = model.run().unwrap();

    assert_eq!(summary.ticks, 3);
    assert_eq!(model.metrics().len(), 3);
    assert!(model.metrics().rows().iter().all(|row| row.elapsed_us.len() == 1));
    let initial = model.state().patches.row(0).unwrap().to_vec();
    for tick in 1..=3 {
        assert_eq!(model.state().patches.row(tick).unwrap(), initial.as_slice());
    }
}

#[test]
fn five_births_produce_one_notification() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut model = Model::new(scenario(), params(1, 1), "births").unwrap();
    model
        .set_components(vec![fixed_births(5), initializer(&seen)])
        .unwrap();
    model.run().unwrap();

    assert_eq!(*seen.borrow(), vec![(0, 5)]);
    let susceptibility = model.state().population.property("susceptibility").unwrap();
    assert_eq!(susceptibility.len(), 6_255);
    assert_eq!(susceptibility.iter().filter(|s| **s == 1).count(), 5);
    assert_eq!(model.state().patches.get(1, 0).unwrap(), 1_005);
}

#[test]
fn empty_batches_still_notify_each_tick() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut model = Model::new(scenario(), params(3, 1), "cadence").unwrap();
    model
        .set_components(vec![fixed_births(2), initializer(&seen)])
        .unwrap();
    model.run().unwrap();
    assert_eq!(*seen.borrow(), vec![(0, 2), (1, 0), (2, 0)]);
}

#[test]
fn birth_aware_without_authority_fails_before_any_tick() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut model = Model::new(scenario(), params(3, 1), "orphan").unwrap();
    let err = model.set_components(vec![initializer(&seen)]).unwrap_err();
    assert!(matches!(err, ConfigurationError::MissingBirthsAuthority { .. }));

    // The previous (empty) wiring survives and still runs.
    model.run().unwrap();
    assert!(seen.borrow().is_empty());
    assert_eq!(model.phase_names(), vec!["Model"]);
}

#[test]
fn same_seed_same_trajectory() {
    let run = |seed| {
        let mut model = Model::new(scenario(), params(20, seed), "det").unwrap();
        model.set_components(vec![shuffle()]).unwrap();
        model.run().unwrap();
        let rows: Vec<Vec<u64>> = (0..=20)
            .map(|t| model.state().patches.row(t).unwrap().to_vec())
            .collect();
        (rows, model.metrics().len(), model.phase_names())
    };
    let (a, a_len, a_names) = run(7);
    let (b, b_len, b_names) = run(7);
    assert_eq!(a, b);
    assert_eq!(a_len, b_len);
    assert_eq!(a_names, b_names);
}

#[test]
fn phase_error_propagates_with_tick_and_name() {
    let failing = ComponentFactory::new("Exploding", |_ctx| {
        struct Exploding;
        impl Component for Exploding {
            fn name(&self) -> &str {
                "Exploding"
            }
            fn as_phase(&mut self) -> Option<&mut dyn Phase> {
                Some(self)
            }
        }
        impl Phase for Exploding {
            fn step(&mut self, _ctx: &mut ModelContext<'_>, tick: usize) -> Result<(), ComponentError> {
                if tick == 4 {
                    return Err(ComponentError::Internal {
                        message: "negative population".to_owned(),
                    });
                }
                Ok(())
            }
        }
        let component: Box<dyn Component> = Box::new(Exploding);
        Ok(component)
    });
    let mut model = Model::new(scenario(), params(10, 1), "explode").unwrap();
    model.set_components(vec![shuffle(), failing]).unwrap();
    let err = model.run().unwrap_err();

    assert!(matches!(err, RunError::Phase { tick: 4, ref phase, .. } if phase == "Exploding"));
    assert_eq!(model.metrics().len(), 4);
    assert!(model.tfinish().is_none());
}

#[test]
fn unknown_override_leaves_parameters_unchanged() {
    let mut params = params(3, 1);
    let before = params.clone();
    let outcome = params.apply_override("nonexistent=5").unwrap();
    assert!(matches!(outcome, OverrideOutcome::Skipped { .. }));
    assert_eq!(params, before);
}

#[test]
fn visualization_runs_model_plots_then_components() {
    let mut model = Model::new(scenario(), params(5, 1), "viz").unwrap();
    model.set_components(vec![shuffle()]).unwrap();
    model.run().unwrap();

    let mut sink = CollectingSink::default();
    let report = model.visualize(VisualizeMode::Interactive(&mut sink)).unwrap();
    assert!(report.skipped.is_empty());
    let sources: Vec<&str> = sink.figures.iter().map(|(source, _)| source.as_str()).collect();
    assert_eq!(sources, vec!["Model", "Model", "Model", "Shuffle"]);
}

#[test]
fn visualization_before_run_skips_phase_pie() {
    let model = Model::new(scenario(), params(5, 1), "viz").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let report = model
        .visualize(VisualizeMode::Document {
            directory: dir.path().to_path_buf(),
        })
        .unwrap();
    assert_eq!(report.rendered, 2);
    assert_eq!(report.skipped.len(), 1);
    let path = report.document.unwrap();
    assert!(path.exists());
    let name = path.file_name().unwrap().to_str().unwrap().to_owned();
    assert!(name.starts_with("viz "));
    assert!(name.ends_with(".json"));
}
