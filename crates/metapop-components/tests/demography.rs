//! End-to-end runs of the reference components under the orchestrator.

#![allow(clippy::unwrap_used)]

use metapop_components::{
    Births, MaternalAntibodies, NonDiseaseDeaths, Susceptibility, component_defaults, default_components,
};
use metapop_core::model::Model;
use metapop_core::{CollectingSink, ComponentError, ComponentType, ParameterSet, RunError, VisualizeMode};
use metapop_types::{FigureKind, Patch, PatchDataset};

fn scenario() -> PatchDataset {
    PatchDataset::new(vec![
        Patch::new("kano", 40_000, 12.0, 8.5),
        Patch::new("kaduna", 25_000, 10.5, 7.4),
        Patch::new("jos", 10_000, 9.9, 8.9),
    ])
    .unwrap()
}

fn params(nticks: i64, seed: i64) -> ParameterSet {
    let mut params = component_defaults();
    params.set("nticks", nticks);
    params.set("seed", seed);
    params
}

fn run(nticks: i64, seed: i64) -> Model {
    let mut model = Model::new(scenario(), params(nticks, seed), "demography").unwrap();
    model.set_components(default_components()).unwrap();
    model.run().unwrap();
    model
}

#[test]
fn default_components_wire_as_expected() {
    let mut model = Model::new(scenario(), params(1, 1), "wiring").unwrap();
    model.set_components(default_components()).unwrap();
    assert_eq!(
        model.phase_names(),
        vec!["Model", "Births", "NonDiseaseDeaths", "MaternalAntibodies"]
    );
    assert_eq!(
        model.birth_listener_names(),
        vec!["Susceptibility", "MaternalAntibodies"]
    );
    assert_eq!(model.births_authority_name().as_deref(), Some("Births"));
}

#[test]
fn newborns_are_protected_then_susceptible() {
    let model = run(30, 9);
    let population = &model.state().population;
    let initial = usize::try_from(model.scenario().total_population()).unwrap();
    assert!(population.count() > initial);

    let susceptibility = population.property("susceptibility").unwrap();
    let timers = population.property("ma_timer").unwrap();
    // Every newborn is still inside its 180-tick protection window.
    assert!(susceptibility.iter().all(|s| *s == 0));
    assert!(timers.iter().skip(initial).all(|t| *t > 0));
}

#[test]
fn short_protection_releases_newborns() {
    let mut params = params(10, 3);
    params.set("ma_duration", 1_i64);
    let mut model = Model::new(scenario(), params, "short").unwrap();
    model.set_components(default_components()).unwrap();
    model.run().unwrap();

    let population = &model.state().population;
    let initial = usize::try_from(model.scenario().total_population()).unwrap();
    let susceptibility = population.property("susceptibility").unwrap();
    let timers = population.property("ma_timer").unwrap();
    assert!(susceptibility.iter().take(initial).all(|s| *s == 0));

    // A one-tick window: born before the last tick means released,
    // born on the last tick means still protected.
    let newborns = population
        .dobs()
        .iter()
        .zip(susceptibility.iter().zip(timers))
        .skip(initial);
    let mut released = 0_usize;
    for (dob, (susceptible, timer)) in newborns {
        if *dob < 9 {
            assert_eq!((*susceptible, *timer), (1, 0));
            released = released.saturating_add(1);
        } else {
            assert_eq!((*susceptible, *timer), (0, 1));
        }
    }
    assert!(released > 0);
}

#[test]
fn patch_counts_track_births_and_deaths() {
    let model = run(50, 21);
    let end = model.state().patches.total(50).unwrap();
    let start = model.state().patches.total(0).unwrap();
    // Net growth of roughly 18 per 1000 per year over 50 days: small but bounded.
    assert!(end > start.saturating_sub(500));
    assert!(end < start + 500);
}

#[test]
fn identical_seeds_reproduce_the_trajectory() {
    let a = run(40, 77);
    let b = run(40, 77);
    for tick in 0..=40 {
        assert_eq!(
            a.state().patches.row(tick).unwrap(),
            b.state().patches.row(tick).unwrap()
        );
    }
    assert_eq!(a.state().population.count(), b.state().population.count());
    assert_eq!(a.metrics().len(), b.metrics().len());
}

#[test]
fn antibodies_before_susceptibility_fail_at_first_birth() {
    let mut model = Model::new(scenario(), params(5, 1), "misordered").unwrap();
    model
        .set_components(vec![
            Births::factory(),
            NonDiseaseDeaths::factory(),
            MaternalAntibodies::factory(),
        ])
        .unwrap();
    let err = model.run().unwrap_err();
    match err {
        RunError::Phase { tick, phase, source } => {
            assert_eq!(tick, 0);
            assert_eq!(phase, "Births");
            assert!(matches!(
                source,
                ComponentError::Listener { ref listener, .. } if listener == "MaternalAntibodies"
            ));
        }
    }
}

#[test]
fn susceptibility_without_births_is_rejected() {
    let mut model = Model::new(scenario(), params(5, 1), "orphan").unwrap();
    assert!(model.set_components(vec![Susceptibility::factory()]).is_err());
}

#[test]
fn rerun_replaces_plotted_history() {
    let mut model = Model::new(scenario(), params(6, 2), "rerun").unwrap();
    model.set_components(default_components()).unwrap();
    model.run().unwrap();
    model.run().unwrap();

    let mut sink = CollectingSink::default();
    model.visualize(VisualizeMode::Interactive(&mut sink)).unwrap();
    let lengths: Vec<usize> = sink
        .figures
        .iter()
        .filter_map(|(_, figure)| match &figure.kind {
            FigureKind::Line { series } => series.first().map(|s| s.points.len()),
            _ => None,
        })
        .collect();
    assert_eq!(lengths, vec![6, 6]);
    assert_eq!(model.metrics().len(), 6);
}

#[test]
fn plots_follow_registration_order() {
    let model = run(5, 4);
    let mut sink = CollectingSink::default();
    let report = model.visualize(VisualizeMode::Interactive(&mut sink)).unwrap();
    assert!(report.skipped.is_empty());
    let sources: Vec<&str> = sink.figures.iter().map(|(source, _)| source.as_str()).collect();
    assert_eq!(
        sources,
        vec!["Model", "Model", "Model", "Births", "NonDiseaseDeaths", "Susceptibility"]
    );
}
