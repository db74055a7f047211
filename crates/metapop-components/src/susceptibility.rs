//! Per-individual susceptibility.
//!
//! Registers the `susceptibility` property. The initial population starts
//! immune (0); every newborn starts susceptible (1).

use metapop_core::{
    BirthAware, BirthBatch, Component, ComponentError, ComponentType, FigureIter, ModelContext, ModelView,
    Plottable, PlotError,
};
use metapop_types::{Figure, FigureKind, PieSlice};

/// Name of the susceptibility property.
pub const SUSCEPTIBILITY: &str = "susceptibility";

/// Initialises susceptibility for newborns.
#[derive(Debug, Clone, Copy, Default)]
pub struct Susceptibility;

impl Component for Susceptibility {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn as_birth_aware(&mut self) -> Option<&mut dyn BirthAware> {
        Some(self)
    }

    fn as_plottable(&self) -> Option<&dyn Plottable> {
        Some(self)
    }
}

impl ComponentType for Susceptibility {
    const NAME: &'static str = "Susceptibility";

    fn construct(ctx: &mut ModelContext<'_>) -> Result<Self, ComponentError> {
        ctx.state.population.add_property(SUSCEPTIBILITY, 0)?;
        Ok(Self)
    }
}

impl BirthAware for Susceptibility {
    fn on_birth(&mut self, ctx: &mut ModelContext<'_>, births: &BirthBatch) -> Result<(), ComponentError> {
        if births.is_empty() {
            return Ok(());
        }
        let values = ctx.state.population.property_mut(SUSCEPTIBILITY)?;
        let newborns = values
            .get_mut(births.agents.clone())
            .ok_or_else(|| ComponentError::Internal {
                message: format!("birth range {:?} outside population", births.agents),
            })?;
        newborns.fill(1);
        Ok(())
    }
}

impl Plottable for Susceptibility {
    fn plots<'a>(&'a self, view: ModelView<'a>) -> FigureIter<'a> {
        Box::new(std::iter::once_with(move || susceptible_by_patch(view)))
    }
}

#[allow(clippy::cast_precision_loss)]
fn susceptible_by_patch(view: ModelView<'_>) -> Result<Figure, PlotError> {
    let population = &view.state.population;
    let values = population.property(SUSCEPTIBILITY)?;
    let mut counts = vec![0_u64; view.scenario.len()];
    for (nodeid, value) in population.nodeids().iter().zip(values) {
        if *value > 0 {
            if let Some(count) = usize::try_from(*nodeid).ok().and_then(|i| counts.get_mut(i)) {
                *count = count.saturating_add(1);
            }
        }
    }
    let bars = view
        .scenario
        .patches()
        .iter()
        .zip(counts)
        .map(|(patch, count)| PieSlice {
            label: patch.name.clone(),
            value: count as f64,
        })
        .collect();
    Ok(Figure::new("Susceptible Individuals by Patch", FigureKind::Bar { bars })
        .with_x_label("Patch")
        .with_y_label("Susceptible"))
}
