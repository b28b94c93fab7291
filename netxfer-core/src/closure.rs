//! Referential closure of a partial export selection.
//!
//! A partial export must not carry references to rows it does not contain.
//! [`resolve_closure`] grows the caller's element selection by the endpoints
//! of selected reaches and the overflow targets of selected nodes, then
//! collects the structures owning the result.

use std::collections::HashSet;

use log::{debug, info, warn};

use crate::config::{ClosureOptions, ClosureStrategy};
use crate::model::{NetworkElement, NetworkSnapshot};
use crate::selection::{AdaptedSelection, Selection};

/// Compute the export closure of `selection` over `snapshot`.
///
/// `None` or an empty selection exports the whole dataset except elements and
/// structures of out-of-model kinds. Caller-supplied keys are never removed;
/// keys unknown to the snapshot are kept and logged.
///
/// # Examples
/// ```
/// use netxfer_core::closure::resolve_closure;
/// use netxfer_core::config::ClosureOptions;
/// use netxfer_core::model::{NetworkElement, NetworkSnapshot};
/// use netxfer_core::selection::Selection;
///
/// let snapshot = NetworkSnapshot::new(
///     [
///         NetworkElement::node("A"),
///         NetworkElement::node("B"),
///         NetworkElement::reach("R1", Some("A".into()), Some("B".into())),
///     ],
///     [],
/// );
/// let selection: Selection = ["R1"].into_iter().collect();
/// let closure = resolve_closure(&snapshot, Some(&selection), &ClosureOptions::default());
/// assert!(closure.contains_element("A") && closure.contains_element("B"));
/// ```
pub fn resolve_closure(
    snapshot: &NetworkSnapshot,
    selection: Option<&Selection>,
    options: &ClosureOptions,
) -> AdaptedSelection {
    match selection {
        Some(selected) if !selected.is_empty() => partial_closure(snapshot, selected, options),
        _ => whole_dataset(snapshot, options),
    }
}

fn whole_dataset(snapshot: &NetworkSnapshot, options: &ClosureOptions) -> AdaptedSelection {
    let elements: Selection = snapshot
        .elements()
        .filter(|element| {
            snapshot
                .owner_kind(element)
                .is_none_or(|kind| !options.excludes(kind))
        })
        .map(|element| element.obj_id.clone())
        .collect();
    let structures: Selection = snapshot
        .structures()
        .filter(|structure| !options.excludes(structure.kind))
        .map(|structure| structure.obj_id.clone())
        .collect();
    info!(
        "exporting whole dataset: {} elements, {} structures",
        elements.len(),
        structures.len()
    );
    AdaptedSelection {
        elements,
        structures,
        whole_dataset: true,
        extra_reaches: 0,
        unknown: Selection::new(),
    }
}

fn partial_closure(
    snapshot: &NetworkSnapshot,
    selection: &Selection,
    options: &ClosureOptions,
) -> AdaptedSelection {
    let unknown: Selection = selection
        .iter()
        .filter(|key| snapshot.element(key).is_none())
        .collect();
    for key in unknown.iter() {
        warn!("selected element {key} does not exist in the source network");
    }

    let mut adapted = selection.clone();
    let mut frontier: Vec<String> = selection.iter().map(str::to_owned).collect();
    let mut pass = 0_usize;
    while !frontier.is_empty() {
        pass += 1;
        let added = expand_once(snapshot, &frontier, &mut adapted);
        debug!("closure pass {pass} added {} elements", added.len());
        frontier = match options.strategy {
            ClosureStrategy::SinglePass => Vec::new(),
            ClosureStrategy::Fixpoint => added,
        };
    }

    let selection_induced = induced_reaches(snapshot, |key| selection.contains(key));
    let adapted_induced = induced_reaches(snapshot, |key| adapted.contains(key));
    let extra_reaches = adapted_induced
        .iter()
        .filter(|reach| !selection_induced.contains(*reach) && !adapted.contains(reach))
        .count();
    adapted.extend(selection_induced);
    if extra_reaches > 0 {
        info!("left out {extra_reaches} reaches connected only through closure expansion");
    }

    let structures = owning_structures(snapshot, &adapted, options);
    info!(
        "adapted selection: {} selected elements expanded to {}, {} structures",
        selection.len(),
        adapted.len(),
        structures.len()
    );
    AdaptedSelection {
        elements: adapted,
        structures,
        whole_dataset: false,
        extra_reaches,
        unknown,
    }
}

/// Add the direct neighbours of `frontier` and return the newly added keys.
fn expand_once(
    snapshot: &NetworkSnapshot,
    frontier: &[String],
    adapted: &mut Selection,
) -> Vec<String> {
    let mut added = Vec::new();
    for key in frontier {
        let Some(element) = snapshot.element(key) else {
            continue;
        };
        for neighbour in neighbours(element) {
            if snapshot.element(neighbour).is_some() && adapted.insert(neighbour) {
                added.push(neighbour.to_owned());
            }
        }
    }
    added
}

/// Reach endpoints and overflow targets of `element`.
fn neighbours(element: &NetworkElement) -> impl Iterator<Item = &str> {
    let endpoints = element
        .is_reach()
        .then_some([element.from.as_deref(), element.to.as_deref()]);
    let overflow = (!element.is_reach()).then_some(element.overflow_to.as_deref());
    endpoints
        .into_iter()
        .flatten()
        .chain(overflow)
        .flatten()
}

/// Reaches whose endpoints both satisfy `member`, in key order.
fn induced_reaches(snapshot: &NetworkSnapshot, member: impl Fn(&str) -> bool) -> Vec<String> {
    snapshot
        .elements()
        .filter(|element| element.is_reach())
        .filter(|reach| match (reach.from.as_deref(), reach.to.as_deref()) {
            (Some(from), Some(to)) => member(from) && member(to),
            _ => false,
        })
        .map(|reach| reach.obj_id.clone())
        .collect()
}

fn owning_structures(
    snapshot: &NetworkSnapshot,
    elements: &Selection,
    options: &ClosureOptions,
) -> Selection {
    let mut skipped: HashSet<&str> = HashSet::new();
    let mut structures = Selection::new();
    for key in elements.iter() {
        let Some(owner) = snapshot
            .element(key)
            .and_then(|element| element.structure.as_deref())
        else {
            continue;
        };
        match snapshot.structure(owner) {
            Some(structure) if options.excludes(structure.kind) => {
                if skipped.insert(owner) {
                    debug!("structure {owner} is out of model ({})", structure.kind);
                }
            }
            Some(_) => {
                structures.insert(owner);
            }
            None => warn!("element {key} is owned by unknown structure {owner}"),
        }
    }
    structures
}
