//! Registration aggregation.
//!
//! Every resolved pair — generated, adapter, and manual — lands in one
//! registration procedure so a caller can convert an instance without knowing
//! at compile time which backing implementation applies. Ordering is
//! deterministic: peered pairs in type order (both directions), then adapter
//! pairs, then manual conversions sorted by function name.

use crate::manual::ManualRegistry;
use crate::ops::{ConversionPair, Registrations};
use crate::select::{peer_type_for, SelectedTypes};
use crate::universe::Universe;

pub fn build_registrations(
    universe: &Universe,
    manual: &ManualRegistry,
    selected: &SelectedTypes,
    peer_packages: &[String],
    output_package: &str,
) -> Registrations {
    let mut registrations = Registrations::default();

    for t in &selected.peered {
        let Some(peer) = peer_type_for(universe, t, peer_packages) else {
            continue;
        };
        let forward = ConversionPair::new(t.clone(), peer.clone());
        if manual.get(&forward).is_none() {
            registrations.generated.push(forward);
        }
        let backward = ConversionPair::new(peer, t.clone());
        if manual.get(&backward).is_none() {
            registrations.generated.push(backward);
        }
    }

    for pair in &selected.explicit {
        registrations.generated.push(pair.clone());
    }

    let mut manual_entries: Vec<_> = manual
        .iter()
        .filter(|(_, m)| m.function.package == output_package)
        .map(|(pair, m)| (pair.clone(), m.function.clone()))
        .collect();
    manual_entries.sort_by(|a, b| a.1.name.cmp(&b.1.name));
    registrations.manual = manual_entries;

    registrations
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
