//! Pair selection: which types get conversions generated.
//!
//! A candidate type in the types package pairs with a same-named type found
//! in the configured peer packages (first hit wins). Independently, a type
//! carrying an explicit-from directive is admitted as an adapter pair; both
//! admissions can apply to one type.

use crate::directive::TypeDirectives;
use crate::error::GenError;
use crate::ops::ConversionPair;
use crate::universe::{is_private_name, TypeKind, TypeName, Universe};

/// Find the peer of `t` by name in the configured peer packages.
pub fn peer_type_for(
    universe: &Universe,
    t: &TypeName,
    peer_packages: &[String],
) -> Option<TypeName> {
    peer_packages
        .iter()
        .find(|pp| universe.has_type(pp, &t.name))
        .map(|pp| TypeName::new(pp.clone(), t.name.clone()))
}

/// Whether a conversion between `in_type` and `out_type` is wanted for the
/// types package, whether or not the synthesizer can produce it.
///
/// Criteria: one side is declared in the types package; that side has not
/// opted out (an unsupported opt-out value is fatal); both names are public;
/// both sides share a kind after alias unwrapping; and that kind is a
/// primitive, map, slice, struct, or pointer.
pub fn convertible_within_package(
    universe: &Universe,
    types_package: &str,
    in_type: &TypeName,
    out_type: &TypeName,
) -> Result<bool, GenError> {
    let (t, other) = if in_type.package == types_package {
        (in_type, out_type)
    } else {
        (out_type, in_type)
    };
    if t.package != types_package {
        return Ok(false);
    }

    let Some(t_desc) = universe.get(t) else {
        return Ok(false);
    };
    let directives = TypeDirectives::parse(t, &t_desc.doc)?;
    if directives.opt_out {
        tracing::debug!(candidate = %t, "type requests no conversion generation, skipping");
        return Ok(false);
    }

    if is_private_name(&t.name) || is_private_name(&other.name) {
        return Ok(false);
    }

    let Some(other_desc) = universe.get(other) else {
        return Ok(false);
    };
    let t_under = universe.unwrap_alias(t_desc);
    let other_under = universe.unwrap_alias(other_desc);
    if t_under.kind != other_under.kind {
        return Ok(false);
    }

    Ok(matches!(
        t_under.kind,
        TypeKind::Primitive
            | TypeKind::Map
            | TypeKind::Slice
            | TypeKind::Struct
            | TypeKind::Pointer
    ))
}

/// Outcome of pair selection for one package.
#[derive(Debug, Default)]
pub struct SelectedTypes {
    /// Types with an admitted peer, in name order.
    pub peered: Vec<TypeName>,
    /// Adapter pairs: external source type to local type.
    pub explicit: Vec<ConversionPair>,
}

/// Run admission over every named type in the types package.
pub fn select_types(
    universe: &Universe,
    types_package: &str,
    peer_packages: &[String],
) -> Result<SelectedTypes, GenError> {
    let mut selected = SelectedTypes::default();

    for t in universe.types_in(types_package) {
        if let Some(peer) = peer_type_for(universe, &t.name, peer_packages) {
            if convertible_within_package(universe, types_package, &t.name, &peer)? {
                selected.peered.push(t.name.clone());
            }
        }

        let directives = TypeDirectives::parse(&t.name, &t.doc)?;
        for source in directives.explicit_from {
            selected
                .explicit
                .push(ConversionPair::new(source, t.name.clone()));
        }
    }

    Ok(selected)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
