//! Registry of hand-written conversion functions.
//!
//! A package may carry manual conversions for pairs the synthesizer cannot
//! (or should not) handle. They are discovered by shape: a free function
//! `Convert_<inPkg>_<In>_To_<outPkg>_<Out>(in *In, out *Out, s conversion.Scope) error`
//! whose name matches the convention derived from its parameter types.
//! Matches are indexed by ordered pair; two packages claiming the same
//! ordered pair is fatal (ambiguous authorship).

use std::collections::BTreeMap;

use crate::directive::{FnClassification, FnDirectives};
use crate::error::GenError;
use crate::ops::{conversion_fn_name, ConversionHint, ConversionPair};
use crate::universe::{PackageDecl, TypeKind, TypeName, Universe};
use crate::{ERROR_TYPE, SCOPE_PACKAGE, SCOPE_TYPE};

/// One registered manual conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualConversion {
    pub function: TypeName,
    pub classification: Option<FnClassification>,
}

/// Ordered-pair index of manual conversions. Append-only within a run.
#[derive(Debug, Default)]
pub struct ManualRegistry {
    entries: BTreeMap<ConversionPair, ManualConversion>,
}

impl ManualRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, pair: &ConversionPair) -> Option<&ManualConversion> {
        self.entries.get(pair)
    }

    /// All entries in pair order.
    pub fn iter(&self) -> impl Iterator<Item = (&ConversionPair, &ManualConversion)> {
        self.entries.iter()
    }

    /// Entries as failure-marker hints, sorted by function name.
    pub fn hints(&self) -> Vec<ConversionHint> {
        let mut hints: Vec<ConversionHint> = self
            .entries
            .iter()
            .map(|(pair, m)| ConversionHint {
                function: m.function.clone(),
                in_type: pair.in_type.clone(),
                out_type: pair.out_type.clone(),
            })
            .collect();
        hints.sort_by(|a, b| a.function.cmp(&b.function));
        hints
    }

    /// Scan a package's declared functions for manual conversions.
    ///
    /// Scanning the same package twice is fine; the same ordered pair claimed
    /// from two different packages is not.
    pub fn scan_package(&mut self, universe: &Universe, pkg: &PackageDecl) -> Result<(), GenError> {
        tracing::debug!(package = %pkg.path, "scanning for conversion functions");

        for f in &pkg.functions {
            if f.receiver {
                tracing::debug!(function = %f.name, "has a receiver");
                continue;
            }
            if f.params.len() != 3
                || f.params[2] != TypeName::new(SCOPE_PACKAGE, SCOPE_TYPE)
            {
                tracing::debug!(function = %f.name, "has wrong parameters");
                continue;
            }
            if f.results.len() != 1 || f.results[0] != TypeName::builtin(ERROR_TYPE) {
                tracing::debug!(function = %f.name, "has wrong results");
                continue;
            }
            let (Some(in_param), Some(out_param)) =
                (universe.get(&f.params[0]), universe.get(&f.params[1]))
            else {
                tracing::debug!(function = %f.name, "has unresolvable parameter types");
                continue;
            };
            if in_param.kind != TypeKind::Pointer || out_param.kind != TypeKind::Pointer {
                tracing::debug!(function = %f.name, "has wrong parameter types");
                continue;
            }
            let (Some(in_elem), Some(out_elem)) = (&in_param.elem, &out_param.elem) else {
                tracing::debug!(function = %f.name, "has elementless pointer parameters");
                continue;
            };

            let expected = conversion_fn_name(in_elem, out_elem);
            if f.name.name != expected {
                // Catch user error when the signature is right but the name
                // does not follow the convention.
                if f.name.name.starts_with("Convert_") {
                    tracing::warn!(
                        function = %f.name,
                        expected = %expected,
                        "rename function to match expected conversion signature"
                    );
                }
                continue;
            }

            tracing::debug!(function = %f.name, "found conversion function");
            let pair = ConversionPair::new(in_elem.clone(), out_elem.clone());
            if let Some(existing) = self.entries.get(&pair) {
                if existing.function.package != pkg.path {
                    return Err(GenError::DuplicateConversion {
                        in_type: pair.in_type.to_string(),
                        out_type: pair.out_type.to_string(),
                        first: existing.function.to_string(),
                        second: f.name.to_string(),
                    });
                }
            }
            let directives = FnDirectives::parse(&f.name, &f.doc)?;
            self.entries.insert(
                pair,
                ManualConversion {
                    function: f.name.clone(),
                    classification: directives.classification,
                },
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
