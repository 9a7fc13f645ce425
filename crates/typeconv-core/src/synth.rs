//! The conversion synthesizer.
//!
//! For an admitted pair, [`GenContext::synthesize`] walks a strategy ladder
//! and emits the typed operation sequence of the first strategy that applies:
//! existing functions, unsafe reinterpretation, value copy, language-level
//! conversion, composite recursion, and finally a deliberate compile-failure
//! marker. Incorrect conversions are never emitted silently.
//!
//! All run state (options, manual registry, layout cache, skipped-field
//! records) travels through the context value; there is no process-wide
//! state.

use std::collections::BTreeMap;

use regex::Regex;

use crate::config::Options;
use crate::directive::{FnClassification, MemberDirectives};
use crate::error::GenError;
use crate::layout::LayoutCache;
use crate::manual::ManualRegistry;
use crate::ops::{
    AdapterAction, AdapterField, ConversionFunction, ConversionPair, FieldConversion,
    FunctionBody, Op, ValueConversion, WrapperStatus, ZeroValue,
};
use crate::select::convertible_within_package;
use crate::universe::{Member, TypeDescriptor, TypeKind, TypeName, Universe};

/// Per-run generation context. Append-only caches and records; built once
/// per package, dropped when the artifact is assembled.
pub struct GenContext<'a> {
    universe: &'a Universe,
    options: &'a Options,
    manual: &'a ManualRegistry,
    types_package: String,
    layout: LayoutCache,
    skipped_fields: BTreeMap<TypeName, Vec<String>>,
}

impl<'a> GenContext<'a> {
    pub fn new(
        universe: &'a Universe,
        options: &'a Options,
        manual: &'a ManualRegistry,
        types_package: impl Into<String>,
    ) -> Self {
        Self {
            universe,
            options,
            manual,
            types_package: types_package.into(),
            layout: LayoutCache::new(),
            skipped_fields: BTreeMap::new(),
        }
    }

    /// Members recorded as skipped, per input type.
    pub fn skipped_fields(&self) -> &BTreeMap<TypeName, Vec<String>> {
        &self.skipped_fields
    }

    // -----------------------------------------------------------------------
    // Pair finalization
    // -----------------------------------------------------------------------

    /// Produce the full conversion procedure for a pair: internal body plus
    /// wrapper status.
    pub fn generate_conversion(
        &mut self,
        in_type: &TypeName,
        out_type: &TypeName,
    ) -> Result<ConversionFunction, GenError> {
        let ops = self.synthesize(in_type, out_type, false)?;
        let pair = ConversionPair::new(in_type.clone(), out_type.clone());

        let wrapper = if let Some(manual) = self.manual.get(&pair) {
            // There is a public manual conversion: use it.
            WrapperStatus::ManualOverride {
                function: manual.function.clone(),
            }
        } else if let Some(missing) = self
            .skipped_fields
            .get(in_type)
            .filter(|missing| !missing.is_empty())
        {
            tracing::warn!(
                in_type = %in_type,
                out_type = %out_type,
                fields = ?missing,
                "could not find nor generate a final conversion function; \
                 the listed fields need manual conversion"
            );
            WrapperStatus::Incomplete {
                missing: missing.clone(),
            }
        } else {
            WrapperStatus::Public
        };

        Ok(ConversionFunction {
            pair,
            body: FunctionBody::Ops { ops },
            wrapper,
        })
    }

    // -----------------------------------------------------------------------
    // Strategy ladder
    // -----------------------------------------------------------------------

    /// Synthesize the operation sequence converting `in_type` into
    /// `out_type`. With `allow_calls`, existing manual or named generated
    /// conversions are preferred over inline synthesis.
    pub fn synthesize(
        &mut self,
        in_type: &TypeName,
        out_type: &TypeName,
        allow_calls: bool,
    ) -> Result<Vec<Op>, GenError> {
        tracing::debug!(in_type = %in_type, out_type = %out_type, "synthesizing");
        let universe = self.universe;
        let in_resolved = universe.unwrap_alias(universe.resolve(in_type)?);
        let out_resolved = universe.unwrap_alias(universe.resolve(out_type)?);

        // (1) existing functions
        if allow_calls {
            let pair = ConversionPair::new(in_type.clone(), out_type.clone());
            if let Some(manual) = self.manual.get(&pair) {
                // Copy-only conversions exist for the reflection path; they
                // must not block a cheaper strategy.
                let bypass = manual.classification == Some(FnClassification::CopyOnly)
                    && (identical_underlying(universe, out_type, in_type)
                        || self.layout.equal(universe, in_type, out_type));
                if bypass {
                    tracing::debug!(
                        function = %manual.function,
                        "skipping copy-only function; direct assignment or reinterpretation applies"
                    );
                } else {
                    return Ok(vec![Op::ManualCall {
                        function: manual.function.clone(),
                    }]);
                }
            } else if convertible_within_package(
                universe,
                &self.types_package,
                in_type,
                out_type,
            )? {
                return Ok(vec![Op::GeneratedCall {
                    in_type: in_type.clone(),
                    out_type: out_type.clone(),
                }]);
            }
        }

        // (2) unsafe reinterpretation
        if self.options.unsafe_reinterpret && self.layout.equal(universe, in_type, out_type) {
            match in_resolved.kind {
                TypeKind::Pointer => {
                    return Ok(vec![Op::PointerReinterpret {
                        out_type: out_type.clone(),
                    }])
                }
                TypeKind::Map | TypeKind::Slice => {
                    return Ok(vec![Op::HeaderReinterpret {
                        out_type: out_type.clone(),
                    }])
                }
                _ => {}
            }
        }

        // (3) direct assignment
        if in_type == out_type {
            return Ok(vec![Op::ValueCopy]);
        }

        // (4) direct conversion
        if identical_underlying(universe, out_type, in_type) {
            return Ok(vec![Op::ValueConvert {
                out_type: out_type.clone(),
            }]);
        }

        // (5) composite recursion
        if in_resolved.kind == out_resolved.kind {
            match in_resolved.kind {
                TypeKind::Map => return self.map_ops(in_resolved, out_type, out_resolved),
                TypeKind::Slice => return self.slice_ops(in_resolved, out_type, out_resolved),
                TypeKind::Struct => return self.struct_ops(in_type, in_resolved, out_resolved),
                TypeKind::Pointer => return self.pointer_ops(in_resolved, out_resolved),
                _ => {}
            }
        }

        // (6) fail, visibly
        Ok(vec![Op::MissingConversion {
            in_type: in_type.clone(),
            out_type: out_type.clone(),
            hints: self.manual.hints(),
        }])
    }

    fn map_ops(
        &mut self,
        in_resolved: &TypeDescriptor,
        out_type: &TypeName,
        out_resolved: &TypeDescriptor,
    ) -> Result<Vec<Op>, GenError> {
        let in_key = composite_ref(in_resolved, in_resolved.key.as_ref())?;
        let in_elem = composite_ref(in_resolved, in_resolved.elem.as_ref())?;
        let out_key = composite_ref(out_resolved, out_resolved.key.as_ref())?;
        let out_elem = composite_ref(out_resolved, out_resolved.elem.as_ref())?;

        let key_ops = self.synthesize(in_key, out_key, true)?;
        let elem_ops = self.synthesize(in_elem, out_elem, true)?;
        Ok(vec![Op::MapConvert {
            out_type: out_type.clone(),
            out_key: out_key.clone(),
            out_elem: out_elem.clone(),
            key_ops,
            elem_ops,
        }])
    }

    fn slice_ops(
        &mut self,
        in_resolved: &TypeDescriptor,
        out_type: &TypeName,
        out_resolved: &TypeDescriptor,
    ) -> Result<Vec<Op>, GenError> {
        let in_elem = composite_ref(in_resolved, in_resolved.elem.as_ref())?;
        let out_elem = composite_ref(out_resolved, out_resolved.elem.as_ref())?;

        let bulk_copy = in_elem == out_elem
            && self
                .universe
                .get(in_elem)
                .is_some_and(|d| d.kind == TypeKind::Primitive);
        let elem_ops = if bulk_copy {
            Vec::new()
        } else {
            self.synthesize(in_elem, out_elem, true)?
        };
        Ok(vec![Op::SliceConvert {
            out_type: out_type.clone(),
            bulk_copy,
            elem_ops,
        }])
    }

    fn struct_ops(
        &mut self,
        in_declared: &TypeName,
        in_resolved: &TypeDescriptor,
        out_resolved: &TypeDescriptor,
    ) -> Result<Vec<Op>, GenError> {
        let mut fields = Vec::new();
        for member in &in_resolved.members {
            let directives = MemberDirectives::parse(&member.name, &member.doc)?;
            if directives.opt_out {
                fields.push(FieldConversion::OptedOut {
                    name: member.name.clone(),
                });
                continue;
            }

            let mut names = vec![member.name.clone()];
            names.extend(directives.renames);
            let Some(out_member) = find_member(out_resolved, &names)? else {
                self.skipped_fields
                    .entry(in_declared.clone())
                    .or_default()
                    .push(member.name.clone());
                fields.push(FieldConversion::MissingPeer {
                    name: member.name.clone(),
                });
                continue;
            };

            let member_pair =
                ConversionPair::new(member.type_ref.clone(), out_member.type_ref.clone());
            if self
                .manual
                .get(&member_pair)
                .is_some_and(|m| m.classification == Some(FnClassification::Drop))
            {
                // The registered conversion says this field is never carried.
                continue;
            }

            let ops = self.synthesize(&member.type_ref, &out_member.type_ref, true)?;
            fields.push(FieldConversion::Convert {
                in_member: member.name.clone(),
                out_member: out_member.name.clone(),
                ops,
            });
        }
        Ok(vec![Op::StructConvert { fields }])
    }

    fn pointer_ops(
        &mut self,
        in_resolved: &TypeDescriptor,
        out_resolved: &TypeDescriptor,
    ) -> Result<Vec<Op>, GenError> {
        let in_elem = composite_ref(in_resolved, in_resolved.elem.as_ref())?;
        let out_elem = composite_ref(out_resolved, out_resolved.elem.as_ref())?;

        let elem_ops = self.synthesize(in_elem, out_elem, true)?;
        Ok(vec![Op::PointerConvert {
            out_elem: out_elem.clone(),
            elem_ops,
        }])
    }

    // -----------------------------------------------------------------------
    // Adapter synthesis (explicit-from)
    // -----------------------------------------------------------------------

    /// Synthesize the adapter conversion filling `out_type` from the flat
    /// multimap source. Returns `None` (with a warning) when the source type
    /// is not present in the universe.
    pub fn generate_adapter(
        &mut self,
        in_type: &TypeName,
        out_type: &TypeName,
    ) -> Result<Option<ConversionFunction>, GenError> {
        let universe = self.universe;
        let Some(in_desc) = universe.get(in_type) else {
            tracing::warn!(source = %in_type, "unrecognized explicit-from source type, skipping");
            return Ok(None);
        };
        // The per-key value list of the multimap, e.g. []string.
        let underlying = universe.unwrap_alias(in_desc);
        let Some(values_elem) = underlying.elem.clone() else {
            tracing::warn!(source = %in_type, "explicit-from source is not a multimap, skipping");
            return Ok(None);
        };

        let out_desc = universe.resolve(out_type)?;
        let mut fields = Vec::new();
        for member in &out_desc.members {
            let directives = MemberDirectives::parse(&member.name, &member.doc)?;
            if directives.opt_out {
                fields.push(AdapterField {
                    name: member.name.clone(),
                    action: AdapterAction::OptedOut,
                });
                continue;
            }
            let Some(tag) = json_tag_name(&member.tags) else {
                // Never defaulted silently.
                fields.push(AdapterField {
                    name: member.name.clone(),
                    action: AdapterAction::MissingTag,
                });
                continue;
            };

            let present = self.values_entry(&values_elem, member);
            let absent = zero_value(universe, &member.type_ref);
            fields.push(AdapterField {
                name: member.name.clone(),
                action: AdapterAction::FromValues {
                    tag,
                    present,
                    absent,
                },
            });
        }

        let pair = ConversionPair::new(in_type.clone(), out_type.clone());
        let wrapper = match self.manual.get(&pair) {
            Some(manual) => WrapperStatus::ManualOverride {
                function: manual.function.clone(),
            },
            None => WrapperStatus::Public,
        };
        Ok(Some(ConversionFunction {
            pair,
            body: FunctionBody::Adapter { fields },
            wrapper,
        }))
    }

    fn values_entry(&mut self, values_elem: &TypeName, member: &Member) -> ValueConversion {
        let pair = ConversionPair::new(values_elem.clone(), member.type_ref.clone());
        if let Some(manual) = self.manual.get(&pair) {
            return ValueConversion::ManualCall {
                function: manual.function.clone(),
            };
        }
        if member.type_ref == TypeName::builtin("string") {
            return ValueConversion::FirstString;
        }
        if self.options.unsafe_reinterpret
            && self.layout.equal(self.universe, values_elem, &member.type_ref)
        {
            let kind = self.universe.get(values_elem).map(|d| d.kind);
            return match kind {
                Some(TypeKind::Pointer) => ValueConversion::PointerReinterpret {
                    out_type: member.type_ref.clone(),
                },
                Some(TypeKind::Map) | Some(TypeKind::Slice) => {
                    ValueConversion::HeaderReinterpret {
                        out_type: member.type_ref.clone(),
                    }
                }
                _ => ValueConversion::Unsupported,
            };
        }
        ValueConversion::Unsupported
    }
}

// ---------------------------------------------------------------------------
// Structural helpers
// ---------------------------------------------------------------------------

fn composite_ref<'u>(
    desc: &'u TypeDescriptor,
    slot: Option<&'u TypeName>,
) -> Result<&'u TypeName, GenError> {
    slot.ok_or_else(|| GenError::UnknownType(format!("{} (composite reference)", desc.name)))
}

/// First output member matching any of `names`, either by declared name or
/// by one of its own rename aliases.
fn find_member<'u>(
    out_desc: &'u TypeDescriptor,
    names: &[String],
) -> Result<Option<&'u Member>, GenError> {
    for member in &out_desc.members {
        let renames = MemberDirectives::parse(&member.name, &member.doc)?.renames;
        for name in names {
            if member.name == *name || renames.contains(name) {
                return Ok(Some(member));
            }
        }
    }
    Ok(None)
}

/// Whether the underlying representations of two types are identical,
/// ignoring field tags. Mirrors the reflect notion of direct convertibility.
pub(crate) fn identical_underlying(universe: &Universe, a: &TypeName, b: &TypeName) -> bool {
    let (Some(a_desc), Some(b_desc)) = (universe.get(a), universe.get(b)) else {
        return false;
    };
    let a_desc = universe.unwrap_alias(a_desc);
    let b_desc = universe.unwrap_alias(b_desc);
    if a_desc.name == b_desc.name {
        return true;
    }
    if a_desc.kind != b_desc.kind {
        return false;
    }
    match a_desc.kind {
        TypeKind::Struct => {
            a_desc.members.len() == b_desc.members.len()
                && a_desc.members.iter().zip(&b_desc.members).all(|(am, bm)| {
                    am.name == bm.name
                        && am.embedded == bm.embedded
                        && identical_type(&am.type_ref, &bm.type_ref)
                })
        }
        TypeKind::Map => {
            a_desc.key == b_desc.key
                && match (&a_desc.elem, &b_desc.elem) {
                    (Some(ae), Some(be)) => identical_type(ae, be),
                    _ => false,
                }
        }
        TypeKind::Slice | TypeKind::Pointer => match (&a_desc.elem, &b_desc.elem) {
            (Some(ae), Some(be)) => identical_type(ae, be),
            _ => false,
        },
        // Only empty interfaces are identical; equal method sets may still
        // need a run-time conversion.
        TypeKind::Interface => a_desc.methods.is_empty() && b_desc.methods.is_empty(),
        TypeKind::Primitive => a_desc.name == b_desc.name,
        // Not modeled as convertible.
        TypeKind::Func | TypeKind::Array | TypeKind::Chan => false,
        TypeKind::Alias => false,
    }
}

/// Identical declared types. Identity is qualified-name equality, so two
/// distinct declarations are never identical however similar their shape.
fn identical_type(a: &TypeName, b: &TypeName) -> bool {
    a == b
}

/// Serialized field name from a raw `json:"..."` struct tag, if any.
fn json_tag_name(tags: &str) -> Option<String> {
    let re = Regex::new(r#"json:"([^"]*)""#).unwrap();
    let caps = re.captures(tags)?;
    let name = caps[1].split(',').next().unwrap_or("");
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Type-appropriate zero for an adapter member whose key is absent.
fn zero_value(universe: &Universe, member_type: &TypeName) -> ZeroValue {
    let Some(declared) = universe.get(member_type) else {
        return ZeroValue::Unsupported;
    };
    let underlying = universe.unwrap_alias(declared);
    match underlying.kind {
        TypeKind::Primitive => match underlying.name.name.as_str() {
            "string" => ZeroValue::EmptyString,
            "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16"
            | "uint32" | "uint64" | "uintptr" | "byte" | "rune" | "float32" | "float64" => {
                ZeroValue::Zero
            }
            "bool" => ZeroValue::False,
            _ => ZeroValue::Unsupported,
        },
        TypeKind::Struct => {
            if underlying.name == declared.name {
                ZeroValue::StructLiteral {
                    out_type: underlying.name.clone(),
                }
            } else {
                ZeroValue::AliasedStructLiteral {
                    alias: declared.name.clone(),
                    out_type: underlying.name.clone(),
                }
            }
        }
        TypeKind::Map
        | TypeKind::Slice
        | TypeKind::Pointer
        | TypeKind::Interface
        | TypeKind::Array => ZeroValue::Nil,
        _ => ZeroValue::Unsupported,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::conversion_fn_name;
    use crate::universe::{FunctionDecl, PackageDecl};
    use crate::{ERROR_TYPE, SCOPE_PACKAGE, SCOPE_TYPE};
    use pretty_assertions::assert_eq;

    const V1: &str = "example.io/api/v1";
    const V2: &str = "example.io/api/v2";

    fn base() -> Universe {
        let mut u = Universe::new();
        for p in ["string", "int", "bool"] {
            u.insert_type(TypeDescriptor::primitive(p));
        }
        u
    }

    fn widget(pkg: &str, members: Vec<Member>) -> TypeDescriptor {
        TypeDescriptor::strukt(TypeName::new(pkg, "Widget"), members)
    }

    fn synthesize_with(
        universe: &Universe,
        options: &Options,
        manual: &ManualRegistry,
        in_type: &TypeName,
        out_type: &TypeName,
        allow_calls: bool,
    ) -> Vec<Op> {
        let mut ctx = GenContext::new(universe, options, manual, V1);
        ctx.synthesize(in_type, out_type, allow_calls).unwrap()
    }

    // -----------------------------------------------------------------------
    // 1. Identical declared type: value copy, never recursion
    // -----------------------------------------------------------------------
    #[test]
    fn test_identical_type_value_copy() {
        let mut u = base();
        u.insert_type(widget(
            V1,
            vec![Member::new("Name", TypeName::builtin("string"))],
        ));

        let ops = synthesize_with(
            &u,
            &Options::default(),
            &ManualRegistry::new(),
            &TypeName::new(V1, "Widget"),
            &TypeName::new(V1, "Widget"),
            false,
        );
        assert_eq!(ops, vec![Op::ValueCopy]);
    }

    // -----------------------------------------------------------------------
    // 2. Memory-equivalent structs: reinterpret only in unsafe mode
    // -----------------------------------------------------------------------
    #[test]
    fn test_equivalent_pointer_reinterpreted_when_unsafe() {
        let mut u = base();
        for pkg in [V1, V2] {
            let widget_name = TypeName::new(pkg, "Widget");
            u.insert_type(TypeDescriptor::strukt(
                widget_name.clone(),
                vec![
                    Member::new("Name", TypeName::builtin("string")),
                    Member::new("Count", TypeName::builtin("int")),
                ],
            ));
            u.insert_type(TypeDescriptor::pointer(
                TypeName::pointer_spelling(&widget_name),
                widget_name,
            ));
        }

        let in_ptr = TypeName::pointer_spelling(&TypeName::new(V1, "Widget"));
        let out_ptr = TypeName::pointer_spelling(&TypeName::new(V2, "Widget"));
        let ops = synthesize_with(
            &u,
            &Options::default(),
            &ManualRegistry::new(),
            &in_ptr,
            &out_ptr,
            false,
        );
        assert_eq!(
            ops,
            vec![Op::PointerReinterpret {
                out_type: out_ptr.clone()
            }]
        );

        // Unsafe off: same pair falls through to pointer recursion.
        let safe = Options {
            unsafe_reinterpret: false,
            ..Options::default()
        };
        let ops = synthesize_with(&u, &safe, &ManualRegistry::new(), &in_ptr, &out_ptr, false);
        assert!(matches!(ops[0], Op::PointerConvert { .. }));
    }

    #[test]
    fn test_equivalent_slice_header_reinterpreted() {
        let mut u = base();
        for pkg in [V1, V2] {
            u.insert_type(TypeDescriptor::slice(
                TypeName::new(pkg, "Names"),
                TypeName::builtin("string"),
            ));
        }
        let ops = synthesize_with(
            &u,
            &Options::default(),
            &ManualRegistry::new(),
            &TypeName::new(V1, "Names"),
            &TypeName::new(V2, "Names"),
            false,
        );
        assert_eq!(
            ops,
            vec![Op::HeaderReinterpret {
                out_type: TypeName::new(V2, "Names")
            }]
        );
    }

    // -----------------------------------------------------------------------
    // 3. Direct conversion for identical underlying representations
    // -----------------------------------------------------------------------
    #[test]
    fn test_primitive_aliases_value_convert() {
        let mut u = base();
        for pkg in [V1, V2] {
            u.insert_type(TypeDescriptor::alias(
                TypeName::new(pkg, "Label"),
                TypeName::builtin("string"),
            ));
        }
        let safe = Options {
            unsafe_reinterpret: false,
            ..Options::default()
        };
        let ops = synthesize_with(
            &u,
            &safe,
            &ManualRegistry::new(),
            &TypeName::new(V1, "Label"),
            &TypeName::new(V2, "Label"),
            false,
        );
        assert_eq!(
            ops,
            vec![Op::ValueConvert {
                out_type: TypeName::new(V2, "Label")
            }]
        );
    }

    // -----------------------------------------------------------------------
    // 4. Manual call and copy-only bypass
    // -----------------------------------------------------------------------

    fn manual_for_widget(u: &mut Universe, doc: &[&str]) -> ManualRegistry {
        for pkg in [V1, V2] {
            let name = TypeName::new(pkg, "Widget");
            u.insert_type(TypeDescriptor::pointer(
                TypeName::pointer_spelling(&name),
                name,
            ));
        }
        let in_elem = TypeName::new(V1, "Widget");
        let out_elem = TypeName::new(V2, "Widget");
        let mut pkg = PackageDecl::new(V1);
        pkg.functions.push(FunctionDecl {
            name: TypeName::new(V1, conversion_fn_name(&in_elem, &out_elem)),
            receiver: false,
            params: vec![
                TypeName::pointer_spelling(&in_elem),
                TypeName::pointer_spelling(&out_elem),
                TypeName::new(SCOPE_PACKAGE, SCOPE_TYPE),
            ],
            results: vec![TypeName::builtin(ERROR_TYPE)],
            doc: doc.iter().map(|s| s.to_string()).collect(),
        });
        let mut registry = ManualRegistry::new();
        registry.scan_package(u, &pkg).unwrap();
        registry
    }

    #[test]
    fn test_manual_call_preferred_when_calls_allowed() {
        let mut u = base();
        u.insert_type(widget(
            V1,
            vec![Member::new("Name", TypeName::builtin("string"))],
        ));
        u.insert_type(TypeDescriptor::strukt(
            TypeName::new(V2, "Widget"),
            vec![Member::new("Title", TypeName::builtin("string"))],
        ));
        let registry = manual_for_widget(&mut u, &[]);

        let ops = synthesize_with(
            &u,
            &Options::default(),
            &registry,
            &TypeName::new(V1, "Widget"),
            &TypeName::new(V2, "Widget"),
            true,
        );
        assert_eq!(
            ops,
            vec![Op::ManualCall {
                function: TypeName::new(V1, "Convert_v1_Widget_To_v2_Widget")
            }]
        );
    }

    #[test]
    fn test_copy_only_bypassed_for_equivalent_pair() {
        let mut u = base();
        for pkg in [V1, V2] {
            u.insert_type(widget(
                pkg,
                vec![Member::new("Name", TypeName::builtin("string"))],
            ));
        }
        let registry = manual_for_widget(&mut u, &["+typeconv-fn=copy-only"]);

        // Memory-equivalent pair: the copy-only call is skipped and the
        // struct is converted directly.
        let ops = synthesize_with(
            &u,
            &Options::default(),
            &registry,
            &TypeName::new(V1, "Widget"),
            &TypeName::new(V2, "Widget"),
            true,
        );
        assert!(ops.iter().all(|op| !matches!(op, Op::ManualCall { .. })));
    }

    // -----------------------------------------------------------------------
    // 5. Composite recursion
    // -----------------------------------------------------------------------
    #[test]
    fn test_map_conversion_has_nil_guard_semantics() {
        let mut u = base();
        // Distinct value types so the maps are not memory-equivalent.
        u.insert_type(TypeDescriptor::strukt(
            TypeName::new(V1, "Meta"),
            vec![Member::new("Tag", TypeName::builtin("string"))],
        ));
        u.insert_type(TypeDescriptor::strukt(
            TypeName::new(V2, "Meta"),
            vec![
                Member::new("Tag", TypeName::builtin("string")),
                Member::new("Extra", TypeName::builtin("string")),
            ],
        ));
        for pkg in [V1, V2] {
            u.insert_type(TypeDescriptor::map(
                TypeName::new(pkg, "MetaByName"),
                TypeName::builtin("string"),
                TypeName::new(pkg, "Meta"),
            ));
        }

        let ops = synthesize_with(
            &u,
            &Options::default(),
            &ManualRegistry::new(),
            &TypeName::new(V1, "MetaByName"),
            &TypeName::new(V2, "MetaByName"),
            false,
        );
        match &ops[0] {
            Op::MapConvert {
                out_type,
                out_key,
                key_ops,
                elem_ops,
                ..
            } => {
                assert_eq!(*out_type, TypeName::new(V2, "MetaByName"));
                assert_eq!(*out_key, TypeName::builtin("string"));
                assert_eq!(*key_ops, vec![Op::ValueCopy]);
                // Value pairs admitted within the package call through to
                // their own named conversion.
                assert_eq!(
                    *elem_ops,
                    vec![Op::GeneratedCall {
                        in_type: TypeName::new(V1, "Meta"),
                        out_type: TypeName::new(V2, "Meta"),
                    }]
                );
            }
            other => panic!("expected MapConvert, got {:?}", other),
        }
    }

    #[test]
    fn test_slice_bulk_copy_for_identical_primitive_elements() {
        let mut u = base();
        u.insert_type(TypeDescriptor::slice(
            TypeName::new(V1, "Names"),
            TypeName::builtin("string"),
        ));
        u.insert_type(TypeDescriptor::slice(
            TypeName::new(V2, "Names"),
            TypeName::builtin("string"),
        ));
        let safe = Options {
            unsafe_reinterpret: false,
            ..Options::default()
        };
        let ops = synthesize_with(
            &u,
            &safe,
            &ManualRegistry::new(),
            &TypeName::new(V1, "Names"),
            &TypeName::new(V2, "Names"),
            false,
        );
        assert_eq!(
            ops,
            vec![Op::SliceConvert {
                out_type: TypeName::new(V2, "Names"),
                bulk_copy: true,
                elem_ops: vec![],
            }]
        );
    }

    #[test]
    fn test_struct_rename_resolves_member() {
        let mut u = base();
        u.insert_type(TypeDescriptor::strukt(
            TypeName::new(V1, "Widget"),
            vec![Member::new("Name", TypeName::builtin("string"))
                .with_doc(&["+typeconv:rename=FullName"])],
        ));
        u.insert_type(TypeDescriptor::strukt(
            TypeName::new(V2, "Widget"),
            vec![Member::new("FullName", TypeName::builtin("string"))],
        ));

        let options = Options::default();
        let registry = ManualRegistry::new();
        let mut ctx = GenContext::new(&u, &options, &registry, V1);
        let ops = ctx
            .synthesize(&TypeName::new(V1, "Widget"), &TypeName::new(V2, "Widget"), false)
            .unwrap();
        match &ops[0] {
            Op::StructConvert { fields } => {
                assert_eq!(
                    *fields,
                    vec![FieldConversion::Convert {
                        in_member: "Name".to_string(),
                        out_member: "FullName".to_string(),
                        ops: vec![Op::ValueCopy],
                    }]
                );
            }
            other => panic!("expected StructConvert, got {:?}", other),
        }
        assert!(ctx.skipped_fields().is_empty());
    }

    #[test]
    fn test_struct_unmatched_member_recorded_as_skipped() {
        let mut u = base();
        u.insert_type(TypeDescriptor::strukt(
            TypeName::new(V1, "Widget"),
            vec![Member::new("Extra", TypeName::builtin("string"))],
        ));
        u.insert_type(TypeDescriptor::strukt(TypeName::new(V2, "Widget"), vec![]));

        let options = Options::default();
        let registry = ManualRegistry::new();
        let mut ctx = GenContext::new(&u, &options, &registry, V1);
        let function = ctx
            .generate_conversion(&TypeName::new(V1, "Widget"), &TypeName::new(V2, "Widget"))
            .unwrap();

        assert_eq!(
            function.wrapper,
            WrapperStatus::Incomplete {
                missing: vec!["Extra".to_string()]
            }
        );
        assert_eq!(
            ctx.skipped_fields().get(&TypeName::new(V1, "Widget")),
            Some(&vec!["Extra".to_string()])
        );
    }

    #[test]
    fn test_struct_opted_out_member_noted() {
        let mut u = base();
        u.insert_type(TypeDescriptor::strukt(
            TypeName::new(V1, "Widget"),
            vec![
                Member::new("Name", TypeName::builtin("string")),
                Member::new("Internal", TypeName::builtin("string")).with_doc(&["+typeconv=false"]),
            ],
        ));
        u.insert_type(TypeDescriptor::strukt(
            TypeName::new(V2, "Widget"),
            vec![Member::new("Name", TypeName::builtin("string"))],
        ));

        let options = Options {
            unsafe_reinterpret: false,
            ..Options::default()
        };
        let registry = ManualRegistry::new();
        let mut ctx = GenContext::new(&u, &options, &registry, V1);
        let function = ctx
            .generate_conversion(&TypeName::new(V1, "Widget"), &TypeName::new(V2, "Widget"))
            .unwrap();

        // The opt-out is a note, not a skip: the wrapper stays public.
        assert_eq!(function.wrapper, WrapperStatus::Public);
        let FunctionBody::Ops { ops } = &function.body else {
            panic!("expected ops body");
        };
        match &ops[0] {
            Op::StructConvert { fields } => {
                assert!(matches!(&fields[1], FieldConversion::OptedOut { name } if name == "Internal"));
            }
            other => panic!("expected StructConvert, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolvable_pair_fails_visibly() {
        let mut u = base();
        u.insert_type(TypeDescriptor::strukt(
            TypeName::new(V1, "Widget"),
            vec![Member::new("When", TypeName::new(V1, "Time"))],
        ));
        u.insert_type(TypeDescriptor::strukt(
            TypeName::new(V2, "Widget"),
            vec![Member::new("When", TypeName::new(V2, "Instant"))],
        ));
        u.insert_type(TypeDescriptor::new(TypeName::new(V1, "Time"), TypeKind::Func));
        u.insert_type(TypeDescriptor::new(
            TypeName::new(V2, "Instant"),
            TypeKind::Chan,
        ));

        let ops = synthesize_with(
            &u,
            &Options::default(),
            &ManualRegistry::new(),
            &TypeName::new(V1, "Widget"),
            &TypeName::new(V2, "Widget"),
            false,
        );
        let Op::StructConvert { fields } = &ops[0] else {
            panic!("expected StructConvert");
        };
        let FieldConversion::Convert { ops, .. } = &fields[0] else {
            panic!("expected Convert field");
        };
        assert!(matches!(ops[0], Op::MissingConversion { .. }));
    }

    // -----------------------------------------------------------------------
    // 6. Round-trip symmetry
    // -----------------------------------------------------------------------
    #[test]
    fn test_symmetric_pair_generates_mirrored_fields() {
        let mut u = base();
        for pkg in [V1, V2] {
            u.insert_type(widget(
                pkg,
                vec![
                    Member::new("Name", TypeName::builtin("string")),
                    Member::new("Count", TypeName::builtin("int")),
                ],
            ));
        }
        let safe = Options {
            unsafe_reinterpret: false,
            ..Options::default()
        };
        let registry = ManualRegistry::new();
        let mut ctx = GenContext::new(&u, &safe, &registry, V1);

        let forward = ctx
            .synthesize(&TypeName::new(V1, "Widget"), &TypeName::new(V2, "Widget"), false)
            .unwrap();
        let backward = ctx
            .synthesize(&TypeName::new(V2, "Widget"), &TypeName::new(V1, "Widget"), false)
            .unwrap();

        // Identical member names and types on both sides: applying forward
        // then backward touches exactly the same members with value copies.
        assert_eq!(forward, backward);
        let Op::StructConvert { fields } = &forward[0] else {
            panic!("expected StructConvert");
        };
        assert!(fields
            .iter()
            .all(|f| matches!(f, FieldConversion::Convert { ops, .. } if ops == &vec![Op::ValueCopy])));
    }

    // -----------------------------------------------------------------------
    // 7. Adapter synthesis
    // -----------------------------------------------------------------------

    fn values_universe() -> Universe {
        let mut u = base();
        let values = TypeName::new("net/url", "Values");
        let map_name = TypeName::builtin("map[string][]string");
        let slice_name = TypeName::builtin("[]string");
        u.insert_type(TypeDescriptor::slice(
            slice_name.clone(),
            TypeName::builtin("string"),
        ));
        u.insert_type(TypeDescriptor::map(
            map_name.clone(),
            TypeName::builtin("string"),
            slice_name,
        ));
        u.insert_type(TypeDescriptor::alias(values, map_name));
        u
    }

    #[test]
    fn test_adapter_string_member_from_first_value() {
        let mut u = values_universe();
        u.insert_type(TypeDescriptor::strukt(
            TypeName::new(V1, "ListOptions"),
            vec![Member::new("Page", TypeName::builtin("string")).with_tags(r#"json:"page""#)],
        ));

        let options = Options::default();
        let registry = ManualRegistry::new();
        let mut ctx = GenContext::new(&u, &options, &registry, V1);
        let function = ctx
            .generate_adapter(
                &TypeName::new("net/url", "Values"),
                &TypeName::new(V1, "ListOptions"),
            )
            .unwrap()
            .expect("adapter generated");

        let FunctionBody::Adapter { fields } = &function.body else {
            panic!("expected adapter body");
        };
        assert_eq!(
            *fields,
            vec![AdapterField {
                name: "Page".to_string(),
                action: AdapterAction::FromValues {
                    tag: "page".to_string(),
                    present: ValueConversion::FirstString,
                    absent: ZeroValue::EmptyString,
                },
            }]
        );
    }

    #[test]
    fn test_adapter_member_without_tag_skipped_with_warning() {
        let mut u = values_universe();
        u.insert_type(TypeDescriptor::strukt(
            TypeName::new(V1, "ListOptions"),
            vec![Member::new("Page", TypeName::builtin("string"))],
        ));

        let options = Options::default();
        let registry = ManualRegistry::new();
        let mut ctx = GenContext::new(&u, &options, &registry, V1);
        let function = ctx
            .generate_adapter(
                &TypeName::new("net/url", "Values"),
                &TypeName::new(V1, "ListOptions"),
            )
            .unwrap()
            .unwrap();

        let FunctionBody::Adapter { fields } = &function.body else {
            panic!("expected adapter body");
        };
        assert_eq!(fields[0].action, AdapterAction::MissingTag);
    }

    #[test]
    fn test_adapter_slice_member_reinterpreted() {
        let mut u = values_universe();
        u.insert_type(TypeDescriptor::strukt(
            TypeName::new(V1, "ListOptions"),
            vec![
                Member::new("Filters", TypeName::builtin("[]string")).with_tags(r#"json:"filters""#),
            ],
        ));

        let options = Options::default();
        let registry = ManualRegistry::new();
        let mut ctx = GenContext::new(&u, &options, &registry, V1);
        let function = ctx
            .generate_adapter(
                &TypeName::new("net/url", "Values"),
                &TypeName::new(V1, "ListOptions"),
            )
            .unwrap()
            .unwrap();

        let FunctionBody::Adapter { fields } = &function.body else {
            panic!("expected adapter body");
        };
        let AdapterAction::FromValues { present, absent, .. } = &fields[0].action else {
            panic!("expected FromValues");
        };
        // []string is identical to itself: still a header reinterpret in the
        // generated code, since assignment crosses the pointer boundary.
        assert_eq!(
            *present,
            ValueConversion::HeaderReinterpret {
                out_type: TypeName::builtin("[]string")
            }
        );
        assert_eq!(*absent, ZeroValue::Nil);
    }

    #[test]
    fn test_adapter_zero_values_by_kind() {
        let mut u = values_universe();
        u.insert_type(TypeDescriptor::strukt(TypeName::new(V1, "Inner"), vec![]));
        assert_eq!(
            zero_value(&u, &TypeName::builtin("int")),
            ZeroValue::Zero
        );
        assert_eq!(
            zero_value(&u, &TypeName::builtin("bool")),
            ZeroValue::False
        );
        assert_eq!(
            zero_value(&u, &TypeName::new(V1, "Inner")),
            ZeroValue::StructLiteral {
                out_type: TypeName::new(V1, "Inner")
            }
        );
        assert_eq!(zero_value(&u, &TypeName::builtin("[]string")), ZeroValue::Nil);
    }

    #[test]
    fn test_json_tag_name_parsing() {
        assert_eq!(json_tag_name(r#"json:"page""#), Some("page".to_string()));
        assert_eq!(
            json_tag_name(r#"json:"page,omitempty""#),
            Some("page".to_string())
        );
        assert_eq!(json_tag_name(r#"json:",omitempty""#), None);
        assert_eq!(json_tag_name(r#"yaml:"page""#), None);
        assert_eq!(json_tag_name(""), None);
    }
}
