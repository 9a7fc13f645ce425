//! The typed operation list produced by synthesis.
//!
//! Synthesis never renders text. It emits these operations; a renderer backend
//! (the codegen crate) turns them into concrete syntax. The variants mirror
//! the strategy ladder: calls, reinterpretation, copies, language-level
//! conversions, composite recursion, and the deliberate compile-failure
//! marker.

use serde::{Deserialize, Serialize};

use crate::universe::TypeName;

// ---------------------------------------------------------------------------
// Pairs and naming
// ---------------------------------------------------------------------------

/// An ordered (source type, destination type) identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionPair {
    pub in_type: TypeName,
    pub out_type: TypeName,
}

impl ConversionPair {
    pub fn new(in_type: TypeName, out_type: TypeName) -> Self {
        Self { in_type, out_type }
    }
}

/// Public name of a type for conversion-function naming: the short package
/// name joined to the type name with an underscore. Anonymous composite
/// spellings flatten to identifier-safe forms (`[]string` -> `Slice_string`,
/// `*v1.Widget` -> `Pointer_v1_Widget`).
pub fn public_name(t: &TypeName) -> String {
    if !t.package.is_empty() {
        return format!("{}_{}", t.package_short(), t.name);
    }
    spelled_public(&t.name)
}

fn spelled_public(spelling: &str) -> String {
    if let Some(rest) = spelling.strip_prefix("[]") {
        return format!("Slice_{}", spelled_public_qualified(rest));
    }
    if let Some(rest) = spelling.strip_prefix('*') {
        return format!("Pointer_{}", spelled_public_qualified(rest));
    }
    if let Some(rest) = spelling.strip_prefix("map[") {
        if let Some((key, elem)) = rest.split_once(']') {
            return format!(
                "Map_{}_To_{}",
                spelled_public_qualified(key),
                spelled_public_qualified(elem)
            );
        }
    }
    spelling
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

fn spelled_public_qualified(spelling: &str) -> String {
    match spelling.rsplit_once('.') {
        Some((package, name)) => public_name(&TypeName::new(package, name)),
        None => spelled_public(spelling),
    }
}

/// Conventional name of the conversion function for a pair, e.g.
/// `Convert_v1_Widget_To_v2_Widget`.
pub fn conversion_fn_name(in_type: &TypeName, out_type: &TypeName) -> String {
    format!(
        "Convert_{}_To_{}",
        public_name(in_type),
        public_name(out_type)
    )
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// One synthesized conversion step. `in`/`out` are implicit: every operation
/// runs with `in` and `out` bound to pointers at the current nesting level,
/// so the same operation is valid at any depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Op {
    /// Invoke a hand-written conversion function, propagating its error.
    ManualCall { function: TypeName },
    /// Invoke the named generated conversion for the pair.
    GeneratedCall {
        in_type: TypeName,
        out_type: TypeName,
    },
    /// Reinterpret a pointer to the output pointer type.
    PointerReinterpret { out_type: TypeName },
    /// Reinterpret a map or slice header to the output type.
    HeaderReinterpret { out_type: TypeName },
    /// Plain value copy between identical declared types.
    ValueCopy,
    /// Language-level value conversion between identical underlying types.
    ValueConvert { out_type: TypeName },
    /// Nil-guarded map conversion: allocate sized output, convert every
    /// key/value into fresh temporaries, insert.
    MapConvert {
        out_type: TypeName,
        out_key: TypeName,
        out_elem: TypeName,
        key_ops: Vec<Op>,
        elem_ops: Vec<Op>,
    },
    /// Nil-guarded slice conversion: allocate matching length, then either a
    /// bulk copy (identical primitive elements) or an element loop.
    SliceConvert {
        out_type: TypeName,
        bulk_copy: bool,
        elem_ops: Vec<Op>,
    },
    /// Member-by-member struct conversion, in declaration order.
    StructConvert { fields: Vec<FieldConversion> },
    /// Nil-guarded pointer conversion: allocate the target, convert the
    /// pointee.
    PointerConvert {
        out_elem: TypeName,
        elem_ops: Vec<Op>,
    },
    /// Deliberate, non-compiling marker for a pair no strategy resolves.
    /// Known manual conversions are listed as a hint, sorted by name.
    MissingConversion {
        in_type: TypeName,
        out_type: TypeName,
        hints: Vec<ConversionHint>,
    },
}

/// Disposition of one input struct member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldConversion {
    /// Member opted out of generation; a note is emitted.
    OptedOut { name: String },
    /// No output member matched by name or rename alias; recorded as skipped.
    MissingPeer { name: String },
    /// Converted member pair.
    Convert {
        in_member: String,
        out_member: String,
        ops: Vec<Op>,
    },
}

/// One known manual conversion, offered in failure-marker hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionHint {
    pub function: TypeName,
    pub in_type: TypeName,
    pub out_type: TypeName,
}

// ---------------------------------------------------------------------------
// Adapter synthesis (explicit-from)
// ---------------------------------------------------------------------------

/// Disposition of one output member of an adapter conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterField {
    pub name: String,
    pub action: AdapterAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdapterAction {
    /// Member opted out of generation; a note is emitted.
    OptedOut,
    /// Member has no serialized field name; skipped with a warning, never
    /// defaulted silently.
    MissingTag,
    /// Key lookup in the flat multimap: convert when present, zero when
    /// absent.
    FromValues {
        tag: String,
        present: ValueConversion,
        absent: ZeroValue,
    },
}

/// How an adapter member is filled when its key is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueConversion {
    /// A registered manual conversion receives all values.
    ManualCall { function: TypeName },
    /// Direct assignment of the first value to a string member.
    FirstString,
    /// Reinterpret the value list as the member's pointer type.
    PointerReinterpret { out_type: TypeName },
    /// Reinterpret the value-list header as the member's map/slice type.
    HeaderReinterpret { out_type: TypeName },
    /// No supported strategy; a marker comment is emitted.
    Unsupported,
}

/// Type-appropriate zero assigned when the key is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ZeroValue {
    EmptyString,
    Zero,
    False,
    StructLiteral { out_type: TypeName },
    AliasedStructLiteral { alias: TypeName, out_type: TypeName },
    Nil,
    Unsupported,
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// Fate of the public wrapper for a generated pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WrapperStatus {
    /// Emit the public thin wrapper over the internal procedure.
    Public,
    /// A hand-written conversion exists; the wrapper is the user's.
    ManualOverride { function: TypeName },
    /// Some input members had no resolvable peer; the public wrapper is
    /// suppressed and the pair needs a manual finish.
    Incomplete { missing: Vec<String> },
}

/// Body of one conversion procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FunctionBody {
    Ops { ops: Vec<Op> },
    Adapter { fields: Vec<AdapterField> },
}

/// One conversion procedure: internal body plus wrapper status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionFunction {
    pub pair: ConversionPair,
    pub body: FunctionBody,
    pub wrapper: WrapperStatus,
}

/// Description of the aggregate registration procedure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registrations {
    /// Pairs registered with their generated conversion functions, including
    /// adapter pairs.
    pub generated: Vec<ConversionPair>,
    /// Hand-written conversions declared in the output package, sorted by
    /// function name.
    pub manual: Vec<(ConversionPair, TypeName)>,
}

/// Everything generated for one package: the renderer's entire input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageArtifact {
    /// Output package path.
    pub package: String,
    /// Package the candidate types are declared in (usually the same).
    pub types_package: String,
    pub functions: Vec<ConversionFunction>,
    pub registrations: Registrations,
}
