//! The type universe: the queryable set of type and function declarations the
//! generator operates on.
//!
//! A universe is produced by an external declaration-extraction front end and
//! handed to the core as JSON (see [`Universe::from_json`]) or built directly
//! through the insert API (front ends, tests). Everything here is immutable
//! once generation starts.
//!
//! Anonymous composite types (pointers, maps, slices) are ordinary universe
//! entries with an empty package and a spelled name (e.g. `*v1.Widget`,
//! `map[string][]string`); identity is name equality throughout.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GenError;

// ---------------------------------------------------------------------------
// Names and kinds
// ---------------------------------------------------------------------------

/// Qualified identity of a type: import path plus declared name.
///
/// Builtins and anonymous composite types carry an empty package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeName {
    #[serde(default)]
    pub package: String,
    pub name: String,
}

impl TypeName {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    /// A builtin or otherwise package-less name.
    pub fn builtin(name: impl Into<String>) -> Self {
        Self {
            package: String::new(),
            name: name.into(),
        }
    }

    /// The spelled name of the anonymous pointer type to `elem`.
    pub fn pointer_spelling(elem: &TypeName) -> Self {
        Self::builtin(format!("*{}", elem))
    }

    /// The spelled name of the anonymous slice type of `elem`.
    pub fn slice_spelling(elem: &TypeName) -> Self {
        Self::builtin(format!("[]{}", elem))
    }

    /// The spelled name of the anonymous map type from `key` to `elem`.
    pub fn map_spelling(key: &TypeName, elem: &TypeName) -> Self {
        Self::builtin(format!("map[{}]{}", key, elem))
    }

    /// Last segment of the package path, sanitized for identifier use.
    /// Empty for builtins and anonymous types.
    pub fn package_short(&self) -> String {
        self.package
            .rsplit('/')
            .next()
            .unwrap_or("")
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect()
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.package, self.name)
        }
    }
}

/// Whether a declared name is private in the modeled source language
/// (lowercase or underscore initial).
pub fn is_private_name(name: &str) -> bool {
    match name.chars().next() {
        Some('_') => true,
        Some(c) => c.is_lowercase(),
        None => true,
    }
}

/// The structural kind of a type declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeKind {
    Primitive,
    Struct,
    Pointer,
    Map,
    Slice,
    Interface,
    Alias,
    Func,
    Array,
    Chan,
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// One struct member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeName,
    #[serde(default)]
    pub embedded: bool,
    /// Raw struct-tag text, e.g. `json:"page,omitempty"`.
    #[serde(default)]
    pub tags: String,
    /// Attached documentation lines (directive surface).
    #[serde(default)]
    pub doc: Vec<String>,
}

impl Member {
    pub fn new(name: impl Into<String>, type_ref: TypeName) -> Self {
        Self {
            name: name.into(),
            type_ref,
            embedded: false,
            tags: String::new(),
            doc: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    pub fn with_doc(mut self, doc: &[&str]) -> Self {
        self.doc = doc.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// A single type declaration. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptor {
    pub name: TypeName,
    pub kind: TypeKind,
    /// Ordered member list (structs).
    #[serde(default)]
    pub members: Vec<Member>,
    /// Key type (maps).
    #[serde(default)]
    pub key: Option<TypeName>,
    /// Element type (maps, slices, pointers, arrays, chans).
    #[serde(default)]
    pub elem: Option<TypeName>,
    /// Underlying type (aliases).
    #[serde(default)]
    pub underlying: Option<TypeName>,
    /// Declared method names (interfaces).
    #[serde(default)]
    pub methods: Vec<String>,
    /// Attached documentation lines (directive surface).
    #[serde(default)]
    pub doc: Vec<String>,
}

impl TypeDescriptor {
    pub fn new(name: TypeName, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            members: Vec::new(),
            key: None,
            elem: None,
            underlying: None,
            methods: Vec::new(),
            doc: Vec::new(),
        }
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        Self::new(TypeName::builtin(name), TypeKind::Primitive)
    }

    pub fn strukt(name: TypeName, members: Vec<Member>) -> Self {
        Self {
            members,
            ..Self::new(name, TypeKind::Struct)
        }
    }

    pub fn pointer(name: TypeName, elem: TypeName) -> Self {
        Self {
            elem: Some(elem),
            ..Self::new(name, TypeKind::Pointer)
        }
    }

    pub fn slice(name: TypeName, elem: TypeName) -> Self {
        Self {
            elem: Some(elem),
            ..Self::new(name, TypeKind::Slice)
        }
    }

    pub fn map(name: TypeName, key: TypeName, elem: TypeName) -> Self {
        Self {
            key: Some(key),
            elem: Some(elem),
            ..Self::new(name, TypeKind::Map)
        }
    }

    pub fn alias(name: TypeName, underlying: TypeName) -> Self {
        Self {
            underlying: Some(underlying),
            ..Self::new(name, TypeKind::Alias)
        }
    }

    pub fn with_doc(mut self, doc: &[&str]) -> Self {
        self.doc = doc.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// A declared function, as seen by the manual-conversion scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDecl {
    pub name: TypeName,
    #[serde(default)]
    pub receiver: bool,
    /// Parameter type references, in order.
    #[serde(default)]
    pub params: Vec<TypeName>,
    /// Result type references, in order.
    #[serde(default)]
    pub results: Vec<TypeName>,
    #[serde(default)]
    pub doc: Vec<String>,
}

/// A package declaration: path, package-level doc lines, declared functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDecl {
    pub path: String,
    #[serde(default)]
    pub doc: Vec<String>,
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
}

impl PackageDecl {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            doc: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn with_doc(mut self, doc: &[&str]) -> Self {
        self.doc = doc.iter().map(|s| s.to_string()).collect();
        self
    }
}

// ---------------------------------------------------------------------------
// Universe
// ---------------------------------------------------------------------------

/// The full set of declarations available to a generation run.
///
/// Backed by ordered maps so every iteration the generator performs is
/// deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "UniverseFile", into = "UniverseFile")]
pub struct Universe {
    packages: BTreeMap<String, PackageDecl>,
    types: BTreeMap<TypeName, TypeDescriptor>,
}

/// On-disk shape of a universe: flat lists, rebuilt into indexes on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UniverseFile {
    #[serde(default)]
    packages: Vec<PackageDecl>,
    #[serde(default)]
    types: Vec<TypeDescriptor>,
}

impl From<UniverseFile> for Universe {
    fn from(file: UniverseFile) -> Self {
        let mut u = Universe::default();
        for p in file.packages {
            u.insert_package(p);
        }
        for t in file.types {
            u.insert_type(t);
        }
        u
    }
}

impl From<Universe> for UniverseFile {
    fn from(u: Universe) -> Self {
        Self {
            packages: u.packages.into_values().collect(),
            types: u.types.into_values().collect(),
        }
    }
}

impl Universe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserialize a universe from the front end's JSON export.
    pub fn from_json(input: &str) -> Result<Self, GenError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn insert_package(&mut self, pkg: PackageDecl) {
        self.packages.insert(pkg.path.clone(), pkg);
    }

    pub fn insert_type(&mut self, t: TypeDescriptor) {
        self.types.insert(t.name.clone(), t);
    }

    pub fn add_function(&mut self, package: &str, f: FunctionDecl) {
        self.packages
            .entry(package.to_string())
            .or_insert_with(|| PackageDecl::new(package))
            .functions
            .push(f);
    }

    pub fn package(&self, path: &str) -> Option<&PackageDecl> {
        self.packages.get(path)
    }

    pub fn get(&self, name: &TypeName) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    /// Look up a type, failing the run on a dangling reference.
    pub fn resolve(&self, name: &TypeName) -> Result<&TypeDescriptor, GenError> {
        self.get(name)
            .ok_or_else(|| GenError::UnknownType(name.to_string()))
    }

    pub fn has_type(&self, package: &str, name: &str) -> bool {
        self.types
            .contains_key(&TypeName::new(package, name))
    }

    /// All named types declared in `package`, in name order.
    pub fn types_in<'a>(
        &'a self,
        package: &'a str,
    ) -> impl Iterator<Item = &'a TypeDescriptor> + 'a {
        self.types
            .values()
            .filter(move |t| t.name.package == package)
    }

    /// Recurse down aliased types to find the bedrock declaration.
    ///
    /// A dangling or missing underlying reference stops the walk at the last
    /// resolvable descriptor.
    pub fn unwrap_alias<'a>(&'a self, mut t: &'a TypeDescriptor) -> &'a TypeDescriptor {
        while t.kind == TypeKind::Alias {
            match t.underlying.as_ref().and_then(|u| self.get(u)) {
                Some(under) => t = under,
                None => break,
            }
        }
        t
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
