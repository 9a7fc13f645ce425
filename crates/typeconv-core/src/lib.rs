//! typeconv-core — structural type-conversion synthesis.
//!
//! Given a type universe holding two structurally related sets of type
//! declarations ("schema versions" of the same logical entities), the core
//! decides for every matched pair how to convert one into the other and emits
//! a typed operation list implementing that conversion. Rendering into Go
//! source is a separate backend (the codegen crate); driving files and flags
//! is the CLI's job.
//!
//! The pipeline per package:
//!
//! 1. Parse package directives; packages without a `+typeconv` marker are not
//!    candidates.
//! 2. Scan the package, its peers, and any extra packages for manual
//!    conversion functions.
//! 3. Select pairs: same-named peers plus explicit-from adapter sources.
//! 4. Synthesize both directions for every peered pair and every adapter.
//! 5. Aggregate registrations.
//!
//! Everything is deterministic and single-threaded; any fatal condition
//! aborts the run with a [`GenError`].

pub mod config;
pub mod directive;
pub mod error;
pub mod layout;
pub mod manual;
pub mod ops;
pub mod register;
pub mod select;
pub mod synth;
pub mod universe;

pub use config::Options;
pub use error::GenError;
pub use ops::{ConversionFunction, ConversionPair, Op, PackageArtifact, Registrations};
pub use universe::{
    FunctionDecl, Member, PackageDecl, TypeDescriptor, TypeKind, TypeName, Universe,
};

use directive::PackageDirectives;
use manual::ManualRegistry;
use select::{peer_type_for, select_types};
use synth::GenContext;

/// Import path of the runtime package carrying the conversion `Scope` type.
pub const SCOPE_PACKAGE: &str = "typeconv.io/runtime/conversion";
/// Name of the scope type every conversion function threads through.
pub const SCOPE_TYPE: &str = "Scope";
/// Import path of the runtime package carrying the registration `Scheme`.
pub const SCHEME_PACKAGE: &str = "typeconv.io/runtime/scheme";
/// Name of the registration table type.
pub const SCHEME_TYPE: &str = "Scheme";
/// Import path of the builtin flat-multimap adapter source.
pub const VALUES_PACKAGE: &str = "net/url";
/// Name of the builtin flat-multimap adapter source type.
pub const VALUES_TYPE: &str = "Values";
/// The builtin error type name.
pub const ERROR_TYPE: &str = "error";

/// Run generation for one package.
///
/// Returns `Ok(None)` when the package carries no `+typeconv` marker and is
/// therefore not a generation candidate. Fatal conditions (unsupported
/// directive values, unresolvable packages, duplicate manual claims) abort
/// with an error; an artifact is never partial.
pub fn generate_package(
    universe: &Universe,
    package: &str,
    options: &Options,
) -> Result<Option<PackageArtifact>, GenError> {
    tracing::debug!(package = %package, "considering package");
    let pkg = universe
        .package(package)
        .ok_or_else(|| GenError::UnknownPackage(package.to_string()))?;

    let directives = PackageDirectives::parse(package, &pkg.doc)?;
    let Some(mut peer_packages) = directives.peer_packages else {
        tracing::debug!(package = %package, "no conversion marker, skipping");
        return Ok(None);
    };
    if !peer_packages.is_empty() {
        peer_packages.extend(options.base_peer_packages.iter().cloned());
        peer_packages.extend(options.extra_peer_packages.iter().cloned());
    }

    // Sometimes the types live outside the output package.
    let types_package = directives
        .external_types
        .unwrap_or_else(|| package.to_string());
    universe
        .package(&types_package)
        .ok_or_else(|| GenError::UnknownPackage(types_package.clone()))?;

    let mut manual = ManualRegistry::new();
    manual.scan_package(universe, pkg)?;
    for extra in peer_packages.iter().chain(&options.extra_packages) {
        let peer_pkg = universe
            .package(extra)
            .ok_or_else(|| GenError::UnknownPackage(extra.clone()))?;
        manual.scan_package(universe, peer_pkg)?;
    }

    let selected = select_types(universe, &types_package, &peer_packages)?;

    let mut ctx = GenContext::new(universe, options, &manual, types_package.clone());
    let mut functions = Vec::new();
    for t in &selected.peered {
        let Some(peer) = peer_type_for(universe, t, &peer_packages) else {
            continue;
        };
        functions.push(ctx.generate_conversion(t, &peer)?);
        functions.push(ctx.generate_conversion(&peer, t)?);
    }
    for pair in &selected.explicit {
        if let Some(adapter) = ctx.generate_adapter(&pair.in_type, &pair.out_type)? {
            functions.push(adapter);
        }
    }

    let registrations =
        register::build_registrations(universe, &manual, &selected, &peer_packages, package);

    Ok(Some(PackageArtifact {
        package: package.to_string(),
        types_package,
        functions,
        registrations,
    }))
}
