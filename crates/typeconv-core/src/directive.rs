//! Directive extraction from documentation comments.
//!
//! Declarations opt into (and steer) generation through `+typeconv` marker
//! lines in their attached doc comments. Free-text scanning happens here,
//! once, at the edge: every marker is parsed into a typed directive struct and
//! validated immediately, so the synthesis algorithm only ever sees
//! well-formed directives.
//!
//! Recognized surface:
//!
//! - package: `+typeconv=<peer-pkg>` (repeatable), or a single
//!   `+typeconv=false` for explicit-only mode;
//!   `+typeconv-external-types=<type-pkg>` when the types live outside the
//!   output package.
//! - type: `+typeconv=false` (opt out);
//!   `+typeconv:explicit-from=net/url.Values` (only the builtin flat-multimap
//!   source is supported).
//! - field: `+typeconv=false` (opt out); `+typeconv:rename=<peer-name>`
//!   (repeatable; adds to the original name, never masks it).
//! - procedure: `+typeconv-fn=copy-only` or `+typeconv-fn=drop`.
//!
//! Absence of a directive is "no constraint," never an error.

use regex::Regex;

use crate::error::GenError;
use crate::universe::TypeName;
use crate::{VALUES_PACKAGE, VALUES_TYPE};

/// Base marker: peer packages (package scope) or opt-out (type/field scope).
pub const TAG: &str = "typeconv";
/// Type scope: generate a conversion from an external source type.
pub const EXPLICIT_FROM_TAG: &str = "typeconv:explicit-from";
/// Package scope: the package the types are declared in, when it differs
/// from the output package.
pub const EXTERNAL_TYPES_TAG: &str = "typeconv-external-types";
/// Procedure scope: copy-only / drop classification.
pub const FN_TAG: &str = "typeconv-fn";
/// Field scope: peer-name alias.
pub const RENAME_TAG: &str = "typeconv:rename";

/// Collect the values of one marker from a set of doc lines, in order.
pub fn extract(doc: &[String], tag: &str) -> Vec<String> {
    // Offline batch tool; compiling per call keeps the extractor stateless.
    let re = Regex::new(r"^\s*\+([a-zA-Z0-9_:-]+)=(.*)$").unwrap();
    doc.iter()
        .filter_map(|line| {
            let caps = re.captures(line)?;
            if &caps[1] == tag {
                Some(caps[2].trim().to_string())
            } else {
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Package scope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDirectives {
    /// `None`: no marker, the package is not a generation candidate.
    /// `Some(vec![])`: explicit-only mode (`+typeconv=false`).
    pub peer_packages: Option<Vec<String>>,
    /// Package the types are declared in, when not the output package.
    pub external_types: Option<String>,
}

impl PackageDirectives {
    pub fn parse(package: &str, doc: &[String]) -> Result<Self, GenError> {
        let values = extract(doc, TAG);
        let peer_packages = if values.is_empty() {
            None
        } else if values.len() == 1 && values[0] == "false" {
            // The generator still fires for explicit conversions.
            Some(Vec::new())
        } else {
            Some(values)
        };

        let ext = extract(doc, EXTERNAL_TYPES_TAG);
        let external_types = match ext.len() {
            0 => None,
            1 => Some(ext.into_iter().next().unwrap()),
            _ => {
                return Err(GenError::UnsupportedDirective {
                    target: package.to_string(),
                    tag: EXTERNAL_TYPES_TAG.to_string(),
                    value: ext.join(","),
                })
            }
        };

        Ok(Self {
            peer_packages,
            external_types,
        })
    }
}

// ---------------------------------------------------------------------------
// Type scope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDirectives {
    pub opt_out: bool,
    /// External source types to generate adapter conversions from.
    pub explicit_from: Vec<TypeName>,
}

impl TypeDirectives {
    pub fn parse(type_name: &TypeName, doc: &[String]) -> Result<Self, GenError> {
        let values = extract(doc, TAG);
        let opt_out = match values.first().map(String::as_str) {
            None => false,
            Some("false") => true,
            Some(other) => {
                return Err(GenError::UnsupportedDirective {
                    target: type_name.to_string(),
                    tag: TAG.to_string(),
                    value: other.to_string(),
                })
            }
        };

        let mut explicit_from = Vec::new();
        for path in extract(doc, EXPLICIT_FROM_TAG) {
            let Some((package, name)) = path.rsplit_once('.') else {
                tracing::warn!(marker = %path, "malformed explicit-from marker, skipping");
                continue;
            };
            if package != VALUES_PACKAGE || name != VALUES_TYPE {
                return Err(GenError::UnsupportedExplicitSource(path));
            }
            explicit_from.push(TypeName::new(package, name));
        }

        Ok(Self {
            opt_out,
            explicit_from,
        })
    }
}

// ---------------------------------------------------------------------------
// Field scope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDirectives {
    pub opt_out: bool,
    /// Peer-name aliases, additive to the declared name.
    pub renames: Vec<String>,
}

impl MemberDirectives {
    pub fn parse(member: &str, doc: &[String]) -> Result<Self, GenError> {
        let values = extract(doc, TAG);
        let opt_out = match values.first().map(String::as_str) {
            None => false,
            Some("false") => true,
            Some(other) => {
                return Err(GenError::UnsupportedDirective {
                    target: member.to_string(),
                    tag: TAG.to_string(),
                    value: other.to_string(),
                })
            }
        };
        Ok(Self {
            opt_out,
            renames: extract(doc, RENAME_TAG),
        })
    }
}

// ---------------------------------------------------------------------------
// Procedure scope
// ---------------------------------------------------------------------------

/// Classification of a hand-written conversion function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FnClassification {
    /// Pure structural copy; eligible for bypass when a cheaper strategy
    /// applies.
    CopyOnly,
    /// Never apply this conversion to struct members; the field is silently
    /// excluded.
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnDirectives {
    pub classification: Option<FnClassification>,
}

impl FnDirectives {
    pub fn parse(function: &TypeName, doc: &[String]) -> Result<Self, GenError> {
        let values = extract(doc, FN_TAG);
        let classification = match values.first().map(String::as_str) {
            None => None,
            Some("copy-only") if values.len() == 1 => Some(FnClassification::CopyOnly),
            Some("drop") if values.len() == 1 => Some(FnClassification::Drop),
            Some(_) => {
                return Err(GenError::UnsupportedDirective {
                    target: function.to_string(),
                    tag: FN_TAG.to_string(),
                    value: values.join(","),
                })
            }
        };
        Ok(Self { classification })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_collects_in_order() {
        let doc = lines(&[
            "Widget converts between API versions.",
            "+typeconv:rename=FullName",
            "unrelated prose",
            " +typeconv:rename=DisplayName",
        ]);
        assert_eq!(
            extract(&doc, RENAME_TAG),
            vec!["FullName".to_string(), "DisplayName".to_string()]
        );
        assert!(extract(&doc, TAG).is_empty());
    }

    #[test]
    fn test_package_peer_list() {
        let doc = lines(&["+typeconv=example.io/api/v2", "+typeconv=example.io/api/common"]);
        let d = PackageDirectives::parse("example.io/api/v1", &doc).unwrap();
        assert_eq!(
            d.peer_packages,
            Some(vec![
                "example.io/api/v2".to_string(),
                "example.io/api/common".to_string()
            ])
        );
        assert_eq!(d.external_types, None);
    }

    #[test]
    fn test_package_explicit_only_mode() {
        let doc = lines(&["+typeconv=false"]);
        let d = PackageDirectives::parse("example.io/api/v1", &doc).unwrap();
        assert_eq!(d.peer_packages, Some(Vec::new()));
    }

    #[test]
    fn test_package_no_marker_means_no_candidate() {
        let d = PackageDirectives::parse("example.io/api/v1", &lines(&["just prose"])).unwrap();
        assert_eq!(d.peer_packages, None);
    }

    #[test]
    fn test_package_multiple_external_types_fatal() {
        let doc = lines(&[
            "+typeconv=example.io/api/v2",
            "+typeconv-external-types=a",
            "+typeconv-external-types=b",
        ]);
        assert!(PackageDirectives::parse("example.io/api/v1", &doc).is_err());
    }

    #[test]
    fn test_type_opt_out() {
        let name = TypeName::new("example.io/api/v1", "Widget");
        let d = TypeDirectives::parse(&name, &lines(&["+typeconv=false"])).unwrap();
        assert!(d.opt_out);
    }

    #[test]
    fn test_type_unsupported_value_fatal() {
        let name = TypeName::new("example.io/api/v1", "Widget");
        let err = TypeDirectives::parse(&name, &lines(&["+typeconv=maybe"])).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn test_type_explicit_from_builtin_source() {
        let name = TypeName::new("example.io/api/v1", "ListOptions");
        let d =
            TypeDirectives::parse(&name, &lines(&["+typeconv:explicit-from=net/url.Values"]))
                .unwrap();
        assert_eq!(d.explicit_from, vec![TypeName::new("net/url", "Values")]);
    }

    #[test]
    fn test_type_explicit_from_other_source_fatal() {
        let name = TypeName::new("example.io/api/v1", "ListOptions");
        let err =
            TypeDirectives::parse(&name, &lines(&["+typeconv:explicit-from=net/http.Header"]))
                .unwrap_err();
        assert!(matches!(err, GenError::UnsupportedExplicitSource(_)));
    }

    #[test]
    fn test_type_explicit_from_malformed_skipped() {
        let name = TypeName::new("example.io/api/v1", "ListOptions");
        let d = TypeDirectives::parse(&name, &lines(&["+typeconv:explicit-from=nodot"])).unwrap();
        assert!(d.explicit_from.is_empty());
    }

    #[test]
    fn test_member_renames() {
        let d = MemberDirectives::parse(
            "Name",
            &lines(&["+typeconv:rename=FullName", "+typeconv:rename=Title"]),
        )
        .unwrap();
        assert!(!d.opt_out);
        assert_eq!(d.renames, vec!["FullName".to_string(), "Title".to_string()]);
    }

    #[test]
    fn test_fn_classification() {
        let name = TypeName::new("example.io/api/v1", "Convert_v1_Widget_To_v2_Widget");
        let copy = FnDirectives::parse(&name, &lines(&["+typeconv-fn=copy-only"])).unwrap();
        assert_eq!(copy.classification, Some(FnClassification::CopyOnly));

        let drop = FnDirectives::parse(&name, &lines(&["+typeconv-fn=drop"])).unwrap();
        assert_eq!(drop.classification, Some(FnClassification::Drop));

        let none = FnDirectives::parse(&name, &lines(&["prose only"])).unwrap();
        assert_eq!(none.classification, None);

        assert!(FnDirectives::parse(&name, &lines(&["+typeconv-fn=verbatim"])).is_err());
    }
}
