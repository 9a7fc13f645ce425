//! Go renderer: turns a typed [`PackageArtifact`] into one Go source file.
//!
//! Synthesis and rendering are deliberately decoupled: this module consumes
//! the operation list and knows nothing about how it was chosen. Operation
//! bodies rely on the shadowing convention — every nesting level rebinds `in`
//! and `out` — so the same rendering is valid at any depth.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rust_embed::Embed;
use serde::Serialize;
use tera::Tera;

use typeconv_core::ops::{
    conversion_fn_name, AdapterAction, AdapterField, ConversionFunction, FieldConversion,
    FunctionBody, Op, ValueConversion, WrapperStatus, ZeroValue,
};
use typeconv_core::universe::TypeKind;
use typeconv_core::{
    PackageArtifact, TypeName, Universe, SCHEME_PACKAGE, SCHEME_TYPE, SCOPE_PACKAGE, SCOPE_TYPE,
};

use crate::RenderConfig;

#[derive(Embed)]
#[folder = "templates/golang/"]
struct GoTemplates;

/// Template context for the whole generated file.
#[derive(Serialize)]
struct FileContext {
    header: String,
    package_name: String,
    imports_block: String,
    registration: String,
    functions: Vec<String>,
}

/// Render a package artifact into Go source.
pub fn render(
    universe: &Universe,
    artifact: &PackageArtifact,
    header: Option<&str>,
) -> Result<String> {
    let mut renderer = Renderer::new(universe, &artifact.package);

    let functions: Vec<String> = artifact
        .functions
        .iter()
        .map(|f| renderer.render_function(f))
        .collect();
    let registration = renderer.render_registration(artifact);

    let mut tera = Tera::default();
    for file_name in GoTemplates::iter() {
        let file = GoTemplates::get(&file_name)
            .with_context(|| format!("Failed to load embedded template: {}", file_name))?;
        let content = std::str::from_utf8(file.data.as_ref())
            .with_context(|| format!("Template {} is not valid UTF-8", file_name))?;
        tera.add_raw_template(&file_name, content)
            .with_context(|| format!("Failed to register template: {}", file_name))?;
    }

    let context = FileContext {
        header: match header {
            Some(h) if !h.is_empty() => format!("{}\n", h.trim_end_matches('\n')),
            _ => String::new(),
        },
        package_name: package_short_name(&artifact.package),
        imports_block: renderer.imports_block(),
        registration,
        functions,
    };
    let ctx = tera::Context::from_serialize(&context)
        .with_context(|| "Failed to serialize template context")?;
    tera.render("conversions.go.tera", &ctx)
        .with_context(|| "Failed to render conversions template")
}

/// Render an artifact and write it to
/// `<output_base>/<package path>/<file_name>`.
pub fn write_package(
    config: &RenderConfig,
    universe: &Universe,
    artifact: &PackageArtifact,
) -> Result<PathBuf> {
    let source = render(universe, artifact, config.header.as_deref())?;
    let dir = config.output_base.join(&artifact.package);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output dir: {}", dir.display()))?;
    let path = dir.join(&config.file_name);
    fs::write(&path, source).with_context(|| format!("Failed to write: {}", path.display()))?;
    Ok(path)
}

fn package_short_name(path: &str) -> String {
    path.rsplit('/')
        .next()
        .unwrap_or(path)
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

struct Renderer<'a> {
    universe: &'a Universe,
    current_package: &'a str,
    imports: BTreeMap<String, String>,
    aliases: BTreeSet<String>,
}

impl<'a> Renderer<'a> {
    fn new(universe: &'a Universe, current_package: &'a str) -> Self {
        Self {
            universe,
            current_package,
            imports: BTreeMap::new(),
            aliases: BTreeSet::new(),
        }
    }

    /// The rendered `import (...)` block, empty when nothing is imported.
    fn imports_block(&self) -> String {
        if self.imports.is_empty() {
            return String::new();
        }
        let mut block = String::from("import (\n");
        for (path, alias) in &self.imports {
            block.push_str(&format!("\t{} \"{}\"\n", alias, path));
        }
        block.push_str(")\n\n");
        block
    }

    /// Track an import and return its alias.
    fn import(&mut self, path: &str) -> String {
        if let Some(alias) = self.imports.get(path) {
            return alias.clone();
        }
        let base = package_short_name(path);
        let mut alias = base.clone();
        let mut n = 2;
        while self.aliases.contains(&alias) {
            alias = format!("{}{}", base, n);
            n += 1;
        }
        self.imports.insert(path.to_string(), alias.clone());
        self.aliases.insert(alias.clone());
        alias
    }

    /// Go spelling of a type, import-qualified. Anonymous composites are
    /// rebuilt structurally from their universe entries.
    fn type_expr(&mut self, t: &TypeName) -> String {
        if !t.package.is_empty() {
            if t.package == self.current_package {
                return t.name.clone();
            }
            let alias = self.import(&t.package);
            return format!("{}.{}", alias, t.name);
        }
        match self.universe.get(t) {
            Some(desc) => match desc.kind {
                TypeKind::Pointer => match &desc.elem {
                    Some(elem) => format!("*{}", self.type_expr(elem)),
                    None => t.name.clone(),
                },
                TypeKind::Slice => match &desc.elem {
                    Some(elem) => format!("[]{}", self.type_expr(elem)),
                    None => t.name.clone(),
                },
                TypeKind::Map => match (&desc.key, &desc.elem) {
                    (Some(key), Some(elem)) => {
                        format!("map[{}]{}", self.type_expr(key), self.type_expr(elem))
                    }
                    _ => t.name.clone(),
                },
                _ => t.name.clone(),
            },
            None => t.name.clone(),
        }
    }

    /// Import-qualified reference to a declared function.
    fn fn_expr(&mut self, f: &TypeName) -> String {
        if f.package == self.current_package {
            return f.name.clone();
        }
        let alias = self.import(&f.package);
        format!("{}.{}", alias, f.name)
    }

    fn scope_expr(&mut self) -> String {
        let alias = self.import(SCOPE_PACKAGE);
        format!("{}.{}", alias, SCOPE_TYPE)
    }

    // -----------------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------------

    fn render_function(&mut self, function: &ConversionFunction) -> String {
        let name = conversion_fn_name(&function.pair.in_type, &function.pair.out_type);
        let in_expr = self.type_expr(&function.pair.in_type);
        let out_expr = self.type_expr(&function.pair.out_type);
        let scope = self.scope_expr();

        let mut e = Emitter::new();
        e.line(format!(
            "func auto{}(in *{}, out *{}, s {}) error {{",
            name, in_expr, out_expr, scope
        ));
        e.indent();
        match &function.body {
            FunctionBody::Ops { ops } => self.render_ops(&mut e, ops),
            FunctionBody::Adapter { fields } => {
                self.render_adapter_fields(&mut e, &function.pair.in_type, fields)
            }
        }
        e.line("return nil");
        e.dedent();
        e.line("}");

        match &function.wrapper {
            WrapperStatus::Public => {
                e.blank();
                e.line(format!("// {} is an autogenerated conversion function.", name));
                e.line(format!(
                    "func {}(in *{}, out *{}, s {}) error {{",
                    name, in_expr, out_expr, scope
                ));
                e.indent();
                e.line(format!("return auto{}(in, out, s)", name));
                e.dedent();
                e.line("}");
            }
            // A manual conversion is the public surface for this pair.
            WrapperStatus::ManualOverride { .. } => {}
            // Skipped fields: the pair needs a hand-written finish.
            WrapperStatus::Incomplete { .. } => {}
        }
        e.finish()
    }

    fn render_ops(&mut self, e: &mut Emitter, ops: &[Op]) {
        for op in ops {
            self.render_op(e, op);
        }
    }

    fn render_op(&mut self, e: &mut Emitter, op: &Op) {
        match op {
            Op::ManualCall { function } => {
                let call = self.fn_expr(function);
                e.line(format!("if err := {}(in, out, s); err != nil {{", call));
                e.indent();
                e.line("return err");
                e.dedent();
                e.line("}");
            }
            Op::GeneratedCall { in_type, out_type } => {
                let name = conversion_fn_name(in_type, out_type);
                e.line(format!("if err := {}(in, out, s); err != nil {{", name));
                e.indent();
                e.line("return err");
                e.dedent();
                e.line("}");
            }
            Op::PointerReinterpret { out_type } => {
                let unsafe_alias = self.import("unsafe");
                let expr = self.type_expr(out_type);
                e.line(format!("*out = ({})({}.Pointer(*in))", expr, unsafe_alias));
            }
            Op::HeaderReinterpret { out_type } => {
                let unsafe_alias = self.import("unsafe");
                let expr = self.type_expr(out_type);
                e.line(format!("*out = *(*{})({}.Pointer(in))", expr, unsafe_alias));
            }
            Op::ValueCopy => e.line("*out = *in"),
            Op::ValueConvert { out_type } => {
                let expr = self.type_expr(out_type);
                e.line(format!("*out = {}(*in)", expr));
            }
            Op::MapConvert {
                out_type,
                out_key,
                out_elem,
                key_ops,
                elem_ops,
            } => {
                let out_expr = self.type_expr(out_type);
                let key_expr = self.type_expr(out_key);
                let elem_expr = self.type_expr(out_elem);
                e.line("if *in == nil {");
                e.indent();
                e.line("*out = nil");
                e.dedent();
                e.line("} else {");
                e.indent();
                e.line(format!("*out = make({}, len(*in))", out_expr));
                e.line("for inKey, inVal := range *in {");
                e.indent();
                e.line(format!("outKey := new({})", key_expr));
                e.line("if true {");
                e.indent();
                e.line("in, out := &inKey, outKey");
                self.render_ops(e, key_ops);
                e.dedent();
                e.line("}");
                e.line(format!("outVal := new({})", elem_expr));
                e.line("if true {");
                e.indent();
                e.line("in, out := &inVal, outVal");
                self.render_ops(e, elem_ops);
                e.dedent();
                e.line("}");
                e.line("(*out)[*outKey] = *outVal");
                e.dedent();
                e.line("}");
                e.dedent();
                e.line("}");
            }
            Op::SliceConvert {
                out_type,
                bulk_copy,
                elem_ops,
            } => {
                let out_expr = self.type_expr(out_type);
                e.line("if *in == nil {");
                e.indent();
                e.line("*out = nil");
                e.dedent();
                e.line("} else {");
                e.indent();
                e.line(format!("*out = make({}, len(*in))", out_expr));
                if *bulk_copy {
                    e.line("copy(*out, *in)");
                } else {
                    e.line("for i := range *in {");
                    e.indent();
                    e.line("in, out := &(*in)[i], &(*out)[i]");
                    self.render_ops(e, elem_ops);
                    e.dedent();
                    e.line("}");
                }
                e.dedent();
                e.line("}");
            }
            Op::StructConvert { fields } => {
                for field in fields {
                    match field {
                        FieldConversion::OptedOut { name } => e.line(format!(
                            "// INFO: in.{} opted out of conversion generation via +typeconv=false",
                            name
                        )),
                        FieldConversion::MissingPeer { name } => e.line(format!(
                            "// WARNING: in.{} requires manual conversion: does not exist in peer-type",
                            name
                        )),
                        FieldConversion::Convert {
                            in_member,
                            out_member,
                            ops,
                        } => {
                            e.line("if true {");
                            e.indent();
                            e.line(format!("in, out := &in.{}, &out.{}", in_member, out_member));
                            self.render_ops(e, ops);
                            e.dedent();
                            e.line("}");
                        }
                    }
                }
            }
            Op::PointerConvert { out_elem, elem_ops } => {
                let elem_expr = self.type_expr(out_elem);
                e.line("if *in == nil {");
                e.indent();
                e.line("*out = nil");
                e.dedent();
                e.line("} else {");
                e.indent();
                e.line(format!("*out = new({})", elem_expr));
                e.line("in, out := *in, *out");
                self.render_ops(e, elem_ops);
                e.dedent();
                e.line("}");
            }
            Op::MissingConversion {
                in_type,
                out_type,
                hints,
            } => {
                let in_expr = self.type_expr(in_type);
                let out_expr = self.type_expr(out_type);
                e.line(format!(
                    "// FIXME: Provide conversion function to convert {} to {};",
                    in_expr, out_expr
                ));
                if hints.is_empty() {
                    e.line("// no manual conversion functions are currently provided.");
                } else {
                    e.line("// the currently provided manual conversion functions are");
                    for hint in hints {
                        let call = self.fn_expr(&hint.function);
                        let hint_in = self.type_expr(&hint.in_type);
                        let hint_out = self.type_expr(&hint.out_type);
                        e.line(format!("//  - {}() ({} to {})", call, hint_in, hint_out));
                    }
                }
                // Undefined on purpose: the emitted file must not compile
                // until a conversion is provided.
                e.line("failCompilationOnMissingConversion()");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Adapter bodies
    // -----------------------------------------------------------------------

    fn render_adapter_fields(
        &mut self,
        e: &mut Emitter,
        in_type: &TypeName,
        fields: &[AdapterField],
    ) {
        // Cast through the source's underlying multimap representation.
        let cast = match self.universe.get(in_type) {
            Some(desc) => {
                let under = self.universe.unwrap_alias(desc).name.clone();
                self.type_expr(&under)
            }
            None => self.type_expr(in_type),
        };

        for field in fields {
            match &field.action {
                AdapterAction::OptedOut => {
                    e.line(format!(
                        "// INFO: in.{} opted out of conversion generation",
                        field.name
                    ));
                }
                AdapterAction::MissingTag => {
                    e.line(format!(
                        "// WARNING: Field {} does not have json tag, skipping.",
                        field.name
                    ));
                    e.blank();
                }
                AdapterAction::FromValues {
                    tag,
                    present,
                    absent,
                } => {
                    e.line(format!(
                        "if values, ok := {}(*in)[\"{}\"]; ok && len(values) > 0 {{",
                        cast, tag
                    ));
                    e.indent();
                    self.render_value_conversion(e, &field.name, present);
                    e.dedent();
                    e.line("} else {");
                    e.indent();
                    self.render_zero_value(e, &field.name, absent);
                    e.dedent();
                    e.line("}");
                }
            }
        }
    }

    fn render_value_conversion(
        &mut self,
        e: &mut Emitter,
        member: &str,
        conversion: &ValueConversion,
    ) {
        match conversion {
            ValueConversion::ManualCall { function } => {
                let call = self.fn_expr(function);
                e.line(format!(
                    "if err := {}(&values, &out.{}, s); err != nil {{",
                    call, member
                ));
                e.indent();
                e.line("return err");
                e.dedent();
                e.line("}");
            }
            ValueConversion::FirstString => {
                e.line(format!("out.{} = values[0]", member));
            }
            ValueConversion::PointerReinterpret { out_type } => {
                let unsafe_alias = self.import("unsafe");
                let expr = self.type_expr(out_type);
                e.line(format!(
                    "out.{} = ({})({}.Pointer(&values))",
                    member, expr, unsafe_alias
                ));
            }
            ValueConversion::HeaderReinterpret { out_type } => {
                let unsafe_alias = self.import("unsafe");
                let expr = self.type_expr(out_type);
                e.line(format!(
                    "out.{} = *(*{})({}.Pointer(&values))",
                    member, expr, unsafe_alias
                ));
            }
            ValueConversion::Unsupported => {
                e.line(format!(
                    "// FIXME: out.{} is of not yet supported type and requires manual conversion",
                    member
                ));
            }
        }
    }

    fn render_zero_value(&mut self, e: &mut Emitter, member: &str, zero: &ZeroValue) {
        match zero {
            ZeroValue::EmptyString => e.line(format!("out.{} = \"\"", member)),
            ZeroValue::Zero => e.line(format!("out.{} = 0", member)),
            ZeroValue::False => e.line(format!("out.{} = false", member)),
            ZeroValue::StructLiteral { out_type } => {
                let expr = self.type_expr(out_type);
                e.line(format!("out.{} = {}{{}}", member, expr));
            }
            ZeroValue::AliasedStructLiteral { alias, out_type } => {
                let alias_expr = self.type_expr(alias);
                let expr = self.type_expr(out_type);
                e.line(format!("out.{} = {}({}{{}})", member, alias_expr, expr));
            }
            ZeroValue::Nil => e.line(format!("out.{} = nil", member)),
            ZeroValue::Unsupported => e.line(format!(
                "// FIXME: out.{} is of unsupported type and requires manual conversion",
                member
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    fn render_registration(&mut self, artifact: &PackageArtifact) -> String {
        let scope = self.scope_expr();
        let scheme_alias = self.import(SCHEME_PACKAGE);

        let mut e = Emitter::new();
        e.line("func init() {");
        e.indent();
        e.line("localSchemeBuilder.Register(RegisterConversions)");
        e.dedent();
        e.line("}");
        e.blank();
        e.line("// RegisterConversions adds conversion functions to the given scheme.");
        e.line("// Public to allow building arbitrary schemes.");
        e.line(format!(
            "func RegisterConversions(s *{}.{}) error {{",
            scheme_alias, SCHEME_TYPE
        ));
        e.indent();

        for pair in &artifact.registrations.generated {
            let in_expr = self.type_expr(&pair.in_type);
            let out_expr = self.type_expr(&pair.out_type);
            let name = conversion_fn_name(&pair.in_type, &pair.out_type);
            e.line(format!(
                "if err := s.AddGeneratedConversion((*{})(nil), (*{})(nil), func(a, b interface{{}}, scope {}) error {{",
                in_expr, out_expr, scope
            ));
            e.indent();
            e.line(format!(
                "return {}(a.(*{}), b.(*{}), scope)",
                name, in_expr, out_expr
            ));
            e.dedent();
            e.line("}); err != nil {");
            e.indent();
            e.line("return err");
            e.dedent();
            e.line("}");
        }

        for (pair, function) in &artifact.registrations.manual {
            let in_expr = self.type_expr(&pair.in_type);
            let out_expr = self.type_expr(&pair.out_type);
            let call = self.fn_expr(function);
            e.line(format!(
                "if err := s.AddConversion((*{})(nil), (*{})(nil), func(a, b interface{{}}, scope {}) error {{",
                in_expr, out_expr, scope
            ));
            e.indent();
            e.line(format!(
                "return {}(a.(*{}), b.(*{}), scope)",
                call, in_expr, out_expr
            ));
            e.dedent();
            e.line("}); err != nil {");
            e.indent();
            e.line("return err");
            e.dedent();
            e.line("}");
        }

        e.line("return nil");
        e.dedent();
        e.line("}");
        e.finish()
    }
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Tab-indented line writer.
struct Emitter {
    buf: String,
    depth: usize,
}

impl Emitter {
    fn new() -> Self {
        Self {
            buf: String::new(),
            depth: 0,
        }
    }

    fn line(&mut self, s: impl AsRef<str>) {
        for _ in 0..self.depth {
            self.buf.push('\t');
        }
        self.buf.push_str(s.as_ref());
        self.buf.push('\n');
    }

    fn blank(&mut self) {
        self.buf.push('\n');
    }

    fn indent(&mut self) {
        self.depth += 1;
    }

    fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// The accumulated text, without a trailing newline.
    fn finish(mut self) -> String {
        while self.buf.ends_with('\n') {
            self.buf.pop();
        }
        self.buf
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
