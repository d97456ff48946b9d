//! Script Transform
//!
//! Downgrades JS for a target through a [`JsEngine`], or only strips
//! comments and whitespace for targets that need no downleveling. Neither
//! path renames identifiers: inline `on*` handlers call functions declared in
//! script blocks by name.

use std::ops::Range;
use std::path::Path;

use oxc::allocator::Allocator;
use oxc::ast::ast::{
    BindingIdentifier, Expression, IdentifierName, IdentifierReference, LabelIdentifier,
    PrivateIdentifier, Program, RegExpLiteral, StaticMemberExpression, StringLiteral,
    TaggedTemplateExpression, TemplateElement,
};
use oxc::ast_visit::{Visit, walk};
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::{SourceType, Span};
use oxc::transformer::{
    EnvOptions, HelperLoaderMode, HelperLoaderOptions, TransformOptions, Transformer,
};

use super::{ObfuscationTable, Transformed};
use crate::config::TargetProfile;
use crate::error::{BuildError, Result};

/// How a script is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsSource {
    /// Classic `<script>` or standalone `.js` file
    Script,
    /// `<script type="module">`
    Module,
}

/// Compiler-level JS downleveling engine
pub trait JsEngine {
    /// Rewrite `code` for `es_target`; `force_all` enables every syntax transform
    fn downgrade(&self, code: &str, es_target: &str, force_all: bool, source: JsSource)
    -> Result<String>;

    /// Remove comments and collapse whitespace without rewriting syntax
    fn strip(&self, code: &str, source: JsSource) -> Result<String>;

    /// Apply `table` wherever an escape keeps the meaning of `code`
    ///
    /// Forbidden substrings in syntax positions (keywords, `=>`, template
    /// delimiters) are left in place; the result must still parse.
    fn obfuscate(&self, code: &str, table: &ObfuscationTable, source: JsSource) -> Result<String>;
}

/// Global object the lowered code reads runtime helpers from
const HELPERS_GLOBAL: &str = "babelHelpers";

/// Runtime helpers [`OxcEngine`] can bundle into a lowered script
const BUNDLED_HELPERS: &[&str] = &["asyncToGenerator"];

/// ES5 definitions of [`BUNDLED_HELPERS`]
const HELPERS_PRELUDE: &str = r#"var babelHelpers=(typeof self!=="undefined"?self:this).babelHelpers||{};
babelHelpers.asyncToGenerator=babelHelpers.asyncToGenerator||function(fn){return function(){var ctx=this,args=arguments;return new Promise(function(resolve,reject){var gen=fn.apply(ctx,args);function step(key,arg){var info;try{info=gen[key](arg)}catch(error){reject(error);return}if(info.done){resolve(info.value)}else{Promise.resolve(info.value).then(next,thrown)}}function next(value){step("next",value)}function thrown(err){step("throw",err)}next(undefined)})}};
"#;

/// [`JsEngine`] backed by oxc
pub struct OxcEngine;

impl OxcEngine {
    fn source_type(source: JsSource) -> SourceType {
        match source {
            JsSource::Script => SourceType::cjs(),
            JsSource::Module => SourceType::mjs(),
        }
    }

    fn parse<'a>(allocator: &'a Allocator, code: &'a str, source: JsSource) -> Result<Program<'a>> {
        let parsed = Parser::new(allocator, code, Self::source_type(source)).parse();
        if parsed.panicked || !parsed.errors.is_empty() {
            return Err(js_failed(format!("parse: {}", first_error(&parsed.errors))));
        }
        Ok(parsed.program)
    }

    fn print(program: &Program<'_>) -> String {
        Codegen::new()
            .with_options(CodegenOptions {
                minify: true,
                comments: CommentOptions::disabled(),
                ..CodegenOptions::default()
            })
            .build(program)
            .code
    }

    /// Helpers are read from a global instead of imported from a runtime package
    fn transform_options(es_target: &str, force_all: bool) -> Result<TransformOptions> {
        let env = if force_all {
            EnvOptions::enable_all(true)
        } else {
            EnvOptions::from_target(es_target).map_err(js_failed)?
        };
        Ok(TransformOptions {
            env,
            helper_loader: HelperLoaderOptions {
                mode: HelperLoaderMode::External,
                ..HelperLoaderOptions::default()
            },
            ..TransformOptions::default()
        })
    }

    /// Put the helper definitions the lowered `program` calls in front of its body
    fn bundle_helpers<'a>(allocator: &'a Allocator, program: &mut Program<'a>) -> Result<()> {
        let mut uses = HelperUses::default();
        uses.visit_program(program);
        if uses.0.is_empty() {
            return Ok(());
        }

        let missing: Vec<&str> = uses
            .0
            .iter()
            .map(String::as_str)
            .filter(|name| !BUNDLED_HELPERS.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(js_failed(format!(
                "transform needs runtime helpers: {}",
                missing.join(", ")
            )));
        }

        let prelude = Self::parse(allocator, HELPERS_PRELUDE, JsSource::Script)?;
        for (index, statement) in prelude.body.into_iter().enumerate() {
            program.body.insert(index, statement);
        }
        Ok(())
    }
}

fn js_failed(reason: impl Into<String>) -> BuildError {
    BuildError::JsTransformFailed {
        reason: reason.into(),
    }
}

fn first_error<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .first()
        .map_or_else(|| "unknown error".to_string(), ToString::to_string)
}

impl JsEngine for OxcEngine {
    fn downgrade(
        &self,
        code: &str,
        es_target: &str,
        force_all: bool,
        source: JsSource,
    ) -> Result<String> {
        let allocator = Allocator::default();
        let mut program = Self::parse(&allocator, code, source)?;
        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();

        let options = Self::transform_options(es_target, force_all)?;
        let path = match source {
            JsSource::Script => Path::new("script.js"),
            JsSource::Module => Path::new("module.mjs"),
        };
        let ret = Transformer::new(&allocator, path, &options).build_with_scoping(scoping, &mut program);
        if !ret.errors.is_empty() {
            return Err(js_failed(format!("transform: {}", first_error(&ret.errors))));
        }

        Self::bundle_helpers(&allocator, &mut program)?;
        Ok(Self::print(&program))
    }

    fn strip(&self, code: &str, source: JsSource) -> Result<String> {
        let allocator = Allocator::default();
        let program = Self::parse(&allocator, code, source)?;
        Ok(Self::print(&program))
    }

    fn obfuscate(&self, code: &str, table: &ObfuscationTable, source: JsSource) -> Result<String> {
        let allocator = Allocator::default();
        let program = Self::parse(&allocator, code, source)?;
        let mut ranges = EscapableRanges::default();
        ranges.visit_program(&program);

        let out = table.apply_within(code, &ranges.0);
        let check = Allocator::default();
        Self::parse(&check, &out, source)
            .map_err(|e| js_failed(format!("obfuscated output no longer parses: {e}")))?;
        Ok(out)
    }
}

/// Names read off the helpers global, in first-use order
#[derive(Default)]
struct HelperUses(Vec<String>);

impl<'a> Visit<'a> for HelperUses {
    fn visit_static_member_expression(&mut self, it: &StaticMemberExpression<'a>) {
        if let Expression::Identifier(object) = &it.object {
            let name = it.property.name.as_str();
            if object.name.as_str() == HELPERS_GLOBAL && !self.0.iter().any(|n| n == name) {
                self.0.push(name.to_string());
            }
        }
        walk::walk_static_member_expression(self, it);
    }
}

/// Source ranges where a unicode escape reads the same as the raw text
#[derive(Default)]
struct EscapableRanges(Vec<Range<usize>>);

impl EscapableRanges {
    fn push(&mut self, span: Span) {
        self.0.push(span.start as usize..span.end as usize);
    }
}

impl<'a> Visit<'a> for EscapableRanges {
    fn visit_identifier_name(&mut self, it: &IdentifierName<'a>) {
        self.push(it.span);
    }

    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        self.push(it.span);
    }

    fn visit_binding_identifier(&mut self, it: &BindingIdentifier<'a>) {
        self.push(it.span);
    }

    fn visit_label_identifier(&mut self, it: &LabelIdentifier<'a>) {
        self.push(it.span);
    }

    fn visit_private_identifier(&mut self, it: &PrivateIdentifier<'a>) {
        self.push(it.span);
    }

    fn visit_string_literal(&mut self, it: &StringLiteral<'a>) {
        self.push(it.span);
    }

    fn visit_reg_exp_literal(&mut self, it: &RegExpLiteral<'a>) {
        self.push(it.span);
    }

    fn visit_template_element(&mut self, it: &TemplateElement<'a>) {
        self.push(it.span);
    }

    // the tag sees the raw quasis, so they stay as written
    fn visit_tagged_template_expression(&mut self, it: &TaggedTemplateExpression<'a>) {
        self.visit_expression(&it.tag);
        for expression in &it.quasi.expressions {
            self.visit_expression(expression);
        }
    }
}

/// Pick the parse mode `code` is valid in, preferring a classic script
pub fn detect_source(engine: &dyn JsEngine, code: &str) -> JsSource {
    if engine.strip(code, JsSource::Script).is_err()
        && engine.strip(code, JsSource::Module).is_ok()
    {
        JsSource::Module
    } else {
        JsSource::Script
    }
}

/// Run the Script Transform for `profile`
///
/// Targets without a minimum browser only get [`strip_js`]. On engine failure
/// the original code is returned unchanged and is never obfuscated.
pub fn transform_js(
    engine: &dyn JsEngine,
    obfuscation: &ObfuscationTable,
    code: &str,
    profile: &TargetProfile,
    source: JsSource,
) -> Transformed {
    let out = downgrade_js(engine, code, profile, source);
    if out.fell_back() || !profile.obfuscate {
        return out;
    }
    obfuscate_js(engine, obfuscation, &out.code, source)
}

/// [`transform_js`] without the keyword obfuscation
pub fn downgrade_js(
    engine: &dyn JsEngine,
    code: &str,
    profile: &TargetProfile,
    source: JsSource,
) -> Transformed {
    let Some(min) = &profile.min_browser else {
        return strip_js(engine, code, source);
    };

    match engine.downgrade(code, &min.es_target, profile.force_all_transforms, source) {
        Ok(out) => Transformed::ok(out),
        Err(e) => {
            tracing::warn!(error = %e, target_id = %profile.id, "js engine failed, keeping original script");
            Transformed::fallback(code.to_string(), e.to_string())
        }
    }
}

/// Keyword obfuscation over already transformed code
///
/// Falls back when a forbidden substring sits in syntax the engine did not
/// lower; the escaped, still valid code is kept in that case.
pub fn obfuscate_js(
    engine: &dyn JsEngine,
    obfuscation: &ObfuscationTable,
    code: &str,
    source: JsSource,
) -> Transformed {
    match engine.obfuscate(code, obfuscation, source) {
        Ok(out) => {
            let left = obfuscation.remaining(&out);
            if left.is_empty() {
                Transformed::ok(out)
            } else {
                tracing::warn!(?left, "forbidden substrings left in unlowered syntax");
                let reason = format!("forbidden substrings left in syntax: {}", left.join(" "));
                Transformed::fallback(out, reason)
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "keyword obfuscation failed, keeping script unescaped");
            Transformed::fallback(code.to_string(), e.to_string())
        }
    }
}

/// Comment and whitespace stripping only; the original is kept on failure
pub fn strip_js(engine: &dyn JsEngine, code: &str, source: JsSource) -> Transformed {
    match engine.strip(code, source) {
        Ok(out) => Transformed::ok(out),
        Err(e) => {
            tracing::debug!(error = %e, "js strip failed, keeping original script");
            Transformed::fallback(code.to_string(), e.to_string())
        }
    }
}
