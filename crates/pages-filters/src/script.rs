//! JavaScript down-levelling (swc preset-env) and minification (oxc).

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_syntax::es_target::ESTarget;
use swc_core::common::comments::SingleThreadedComments;
use swc_core::common::sync::Lrc;
use swc_core::common::{FileName, Globals, Mark, SourceMap, GLOBALS};
use swc_core::ecma::ast::EsVersion;
use swc_core::ecma::codegen::to_code_default;
use swc_core::ecma::parser::{parse_file_as_program, Syntax};
use swc_core::ecma::preset_env::{self, preset_env};
use swc_core::ecma::transforms::base::feature::FeatureFlag;
use swc_core::ecma::transforms::base::fixer::fixer;
use swc_core::ecma::transforms::base::helpers::{inject_helpers, Helpers, HELPERS};
use swc_core::ecma::transforms::base::hygiene::hygiene;
use swc_core::ecma::transforms::base::assumptions::Assumptions;
use swc_core::ecma::transforms::base::resolver;

use crate::traits::{Asset, Filter, FilterError};

/// Browserslist query scripts are down-levelled for. Resolves to ES5 syntax.
pub const DEFAULT_TARGETS: &str = "ie 11";

/// Transpiles modern JavaScript to ES5.
#[derive(Debug, Clone, Default)]
pub struct TranspileFilter;

impl Filter for TranspileFilter {
    fn name(&self) -> &'static str {
        "babel"
    }

    fn apply(&self, asset: Asset) -> Result<Vec<Asset>, FilterError> {
        let code = transpile(asset.text()?, &asset.path)
            .map_err(|e| FilterError::Script(format!("{}: {}", asset.path.display(), e)))?;
        Ok(vec![asset.with_contents(code)])
    }
}

/// Minifies JavaScript (compress and mangle).
#[derive(Debug, Clone, Default)]
pub struct JsMinifyFilter;

impl Filter for JsMinifyFilter {
    fn name(&self) -> &'static str {
        "uglify"
    }

    fn apply(&self, asset: Asset) -> Result<Vec<Asset>, FilterError> {
        let code = minify_js(asset.text()?)
            .map_err(|e| FilterError::Script(format!("{}: {}", asset.path.display(), e)))?;
        Ok(vec![asset.with_contents(code)])
    }
}

fn join_errors<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Transpile `source` for [`DEFAULT_TARGETS`].
///
/// Runs the preset-env passes with helpers inlined into the output, so the
/// result needs no runtime module.
pub fn transpile(source: &str, path: &Path) -> Result<String, String> {
    let env: preset_env::Config =
        serde_json::from_value(serde_json::json!({ "targets": DEFAULT_TARGETS }))
            .map_err(|e| format!("invalid targets '{}': {}", DEFAULT_TARGETS, e))?;

    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Real(path.to_path_buf()).into(), source.to_string());
    let comments = SingleThreadedComments::default();

    GLOBALS.set(&Globals::new(), || -> Result<String, String> {
        let mut recovered = Vec::new();
        let program = parse_file_as_program(
            &fm,
            Syntax::default(),
            EsVersion::latest(),
            Some(&comments),
            &mut recovered,
        )
        .map_err(|e| e.kind().msg().to_string())?;
        if let Some(error) = recovered.first() {
            return Err(error.kind().msg().to_string());
        }

        let unresolved_mark = Mark::new();
        let top_level_mark = Mark::new();
        let mut features = FeatureFlag::default();

        let program = HELPERS.set(&Helpers::new(false), || {
            program.apply((
                resolver(unresolved_mark, top_level_mark, false),
                preset_env(
                    unresolved_mark,
                    Some(comments.clone()),
                    env,
                    Assumptions::default(),
                    &mut features,
                ),
                inject_helpers(unresolved_mark),
                hygiene(),
                fixer(Some(&comments)),
            ))
        });

        Ok(to_code_default(cm.clone(), None, &program))
    })
}

/// Minify a script. Used directly for inline `<script>` blocks.
///
/// Sources are parsed as classic scripts first so top-level bindings stay
/// global; files using module syntax are retried as ES modules.
pub fn minify_js(source: &str) -> Result<String, String> {
    minify_as(source, SourceType::cjs()).or_else(|_| minify_as(source, SourceType::mjs()))
}

fn minify_as(source: &str, source_type: SourceType) -> Result<String, String> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, source_type).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        return Err(join_errors(&parsed.errors));
    }
    let mut program = parsed.program;

    // Compress for ES5 too, or folds like `Math.pow` -> `**` undo the transpile.
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions {
            target: ESTarget::ES5,
            ..CompressOptions::default()
        }),
    };
    let minified = Minifier::new(options).build(&allocator, &mut program);

    Ok(Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program)
        .code)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODERN: &str = r#"
const greet = (name = 'world') => `hello ${name}`;
let total = 2 ** 10;
class Counter {
  count = 0;
  inc() { this.count += 1; }
}
console.log(greet(), total, new Counter());
"#;

    fn assert_es5(code: &str) {
        for syntax in ["const ", "let ", "=>", "`", "**", "class Counter"] {
            assert!(!code.contains(syntax), "found `{syntax}` in output: {code}");
        }
    }

    #[test]
    fn lowers_exponent_operator() {
        let out = TranspileFilter
            .apply(Asset::new("src", "assets/scripts/app.js", b"const f = (a) => a ** 2;".to_vec()))
            .unwrap();

        let code = String::from_utf8(out[0].contents.clone()).unwrap();
        assert!(!code.contains("**"), "exponent operator should be lowered: {code}");
        assert!(code.contains("Math.pow"));
    }

    #[test]
    fn transpiles_modern_script_to_es5() {
        let code = transpile(MODERN, Path::new("app.js")).unwrap();

        assert_es5(&code);
        assert!(code.contains("var "));
        assert!(code.contains("function Counter"));
        assert!(code.contains("greet"));
    }

    #[test]
    fn reports_parse_errors() {
        let err = TranspileFilter
            .apply(Asset::new("src", "a.js", b"let = ;".to_vec()))
            .unwrap_err();
        assert!(matches!(err, FilterError::Script(_)));
    }

    #[test]
    fn minifies_whitespace_away() {
        let source = "function add(first, second) {\n    return first + second;\n}\nconsole.log(add(1, 2));\n";
        let code = minify_js(source).unwrap();

        assert!(code.len() < source.len());
        assert!(!code.contains("\n    "));
        assert!(code.contains("console.log"));
    }

    #[test]
    fn minifier_keeps_es5_syntax() {
        let source = "var square = function (value) {\n  return Math.pow(value, 2);\n};\nconsole.log('square: ' + square(3));\n";
        let code = minify_js(source).unwrap();

        assert!(code.contains("Math.pow"), "pow call folded: {code}");
        assert!(!code.contains("**"));
        assert!(!code.contains("`"));
        assert!(!code.contains("=>"));
    }

    #[test]
    fn transpiled_output_survives_minification() {
        let code = minify_js(&transpile(MODERN, Path::new("app.js")).unwrap()).unwrap();
        assert_es5(&code);
    }

    #[test]
    fn minifies_module_syntax() {
        let code = minify_js("export const answer = 40 + 2;\n").unwrap();
        assert!(code.contains("export"));
    }
}
