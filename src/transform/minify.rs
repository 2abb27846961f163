//! Script and stylesheet rewriting.
//!
//! Uses oxc for JavaScript and lightningcss for CSS. Every function returns
//! `None` when the input does not parse, leaving the caller to pass the
//! original content through.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

/// Minify JavaScript source code.
///
/// Sources are parsed as CommonJS scripts: bundle modules and the loader
/// reference free `require`/`module`/`window` bindings.
pub fn minify_js(source: &str) -> Option<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if !ret.errors.is_empty() {
        return None;
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Some(code)
}

/// Minify CSS source code.
pub fn minify_css(source: &str) -> Option<String> {
    let mut stylesheet = StyleSheet::parse(source, ParserOptions::default()).ok()?;
    stylesheet.minify(MinifyOptions::default()).ok()?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .ok()?;
    Some(result.code)
}

/// Add vendor prefixes for the given browser targets, keeping formatting.
pub fn prefix_css(source: &str, browsers: Browsers) -> Option<String> {
    let targets = Targets::from(browsers);
    let mut stylesheet = StyleSheet::parse(source, ParserOptions::default()).ok()?;
    stylesheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .ok()?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: false,
            targets,
            ..PrinterOptions::default()
        })
        .ok()?;
    Some(result.code)
}

/// Default prefixing targets: browsers old enough to still need prefixes
/// for flexbox, transforms, and user-select.
pub fn default_browsers() -> Browsers {
    Browsers {
        chrome: Some(version(49)),
        firefox: Some(version(45)),
        safari: Some(version(9)),
        ios_saf: Some(version(9)),
        edge: Some(version(15)),
        ..Browsers::default()
    }
}

/// Encode a major browser version the way lightningcss expects (`major << 16`).
pub const fn version(major: u32) -> u32 {
    major << 16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_js_shrinks() {
        let source = "function add(first, second) {\n  return first + second;\n}\nmodule.exports = add;\n";
        let minified = minify_js(source).unwrap();
        assert!(minified.len() < source.len());
        assert!(minified.contains("module.exports"));
    }

    #[test]
    fn test_minify_js_rejects_invalid() {
        assert!(minify_js("function (").is_none());
    }

    #[test]
    fn test_minify_css() {
        let minified = minify_css("body {\n  color: red;\n}\n").unwrap();
        assert!(!minified.contains('\n'));
        assert!(minified.contains("body"));
    }

    #[test]
    fn test_prefix_css_adds_vendor_prefix() {
        let prefixed = prefix_css(".a { user-select: none; }", default_browsers()).unwrap();
        assert!(prefixed.contains("-webkit-user-select"));
    }
}
