//! Built-in transform capabilities.

use std::io::{Cursor, Write};
use std::process::{Command, Stdio};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::ImageFormat;
use serde_json::Value;

use super::minify::{default_browsers, minify_css, minify_js, prefix_css, version};
use super::{SourceFile, Transform, TransformContext, TransformError};

/// Minify CSS; unparsable input passes through unchanged.
pub struct CleanCss;

impl Transform for CleanCss {
    fn apply(
        &self,
        file: SourceFile,
        _options: &Value,
        _ctx: &TransformContext<'_>,
    ) -> Result<SourceFile, TransformError> {
        let Some(minified) = minify_css(file.text()?) else {
            crate::debug!("clean-css"; "could not parse {}, keeping source", file.path.display());
            return Ok(file);
        };
        Ok(SourceFile::new(file.path, minified))
    }
}

/// Add vendor prefixes.
///
/// `options.browsers` maps browser names to a minimum major version,
/// e.g. `{ "safari": 12, "chrome": 60 }`.
pub struct Autoprefixer;

impl Transform for Autoprefixer {
    fn apply(
        &self,
        file: SourceFile,
        options: &Value,
        _ctx: &TransformContext<'_>,
    ) -> Result<SourceFile, TransformError> {
        let browsers = options
            .get("browsers")
            .and_then(Value::as_object)
            .map(|list| {
                let mut browsers = lightningcss::targets::Browsers::default();
                for (name, major) in list {
                    let Some(major) = major.as_u64().and_then(|m| u32::try_from(m).ok()) else {
                        continue;
                    };
                    let slot = match name.as_str() {
                        "android" => &mut browsers.android,
                        "chrome" => &mut browsers.chrome,
                        "edge" => &mut browsers.edge,
                        "firefox" => &mut browsers.firefox,
                        "ie" => &mut browsers.ie,
                        "ios_saf" | "ios" => &mut browsers.ios_saf,
                        "opera" => &mut browsers.opera,
                        "safari" => &mut browsers.safari,
                        "samsung" => &mut browsers.samsung,
                        _ => continue,
                    };
                    *slot = Some(version(major));
                }
                browsers
            })
            .unwrap_or_else(default_browsers);

        let Some(prefixed) = prefix_css(file.text()?, browsers) else {
            crate::debug!("autoprefixer"; "could not parse {}, keeping source", file.path.display());
            return Ok(file);
        };
        Ok(SourceFile::new(file.path, prefixed))
    }
}

/// Minify JavaScript; unparsable input passes through unchanged.
///
/// Production only, see [`TransformKind::runs_in`](super::TransformKind::runs_in).
pub struct Uglify;

impl Transform for Uglify {
    fn apply(
        &self,
        file: SourceFile,
        _options: &Value,
        _ctx: &TransformContext<'_>,
    ) -> Result<SourceFile, TransformError> {
        let Some(minified) = minify_js(file.text()?) else {
            crate::debug!("uglify"; "could not parse {}, keeping source", file.path.display());
            return Ok(file);
        };
        Ok(SourceFile::new(file.path, minified))
    }
}

/// Compile Sass/SCSS through the `sass` executable.
///
/// `options.load_paths` (relative to the base directory) are forwarded as
/// `--load-path`. The output file takes a `.css` extension.
pub struct Sass;

impl Transform for Sass {
    fn apply(
        &self,
        file: SourceFile,
        options: &Value,
        ctx: &TransformContext<'_>,
    ) -> Result<SourceFile, TransformError> {
        let program = which::which("sass").map_err(|_| TransformError::MissingTool("sass"))?;

        let mut command = Command::new(program);
        command.arg("--stdin").arg("--no-source-map");
        if file.extension().as_deref() == Some("sass") {
            command.arg("--indented");
        }
        for load_path in options
            .get("load_paths")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
        {
            command.arg(format!("--load-path={}", ctx.base_dir.join(load_path).display()));
        }

        let failed = |message: String| TransformError::Failed {
            transform: "sass",
            path: file.path.clone(),
            message,
        };

        let mut child = command
            .current_dir(ctx.base_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failed(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&file.contents)
                .map_err(|e| failed(e.to_string()))?;
        }

        let output = child.wait_with_output().map_err(|e| failed(e.to_string()))?;
        if !output.status.success() {
            return Err(failed(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }

        let path = file.path.with_extension("css");
        Ok(SourceFile::new(path, output.stdout))
    }
}

/// Recompress raster images, keeping the original when it is already smaller.
/// Production only.
pub struct Imagemin;

impl Transform for Imagemin {
    fn apply(
        &self,
        file: SourceFile,
        _options: &Value,
        _ctx: &TransformContext<'_>,
    ) -> Result<SourceFile, TransformError> {
        let Some(recompressed) = recompress(&file.contents) else {
            return Ok(file);
        };
        if recompressed.len() >= file.contents.len() {
            return Ok(file);
        }
        crate::debug!("imagemin"; "{}: {} -> {} bytes", file.path.display(), file.contents.len(), recompressed.len());
        Ok(SourceFile::new(file.path, recompressed))
    }
}

fn recompress(bytes: &[u8]) -> Option<Vec<u8>> {
    let format = image::guess_format(bytes).ok()?;
    let img = image::load_from_memory_with_format(bytes, format).ok()?;
    let mut out = Cursor::new(Vec::new());
    match format {
        ImageFormat::Png => img
            .write_with_encoder(PngEncoder::new_with_quality(
                &mut out,
                CompressionType::Best,
                FilterType::Adaptive,
            ))
            .ok()?,
        ImageFormat::Jpeg => img
            .write_with_encoder(JpegEncoder::new_with_quality(&mut out, 82))
            .ok()?,
        ImageFormat::WebP => img
            .write_with_encoder(WebPEncoder::new_lossless(&mut out))
            .ok()?,
        _ => return None,
    }
    Some(out.into_inner())
}

/// Log every file passing through, under `options.title`. Skipped in
/// production.
pub struct DebugLog;

impl Transform for DebugLog {
    fn apply(
        &self,
        file: SourceFile,
        options: &Value,
        ctx: &TransformContext<'_>,
    ) -> Result<SourceFile, TransformError> {
        let title = options
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("debug");
        crate::log!(title; "{} {} ({} bytes)", ctx.asset, file.path.display(), file.contents.len());
        Ok(file)
    }
}
