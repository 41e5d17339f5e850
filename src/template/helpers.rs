// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Helpers registered on every template.
//!
//! | helper | usage |
//! |---|---|
//! | `include_file` | `{{include_file "path"}}` |
//! | `include_file_region` | `{{include_file_region "path" "region marker"}}` |
//! | `include_template` | `{{include_template "path" data}}` (data defaults to the current context) |
//! | `indent` | `{{indent 4 text}}` indents every line |
//! | `nindent` | `{{nindent 4 text}}` indents every line but the first |
//! | `unindent` | `{{unindent 4 text}}` strips up to 4 leading whitespace characters per line |
//! | `prefix` | `{{prefix "// " text}}` prepends to every line |
//!
//! Every line the text helpers produce ends with a newline.

use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext, RenderError};
use std::fs;

pub(crate) fn register(registry: &mut Handlebars<'static>) {
    registry.register_helper("include_file", Box::new(include_file_helper));
    registry.register_helper("include_file_region", Box::new(include_file_region_helper));
    registry.register_helper("include_template", Box::new(include_template_helper));
    registry.register_helper("indent", Box::new(indent_helper));
    registry.register_helper("nindent", Box::new(nindent_helper));
    registry.register_helper("unindent", Box::new(unindent_helper));
    registry.register_helper("prefix", Box::new(prefix_helper));
}

fn str_param<'a>(h: &'a Helper, index: usize) -> Result<&'a str, RenderError> {
    h.param(index)
        .and_then(|p| p.value().as_str())
        .ok_or_else(|| RenderError::new(format!("{}: parameter {} must be a string", h.name(), index)))
}

fn count_param(h: &Helper, index: usize) -> Result<usize, RenderError> {
    h.param(index)
        .and_then(|p| p.value().as_u64())
        .map(|n| n as usize)
        .ok_or_else(|| RenderError::new(format!("{}: parameter {} must be a count", h.name(), index)))
}

fn include_file_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let path = str_param(h, 0)?;
    let text = fs::read_to_string(path)
        .map_err(|e| RenderError::new(format!("unable to read file {:?}: {}", path, e)))?;
    out.write(&text)?;
    Ok(())
}

fn include_file_region_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let (path, region) = (str_param(h, 0)?, str_param(h, 1)?);
    let text = fs::read_to_string(path)
        .map_err(|e| RenderError::new(format!("unable to open file {:?}: {}", path, e)))?;
    out.write(&extract_region(&text, region))?;
    Ok(())
}

fn include_template_helper(
    h: &Helper,
    _: &Handlebars,
    ctx: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let path = str_param(h, 0)?;
    let data = h
        .param(1)
        .map(|p| p.value().clone())
        .unwrap_or_else(|| ctx.data().clone());
    let rendered = super::parse_file(path)
        .and_then(|template| template.render(&data))
        .map_err(|e| RenderError::new(e.to_string()))?;
    out.write(&rendered)?;
    Ok(())
}

fn indent_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    out.write(&indent(str_param(h, 1)?, count_param(h, 0)?, false))?;
    Ok(())
}

fn nindent_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    out.write(&indent(str_param(h, 1)?, count_param(h, 0)?, true))?;
    Ok(())
}

fn unindent_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    out.write(&unindent(str_param(h, 1)?, count_param(h, 0)?))?;
    Ok(())
}

fn prefix_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    out.write(&prefix(str_param(h, 1)?, str_param(h, 0)?))?;
    Ok(())
}

/// Lines strictly between the first two lines containing `region`.
///
/// Without a closing marker everything after the opening one is returned.
pub(crate) fn extract_region(text: &str, region: &str) -> String {
    let mut out = String::new();
    let mut inside = false;
    for line in text.lines() {
        if line.contains(region) {
            if inside {
                break;
            }
            inside = true;
            continue;
        }
        if inside {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

pub(crate) fn indent(text: &str, n: usize, skip_first: bool) -> String {
    let pad = " ".repeat(n);
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.lines().enumerate() {
        if i != 0 || !skip_first {
            out.push_str(&pad);
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Strip up to `n` leading whitespace characters from every line
pub(crate) fn unindent(text: &str, n: usize) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let start = line
            .char_indices()
            .find(|&(i, c)| !c.is_whitespace() || i >= n)
            .map(|(i, _)| i);
        if let Some(start) = start {
            out.push_str(&line[start..]);
        }
        out.push('\n');
    }
    out
}

pub(crate) fn prefix(text: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        out.push_str(prefix);
        out.push_str(line);
        out.push('\n');
    }
    out
}
