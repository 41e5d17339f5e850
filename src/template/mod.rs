// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Text templates for generated files.
//!
//! Templates are handlebars with HTML escaping turned off and strict mode on,
//! so a missing variable fails the render instead of producing an empty
//! string. Every template gets the helpers in [`helpers`]; the `*_with`
//! constructors add caller helpers on top.
//!
//! ```no_run
//! use pipewright::template::{parse_text, write_file};
//!
//! # fn demo() -> Result<(), pipewright::errors::TemplateError> {
//! let template = parse_text("pub const VERSION: &str = \"{{version}}\";\n")?;
//! write_file("src/version.rs", None, &template, &serde_json::json!({ "version": "1.2.0" }))?;
//! # Ok(())
//! # }
//! ```

pub mod helpers;

use handlebars::{no_escape, Handlebars, HelperDef};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::errors::{FileAction, FileError, TemplateError};
use crate::observability::messages::template::{PartialOutputRemoved, TemplateWritten};
use crate::utils::files::apply_mode;

/// A helper supplied by the caller
pub type BoxedHelper = Box<dyn HelperDef + Send + Sync>;

/// A parsed template, ready to render
pub struct Template {
    name: String,
    registry: Handlebars<'static>,
}

impl Template {
    fn parse<I, S>(name: &str, text: &str, extra: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = (S, BoxedHelper)>,
        S: AsRef<str>,
    {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        registry.set_strict_mode(true);
        helpers::register(&mut registry);
        for (helper_name, helper) in extra {
            registry.register_helper(helper_name.as_ref(), helper);
        }
        registry
            .register_template_string(name, text)
            .map_err(|source| TemplateError::Parse {
                name: name.to_string(),
                source,
            })?;
        Ok(Self {
            name: name.to_string(),
            registry,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render<T: Serialize>(&self, data: &T) -> Result<String, TemplateError> {
        Ok(self.registry.render(&self.name, data)?)
    }
}

pub fn parse_text(text: &str) -> Result<Template, TemplateError> {
    parse_text_with(text, Vec::<(&str, BoxedHelper)>::new())
}

/// Parse `text`, registering `helpers` alongside the built-in ones.
///
/// A caller helper with a built-in's name replaces it.
pub fn parse_text_with<I, S>(text: &str, helpers: I) -> Result<Template, TemplateError>
where
    I: IntoIterator<Item = (S, BoxedHelper)>,
    S: AsRef<str>,
{
    Template::parse("text", text, helpers)
}

pub fn parse_file(path: impl AsRef<Path>) -> Result<Template, TemplateError> {
    parse_file_with(path, Vec::<(&str, BoxedHelper)>::new())
}

pub fn parse_file_with<I, S>(path: impl AsRef<Path>, helpers: I) -> Result<Template, TemplateError>
where
    I: IntoIterator<Item = (S, BoxedHelper)>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| TemplateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Template::parse(&path.to_string_lossy(), &text, helpers)
}

/// Render `template` with `data` into `target`, truncating it first.
///
/// `mode` sets the file's permissions after a successful render. When
/// rendering fails the partial file is removed.
pub fn write_file<T: Serialize>(
    target: impl AsRef<Path>,
    mode: Option<u32>,
    template: &Template,
    data: &T,
) -> Result<(), TemplateError> {
    let target = target.as_ref();
    let mut file = fs::File::create(target).map_err(|e| FileError::new(FileAction::Create, target, e))?;

    let rendered = template
        .registry
        .render_to_write(&template.name, data, &mut file);
    drop(file);
    if let Err(error) = rendered {
        let _ = fs::remove_file(target);
        tracing::warn!("{}", PartialOutputRemoved { target, error: &error });
        return Err(error.into());
    }

    if let Some(mode) = mode {
        let mut permissions = fs::metadata(target)
            .map_err(|e| FileError::new(FileAction::Stat, target, e))?
            .permissions();
        apply_mode(&mut permissions, mode);
        fs::set_permissions(target, permissions)
            .map_err(|e| FileError::new(FileAction::SetPermissions, target, e))?;
    }
    tracing::debug!("{}", TemplateWritten { target });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use handlebars::{Context, Helper, HelperResult, Output, RenderContext};
    use serde_json::json;
    use tempfile::TempDir;

    fn shout(
        h: &Helper,
        _: &Handlebars,
        _: &Context,
        _: &mut RenderContext,
        out: &mut dyn Output,
    ) -> HelperResult {
        let text = h.param(0).and_then(|p| p.value().as_str()).unwrap_or_default();
        out.write(&text.to_uppercase())?;
        Ok(())
    }

    #[test]
    fn test_render_without_html_escaping() {
        let template = parse_text("{{name}} <{{email}}> & co").unwrap();
        let out = template
            .render(&json!({ "name": "Ada", "email": "ada@example.com" }))
            .unwrap();
        assert_eq!(out, "Ada <ada@example.com> & co");
    }

    #[test]
    fn test_missing_variable_fails_render() {
        let template = parse_text("{{missing}}").unwrap();
        let err = template.render(&json!({})).unwrap_err();
        assert!(matches!(err, TemplateError::Render(_)));
    }

    #[test]
    fn test_caller_helpers_are_registered() {
        let helpers: Vec<(&str, BoxedHelper)> = vec![("shout", Box::new(shout))];
        let template = parse_text_with("{{shout word}}!", helpers).unwrap();
        assert_eq!(template.render(&json!({ "word": "go" })).unwrap(), "GO!");
    }

    #[test]
    fn test_mismatched_block_is_a_parse_error() {
        let err = parse_text("{{#if ready}}x{{/each}}").err().unwrap();
        assert!(matches!(err, TemplateError::Parse { ref name, .. } if name == "text"));
    }

    #[test]
    fn test_missing_template_file() {
        let dir = TempDir::new().unwrap();
        let err = parse_file(dir.path().join("absent.hbs")).err().unwrap();
        assert!(matches!(err, TemplateError::Read { .. }));
    }

    #[test]
    fn test_file_includes() {
        let dir = TempDir::new().unwrap();
        let notes = dir.path().join("notes.txt");
        let example = dir.path().join("example.rs");
        let partial = dir.path().join("partial.hbs");
        fs::write(&notes, "line one\nline two\n").unwrap();
        fs::write(&example, "fn main() {\n    // usage\n    run();\n    // usage\n}\n").unwrap();
        fs::write(&partial, "v{{version}}").unwrap();

        let template = parse_text(
            "{{include_file notes}}---\n{{unindent 4 (include_file_region example \"// usage\")}}{{include_template partial}}",
        )
        .unwrap();
        let out = template
            .render(&json!({
                "notes": notes,
                "example": example,
                "partial": partial,
                "version": "0.3.1",
            }))
            .unwrap();
        assert_eq!(out, "line one\nline two\n---\nrun();\nv0.3.1");
    }

    #[test]
    fn test_include_template_with_explicit_data() {
        let dir = TempDir::new().unwrap();
        let partial = dir.path().join("row.hbs");
        fs::write(&partial, "| {{name}} |").unwrap();

        let template = parse_text("{{#each rows}}{{include_template ../partial this}};{{/each}}").unwrap();
        let out = template
            .render(&json!({ "partial": partial, "rows": [{ "name": "a" }, { "name": "b" }] }))
            .unwrap();
        assert_eq!(out, "| a |;| b |;");
    }

    #[test]
    fn test_write_file_applies_mode() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("run.sh");
        fs::write(&target, "stale content that is longer than the new one").unwrap();

        let template = parse_text("#!/bin/sh\nexec {{cmd}}\n").unwrap();
        write_file(&target, Some(0o750), &template, &json!({ "cmd": "true" })).unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "#!/bin/sh\nexec true\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            assert_eq!(fs::metadata(&target).unwrap().permissions().mode() & 0o777, 0o750);
        }
    }

    #[test]
    fn test_write_file_removes_partial_output() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("generated.rs");
        let template = parse_text("// header\n{{include_file source}}").unwrap();

        let err = write_file(
            &target,
            None,
            &template,
            &json!({ "source": dir.path().join("absent.rs") }),
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::Render(_)));
        assert!(!target.exists());
    }

    #[test]
    fn test_write_file_into_missing_directory() {
        let dir = TempDir::new().unwrap();
        let template = parse_text("x").unwrap();
        let err = write_file(dir.path().join("no/such/dir.txt"), None, &template, &json!({})).unwrap_err();
        assert!(matches!(err, TemplateError::File(FileError { action: FileAction::Create, .. })));
    }
}
