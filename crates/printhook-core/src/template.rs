//! `@reference` resolution for hook templates.
//!
//! A reference is `@` followed by a dotted path into the [`Context`]. In free
//! text a reference ends at the next space; in URLs it also ends at `/`, `?`
//! and `#` so it can stand for a single path segment or query value.
//!
//! When a reference is the whole field, the field takes the referenced value
//! with its JSON type intact (`"@job"` becomes the job object). Otherwise the
//! value's string form is spliced into the surrounding text and the result is
//! scanned again, so references carried inside context values resolve too.
//! Missing paths resolve to the empty string.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::context::Context;

/// Upper bound on references in a single scan of a template field.
pub const MAX_REFERENCES_PER_FIELD: usize = 256;

/// Upper bound on scans of one field while inserted values still carry `@`.
pub const MAX_RESOLVE_PASSES: usize = 16;

const TEXT_DELIMITERS: &[char] = &[' '];
const URL_DELIMITERS: &[char] = &[' ', '/', '?', '#'];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("template field contains more than {limit} references")]
    TooManyReferences { limit: usize },
    #[error("template field still contains references after {limit} passes")]
    TooManyPasses { limit: usize },
}

/// Resolve every string inside `node`, returning a new value of the same shape.
pub fn resolve(node: &Value, context: &Context) -> Result<Value, ResolveError> {
    match node {
        Value::Object(map) => {
            let mut resolved = Map::with_capacity(map.len());
            for (key, value) in map {
                resolved.insert(key.clone(), resolve(value, context)?);
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| resolve(item, context))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::String(text) => resolve_field(text, context, TEXT_DELIMITERS),
        other => Ok(other.clone()),
    }
}

/// Resolve a free-text template to its string form.
pub fn resolve_text(template: &str, context: &Context) -> Result<String, ResolveError> {
    resolve_field(template, context, TEXT_DELIMITERS).map(|value| display_value(&value))
}

/// Resolve a URL template, keeping `/`, `?` and `#` out of reference names.
pub fn resolve_url(template: &str, context: &Context) -> Result<String, ResolveError> {
    resolve_field(template, context, URL_DELIMITERS).map(|value| display_value(&value))
}

/// String form used when a value is spliced into surrounding text.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        structured => structured.to_string(),
    }
}

fn resolve_field(
    text: &str,
    context: &Context,
    delimiters: &[char],
) -> Result<Value, ResolveError> {
    let mut current = text.to_string();

    for _ in 0..MAX_RESOLVE_PASSES {
        match resolve_pass(&current, context, delimiters)? {
            Value::String(rendered) if rendered.contains('@') => current = rendered,
            resolved => return Ok(resolved),
        }
    }

    Err(ResolveError::TooManyPasses {
        limit: MAX_RESOLVE_PASSES,
    })
}

/// One left-to-right scan replacing every reference in `text`.
fn resolve_pass(text: &str, context: &Context, delimiters: &[char]) -> Result<Value, ResolveError> {
    let Some(first) = text.find('@') else {
        return Ok(Value::String(text.to_string()));
    };

    if first == 0 && token_end(text, first, delimiters) == text.len() {
        return Ok(lookup_or_empty(&text[1..], context));
    }

    let mut rendered = String::with_capacity(text.len());
    let mut rest = text;
    let mut references = 0;

    while let Some(start) = rest.find('@') {
        references += 1;
        if references > MAX_REFERENCES_PER_FIELD {
            return Err(ResolveError::TooManyReferences {
                limit: MAX_REFERENCES_PER_FIELD,
            });
        }

        let end = token_end(rest, start, delimiters);
        rendered.push_str(&rest[..start]);
        rendered.push_str(&display_value(&lookup_or_empty(
            &rest[start + 1..end],
            context,
        )));
        rest = &rest[end..];
    }
    rendered.push_str(rest);

    Ok(Value::String(rendered))
}

fn token_end(text: &str, start: usize, delimiters: &[char]) -> usize {
    let body = start + 1;
    text[body..]
        .find(delimiters)
        .map_or(text.len(), |offset| body + offset)
}

fn lookup_or_empty(path: &str, context: &Context) -> Value {
    context
        .lookup(path)
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> Context {
        let Value::Object(map) = json!({
            "id": 42,
            "topic": "Print Done",
            "deviceIdentifier": "printer-1",
            "job": { "file": { "name": "cube.gcode", "origin": "local" }, "estimatedPrintTime": 3600 },
            "popup": true,
            "email": "ops@example.com",
            "nothing": null
        }) else {
            unreachable!()
        };
        Context::from(map)
    }

    #[test]
    fn test_whole_field_keeps_native_type() {
        let ctx = context();
        let resolved = resolve(&json!({ "job": "@job", "id": "@id", "popup": "@popup" }), &ctx)
            .expect("resolve");

        assert_eq!(resolved["job"]["file"]["name"], "cube.gcode");
        assert_eq!(resolved["id"], json!(42));
        assert_eq!(resolved["popup"], json!(true));
    }

    #[test]
    fn test_substring_references_use_string_form() {
        let ctx = context();
        let resolved = resolve_text("@topic on @deviceIdentifier file @job.file.name", &ctx)
            .expect("resolve");
        assert_eq!(resolved, "Print Done on printer-1 file cube.gcode");

        let resolved = resolve_text("id=@id popup=@popup", &ctx).expect("resolve");
        assert_eq!(resolved, "id=42 popup=true");
    }

    #[test]
    fn test_embedded_structure_is_compact_json() {
        let ctx = context();
        let resolved = resolve_text("file: @job.file", &ctx).expect("resolve");
        assert_eq!(resolved, r#"file: {"name":"cube.gcode","origin":"local"}"#);
    }

    #[test]
    fn test_missing_references_become_empty() {
        let ctx = context();
        assert_eq!(resolve(&json!("@missing"), &ctx).expect("resolve"), json!(""));
        assert_eq!(resolve(&json!("@job.file.owner"), &ctx).expect("resolve"), json!(""));
        assert_eq!(resolve_text("a @missing b", &ctx).expect("resolve"), "a  b");
        assert_eq!(resolve_text("null=@nothing", &ctx).expect("resolve"), "null=");
    }

    #[test]
    fn test_nested_structures_resolve_recursively() {
        let ctx = context();
        let template = json!({
            "blocks": [
                { "text": "@topic" },
                ["@id", 7, false, null]
            ],
            "count": 3
        });

        let resolved = resolve(&template, &ctx).expect("resolve");
        assert_eq!(
            resolved,
            json!({
                "blocks": [
                    { "text": "Print Done" },
                    [42, 7, false, null]
                ],
                "count": 3
            })
        );
        // The stored template is left untouched.
        assert_eq!(template["blocks"][0]["text"], "@topic");
    }

    #[test]
    fn test_fully_resolvable_template_leaves_no_references() {
        let ctx = context();
        let resolved = resolve(
            &json!({ "a": "@topic @deviceIdentifier", "b": ["x @id y", "@job.file.origin"] }),
            &ctx,
        )
        .expect("resolve");

        assert!(!resolved.to_string().contains('@'));
    }

    #[test]
    fn test_url_keeps_path_and_query_delimiters() {
        let ctx = context();
        assert_eq!(
            resolve_url("http://host/@id/status?x=1", &ctx).expect("resolve"),
            "http://host/42/status?x=1"
        );
        assert_eq!(
            resolve_url("http://host/items?id=@id#@topic", &ctx).expect("resolve"),
            "http://host/items?id=42#Print Done"
        );
        assert_eq!(
            resolve_url("https://host/@job.file.name", &ctx).expect("resolve"),
            "https://host/cube.gcode"
        );
    }

    #[test]
    fn test_text_fields_do_not_stop_at_slash() {
        let ctx = context();
        assert_eq!(resolve_text("@id/status", &ctx).expect("resolve"), "");
    }

    #[test]
    fn test_whole_url_reference() {
        let mut ctx = context();
        ctx.insert("target", "http://example.com/hook");
        assert_eq!(
            resolve_url("@target", &ctx).expect("resolve"),
            "http://example.com/hook"
        );
    }

    #[test]
    fn test_references_inside_values_are_resolved() {
        let mut ctx = context();
        ctx.insert("note", "state: @topic");
        ctx.insert("alias", "@job");
        ctx.insert("chain", "@note on @deviceIdentifier");

        assert_eq!(
            resolve_text("msg @note end", &ctx).expect("resolve"),
            "msg state: Print Done end"
        );
        assert_eq!(
            resolve_text("@chain", &ctx).expect("resolve"),
            "state: Print Done on printer-1"
        );
        assert_eq!(
            resolve(&json!("@alias"), &ctx).expect("resolve")["file"]["name"],
            "cube.gcode"
        );
    }

    #[test]
    fn test_unresolvable_at_sign_in_value_is_dropped() {
        let ctx = context();
        assert_eq!(
            resolve_text("contact @email now", &ctx).expect("resolve"),
            "contact ops now"
        );
    }

    #[test]
    fn test_self_referencing_value_hits_pass_limit() {
        let mut ctx = context();
        ctx.insert("loop", "again @loop");

        assert_eq!(
            resolve_text("start @loop", &ctx),
            Err(ResolveError::TooManyPasses {
                limit: MAX_RESOLVE_PASSES
            })
        );
        assert!(resolve(&json!({ "a": ["@loop"] }), &ctx).is_err());
    }

    #[test]
    fn test_reference_limit_is_enforced() {
        let ctx = context();
        let template = "@id ".repeat(MAX_REFERENCES_PER_FIELD + 1);

        assert_eq!(
            resolve_text(&template, &ctx),
            Err(ResolveError::TooManyReferences {
                limit: MAX_REFERENCES_PER_FIELD
            })
        );
        assert!(resolve_text(&"@id ".repeat(MAX_REFERENCES_PER_FIELD), &ctx).is_ok());
    }

    #[test]
    fn test_text_without_references_is_unchanged() {
        let ctx = context();
        assert_eq!(resolve(&json!("plain text"), &ctx).expect("resolve"), json!("plain text"));
        assert_eq!(resolve(&json!(12.5), &ctx).expect("resolve"), json!(12.5));
    }
}
