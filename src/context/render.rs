//! Deferred-reference rendering
//!
//! Templated strings use an explicit reference syntax rather than a full
//! template language. Two forms are recognized:
//!
//! - `{{ ctx('dotted.path') }}`: a context lookup by dotted path
//! - `{{ name }}`: a caller-supplied variable; falls back to a context
//!   lookup when no variable with that name was provided
//!
//! Text without `{{ }}` markers passes through untouched.

use std::collections::HashMap;

use regex_lite::Regex;

use super::resolver::ContextError;

/// Matches both reference forms; group 1 is a ctx() path, group 2 a bare name.
const REFERENCE_PATTERN: &str =
    r"\{\{\s*(?:ctx\(\s*'([^']+)'\s*\)|([A-Za-z_][A-Za-z0-9_.]*))\s*\}\}";

/// Render `input`, substituting each reference.
///
/// `vars` is consulted first for bare names; anything else goes through
/// `lookup`, which resolves a dotted context path to its rendered string
/// form (and reports missing paths or cycles as errors).
pub fn render(
    input: &str,
    vars: &HashMap<String, String>,
    lookup: &mut dyn FnMut(&str) -> Result<String, ContextError>,
) -> Result<String, ContextError> {
    if !input.contains("{{") {
        return Ok(input.to_string());
    }

    // The pattern is a compile-time constant; a failure here is a bug.
    let re = Regex::new(REFERENCE_PATTERN).map_err(|e| ContextError::BadReference {
        text: input.to_string(),
        reason: e.to_string(),
    })?;

    let mut out = String::with_capacity(input.len());
    let mut last = 0;

    for caps in re.captures_iter(input) {
        let whole = caps.get(0).ok_or_else(|| ContextError::BadReference {
            text: input.to_string(),
            reason: "empty match".to_string(),
        })?;
        out.push_str(&input[last..whole.start()]);

        if let Some(path) = caps.get(1) {
            out.push_str(&lookup(path.as_str())?);
        } else if let Some(name) = caps.get(2) {
            match vars.get(name.as_str()) {
                Some(value) => out.push_str(value),
                None => out.push_str(&lookup(name.as_str())?),
            }
        }

        last = whole.end();
    }

    out.push_str(&input[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_lookup(path: &str) -> Result<String, ContextError> {
        Err(ContextError::BadPath(path.to_string()))
    }

    #[test]
    fn test_plain_text_passes_through() {
        let vars = HashMap::new();
        let out = render("no references here", &vars, &mut no_lookup).unwrap();
        assert_eq!(out, "no references here");
    }

    #[test]
    fn test_ctx_reference() {
        let vars = HashMap::new();
        let mut lookup = |path: &str| {
            assert_eq!(path, "django.project_name");
            Ok("acme".to_string())
        };
        let out = render("{{ ctx('django.project_name') }}.log", &vars, &mut lookup).unwrap();
        assert_eq!(out, "acme.log");
    }

    #[test]
    fn test_variable_reference() {
        let mut vars = HashMap::new();
        vars.insert("project_dir".to_string(), "/var/www/acme".to_string());
        let out = render("chdir = {{ project_dir }}", &vars, &mut no_lookup).unwrap();
        assert_eq!(out, "chdir = /var/www/acme");
    }

    #[test]
    fn test_bare_name_falls_back_to_lookup() {
        let vars = HashMap::new();
        let mut lookup = |path: &str| {
            assert_eq!(path, "stage");
            Ok("prod".to_string())
        };
        let out = render("deploying to {{ stage }}", &vars, &mut lookup).unwrap();
        assert_eq!(out, "deploying to prod");
    }

    #[test]
    fn test_multiple_references() {
        let mut vars = HashMap::new();
        vars.insert("user".to_string(), "www-data".to_string());
        let mut lookup = |_: &str| Ok("acme".to_string());
        let out = render("{{ user }}:{{ ctx('django.project_name') }}", &vars, &mut lookup).unwrap();
        assert_eq!(out, "www-data:acme");
    }

    #[test]
    fn test_missing_reference_is_an_error() {
        let vars = HashMap::new();
        let result = render("{{ ctx('missing.key') }}", &vars, &mut no_lookup);
        assert!(result.is_err());
    }

    #[test]
    fn test_whitespace_tolerant() {
        let vars = HashMap::new();
        let mut lookup = |_: &str| Ok("v".to_string());
        let out = render("{{ctx('a.b')}} {{  ctx( 'a.b' )  }}", &vars, &mut lookup).unwrap();
        assert_eq!(out, "v v");
    }
}
