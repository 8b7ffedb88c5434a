//! `[api_products]` directive expansion.
//!
//! Attributes are `key="value"`, `key='value'` or `key=value`. Only `limit`
//! is understood; unknown attributes are ignored.

use std::collections::HashMap;

use super::RenderError;
use super::grid::{GridOptions, GridRenderer};

/// Directive name.
pub const TAG: &str = "api_products";

/// Per-request rendering state.
///
/// Records whether the page being rendered contains a grid, so the layout
/// links the grid stylesheet only where it is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderContext {
    pub has_grid: bool,
}

impl RenderContext {
    #[must_use]
    pub const fn new() -> Self {
        Self { has_grid: false }
    }

    /// Note that the current view contains a grid.
    pub const fn mark_grid(&mut self) {
        self.has_grid = true;
    }
}

/// A directive located in page content.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Directive {
    start: usize,
    end: usize,
    attributes: HashMap<String, String>,
}

/// Whether `content` contains at least one directive.
#[must_use]
pub fn contains_directive(content: &str) -> bool {
    find_directive(content, 0).is_some()
}

/// Replace every directive in `content` with rendered grid markup.
///
/// # Errors
///
/// Returns `RenderError` if a grid fails to render.
pub async fn expand(
    content: &str,
    renderer: &GridRenderer,
    ctx: &mut RenderContext,
) -> Result<String, RenderError> {
    let mut output = String::with_capacity(content.len());
    let mut cursor = 0;

    while let Some(directive) = find_directive(content, cursor) {
        output.push_str(content.get(cursor..directive.start).unwrap_or_default());

        let options = GridOptions::from_limit(directive.attributes.get("limit").map(String::as_str));
        output.push_str(&renderer.render(&options).await?);
        ctx.mark_grid();

        cursor = directive.end;
    }

    output.push_str(content.get(cursor..).unwrap_or_default());
    Ok(output)
}

/// Find the next directive at or after byte offset `from`.
fn find_directive(content: &str, from: usize) -> Option<Directive> {
    let opener = format!("[{TAG}");
    let mut search = from;

    loop {
        let rest = content.get(search..)?;
        let start = search + rest.find(&opener)?;
        let after_name = start + opener.len();
        let tail = content.get(after_name..)?;

        // `[api_productsX` is a different tag.
        let boundary = tail.chars().next();
        if !matches!(boundary, Some(c) if c == ']' || c == '/' || c.is_whitespace()) {
            search = after_name;
            continue;
        }

        let close = tail.find(']')?;
        let inner = tail.get(..close)?.trim_end().trim_end_matches('/');

        return Some(Directive {
            start,
            end: after_name + close + 1,
            attributes: parse_attributes(inner),
        });
    }
}

/// Parse `key="value" key='value' key=value` pairs. Keys are lowercased.
#[must_use]
pub fn parse_attributes(input: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| !c.is_whitespace() && *c != '=') {
            key.push(c);
        }
        if key.is_empty() {
            if chars.next().is_none() {
                break;
            }
            continue;
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.next_if_eq(&'=').is_none() {
            // Bare flag; keep it so callers can see it was present.
            attributes.insert(key.to_lowercase(), String::new());
            continue;
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        match chars.peek().copied() {
            Some(quote @ ('"' | '\'')) => {
                chars.next();
                for c in chars.by_ref() {
                    if c == quote {
                        break;
                    }
                    value.push(c);
                }
            }
            _ => {
                while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                    value.push(c);
                }
            }
        }

        attributes.insert(key.to_lowercase(), value);
    }

    attributes
}
