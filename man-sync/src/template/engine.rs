//! Clipper-style template engine: `{{path}}` and `{{path|filter|filter:arg}}`.
//!
//! Also accepts two shorthands found in older templates: the helper form
//! `{{filter path}}` and the section form `{{#path}}`, which joins a list with
//! the multi-value delimiter so list-typed frontmatter fields can split it.

use super::filters::{self, FilterRegistry};
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").unwrap());

/// Filter name implied by the `{{#path}}` section form
const SECTION_FILTER: &str = "multi";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCall {
    pub name: String,
    pub arg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub path: String,
    pub filters: Vec<FilterCall>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(String),
    Placeholder(Placeholder),
}

/// A template split into literal text and placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    tokens: Vec<Token>,
}

impl CompiledTemplate {
    pub fn parse(source: &str) -> Self {
        let mut tokens = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER_RE.captures_iter(source) {
            let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                tokens.push(Token::Text(source[last..whole.start()].to_string()));
            }
            tokens.push(Token::Placeholder(parse_placeholder(body.as_str())));
            last = whole.end();
        }

        if last < source.len() {
            tokens.push(Token::Text(source[last..].to_string()));
        }

        Self { tokens }
    }

    /// The only placeholder, when the template is one placeholder optionally
    /// surrounded by whitespace
    fn sole_placeholder(&self) -> Option<&Placeholder> {
        let mut found = None;
        for token in &self.tokens {
            match token {
                Token::Text(t) if t.trim().is_empty() => {}
                Token::Text(_) => return None,
                Token::Placeholder(p) if found.is_none() => found = Some(p),
                Token::Placeholder(_) => return None,
            }
        }
        found
    }

    pub fn render(&self, context: &Value, registry: &FilterRegistry) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Text(t) => out.push_str(t),
                Token::Placeholder(p) => out.push_str(&filters::to_text(&evaluate(p, context, registry))),
            }
        }
        out
    }

    /// Like [`render`](Self::render), but a template made of a single
    /// placeholder yields that placeholder's value with its type intact
    pub fn render_value(&self, context: &Value, registry: &FilterRegistry) -> Value {
        match self.sole_placeholder() {
            Some(p) => evaluate(p, context, registry),
            None => Value::String(self.render(context, registry)),
        }
    }
}

/// Removes one pair of matching wrapping quotes
fn unquote(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn parse_filter_call(part: &str) -> Option<FilterCall> {
    let (name, arg) = match part.split_once(':') {
        Some((name, arg)) => (name.trim(), Some(unquote(arg.trim()).to_string())),
        None => (part.trim(), None),
    };
    if name.is_empty() {
        return None;
    }
    Some(FilterCall {
        name: name.to_string(),
        arg,
    })
}

/// Parse one placeholder body: `title`, `genres|map:name|join:', '`,
/// `safename title` or `#genres`
pub fn parse_placeholder(body: &str) -> Placeholder {
    let trimmed = body.trim();

    let (head, chain) = match trimmed.split_once('|') {
        Some((head, chain)) => (head.trim(), Some(chain)),
        None => (trimmed, None),
    };

    let mut filters: Vec<FilterCall> = chain
        .map(|c| c.split('|').filter_map(parse_filter_call).collect())
        .unwrap_or_default();

    let words: Vec<&str> = head.split_whitespace().collect();
    let mut path = match words.as_slice() {
        [helper, path] if chain.is_none() => {
            filters.push(FilterCall {
                name: helper.to_string(),
                arg: None,
            });
            path.to_string()
        }
        _ => head.to_string(),
    };

    if let Some(section) = path.strip_prefix('#') {
        path = section.trim().to_string();
        filters.push(FilterCall {
            name: SECTION_FILTER.to_string(),
            arg: None,
        });
    }

    Placeholder { path, filters }
}

/// Dotted-path lookup; `None` when any segment is missing or a parent is null.
/// Numeric segments index into arrays. The empty path is the context itself.
pub fn resolve_path<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(context);
    }

    let mut current = context;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn evaluate(placeholder: &Placeholder, context: &Value, registry: &FilterRegistry) -> Value {
    let mut value = resolve_path(context, &placeholder.path).cloned().unwrap_or(Value::Null);
    for call in &placeholder.filters {
        value = registry.apply(&call.name, value, call.arg.as_deref());
    }
    value
}

/// Renders templates against JSON contexts, memoizing parsed templates
pub struct TemplateEngine {
    registry: FilterRegistry,
    cache: Mutex<HashMap<String, Arc<CompiledTemplate>>>,
}

impl TemplateEngine {
    pub fn new(registry: FilterRegistry) -> Self {
        Self {
            registry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn compile(&self, template: &str) -> Arc<CompiledTemplate> {
        let mut cache = self.cache.lock();
        if let Some(compiled) = cache.get(template) {
            return compiled.clone();
        }
        let compiled = Arc::new(CompiledTemplate::parse(template));
        cache.insert(template.to_string(), compiled.clone());
        compiled
    }

    /// Render to a string; never fails
    pub fn render(&self, template: &str, context: &Value) -> String {
        self.compile(template).render(context, &self.registry)
    }

    /// Render keeping the final value's type when the template is a single placeholder
    pub fn render_value(&self, template: &str, context: &Value) -> Value {
        self.compile(template).render_value(context, &self.registry)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new(FilterRegistry::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> TemplateEngine {
        TemplateEngine::default()
    }

    #[test]
    fn test_parse_placeholder_chain() {
        let p = parse_placeholder(" genres | map:name | join:', ' ");
        assert_eq!(p.path, "genres");
        assert_eq!(
            p.filters,
            vec![
                FilterCall { name: "map".into(), arg: Some("name".into()) },
                FilterCall { name: "join".into(), arg: Some(", ".into()) },
            ]
        );
    }

    #[test]
    fn test_parse_arg_splits_on_first_colon_only() {
        let p = parse_placeholder("url|link:https://anilist.co");
        assert_eq!(p.filters[0].arg.as_deref(), Some("https://anilist.co"));
    }

    #[test]
    fn test_parse_helper_and_section_forms() {
        let helper = parse_placeholder("safename title");
        assert_eq!(helper.path, "title");
        assert_eq!(helper.filters, vec![FilterCall { name: "safename".into(), arg: None }]);

        let section = parse_placeholder("#genres");
        assert_eq!(section.path, "genres");
        assert_eq!(section.filters, vec![FilterCall { name: "multi".into(), arg: None }]);

        let section_chain = parse_placeholder("#studios|map:name");
        assert_eq!(section_chain.path, "studios");
        assert_eq!(section_chain.filters.len(), 2);
        assert_eq!(section_chain.filters[1].name, "multi");
    }

    #[test]
    fn test_resolve_path() {
        let ctx = json!({ "media": { "title": { "romaji": "Mushishi" }, "tags": ["a", "b"] }, "none": null });
        assert_eq!(resolve_path(&ctx, "media.title.romaji"), Some(&json!("Mushishi")));
        assert_eq!(resolve_path(&ctx, "media.tags.1"), Some(&json!("b")));
        assert_eq!(resolve_path(&ctx, "media.nonexistent.field"), None);
        assert_eq!(resolve_path(&ctx, "none.deeper"), None);
        assert_eq!(resolve_path(&ctx, ""), Some(&ctx));
    }

    #[test]
    fn test_render_substitutes_and_keeps_text() {
        let ctx = json!({ "title": "Show A", "format": "TV", "id": 101 });
        assert_eq!(
            engine().render("{{safename title}} ({{capital format}}, {{id}}).md", &ctx),
            "Show A (Tv, 101).md"
        );
        assert_eq!(
            engine().render("{{title|safe_name}} ({{format|capitalize}}, {{id}}).md", &ctx),
            "Show A (Tv, 101).md"
        );
    }

    #[test]
    fn test_unresolvable_path_renders_empty() {
        let ctx = json!({ "media": {} });
        assert_eq!(engine().render("[{{media.nonexistent.field}}]", &ctx), "[]");
    }

    #[test]
    fn test_unknown_filter_is_noop() {
        let ctx = json!({ "title": "Monster" });
        assert_eq!(engine().render("{{title|sparkle|upper}}", &ctx), "MONSTER");
    }

    #[test]
    fn test_stringifies_arrays_and_objects() {
        let ctx = json!({ "genres": ["Action", "Drama"], "cover": { "large": "x" }, "score": 8.0 });
        let e = engine();
        assert_eq!(e.render("{{genres}}", &ctx), "Action, Drama");
        assert_eq!(e.render("{{cover}}", &ctx), "{\"large\":\"x\"}");
        assert_eq!(e.render("{{score}}/10", &ctx), "8/10");
    }

    #[test]
    fn test_render_value_preserves_type() {
        let ctx = json!({ "genres": ["Action", "Drama"] });
        let e = engine();
        assert_eq!(e.render_value("{{genres}}", &ctx), json!(["Action", "Drama"]));
        assert_eq!(e.render_value(" {{genres|first}} ", &ctx), json!("Action"));
        assert_eq!(e.render_value("{{genres}}!", &ctx), json!("Action, Drama!"));
        assert_eq!(e.render_value("{{#genres}}", &ctx), json!("Action:::Drama"));
        assert_eq!(e.render_value("plain", &ctx), json!("plain"));
    }

    #[test]
    fn test_first_last_match_array_ends() {
        let e = engine();
        let arrays = [json!([]), json!(["x"]), json!([3, 1, 2]), json!([null, "tail"])];
        for a in arrays {
            let ctx = json!({ "x": a.clone() });
            let items = a.as_array().unwrap();
            let expected_first = items.first().map(filters::to_text).unwrap_or_default();
            let expected_last = items.last().map(filters::to_text).unwrap_or_default();
            assert_eq!(e.render("{{x|first}}", &ctx), expected_first);
            assert_eq!(e.render("{{x|last}}", &ctx), expected_last);
        }
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let e = engine();
        let ctx = json!({ "title": "Kaiba", "genres": ["Sci-Fi"], "date": { "year": 2008, "month": 4, "day": 9 } });
        let template = "{{title|upper}} {{genres|wikilink}} {{date|date}} {{missing|default:none}}";
        let once = e.render(template, &ctx);
        let twice = e.render(template, &ctx);
        assert_eq!(once, twice);
        assert_eq!(once, "KAIBA [[Sci-Fi]] 2008-04-09 none");
    }

    #[test]
    fn test_compile_is_cached() {
        let e = engine();
        let a = e.compile("{{id}}");
        let b = e.compile("{{id}}");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_unclosed_placeholder_is_literal() {
        let ctx = json!({ "title": "X" });
        assert_eq!(engine().render("{{title", &ctx), "{{title");
    }
}
