//! Template filters: named value transforms used as `{{path|filter:arg}}`.
//!
//! Every filter is total: it never panics and falls back to an empty string
//! or to its unmodified input. Unknown filter names pass values through.

use chrono::{DateTime, Local, NaiveDate};
use regex::Regex;
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Reserved separator for multi-value strings destined for list-typed fields
pub const MULTI_VALUE_DELIMITER: &str = ":::";

/// Maximum length of a `safe_name` result, in characters
pub const SAFE_NAME_MAX_LEN: usize = 245;

/// Characters stripped by `safe_name` besides control characters
const UNSAFE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '#', '[', ']', '^'];

pub type FilterFn = Arc<dyn Fn(&Value, Option<&str>) -> Value + Send + Sync>;

/// Source of "now" for the `now` filter
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock; injected once at startup
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock frozen at a given instant
#[cfg(test)]
pub struct FixedClock(pub DateTime<Local>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// Immutable name → filter mapping. Extend it with [`FilterRegistry::register`]
/// before handing it to the engine.
#[derive(Clone)]
pub struct FilterRegistry {
    filters: HashMap<String, FilterFn>,
}

impl FilterRegistry {
    pub fn empty() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// All built-in filters except `now`, which needs a clock
    pub fn builtin() -> Self {
        Self::empty()
            .register("upper", upper)
            .register("lower", lower)
            .register("capitalize", capitalize)
            .register("title", title_case)
            .register("trim", trim)
            .register("snake", snake)
            .register("kebab", kebab)
            .register("safe_name", safe_name)
            .register("wikilink", wikilink)
            .register("link", link)
            .register("blockquote", blockquote)
            .register("list", bullet_list)
            .register("callout", callout)
            .register("strip_html", strip_html)
            .register("join", join)
            .register("lines", lines)
            .register("multi", multi)
            .register("map", map)
            .register("unique", unique)
            .register("default", default)
            .register("first", first)
            .register("last", last)
            .register("nth", nth)
            .register("length", length)
            .register("round", round)
            .register("date", date)
            .alias("safename", "safe_name")
            .alias("capital", "capitalize")
            .alias("uppercase", "upper")
            .alias("lowercase", "lower")
            .alias("titlecase", "title")
    }

    /// Register the `now` filter reading from `clock`
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        self.register("now", move |_value: &Value, arg: Option<&str>| {
            let pattern = arg.filter(|a| !a.is_empty()).unwrap_or("%Y-%m-%d");
            format_time(clock.now(), pattern)
        })
    }

    pub fn register<F>(mut self, name: &str, filter: F) -> Self
    where
        F: Fn(&Value, Option<&str>) -> Value + Send + Sync + 'static,
    {
        self.filters.insert(name.to_string(), Arc::new(filter));
        self
    }

    /// Make `alias` resolve to the filter currently registered as `target`
    pub fn alias(mut self, alias: &str, target: &str) -> Self {
        if let Some(filter) = self.filters.get(target).cloned() {
            self.filters.insert(alias.to_string(), filter);
        }
        self
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Apply `name` to `value`; unknown filters return the value unchanged
    pub fn apply(&self, name: &str, value: Value, arg: Option<&str>) -> Value {
        match self.filters.get(name) {
            Some(filter) => filter(&value, arg),
            None => {
                log::trace!("[TEMPLATE] Unknown filter '{}', passing value through", name);
                value
            }
        }
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ── Coercions ───────────────────────────────────────

/// String form used for substitution: null → "", arrays comma-joined,
/// objects as compact JSON
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_text(n),
        Value::Array(items) => items.iter().map(to_text).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Whole floats print without the fractional part (`8.0` → `8`)
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

/// Array view of a value: arrays as is, null as empty, anything else as one element
pub fn to_array(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn text(s: impl Into<String>) -> Value {
    Value::String(s.into())
}

fn join_with(value: &Value, separator: &str) -> Value {
    let parts: Vec<String> = to_array(value).iter().map(to_text).collect();
    text(parts.join(separator))
}

/// Allows `\n` and `\t` escapes in separator arguments
fn unescape(arg: &str) -> String {
    arg.replace("\\n", "\n").replace("\\t", "\t")
}

fn format_time(time: DateTime<Local>, pattern: &str) -> Value {
    use std::fmt::Write;

    let mut out = String::new();
    // An invalid strftime pattern makes Display fail instead of panicking here
    if write!(out, "{}", time.format(pattern)).is_err() {
        return text("");
    }
    text(out)
}

// ── Case ────────────────────────────────────────────

fn upper(value: &Value, _arg: Option<&str>) -> Value {
    text(to_text(value).to_uppercase())
}

fn lower(value: &Value, _arg: Option<&str>) -> Value {
    text(to_text(value).to_lowercase())
}

fn capitalize(value: &Value, _arg: Option<&str>) -> Value {
    let s = to_text(value);
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            let rest = chars.as_str().to_lowercase();
            text(format!("{}{}", first.to_uppercase().collect::<String>(), rest))
        }
        None => text(""),
    }
}

/// Uppercase the first letter of every word, leave the rest alone
fn title_case(value: &Value, _arg: Option<&str>) -> Value {
    let mut out = String::new();
    let mut at_word_start = true;
    for c in to_text(value).chars() {
        if c.is_alphanumeric() || c == '_' {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    text(out)
}

fn trim(value: &Value, _arg: Option<&str>) -> Value {
    text(to_text(value).trim())
}

fn identifier_case(value: &Value, separator: char) -> Value {
    let collapsed = to_text(value)
        .trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(&separator.to_string());
    text(
        collapsed
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect::<String>()
            .to_lowercase(),
    )
}

fn snake(value: &Value, _arg: Option<&str>) -> Value {
    identifier_case(value, '_')
}

fn kebab(value: &Value, _arg: Option<&str>) -> Value {
    identifier_case(value, '-')
}

// ── Names & links ───────────────────────────────────

/// File-system safe name: strips reserved characters, never starts with `.`,
/// at most [`SAFE_NAME_MAX_LEN`] characters, `Untitled` when nothing is left
pub fn sanitize_name(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_control() && !UNSAFE_NAME_CHARS.contains(c))
        .collect();
    let cleaned = cleaned.trim_start_matches(|c: char| c == '.' || c.is_whitespace());
    let truncated: String = cleaned.chars().take(SAFE_NAME_MAX_LEN).collect();
    let result = truncated.trim_end();

    if result.is_empty() {
        "Untitled".to_string()
    } else {
        result.to_string()
    }
}

fn safe_name(value: &Value, _arg: Option<&str>) -> Value {
    text(sanitize_name(&to_text(value)))
}

fn wikilink(value: &Value, _arg: Option<&str>) -> Value {
    let links: Vec<String> = to_array(value)
        .iter()
        .map(|item| to_text(item).trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|s| format!("[[{}]]", s))
        .collect();
    text(links.join(" "))
}

fn link(value: &Value, arg: Option<&str>) -> Value {
    let target = to_text(value);
    let target = target.trim();
    let label = arg.unwrap_or("").trim();
    if target.is_empty() || label.is_empty() {
        return text("");
    }
    text(format!("[{}]({})", label, target))
}

// ── Blocks ──────────────────────────────────────────

fn quote_lines(content: &str) -> String {
    content
        .lines()
        .map(|line| if line.is_empty() { ">".to_string() } else { format!("> {}", line) })
        .collect::<Vec<_>>()
        .join("\n")
}

fn blockquote(value: &Value, _arg: Option<&str>) -> Value {
    let content = to_text(value);
    let content = content.trim();
    if content.is_empty() {
        return text("");
    }
    text(quote_lines(content))
}

fn bullet_list(value: &Value, _arg: Option<&str>) -> Value {
    let items: Vec<String> = to_array(value).iter().map(|item| format!("- {}", to_text(item))).collect();
    text(items.join("\n"))
}

/// Split a `kind, title[, folded]` argument; tolerates `( ... )` and quotes
fn callout_args(arg: &str) -> Vec<String> {
    let inner = arg.trim();
    let inner = inner
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(inner);
    inner
        .split(',')
        .map(|part| part.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string())
        .collect()
}

/// `{{description|callout:summary,Synopsis}}` → Obsidian callout block
fn callout(value: &Value, arg: Option<&str>) -> Value {
    let args = callout_args(arg.unwrap_or(""));
    let kind = args.first().map(String::as_str).unwrap_or("");
    let title = args.get(1).map(String::as_str).unwrap_or("");
    let folded = args.get(2).is_some_and(|f| f.eq_ignore_ascii_case("true"));
    let content = to_text(value);
    let content = content.trim();

    if kind.is_empty() || title.is_empty() || content.is_empty() {
        return text("");
    }

    let fold = if folded { "-" } else { "" };
    text(format!("> [!{}]{} {}\n{}", kind, fold, title, quote_lines(content)))
}

static BREAK_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>\s*").unwrap());
static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// AniList descriptions carry light HTML (`<br>`, `<i>`, `<b>`)
fn strip_html(value: &Value, _arg: Option<&str>) -> Value {
    let s = to_text(value);
    let with_breaks = BREAK_TAG_RE.replace_all(&s, "\n");
    let stripped = HTML_TAG_RE.replace_all(&with_breaks, "");
    text(
        stripped
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#039;", "'")
            .trim(),
    )
}

// ── Arrays ──────────────────────────────────────────

fn join(value: &Value, arg: Option<&str>) -> Value {
    let separator = arg.map(unescape).unwrap_or_else(|| ", ".to_string());
    join_with(value, &separator)
}

fn lines(value: &Value, _arg: Option<&str>) -> Value {
    join_with(value, "\n")
}

fn multi(value: &Value, _arg: Option<&str>) -> Value {
    join_with(value, MULTI_VALUE_DELIMITER)
}

fn map(value: &Value, arg: Option<&str>) -> Value {
    let items = to_array(value);
    let Some(property) = arg.filter(|a| !a.is_empty()) else {
        return Value::Array(items);
    };
    Value::Array(
        items
            .into_iter()
            .map(|item| {
                let picked = item.as_object().and_then(|obj| obj.get(property)).cloned();
                picked.unwrap_or(item)
            })
            .collect(),
    )
}

fn unique(value: &Value, _arg: Option<&str>) -> Value {
    let mut seen: Vec<Value> = Vec::new();
    for item in to_array(value) {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    Value::Array(seen)
}

fn default(value: &Value, arg: Option<&str>) -> Value {
    if is_blank(value) {
        text(arg.unwrap_or(""))
    } else {
        value.clone()
    }
}

fn first(value: &Value, _arg: Option<&str>) -> Value {
    to_array(value).into_iter().next().unwrap_or_else(|| text(""))
}

fn last(value: &Value, _arg: Option<&str>) -> Value {
    to_array(value).pop().unwrap_or_else(|| text(""))
}

fn nth(value: &Value, arg: Option<&str>) -> Value {
    let index = match arg.map(str::trim).filter(|a| !a.is_empty()) {
        None => Some(0),
        Some(a) => a.parse::<usize>().ok(),
    };
    index
        .and_then(|i| to_array(value).into_iter().nth(i))
        .unwrap_or_else(|| text(""))
}

fn length(value: &Value, _arg: Option<&str>) -> Value {
    let len = match value {
        Value::Array(items) => items.len(),
        other => to_text(other).chars().count(),
    };
    Value::from(len)
}

// ── Numbers & dates ─────────────────────────────────

fn round(value: &Value, arg: Option<&str>) -> Value {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        other => to_text(other).trim().parse::<f64>().ok(),
    };
    let Some(number) = number.filter(|n| n.is_finite()) else {
        return text("");
    };
    let decimals = arg.and_then(|a| a.trim().parse::<usize>().ok()).unwrap_or(0);
    text(format!("{:.*}", decimals, number))
}

fn date_part(value: &Value, key: &str) -> Option<i64> {
    value.get(key)?.as_i64()
}

/// `{year, month, day}` → `YYYY-MM-DD`; an optional arg is a strftime pattern
fn date(value: &Value, arg: Option<&str>) -> Value {
    let (Some(year), Some(month), Some(day)) = (
        date_part(value, "year"),
        date_part(value, "month"),
        date_part(value, "day"),
    ) else {
        return text("");
    };

    match arg.map(str::trim).filter(|a| !a.is_empty()) {
        None => text(format!("{:04}-{:02}-{:02}", year, month, day)),
        Some(pattern) => {
            let parsed = i32::try_from(year).ok().and_then(|y| {
                NaiveDate::from_ymd_opt(y, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
            });
            match parsed {
                Some(d) => {
                    use std::fmt::Write;
                    let mut out = String::new();
                    if write!(out, "{}", d.format(pattern)).is_err() {
                        return text("");
                    }
                    text(out)
                }
                None => text(""),
            }
        }
    }
}
