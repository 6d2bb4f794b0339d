use regex::Regex;
use std::borrow::Cow;
use std::ops::Range;

pub const PLACEHOLDER: &str = "[REDACTED]";

#[derive(Debug, Clone)]
struct Rule {
    name: String,
    re: Regex,
    replacement: String,
    /// Spans several lines; see [`Redactor::block_spans`].
    block: bool,
}

/// Scrubs secret-shaped substrings from text before it leaves the process.
#[derive(Debug, Clone)]
pub struct Redactor {
    rules: Vec<Rule>,
}

impl Redactor {
    /// Built-in rules followed by `extra` patterns whose whole match is replaced.
    pub fn new(extra: &[String]) -> Result<Self, regex::Error> {
        let builtin: [(&str, &str, String, bool); 4] = [
            (
                "private_key_block",
                r"(?s)(-----BEGIN [A-Z0-9 ]*PRIVATE KEY-----).*?(-----END [A-Z0-9 ]*PRIVATE KEY-----|\z)",
                format!("${{1}}\n{PLACEHOLDER}\n${{2}}"),
                true,
            ),
            (
                "secret_access_key",
                r#"(?i)((?:aws_)?secret_access_key["']?\s*[=:]\s*)["']?[A-Za-z0-9/+=]+["']?"#,
                format!("${{1}}{PLACEHOLDER}"),
                false,
            ),
            (
                "api_key",
                r#"(?i)((?:x-)?api[_-]?key["']?\s*[=:]\s*)["']?[^\s"',;]+["']?"#,
                format!("${{1}}{PLACEHOLDER}"),
                false,
            ),
            (
                "bearer_token",
                r"(?i)(authorization\s*[=:]\s*bearer\s+)[A-Za-z0-9\-._~+/]+=*",
                format!("${{1}}{PLACEHOLDER}"),
                false,
            ),
        ];

        let mut rules = Vec::with_capacity(builtin.len() + extra.len());
        for (name, pattern, replacement, block) in builtin {
            rules.push(Rule {
                name: name.to_string(),
                re: Regex::new(pattern)?,
                replacement,
                block,
            });
        }
        for (i, pattern) in extra.iter().enumerate() {
            rules.push(Rule {
                name: format!("extra_{i}"),
                re: Regex::new(pattern)?,
                replacement: PLACEHOLDER.to_string(),
                block: false,
            });
        }
        Ok(Self { rules })
    }

    /// Returns the input unchanged (borrowed) when nothing matches.
    pub fn redact<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut out = Cow::Borrowed(text);
        for rule in &self.rules {
            let replaced = match rule.re.replace_all(&out, rule.replacement.as_str()) {
                Cow::Owned(s) => Some(s),
                Cow::Borrowed(_) => None,
            };
            if let Some(s) = replaced {
                tracing::trace!(rule = %rule.name, "redacted");
                out = Cow::Owned(s);
            }
        }
        out
    }

    /// Byte ranges of multi-line secrets (key blocks). Line-oriented callers use these
    /// because a single line of a key body carries no marker of its own.
    pub fn block_spans(&self, text: &str) -> Vec<Range<usize>> {
        self.rules
            .iter()
            .filter(|r| r.block)
            .flat_map(|r| r.re.find_iter(text).map(|m| m.range()))
            .collect()
    }
}
