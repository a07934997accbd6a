use std::collections::BTreeMap;

use camino::Utf8PathBuf;

use crate::error::KiraError;

/// Named values substituted into `{name}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wildcards(BTreeMap<String, String>);

impl Wildcards {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl ToString) -> Self {
        self.0.insert(name.to_string(), value.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `name=value` pairs joined with commas, in key order.
    pub fn label(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn new(source: &str) -> Result<Self, KiraError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        name.push(inner);
                    }
                    let is_ident = !name.is_empty()
                        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                    if !closed || !is_ident {
                        return Err(KiraError::InvalidPattern(source.to_string()));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => return Err(KiraError::InvalidPattern(source.to_string())),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn placeholders(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Literal and placeholder pieces in order, used to build matchers.
    pub fn pieces(&self) -> impl Iterator<Item = Result<&str, &str>> {
        self.segments.iter().map(|segment| match segment {
            Segment::Literal(text) => Ok(text.as_str()),
            Segment::Placeholder(name) => Err(name.as_str()),
        })
    }

    pub fn render_string(&self, wildcards: &Wildcards) -> Result<String, KiraError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value =
                        wildcards
                            .get(name)
                            .ok_or_else(|| KiraError::UnresolvedWildcard {
                                template: self.source.clone(),
                                wildcard: name.clone(),
                            })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    pub fn render(&self, wildcards: &Wildcards) -> Result<Utf8PathBuf, KiraError> {
        self.render_string(wildcards).map(Utf8PathBuf::from)
    }
}

/// Renders a one-off template.
pub fn expand(template: &str, wildcards: &Wildcards) -> Result<Utf8PathBuf, KiraError> {
    PathTemplate::new(template)?.render(wildcards)
}
