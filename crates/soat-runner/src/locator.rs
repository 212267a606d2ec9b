//! Declarative descriptions of how to find a node.

use serde::Serialize;
use std::fmt;

/// How to find zero or more nodes in the live DOM.
///
/// A locator is a value: resolving it twice may yield different nodes as the
/// application re-renders, but the locator itself never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Locator {
    /// Element with this `id`.
    Id { id: String },
    /// CSS selector.
    Css { selector: String },
    /// Element whose own text matches, optionally restricted to a CSS scope.
    Text {
        text: String,
        exact: bool,
        scope: Option<String>,
    },
    /// Nearest ancestor matching `ancestor` of every `inner` match.
    Closest {
        inner: Box<Locator>,
        ancestor: String,
    },
    /// Union of the parts, in order, without duplicates.
    Any { parts: Vec<Locator> },
}

impl Locator {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id { id: id.into() }
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css {
            selector: selector.into(),
        }
    }

    /// Exact (case-sensitive) text match.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: true,
            scope: None,
        }
    }

    /// Case-insensitive substring match.
    pub fn contains(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: false,
            scope: None,
        }
    }

    /// Restrict a text locator to nodes matching `scope`. No-op for other kinds.
    pub fn within(self, scope: impl Into<String>) -> Self {
        match self {
            Self::Text { text, exact, .. } => Self::Text {
                text,
                exact,
                scope: Some(scope.into()),
            },
            other => other,
        }
    }

    /// Nearest ancestor (or self) matching the CSS selector.
    pub fn closest(self, ancestor: impl Into<String>) -> Self {
        Self::Closest {
            inner: Box::new(self),
            ancestor: ancestor.into(),
        }
    }

    pub fn any(parts: impl IntoIterator<Item = Locator>) -> Self {
        Self::Any {
            parts: parts.into_iter().collect(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id { id } => write!(f, "id={}", id),
            Self::Css { selector } => write!(f, "css={}", selector),
            Self::Text { text, exact, scope } => {
                let op = if *exact { "=" } else { "~" };
                write!(f, "text{}{:?}", op, text)?;
                if let Some(scope) = scope {
                    write!(f, " in {}", scope)?;
                }
                Ok(())
            }
            Self::Closest { inner, ancestor } => write!(f, "closest({}) of {}", ancestor, inner),
            Self::Any { parts } => {
                f.write_str("any(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", part)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Collapse runs of whitespace and trim.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text comparison used by [`Locator::Text`].
///
/// `own` is compared after normalization. Exact matching is case-sensitive,
/// substring matching is not.
pub fn text_matches(own: &str, wanted: &str, exact: bool) -> bool {
    let own = normalize(own);
    let wanted = normalize(wanted);
    if exact {
        own == wanted
    } else {
        own.to_lowercase().contains(&wanted.to_lowercase())
    }
}
