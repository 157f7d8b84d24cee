//! Core data types shared by the server, the dispatcher and the client stub
//!
//! Arguments and results travel as JSON. Both sides use the same number
//! rendering so that `2` and `2.0` produce the same wire text and the same
//! cache key.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// 2^63: integral values below this magnitude are rendered without a fraction.
const INTEGER_RENDER_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Render a number the way it appears on the wire.
///
/// Integral values print as integers (`1024`), everything else uses the
/// shortest representation that round-trips (`5.196152422706632`).
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < INTEGER_RENDER_LIMIT {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn serialize_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    let value = *value;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < INTEGER_RENDER_LIMIT {
        serializer.serialize_i64(value as i64)
    } else {
        serializer.serialize_f64(value)
    }
}

/// A single request argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    /// Numeric argument (every number is carried as `f64`)
    Number(#[serde(serialize_with = "serialize_number")] f64),

    /// Free-text argument
    Text(String),
}

impl Arg {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Arg::Number(n) => Some(*n),
            Arg::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Arg::Text(s) => Some(s),
            Arg::Number(_) => None,
        }
    }

    /// Parse a command-line token: numbers become `Number`, anything else `Text`.
    pub fn from_token(token: &str) -> Self {
        match token.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Arg::Number(n),
            _ => Arg::Text(token.to_string()),
        }
    }
}

impl From<f64> for Arg {
    fn from(n: f64) -> Self {
        Arg::Number(n)
    }
}

impl From<i64> for Arg {
    fn from(n: i64) -> Self {
        Arg::Number(n as f64)
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Text(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Text(s)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Number(n) => write!(f, "{}", format_number(*n)),
            Arg::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// A headline record returned by `ultimas_noticias`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    #[serde(alias = "titulo")]
    pub title: String,
    pub link: String,
}

/// Element of a list result.
///
/// A list holding a single `Text` is a placeholder: the headline provider
/// reported "no results" or an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListItem {
    Headline(Headline),
    Text(String),
}

/// Result value of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpValue {
    Number(#[serde(serialize_with = "serialize_number")] f64),
    Text(String),
    List(Vec<ListItem>),
}

impl OpValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            OpValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OpValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// True for error-tagged text results (`"Erro: ..."`).
    pub fn is_error(&self) -> bool {
        matches!(self, OpValue::Text(s) if s.starts_with("Erro"))
    }

    /// True for the one-element placeholder list of the headline operation.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, OpValue::List(items) if items.len() == 1 && matches!(items[0], ListItem::Text(_)))
    }

    pub fn headlines(&self) -> Vec<&Headline> {
        match self {
            OpValue::List(items) => items
                .iter()
                .filter_map(|item| match item {
                    ListItem::Headline(h) => Some(h),
                    ListItem::Text(_) => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for OpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpValue::Number(n) => write!(f, "{}", format_number(*n)),
            OpValue::Text(s) => write!(f, "{}", s),
            OpValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    match item {
                        ListItem::Headline(h) => write!(f, "{} - {}", h.title, h.link)?,
                        ListItem::Text(s) => write!(f, "{}", s)?,
                    }
                }
                Ok(())
            }
        }
    }
}
