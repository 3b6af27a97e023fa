use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum InputType {
    String(String),
    Number(f64),
    Boolean(bool),
    State {
        name: String,
        selected: Option<bool>,
    },
}

impl From<String> for InputType {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for InputType {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<f64> for InputType {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for InputType {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl InputType {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::State { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Search filters and preference descriptors an adapter exposes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum Input {
    Text {
        name: String,
        state: Option<String>,
    },
    Checkbox {
        name: String,
        state: Option<bool>,
    },
    Select {
        name: String,
        values: Vec<InputType>,
        state: Option<i64>,
    },
    Group {
        name: String,
        state: Option<Vec<InputType>>,
    },
    Sort {
        name: String,
        values: Vec<InputType>,
        selection: Option<(i64, bool)>,
    },
}

impl Input {
    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. }
            | Self::Checkbox { name, .. }
            | Self::Select { name, .. }
            | Self::Group { name, .. }
            | Self::Sort { name, .. } => name,
        }
    }

    /// The selected value of a `Select`, or the text of a `Text`.
    pub fn selected(&self) -> Option<&str> {
        match self {
            Self::Text { state, .. } => state.as_deref(),
            Self::Select { values, state, .. } => state
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| values.get(i))
                .and_then(InputType::as_str),
            _ => None,
        }
    }
}
