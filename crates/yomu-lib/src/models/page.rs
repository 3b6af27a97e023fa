use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One page image of a chapter. `index` is dense and authoritative.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PageRef {
    pub index: usize,
    pub url: String,
    pub headers: HashMap<String, String>,
    /// Keystream token for payloads obfuscated with XOR.
    pub decode_key: Option<String>,
}

impl PageRef {
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_decode_key(mut self, key: impl Into<String>) -> Self {
        self.decode_key = Some(key.into());
        self
    }
}
