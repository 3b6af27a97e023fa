use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub type Headers = HashMap<String, Vec<String>>;

/// A request an adapter wants performed. Adapters only describe requests; the
/// engine sends them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: Headers,
    pub body: Option<String>,
}

impl Request {
    pub fn get(url: &str) -> Request {
        Request {
            method: "GET".to_string(),
            url: url.to_string(),
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn post(url: &str) -> Request {
        Request {
            method: "POST".to_string(),
            ..Request::get(url)
        }
    }

    /// Appends a header value, keeping earlier values of the same name.
    pub fn header(mut self, name: &str, value: &str) -> Request {
        self.headers
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
    }

    pub fn body(mut self, body: &str) -> Request {
        self.body = Some(body.to_string());
        self
    }

    /// Sets an url-encoded form body.
    pub fn form(self, fields: &[(&str, &str)]) -> Request {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();

        self.header("Content-Type", "application/x-www-form-urlencoded")
            .body(&body)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    pub fn new(url: &str, status: u16, body: impl Into<Bytes>) -> Response {
        Response {
            url: url.to_string(),
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body as text; invalid utf-8 sequences are replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Builds an absolute url with query parameters, percent-encoding values.
pub fn with_query(base: &str, params: &[(&str, &str)]) -> Result<String, url::ParseError> {
    if params.is_empty() {
        return Ok(url::Url::parse(base)?.to_string());
    }
    let url = url::Url::parse_with_params(base, params)?;
    Ok(url.to_string())
}

/// Resolves `href` against `base`, leaving absolute urls untouched.
pub fn absolute_url(base: &str, href: &str) -> String {
    url::Url::parse(base)
        .and_then(|base| base.join(href))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| href.to_string())
}
