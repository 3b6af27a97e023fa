use std::{str::FromStr, sync::Arc, time::Duration};

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::{Method, cookie::Jar};
use tokio::{sync::Mutex, time::Instant};
use yomu_lib::{
    error::{Error, Result},
    http::{Headers, Request, Response},
};

use crate::config::Config;

/// Performs the requests adapters describe.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response>;
}

/// Turns a non-2xx response into [`Error::Status`].
pub fn ensure_success(res: Response) -> Result<Response> {
    if res.is_success() {
        Ok(res)
    } else {
        Err(Error::Status {
            status: res.status,
            url: res.url,
        })
    }
}

/// Enforces a minimum interval between consecutive requests.
pub struct RateLimiter {
    interval: Duration,
    next: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Mutex::new(None),
        }
    }

    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }

        let mut next = self.next.lock().await;
        let now = Instant::now();
        let at = match *next {
            Some(at) if at > now => {
                tokio::time::sleep_until(at).await;
                at
            }
            _ => now,
        };
        *next = Some(at + self.interval);
    }
}

/// The default [`Transport`], backed by a shared reqwest client.
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .cookie_provider(Arc::new(Jar::default()))
            .brotli(true)
            .deflate(true)
            .gzip(true)
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| Error::Transport(e.into()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for Fetcher {
    async fn execute(&self, request: Request) -> Result<Response> {
        let method = Method::from_str(&request.method)
            .map_err(|e| Error::Transport(anyhow!("invalid method {:?}: {e}", request.method)))?;

        let mut req = self.client.request(method, &request.url);
        for (name, values) in &request.headers {
            for value in values {
                req = req.header(name, value);
            }
        }
        if let Some(body) = request.body {
            req = req.body(body);
        }

        debug!("{} {}", request.method, request.url);

        let res = req.send().await.map_err(|e| Error::Transport(e.into()))?;

        let url = res.url().to_string();
        let status = res.status().as_u16();
        let mut headers = Headers::new();
        for (name, value) in res.headers() {
            if let Ok(value) = value.to_str() {
                headers
                    .entry(name.to_string())
                    .or_default()
                    .push(value.to_string());
            }
        }

        let body = res.bytes().await.map_err(|e| Error::Transport(e.into()))?;
        debug!("{status} {url} ({} bytes)", body.len());

        Ok(Response {
            url,
            status,
            headers,
            body,
        })
    }
}
