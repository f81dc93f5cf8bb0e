//! Package manager talking to a proji server.
//!
//! | Operation      | Request                                  |
//! |----------------|------------------------------------------|
//! | `fetch`        | `GET    {endpoint}/api/v1/packages`      |
//! | `get_by_label` | `GET    {endpoint}/api/v1/packages/{label}` |
//! | `store`        | `POST   {endpoint}/api/v1/packages`      |
//! | `update`       | `PUT    {endpoint}/api/v1/packages/{label}` |
//! | `remove`       | `DELETE {endpoint}/api/v1/packages/{label}` |
//!
//! Bodies are JSON. `store` and `update` answer with the stored package. The server
//! resolves dependencies on its side.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::PackageManager;
use crate::constants::REMOTE_API_PREFIX;
use crate::core::{OrCancel, ProjiError};
use crate::models::{Package, PackageUpdate};
use crate::platform::http_client;

const NAME: &str = "remote";

/// Forwards package operations to a remote endpoint.
#[derive(Debug, Clone)]
pub struct RemotePackageManager {
    client: reqwest::Client,
    endpoint: Url,
}

impl RemotePackageManager {
    /// Manager for the server at `endpoint` (scheme, host and optional base path).
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| ProjiError::InvalidUrl {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(ProjiError::InvalidUrl {
                url: endpoint.to_string(),
                reason: "not a server address".to_string(),
            }
            .into());
        }
        Ok(Self {
            client: http_client()?,
            endpoint,
        })
    }

    fn url(&self, label: Option<&str>) -> Result<Url> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| anyhow::anyhow!("endpoint cannot be a base: {}", self.endpoint))?;
            segments.pop_if_empty();
            segments.extend(REMOTE_API_PREFIX.split('/').filter(|segment| !segment.is_empty()));
            if let Some(label) = label {
                segments.push(label);
            }
        }
        Ok(url)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        label: Option<&str>,
        body: Option<&B>,
        what: &str,
    ) -> Result<Response> {
        let url = self.url(label)?;
        tracing::debug!(target: "remote", "{method} {url}");

        let mut request = self.client.request(method, url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| ProjiError::Transport {
            platform: NAME.to_string(),
            path: url.path().to_string(),
            reason: e.to_string(),
        })?;
        Ok(check_status(response, what).await?)
    }
}

/// Map a server response onto the error taxonomy.
async fn check_status(response: Response, what: &str) -> Result<Response, ProjiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let path = response.url().path().to_string();
    let message = response.text().await.unwrap_or_default();
    let reason = match message.trim() {
        "" => status.to_string(),
        message => format!("{status}: {message}"),
    };

    Err(match status {
        StatusCode::NOT_FOUND => ProjiError::not_found(what),
        StatusCode::CONFLICT => ProjiError::conflict(what),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ProjiError::invalid(format!("{what} rejected by server ({reason})"))
        }
        StatusCode::TOO_MANY_REQUESTS => ProjiError::RateLimited {
            platform: NAME.to_string(),
            path,
        },
        _ => ProjiError::Transport {
            platform: NAME.to_string(),
            path,
            reason,
        },
    })
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    response.json().await.with_context(|| format!("Failed to decode server response for {what}"))
}

impl PackageManager for RemotePackageManager {
    fn name(&self) -> &'static str {
        NAME
    }

    fn fetch(&self) -> BoxFuture<'_, Result<Vec<Package>>> {
        Box::pin(async move {
            let response = self.send::<()>(Method::GET, None, None, "packages").await?;
            read_json(response, "packages").await
        })
    }

    fn get_by_label<'a>(&'a self, label: &'a str) -> BoxFuture<'a, Result<Package>> {
        Box::pin(async move {
            let what = format!("package '{label}'");
            let response = self.send::<()>(Method::GET, Some(label), None, &what).await?;
            read_json(response, &what).await
        })
    }

    fn store<'a>(
        &'a self,
        package: Package,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Package>> {
        Box::pin(async move {
            package.validate()?;
            let what = format!("package '{}'", package.label);
            let response = self
                .send(Method::POST, None, Some(&package), &what)
                .or_cancel(cancel, "remote store")
                .await??;
            read_json(response, &what).await
        })
    }

    fn update<'a>(
        &'a self,
        update: PackageUpdate,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Package>> {
        Box::pin(async move {
            let what = format!("package '{}'", update.label);
            let response = self
                .send(Method::PUT, Some(&update.label), Some(&update), &what)
                .or_cancel(cancel, "remote update")
                .await??;
            read_json(response, &what).await
        })
    }

    fn remove<'a>(&'a self, label: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let what = format!("package '{label}'");
            self.send::<()>(Method::DELETE, Some(label), None, &what).await?;
            Ok(())
        })
    }
}
