//! Native HTTP call seam
//!
//! `HttpTransport` performs exactly one attempt. The invoker owns retries, so
//! implementations must not retry on their own.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};

use hs_common::{Headers, HttpBody, HttpRequest, HttpResponse};
use hs_config::{AuthScheme, HttpClientSettings};

use crate::error::TransportError;

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send one attempt of `request` and return whatever response came back
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `HttpTransport` backed by a shared reqwest client
pub struct ReqwestTransport {
    client: reqwest::Client,
    settings: HttpClientSettings,
}

impl ReqwestTransport {
    pub fn new(settings: HttpClientSettings) -> Result<Self, TransportError> {
        let client = Self::build_client(&settings).map_err(TransportError::from_reqwest)?;

        if let Some(realm) = &settings.realm {
            match realm.auth_scheme {
                None | Some(AuthScheme::Basic) => {}
                Some(scheme) => warn!(
                    scheme = ?scheme,
                    "Only basic authentication is performed; credentials are sent as basic auth"
                ),
            }
        }

        Ok(Self { client, settings })
    }

    fn build_client(settings: &HttpClientSettings) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(settings.connect_timeout_ms))
            .user_agent(settings.user_agent.as_str());

        if let Some(proxy) = &settings.proxy {
            let no_proxy = reqwest::NoProxy::from_string(&proxy.non_proxy_hosts);
            debug!(
                proxy = %proxy.url(),
                non_proxy_hosts = %proxy.non_proxy_hosts,
                "Routing requests through proxy"
            );
            builder = builder
                .proxy(reqwest::Proxy::http(proxy.url())?.no_proxy(no_proxy.clone()))
                .proxy(reqwest::Proxy::https(proxy.secured_url())?.no_proxy(no_proxy));
        }

        builder.build()
    }

    fn build_request(&self, request: &HttpRequest) -> Result<reqwest::Request, TransportError> {
        let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
            .map_err(|e| TransportError::Build(e.to_string()))?;
        let timeout = request
            .timeout_ms()
            .unwrap_or(self.settings.request_timeout_ms);

        let mut builder = self
            .client
            .request(method, request.url())
            .timeout(Duration::from_millis(timeout));

        for (name, values) in request.headers() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Build(format!("header '{}': {}", name, e)))?;
            for value in values {
                let header_value = HeaderValue::from_str(value)
                    .map_err(|e| TransportError::Build(format!("header '{}': {}", name, e)))?;
                builder = builder.header(header_name.clone(), header_value);
            }
        }

        if let Some((user, password)) = self.settings.realm.as_ref().and_then(|r| r.credentials()) {
            builder = builder.basic_auth(user, Some(password));
        }

        builder = match request.body() {
            HttpBody::String(text) if text.is_empty() => builder,
            HttpBody::String(text) => builder.body(text.clone()),
            HttpBody::ByteArray(bytes) => builder.body(bytes.clone()),
            HttpBody::Multipart(parts) => {
                let form = parts
                    .iter()
                    .enumerate()
                    .fold(Form::new(), |form, (i, part)| {
                        form.part(format!("part{}", i), Part::bytes(part.clone()))
                    });
                builder.multipart(form)
            }
        };

        builder.build().map_err(TransportError::from_reqwest)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let native = self.build_request(request)?;
        let response = self
            .client
            .execute(native)
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        let body = response.text().await.map_err(TransportError::from_reqwest)?;

        Ok(HttpResponse::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            body,
            headers,
        ))
    }
}
