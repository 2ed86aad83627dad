//! HTTP client settings: timeouts, proxy and authentication realm

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientSettings {
    pub connect_timeout_ms: u64,
    /// Default per-attempt timeout, overridable per request
    pub request_timeout_ms: u64,
    pub user_agent: String,
    pub proxy: Option<ProxySettings>,
    pub realm: Option<RealmSettings>,
}

impl Default for HttpClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            user_agent: concat!("hs-sink/", env!("CARGO_PKG_VERSION")).to_string(),
            proxy: None,
            realm: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProxyType {
    #[default]
    Http,
    Https,
    SocksV4,
    SocksV5,
}

impl ProxyType {
    pub fn scheme(&self) -> &'static str {
        match self {
            ProxyType::Http => "http",
            ProxyType::Https => "https",
            ProxyType::SocksV4 => "socks4",
            ProxyType::SocksV5 => "socks5",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub secured_port: Option<u16>,
    /// Comma-separated host list bypassing the proxy
    #[serde(default)]
    pub non_proxy_hosts: String,
    #[serde(default)]
    pub proxy_type: ProxyType,
}

impl ProxySettings {
    pub fn non_proxy_host_list(&self) -> Vec<String> {
        self.non_proxy_hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Proxy URL for plain-HTTP targets
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.proxy_type.scheme(), self.host, self.port)
    }

    /// Proxy URL for HTTPS targets, using the secured port when one is set
    pub fn secured_url(&self) -> String {
        let port = self.secured_port.unwrap_or(self.port);
        format!("{}://{}:{}", self.proxy_type.scheme(), self.host, port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthScheme {
    Basic,
    Digest,
    Ntlm,
    Spnego,
    Kerberos,
}

/// Authentication realm. Only credentials are passed on to the native client;
/// the remaining fields are carried for schemes the client negotiates itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealmSettings {
    pub principal_name: Option<String>,
    pub password: Option<String>,
    pub algorithm: Option<String>,
    pub charset: String,
    pub login_context_name: Option<String>,
    pub auth_scheme: Option<AuthScheme>,
    pub method: String,
    pub nc: Option<String>,
    pub nonce: Option<String>,
    pub ntlm_domain: Option<String>,
    pub ntlm_host: String,
    pub omit_query: bool,
    pub opaque: Option<String>,
    pub qop: Option<String>,
    pub service_principal_name: Option<String>,
    pub realm_name: Option<String>,
    pub use_preemptive_auth: bool,
}

impl Default for RealmSettings {
    fn default() -> Self {
        Self {
            principal_name: None,
            password: None,
            algorithm: None,
            charset: "UTF-8".to_string(),
            login_context_name: None,
            auth_scheme: None,
            method: "GET".to_string(),
            nc: None,
            nonce: None,
            ntlm_domain: None,
            ntlm_host: "localhost".to_string(),
            omit_query: false,
            opaque: None,
            qop: None,
            service_principal_name: None,
            realm_name: None,
            use_preemptive_auth: false,
        }
    }
}

impl RealmSettings {
    /// Authentication is active only with a non-empty principal and password
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.principal_name.as_deref(), self.password.as_deref()) {
            (Some(p), Some(pw)) if !p.is_empty() && !pw.is_empty() => Some((p, pw)),
            _ => None,
        }
    }
}
