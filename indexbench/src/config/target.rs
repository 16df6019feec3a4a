use std::{convert::Infallible, fmt, str::FromStr, sync::Arc};

use rama::{
    error::{BoxError, ErrorContext as _},
    http::Uri,
    utils::str::arcstr::ArcStr,
};
use secrecy::{ExposeSecret as _, SecretString};

use crate::comparator::{ActionKind, EndpointVariant};

/// The pair of API backends to compare, together with the
/// key used to authenticate against both of them.
#[derive(Debug, Clone, clap::Args)]
pub struct TargetConfig {
    /// base URL of the API backed by an index (e.g. `http://127.0.0.1:8080/with-index`)
    #[arg(long = "with-index", env = "INDEXBENCH_API_WITH_INDEX", value_name = "URL")]
    pub with_index: BaseUrl,

    /// base URL of the API without an index (e.g. `http://127.0.0.1:8080/no-index`)
    #[arg(long = "no-index", env = "INDEXBENCH_API_WITHOUT_INDEX", value_name = "URL")]
    pub no_index: BaseUrl,

    /// value sent as `Api-Key` header to both backends
    #[arg(
        long,
        env = "INDEXBENCH_API_KEY",
        hide_env_values = true,
        value_name = "KEY"
    )]
    pub api_key: ApiKey,
}

impl TargetConfig {
    pub fn base_url(&self, variant: EndpointVariant) -> &BaseUrl {
        match variant {
            EndpointVariant::WithIndex => &self.with_index,
            EndpointVariant::NoIndex => &self.no_index,
        }
    }

    /// `{base_url}/{action}` for the given variant.
    pub fn request_url(&self, variant: EndpointVariant, action: ActionKind) -> String {
        self.base_url(variant).join_action(action)
    }
}

/// Absolute http(s) URL used as prefix for all action requests.
///
/// The URL is kept verbatim: a trailing slash results in
/// an empty path segment once the action gets appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(ArcStr);

impl BaseUrl {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn join_action(&self, action: ActionKind) -> String {
        format!("{}/{}", self.as_str(), action)
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for BaseUrl {
    type Err = BoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let uri: Uri = s.parse().context("parse base url as uri")?;

        match uri.scheme_str() {
            Some("http" | "https") => (),
            Some(other) => {
                return Err(BoxError::from(format!(
                    "unsupported scheme '{other}' in base url, expected http or https"
                )));
            }
            None => return Err(BoxError::from("base url is missing a scheme")),
        }

        if uri.authority().is_none() {
            return Err(BoxError::from("base url is missing a host"));
        }
        if uri.query().is_some() {
            return Err(BoxError::from("base url cannot contain a query"));
        }

        Ok(Self(ArcStr::from(s)))
    }
}

/// API key shared by both backends, redacted from debug output.
#[derive(Clone)]
pub struct ApiKey(Arc<SecretString>);

impl ApiKey {
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&"<redacted>").finish()
    }
}

impl FromStr for ApiKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Arc::new(SecretString::from(s.to_owned()))))
    }
}
