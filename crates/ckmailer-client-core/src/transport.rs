use async_trait::async_trait;
use serde::Deserialize;

use crate::error::RequestError;

pub const SEND_USER_ACCOUNT_LINK_PATH: &str = "send-user-account-link";
pub const CHANGE_SUBSCRIPTION_PATH: &str = "change-subscription";
pub const UNSUBSCRIBE_PATH_PREFIX: &str = "unsubscribe";

/// The three mailer endpoints the widget talks to. Every call is a POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    SendUserAccountLink,
    ChangeSubscription,
    Unsubscribe { user_id: String, channel_id: String },
}

impl Endpoint {
    /// Page-relative path, without a leading slash.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::SendUserAccountLink => SEND_USER_ACCOUNT_LINK_PATH.to_string(),
            Self::ChangeSubscription => CHANGE_SUBSCRIPTION_PATH.to_string(),
            Self::Unsubscribe {
                user_id,
                channel_id,
            } => format!(
                "{UNSUBSCRIBE_PATH_PREFIX}/{}/{}",
                urlencoding::encode(user_id),
                urlencoding::encode(channel_id)
            ),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendUserAccountLink => "send_user_account_link",
            Self::ChangeSubscription => "change_subscription",
            Self::Unsubscribe { .. } => "unsubscribe",
        }
    }
}

/// Ordered multipart form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody {
    fields: Vec<(String, String)>,
}

impl FormBody {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCommandRequest {
    pub endpoint: Endpoint,
    pub body: Option<FormBody>,
}

impl HttpCommandRequest {
    #[must_use]
    pub fn form(endpoint: Endpoint, body: FormBody) -> Self {
        Self {
            endpoint,
            body: Some(body),
        }
    }

    #[must_use]
    pub fn bodiless(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            body: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Transport-level success. Body error codes are never consulted.
    #[must_use]
    pub fn ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Fails with `Application` for non-2xx and `Decode` for unreadable bodies.
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, RequestError> {
        self.ensure_ok()?;
        serde_json::from_str(&self.body)
            .map_err(|error| RequestError::decode(self.status, &self.body, &error))
    }

    pub fn ensure_ok(&self) -> Result<(), RequestError> {
        if self.ok() {
            Ok(())
        } else {
            Err(RequestError::from_status(self.status, &self.body))
        }
    }
}

/// One POST round-trip. Implementations only return `RequestError::Transport`;
/// any response, whatever its status, is handed back as `HttpResponse`.
#[async_trait(?Send)]
pub trait RequestTransport {
    async fn post(&self, request: &HttpCommandRequest) -> Result<HttpResponse, RequestError>;
}

#[async_trait(?Send)]
impl<T: RequestTransport + ?Sized> RequestTransport for &T {
    async fn post(&self, request: &HttpCommandRequest) -> Result<HttpResponse, RequestError> {
        (**self).post(request).await
    }
}

#[async_trait(?Send)]
impl<T: RequestTransport + ?Sized> RequestTransport for std::rc::Rc<T> {
    async fn post(&self, request: &HttpCommandRequest) -> Result<HttpResponse, RequestError> {
        (**self).post(request).await
    }
}
