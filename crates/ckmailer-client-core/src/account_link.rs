use std::cell::Cell;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::RequestError;
use crate::outcome::HandlerOutcome;
use crate::transport::{Endpoint, FormBody, HttpCommandRequest, RequestTransport};

pub const ACCOUNT_LINK_FORM_ID: &str = "account-link-form";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormState {
    #[default]
    Unsubmitted,
    /// A link request is in flight; further submits are refused.
    Pending,
    Submitted,
}

impl FormState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unsubmitted => "unsubmitted",
            Self::Pending => "pending",
            Self::Submitted => "submitted",
        }
    }

    /// Unknown or missing markers read as `Unsubmitted`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "pending" => Self::Pending,
            "submitted" | "1" => Self::Submitted,
            _ => Self::Unsubmitted,
        }
    }
}

/// The sign-in form as seen by the account-link flow.
pub trait LinkForm {
    fn email(&self) -> String;

    /// Channel row id (`c<digits>`) the manage page should highlight.
    fn highlight(&self) -> Option<String> {
        None
    }

    fn state(&self) -> FormState;
    fn set_state(&self, state: FormState);
}

/// Plain form value. Clones share their state.
#[derive(Debug, Clone, Default)]
pub struct LinkRequestForm {
    email: String,
    highlight: Option<String>,
    state: Rc<Cell<FormState>>,
}

impl LinkRequestForm {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_highlight(mut self, highlight: impl Into<String>) -> Self {
        self.highlight = Some(highlight.into());
        self
    }
}

impl LinkForm for LinkRequestForm {
    fn email(&self) -> String {
        self.email.clone()
    }

    fn highlight(&self) -> Option<String> {
        self.highlight.clone()
    }

    fn state(&self) -> FormState {
        self.state.get()
    }

    fn set_state(&self, state: FormState) {
        self.state.set(state);
    }
}

#[must_use]
pub fn account_link_body(form: &impl LinkForm) -> FormBody {
    let mut body = FormBody::new().with("email", form.email());
    if let Some(highlight) = form
        .highlight()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    {
        body.append("highlight", highlight);
    }
    body
}

/// Asks the service to mail an account-management link.
pub struct AccountLinkRequester<T> {
    transport: T,
}

impl<T: RequestTransport> AccountLinkRequester<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub async fn request_account_link(&self, form: &impl LinkForm) -> HandlerOutcome {
        HandlerOutcome::new(self.submit(form).await)
    }

    async fn submit(&self, form: &impl LinkForm) -> Result<(), RequestError> {
        let previous = form.state();
        if previous == FormState::Pending {
            debug!("account link request already in flight");
            return Err(RequestError::ControlBusy {
                id: ACCOUNT_LINK_FORM_ID.to_string(),
            });
        }

        let body = account_link_body(form);
        let has_highlight = body.get("highlight").is_some();
        let request = HttpCommandRequest::form(Endpoint::SendUserAccountLink, body);
        form.set_state(FormState::Pending);
        debug!(has_highlight, "requesting account link");

        let result = match self.transport.post(&request).await {
            Ok(response) => response.json::<serde_json::Value>(),
            Err(error) => Err(error),
        };

        match result {
            Ok(body) => {
                form.set_state(FormState::Submitted);
                info!(response = %body, "account link requested");
                Ok(())
            }
            Err(error) => {
                form.set_state(previous);
                warn!(%error, kind = error.kind().as_str(), "account link request failed");
                Err(error)
            }
        }
    }
}
