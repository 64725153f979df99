//! Channel subscription toggle with server-authoritative reconciliation.
//!
//! The checkbox already shows the user's intent when the handler runs. The
//! control is locked for the duration of the request and the server's
//! `newstate` decides the final checked value, so a change made elsewhere
//! between click and response wins over the click.

use std::cell::Cell;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{FailurePolicy, StatusText, WidgetConfig};
use crate::elements::{Checkable, ElementRegistry, StatusLabel};
use crate::error::RequestError;
use crate::outcome::HandlerOutcome;
use crate::transport::{
    Endpoint, FormBody, HttpCommandRequest, HttpResponse, RequestTransport,
};

/// Wire name of the session token field.
pub const SESSION_TOKEN_FIELD: &str = "timsi";
pub const CHANNEL_ID_FIELD: &str = "channelid";
pub const TARGET_STATE_FIELD: &str = "to";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    Subscribed,
    Unsubscribed,
}

impl SubscriptionState {
    #[must_use]
    pub fn from_checked(checked: bool) -> Self {
        if checked {
            Self::Subscribed
        } else {
            Self::Unsubscribed
        }
    }

    #[must_use]
    pub fn is_subscribed(self) -> bool {
        matches!(self, Self::Subscribed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subscribed => "subscribed",
            Self::Unsubscribed => "unsubscribed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleSettlement {
    /// The server answered; the control shows its `newstate`.
    Confirmed(SubscriptionState),
    /// The request failed and the control was put back as it was before the click.
    RolledBack,
    /// The request failed and the control was left disabled.
    Stuck,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TogglePhase {
    #[default]
    Idle,
    Pending {
        requested: SubscriptionState,
    },
    Settled(ToggleSettlement),
}

impl TogglePhase {
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

#[derive(Debug, Deserialize)]
struct ChangeSubscriptionResponse {
    newstate: SubscriptionState,
}

/// Any JSON object is accepted; a missing or unknown `newstate` reads as unchecked.
#[derive(Debug, Deserialize)]
struct LenientChangeSubscriptionResponse {
    #[serde(default)]
    newstate: Option<serde_json::Value>,
}

/// Decodes a change-subscription reply. `Restore` requires a known `newstate`;
/// `Legacy` accepts any 2xx JSON body, as the old page did.
fn confirmed_state(
    response: &HttpResponse,
    policy: FailurePolicy,
) -> Result<SubscriptionState, RequestError> {
    match policy {
        FailurePolicy::Restore => response
            .json::<ChangeSubscriptionResponse>()
            .map(|body| body.newstate),
        FailurePolicy::Legacy => response
            .json::<LenientChangeSubscriptionResponse>()
            .map(|body| {
                let subscribed = body
                    .newstate
                    .as_ref()
                    .and_then(serde_json::Value::as_str)
                    == Some(SubscriptionState::Subscribed.as_str());
                SubscriptionState::from_checked(subscribed)
            }),
    }
}

/// One channel checkbox plus the identifiers it was rendered with.
pub struct SubscriptionControl<E> {
    session_token: String,
    channel_id: String,
    element: E,
    phase: Cell<TogglePhase>,
}

impl<E: Checkable> SubscriptionControl<E> {
    pub fn new(session_token: impl Into<String>, channel_id: impl Into<String>, element: E) -> Self {
        Self {
            session_token: session_token.into(),
            channel_id: channel_id.into(),
            element,
            phase: Cell::new(TogglePhase::Idle),
        }
    }

    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn phase(&self) -> TogglePhase {
        self.phase.get()
    }

    /// Idle/Settled -> Pending. Refuses while a request is pending or the
    /// element is disabled, which is how at-most-one-in-flight is enforced.
    pub fn begin(&self) -> Result<SubscriptionState, RequestError> {
        if self.phase.get().is_pending() || self.element.is_disabled() {
            return Err(RequestError::ControlBusy {
                id: self.channel_id.clone(),
            });
        }
        let requested = SubscriptionState::from_checked(self.element.is_checked());
        self.element.set_disabled(true);
        self.phase.set(TogglePhase::Pending { requested });
        Ok(requested)
    }

    /// Pending -> Settled with the server's state. Valid from any phase.
    pub fn confirm(&self, confirmed: SubscriptionState) {
        self.element.set_checked(confirmed.is_subscribed());
        self.element.set_disabled(false);
        self.phase
            .set(TogglePhase::Settled(ToggleSettlement::Confirmed(confirmed)));
    }

    /// Pending -> Settled after a failed request. Outside `Pending` there is
    /// nothing to roll back and only the phase changes.
    pub fn fail(&self, policy: FailurePolicy) -> ToggleSettlement {
        let settlement = match (policy, self.phase.get()) {
            (FailurePolicy::Legacy, _) => ToggleSettlement::Stuck,
            (FailurePolicy::Restore, TogglePhase::Pending { requested }) => {
                self.element.set_checked(!requested.is_subscribed());
                self.element.set_disabled(false);
                ToggleSettlement::RolledBack
            }
            (FailurePolicy::Restore, _) => {
                self.element.set_disabled(false);
                ToggleSettlement::RolledBack
            }
        };
        self.phase.set(TogglePhase::Settled(settlement));
        settlement
    }
}

#[must_use]
pub fn change_subscription_request(
    session_token: &str,
    channel_id: &str,
    requested: SubscriptionState,
) -> HttpCommandRequest {
    let body = FormBody::new()
        .with(SESSION_TOKEN_FIELD, session_token)
        .with(CHANNEL_ID_FIELD, channel_id)
        .with(TARGET_STATE_FIELD, requested.as_str());
    HttpCommandRequest::form(Endpoint::ChangeSubscription, body)
}

pub struct SubscriptionToggler<T, R> {
    transport: T,
    registry: R,
    policy: FailurePolicy,
    text: StatusText,
}

impl<T: RequestTransport, R: ElementRegistry> SubscriptionToggler<T, R> {
    pub fn new(transport: T, registry: R, config: &WidgetConfig) -> Self {
        Self {
            transport,
            registry,
            policy: config.failure_policy,
            text: config.status_text.clone(),
        }
    }

    pub async fn change_subscription<E: Checkable>(
        &self,
        control: &SubscriptionControl<E>,
    ) -> HandlerOutcome<SubscriptionState> {
        HandlerOutcome::new(self.toggle(control).await)
    }

    async fn toggle<E: Checkable>(
        &self,
        control: &SubscriptionControl<E>,
    ) -> Result<SubscriptionState, RequestError> {
        let channel_id = control.channel_id();
        let requested = control.begin().inspect_err(|_| {
            debug!(channel_id, "subscription toggle ignored while control is busy");
        })?;
        debug!(channel_id, to = requested.as_str(), "changing subscription");

        let request = change_subscription_request(control.session_token(), channel_id, requested);
        let result = match self.transport.post(&request).await {
            Ok(response) => confirmed_state(&response, self.policy),
            Err(error) => Err(error),
        };

        match result {
            Ok(confirmed) => {
                control.confirm(confirmed);
                if confirmed == requested {
                    info!(channel_id, newstate = confirmed.as_str(), "subscription changed");
                } else {
                    info!(
                        channel_id,
                        requested = requested.as_str(),
                        newstate = confirmed.as_str(),
                        "server state overrides requested subscription"
                    );
                }
                let label = self.registry.require(channel_id)?;
                label.set_text(self.confirmed_text(confirmed));
                Ok(confirmed)
            }
            Err(error) => {
                let settlement = control.fail(self.policy);
                warn!(
                    channel_id,
                    %error,
                    kind = error.kind().as_str(),
                    ?settlement,
                    "subscription change failed"
                );
                if self.policy.restores() {
                    match self.registry.lookup(channel_id) {
                        Some(label) => label.set_text(&self.text.change_failed),
                        None => warn!(channel_id, "status label missing for failed toggle"),
                    }
                }
                Err(error)
            }
        }
    }

    fn confirmed_text(&self, state: SubscriptionState) -> &str {
        match state {
            SubscriptionState::Subscribed => &self.text.subscribed,
            SubscriptionState::Unsubscribed => &self.text.unsubscribed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::Disableable;
    use crate::memory::MemoryElement;

    #[test]
    fn lenient_decoding_reads_missing_or_unknown_newstate_as_unsubscribed() {
        let envelope = HttpResponse::new(200, r#"{"ok":0,"message":"No such user"}"#);
        assert_eq!(
            confirmed_state(&envelope, FailurePolicy::Legacy),
            Ok(SubscriptionState::Unsubscribed)
        );
        assert!(matches!(
            confirmed_state(&envelope, FailurePolicy::Restore),
            Err(RequestError::Decode { status: 200, .. })
        ));

        let odd = HttpResponse::new(200, r#"{"newstate":"paused"}"#);
        assert_eq!(
            confirmed_state(&odd, FailurePolicy::Legacy),
            Ok(SubscriptionState::Unsubscribed)
        );
        let subscribed = HttpResponse::new(200, r#"{"newstate":"subscribed"}"#);
        assert_eq!(
            confirmed_state(&subscribed, FailurePolicy::Legacy),
            Ok(SubscriptionState::Subscribed)
        );
        assert!(matches!(
            confirmed_state(&HttpResponse::new(200, "not json"), FailurePolicy::Legacy),
            Err(RequestError::Decode { .. })
        ));
    }

    #[test]
    fn request_carries_wire_field_names() {
        let request = change_subscription_request("tok", "42", SubscriptionState::Unsubscribed);
        let body = request.body.expect("form body");
        let fields = body.fields().collect::<Vec<_>>();
        assert_eq!(
            fields,
            vec![("timsi", "tok"), ("channelid", "42"), ("to", "unsubscribed")]
        );
        assert_eq!(request.endpoint, Endpoint::ChangeSubscription);
    }

    #[test]
    fn newstate_decodes_lowercase_values() {
        let body: ChangeSubscriptionResponse =
            serde_json::from_str(r#"{"ok":1,"newstate":"subscribed"}"#).expect("decodes");
        assert_eq!(body.newstate, SubscriptionState::Subscribed);
        assert!(serde_json::from_str::<ChangeSubscriptionResponse>(r#"{"newstate":"maybe"}"#).is_err());
    }

    #[test]
    fn begin_locks_the_control_and_reads_intent() {
        let control = SubscriptionControl::new("tok", "42", MemoryElement::checkbox(true));
        assert_eq!(control.begin(), Ok(SubscriptionState::Subscribed));
        assert!(control.element().is_disabled());
        assert_eq!(
            control.phase(),
            TogglePhase::Pending {
                requested: SubscriptionState::Subscribed
            }
        );
        assert!(control.begin().is_err_and(|error| error.is_busy()));
    }

    #[test]
    fn begin_refuses_disabled_elements() {
        let element = MemoryElement::checkbox(false);
        element.set_disabled(true);
        let control = SubscriptionControl::new("tok", "42", element);
        assert!(control.begin().is_err_and(|error| error.is_busy()));
        assert_eq!(control.phase(), TogglePhase::Idle);
    }

    #[test]
    fn restore_failure_rolls_back_the_click() {
        let control = SubscriptionControl::new("tok", "42", MemoryElement::checkbox(true));
        control.begin().expect("idle control");
        assert_eq!(control.fail(FailurePolicy::Restore), ToggleSettlement::RolledBack);
        assert!(!control.element().is_checked());
        assert!(!control.element().is_disabled());
        assert_eq!(
            control.phase(),
            TogglePhase::Settled(ToggleSettlement::RolledBack)
        );
    }

    #[test]
    fn legacy_failure_leaves_control_stuck() {
        let control = SubscriptionControl::new("tok", "42", MemoryElement::checkbox(true));
        control.begin().expect("idle control");
        assert_eq!(control.fail(FailurePolicy::Legacy), ToggleSettlement::Stuck);
        assert!(control.element().is_checked());
        assert!(control.element().is_disabled());
    }

    #[test]
    fn confirm_is_total_from_any_phase() {
        let control = SubscriptionControl::new("tok", "42", MemoryElement::checkbox(false));
        control.confirm(SubscriptionState::Subscribed);
        assert!(control.element().is_checked());
        assert!(!control.element().is_disabled());
        assert_eq!(
            control.phase(),
            TogglePhase::Settled(ToggleSettlement::Confirmed(SubscriptionState::Subscribed))
        );
    }
}
