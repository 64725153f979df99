use std::cell::Cell;

use tracing::{debug, info, warn};

use crate::config::{FailurePolicy, StatusText, WidgetConfig};
use crate::elements::{Disableable, ElementRegistry, StatusLabel};
use crate::error::RequestError;
use crate::outcome::HandlerOutcome;
use crate::transport::{Endpoint, HttpCommandRequest, RequestTransport};

/// Id of the page-wide status label written by the unsubscribe flow.
pub const MESSAGE_LABEL_ID: &str = "message";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnsubscribePhase {
    #[default]
    Idle,
    Pending,
    /// Terminal; nothing re-enables the trigger.
    Unsubscribed,
}

/// One-click unsubscribe button for a (user, channel) pair.
pub struct UnsubscribeControl<E> {
    user_id: String,
    channel_id: String,
    element: E,
    phase: Cell<UnsubscribePhase>,
}

impl<E: Disableable> UnsubscribeControl<E> {
    pub fn new(user_id: impl Into<String>, channel_id: impl Into<String>, element: E) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            element,
            phase: Cell::new(UnsubscribePhase::Idle),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn phase(&self) -> UnsubscribePhase {
        self.phase.get()
    }

    fn begin(&self, policy: FailurePolicy) -> Result<(), RequestError> {
        if self.phase.get() != UnsubscribePhase::Idle || self.element.is_disabled() {
            return Err(RequestError::ControlBusy {
                id: self.channel_id.clone(),
            });
        }
        if policy.restores() {
            self.element.set_disabled(true);
        }
        self.phase.set(UnsubscribePhase::Pending);
        Ok(())
    }

    fn complete(&self) {
        self.element.set_disabled(true);
        self.phase.set(UnsubscribePhase::Unsubscribed);
    }

    fn fail(&self, policy: FailurePolicy) {
        if policy.restores() {
            self.element.set_disabled(false);
        }
        self.phase.set(UnsubscribePhase::Idle);
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::Unsubscribe {
            user_id: self.user_id.clone(),
            channel_id: self.channel_id.clone(),
        }
    }
}

pub struct UnsubscribeAction<T, R> {
    transport: T,
    registry: R,
    policy: FailurePolicy,
    text: StatusText,
}

impl<T: RequestTransport, R: ElementRegistry> UnsubscribeAction<T, R> {
    pub fn new(transport: T, registry: R, config: &WidgetConfig) -> Self {
        Self {
            transport,
            registry,
            policy: config.failure_policy,
            text: config.status_text.clone(),
        }
    }

    pub async fn post_unsubscribe<E: Disableable>(
        &self,
        control: &UnsubscribeControl<E>,
    ) -> HandlerOutcome {
        HandlerOutcome::new(self.unsubscribe(control).await)
    }

    async fn unsubscribe<E: Disableable>(
        &self,
        control: &UnsubscribeControl<E>,
    ) -> Result<(), RequestError> {
        let user_id = control.user_id();
        let channel_id = control.channel_id();
        control.begin(self.policy).inspect_err(|_| {
            debug!(user_id, channel_id, "unsubscribe ignored for inactive trigger");
        })?;
        debug!(user_id, channel_id, "posting one-click unsubscribe");

        let request = HttpCommandRequest::bodiless(control.endpoint());
        let result = match self.transport.post(&request).await {
            Ok(response) => response.ensure_ok(),
            Err(error) => Err(error),
        };

        match result {
            Ok(()) => {
                control.complete();
                info!(user_id, channel_id, "unsubscribed");
                let label = self.registry.require(MESSAGE_LABEL_ID)?;
                label.set_text(&self.text.unsubscribe_done);
                Ok(())
            }
            Err(error) => {
                control.fail(self.policy);
                warn!(
                    user_id,
                    channel_id,
                    %error,
                    kind = error.kind().as_str(),
                    "unsubscribe failed"
                );
                if self.policy.restores() {
                    match self.registry.lookup(MESSAGE_LABEL_ID) {
                        Some(label) => label.set_text(&self.text.unsubscribe_failed),
                        None => warn!("status label missing for failed unsubscribe"),
                    }
                }
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryElement, MemoryRegistry};
    use crate::testing::ScriptedTransport;
    use crate::transport::HttpResponse;

    fn setup() -> (ScriptedTransport, MemoryRegistry, MemoryElement) {
        let registry = MemoryRegistry::new();
        registry.insert_label(MESSAGE_LABEL_ID);
        (ScriptedTransport::new(), registry, MemoryElement::new())
    }

    #[tokio::test]
    async fn posts_bodiless_request_to_path() {
        let (transport, registry, button) = setup();
        transport.respond(HttpResponse::new(200, ""));
        let control = UnsubscribeControl::new("u1", "c1", button);

        let outcome = UnsubscribeAction::new(&transport, &registry, &WidgetConfig::default())
            .post_unsubscribe(&control)
            .await;

        assert!(outcome.is_ok());
        let request = transport.last_request().expect("request sent");
        assert_eq!(request.endpoint.path(), "unsubscribe/u1/c1");
        assert_eq!(request.body, None);
        assert_eq!(control.phase(), UnsubscribePhase::Unsubscribed);
    }

    #[tokio::test]
    async fn missing_message_label_is_reported_after_terminal_state() {
        let transport = ScriptedTransport::new();
        transport.respond(HttpResponse::new(200, ""));
        let registry = MemoryRegistry::new();
        let control = UnsubscribeControl::new("u1", "c1", MemoryElement::new());

        let outcome = UnsubscribeAction::new(&transport, &registry, &WidgetConfig::default())
            .post_unsubscribe(&control)
            .await;

        assert_eq!(
            outcome.error(),
            Some(&RequestError::ElementNotFound {
                id: MESSAGE_LABEL_ID.to_string()
            })
        );
        assert!(control.element().is_disabled());
        assert_eq!(control.phase(), UnsubscribePhase::Unsubscribed);
    }

    #[tokio::test]
    async fn legacy_failure_never_touches_the_trigger() {
        let (transport, registry, button) = setup();
        transport.respond(HttpResponse::new(404, "Could not find user u1\n"));
        let observer = button.clone();
        transport.on_request(move |_| assert!(!observer.is_disabled()));
        let control = UnsubscribeControl::new("u1", "c1", button);
        let config = WidgetConfig::default().with_failure_policy(FailurePolicy::Legacy);

        let outcome = UnsubscribeAction::new(&transport, &registry, &config)
            .post_unsubscribe(&control)
            .await;

        assert!(matches!(
            outcome.error(),
            Some(RequestError::Application { status: 404, .. })
        ));
        assert!(!control.element().is_disabled());
        assert_eq!(control.phase(), UnsubscribePhase::Idle);
        assert_eq!(registry.text_of(MESSAGE_LABEL_ID).as_deref(), Some(""));
    }

    #[tokio::test]
    async fn restore_failure_reenables_and_reports() {
        let (transport, registry, button) = setup();
        transport.fail_transport("offline");
        let observer = button.clone();
        transport.on_request(move |_| assert!(observer.is_disabled()));
        let control = UnsubscribeControl::new("u1", "c1", button);

        let outcome = UnsubscribeAction::new(&transport, &registry, &WidgetConfig::default())
            .post_unsubscribe(&control)
            .await;

        assert!(matches!(outcome.error(), Some(RequestError::Transport { .. })));
        assert!(!control.element().is_disabled());
        assert_eq!(control.phase(), UnsubscribePhase::Idle);
        assert_eq!(
            registry.text_of(MESSAGE_LABEL_ID).as_deref(),
            Some("Unsubscribe failed!")
        );
    }
}
