use ckmailer_client_core::RequestError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WidgetFlow {
    AccountLink,
    ChangeSubscription,
    Unsubscribe,
}

impl WidgetFlow {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::AccountLink => "account_link",
            Self::ChangeSubscription => "change_subscription",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

/// Counters exposed to page scripts through `widget_diagnostics_json`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct WidgetDiagnostics {
    pub(crate) failure_policy: String,
    pub(crate) flows_started: u64,
    pub(crate) flows_succeeded: u64,
    pub(crate) flows_failed: u64,
    pub(crate) busy_refusals: u64,
    pub(crate) last_flow: Option<String>,
    pub(crate) last_error: Option<String>,
    pub(crate) last_error_kind: Option<String>,
}

impl Default for WidgetDiagnostics {
    fn default() -> Self {
        Self {
            failure_policy: "restore".to_string(),
            flows_started: 0,
            flows_succeeded: 0,
            flows_failed: 0,
            busy_refusals: 0,
            last_flow: None,
            last_error: None,
            last_error_kind: None,
        }
    }
}

impl WidgetDiagnostics {
    pub(crate) fn record<T>(&mut self, flow: WidgetFlow, result: &Result<T, RequestError>) {
        self.flows_started = self.flows_started.saturating_add(1);
        self.last_flow = Some(flow.as_str().to_string());
        match result {
            Ok(_) => {
                self.flows_succeeded = self.flows_succeeded.saturating_add(1);
            }
            Err(error) if error.is_busy() => {
                self.busy_refusals = self.busy_refusals.saturating_add(1);
            }
            Err(error) => {
                self.flows_failed = self.flows_failed.saturating_add(1);
                self.last_error = Some(error.to_string());
                self.last_error_kind = Some(error.kind().as_str().to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_success_failure_and_busy_separately() {
        let mut diagnostics = WidgetDiagnostics::default();
        diagnostics.record(WidgetFlow::AccountLink, &Ok::<(), RequestError>(()));
        diagnostics.record::<()>(
            WidgetFlow::ChangeSubscription,
            &Err(RequestError::Application {
                status: 500,
                message: None,
            }),
        );
        diagnostics.record::<()>(
            WidgetFlow::Unsubscribe,
            &Err(RequestError::ControlBusy {
                id: "c1".to_string(),
            }),
        );

        assert_eq!(diagnostics.flows_started, 3);
        assert_eq!(diagnostics.flows_succeeded, 1);
        assert_eq!(diagnostics.flows_failed, 1);
        assert_eq!(diagnostics.busy_refusals, 1);
        assert_eq!(diagnostics.last_flow.as_deref(), Some("unsubscribe"));
        assert_eq!(
            diagnostics.last_error.as_deref(),
            Some("request failed with status 500")
        );
        assert_eq!(
            diagnostics.last_error_kind.as_deref(),
            Some("application_failure")
        );
    }

    #[test]
    fn serializes_for_page_scripts() {
        let json = serde_json::to_value(WidgetDiagnostics::default()).expect("serializes");
        assert_eq!(json["failure_policy"], "restore");
        assert_eq!(json["flows_started"], 0);
        assert!(json["last_error"].is_null());
    }
}
