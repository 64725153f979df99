#[cfg(any(target_arch = "wasm32", test))]
mod widget_diagnostics;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use std::cell::RefCell;

    use ckmailer_client_core::{
        AccountLinkRequester, FailurePolicy, HandlerOutcome, RequestError, SubscriptionControl,
        SubscriptionToggler, UnsubscribeAction, UnsubscribeControl, WidgetConfig,
    };
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::{future_to_promise, spawn_local};
    use web_sys::{Element, HtmlFormElement, HtmlInputElement};

    use crate::widget_diagnostics::{WidgetDiagnostics, WidgetFlow};

    mod dom;
    mod logging;
    mod network;

    use dom::{DomCheckbox, DomLinkForm, DomRegistry, DomTrigger};
    use logging::init_console_tracing;
    use network::GlooTransport;

    thread_local! {
        static CONFIG: RefCell<WidgetConfig> = RefCell::new(WidgetConfig::default());
        static DIAGNOSTICS: RefCell<WidgetDiagnostics> = RefCell::new(WidgetDiagnostics::default());
    }

    #[wasm_bindgen(start)]
    pub fn start() {
        console_error_panic_hook::set_once();
        init_console_tracing();
        tracing::debug!("ckmailer widget loaded");
    }

    /// Selects what failed requests do to their control: `restore` or `legacy`.
    #[wasm_bindgen]
    pub fn configure(failure_policy: String) -> Result<(), JsValue> {
        let policy = failure_policy
            .parse::<FailurePolicy>()
            .map_err(|error| JsValue::from_str(&error.to_string()))?;
        CONFIG.with(|config| config.borrow_mut().failure_policy = policy);
        DIAGNOSTICS.with(|diagnostics| {
            diagnostics.borrow_mut().failure_policy = policy.as_str().to_string();
        });
        Ok(())
    }

    #[wasm_bindgen]
    pub fn widget_diagnostics_json() -> String {
        DIAGNOSTICS.with(|state| {
            serde_json::to_string(&*state.borrow()).unwrap_or_else(|_| "{}".to_string())
        })
    }

    #[wasm_bindgen(js_name = doRequestAccountPage)]
    pub fn request_account_link(form: HtmlFormElement) -> bool {
        spawn_local(async move {
            let _ = run_account_link(form).await;
        });
        false
    }

    #[wasm_bindgen(js_name = doRequestAccountPageAsync)]
    pub fn request_account_link_async(form: HtmlFormElement) -> js_sys::Promise {
        future_to_promise(async move {
            to_promise_result(run_account_link(form).await, |()| JsValue::TRUE)
        })
    }

    #[wasm_bindgen(js_name = changeSubscription)]
    pub fn change_subscription(timsi: String, channel_id: String, el: HtmlInputElement) -> bool {
        spawn_local(async move {
            let _ = run_change_subscription(timsi, channel_id, el).await;
        });
        false
    }

    #[wasm_bindgen(js_name = changeSubscriptionAsync)]
    pub fn change_subscription_async(
        timsi: String,
        channel_id: String,
        el: HtmlInputElement,
    ) -> js_sys::Promise {
        future_to_promise(async move {
            to_promise_result(run_change_subscription(timsi, channel_id, el).await, |state| {
                JsValue::from_str(state.as_str())
            })
        })
    }

    #[wasm_bindgen(js_name = doPostUnsubscribe)]
    pub fn post_unsubscribe(user_id: String, channel_id: String, el: Element) -> bool {
        spawn_local(async move {
            let _ = run_unsubscribe(user_id, channel_id, el).await;
        });
        false
    }

    #[wasm_bindgen(js_name = doPostUnsubscribeAsync)]
    pub fn post_unsubscribe_async(user_id: String, channel_id: String, el: Element) -> js_sys::Promise {
        future_to_promise(async move {
            to_promise_result(run_unsubscribe(user_id, channel_id, el).await, |()| JsValue::TRUE)
        })
    }

    fn current_config() -> WidgetConfig {
        CONFIG.with(|config| config.borrow().clone())
    }

    fn record<T>(flow: WidgetFlow, outcome: &HandlerOutcome<T>) {
        DIAGNOSTICS.with(|diagnostics| diagnostics.borrow_mut().record(flow, &outcome.result));
    }

    fn to_promise_result<T>(
        outcome: HandlerOutcome<T>,
        on_success: impl FnOnce(T) -> JsValue,
    ) -> Result<JsValue, JsValue> {
        outcome
            .into_result()
            .map(on_success)
            .map_err(|error: RequestError| JsValue::from_str(&error.to_string()))
    }

    async fn run_account_link(form: HtmlFormElement) -> HandlerOutcome {
        let config = current_config();
        let requester = AccountLinkRequester::new(GlooTransport::new(config));
        let outcome = requester.request_account_link(&DomLinkForm::new(form)).await;
        record(WidgetFlow::AccountLink, &outcome);
        outcome
    }

    async fn run_change_subscription(
        timsi: String,
        channel_id: String,
        el: HtmlInputElement,
    ) -> HandlerOutcome<ckmailer_client_core::SubscriptionState> {
        let config = current_config();
        let toggler = SubscriptionToggler::new(GlooTransport::new(config.clone()), DomRegistry, &config);
        let control = SubscriptionControl::new(timsi, channel_id, DomCheckbox::new(el));
        let outcome = toggler.change_subscription(&control).await;
        record(WidgetFlow::ChangeSubscription, &outcome);
        outcome
    }

    async fn run_unsubscribe(user_id: String, channel_id: String, el: Element) -> HandlerOutcome {
        let config = current_config();
        let action = UnsubscribeAction::new(GlooTransport::new(config.clone()), DomRegistry, &config);
        let control = UnsubscribeControl::new(user_id, channel_id, DomTrigger::new(el));
        let outcome = action.post_unsubscribe(&control).await;
        record(WidgetFlow::Unsubscribe, &outcome);
        outcome
    }
}
