use super::*;

use ckmailer_client_core::{Checkable, Disableable, ElementRegistry, FormState, LinkForm, StatusLabel};
use wasm_bindgen::JsCast;
use web_sys::HtmlElement;

const FORM_STATE_ATTRIBUTE: &str = "data-state";
const FORM_STATE_EXPANDO: &str = "state";

pub(super) struct DomCheckbox(HtmlInputElement);

impl DomCheckbox {
    pub(super) fn new(input: HtmlInputElement) -> Self {
        Self(input)
    }
}

impl Disableable for DomCheckbox {
    fn is_disabled(&self) -> bool {
        self.0.disabled()
    }

    fn set_disabled(&self, disabled: bool) {
        self.0.set_disabled(disabled);
    }
}

impl Checkable for DomCheckbox {
    fn is_checked(&self) -> bool {
        self.0.checked()
    }

    fn set_checked(&self, checked: bool) {
        self.0.set_checked(checked);
    }
}

/// Any element acting as an unsubscribe trigger; disabled through the attribute.
pub(super) struct DomTrigger(Element);

impl DomTrigger {
    pub(super) fn new(element: Element) -> Self {
        Self(element)
    }
}

impl Disableable for DomTrigger {
    fn is_disabled(&self) -> bool {
        self.0.has_attribute("disabled")
    }

    fn set_disabled(&self, disabled: bool) {
        let result = if disabled {
            self.0.set_attribute("disabled", "")
        } else {
            self.0.remove_attribute("disabled")
        };
        if result.is_err() {
            tracing::warn!(disabled, "failed to update trigger disabled attribute");
        }
    }
}

pub(super) struct DomLabel(HtmlElement);

impl StatusLabel for DomLabel {
    fn text(&self) -> String {
        self.0.inner_text()
    }

    fn set_text(&self, text: &str) {
        self.0.set_inner_text(text);
    }
}

/// Resolves labels from the live document on every lookup.
pub(super) struct DomRegistry;

impl ElementRegistry for DomRegistry {
    type Label = DomLabel;

    fn lookup(&self, id: &str) -> Option<DomLabel> {
        web_sys::window()?
            .document()?
            .get_element_by_id(id)?
            .dyn_into::<HtmlElement>()
            .ok()
            .map(DomLabel)
    }
}

pub(super) struct DomLinkForm(HtmlFormElement);

impl DomLinkForm {
    pub(super) fn new(form: HtmlFormElement) -> Self {
        Self(form)
    }

    fn field_value(&self, name: &str) -> Option<String> {
        self.0
            .elements()
            .named_item(name)?
            .dyn_into::<HtmlInputElement>()
            .ok()
            .map(|input| input.value())
    }

    fn legacy_submitted(&self) -> bool {
        js_sys::Reflect::get(&self.0, &JsValue::from_str(FORM_STATE_EXPANDO))
            .ok()
            .and_then(|value| value.as_f64())
            .is_some_and(|value| (value - 1.0).abs() < f64::EPSILON)
    }
}

impl LinkForm for DomLinkForm {
    fn email(&self) -> String {
        self.field_value("email").unwrap_or_default()
    }

    fn highlight(&self) -> Option<String> {
        self.field_value("highlight")
    }

    fn state(&self) -> FormState {
        match self.0.get_attribute(FORM_STATE_ATTRIBUTE) {
            Some(raw) => FormState::parse(&raw),
            None if self.legacy_submitted() => FormState::Submitted,
            None => FormState::Unsubmitted,
        }
    }

    fn set_state(&self, state: FormState) {
        if self.0.set_attribute(FORM_STATE_ATTRIBUTE, state.as_str()).is_err() {
            tracing::warn!(state = state.as_str(), "failed to record form state attribute");
        }
        // Page scripts written against the old widget read `form.state == 1`.
        let expando = match state {
            FormState::Submitted => JsValue::from_f64(1.0),
            FormState::Unsubmitted | FormState::Pending => JsValue::UNDEFINED,
        };
        if js_sys::Reflect::set(&self.0, &JsValue::from_str(FORM_STATE_EXPANDO), &expando).is_err() {
            tracing::warn!("failed to record form state expando");
        }
    }
}
