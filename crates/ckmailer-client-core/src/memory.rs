//! In-memory page model used by the headless CLI and by tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;

use crate::elements::{Checkable, Disableable, ElementRegistry, StatusLabel};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ElementSnapshot {
    pub checked: bool,
    pub disabled: bool,
    pub text: String,
}

/// Shared handle; clones observe the same element.
#[derive(Debug, Clone, Default)]
pub struct MemoryElement {
    state: Rc<RefCell<ElementSnapshot>>,
}

impl MemoryElement {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn checkbox(checked: bool) -> Self {
        let element = Self::new();
        element.set_checked(checked);
        element
    }

    #[must_use]
    pub fn label(text: &str) -> Self {
        let element = Self::new();
        element.set_text(text);
        element
    }

    #[must_use]
    pub fn snapshot(&self) -> ElementSnapshot {
        self.state.borrow().clone()
    }
}

impl Disableable for MemoryElement {
    fn is_disabled(&self) -> bool {
        self.state.borrow().disabled
    }

    fn set_disabled(&self, disabled: bool) {
        self.state.borrow_mut().disabled = disabled;
    }
}

impl Checkable for MemoryElement {
    fn is_checked(&self) -> bool {
        self.state.borrow().checked
    }

    fn set_checked(&self, checked: bool) {
        self.state.borrow_mut().checked = checked;
    }
}

impl StatusLabel for MemoryElement {
    fn text(&self) -> String {
        self.state.borrow().text.clone()
    }

    fn set_text(&self, text: &str) {
        text.clone_into(&mut self.state.borrow_mut().text);
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    elements: Rc<RefCell<HashMap<String, MemoryElement>>>,
}

impl MemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a label under `id` (replacing any previous one) and returns it.
    pub fn insert_label(&self, id: impl Into<String>) -> MemoryElement {
        let element = MemoryElement::new();
        self.elements.borrow_mut().insert(id.into(), element.clone());
        element
    }

    pub fn remove(&self, id: &str) -> Option<MemoryElement> {
        self.elements.borrow_mut().remove(id)
    }

    #[must_use]
    pub fn text_of(&self, id: &str) -> Option<String> {
        self.elements.borrow().get(id).map(StatusLabel::text)
    }
}

impl ElementRegistry for MemoryRegistry {
    type Label = MemoryElement;

    fn lookup(&self, id: &str) -> Option<Self::Label> {
        self.elements.borrow().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;

    #[test]
    fn clones_share_state() {
        let element = MemoryElement::checkbox(true);
        let observer = element.clone();
        element.set_disabled(true);
        assert!(observer.is_disabled());
        assert!(observer.is_checked());
    }

    #[test]
    fn require_reports_missing_ids() {
        let registry = MemoryRegistry::new();
        registry.insert_label("message");
        assert!(registry.require("message").is_ok());
        assert_eq!(
            registry.require("c7").err(),
            Some(RequestError::ElementNotFound {
                id: "c7".to_string()
            })
        );
    }

    #[test]
    fn removed_labels_disappear() {
        let registry = MemoryRegistry::new();
        let label = registry.insert_label("42");
        label.set_text("Afgemeld!");
        assert_eq!(registry.text_of("42").as_deref(), Some("Afgemeld!"));
        registry.remove("42");
        assert!(registry.lookup("42").is_none());
    }
}
