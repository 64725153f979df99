//! UI capabilities the flows need from the surrounding page.
//!
//! Handles take `&self` because DOM elements are shared references; setters go
//! through the browser's own interior mutability (or a `RefCell` in memory).

use crate::error::RequestError;

pub trait Disableable {
    fn is_disabled(&self) -> bool;
    fn set_disabled(&self, disabled: bool);
}

/// Checkbox-like control.
pub trait Checkable: Disableable {
    fn is_checked(&self) -> bool;
    fn set_checked(&self, checked: bool);
}

pub trait StatusLabel {
    fn text(&self) -> String;
    fn set_text(&self, text: &str);
}

/// Identifier lookup, replacing direct `getElementById` calls.
pub trait ElementRegistry {
    type Label: StatusLabel;

    fn lookup(&self, id: &str) -> Option<Self::Label>;

    fn require(&self, id: &str) -> Result<Self::Label, RequestError> {
        self.lookup(id).ok_or_else(|| RequestError::ElementNotFound { id: id.to_string() })
    }
}

impl<R: ElementRegistry + ?Sized> ElementRegistry for &R {
    type Label = R::Label;

    fn lookup(&self, id: &str) -> Option<Self::Label> {
        (**self).lookup(id)
    }
}
