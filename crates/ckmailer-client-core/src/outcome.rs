use crate::error::RequestError;

/// What a UI handler reports back.
///
/// Page handlers never want the browser's native form submission or link
/// navigation to run, so `prevents_default` is constant and independent of
/// `result`. The result carries the actual success or failure.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct HandlerOutcome<T = ()> {
    pub result: Result<T, RequestError>,
}

impl<T> HandlerOutcome<T> {
    pub fn new(result: Result<T, RequestError>) -> Self {
        Self { result }
    }

    pub fn prevents_default(&self) -> bool {
        true
    }

    /// Value for inline `onsubmit="return ..."` handlers.
    pub fn return_value(&self) -> bool {
        !self.prevents_default()
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&RequestError> {
        self.result.as_ref().err()
    }

    pub fn into_result(self) -> Result<T, RequestError> {
        self.result
    }
}

impl<T> From<Result<T, RequestError>> for HandlerOutcome<T> {
    fn from(result: Result<T, RequestError>) -> Self {
        Self::new(result)
    }
}
