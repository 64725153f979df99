pub mod account_link;
pub mod config;
pub mod elements;
pub mod error;
pub mod memory;
pub mod outcome;
pub mod subscription;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod transport;
pub mod unsubscribe;

pub use account_link::{AccountLinkRequester, FormState, LinkForm, LinkRequestForm};
pub use config::{ConfigError, FailurePolicy, StatusText, WidgetConfig};
pub use elements::{Checkable, Disableable, ElementRegistry, StatusLabel};
pub use error::{RequestError, RequestErrorKind};
pub use outcome::HandlerOutcome;
pub use subscription::{
    SubscriptionControl, SubscriptionState, SubscriptionToggler, TogglePhase, ToggleSettlement,
};
pub use transport::{Endpoint, FormBody, HttpCommandRequest, HttpResponse, RequestTransport};
pub use unsubscribe::{MESSAGE_LABEL_ID, UnsubscribeAction, UnsubscribeControl, UnsubscribePhase};
