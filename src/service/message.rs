//! Request and response messages.

use std::any::Any;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Structural validation failure reported by [`Message::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A message exchanged by a service method.
///
/// `Default` provides the blank value HTTP decoding starts from, so every
/// field a client may omit must have a sensible default.
pub trait Message: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// Structural checks run before the handler. Accepts everything by default.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Type-erased [`Message`], the value that flows through interceptors.
pub trait AnyMessage: Send + Sync + 'static {
    fn validate(&self) -> Result<(), ValidationError>;

    fn to_json(&self) -> Result<Value, serde_json::Error>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Message> AnyMessage for T {
    fn validate(&self) -> Result<(), ValidationError> {
        Message::validate(self)
    }

    fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Boxed message passed between transports, interceptors and handlers.
pub type Payload = Box<dyn AnyMessage>;

/// Borrow the concrete message behind a payload.
pub fn downcast_ref<T: Message>(payload: &Payload) -> Option<&T> {
    payload.as_any().downcast_ref::<T>()
}

impl Message for () {}
