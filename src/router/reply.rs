//! Values a request handler may produce, and their coercion into responses.

use std::any::{type_name, Any};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::parser::HttpRequest;
use crate::server::{HttpResponse, StatusCode};

/// What a handler returned.
///
/// Handlers usually return one of the types that convert into `Reply`
/// (`HttpResponse`, `String`, `&str`, `serde_json::Value`, `Vec<T>`, maps,
/// `()` or `Option<_>`) and let the router wrap it.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A complete response, passed through unchanged.
    Response(HttpResponse),
    /// `200 text/plain`.
    Text(String),
    /// `200 application/json`, pretty-printed. Only objects and arrays.
    Json(Value),
    /// `204 No Content`.
    Empty,
    /// A value that has no response form; carries the offending type's name.
    Invalid(&'static str),
}

impl Reply {
    /// Serialize any value as structured data.
    ///
    /// Values that do not serialize to a JSON object or array are invalid.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => Reply::Json(value),
            _ => Reply::Invalid(type_name::<T>()),
        }
    }

    /// A reply for a value that cannot become a response.
    pub fn invalid<T: ?Sized>() -> Self {
        Reply::Invalid(type_name::<T>())
    }

    /// Coerce into a response; `None` for [`Reply::Invalid`].
    pub fn into_response(self) -> Option<HttpResponse> {
        match self {
            Reply::Response(response) => Some(response),
            Reply::Text(text) => Some(HttpResponse::plain_text(StatusCode::Ok, text)),
            Reply::Json(value) => HttpResponse::new(StatusCode::Ok).with_pretty_json(&value).ok(),
            Reply::Empty => Some(HttpResponse::new(StatusCode::NoContent)),
            Reply::Invalid(_) => None,
        }
    }
}

impl From<HttpResponse> for Reply {
    fn from(response: HttpResponse) -> Self {
        Reply::Response(response)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(_) | Value::Array(_) => Reply::Json(value),
            Value::String(text) => Reply::Text(text),
            Value::Null => Reply::Empty,
            Value::Bool(_) => Reply::Invalid("bool"),
            Value::Number(_) => Reply::Invalid("number"),
        }
    }
}

impl<T: Serialize> From<Vec<T>> for Reply {
    fn from(items: Vec<T>) -> Self {
        Reply::json(&items)
    }
}

impl<V: Serialize> From<HashMap<String, V>> for Reply {
    fn from(map: HashMap<String, V>) -> Self {
        Reply::json(&map)
    }
}

impl<V: Serialize> From<BTreeMap<String, V>> for Reply {
    fn from(map: BTreeMap<String, V>) -> Self {
        Reply::json(&map)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(value: Option<T>) -> Self {
        value.map_or(Reply::Empty, Into::into)
    }
}

// A request is not a response; handlers that hand one back are misconfigured.
impl From<HttpRequest> for Reply {
    fn from(_: HttpRequest) -> Self {
        Reply::invalid::<HttpRequest>()
    }
}

/// Failure raised by a request handler.
///
/// Any `std::error::Error` converts into it with `?`, recording the error's
/// type name as its kind. The dispatcher turns it into a `500` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    kind: String,
    message: String,
}

impl HandlerError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// An error with only a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::new("HandlerError", message.to_string())
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };
        Self::new("panic", message)
    }
}

impl<E: std::error::Error + 'static> From<E> for HandlerError {
    fn from(error: E) -> Self {
        Self::new(type_name::<E>(), error.to_string())
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
