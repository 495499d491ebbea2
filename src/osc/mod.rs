//! OSC value model and address conventions
//!
//! Parameter names are stored namespace-free; the transmission prefix is
//! added exactly once here, at the transport boundary.

pub mod listener;
pub mod sender;

use std::fmt;

use rosc::OscType;
use serde::{Deserialize, Serialize};

pub use listener::ChangeListener;
pub use sender::ParameterSender;

/// Address prefix for avatar parameter endpoints
pub const AVATAR_PARAMETERS_PREFIX: &str = "/avatar/parameters/";

/// Address of the avatar change notification endpoint
pub const AVATAR_CHANGE_ADDRESS: &str = "/avatar/change";

/// Full transmission address for a namespace-free parameter name
pub fn parameter_address(name: &str) -> String {
    format!("{AVATAR_PARAMETERS_PREFIX}{name}")
}

/// One scalar parameter value
///
/// Booleans are never coerced to numbers. Integers and floats keep their
/// JSON representation; floats persist at full precision and are only
/// rounded for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl ParamValue {
    /// Convert a JSON scalar into a parameter value; non-scalar or string
    /// values yield None
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(ParamValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(ParamValue::Int(i))
                } else {
                    n.as_f64().map(ParamValue::Float)
                }
            }
            _ => None,
        }
    }

    /// OSC argument for this value
    ///
    /// Integers go out as int32 and floats as float32, matching the remote
    /// input types.
    pub fn to_osc(self) -> OscType {
        match self {
            ParamValue::Bool(b) => OscType::Bool(b),
            ParamValue::Int(i) => OscType::Int(i as i32),
            ParamValue::Float(f) => OscType::Float(f as f32),
        }
    }
}

impl fmt::Display for ParamValue {
    /// Display form rounds floats to 2 decimals; stored values keep full precision
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) => write!(f, "{v:.2}"),
        }
    }
}
