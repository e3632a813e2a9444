//! RTE Kernel: scripted call sequences
//!
//! A call script is a JSON list of surface calls with expected results,
//! used by the golden tests and the conformance harness.

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::state::LaunchContext;
use crate::surface::RteSurface;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallScript {
    pub name: String,
    #[serde(default)]
    pub launch: LaunchContext,
    pub calls: Vec<ScriptedCall>,
    /// Canonical hash of the persisted values after the last call.
    #[serde(default)]
    pub expected_hash: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptedCall {
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Expected return value; unchecked when absent.
    #[serde(default)]
    pub expect: Option<String>,
    /// Expected error number right after the call.
    #[serde(default)]
    pub error: Option<String>,
}

impl ScriptedCall {
    /// Dialect implied by the function name.
    pub fn dialect(&self) -> Dialect {
        if self.function.starts_with("LMS") {
            Dialect::Legacy
        } else {
            Dialect::Current
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub result: String,
    pub error: String,
    pub passed: bool,
}

/// Run one scripted call and compare against its expectations.
pub fn run_call(surface: &mut RteSurface, call: &ScriptedCall) -> CallOutcome {
    let args: Vec<&str> = call.args.iter().map(String::as_str).collect();
    let result = surface.invoke(&call.function, &args);
    let error = surface.last_error().number(call.dialect()).to_string();

    let result_ok = call.expect.as_ref().map_or(true, |e| *e == result);
    let error_ok = call.error.as_ref().map_or(true, |e| *e == error);

    CallOutcome {
        result,
        error,
        passed: result_ok && error_ok,
    }
}
