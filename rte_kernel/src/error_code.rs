//! RTE Kernel: error taxonomy.
//!
//! Closed set of codes reported through GetLastError. Each code maps to a
//! numeric value and description per dialect; nothing here is ever raised.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;

/// The current error of a surface. Exactly one is current at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    NoError,
    GeneralException,
    InvalidArgument,
    ElementCannotHaveChildren,
    ElementNotArray,
    NotInitialized,
    NotImplemented,
    ReadOnlyElement,
    WriteOnlyElement,
    IncorrectDataType,
    AlreadyTerminated,
}

impl ErrorCode {
    /// Lookup order. Reverse lookup returns the first code whose number matches.
    pub const ALL: [ErrorCode; 11] = [
        ErrorCode::NoError,
        ErrorCode::GeneralException,
        ErrorCode::InvalidArgument,
        ErrorCode::ElementCannotHaveChildren,
        ErrorCode::ElementNotArray,
        ErrorCode::NotInitialized,
        ErrorCode::NotImplemented,
        ErrorCode::ReadOnlyElement,
        ErrorCode::WriteOnlyElement,
        ErrorCode::IncorrectDataType,
        ErrorCode::AlreadyTerminated,
    ];

    /// Numeric code as reported to content speaking `dialect`.
    pub fn number(self, dialect: Dialect) -> u16 {
        match dialect {
            Dialect::Legacy => match self {
                ErrorCode::NoError => 0,
                ErrorCode::GeneralException => 101,
                ErrorCode::InvalidArgument => 201,
                ErrorCode::ElementCannotHaveChildren => 202,
                ErrorCode::ElementNotArray => 203,
                ErrorCode::NotInitialized => 301,
                ErrorCode::NotImplemented => 401,
                ErrorCode::ReadOnlyElement => 403,
                ErrorCode::WriteOnlyElement => 404,
                ErrorCode::IncorrectDataType => 405,
                // SCORM 1.2 has no dedicated code for calls after LMSFinish.
                ErrorCode::AlreadyTerminated => 101,
            },
            Dialect::Current => match self {
                ErrorCode::NoError => 0,
                ErrorCode::GeneralException => 101,
                ErrorCode::InvalidArgument => 201,
                ErrorCode::ElementCannotHaveChildren => 301,
                ErrorCode::ElementNotArray => 301,
                ErrorCode::NotInitialized => 122,
                ErrorCode::NotImplemented => 402,
                ErrorCode::ReadOnlyElement => 404,
                ErrorCode::WriteOnlyElement => 405,
                ErrorCode::IncorrectDataType => 406,
                ErrorCode::AlreadyTerminated => 123,
            },
        }
    }

    /// Reverse lookup of a numeric code.
    pub fn from_number(number: u16, dialect: Dialect) -> Option<ErrorCode> {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.number(dialect) == number)
    }

    /// Parse the string argument of GetErrorString / GetDiagnostic.
    pub fn parse(text: &str, dialect: Dialect) -> Option<ErrorCode> {
        let number: u16 = text.trim().parse().ok()?;
        Self::from_number(number, dialect)
    }

    /// Short description, worded the way each generation's documentation does.
    pub fn description(self, dialect: Dialect) -> &'static str {
        match (self, dialect) {
            (ErrorCode::NoError, _) => "No error",
            (ErrorCode::GeneralException, Dialect::Legacy) => "General exception",
            (ErrorCode::GeneralException, Dialect::Current) => "General Exception",
            (ErrorCode::InvalidArgument, Dialect::Legacy) => "Invalid argument error",
            (ErrorCode::InvalidArgument, Dialect::Current) => "General Argument Error",
            (ErrorCode::ElementCannotHaveChildren, Dialect::Legacy) => {
                "Element cannot have children"
            }
            (ErrorCode::ElementNotArray, Dialect::Legacy) => {
                "Element not an array - cannot have count"
            }
            (ErrorCode::ElementCannotHaveChildren, Dialect::Current)
            | (ErrorCode::ElementNotArray, Dialect::Current) => "General Get Failure",
            (ErrorCode::NotInitialized, Dialect::Legacy) => "Not initialized",
            (ErrorCode::NotInitialized, Dialect::Current) => {
                "Retrieve Data Before Initialization"
            }
            (ErrorCode::NotImplemented, Dialect::Legacy) => "Not implemented error",
            (ErrorCode::NotImplemented, Dialect::Current) => {
                "Unimplemented Data Model Element"
            }
            (ErrorCode::ReadOnlyElement, Dialect::Legacy) => "Element is read only",
            (ErrorCode::ReadOnlyElement, Dialect::Current) => {
                "Data Model Element Is Read Only"
            }
            (ErrorCode::WriteOnlyElement, Dialect::Legacy) => "Element is write only",
            (ErrorCode::WriteOnlyElement, Dialect::Current) => {
                "Data Model Element Is Write Only"
            }
            (ErrorCode::IncorrectDataType, Dialect::Legacy) => "Incorrect data type",
            (ErrorCode::IncorrectDataType, Dialect::Current) => {
                "Data Model Element Type Mismatch"
            }
            (ErrorCode::AlreadyTerminated, Dialect::Legacy) => {
                "General exception: session already finished"
            }
            (ErrorCode::AlreadyTerminated, Dialect::Current) => {
                "Retrieve Data After Termination"
            }
        }
    }

    pub fn is_error(self) -> bool {
        self != ErrorCode::NoError
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
