//! Offline user-agent classification.

use woothee::parser::Parser;

use crate::domain::entities::DeviceClass;
use crate::domain::entities::stats::UNKNOWN;

/// Device attributes extracted from a user agent string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device: DeviceClass,
    pub os: String,
    pub browser: String,
}

/// Parses user agents with woothee. Never fails: unrecognized input yields
/// a desktop device with unknown OS and browser.
pub struct DeviceParser {
    parser: Parser,
}

impl Default for DeviceParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceParser {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    pub fn parse(&self, user_agent: &str) -> DeviceInfo {
        let result = if user_agent.trim().is_empty() {
            None
        } else {
            self.parser.parse(user_agent)
        };

        let Some(result) = result else {
            return DeviceInfo {
                device: DeviceClass::Desktop,
                os: UNKNOWN.to_string(),
                browser: UNKNOWN.to_string(),
            };
        };

        let device = match &*result.category {
            "smartphone" | "mobilephone" => DeviceClass::Mobile,
            _ => DeviceClass::Desktop,
        };

        DeviceInfo {
            device,
            os: known_or_unknown(&result.os),
            browser: known_or_unknown(&result.name),
        }
    }
}

fn known_or_unknown(value: &str) -> String {
    if value.is_empty() || value == "UNKNOWN" {
        UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}
