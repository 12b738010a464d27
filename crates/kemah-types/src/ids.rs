use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length of a freshly generated identifier.
pub const CODE_LEN: usize = 8;

/// Longest identifier accepted when parsing (officers sometimes paste
/// longer references into the sheet by hand).
const MAX_LEN: usize = 64;

/// Draw codes until one would stay text in a spreadsheet cell. `00012345`
/// or `123456E7` typed into a sheet become numbers and read back as
/// `12345` or `1.23456E+12`, after which the row can no longer be found.
fn generate_code() -> String {
    loop {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        let code = uuid[..CODE_LEN].to_ascii_uppercase();
        if !reads_as_number(&code) {
            return code;
        }
    }
}

/// Returns `true` if a spreadsheet would parse `code` as a number: only
/// digits, or digits around a single exponent `E`.
pub fn reads_as_number(code: &str) -> bool {
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match code.split_once(['E', 'e']) {
        Some((mantissa, exponent)) => all_digits(mantissa) && all_digits(exponent),
        None => all_digits(code),
    }
}

fn validate(value: &str) -> Result<String, TypeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TypeError::InvalidId {
            value: value.to_string(),
            reason: "empty",
        });
    }
    if trimmed.len() > MAX_LEN {
        return Err(TypeError::InvalidId {
            value: value.to_string(),
            reason: "too long",
        });
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(TypeError::InvalidId {
            value: value.to_string(),
            reason: "only ASCII letters, digits, '-' and '_' are allowed",
        });
    }
    Ok(trimmed.to_string())
}

/// Identifier of a marketplace order (the sheet's `Order ID` column).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderId(String);

impl OrderId {
    /// Generate a new random 8-character uppercase id.
    ///
    /// Uniqueness against existing rows is the caller's responsibility.
    pub fn generate() -> Self {
        Self(generate_code())
    }

    /// Parse an id read from the sheet or a request path.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        validate(value).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderId({})", self.0)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OrderId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderId> for String {
    fn from(id: OrderId) -> Self {
        id.0
    }
}

/// Ticket code of an event booking (the sheet's `Reservation ID` column).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TicketCode(String);

impl TicketCode {
    /// Generate a new random 8-character uppercase ticket code.
    pub fn generate() -> Self {
        Self(generate_code())
    }

    pub fn parse(value: &str) -> Result<Self, TypeError> {
        validate(value).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TicketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TicketCode({})", self.0)
    }
}

impl fmt::Display for TicketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TicketCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TicketCode {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TicketCode> for String {
    fn from(code: TicketCode) -> Self {
        code.0
    }
}
