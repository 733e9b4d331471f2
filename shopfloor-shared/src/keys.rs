use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order identifier, allocated by the order store's sequence.
pub type OrderNumber = i64;

/// Identity of an order line: order number plus item sequence number.
///
/// The shop floor scans these as a single "order string", the order number
/// followed by a two digit item number (`100102` is item 2 of order 1001).
/// Reports print the dotted form `1001.02`; both parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub order_number: OrderNumber,
    pub item_number: i32,
}

impl ItemKey {
    pub fn new(order_number: OrderNumber, item_number: i32) -> Self {
        Self { order_number, item_number }
    }

    /// Report label, e.g. `1001.02`
    pub fn dotted(&self) -> String {
        format!("{}.{:02}", self.order_number, self.item_number)
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", self.order_number, self.item_number)
    }
}

impl FromStr for ItemKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (order, item) = match s.split_once('.') {
            Some((order, item)) => (order, item),
            None => {
                if s.len() < 3 || !s.is_ascii() {
                    return Err(KeyParseError::TooShort(s.to_string()));
                }
                s.split_at(s.len() - 2)
            }
        };

        let order_number = parse_digits(order, s)?;
        let item_number = parse_digits(item, s)?;
        let item_number =
            i32::try_from(item_number).map_err(|_| KeyParseError::NotNumeric(s.to_string()))?;

        Ok(Self { order_number, item_number })
    }
}

fn parse_digits(part: &str, whole: &str) -> Result<i64, KeyParseError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(KeyParseError::NotNumeric(whole.to_string()));
    }
    part.parse()
        .map_err(|_| KeyParseError::NotNumeric(whole.to_string()))
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("Order string too short: {0}")]
    TooShort(String),

    #[error("Order string is not numeric: {0}")]
    NotNumeric(String),
}
