use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Physical pin on the board, digital D0-D13 followed by analog A0-A5.
///
/// The wire protocol numbers pins consecutively from 0 to 19. Conversion from
/// a raw number only goes through [`parse_pin`], which rejects anything outside
/// the table instead of coercing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PinIdentifier {
    D0,
    D1,
    D2,
    D3,
    D4,
    D5,
    D6,
    D7,
    D8,
    D9,
    D10,
    D11,
    D12,
    D13,
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
}

impl PinIdentifier {
    /// Every known pin, indexed by its wire number.
    pub const ALL: [PinIdentifier; 20] = [
        PinIdentifier::D0,
        PinIdentifier::D1,
        PinIdentifier::D2,
        PinIdentifier::D3,
        PinIdentifier::D4,
        PinIdentifier::D5,
        PinIdentifier::D6,
        PinIdentifier::D7,
        PinIdentifier::D8,
        PinIdentifier::D9,
        PinIdentifier::D10,
        PinIdentifier::D11,
        PinIdentifier::D12,
        PinIdentifier::D13,
        PinIdentifier::A0,
        PinIdentifier::A1,
        PinIdentifier::A2,
        PinIdentifier::A3,
        PinIdentifier::A4,
        PinIdentifier::A5,
    ];

    /// Wire number of this pin.
    pub fn number(self) -> u8 {
        match self {
            PinIdentifier::D0 => 0,
            PinIdentifier::D1 => 1,
            PinIdentifier::D2 => 2,
            PinIdentifier::D3 => 3,
            PinIdentifier::D4 => 4,
            PinIdentifier::D5 => 5,
            PinIdentifier::D6 => 6,
            PinIdentifier::D7 => 7,
            PinIdentifier::D8 => 8,
            PinIdentifier::D9 => 9,
            PinIdentifier::D10 => 10,
            PinIdentifier::D11 => 11,
            PinIdentifier::D12 => 12,
            PinIdentifier::D13 => 13,
            PinIdentifier::A0 => 14,
            PinIdentifier::A1 => 15,
            PinIdentifier::A2 => 16,
            PinIdentifier::A3 => 17,
            PinIdentifier::A4 => 18,
            PinIdentifier::A5 => 19,
        }
    }

    pub fn is_analog(self) -> bool {
        self.number() >= 14
    }

    pub fn name(self) -> &'static str {
        match self {
            PinIdentifier::D0 => "D0",
            PinIdentifier::D1 => "D1",
            PinIdentifier::D2 => "D2",
            PinIdentifier::D3 => "D3",
            PinIdentifier::D4 => "D4",
            PinIdentifier::D5 => "D5",
            PinIdentifier::D6 => "D6",
            PinIdentifier::D7 => "D7",
            PinIdentifier::D8 => "D8",
            PinIdentifier::D9 => "D9",
            PinIdentifier::D10 => "D10",
            PinIdentifier::D11 => "D11",
            PinIdentifier::D12 => "D12",
            PinIdentifier::D13 => "D13",
            PinIdentifier::A0 => "A0",
            PinIdentifier::A1 => "A1",
            PinIdentifier::A2 => "A2",
            PinIdentifier::A3 => "A3",
            PinIdentifier::A4 => "A4",
            PinIdentifier::A5 => "A5",
        }
    }
}

/// Looks up a wire pin number in the known pin table.
pub fn parse_pin(number: i64) -> Option<PinIdentifier> {
    usize::try_from(number)
        .ok()
        .and_then(|index| PinIdentifier::ALL.get(index).copied())
}

impl fmt::Display for PinIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown pin name: {0}")]
pub struct UnknownPinName(pub String);

impl FromStr for PinIdentifier {
    type Err = UnknownPinName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PinIdentifier::ALL
            .iter()
            .copied()
            .find(|pin| pin.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownPinName(s.to_string()))
    }
}

impl TryFrom<String> for PinIdentifier {
    type Error = UnknownPinName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PinIdentifier> for String {
    fn from(pin: PinIdentifier) -> Self {
        pin.name().to_string()
    }
}

/// One normalized reading from the board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinSample {
    pub pin: PinIdentifier,
    /// Always within `[0.0, 1.0]`
    pub value: f32,
}

impl PinSample {
    /// Builds a sample, clamping the value into `[0.0, 1.0]`.
    pub fn new(pin: PinIdentifier, value: f32) -> Self {
        Self {
            pin,
            value: clamp_unit(value),
        }
    }
}

/// Clamps into `[0.0, 1.0]`. NaN maps to 0.0.
pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
