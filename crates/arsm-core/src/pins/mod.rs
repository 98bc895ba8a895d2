//! Pin addressing.
//!
//! Single-board computers expose the same header pin under several numbering
//! schemes. This module normalizes user supplied identifiers (`27`, `"13p"`,
//! `"2w"`) into a [`PinAddress`] and converts ordinals between schemes using
//! the board's [`ConversionTable`].
//!
//! Nothing here fails: unparsable identifiers fall back to the resolver's
//! defaults and unmappable conversions return [`NO_MAPPING`].

mod table;

pub use table::{BoardLayout, ConversionTable, HEADER_SLOTS, LINE_COUNT};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel returned when an ordinal has no meaning in the target scheme.
pub const NO_MAPPING: i32 = -1;

/// Ordinal used when an identifier carries no parsable number.
pub const DEFAULT_FALLBACK_PIN: i32 = 2;

/// Pin numbering scheme.
///
/// The integer values are stable and part of the public contract.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinSystem {
    /// Broadcom (BCM) logical GPIO numbering.
    #[default]
    Gpio = 0,
    /// Physical header position, 1-based.
    Phys = 1,
    /// WiringPi sequential numbering.
    WiringPi = 2,
    /// Non-physical or sysfs-exported pins. No conversion table applies.
    #[serde(alias = "sys")]
    Virtual = 3,
}

impl PinSystem {
    /// Alias for the sysfs scheme, which shares the virtual scheme's value.
    pub const SYS: PinSystem = PinSystem::Virtual;

    /// All schemes, in value order.
    pub const ALL: [PinSystem; 4] = [
        PinSystem::Gpio,
        PinSystem::Phys,
        PinSystem::WiringPi,
        PinSystem::Virtual,
    ];

    /// Map an identifier suffix letter to a scheme.
    ///
    /// The lookup is case-insensitive; unknown letters return `None`.
    pub fn from_suffix(suffix: char) -> Option<Self> {
        match suffix.to_ascii_lowercase() {
            'g' => Some(PinSystem::Gpio),
            'p' => Some(PinSystem::Phys),
            'w' => Some(PinSystem::WiringPi),
            'v' | 's' => Some(PinSystem::Virtual),
            _ => None,
        }
    }

    /// Canonical suffix letter for this scheme.
    pub fn suffix(self) -> char {
        match self {
            PinSystem::Gpio => 'g',
            PinSystem::Phys => 'p',
            PinSystem::WiringPi => 'w',
            PinSystem::Virtual => 'v',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PinSystem::Gpio => "gpio",
            PinSystem::Phys => "phys",
            PinSystem::WiringPi => "wiring_pi",
            PinSystem::Virtual => "virtual",
        }
    }

    /// Whether the scheme has a column in the conversion tables.
    pub fn is_tabulated(self) -> bool {
        !matches!(self, PinSystem::Virtual)
    }
}

impl fmt::Display for PinSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PinSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpio" | "bcm" | "g" => Ok(PinSystem::Gpio),
            "phys" | "physical" | "p" => Ok(PinSystem::Phys),
            "wiring_pi" | "wiringpi" | "wpi" | "w" => Ok(PinSystem::WiringPi),
            "virtual" | "sys" | "v" | "s" => Ok(PinSystem::Virtual),
            other => Err(format!("unknown pin system: {}", other)),
        }
    }
}

impl TryFrom<i32> for PinSystem {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        PinSystem::ALL
            .into_iter()
            .find(|system| *system as i32 == value)
            .ok_or(value)
    }
}

/// A resolved `(ordinal, scheme)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinAddress {
    pub ordinal: i32,
    pub system: PinSystem,
}

impl PinAddress {
    pub const fn new(ordinal: i32, system: PinSystem) -> Self {
        Self { ordinal, system }
    }

    pub const fn gpio(ordinal: i32) -> Self {
        Self::new(ordinal, PinSystem::Gpio)
    }

    pub const fn phys(ordinal: i32) -> Self {
        Self::new(ordinal, PinSystem::Phys)
    }

    pub const fn wiring_pi(ordinal: i32) -> Self {
        Self::new(ordinal, PinSystem::WiringPi)
    }
}

impl fmt::Display for PinAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.ordinal, self.system.suffix())
    }
}

/// A pin as supplied by a caller, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinIdentifier {
    /// Bare ordinal in the resolver's default scheme.
    Ordinal(i32),
    /// Number with an optional scheme suffix, e.g. `"13p"`.
    Tagged(String),
}

impl From<i32> for PinIdentifier {
    fn from(ordinal: i32) -> Self {
        PinIdentifier::Ordinal(ordinal)
    }
}

impl From<&str> for PinIdentifier {
    fn from(text: &str) -> Self {
        PinIdentifier::Tagged(text.to_string())
    }
}

impl From<String> for PinIdentifier {
    fn from(text: String) -> Self {
        PinIdentifier::Tagged(text)
    }
}

/// Stateless translator between identifiers and numbering schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinResolver {
    layout: BoardLayout,
    default_system: PinSystem,
    fallback_pin: i32,
}

impl Default for PinResolver {
    fn default() -> Self {
        Self::new(BoardLayout::default())
    }
}

impl PinResolver {
    /// Create a resolver for `layout` with GPIO as the default scheme.
    pub fn new(layout: BoardLayout) -> Self {
        Self {
            layout,
            default_system: PinSystem::Gpio,
            fallback_pin: DEFAULT_FALLBACK_PIN,
        }
    }

    /// Set the scheme assumed when an identifier has no suffix.
    pub fn with_default_system(mut self, system: PinSystem) -> Self {
        self.default_system = system;
        self
    }

    /// Set the ordinal used when an identifier has no parsable number.
    pub fn with_fallback_pin(mut self, pin: i32) -> Self {
        self.fallback_pin = pin;
        self
    }

    pub fn layout(&self) -> BoardLayout {
        self.layout
    }

    pub fn default_system(&self) -> PinSystem {
        self.default_system
    }

    pub fn fallback_pin(&self) -> i32 {
        self.fallback_pin
    }

    /// Resolve an identifier to an address.
    pub fn parse(&self, identifier: &PinIdentifier) -> PinAddress {
        match identifier {
            PinIdentifier::Ordinal(ordinal) => PinAddress::new(*ordinal, self.default_system),
            PinIdentifier::Tagged(text) => self.parse_str(text),
        }
    }

    /// Resolve a textual identifier such as `"27"`, `"13P"` or `"3w"`.
    ///
    /// A trailing letter selects the scheme; an unknown letter falls back to the
    /// default scheme. The leading integer of what remains is the ordinal; if
    /// there is none the fallback pin is used.
    pub fn parse_str(&self, text: &str) -> PinAddress {
        let text = text.trim().to_ascii_lowercase();
        let (number, suffix) = match text.chars().last() {
            Some(last) if last.is_ascii_alphabetic() => (&text[..text.len() - 1], Some(last)),
            _ => (text.as_str(), None),
        };

        let system = suffix
            .and_then(PinSystem::from_suffix)
            .unwrap_or(self.default_system);
        let ordinal = leading_integer(number).unwrap_or(self.fallback_pin);

        PinAddress::new(ordinal, system)
    }

    /// Convert `ordinal` from one scheme to another.
    ///
    /// Returns [`NO_MAPPING`] for ordinals outside the table domain or without
    /// hardware meaning in the target scheme. Same-scheme conversion is the
    /// identity for every in-domain ordinal; virtual ordinals are in domain
    /// when non-negative.
    pub fn convert(&self, ordinal: i32, from: PinSystem, to: PinSystem) -> i32 {
        if from == to {
            return match ConversionTable::max_ordinal(from) {
                Some(max) if !(0..=max).contains(&ordinal) => NO_MAPPING,
                None if ordinal < 0 => NO_MAPPING,
                _ => ordinal,
            };
        }

        let table = self.layout.table();
        let gpio = table.to_gpio(ordinal, from);
        if gpio == NO_MAPPING {
            return NO_MAPPING;
        }
        table.from_gpio(gpio, to)
    }

    /// Convert `ordinal` from the default scheme to `to`.
    pub fn convert_to(&self, ordinal: i32, to: PinSystem) -> i32 {
        self.convert(ordinal, self.default_system, to)
    }

    /// Convert `ordinal` from `from` to GPIO numbering.
    pub fn to_gpio(&self, ordinal: i32, from: PinSystem) -> i32 {
        self.convert(ordinal, from, PinSystem::Gpio)
    }

    /// Convert a resolved address to `to`.
    pub fn convert_address(&self, address: PinAddress, to: PinSystem) -> i32 {
        self.convert(address.ordinal, address.system, to)
    }
}

/// Convert with the default rev 2 layout.
pub fn convert_pin(ordinal: i32, from: PinSystem, to: PinSystem) -> i32 {
    PinResolver::default().convert(ordinal, from, to)
}

/// Parse an optional sign followed by ASCII digits at the start of `text`.
fn leading_integer(text: &str) -> Option<i32> {
    let text = text.trim_start();
    let sign_len = usize::from(text.starts_with(['-', '+']));
    let digits = text[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len() - sign_len);

    if digits == 0 {
        return None;
    }
    text[..sign_len + digits].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_system_values() {
        assert_eq!(PinSystem::Gpio as i32, 0);
        assert_eq!(PinSystem::Phys as i32, 1);
        assert_eq!(PinSystem::WiringPi as i32, 2);
        assert_eq!(PinSystem::Virtual as i32, 3);
        assert_eq!(PinSystem::SYS, PinSystem::Virtual);
        assert_eq!(PinSystem::try_from(2), Ok(PinSystem::WiringPi));
        assert_eq!(PinSystem::try_from(7), Err(7));
    }

    #[test]
    fn test_suffix_lookup() {
        assert_eq!(PinSystem::from_suffix('P'), Some(PinSystem::Phys));
        assert_eq!(PinSystem::from_suffix('s'), Some(PinSystem::Virtual));
        assert_eq!(PinSystem::from_suffix('x'), None);
        for system in PinSystem::ALL {
            assert_eq!(PinSystem::from_suffix(system.suffix()), Some(system));
        }
    }

    #[test]
    fn test_leading_integer() {
        assert_eq!(leading_integer("27"), Some(27));
        assert_eq!(leading_integer("-4"), Some(-4));
        assert_eq!(leading_integer("12.5"), Some(12));
        assert_eq!(leading_integer("abc"), None);
        assert_eq!(leading_integer("-"), None);
        assert_eq!(leading_integer(""), None);
        assert_eq!(leading_integer("99999999999"), None);
    }

    #[test]
    fn test_parse_str() {
        let resolver = PinResolver::default();
        assert_eq!(resolver.parse_str("27"), PinAddress::gpio(27));
        assert_eq!(resolver.parse_str("3w"), PinAddress::wiring_pi(3));
        assert_eq!(resolver.parse_str(" 13P "), PinAddress::phys(13));
        assert_eq!(resolver.parse_str("4s"), PinAddress::new(4, PinSystem::SYS));
        assert_eq!(resolver.parse_str("xyz"), PinAddress::gpio(DEFAULT_FALLBACK_PIN));
        assert_eq!(resolver.parse_str(""), PinAddress::gpio(DEFAULT_FALLBACK_PIN));
        assert_eq!(resolver.parse_str("p"), PinAddress::phys(DEFAULT_FALLBACK_PIN));
    }

    #[test]
    fn test_parse_uses_configured_defaults() {
        let resolver = PinResolver::default()
            .with_default_system(PinSystem::Phys)
            .with_fallback_pin(11);

        assert_eq!(resolver.parse(&PinIdentifier::Ordinal(7)), PinAddress::phys(7));
        assert_eq!(resolver.parse(&"9q".into()), PinAddress::phys(9));
        assert_eq!(resolver.parse(&"zz".into()), PinAddress::phys(11));
    }

    #[test]
    fn test_convert_basic() {
        let resolver = PinResolver::default();
        assert_eq!(resolver.convert(13, PinSystem::Phys, PinSystem::Gpio), 27);
        assert_eq!(resolver.convert(27, PinSystem::Gpio, PinSystem::WiringPi), 2);
        assert_eq!(resolver.convert(2, PinSystem::WiringPi, PinSystem::Phys), 13);
        assert_eq!(resolver.convert(1, PinSystem::Phys, PinSystem::Gpio), NO_MAPPING);
        assert_eq!(resolver.to_gpio(7, PinSystem::Phys), 4);
        assert_eq!(resolver.convert_to(4, PinSystem::Phys), 7);
    }

    #[test]
    fn test_convert_virtual() {
        let resolver = PinResolver::default();
        assert_eq!(resolver.convert(1000, PinSystem::Virtual, PinSystem::Virtual), 1000);
        assert_eq!(resolver.convert(0, PinSystem::Virtual, PinSystem::Virtual), 0);
        assert_eq!(resolver.convert(-5, PinSystem::Virtual, PinSystem::Virtual), NO_MAPPING);
        assert_eq!(resolver.convert(i32::MIN, PinSystem::SYS, PinSystem::SYS), NO_MAPPING);
        assert_eq!(resolver.convert(4, PinSystem::Virtual, PinSystem::Gpio), NO_MAPPING);
        assert_eq!(resolver.convert(4, PinSystem::Gpio, PinSystem::Virtual), NO_MAPPING);
    }

    #[test]
    fn test_convert_same_system_out_of_range() {
        let resolver = PinResolver::default();
        assert_eq!(resolver.convert(5, PinSystem::Gpio, PinSystem::Gpio), 5);
        assert_eq!(resolver.convert(-3, PinSystem::Gpio, PinSystem::Gpio), NO_MAPPING);
        assert_eq!(resolver.convert(40, PinSystem::WiringPi, PinSystem::WiringPi), NO_MAPPING);
        assert_eq!(resolver.convert(63, PinSystem::Phys, PinSystem::Phys), 63);
    }

    #[test]
    fn test_pin_system_from_str() {
        assert_eq!("WiringPi".parse::<PinSystem>(), Ok(PinSystem::WiringPi));
        assert_eq!("sys".parse::<PinSystem>(), Ok(PinSystem::Virtual));
        assert!("bogus".parse::<PinSystem>().is_err());
    }

    #[test]
    fn test_address_display() {
        assert_eq!(PinAddress::phys(13).to_string(), "13p");
        assert_eq!(PinAddress::gpio(27).to_string(), "27g");
    }
}
