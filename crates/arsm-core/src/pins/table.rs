//! Header conversion tables.
//!
//! Tables follow Gordon Henderson's WiringPi layouts. Physical positions on the
//! P5 connector of rev 2 boards are offset by 50, so P5 pins 3..6 are
//! positions 53..56.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{PinSystem, NO_MAPPING};

/// Number of physical header slots covered by each table (positions `0..=63`).
pub const HEADER_SLOTS: usize = 64;

/// Number of addressable GPIO (and WiringPi) lines (`0..=31`).
pub const LINE_COUNT: usize = 32;

/// Expands a table prefix to the full header width, padding with `NO_MAPPING`.
const fn padded<const N: usize>(head: [i32; N]) -> [i32; HEADER_SLOTS] {
    let mut out = [NO_MAPPING; HEADER_SLOTS];
    let mut i = 0;
    while i < N && i < HEADER_SLOTS {
        out[i] = head[i];
        i += 1;
    }
    out
}

#[rustfmt::skip]
const WPI_TO_GPIO_REV1: [i32; HEADER_SLOTS] = padded([
    17, 18, 21, 22, 23, 24, 25, 4,  // wpi 0 - 7
     0,  1,                         // I2C  - SDA1, SCL1
     8,  7,                         // SPI  - CE1, CE0
    10,  9, 11,                     // SPI  - MOSI, MISO, SCLK
    14, 15,                         // UART - Tx, Rx
]);

#[rustfmt::skip]
const WPI_TO_GPIO_REV2: [i32; HEADER_SLOTS] = padded([
    17, 18, 27, 22, 23, 24, 25, 4,  // wpi 0 - 7
     2,  3,                         // I2C  - SDA0, SCL0
     8,  7,                         // SPI  - CE1, CE0
    10,  9, 11,                     // SPI  - MOSI, MISO, SCLK
    14, 15,                         // UART - Tx, Rx
    28, 29, 30, 31,                 // P5 header, wpi 17 - 20
     5,  6, 13, 19, 26,             // B+, wpi 21 - 25
    12, 16, 20, 21,                 // B+, wpi 26 - 29
     0,  1,                         // B+, wpi 30, 31
]);

#[rustfmt::skip]
const PHYS_TO_GPIO_REV1: [i32; HEADER_SLOTS] = padded([
    -1,         // 0
    -1, -1,     // 1, 2
     0, -1,
     1, -1,
     4, 14,
    -1, 15,
    17, 18,
    21, -1,
    22, 23,
    -1, 24,
    10, -1,
     9, 25,
    11,  8,
    -1,  7,     // 25, 26
]);

#[rustfmt::skip]
const PHYS_TO_GPIO_REV2: [i32; HEADER_SLOTS] = padded([
    -1,         // 0
    -1, -1,     // 1, 2
     2, -1,
     3, -1,
     4, 14,
    -1, 15,
    17, 18,
    27, -1,
    22, 23,
    -1, 24,
    10, -1,
     9, 25,
    11,  8,
    -1,  7,     // 25, 26
     0,  1,     // 27, 28 (ID EEPROM on B+ and later)
     5, -1,
     6, 12,
    13, -1,
    19, 16,
    26, 20,
    -1, 21,     // 39, 40
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, // 41 - 50
    -1, -1,     // 51, 52 (P5-1, P5-2: power)
    28, 29,     // 53, 54 (P5-3, P5-4)
    30, 31,     // 55, 56 (P5-5, P5-6)
]);

/// Bidirectional mapping between physical positions and `(GPIO, WiringPi)` lines.
///
/// The forward tables (physical → GPIO, WiringPi → GPIO) are authoritative;
/// the reverse tables are derived from them at compile time, so every mapped
/// ordinal round-trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTable {
    phys_to_gpio: [i32; HEADER_SLOTS],
    wpi_to_gpio: [i32; HEADER_SLOTS],
    gpio_to_phys: [i32; LINE_COUNT],
    gpio_to_wpi: [i32; LINE_COUNT],
}

impl ConversionTable {
    const fn build(
        phys_to_gpio: [i32; HEADER_SLOTS],
        wpi_to_gpio: [i32; HEADER_SLOTS],
    ) -> Self {
        let mut gpio_to_phys = [NO_MAPPING; LINE_COUNT];
        let mut gpio_to_wpi = [NO_MAPPING; LINE_COUNT];
        let mut i = 0;

        while i < HEADER_SLOTS {
            let gpio = phys_to_gpio[i];
            if gpio >= 0 && (gpio as usize) < LINE_COUNT {
                gpio_to_phys[gpio as usize] = i as i32;
            }

            let gpio = wpi_to_gpio[i];
            if gpio >= 0 && (gpio as usize) < LINE_COUNT {
                gpio_to_wpi[gpio as usize] = i as i32;
            }

            i += 1;
        }

        Self {
            phys_to_gpio,
            wpi_to_gpio,
            gpio_to_phys,
            gpio_to_wpi,
        }
    }

    /// Highest ordinal accepted for `system`, or `None` if the scheme has no column.
    pub fn max_ordinal(system: PinSystem) -> Option<i32> {
        match system {
            PinSystem::Phys => Some(HEADER_SLOTS as i32 - 1),
            PinSystem::Gpio | PinSystem::WiringPi => Some(LINE_COUNT as i32 - 1),
            PinSystem::Virtual => None,
        }
    }

    /// Look up the GPIO line for `ordinal` in the `from` column.
    pub fn to_gpio(&self, ordinal: i32, from: PinSystem) -> i32 {
        if !Self::in_domain(ordinal, from) {
            return NO_MAPPING;
        }

        let index = ordinal as usize;
        match from {
            PinSystem::Gpio => ordinal,
            PinSystem::Phys => self.phys_to_gpio[index],
            PinSystem::WiringPi => self.wpi_to_gpio[index],
            PinSystem::Virtual => NO_MAPPING,
        }
    }

    /// Look up the `to` ordinal of GPIO line `gpio`.
    pub fn from_gpio(&self, gpio: i32, to: PinSystem) -> i32 {
        if !Self::in_domain(gpio, PinSystem::Gpio) {
            return NO_MAPPING;
        }

        let index = gpio as usize;
        match to {
            PinSystem::Gpio => gpio,
            PinSystem::Phys => self.gpio_to_phys[index],
            PinSystem::WiringPi => self.gpio_to_wpi[index],
            PinSystem::Virtual => NO_MAPPING,
        }
    }

    fn in_domain(ordinal: i32, system: PinSystem) -> bool {
        match Self::max_ordinal(system) {
            Some(max) => (0..=max).contains(&ordinal),
            None => false,
        }
    }
}

static REV1_TABLE: ConversionTable = ConversionTable::build(PHYS_TO_GPIO_REV1, WPI_TO_GPIO_REV1);
static REV2_TABLE: ConversionTable = ConversionTable::build(PHYS_TO_GPIO_REV2, WPI_TO_GPIO_REV2);

/// Physical header layout of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardLayout {
    /// Model A and B, revisions 1 and 1.1 (26-pin header).
    Rev1,
    /// A2, B2, A+, B+, CM, Pi 2/3/4 and Zero (40-pin header plus P5).
    #[default]
    Rev2,
}

impl BoardLayout {
    /// Classify a `/proc/cpuinfo` dump.
    ///
    /// Only the last four hex digits of the `Revision` line matter: `0002` and
    /// `0003` are the original rev 1 boards, anything else uses the rev 2
    /// header. Returns `None` if there is no revision line (not a Pi).
    pub fn from_cpuinfo(cpuinfo: &str) -> Option<Self> {
        cpuinfo.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.trim() != "Revision" {
                return None;
            }

            let value = value.trim();
            if value.len() < 4 || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
                return None;
            }

            match &value[value.len() - 4..] {
                "0002" | "0003" => Some(BoardLayout::Rev1),
                _ => Some(BoardLayout::Rev2),
            }
        })
    }

    /// Conversion table for this layout.
    pub fn table(self) -> &'static ConversionTable {
        match self {
            BoardLayout::Rev1 => &REV1_TABLE,
            BoardLayout::Rev2 => &REV2_TABLE,
        }
    }

    /// Number of pins on the main header.
    pub fn header_pins(self) -> i32 {
        match self {
            BoardLayout::Rev1 => 26,
            BoardLayout::Rev2 => 40,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BoardLayout::Rev1 => "rev1",
            BoardLayout::Rev2 => "rev2",
        }
    }
}

impl fmt::Display for BoardLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoardLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rev1" | "1" => Ok(BoardLayout::Rev1),
            "rev2" | "2" => Ok(BoardLayout::Rev2),
            other => Err(format!("unknown board layout: {}", other)),
        }
    }
}
