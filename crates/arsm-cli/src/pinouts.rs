//! Pin conversion tables for the `--pinouts` listing.

use arsm_core::{PinResolver, PinSystem};
use std::fmt::Write;

/// Render the physical, GPIO and WiringPi conversion tables.
///
/// Physical positions 41..=49 do not exist on any header and are skipped.
pub fn render(resolver: &PinResolver) -> String {
    let mut out = String::new();

    for phys in (1..=56).filter(|p| !(41..=49).contains(p)) {
        let _ = writeln!(
            out,
            "phys {} -> gpio {} -> wpi {}",
            phys,
            resolver.convert(phys, PinSystem::Phys, PinSystem::Gpio),
            resolver.convert(phys, PinSystem::Phys, PinSystem::WiringPi),
        );
    }
    out.push('\n');

    for gpio in 0..=31 {
        let _ = writeln!(
            out,
            "gpio {} -> phys {} -> wpi {}",
            gpio,
            resolver.convert(gpio, PinSystem::Gpio, PinSystem::Phys),
            resolver.convert(gpio, PinSystem::Gpio, PinSystem::WiringPi),
        );
    }
    out.push('\n');

    for wpi in 0..=31 {
        let _ = writeln!(
            out,
            "wpi {} -> gpio {} -> phys {}",
            wpi,
            resolver.convert(wpi, PinSystem::WiringPi, PinSystem::Gpio),
            resolver.convert(wpi, PinSystem::WiringPi, PinSystem::Phys),
        );
    }

    out
}
