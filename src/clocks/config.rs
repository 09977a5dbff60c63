//! Clock tree configuration types.

//
// enums
//

/// Selectable sources for the M4 core clock mux.
///
/// ```text
///                    ┌─────┐
///     ulp_ref_clk ──▶│000  │
///                    │     │
///     soc_pll_clk ──▶│010  │
///                    │     │      ┌─────────┐
///    intf_pll_clk ──▶│100  │─────▶│CPU Clock│──▶ to M4 core, AHB, APB
///                    │     │      │Divider  │
///       sleep_clk ──▶│101  │      └─────────┘
///                    └─────┘           ▲
///                       ▲              │
///                       │       M4_SOC_CLK_DIV_FAC
///               M4 SoC clock select
///                M4_SOC_CLK_SEL
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// The always-available ULP reference clock. This is the safe
    /// intermediate the core is parked on while a PLL is reprogrammed.
    UlpReference,
    /// SoC PLL output, the usual high-frequency core source.
    SocPll,
    /// Interface PLL output, the usual peripheral source.
    InterfacePll,
    /// I2S PLL output, for audio-rate clocking.
    I2sPll,
    /// The 32 kHz sleep clock.
    SleepClock,
}

/// The PLL instances whose output frequency can be programmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllTarget {
    /// SoC PLL, feeding the core clock mux.
    Soc,
    /// Interface PLL, feeding peripheral clock muxes.
    Interface,
    /// I2S PLL.
    I2s,
}

/// The two reference clocks a board can supply to the PLLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReferenceClock {
    /// 32 MHz internal RC oscillator.
    Rc32Mhz,
    /// 40 MHz external crystal.
    Xtal40Mhz,
}

//
// impls
//

impl ClockSource {
    /// The PLL this source draws from, if it is PLL-derived.
    pub fn pll(self) -> Option<PllTarget> {
        match self {
            ClockSource::SocPll => Some(PllTarget::Soc),
            ClockSource::InterfacePll => Some(PllTarget::Interface),
            ClockSource::I2sPll => Some(PllTarget::I2s),
            ClockSource::UlpReference | ClockSource::SleepClock => None,
        }
    }
}

impl PllTarget {
    /// The core clock source fed by this PLL.
    pub fn core_source(self) -> ClockSource {
        match self {
            PllTarget::Soc => ClockSource::SocPll,
            PllTarget::Interface => ClockSource::InterfacePll,
            PllTarget::I2s => ClockSource::I2sPll,
        }
    }
}

impl ReferenceClock {
    /// Reference frequency in Hz.
    pub const fn hz(self) -> u32 {
        match self {
            ReferenceClock::Rc32Mhz => 32_000_000,
            ReferenceClock::Xtal40Mhz => 40_000_000,
        }
    }

    /// Map a raw frequency onto one of the two supported references.
    ///
    /// Returns `None` for any other value; callers surface that as an
    /// invalid-parameter error.
    pub const fn from_hz(hz: u32) -> Option<Self> {
        match hz {
            32_000_000 => Some(ReferenceClock::Rc32Mhz),
            40_000_000 => Some(ReferenceClock::Xtal40Mhz),
            _ => None,
        }
    }
}
