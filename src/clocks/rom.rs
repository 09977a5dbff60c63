//! ROM driver register layer for the clock tree.
//!
//! The switch logic in [`super::ClockManager`] never touches registers
//! directly; it goes through [`SocClockOps`], for which this module
//! provides the memory-mapped implementation. Tests substitute a recording
//! mock for the same trait.

use core::ptr;

use super::config::{ClockSource, PllTarget};
use super::pll::DividerFields;

/// Register-level operations the clock switch sequences.
///
/// One method per ROM driver call the switch orchestrates. Implementations
/// only poke registers; all ordering decisions live in the caller.
pub trait SocClockOps {
    /// Point the M4 core clock mux at `source`.
    fn select_core_source(&mut self, source: ClockSource);

    /// Has the core mux finished switching to the last selected source?
    fn core_clock_switched(&self) -> bool;

    /// Is `source` present and usable as a mux input right now?
    fn clock_present(&self, source: ClockSource) -> bool;

    /// Hold `pll` in reset so it can be reprogrammed.
    fn reset_pll(&mut self, pll: PllTarget);

    /// Load divider fields into `pll`'s configuration registers.
    fn program_pll(&mut self, pll: PllTarget, fields: DividerFields);

    /// Release `pll` from reset and start the lock sequence.
    fn start_pll(&mut self, pll: PllTarget);

    /// Has `pll` locked onto its programmed frequency?
    fn pll_locked(&self, pll: PllTarget) -> bool;

    /// Gate or ungate `pll`'s output clock without reprogramming it.
    fn set_pll_output_enabled(&mut self, pll: PllTarget, enabled: bool);
}

//
// Memory map
//

const M4_CLK_BASE: usize = 0x4600_0000;
/// Core clock mux select, `M4_SOC_CLK_SEL` in the low bits.
const CLK_CONFIG_REG5: usize = M4_CLK_BASE + 0x14;
/// PLL lock and mux-switched status bits.
const PLL_STAT_REG: usize = M4_CLK_BASE + 0x50;

/// PLL configuration registers live behind the SPI memory map.
const PLL_SPI_BASE: usize = 0x4605_0000;
/// Per-PLL register block stride.
const PLL_BLOCK_STRIDE: usize = 0x40;
const PLL_CTRL_REG1: usize = 0x00;
const PLL_CTRL_REG2: usize = 0x04;
const PLL_CTRL_REG11: usize = 0x2C;

/// Worst-case core ticks per microsecond (180 MHz), for settle delays.
const WORST_CASE_TICKS_PER_US: u32 = 180;
/// Analog settle time after releasing a PLL from reset, before the lock
/// indication is meaningful.
const PLL_SETTLE_US: u32 = 50;

const CORE_SWITCHED_BIT: u32 = 1 << 3;
const SLEEP_CLK_PRESENT_BIT: u32 = 1 << 4;
const PLL_OUTPUT_ENABLE: u32 = 1 << 0;
/// Written to CTRL_REG11 to hold the PLL in reset while reprogramming.
const PLL_HOLD_RESET: u32 = 0x01FF;
/// Written to CTRL_REG11 to release reset and begin locking.
const PLL_RELEASE_START: u32 = 0xFFFF;

/// Memory-mapped [`SocClockOps`] implementation for the real silicon.
pub struct RomClockDriver {
    _private: (),
}

impl RomClockDriver {
    /// Create the driver.
    ///
    /// # Safety
    ///
    /// The caller must be the sole owner of the clock configuration
    /// registers; constructing two drivers (or mixing this with direct
    /// register access) breaks the switch sequencing guarantees.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn read(addr: usize) -> u32 {
        // SAFETY: addresses are in the always-mapped clock register region
        // and the constructor contract gives us exclusive access.
        unsafe { ptr::read_volatile(addr as *const u32) }
    }

    fn write(addr: usize, value: u32) {
        // SAFETY: as in `read`.
        unsafe { ptr::write_volatile(addr as *mut u32, value) }
    }

    fn mux_bits(source: ClockSource) -> u32 {
        match source {
            ClockSource::UlpReference => 0b000,
            ClockSource::SocPll => 0b010,
            ClockSource::I2sPll => 0b011,
            ClockSource::InterfacePll => 0b100,
            ClockSource::SleepClock => 0b101,
        }
    }

    fn pll_reg(pll: PllTarget, reg: usize) -> usize {
        let block = match pll {
            PllTarget::Soc => 0,
            PllTarget::Interface => 1,
            PllTarget::I2s => 2,
        };
        PLL_SPI_BASE + block * PLL_BLOCK_STRIDE + reg
    }

    fn lock_bit(pll: PllTarget) -> u32 {
        match pll {
            PllTarget::Soc => 1 << 0,
            PllTarget::Interface => 1 << 1,
            PllTarget::I2s => 1 << 2,
        }
    }
}

impl SocClockOps for RomClockDriver {
    fn select_core_source(&mut self, source: ClockSource) {
        let reg = Self::read(CLK_CONFIG_REG5);
        Self::write(CLK_CONFIG_REG5, (reg & !0b111) | Self::mux_bits(source));
    }

    fn core_clock_switched(&self) -> bool {
        Self::read(PLL_STAT_REG) & CORE_SWITCHED_BIT != 0
    }

    fn clock_present(&self, source: ClockSource) -> bool {
        match source {
            // The ULP reference is always running.
            ClockSource::UlpReference => true,
            ClockSource::SleepClock => Self::read(PLL_STAT_REG) & SLEEP_CLK_PRESENT_BIT != 0,
            ClockSource::SocPll => self.pll_locked(PllTarget::Soc),
            ClockSource::InterfacePll => self.pll_locked(PllTarget::Interface),
            ClockSource::I2sPll => self.pll_locked(PllTarget::I2s),
        }
    }

    fn reset_pll(&mut self, pll: PllTarget) {
        Self::write(Self::pll_reg(pll, PLL_CTRL_REG11), PLL_HOLD_RESET);
    }

    fn program_pll(&mut self, pll: PllTarget, fields: DividerFields) {
        Self::write(
            Self::pll_reg(pll, PLL_CTRL_REG2),
            ((fields.post_div as u32) << 8) | fields.ref_div as u32,
        );
        Self::write(
            Self::pll_reg(pll, PLL_CTRL_REG1),
            ((fields.fb_mult as u32) << 4) | PLL_OUTPUT_ENABLE,
        );
    }

    fn start_pll(&mut self, pll: PllTarget) {
        Self::write(Self::pll_reg(pll, PLL_CTRL_REG11), PLL_RELEASE_START);
        // Let the analog loop settle before anyone polls the lock bit.
        cortex_m::asm::delay(WORST_CASE_TICKS_PER_US * PLL_SETTLE_US);
    }

    fn pll_locked(&self, pll: PllTarget) -> bool {
        Self::read(PLL_STAT_REG) & Self::lock_bit(pll) != 0
    }

    fn set_pll_output_enabled(&mut self, pll: PllTarget, enabled: bool) {
        let addr = Self::pll_reg(pll, PLL_CTRL_REG1);
        let reg = Self::read(addr);
        if enabled {
            Self::write(addr, reg | PLL_OUTPUT_ENABLE);
        } else {
            Self::write(addr, reg & !PLL_OUTPUT_ENABLE);
        }
    }
}
