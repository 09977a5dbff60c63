//! M4 core clock configuration.
//!
//! The core clock mux can draw from the ULP reference clock, one of three
//! PLLs, or the sleep clock. Reprogramming a PLL that is currently feeding
//! the core would glitch the CPU clock, so every frequency change follows
//! the same hazard-free sequence:
//!
//! 1. park the core mux on the always-stable ULP reference;
//! 2. reprogram the target PLL and wait for its lock indication;
//! 3. switch the core mux onto the target;
//! 4. only then record the new configuration.
//!
//! [`ClockManager`] owns that sequence. It drives the hardware through the
//! [`SocClockOps`] trait ([`RomClockDriver`] on real silicon) so the
//! ordering rules are enforceable in host tests against a recording mock.
//!
//! The committed configuration is also published to a read-only static;
//! peripheral drivers that only need "what is the core running at" can call
//! [`with_active_clock`] without holding the manager.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::wait::WaitPolicy;

pub mod config;
pub mod pll;
pub mod rom;

pub use config::{ClockSource, PllTarget, ReferenceClock};
pub use pll::{DividerFields, PLL_MAX_FREQUENCY, PLL_MIN_FREQUENCY};
pub use rom::{RomClockDriver, SocClockOps};

//
// Consts and statics
//

/// Sleep clock frequency (32.768 kHz crystal domain).
const SLEEP_CLOCK_HZ: u32 = 32_768;

/// Default SoC PLL frequency programmed by [`ClockManager::init`].
pub const DEFAULT_SOC_PLL_HZ: u32 = 180_000_000;
/// Default interface PLL frequency programmed by [`ClockManager::init`].
pub const DEFAULT_INTF_PLL_HZ: u32 = 160_000_000;

static ACTIVE_CLOCK: Mutex<RefCell<Option<ActiveClock>>> = Mutex::new(RefCell::new(None));

//
// Structs + Enums
//

/// The committed core clock configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActiveClock {
    /// Source currently feeding the core clock mux.
    pub source: ClockSource,
    /// Core frequency in Hz.
    pub frequency_hz: u32,
}

/// Clock configuration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// A request argument was rejected before any hardware was touched:
    /// zero or out-of-range frequency, unsupported reference, or divider
    /// overflow.
    InvalidParameter,
    /// The hardware never reported the expected status (PLL lock, mux
    /// switch, clock presence) within the configured poll bound.
    HardwareNotReady,
    /// [`ClockManager::init`] was called on an already-configured manager.
    AlreadyConfigured,
}

/// Core clock manager.
///
/// Owns the active-clock record and the per-PLL programmed frequencies.
/// All mutation goes through the park/reprogram/switch sequence; a failed
/// request leaves the record untouched and the core mux on a valid source
/// (the original or the safe intermediate), never undefined.
pub struct ClockManager<O: SocClockOps> {
    ops: O,
    wait: WaitPolicy,
    reference: ReferenceClock,
    /// Where the hardware mux actually points right now. Diverges from
    /// `active.source` between a park and a commit, or after a failed
    /// switch.
    mux: ClockSource,
    active: ActiveClock,
    pll_hz: [Option<u32>; 3],
    configured: bool,
}

// --- free functions ---

/// Read the last committed core clock configuration, if any manager has
/// published one.
///
/// Runs `f` inside a critical section; keep it short.
pub fn with_active_clock<F: FnOnce(&ActiveClock) -> R, R>(f: F) -> Option<R> {
    critical_section::with(|cs| {
        let active = ACTIVE_CLOCK.borrow_ref(cs);
        let active = active.as_ref()?;
        Some(f(active))
    })
}

// --- impls ---

impl<O: SocClockOps> ClockManager<O> {
    /// Create a manager for a core that boots on the ULP reference clock.
    ///
    /// `reference` is the board's PLL reference, supplied by board init.
    pub fn new(ops: O, reference: ReferenceClock) -> Self {
        Self {
            ops,
            wait: WaitPolicy::unbounded(),
            reference,
            mux: ClockSource::UlpReference,
            active: ActiveClock {
                source: ClockSource::UlpReference,
                frequency_hz: reference.hz(),
            },
            pll_hz: [None; 3],
            configured: false,
        }
    }

    /// Replace the busy-poll policy. The default spins forever, matching
    /// the ROM drivers; a bounded policy turns a hung poll into
    /// [`ClockError::HardwareNotReady`].
    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// Bring up the standard boot configuration: core on the SoC PLL at
    /// 180 MHz, interface PLL programmed to 160 MHz.
    ///
    /// Call once at startup. A second call returns
    /// [`ClockError::AlreadyConfigured`].
    pub fn init(&mut self) -> Result<(), ClockError> {
        if self.configured {
            return Err(ClockError::AlreadyConfigured);
        }
        self.set_core_clock(ClockSource::SocPll, DEFAULT_SOC_PLL_HZ)?;
        self.set_pll_frequency(PllTarget::Interface, DEFAULT_INTF_PLL_HZ, self.reference.hz())?;
        self.configured = true;
        Ok(())
    }

    /// Move the core clock onto `source`, programming the backing PLL to
    /// `frequency_hz` when the source is PLL-derived.
    ///
    /// For [`ClockSource::UlpReference`] and [`ClockSource::SleepClock`]
    /// the frequency argument is ignored; those sources are fixed.
    pub fn set_core_clock(&mut self, source: ClockSource, frequency_hz: u32) -> Result<(), ClockError> {
        self.switch_core_clock(source, frequency_hz)
    }

    /// Reprogram `target` to `frequency_hz` from `reference_hz` without
    /// changing the core clock source.
    ///
    /// If the core is currently drawing from `target`, it is parked on the
    /// ULP reference around the reprogram and restored afterwards, so the
    /// PLL is never reconfigured while it feeds the core.
    pub fn set_pll_frequency(
        &mut self,
        target: PllTarget,
        frequency_hz: u32,
        reference_hz: u32,
    ) -> Result<(), ClockError> {
        // All validation happens here, before any register write.
        let fields = pll::compute_fields(reference_hz, frequency_hz)?;
        let actual_hz = pll::decode_frequency(reference_hz, fields);

        if self.active.source == target.core_source() {
            self.park()?;
            self.reprogram_locked(target, fields)?;
            self.select(target.core_source())?;
            self.pll_hz[pll_index(target)] = Some(actual_hz);
            self.commit(target.core_source(), actual_hz);
        } else {
            self.reprogram_locked(target, fields)?;
            self.pll_hz[pll_index(target)] = Some(actual_hz);
        }
        Ok(())
    }

    /// The committed core clock source and frequency.
    pub fn get_active_clock(&self) -> (ClockSource, u32) {
        (self.active.source, self.active.frequency_hz)
    }

    /// The frequency `target` was last programmed to, if it has been.
    pub fn pll_frequency(&self, target: PllTarget) -> Option<u32> {
        self.pll_hz[pll_index(target)]
    }

    /// Gate or ungate a PLL's output clock without reprogramming it.
    pub fn set_pll_output_enabled(&mut self, target: PllTarget, enabled: bool) {
        self.ops.set_pll_output_enabled(target, enabled);
    }

    /// The hazard-free switch sequence. See the module docs for the step
    /// ordering; no step may be reordered.
    fn switch_core_clock(&mut self, target: ClockSource, frequency_hz: u32) -> Result<(), ClockError> {
        if let Some(pll) = target.pll() {
            // Validate and plan before the first register write.
            let fields = pll::compute_fields(self.reference.hz(), frequency_hz)?;
            let actual_hz = pll::decode_frequency(self.reference.hz(), fields);

            self.park()?;
            self.reprogram_locked(pll, fields)?;
            self.select(target)?;
            self.pll_hz[pll_index(pll)] = Some(actual_hz);
            self.commit(target, actual_hz);
        } else if matches!(target, ClockSource::SleepClock) {
            self.park()?;
            if !self.ops.clock_present(ClockSource::SleepClock) {
                return Err(ClockError::HardwareNotReady);
            }
            self.select(target)?;
            self.commit(target, SLEEP_CLOCK_HZ);
        } else {
            // The park IS the switch onto the ULP reference.
            self.park()?;
            self.commit(ClockSource::UlpReference, self.reference.hz());
        }
        Ok(())
    }

    /// Park the core mux on the ULP reference. Idempotent: issues no
    /// hardware writes when already parked.
    fn park(&mut self) -> Result<(), ClockError> {
        if self.mux != ClockSource::UlpReference {
            self.select(ClockSource::UlpReference)?;
        }
        Ok(())
    }

    /// Point the mux at `source` and wait for the switched indication.
    fn select(&mut self, source: ClockSource) -> Result<(), ClockError> {
        self.ops.select_core_source(source);
        self.wait
            .wait_until(|| self.ops.core_clock_switched())
            .map_err(|_| ClockError::HardwareNotReady)?;
        self.mux = source;
        Ok(())
    }

    /// Reset, program, and start `pll`, then wait for lock.
    ///
    /// Callers must have parked the core first if it draws from `pll`.
    fn reprogram_locked(&mut self, pll: PllTarget, fields: DividerFields) -> Result<(), ClockError> {
        self.ops.reset_pll(pll);
        self.ops.program_pll(pll, fields);
        self.ops.start_pll(pll);
        self.wait
            .wait_until(|| self.ops.pll_locked(pll))
            .map_err(|_| ClockError::HardwareNotReady)
    }

    /// Record the new configuration and publish the snapshot. Only called
    /// once every hardware step of a switch has succeeded.
    fn commit(&mut self, source: ClockSource, frequency_hz: u32) {
        self.active = ActiveClock { source, frequency_hz };
        critical_section::with(|cs| {
            *ACTIVE_CLOCK.borrow_ref_mut(cs) = Some(self.active);
        });
    }
}

fn pll_index(target: PllTarget) -> usize {
    match target {
        PllTarget::Soc => 0,
        PllTarget::Interface => 1,
        PllTarget::I2s => 2,
    }
}
