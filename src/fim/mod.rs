//! FIM (Fast Integer Math) coprocessor driver.
//!
//! The FIM unit is a fixed-function accelerator for vector, matrix, and
//! filter arithmetic on Q7/Q15/Q31/float data. Software runs it one
//! operation at a time: program the block lengths, the
//! saturate/truncate/round word, and the operand addresses; write the mode
//! register; set the start bit; poll the completion flag.
//!
//! [`Fim`] owns that sequence. Operand placement is pluggable
//! ([`PlacementStrategy`]): the unit can address application memory
//! directly, or work out of its own memory banks with the driver staging
//! the data in and out. All register traffic goes through [`FimAccess`]
//! ([`MmioFim`] on real silicon), so the dispatch logic is host-testable.
//!
//! ```no_run
//! use si91x_hal::fim::{BufferMut, BufferRef, Fim, MmioFim, Operation, PlacementStrategy, Samples, SamplesMut};
//!
//! let access = unsafe { MmioFim::new() };
//! let mut fim = Fim::new(access, PlacementStrategy::Staged);
//!
//! let a: [i16; 4] = [1, 2, 3, 4];
//! let b: [i16; 4] = [4, 3, 2, 1];
//! let mut sum = [0i16; 4];
//! fim.execute(
//!     Operation::VectorAdd,
//!     &[
//!         BufferRef::real(Samples::Q15(&a)),
//!         BufferRef::real(Samples::Q15(&b)),
//!     ],
//!     &mut BufferMut::real(SamplesMut::Q15(&mut sum)),
//! )?;
//! # Ok::<(), si91x_hal::fim::FimError>(())
//! ```

use crate::wait::WaitPolicy;

pub mod access;
pub mod format;
pub mod op;
pub mod placement;
pub mod tables;

#[cfg(test)]
pub(crate) mod mock;

pub use access::{Bank, FimAccess, MmioFim, BANK_SIZE_BYTES, BANK_SIZE_WORDS};
pub use format::{ControlWord, NumericFormat};
pub use op::{DataKind, MatrixDims, Operation, Scalar};
pub use placement::{
    BufferMut, BufferRef, Location, OperandDescriptor, PlacementStrategy, PlanError, Samples,
    SamplesMut,
};
pub use tables::{APPROX_TABLE_LEN, FFT_LENGTH, FFT_STAGES};

use placement::{Plan, Planner};

//
// Structs + Enums
//

/// Coprocessor dispatch errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FimError {
    /// Operand arity or lengths do not satisfy the operation's contract.
    InvalidOperands,
    /// Matrix extents violate the operation's shape contract.
    ShapeMismatch,
    /// The operation does not support the supplied element format or
    /// real/complex tagging.
    UnsupportedFormat,
    /// The unit never signalled completion within the configured poll
    /// bound.
    HardwareNotReady,
}

/// FIM operation dispatcher.
///
/// Single-shot: each [`execute`](Fim::execute) call configures, triggers,
/// and blocks until the unit signals completion. The `&mut self` receiver
/// serializes access to the one hardware unit at compile time.
pub struct Fim<A: FimAccess> {
    access: A,
    planner: Planner,
    wait: WaitPolicy,
}

//
// impls
//

impl<A: FimAccess> Fim<A> {
    /// Create a dispatcher using `strategy` for operand placement.
    pub fn new(access: A, strategy: PlacementStrategy) -> Self {
        Self {
            access,
            planner: Planner::new(strategy),
            wait: WaitPolicy::unbounded(),
        }
    }

    /// Replace the busy-poll policy. The default spins forever on the
    /// completion flag; a bounded policy turns a hung unit into
    /// [`FimError::HardwareNotReady`].
    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// The configured placement strategy.
    pub fn strategy(&self) -> PlacementStrategy {
        self.planner.strategy()
    }

    /// Run one operation to completion.
    ///
    /// All validation happens before the first register write: a returned
    /// error other than [`FimError::HardwareNotReady`] means the hardware
    /// was not touched and no trigger was issued.
    pub fn execute(
        &mut self,
        op: Operation,
        inputs: &[BufferRef],
        output: &mut BufferMut,
    ) -> Result<(), FimError> {
        let plan = self
            .planner
            .plan(&op, inputs, output, &mut self.access)
            .map_err(|err| match err {
                PlanError::UnsupportedFormat => FimError::UnsupportedFormat,
                PlanError::SizeMismatch if op.is_matrix() => FimError::ShapeMismatch,
                PlanError::SizeMismatch => FimError::InvalidOperands,
            })?;

        self.configure(&op, inputs, &plan);

        self.access.set_mode(op.opcode());
        let (rows, cols) = trigger_extent(&op);
        self.access.trigger(rows, cols, plan.kind);

        self.wait
            .wait_until(|| self.access.completed())
            .map_err(|_| FimError::HardwareNotReady)?;
        self.access.clear_completed();

        if let Location::Bank(bank) = plan.output.location {
            placement::unstage(&self.access, bank, output);
        }
        Ok(())
    }

    /// Program lengths, control word, scalar/factor fields, and operand
    /// addresses.
    fn configure(&mut self, op: &Operation, inputs: &[BufferRef], plan: &Plan) {
        let format = inputs[0].format();
        let n = inputs[0].sample_count() as u32;
        let second = inputs.get(1).map(|b| b.sample_count() as u32).unwrap_or(0);

        // Operand routing follows the plan except for the FIR special
        // case: the unit wants the shorter of data/coefficients on the
        // first input port.
        let mut input1 = plan.input1;
        let mut input2 = plan.input2;

        let lengths = match op {
            Operation::VectorAdd | Operation::VectorSub | Operation::VectorMul => (0, n, n),
            Operation::ScalarAdd(_)
            | Operation::ScalarSub(_)
            | Operation::ScalarMul(_)
            | Operation::NormSquare => (0, n, 0),
            Operation::MatrixMul { a, .. } => (a.cols, 0, 0),
            Operation::MatrixAdd { a, .. }
            | Operation::MatrixSub { a, .. }
            | Operation::MatrixHadamard { a, .. } => (a.cols, n, second),
            Operation::MatrixTranspose { a } => (a.cols, n, 0),
            Operation::Fir { taps } => {
                if *taps as u32 > n {
                    (n as u16, n, *taps as u32)
                } else {
                    // Coefficients are the shorter operand: swap ports.
                    if let Some(coeffs) = input2 {
                        input2 = Some(input1);
                        input1 = coeffs;
                    }
                    (*taps, *taps as u32, n)
                }
            }
            Operation::FirInterpolate { factor, phase_length } => {
                let taps = *factor as u32 * *phase_length as u32;
                (taps as u16, n, taps)
            }
            Operation::FirDecimate { taps, .. } => (0, n, *taps as u32),
            Operation::Correlate => (0, n, second),
            Operation::Sin
            | Operation::Cos
            | Operation::ArcTan
            | Operation::Sinh
            | Operation::Cosh
            | Operation::ArcTanh
            | Operation::SquareRoot
            | Operation::NaturalLog => (0, n, APPROX_TABLE_LEN as u32),
            Operation::CfftRadix2 => (0, FFT_LENGTH as u32, FFT_STAGES),
        };

        self.access.set_data_lengths(lengths.0, lengths.1, lengths.2);
        self.access
            .set_control_word(op.control_word(format, plan.kind));

        if let Some(scalar) = op.scalar() {
            self.access.set_scalar(scalar.to_raw());
        }
        match op {
            Operation::FirDecimate { factor, .. } => self.access.set_decimation_factor(*factor),
            Operation::FirInterpolate { factor, .. } => {
                self.access.set_interpolation_factor(*factor)
            }
            _ => {}
        }

        self.access.set_input1_addr(resolve(input1.location));
        if let Some(desc) = input2 {
            self.access.set_input2_addr(resolve(desc.location));
        }
        self.access.set_output_addr(resolve(plan.output.location));
    }
}

fn resolve(location: Location) -> usize {
    match location {
        Location::Application(addr) => addr,
        Location::Bank(bank) => bank.base_address(),
    }
}

/// Matrix extents carried in the trigger register; zero for non-matrix
/// operations.
fn trigger_extent(op: &Operation) -> (u16, u16) {
    match op {
        Operation::MatrixMul { a, b } => (a.rows, b.cols),
        Operation::MatrixAdd { a, .. }
        | Operation::MatrixSub { a, .. }
        | Operation::MatrixHadamard { a, .. }
        | Operation::MatrixTranspose { a } => (a.rows, a.cols),
        _ => (0, 0),
    }
}
