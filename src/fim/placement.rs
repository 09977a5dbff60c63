//! Operand placement: buffer validation, address resolution, and the
//! staging copies for the accelerator-bank strategy.
//!
//! The coprocessor can address application memory directly, or work out of
//! its own memory banks with inputs copied in first. Which one is in use
//! is a property of the build on the original firmware; here it is a
//! constructor parameter so both are testable in one binary.
//!
//! Bank staging widens every real element to a 32-bit bank word. Complex
//! Q15 data interleaves as two half-words per sample, real part at the odd
//! half-word, imaginary at the even; promoting a real vector into that
//! layout zero-fills the imaginary half.

use super::access::{Bank, FimAccess};
use super::format::NumericFormat;
use super::op::{DataKind, Operation};
use super::tables::{
    APPROX_TABLE_LEN, FFT_EVEN_INDEX, FFT_HALF, FFT_LENGTH, FFT_ODD_INDEX, FFT_TWIDDLE_TABLE,
    ROOT_LOG_TABLE, TRIG_TABLE,
};

//
// Structs + Enums
//

/// Planner-level failures, wrapped into [`super::FimError`] by the
/// dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlanError {
    /// Operand lengths or shapes do not satisfy the operation's contract.
    SizeMismatch,
    /// The operation does not support the supplied format or real/complex
    /// tagging.
    UnsupportedFormat,
}

/// Where the accelerator finds operand data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementStrategy {
    /// Point the unit at application memory.
    Direct,
    /// Copy operands into the accelerator banks and point the unit there.
    Staged,
}

/// A borrowed, format-tagged input slice.
#[derive(Debug, Clone, Copy)]
pub enum Samples<'a> {
    /// Q7 elements.
    Q7(&'a [i8]),
    /// Q15 elements.
    Q15(&'a [i16]),
    /// Q31 elements.
    Q31(&'a [i32]),
    /// Single-precision elements.
    F32(&'a [f32]),
}

/// A borrowed, format-tagged output slice.
#[derive(Debug)]
pub enum SamplesMut<'a> {
    /// Q7 elements.
    Q7(&'a mut [i8]),
    /// Q15 elements.
    Q15(&'a mut [i16]),
    /// Q31 elements.
    Q31(&'a mut [i32]),
    /// Single-precision elements.
    F32(&'a mut [f32]),
}

/// An input operand: samples plus the real/complex tag.
///
/// Complex data is interleaved `[re, im, re, im, ...]` in application
/// memory, so a complex buffer holds twice as many raw elements as
/// samples.
#[derive(Debug, Clone, Copy)]
pub struct BufferRef<'a> {
    samples: Samples<'a>,
    complex: bool,
}

/// An output operand: samples plus the real/complex tag.
#[derive(Debug)]
pub struct BufferMut<'a> {
    samples: SamplesMut<'a>,
    complex: bool,
}

/// Resolved placement for one operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Application memory, by address.
    Application(usize),
    /// An accelerator bank.
    Bank(Bank),
}

/// One fully resolved operand, ready to program into the address
/// registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandDescriptor {
    /// Where the data lives.
    pub location: Location,
    /// Element count in samples (complex samples count once).
    pub elements: u32,
    /// Element format.
    pub format: NumericFormat,
    /// Real/complex tag.
    pub complex: bool,
}

/// The planner's output: descriptors for up to three operands plus the
/// real/complex tag for the trigger register.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Plan {
    pub input1: OperandDescriptor,
    pub input2: Option<OperandDescriptor>,
    pub output: OperandDescriptor,
    pub kind: DataKind,
}

/// Operand placement planner. Validates operand compatibility, resolves
/// addresses per the configured strategy, and performs the staging copies.
pub(crate) struct Planner {
    strategy: PlacementStrategy,
}

//
// impls — buffers
//

impl<'a> Samples<'a> {
    /// Raw element count of the slice.
    pub fn len(&self) -> usize {
        match self {
            Samples::Q7(s) => s.len(),
            Samples::Q15(s) => s.len(),
            Samples::Q31(s) => s.len(),
            Samples::F32(s) => s.len(),
        }
    }

    /// Format tag.
    pub fn format(&self) -> NumericFormat {
        match self {
            Samples::Q7(_) => NumericFormat::Q7,
            Samples::Q15(_) => NumericFormat::Q15,
            Samples::Q31(_) => NumericFormat::Q31,
            Samples::F32(_) => NumericFormat::F32,
        }
    }

    fn address(&self) -> usize {
        match self {
            Samples::Q7(s) => s.as_ptr() as usize,
            Samples::Q15(s) => s.as_ptr() as usize,
            Samples::Q31(s) => s.as_ptr() as usize,
            Samples::F32(s) => s.as_ptr() as usize,
        }
    }

    /// The element at `index`, widened to a sign-extended 32-bit bank
    /// word (raw bits for float).
    fn word(&self, index: usize) -> u32 {
        match self {
            Samples::Q7(s) => s[index] as i32 as u32,
            Samples::Q15(s) => s[index] as i32 as u32,
            Samples::Q31(s) => s[index] as u32,
            Samples::F32(s) => s[index].to_bits(),
        }
    }
}

impl<'a> SamplesMut<'a> {
    /// Raw element count of the slice.
    pub fn len(&self) -> usize {
        match self {
            SamplesMut::Q7(s) => s.len(),
            SamplesMut::Q15(s) => s.len(),
            SamplesMut::Q31(s) => s.len(),
            SamplesMut::F32(s) => s.len(),
        }
    }

    /// Format tag.
    pub fn format(&self) -> NumericFormat {
        match self {
            SamplesMut::Q7(_) => NumericFormat::Q7,
            SamplesMut::Q15(_) => NumericFormat::Q15,
            SamplesMut::Q31(_) => NumericFormat::Q31,
            SamplesMut::F32(_) => NumericFormat::F32,
        }
    }

    fn address(&mut self) -> usize {
        match self {
            SamplesMut::Q7(s) => s.as_mut_ptr() as usize,
            SamplesMut::Q15(s) => s.as_mut_ptr() as usize,
            SamplesMut::Q31(s) => s.as_mut_ptr() as usize,
            SamplesMut::F32(s) => s.as_mut_ptr() as usize,
        }
    }

    /// Store a bank word into the element at `index`, narrowing back to
    /// the element width.
    fn store_word(&mut self, index: usize, word: u32) {
        match self {
            SamplesMut::Q7(s) => s[index] = word as i8,
            SamplesMut::Q15(s) => s[index] = word as i16,
            SamplesMut::Q31(s) => s[index] = word as i32,
            SamplesMut::F32(s) => s[index] = f32::from_bits(word),
        }
    }
}

impl<'a> BufferRef<'a> {
    /// A real-valued input.
    pub fn real(samples: Samples<'a>) -> Self {
        Self {
            samples,
            complex: false,
        }
    }

    /// A complex input, interleaved `[re, im, ...]`. The raw length must
    /// be even; the planner rejects odd lengths.
    pub fn complex(samples: Samples<'a>) -> Self {
        Self {
            samples,
            complex: true,
        }
    }

    /// Real/complex tag.
    pub fn is_complex(&self) -> bool {
        self.complex
    }

    /// Format tag.
    pub fn format(&self) -> NumericFormat {
        self.samples.format()
    }

    /// Length in samples: complex sample pairs count once.
    pub fn sample_count(&self) -> usize {
        if self.complex {
            self.samples.len() / 2
        } else {
            self.samples.len()
        }
    }

    fn q15(&self) -> Option<&'a [i16]> {
        match self.samples {
            Samples::Q15(s) => Some(s),
            _ => None,
        }
    }
}

impl<'a> BufferMut<'a> {
    /// A real-valued output.
    pub fn real(samples: SamplesMut<'a>) -> Self {
        Self {
            samples,
            complex: false,
        }
    }

    /// A complex output, interleaved `[re, im, ...]`.
    pub fn complex(samples: SamplesMut<'a>) -> Self {
        Self {
            samples,
            complex: true,
        }
    }

    /// Real/complex tag.
    pub fn is_complex(&self) -> bool {
        self.complex
    }

    /// Format tag.
    pub fn format(&self) -> NumericFormat {
        self.samples.format()
    }

    /// Length in samples: complex sample pairs count once.
    pub fn sample_count(&self) -> usize {
        if self.complex {
            self.samples.len() / 2
        } else {
            self.samples.len()
        }
    }

    pub(crate) fn samples_mut(&mut self) -> &mut SamplesMut<'a> {
        &mut self.samples
    }
}

//
// impls — planner
//

impl Planner {
    pub(crate) fn new(strategy: PlacementStrategy) -> Self {
        Self { strategy }
    }

    pub(crate) fn strategy(&self) -> PlacementStrategy {
        self.strategy
    }

    /// Validate the operands against `op`'s contract, resolve their
    /// placement, and (staged strategy) copy the inputs into the banks.
    ///
    /// Every check runs before the first bank write, so a failed plan has
    /// touched no hardware.
    pub(crate) fn plan<A: FimAccess>(
        &self,
        op: &Operation,
        inputs: &[BufferRef],
        output: &mut BufferMut,
        access: &mut A,
    ) -> Result<Plan, PlanError> {
        validate(op, inputs, output)?;
        let kind = data_kind(op, inputs);

        if matches!(op, Operation::CfftRadix2) {
            // The butterfly pass gathers a fixed input permutation, so it
            // always works out of the banks regardless of strategy.
            return self.plan_fft(inputs, access);
        }

        let staged = matches!(self.strategy, PlacementStrategy::Staged);
        let promote = inputs.len() == 2 && (inputs[0].complex != inputs[1].complex);

        let input1 = self.place_input(inputs[0], Bank::B0, promote, access);
        let input2 = match op.lookup_table() {
            Some(table) => Some(self.place_table(table, access)),
            None => inputs
                .get(1)
                .map(|buf| self.place_input(*buf, Bank::B1, promote, access)),
        };
        let output_desc = OperandDescriptor {
            location: if staged {
                Location::Bank(Bank::B2)
            } else {
                Location::Application(output.samples.address())
            },
            elements: output.sample_count() as u32,
            format: output.format(),
            complex: output.is_complex(),
        };

        Ok(Plan {
            input1,
            input2,
            output: output_desc,
            kind,
        })
    }

    /// Resolve one input, staging it when the strategy calls for it.
    ///
    /// `promote` marks the mixed real/complex case: the real operand of a
    /// complex operation is staged in the complex layout with a zeroed
    /// imaginary half, so both banks present the same shape to the unit.
    fn place_input<A: FimAccess>(
        &self,
        buffer: BufferRef,
        bank: Bank,
        promote: bool,
        access: &mut A,
    ) -> OperandDescriptor {
        let complex_layout = buffer.complex || promote;
        match self.strategy {
            PlacementStrategy::Direct => OperandDescriptor {
                location: Location::Application(buffer.samples.address()),
                elements: buffer.sample_count() as u32,
                format: buffer.format(),
                complex: buffer.complex,
            },
            PlacementStrategy::Staged => {
                if let (Some(q15), true) = (buffer.q15(), complex_layout) {
                    stage_complex_q15(access, bank, q15, buffer.complex);
                } else {
                    stage_real(access, bank, &buffer.samples);
                }
                OperandDescriptor {
                    location: Location::Bank(bank),
                    elements: buffer.sample_count() as u32,
                    format: buffer.format(),
                    complex: buffer.complex,
                }
            }
        }
    }

    /// Resolve the implicit lookup-table operand of the table-driven
    /// operations.
    fn place_table<A: FimAccess>(
        &self,
        table: super::op::LookupTable,
        access: &mut A,
    ) -> OperandDescriptor {
        let table: &[i16] = match table {
            super::op::LookupTable::Trig => &TRIG_TABLE,
            super::op::LookupTable::RootLog => &ROOT_LOG_TABLE,
        };
        let location = match self.strategy {
            PlacementStrategy::Direct => Location::Application(table.as_ptr() as usize),
            PlacementStrategy::Staged => {
                stage_real(access, Bank::B1, &Samples::Q15(table));
                Location::Bank(Bank::B1)
            }
        };
        OperandDescriptor {
            location,
            elements: APPROX_TABLE_LEN as u32,
            format: NumericFormat::Q15,
            complex: false,
        }
    }

    /// Butterfly-pass placement: even samples to bank 0, odd samples to
    /// bank 1, the twiddle table to the output bank, which the unit
    /// overwrites with the stage result.
    fn plan_fft<A: FimAccess>(&self, inputs: &[BufferRef], access: &mut A) -> Result<Plan, PlanError> {
        let Samples::Q31(data) = inputs[0].samples else {
            return Err(PlanError::UnsupportedFormat);
        };
        for (slot, sample) in FFT_EVEN_INDEX.iter().enumerate() {
            let base = *sample as usize * 2;
            access.write_bank_word(Bank::B0, slot * 2, data[base] as u32);
            access.write_bank_word(Bank::B0, slot * 2 + 1, data[base + 1] as u32);
        }
        for (slot, sample) in FFT_ODD_INDEX.iter().enumerate() {
            let base = *sample as usize * 2;
            access.write_bank_word(Bank::B1, slot * 2, data[base] as u32);
            access.write_bank_word(Bank::B1, slot * 2 + 1, data[base + 1] as u32);
        }
        for (slot, word) in FFT_TWIDDLE_TABLE.iter().enumerate() {
            access.write_bank_word(Bank::B2, slot, *word as u32);
        }

        let half = |bank| OperandDescriptor {
            location: Location::Bank(bank),
            elements: FFT_HALF as u32,
            format: NumericFormat::Q31,
            complex: true,
        };
        Ok(Plan {
            input1: half(Bank::B0),
            input2: Some(half(Bank::B1)),
            output: OperandDescriptor {
                location: Location::Bank(Bank::B2),
                elements: FFT_LENGTH as u32,
                format: NumericFormat::Q31,
                complex: true,
            },
            kind: DataKind::ComplexComplex,
        })
    }
}

//
// free functions — validation
//

fn validate(op: &Operation, inputs: &[BufferRef], output: &BufferMut) -> Result<(), PlanError> {
    if inputs.len() != op.input_arity() {
        return Err(PlanError::SizeMismatch);
    }

    // Single element format across all operands.
    let format = inputs[0].format();
    if inputs.iter().any(|b| b.format() != format) || output.format() != format {
        return Err(PlanError::UnsupportedFormat);
    }
    if !op.supports_format(format) {
        return Err(PlanError::UnsupportedFormat);
    }
    if let Some(scalar) = op.scalar() {
        if scalar.format() != format {
            return Err(PlanError::UnsupportedFormat);
        }
    }

    // Real/complex tagging.
    let any_complex = inputs.iter().any(|b| b.complex) || output.complex;
    if any_complex && !op.accepts_complex() {
        return Err(PlanError::UnsupportedFormat);
    }
    if any_complex && !matches!(op, Operation::CfftRadix2) && format != NumericFormat::Q15 {
        // The interleaved bank layout is a half-word format.
        return Err(PlanError::UnsupportedFormat);
    }
    for buf in inputs {
        if buf.complex && buf.samples.len() % 2 != 0 {
            return Err(PlanError::SizeMismatch);
        }
    }
    if output.complex && output.samples.len() % 2 != 0 {
        return Err(PlanError::SizeMismatch);
    }
    if inputs.iter().any(|b| b.sample_count() == 0) {
        return Err(PlanError::SizeMismatch);
    }

    validate_lengths(op, inputs, output)?;
    validate_complex_tags(op, inputs, output)
}

fn validate_lengths(op: &Operation, inputs: &[BufferRef], output: &BufferMut) -> Result<(), PlanError> {
    let n = inputs[0].sample_count();
    let out = output.sample_count();
    let ok = match op {
        Operation::VectorAdd | Operation::VectorSub | Operation::VectorMul => {
            inputs[1].sample_count() == n && out == n
        }
        Operation::ScalarAdd(_) | Operation::ScalarSub(_) | Operation::ScalarMul(_) => out == n,
        Operation::NormSquare => out == n,
        Operation::MatrixMul { a, b } => {
            a.rows > 0
                && a.cols > 0
                && b.cols > 0
                && a.cols == b.rows
                && n == a.elements()
                && inputs[1].sample_count() == b.elements()
                && out == a.rows as usize * b.cols as usize
        }
        Operation::MatrixAdd { a, b } | Operation::MatrixSub { a, b } | Operation::MatrixHadamard { a, b } => {
            a.rows > 0
                && a.cols > 0
                && *a == *b
                && n == a.elements()
                && inputs[1].sample_count() == b.elements()
                && out == a.elements()
        }
        Operation::MatrixTranspose { a } => {
            a.rows > 0 && a.cols > 0 && n == a.elements() && out == a.elements()
        }
        Operation::Fir { taps } => {
            *taps > 0 && inputs[1].sample_count() == *taps as usize && out == n
        }
        Operation::FirInterpolate { factor, phase_length } => {
            *factor > 0
                && *phase_length > 0
                && inputs[1].sample_count() == *factor as usize * *phase_length as usize
                && out == n * *factor as usize
        }
        Operation::FirDecimate { factor, taps } => {
            *factor > 0
                && *taps > 0
                && inputs[1].sample_count() == *taps as usize
                && n % *factor as usize == 0
                && out == n / *factor as usize
        }
        Operation::Correlate => {
            let m = inputs[1].sample_count();
            out == 2 * n.max(m) - 1
        }
        Operation::Sin
        | Operation::Cos
        | Operation::ArcTan
        | Operation::Sinh
        | Operation::Cosh
        | Operation::ArcTanh
        | Operation::SquareRoot
        | Operation::NaturalLog => out == n,
        Operation::CfftRadix2 => {
            inputs[0].samples.len() == 2 * FFT_LENGTH && output.samples.len() == 2 * FFT_LENGTH
        }
    };
    if ok {
        Ok(())
    } else {
        Err(PlanError::SizeMismatch)
    }
}

fn validate_complex_tags(op: &Operation, inputs: &[BufferRef], output: &BufferMut) -> Result<(), PlanError> {
    let expected_out = match op {
        Operation::VectorAdd | Operation::VectorSub | Operation::VectorMul => {
            inputs.iter().any(|b| b.complex)
        }
        // Squared magnitude collapses to a real output.
        Operation::NormSquare => false,
        Operation::CfftRadix2 => {
            if !(inputs[0].complex && output.complex) {
                return Err(PlanError::UnsupportedFormat);
            }
            true
        }
        _ => false,
    };
    if output.complex != expected_out {
        return Err(PlanError::UnsupportedFormat);
    }
    Ok(())
}

fn data_kind(op: &Operation, inputs: &[BufferRef]) -> DataKind {
    match op {
        Operation::CfftRadix2 => DataKind::ComplexComplex,
        _ => {
            let a = inputs[0].complex;
            let b = inputs.get(1).map(|i| i.complex).unwrap_or(false);
            match (a, b) {
                (false, false) => DataKind::RealReal,
                (true, false) => DataKind::ComplexReal,
                (false, true) => DataKind::RealComplex,
                (true, true) => DataKind::ComplexComplex,
            }
        }
    }
}

//
// free functions — staging
//

/// Widen real elements into consecutive bank words.
fn stage_real<A: FimAccess>(access: &mut A, bank: Bank, samples: &Samples) {
    for index in 0..samples.len() {
        access.write_bank_word(bank, index, samples.word(index));
    }
}

/// Interleave Q15 data into the complex bank layout: real part at the odd
/// half-word of each pair, imaginary at the even. A real input
/// (`complex == false`) is promoted with a zeroed imaginary half.
fn stage_complex_q15<A: FimAccess>(access: &mut A, bank: Bank, data: &[i16], complex: bool) {
    if complex {
        for (sample, pair) in data.chunks_exact(2).enumerate() {
            access.write_bank_half(bank, sample * 2 + 1, pair[0] as u16);
            access.write_bank_half(bank, sample * 2, pair[1] as u16);
        }
    } else {
        for (sample, value) in data.iter().enumerate() {
            access.write_bank_half(bank, sample * 2 + 1, *value as u16);
            access.write_bank_half(bank, sample * 2, 0);
        }
    }
}

/// Copy a result bank back into the caller's buffer, undoing the complex
/// interleave where the output is complex Q15.
pub(crate) fn unstage<A: FimAccess>(access: &A, bank: Bank, output: &mut BufferMut) {
    let complex = output.is_complex();
    match output.samples_mut() {
        SamplesMut::Q15(dest) if complex => {
            for sample in 0..dest.len() / 2 {
                dest[sample * 2] = access.read_bank_half(bank, sample * 2 + 1) as i16;
                dest[sample * 2 + 1] = access.read_bank_half(bank, sample * 2) as i16;
            }
        }
        samples => {
            for index in 0..samples.len() {
                let word = access.read_bank_word(bank, index);
                samples.store_word(index, word);
            }
        }
    }
}
