//! The operation set of the coprocessor.
//!
//! Each variant knows its hardware opcode, which element formats the unit
//! accepts for it, whether complex data is meaningful, and the
//! saturate/truncate control word to program. The dispatcher consults
//! these tables; nothing here touches hardware.

use super::format::{ControlWord, NumericFormat};

//
// Structs + Enums
//

/// Row/column extent of a matrix operand, row-major in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MatrixDims {
    /// Number of rows.
    pub rows: u16,
    /// Number of columns.
    pub cols: u16,
}

impl MatrixDims {
    /// Total element count.
    pub const fn elements(self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

/// A scalar operand, tagged with its format.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Scalar {
    /// Q7 scalar.
    Q7(i8),
    /// Q15 scalar.
    Q15(i16),
    /// Q31 scalar.
    Q31(i32),
    /// Single-precision scalar.
    F32(f32),
}

impl Scalar {
    /// The format this scalar is expressed in.
    pub const fn format(self) -> NumericFormat {
        match self {
            Scalar::Q7(_) => NumericFormat::Q7,
            Scalar::Q15(_) => NumericFormat::Q15,
            Scalar::Q31(_) => NumericFormat::Q31,
            Scalar::F32(_) => NumericFormat::F32,
        }
    }

    /// The value as programmed into the scalar data register:
    /// sign-extended for the fixed-point formats, raw bits for float.
    pub(crate) fn to_raw(self) -> u32 {
        match self {
            Scalar::Q7(v) => v as i32 as u32,
            Scalar::Q15(v) => v as i32 as u32,
            Scalar::Q31(v) => v as u32,
            Scalar::F32(v) => v.to_bits(),
        }
    }
}

/// Real/complex tagging of the two inputs, as encoded in the trigger
/// register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataKind {
    /// Both operands real.
    RealReal = 0,
    /// First operand complex, second real.
    ComplexReal = 1,
    /// First operand real, second complex.
    RealComplex = 2,
    /// Both operands complex.
    ComplexComplex = 3,
}

/// One coprocessor operation.
///
/// Variants carry the operation-specific control parameters (scalar value,
/// matrix extents, filter geometry); the operand data itself travels in
/// buffers.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    /// Elementwise sum of two vectors.
    VectorAdd,
    /// Elementwise difference of two vectors.
    VectorSub,
    /// Elementwise product of two vectors.
    VectorMul,
    /// Add a constant to every element.
    ScalarAdd(Scalar),
    /// Subtract a constant from every element.
    ScalarSub(Scalar),
    /// Scale every element by a constant.
    ScalarMul(Scalar),
    /// Squared magnitude of every element (complex input collapses to a
    /// real output).
    NormSquare,
    /// Matrix product; requires `a.cols == b.rows`.
    MatrixMul {
        /// Extent of the first operand.
        a: MatrixDims,
        /// Extent of the second operand.
        b: MatrixDims,
    },
    /// Elementwise matrix sum; extents must match.
    MatrixAdd {
        /// Extent of the first operand.
        a: MatrixDims,
        /// Extent of the second operand.
        b: MatrixDims,
    },
    /// Elementwise matrix difference; extents must match.
    MatrixSub {
        /// Extent of the first operand.
        a: MatrixDims,
        /// Extent of the second operand.
        b: MatrixDims,
    },
    /// Elementwise (Hadamard) matrix product; extents must match.
    MatrixHadamard {
        /// Extent of the first operand.
        a: MatrixDims,
        /// Extent of the second operand.
        b: MatrixDims,
    },
    /// Matrix transpose.
    MatrixTranspose {
        /// Extent of the input.
        a: MatrixDims,
    },
    /// FIR filter over the input block.
    Fir {
        /// Number of filter coefficients (second operand length).
        taps: u16,
    },
    /// Polyphase FIR interpolator; output is `factor` times the input
    /// length, coefficients are `factor * phase_length` long.
    FirInterpolate {
        /// Upsample factor.
        factor: u8,
        /// Coefficients per polyphase arm.
        phase_length: u16,
    },
    /// FIR decimator; output is the input length divided by `factor`.
    FirDecimate {
        /// Downsample factor.
        factor: u8,
        /// Number of filter coefficients.
        taps: u16,
    },
    /// Cross-correlation of two sequences; output length is
    /// `2 * max(len_a, len_b) - 1`.
    Correlate,
    /// Table-driven sine approximation.
    Sin,
    /// Table-driven cosine approximation.
    Cos,
    /// Table-driven arc-tangent approximation.
    ArcTan,
    /// Table-driven hyperbolic sine approximation.
    Sinh,
    /// Table-driven hyperbolic cosine approximation.
    Cosh,
    /// Table-driven inverse hyperbolic tangent approximation.
    ArcTanh,
    /// Table-driven square root.
    SquareRoot,
    /// Table-driven natural logarithm.
    NaturalLog,
    /// One radix-2 butterfly pass over a fixed-length complex block.
    CfftRadix2,
}

//
// impls
//

impl Operation {
    /// The mode register opcode.
    pub(crate) fn opcode(&self) -> u8 {
        match self {
            Operation::Fir { .. } => 0x01,
            Operation::Correlate => 0x03,
            Operation::FirDecimate { .. } => 0x04,
            Operation::CfftRadix2 => 0x08,
            Operation::ScalarAdd(_) => 0x44,
            Operation::ScalarSub(_) => 0x45,
            Operation::ScalarMul(_) => 0x46,
            Operation::VectorAdd => 0x47,
            Operation::VectorSub => 0x49,
            Operation::VectorMul => 0x4A,
            Operation::MatrixMul { .. } => 0x4C,
            Operation::MatrixAdd { .. } => 0x4D,
            Operation::MatrixSub { .. } => 0x4E,
            Operation::MatrixHadamard { .. } => 0x4F,
            Operation::MatrixTranspose { .. } => 0x50,
            Operation::Sin => 0x51,
            Operation::Cos => 0x52,
            Operation::ArcTan => 0x54,
            Operation::Sinh => 0x55,
            Operation::Cosh => 0x56,
            Operation::ArcTanh => 0x57,
            Operation::SquareRoot => 0x58,
            Operation::NaturalLog => 0x59,
            Operation::FirInterpolate { .. } => 0x63,
            Operation::NormSquare => 0xAB,
        }
    }

    /// Number of caller-supplied input buffers. Table-driven operations
    /// supply their lookup table internally.
    pub fn input_arity(&self) -> usize {
        match self {
            Operation::VectorAdd
            | Operation::VectorSub
            | Operation::VectorMul
            | Operation::MatrixMul { .. }
            | Operation::MatrixAdd { .. }
            | Operation::MatrixSub { .. }
            | Operation::MatrixHadamard { .. }
            | Operation::Fir { .. }
            | Operation::FirInterpolate { .. }
            | Operation::FirDecimate { .. }
            | Operation::Correlate => 2,
            _ => 1,
        }
    }

    /// The element formats the unit accepts for this operation.
    pub fn supports_format(&self, format: NumericFormat) -> bool {
        use NumericFormat::*;
        match self {
            Operation::VectorAdd
            | Operation::VectorSub
            | Operation::VectorMul
            | Operation::ScalarAdd(_)
            | Operation::ScalarSub(_)
            | Operation::ScalarMul(_)
            | Operation::NormSquare
            | Operation::Fir { .. } => true,
            Operation::MatrixMul { .. } | Operation::FirInterpolate { .. } => {
                matches!(format, Q15 | Q31 | F32)
            }
            Operation::MatrixAdd { .. }
            | Operation::MatrixSub { .. }
            | Operation::MatrixHadamard { .. }
            | Operation::MatrixTranspose { .. }
            | Operation::FirDecimate { .. } => matches!(format, Q15 | Q31),
            Operation::Correlate => matches!(format, Q7 | Q15 | Q31),
            Operation::Sin
            | Operation::Cos
            | Operation::ArcTan
            | Operation::Sinh
            | Operation::Cosh
            | Operation::ArcTanh
            | Operation::SquareRoot
            | Operation::NaturalLog => matches!(format, Q15),
            Operation::CfftRadix2 => matches!(format, Q31),
        }
    }

    /// Does this operation give complex data a meaning?
    pub fn accepts_complex(&self) -> bool {
        matches!(
            self,
            Operation::VectorAdd
                | Operation::VectorSub
                | Operation::VectorMul
                | Operation::NormSquare
                | Operation::CfftRadix2
        )
    }

    /// The scalar constant carried by the scalar-form operations.
    pub(crate) fn scalar(&self) -> Option<Scalar> {
        match self {
            Operation::ScalarAdd(s) | Operation::ScalarSub(s) | Operation::ScalarMul(s) => Some(*s),
            _ => None,
        }
    }

    /// Is this one of the matrix-shaped operations (for error mapping)?
    pub(crate) fn is_matrix(&self) -> bool {
        matches!(
            self,
            Operation::MatrixMul { .. }
                | Operation::MatrixAdd { .. }
                | Operation::MatrixSub { .. }
                | Operation::MatrixHadamard { .. }
                | Operation::MatrixTranspose { .. }
        )
    }

    /// The saturate/truncate/round word for this operation at `format`.
    ///
    /// Additive operations saturate at the full accumulator width; the
    /// multiplicative ones narrow per format; the complex multiply paths
    /// shift the product down by one.
    pub(crate) fn control_word(&self, format: NumericFormat, kind: DataKind) -> ControlWord {
        use NumericFormat::*;
        let multiplicative = |format: NumericFormat| match format {
            F32 => ControlWord::saturate(0x9),
            Q31 => ControlWord::saturate(0x1),
            Q15 => ControlWord::saturate(0x11),
            Q7 => ControlWord::saturate(0x19),
        };
        match self {
            Operation::VectorAdd
            | Operation::VectorSub
            | Operation::ScalarAdd(_)
            | Operation::ScalarSub(_)
            | Operation::MatrixAdd { .. }
            | Operation::MatrixSub { .. } => ControlWord::saturate(0x1F),
            Operation::VectorMul => match kind {
                DataKind::ComplexComplex => ControlWord::new(0x10, 0, false, 1),
                _ => multiplicative(format),
            },
            Operation::NormSquare => match kind {
                DataKind::RealReal => multiplicative(format),
                _ => ControlWord::new(0x10, 0, false, 1),
            },
            Operation::ScalarMul(_)
            | Operation::MatrixMul { .. }
            | Operation::Fir { .. }
            | Operation::FirInterpolate { .. } => multiplicative(format),
            Operation::MatrixHadamard { .. } | Operation::MatrixTranspose { .. } => {
                ControlWord::saturate(0x11)
            }
            Operation::FirDecimate { .. } | Operation::Correlate | Operation::CfftRadix2 => {
                ControlWord::saturate(0x1)
            }
            Operation::Sin
            | Operation::Cos
            | Operation::ArcTan
            | Operation::Sinh
            | Operation::Cosh
            | Operation::ArcTanh
            | Operation::SquareRoot
            | Operation::NaturalLog => ControlWord::saturate(0x1F),
        }
    }

    /// Is this one of the table-driven single-input approximations?
    pub(crate) fn lookup_table(&self) -> Option<LookupTable> {
        match self {
            Operation::Sin | Operation::Cos | Operation::ArcTan | Operation::Sinh
            | Operation::Cosh | Operation::ArcTanh => Some(LookupTable::Trig),
            Operation::SquareRoot | Operation::NaturalLog => Some(LookupTable::RootLog),
            _ => None,
        }
    }
}

/// Which fixed table a table-driven operation consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LookupTable {
    Trig,
    RootLog,
}
