//! Test-only register model of the coprocessor.
//!
//! Records every register and bank write so tests can assert on "zero
//! hardware writes" and on the exact programming sequence, and emulates
//! enough of the unit (real vector/scalar arithmetic and matrix multiply,
//! on 32-bit integer lanes) that results are observable end-to-end.

use super::access::{Bank, FimAccess, BANK_SIZE_WORDS};
use super::format::{ControlWord, NumericFormat};
use super::op::DataKind;

pub(crate) struct MockFim {
    pub banks: [[u32; BANK_SIZE_WORDS]; 4],
    pub lengths: Option<(u16, u32, u32)>,
    pub control: Option<ControlWord>,
    pub scalar: Option<u32>,
    pub input1: Option<usize>,
    pub input2: Option<usize>,
    pub output: Option<usize>,
    pub decimation: Option<u8>,
    pub interpolation: Option<u8>,
    pub mode: Option<u8>,
    pub last_trigger: Option<(u16, u16, DataKind)>,
    pub completed: bool,
    /// Count of every mutating access (registers and banks).
    pub writes: usize,
    pub trigger_count: usize,
    /// When false, a trigger never reports completion (hung-unit model).
    pub auto_complete: bool,
    /// Element format assumed when emulating direct-placement operands.
    pub direct_format: Option<NumericFormat>,
}

impl MockFim {
    pub fn new() -> Self {
        Self {
            banks: [[0; BANK_SIZE_WORDS]; 4],
            lengths: None,
            control: None,
            scalar: None,
            input1: None,
            input2: None,
            output: None,
            decimation: None,
            interpolation: None,
            mode: None,
            last_trigger: None,
            completed: false,
            writes: 0,
            trigger_count: 0,
            auto_complete: true,
            direct_format: None,
        }
    }

    fn bank_of(addr: usize) -> Option<Bank> {
        [Bank::B0, Bank::B1, Bank::B2, Bank::B3]
            .into_iter()
            .find(|bank| bank.base_address() == addr)
    }

    fn load(&self, addr: usize, index: usize) -> i32 {
        match Self::bank_of(addr) {
            Some(bank) => self.banks[bank.index()][index] as i32,
            None => {
                let format = self.direct_format.expect("direct emulation needs a format");
                // SAFETY: test-only; the address came from a live slice
                // owned by the test that is still in scope.
                unsafe {
                    match format {
                        NumericFormat::Q7 => *(addr as *const i8).add(index) as i32,
                        NumericFormat::Q15 => *(addr as *const i16).add(index) as i32,
                        NumericFormat::Q31 => *(addr as *const i32).add(index),
                        NumericFormat::F32 => panic!("float emulation not modelled"),
                    }
                }
            }
        }
    }

    fn store(&mut self, addr: usize, index: usize, value: i32) {
        match Self::bank_of(addr) {
            Some(bank) => self.banks[bank.index()][index] = value as u32,
            None => {
                let format = self.direct_format.expect("direct emulation needs a format");
                // SAFETY: as in `load`, with a mutably owned destination.
                unsafe {
                    match format {
                        NumericFormat::Q7 => *(addr as *mut i8).add(index) = value as i8,
                        NumericFormat::Q15 => *(addr as *mut i16).add(index) = value as i16,
                        NumericFormat::Q31 => *(addr as *mut i32).add(index) = value,
                        NumericFormat::F32 => panic!("float emulation not modelled"),
                    }
                }
            }
        }
    }

    /// Integer-lane model of the triggered operation. Unmodelled opcodes
    /// complete without touching the output.
    fn emulate(&mut self) {
        let Some(opcode) = self.mode else { return };
        let (mat, len1, _len2) = self.lengths.unwrap_or((0, 0, 0));
        let (in1, in2, out) = (self.input1, self.input2, self.output);

        match opcode {
            // Vector add / sub / mul.
            0x47 | 0x49 | 0x4A => {
                let (in1, in2, out) = (in1.unwrap(), in2.unwrap(), out.unwrap());
                for i in 0..len1 as usize {
                    let a = self.load(in1, i);
                    let b = self.load(in2, i);
                    let v = match opcode {
                        0x47 => a.wrapping_add(b),
                        0x49 => a.wrapping_sub(b),
                        _ => a.wrapping_mul(b),
                    };
                    self.store(out, i, v);
                }
            }
            // Scalar add / sub / mul.
            0x44 | 0x45 | 0x46 => {
                let (in1, out) = (in1.unwrap(), out.unwrap());
                let scalar = self.scalar.unwrap() as i32;
                for i in 0..len1 as usize {
                    let a = self.load(in1, i);
                    let v = match opcode {
                        0x44 => a.wrapping_add(scalar),
                        0x45 => a.wrapping_sub(scalar),
                        _ => a.wrapping_mul(scalar),
                    };
                    self.store(out, i, v);
                }
            }
            // Matrix multiply: `mat` carries A's column count, the
            // trigger carries the output extent.
            0x4C => {
                let (in1, in2, out) = (in1.unwrap(), in2.unwrap(), out.unwrap());
                let (rows, cols, _) = self.last_trigger.unwrap();
                let inner = mat as usize;
                for i in 0..rows as usize {
                    for j in 0..cols as usize {
                        let mut acc = 0i64;
                        for k in 0..inner {
                            let a = self.load(in1, i * inner + k) as i64;
                            let b = self.load(in2, k * cols as usize + j) as i64;
                            acc += a * b;
                        }
                        self.store(out, i * cols as usize + j, acc as i32);
                    }
                }
            }
            _ => {}
        }
    }
}

impl FimAccess for MockFim {
    fn set_data_lengths(&mut self, mat_or_taps: u16, input1: u32, input2: u32) {
        self.writes += 1;
        self.lengths = Some((mat_or_taps, input1, input2));
    }

    fn set_control_word(&mut self, word: ControlWord) {
        self.writes += 1;
        self.control = Some(word);
    }

    fn set_scalar(&mut self, raw: u32) {
        self.writes += 1;
        self.scalar = Some(raw);
    }

    fn set_input1_addr(&mut self, addr: usize) {
        self.writes += 1;
        self.input1 = Some(addr);
    }

    fn set_input2_addr(&mut self, addr: usize) {
        self.writes += 1;
        self.input2 = Some(addr);
    }

    fn set_output_addr(&mut self, addr: usize) {
        self.writes += 1;
        self.output = Some(addr);
    }

    fn set_decimation_factor(&mut self, factor: u8) {
        self.writes += 1;
        self.decimation = Some(factor);
    }

    fn set_interpolation_factor(&mut self, factor: u8) {
        self.writes += 1;
        self.interpolation = Some(factor);
    }

    fn set_mode(&mut self, opcode: u8) {
        self.writes += 1;
        self.mode = Some(opcode);
    }

    fn trigger(&mut self, rows: u16, cols: u16, kind: DataKind) {
        self.writes += 1;
        self.trigger_count += 1;
        self.last_trigger = Some((rows, cols, kind));
        if self.auto_complete {
            self.emulate();
            self.completed = true;
        }
    }

    fn completed(&self) -> bool {
        self.completed
    }

    fn clear_completed(&mut self) {
        self.writes += 1;
        self.completed = false;
    }

    fn write_bank_word(&mut self, bank: Bank, index: usize, word: u32) {
        self.writes += 1;
        self.banks[bank.index()][index] = word;
    }

    fn read_bank_word(&self, bank: Bank, index: usize) -> u32 {
        self.banks[bank.index()][index]
    }

    fn write_bank_half(&mut self, bank: Bank, index: usize, half: u16) {
        self.writes += 1;
        let word = &mut self.banks[bank.index()][index / 2];
        if index % 2 == 0 {
            *word = (*word & 0xFFFF_0000) | half as u32;
        } else {
            *word = (*word & 0x0000_FFFF) | ((half as u32) << 16);
        }
    }

    fn read_bank_half(&self, bank: Bank, index: usize) -> u16 {
        let word = self.banks[bank.index()][index / 2];
        if index % 2 == 0 {
            word as u16
        } else {
            (word >> 16) as u16
        }
    }
}
