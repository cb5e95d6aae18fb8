//! Floating-point arithmetic and compare executors.
//!
//! IEEE-754 double arithmetic on the host FPU. Exceptional outcomes are
//! recorded as FPSCR sticky bits and never interrupt execution.

use ppc_asm::Instruction;

use crate::fault::Fault;
use crate::registers::{CR_EQ, CR_GT, CR_LT, CR_SO};
use crate::Simulator;

/// A NaN whose quiet bit is clear (and whose mantissa is nonzero).
fn is_signaling_nan(value: f64) -> bool {
    let bits = value.to_bits();
    let quiet_bit = 1 << 51;
    value.is_nan() && bits & quiet_bit == 0
}

impl Simulator {
    pub(crate) fn exec_fadd(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.state.fpr_double(instr.ra()) + self.state.fpr_double(instr.rb());
        self.state.set_fpr_double(instr.rt(), value);
        Ok(())
    }

    pub(crate) fn exec_fsub(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.state.fpr_double(instr.ra()) - self.state.fpr_double(instr.rb());
        self.state.set_fpr_double(instr.rt(), value);
        Ok(())
    }

    pub(crate) fn exec_fmul(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.state.fpr_double(instr.ra()) * self.state.fpr_double(instr.rb());
        self.state.set_fpr_double(instr.rt(), value);
        Ok(())
    }

    /// Division by zero sets the sticky bit but still produces the IEEE
    /// result (an infinity, or NaN for 0/0).
    pub(crate) fn exec_fdiv(&mut self, instr: Instruction) -> Result<(), Fault> {
        let dividend = self.state.fpr_double(instr.ra());
        let divisor = self.state.fpr_double(instr.rb());
        if divisor == 0.0 {
            self.state.fpscr.zero_divide = true;
        }
        self.state.set_fpr_double(instr.rt(), dividend / divisor);
        Ok(())
    }

    /// Unordered compare: {LT, GT, EQ, UN} into the selected CR field,
    /// mirrored into the FPSCR condition bits.
    pub(crate) fn exec_fcmpu(&mut self, instr: Instruction) -> Result<(), Fault> {
        let a = self.state.fpr_double(instr.ra());
        let b = self.state.fpr_double(instr.rb());
        let nibble = if a.is_nan() || b.is_nan() {
            CR_SO
        } else if a < b {
            CR_LT
        } else if a > b {
            CR_GT
        } else {
            CR_EQ
        };
        self.state.cr.set_field(instr.bf(), nibble);
        self.state.fpscr.condition = nibble;
        if is_signaling_nan(a) || is_signaling_nan(b) {
            self.state.fpscr.invalid_op = true;
        }
        Ok(())
    }
}
