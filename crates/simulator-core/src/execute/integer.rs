//! Integer arithmetic, logical, rotate-and-mask, shift, compare and SPR-move
//! executors.

use ppc_asm::opcodes::spr;
use ppc_asm::Instruction;

use super::{add_with_carry, mask_from_mb_me};
use crate::fault::Fault;
use crate::registers::{compare_nibble_signed, compare_nibble_unsigned};
use crate::Simulator;

impl Simulator {
    // --- D-form arithmetic ---

    pub(crate) fn exec_addi(&mut self, instr: Instruction) -> Result<(), Fault> {
        let imm = instr.simm16() as u32;
        let base = if instr.ra() == 0 {
            0
        } else {
            self.state.gpr(instr.ra())
        };
        self.state.set_gpr(instr.rt(), base.wrapping_add(imm));
        Ok(())
    }

    pub(crate) fn exec_addis(&mut self, instr: Instruction) -> Result<(), Fault> {
        let imm = instr.uimm16() << 16;
        let base = if instr.ra() == 0 {
            0
        } else {
            self.state.gpr(instr.ra())
        };
        self.state.set_gpr(instr.rt(), base.wrapping_add(imm));
        Ok(())
    }

    /// `addic`/`addic.` always read rA (no r0-as-zero) and always set carry.
    pub(crate) fn exec_addic(&mut self, instr: Instruction, record: bool) -> Result<(), Fault> {
        let result = add_with_carry(self.state.gpr(instr.ra()), instr.simm16() as u32, false);
        self.state.set_gpr(instr.rt(), result.value);
        self.state.xer.set_ca(result.carry);
        if record {
            self.set_cr0(result.value);
        }
        Ok(())
    }

    pub(crate) fn exec_mulli(&mut self, instr: Instruction) -> Result<(), Fault> {
        let product = (self.state.gpr(instr.ra()) as i32).wrapping_mul(instr.simm16());
        self.state.set_gpr(instr.rt(), product as u32);
        Ok(())
    }

    /// `subfic`: imm - rA with carry meaning "no borrow".
    pub(crate) fn exec_subfic(&mut self, instr: Instruction) -> Result<(), Fault> {
        let result = add_with_carry(!self.state.gpr(instr.ra()), instr.simm16() as u32, true);
        self.state.set_gpr(instr.rt(), result.value);
        self.state.xer.set_ca(result.carry);
        Ok(())
    }

    // --- XO-form arithmetic ---

    pub(crate) fn exec_add(&mut self, instr: Instruction) -> Result<(), Fault> {
        let result = add_with_carry(self.state.gpr(instr.ra()), self.state.gpr(instr.rb()), false);
        self.finish_arith(instr, result.value, result.overflow)
    }

    pub(crate) fn exec_addc(&mut self, instr: Instruction) -> Result<(), Fault> {
        let result = add_with_carry(self.state.gpr(instr.ra()), self.state.gpr(instr.rb()), false);
        self.state.xer.set_ca(result.carry);
        self.finish_arith(instr, result.value, result.overflow)
    }

    pub(crate) fn exec_adde(&mut self, instr: Instruction) -> Result<(), Fault> {
        let carry_in = self.state.xer.ca();
        let result = add_with_carry(
            self.state.gpr(instr.ra()),
            self.state.gpr(instr.rb()),
            carry_in,
        );
        self.state.xer.set_ca(result.carry);
        self.finish_arith(instr, result.value, result.overflow)
    }

    pub(crate) fn exec_addze(&mut self, instr: Instruction) -> Result<(), Fault> {
        let carry_in = self.state.xer.ca();
        let result = add_with_carry(self.state.gpr(instr.ra()), 0, carry_in);
        self.state.xer.set_ca(result.carry);
        self.finish_arith(instr, result.value, result.overflow)
    }

    /// `subf rT, rA, rB` computes rB - rA.
    pub(crate) fn exec_subf(&mut self, instr: Instruction) -> Result<(), Fault> {
        let result = add_with_carry(!self.state.gpr(instr.ra()), self.state.gpr(instr.rb()), true);
        self.finish_arith(instr, result.value, result.overflow)
    }

    pub(crate) fn exec_subfc(&mut self, instr: Instruction) -> Result<(), Fault> {
        let result = add_with_carry(!self.state.gpr(instr.ra()), self.state.gpr(instr.rb()), true);
        self.state.xer.set_ca(result.carry);
        self.finish_arith(instr, result.value, result.overflow)
    }

    pub(crate) fn exec_subfe(&mut self, instr: Instruction) -> Result<(), Fault> {
        let carry_in = self.state.xer.ca();
        let result = add_with_carry(
            !self.state.gpr(instr.ra()),
            self.state.gpr(instr.rb()),
            carry_in,
        );
        self.state.xer.set_ca(result.carry);
        self.finish_arith(instr, result.value, result.overflow)
    }

    pub(crate) fn exec_neg(&mut self, instr: Instruction) -> Result<(), Fault> {
        let result = add_with_carry(!self.state.gpr(instr.ra()), 0, true);
        self.finish_arith(instr, result.value, result.overflow)
    }

    pub(crate) fn exec_mullw(&mut self, instr: Instruction) -> Result<(), Fault> {
        let product = i64::from(self.state.gpr(instr.ra()) as i32)
            * i64::from(self.state.gpr(instr.rb()) as i32);
        let value = product as u32;
        let overflow = product != i64::from(value as i32);
        self.finish_arith(instr, value, overflow)
    }

    fn finish_arith(&mut self, instr: Instruction, value: u32, overflow: bool) -> Result<(), Fault> {
        self.state.set_gpr(instr.rt(), value);
        if instr.oe_bit() {
            self.state.xer.set_ov(overflow);
        }
        if instr.rc_bit() {
            self.set_cr0(value);
        }
        Ok(())
    }

    // --- Logical immediates (destination RA, source RS) ---

    pub(crate) fn exec_ori(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.state.gpr(instr.rs()) | instr.uimm16();
        self.state.set_gpr(instr.ra(), value);
        Ok(())
    }

    pub(crate) fn exec_oris(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.state.gpr(instr.rs()) | (instr.uimm16() << 16);
        self.state.set_gpr(instr.ra(), value);
        Ok(())
    }

    pub(crate) fn exec_xori(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.state.gpr(instr.rs()) ^ instr.uimm16();
        self.state.set_gpr(instr.ra(), value);
        Ok(())
    }

    pub(crate) fn exec_xoris(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.state.gpr(instr.rs()) ^ (instr.uimm16() << 16);
        self.state.set_gpr(instr.ra(), value);
        Ok(())
    }

    /// `andi.` and `andis.` update CR0 unconditionally.
    pub(crate) fn exec_andi_rc(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.state.gpr(instr.rs()) & instr.uimm16();
        self.state.set_gpr(instr.ra(), value);
        self.set_cr0(value);
        Ok(())
    }

    pub(crate) fn exec_andis_rc(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.state.gpr(instr.rs()) & (instr.uimm16() << 16);
        self.state.set_gpr(instr.ra(), value);
        self.set_cr0(value);
        Ok(())
    }

    // --- X-form logical ---

    pub(crate) fn exec_and(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.state.gpr(instr.rs()) & self.state.gpr(instr.rb());
        self.finish_logical(instr, value)
    }

    pub(crate) fn exec_or(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.state.gpr(instr.rs()) | self.state.gpr(instr.rb());
        self.finish_logical(instr, value)
    }

    pub(crate) fn exec_xor(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.state.gpr(instr.rs()) ^ self.state.gpr(instr.rb());
        self.finish_logical(instr, value)
    }

    pub(crate) fn exec_cntlzw(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.state.gpr(instr.rs()).leading_zeros();
        self.finish_logical(instr, value)
    }

    fn finish_logical(&mut self, instr: Instruction, value: u32) -> Result<(), Fault> {
        self.state.set_gpr(instr.ra(), value);
        if instr.rc_bit() {
            self.set_cr0(value);
        }
        Ok(())
    }

    // --- Shifts ---

    pub(crate) fn exec_slw(&mut self, instr: Instruction) -> Result<(), Fault> {
        let n = self.state.gpr(instr.rb()) & 0x3F;
        let rs_val = self.state.gpr(instr.rs());
        let value = if n < 32 { rs_val << n } else { 0 };
        self.finish_logical(instr, value)
    }

    pub(crate) fn exec_srw(&mut self, instr: Instruction) -> Result<(), Fault> {
        let n = self.state.gpr(instr.rb()) & 0x3F;
        let rs_val = self.state.gpr(instr.rs());
        let value = if n < 32 { rs_val >> n } else { 0 };
        self.finish_logical(instr, value)
    }

    pub(crate) fn exec_sraw(&mut self, instr: Instruction) -> Result<(), Fault> {
        let n = self.state.gpr(instr.rb()) & 0x3F;
        self.shift_right_algebraic(instr, n)
    }

    pub(crate) fn exec_srawi(&mut self, instr: Instruction) -> Result<(), Fault> {
        self.shift_right_algebraic(instr, instr.sh())
    }

    fn shift_right_algebraic(&mut self, instr: Instruction, n: u32) -> Result<(), Fault> {
        let rs_val = self.state.gpr(instr.rs());
        let signed = rs_val as i32;
        // Carry: a negative value lost at least one set bit to the shift.
        let (value, carry) = if n == 0 {
            (signed, false)
        } else if n < 32 {
            (signed >> n, signed < 0 && rs_val & ((1 << n) - 1) != 0)
        } else {
            (signed >> 31, signed < 0)
        };
        self.state.xer.set_ca(carry);
        self.finish_logical(instr, value as u32)
    }

    // --- Rotate-and-mask ---

    pub(crate) fn exec_rlwinm(&mut self, instr: Instruction) -> Result<(), Fault> {
        let rotated = self.state.gpr(instr.rs()).rotate_left(instr.sh());
        let value = rotated & mask_from_mb_me(instr.mb(), instr.me());
        self.finish_logical(instr, value)
    }

    pub(crate) fn exec_rlwnm(&mut self, instr: Instruction) -> Result<(), Fault> {
        let sh = self.state.gpr(instr.rb()) & 0x1F;
        let rotated = self.state.gpr(instr.rs()).rotate_left(sh);
        let value = rotated & mask_from_mb_me(instr.mb(), instr.me());
        self.finish_logical(instr, value)
    }

    /// `rlwimi` merges under the mask instead of replacing.
    pub(crate) fn exec_rlwimi(&mut self, instr: Instruction) -> Result<(), Fault> {
        let mask = mask_from_mb_me(instr.mb(), instr.me());
        let rotated = self.state.gpr(instr.rs()).rotate_left(instr.sh());
        let value = (rotated & mask) | (self.state.gpr(instr.ra()) & !mask);
        self.finish_logical(instr, value)
    }

    // --- Compares ---

    pub(crate) fn exec_cmpi(&mut self, instr: Instruction) -> Result<(), Fault> {
        let ordering = compare_nibble_signed(self.state.gpr(instr.ra()) as i32, instr.simm16());
        self.set_compare_field(instr.bf(), ordering);
        Ok(())
    }

    pub(crate) fn exec_cmpli(&mut self, instr: Instruction) -> Result<(), Fault> {
        let ordering = compare_nibble_unsigned(self.state.gpr(instr.ra()), instr.uimm16());
        self.set_compare_field(instr.bf(), ordering);
        Ok(())
    }

    pub(crate) fn exec_cmp(&mut self, instr: Instruction) -> Result<(), Fault> {
        let ordering = compare_nibble_signed(
            self.state.gpr(instr.ra()) as i32,
            self.state.gpr(instr.rb()) as i32,
        );
        self.set_compare_field(instr.bf(), ordering);
        Ok(())
    }

    pub(crate) fn exec_cmpl(&mut self, instr: Instruction) -> Result<(), Fault> {
        let ordering =
            compare_nibble_unsigned(self.state.gpr(instr.ra()), self.state.gpr(instr.rb()));
        self.set_compare_field(instr.bf(), ordering);
        Ok(())
    }

    // --- SPR moves: only LR and CTR exist in the subset ---

    pub(crate) fn exec_mfspr(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = match instr.spr() {
            spr::LR => self.state.lr(),
            spr::CTR => self.state.ctr(),
            _ => return Err(self.unimplemented(instr)),
        };
        self.state.set_gpr(instr.rt(), value);
        Ok(())
    }

    pub(crate) fn exec_mtspr(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.state.gpr(instr.rs());
        match instr.spr() {
            spr::LR => self.state.set_lr(value),
            spr::CTR => self.state.set_ctr(value),
            _ => return Err(self.unimplemented(instr)),
        }
        Ok(())
    }
}
