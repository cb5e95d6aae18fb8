//! Branch and condition-register executors.

use ppc_asm::{Instruction, INSTRUCTION_BYTES};

use crate::fault::Fault;
use crate::Simulator;

/// BO selector bits, from the most significant bit of the 5-bit field down.
const BO_IGNORE_CONDITION: u32 = 0b10000;
const BO_BRANCH_IF_TRUE: u32 = 0b01000;
const BO_SKIP_CTR_DECREMENT: u32 = 0b00100;
const BO_BRANCH_IF_CTR_ZERO: u32 = 0b00010;

impl Simulator {
    /// I-form branch: relative or absolute, with optional link.
    pub(crate) fn exec_b(&mut self, instr: Instruction) -> Result<(), Fault> {
        let pc = self.state.pc();
        if instr.lk_bit() {
            self.state.set_lr(pc.wrapping_add(INSTRUCTION_BYTES));
        }
        let offset = instr.branch_offset() as u32;
        let target = if instr.aa_bit() {
            offset
        } else {
            pc.wrapping_add(offset)
        };
        self.set_pc(target);
        Ok(())
    }

    /// B-form conditional branch with the full BO selector, including the
    /// CTR-decrementing forms.
    pub(crate) fn exec_bc(&mut self, instr: Instruction) -> Result<(), Fault> {
        let pc = self.state.pc();
        // LK captures the return address whether or not the branch is taken.
        if instr.lk_bit() {
            self.state.set_lr(pc.wrapping_add(INSTRUCTION_BYTES));
        }
        if self.branch_taken(instr.bo(), instr.bi()) {
            let offset = instr.bc_offset() as u32;
            let target = if instr.aa_bit() {
                offset
            } else {
                pc.wrapping_add(offset)
            };
            self.set_pc(target);
        }
        Ok(())
    }

    /// `bclr`: conditional branch to LR. The target is read before LK
    /// updates LR, so `blrl` works.
    pub(crate) fn exec_bclr(&mut self, instr: Instruction) -> Result<(), Fault> {
        let pc = self.state.pc();
        let target = self.state.lr() & !3;
        if instr.lk_bit() {
            self.state.set_lr(pc.wrapping_add(INSTRUCTION_BYTES));
        }
        if self.branch_taken(instr.bo(), instr.bi()) {
            self.set_pc(target);
        }
        Ok(())
    }

    /// `bcctr`: conditional branch to CTR. The CTR-decrementing BO forms
    /// are invalid for this instruction.
    pub(crate) fn exec_bcctr(&mut self, instr: Instruction) -> Result<(), Fault> {
        if instr.bo() & BO_SKIP_CTR_DECREMENT == 0 {
            return Err(self.unimplemented(instr));
        }
        let pc = self.state.pc();
        let target = self.state.ctr() & !3;
        if instr.lk_bit() {
            self.state.set_lr(pc.wrapping_add(INSTRUCTION_BYTES));
        }
        if self.branch_taken(instr.bo(), instr.bi()) {
            self.set_pc(target);
        }
        Ok(())
    }

    /// Evaluates the BO/BI selector, decrementing CTR when asked to.
    fn branch_taken(&mut self, bo: u32, bi: u32) -> bool {
        let ctr_ok = if bo & BO_SKIP_CTR_DECREMENT != 0 {
            true
        } else {
            let ctr = self.state.ctr().wrapping_sub(1);
            self.state.set_ctr(ctr);
            if bo & BO_BRANCH_IF_CTR_ZERO != 0 {
                ctr == 0
            } else {
                ctr != 0
            }
        };
        let cond_ok = bo & BO_IGNORE_CONDITION != 0
            || self.state.cr.bit(bi) == (bo & BO_BRANCH_IF_TRUE != 0);
        ctr_ok && cond_ok
    }

    /// `crxor crbT, crbA, crbB`.
    pub(crate) fn exec_crxor(&mut self, instr: Instruction) -> Result<(), Fault> {
        let bt = instr.bits(25, 21);
        let ba = instr.bits(20, 16);
        let bb = instr.bits(15, 11);
        let value = self.state.cr.bit(ba) ^ self.state.cr.bit(bb);
        self.state.cr.set_bit(bt, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::registers::CR_EQ;
    use crate::Simulator;
    use ppc_asm::{encode, Instruction};

    fn run_at(sim: &mut Simulator, pc: u32, word: u32) {
        sim.set_pc(pc);
        sim.pc_modified = false;
        sim.dispatch(Instruction::new(word)).expect("executes");
    }

    #[test]
    fn branch_and_link_captures_the_return_address() {
        let mut sim = Simulator::default();
        run_at(&mut sim, 0x1000, encode::bl(0x200));
        assert_eq!(sim.get_pc(), 0x1200);
        assert_eq!(sim.lr(), 0x1004);
    }

    #[test]
    fn absolute_branch_ignores_the_pc() {
        let mut sim = Simulator::default();
        run_at(&mut sim, 0x1000, encode::ba(0x2000, false));
        assert_eq!(sim.get_pc(), 0x2000);
    }

    #[test]
    fn backward_branches_sign_extend() {
        let mut sim = Simulator::default();
        run_at(&mut sim, 0x1000, encode::b(-0x100, false));
        assert_eq!(sim.get_pc(), 0xF00);
    }

    #[test]
    fn conditional_branch_on_true_and_false() {
        let mut sim = Simulator::default();
        sim.set_register(9, 0);
        run_at(&mut sim, 0x1000, encode::cmpwi(9, 0));

        // beq (BO=12: branch if CR bit true), CR0 EQ is bit 2.
        run_at(&mut sim, 0x1004, encode::bc(12, 2, 0x40, false, false));
        assert_eq!(sim.get_pc(), 0x1044);

        // bne (BO=4: branch if false) falls through.
        run_at(&mut sim, 0x1044, encode::bc(4, 2, 0x40, false, false));
        assert_eq!(sim.get_pc(), 0x1044);
        assert!(!sim.pc_modified);
    }

    #[test]
    fn bc_link_is_captured_even_when_not_taken() {
        let mut sim = Simulator::default();
        sim.set_register(9, 1);
        run_at(&mut sim, 0x1000, encode::cmpwi(9, 0)); // CR0 = GT
        run_at(&mut sim, 0x1004, encode::bc(12, 2, 0x40, false, true));
        assert_eq!(sim.lr(), 0x1008);
        assert!(!sim.pc_modified);
    }

    #[test]
    fn bdnz_decrements_ctr_and_loops_until_zero() {
        let mut sim = Simulator::default();
        sim.set_ctr(3);
        // bdnz: BO=16, decrement, branch while CTR != 0.
        run_at(&mut sim, 0x1000, encode::bc(16, 0, -4, false, false));
        assert_eq!(sim.ctr(), 2);
        assert_eq!(sim.get_pc(), 0xFFC);

        sim.set_ctr(1);
        run_at(&mut sim, 0x1000, encode::bc(16, 0, -4, false, false));
        assert_eq!(sim.ctr(), 0);
        assert!(!sim.pc_modified);
    }

    #[test]
    fn bdz_branches_when_ctr_reaches_zero() {
        let mut sim = Simulator::default();
        sim.set_ctr(1);
        // bdz: BO=18.
        run_at(&mut sim, 0x1000, encode::bc(18, 0, 0x10, false, false));
        assert_eq!(sim.ctr(), 0);
        assert_eq!(sim.get_pc(), 0x1010);
    }

    #[test]
    fn blr_returns_through_the_link_register() {
        let mut sim = Simulator::default();
        sim.set_lr(0x4000);
        run_at(&mut sim, 0x1000, encode::blr());
        assert_eq!(sim.get_pc(), 0x4000);
        assert_eq!(sim.lr(), 0x4000);
    }

    #[test]
    fn blrl_reads_the_target_before_updating_lr() {
        let mut sim = Simulator::default();
        sim.set_lr(0x4000);
        run_at(&mut sim, 0x1000, encode::bclr(20, 0, true));
        assert_eq!(sim.get_pc(), 0x4000);
        assert_eq!(sim.lr(), 0x1004);
    }

    #[test]
    fn bctr_branches_through_ctr_and_rejects_decrement_forms() {
        let mut sim = Simulator::default();
        sim.set_ctr(0x3000);
        run_at(&mut sim, 0x1000, encode::bctr());
        assert_eq!(sim.get_pc(), 0x3000);

        sim.set_pc(0x1000);
        let decrementing = encode::bcctr(16, 0, false);
        assert!(sim.dispatch(Instruction::new(decrementing)).is_err());
    }

    #[test]
    fn conditional_bclr_falls_through_on_false() {
        let mut sim = Simulator::default();
        sim.set_register(9, 5);
        run_at(&mut sim, 0x1000, encode::cmpwi(9, 0)); // CR0 = GT
        sim.set_lr(0x4000);
        // beqlr: BO=12, BI=2.
        run_at(&mut sim, 0x1004, encode::bclr(12, 2, false));
        assert!(!sim.pc_modified);
    }

    #[test]
    fn crxor_combines_condition_bits() {
        let mut sim = Simulator::default();
        sim.set_register(9, 0);
        run_at(&mut sim, 0x1000, encode::cmpwi(9, 0));
        assert_eq!((sim.cr() >> 28) & 0xF, CR_EQ);

        // crxor 0, 2, 2 clears bit 0.
        run_at(&mut sim, 0x1004, encode::crxor(0, 2, 2));
        assert!(sim.cr() & 0x8000_0000 == 0);

        // crxor 0, 2, 3 copies EQ ^ SO into LT.
        run_at(&mut sim, 0x1008, encode::crxor(0, 2, 3));
        assert!(sim.cr() & 0x8000_0000 != 0);
    }
}
