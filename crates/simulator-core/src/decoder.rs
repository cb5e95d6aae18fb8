//! Instruction routing.
//!
//! Pure classification: primary opcode in bits 31..26, with EXT1/EXT2/EXT4
//! sub-dispatched on their extended opcode fields. Each opcode routes to its
//! own executor; there are no shared fall-through cases. Anything outside
//! the implemented subset faults as unimplemented.

use ppc_asm::opcodes::{ext1, ext2, ext4, primary as op};
use ppc_asm::Instruction;

use crate::fault::Fault;
use crate::Simulator;

impl Simulator {
    pub(crate) fn dispatch(&mut self, instr: Instruction) -> Result<(), Fault> {
        match instr.opcode() {
            op::TWI => self.software_interrupt(instr),
            op::MULLI => self.exec_mulli(instr),
            op::SUBFIC => self.exec_subfic(instr),
            op::CMPLI => self.exec_cmpli(instr),
            op::CMPI => self.exec_cmpi(instr),
            op::ADDIC => self.exec_addic(instr, false),
            op::ADDIC_RC => self.exec_addic(instr, true),
            op::ADDI => self.exec_addi(instr),
            op::ADDIS => self.exec_addis(instr),
            op::BC => self.exec_bc(instr),
            op::B => self.exec_b(instr),
            op::EXT1 => self.dispatch_ext1(instr),
            op::RLWIMI => self.exec_rlwimi(instr),
            op::RLWINM => self.exec_rlwinm(instr),
            op::RLWNM => self.exec_rlwnm(instr),
            op::ORI => self.exec_ori(instr),
            op::ORIS => self.exec_oris(instr),
            op::XORI => self.exec_xori(instr),
            op::XORIS => self.exec_xoris(instr),
            op::ANDI_RC => self.exec_andi_rc(instr),
            op::ANDIS_RC => self.exec_andis_rc(instr),
            op::EXT2 => self.dispatch_ext2(instr),
            op::LWZ => self.exec_lwz(instr),
            op::LWZU => self.exec_lwzu(instr),
            op::LBZ => self.exec_lbz(instr),
            op::LBZU => self.exec_lbzu(instr),
            op::STW => self.exec_stw(instr),
            op::STWU => self.exec_stwu(instr),
            op::STB => self.exec_stb(instr),
            op::STBU => self.exec_stbu(instr),
            op::LHZ => self.exec_lhz(instr),
            op::LHZU => self.exec_lhzu(instr),
            op::LHA => self.exec_lha(instr),
            op::LHAU => self.exec_lhau(instr),
            op::STH => self.exec_sth(instr),
            op::STHU => self.exec_sthu(instr),
            op::LFS => self.exec_lfs(instr),
            op::LFSU => self.exec_lfsu(instr),
            op::LFD => self.exec_lfd(instr),
            op::LFDU => self.exec_lfdu(instr),
            op::STFS => self.exec_stfs(instr),
            op::STFSU => self.exec_stfsu(instr),
            op::STFD => self.exec_stfd(instr),
            op::STFDU => self.exec_stfdu(instr),
            op::EXT4 => self.dispatch_ext4(instr),
            _ => Err(self.unimplemented(instr)),
        }
    }

    fn dispatch_ext1(&mut self, instr: Instruction) -> Result<(), Fault> {
        match instr.xo_10() {
            ext1::BCLR => self.exec_bclr(instr),
            ext1::BCCTR => self.exec_bcctr(instr),
            ext1::CRXOR => self.exec_crxor(instr),
            // MCRF, the remaining CR ops, RFI and ISYNC are outside the
            // emitted subset.
            _ => Err(self.unimplemented(instr)),
        }
    }

    fn dispatch_ext2(&mut self, instr: Instruction) -> Result<(), Fault> {
        // 10-bit X-form opcodes first, then the 9-bit XO-form arithmetic
        // whose bit 10 is the overflow-enable flag.
        match instr.xo_10() {
            ext2::CMP => self.exec_cmp(instr),
            ext2::CMPL => self.exec_cmpl(instr),
            ext2::SLW => self.exec_slw(instr),
            ext2::SRW => self.exec_srw(instr),
            ext2::SRAW => self.exec_sraw(instr),
            ext2::SRAWI => self.exec_srawi(instr),
            ext2::CNTLZW => self.exec_cntlzw(instr),
            ext2::AND => self.exec_and(instr),
            ext2::OR => self.exec_or(instr),
            ext2::XOR => self.exec_xor(instr),
            ext2::MFSPR => self.exec_mfspr(instr),
            ext2::MTSPR => self.exec_mtspr(instr),
            _ => match instr.xo_9() {
                ext2::SUBFC => self.exec_subfc(instr),
                ext2::ADDC => self.exec_addc(instr),
                ext2::SUBF => self.exec_subf(instr),
                ext2::NEG => self.exec_neg(instr),
                ext2::SUBFE => self.exec_subfe(instr),
                ext2::ADDE => self.exec_adde(instr),
                ext2::ADDZE => self.exec_addze(instr),
                ext2::MULLW => self.exec_mullw(instr),
                ext2::ADD => self.exec_add(instr),
                _ => Err(self.unimplemented(instr)),
            },
        }
    }

    fn dispatch_ext4(&mut self, instr: Instruction) -> Result<(), Fault> {
        match instr.xo_5() {
            ext4::FDIV => self.exec_fdiv(instr),
            ext4::FSUB => self.exec_fsub(instr),
            ext4::FADD => self.exec_fadd(instr),
            ext4::FMUL => self.exec_fmul(instr),
            _ if instr.xo_10() == ext4::FCMPU => self.exec_fcmpu(instr),
            _ => Err(self.unimplemented(instr)),
        }
    }
}
