//! Load and store executors.
//!
//! Effective address is `(rA == 0 ? 0 : rA) + sext(d)`. Update forms write
//! the effective address back to rA; their `rA == 0` encodings (and load
//! updates with `rA == rT`) are invalid forms and fault.

use ppc_asm::Instruction;

use crate::fault::Fault;
use crate::Simulator;

impl Simulator {
    /// EA for non-update forms: r0 as a base reads as literal zero.
    fn effective_address(&self, instr: Instruction) -> u32 {
        let base = if instr.ra() == 0 {
            0
        } else {
            self.state.gpr(instr.ra())
        };
        base.wrapping_add(instr.simm16() as u32)
    }

    /// EA for update forms, which always read and write rA.
    fn update_address(&self, instr: Instruction, is_load: bool) -> Result<u32, Fault> {
        if instr.ra() == 0 || (is_load && instr.ra() == instr.rt()) {
            return Err(self.unimplemented(instr));
        }
        Ok(self
            .state
            .gpr(instr.ra())
            .wrapping_add(instr.simm16() as u32))
    }

    // --- Word ---

    pub(crate) fn exec_lwz(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.memory.read_u32(self.effective_address(instr))?;
        self.state.set_gpr(instr.rt(), value);
        Ok(())
    }

    pub(crate) fn exec_lwzu(&mut self, instr: Instruction) -> Result<(), Fault> {
        let ea = self.update_address(instr, true)?;
        let value = self.memory.read_u32(ea)?;
        self.state.set_gpr(instr.rt(), value);
        self.state.set_gpr(instr.ra(), ea);
        Ok(())
    }

    pub(crate) fn exec_stw(&mut self, instr: Instruction) -> Result<(), Fault> {
        self.memory
            .write_u32(self.effective_address(instr), self.state.gpr(instr.rs()))
    }

    pub(crate) fn exec_stwu(&mut self, instr: Instruction) -> Result<(), Fault> {
        let ea = self.update_address(instr, false)?;
        self.memory.write_u32(ea, self.state.gpr(instr.rs()))?;
        self.state.set_gpr(instr.ra(), ea);
        Ok(())
    }

    // --- Byte ---

    pub(crate) fn exec_lbz(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.memory.read_u8(self.effective_address(instr))?;
        self.state.set_gpr(instr.rt(), u32::from(value));
        Ok(())
    }

    pub(crate) fn exec_lbzu(&mut self, instr: Instruction) -> Result<(), Fault> {
        let ea = self.update_address(instr, true)?;
        let value = self.memory.read_u8(ea)?;
        self.state.set_gpr(instr.rt(), u32::from(value));
        self.state.set_gpr(instr.ra(), ea);
        Ok(())
    }

    pub(crate) fn exec_stb(&mut self, instr: Instruction) -> Result<(), Fault> {
        self.memory.write_u8(
            self.effective_address(instr),
            self.state.gpr(instr.rs()) as u8,
        )
    }

    pub(crate) fn exec_stbu(&mut self, instr: Instruction) -> Result<(), Fault> {
        let ea = self.update_address(instr, false)?;
        self.memory.write_u8(ea, self.state.gpr(instr.rs()) as u8)?;
        self.state.set_gpr(instr.ra(), ea);
        Ok(())
    }

    // --- Halfword ---

    pub(crate) fn exec_lhz(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.memory.read_u16(self.effective_address(instr))?;
        self.state.set_gpr(instr.rt(), u32::from(value));
        Ok(())
    }

    pub(crate) fn exec_lhzu(&mut self, instr: Instruction) -> Result<(), Fault> {
        let ea = self.update_address(instr, true)?;
        let value = self.memory.read_u16(ea)?;
        self.state.set_gpr(instr.rt(), u32::from(value));
        self.state.set_gpr(instr.ra(), ea);
        Ok(())
    }

    /// `lha` sign-extends.
    pub(crate) fn exec_lha(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.memory.read_i16(self.effective_address(instr))?;
        self.state.set_gpr(instr.rt(), value as i32 as u32);
        Ok(())
    }

    pub(crate) fn exec_lhau(&mut self, instr: Instruction) -> Result<(), Fault> {
        let ea = self.update_address(instr, true)?;
        let value = self.memory.read_i16(ea)?;
        self.state.set_gpr(instr.rt(), value as i32 as u32);
        self.state.set_gpr(instr.ra(), ea);
        Ok(())
    }

    pub(crate) fn exec_sth(&mut self, instr: Instruction) -> Result<(), Fault> {
        self.memory.write_u16(
            self.effective_address(instr),
            self.state.gpr(instr.rs()) as u16,
        )
    }

    pub(crate) fn exec_sthu(&mut self, instr: Instruction) -> Result<(), Fault> {
        let ea = self.update_address(instr, false)?;
        self.memory
            .write_u16(ea, self.state.gpr(instr.rs()) as u16)?;
        self.state.set_gpr(instr.ra(), ea);
        Ok(())
    }

    // --- Floating point ---

    pub(crate) fn exec_lfs(&mut self, instr: Instruction) -> Result<(), Fault> {
        let bits = self.memory.read_u32(self.effective_address(instr))?;
        self.state
            .set_fpr_double(instr.rt(), f64::from(f32::from_bits(bits)));
        Ok(())
    }

    pub(crate) fn exec_lfsu(&mut self, instr: Instruction) -> Result<(), Fault> {
        let ea = self.update_address(instr, false)?;
        let bits = self.memory.read_u32(ea)?;
        self.state
            .set_fpr_double(instr.rt(), f64::from(f32::from_bits(bits)));
        self.state.set_gpr(instr.ra(), ea);
        Ok(())
    }

    /// `lfd` moves raw bits so NaN payloads survive.
    pub(crate) fn exec_lfd(&mut self, instr: Instruction) -> Result<(), Fault> {
        let bits = self.memory.read_u64(self.effective_address(instr))?;
        self.state.set_fpr_bits(instr.rt(), bits);
        Ok(())
    }

    pub(crate) fn exec_lfdu(&mut self, instr: Instruction) -> Result<(), Fault> {
        let ea = self.update_address(instr, false)?;
        let bits = self.memory.read_u64(ea)?;
        self.state.set_fpr_bits(instr.rt(), bits);
        self.state.set_gpr(instr.ra(), ea);
        Ok(())
    }

    pub(crate) fn exec_stfs(&mut self, instr: Instruction) -> Result<(), Fault> {
        let value = self.state.fpr_double(instr.rs()) as f32;
        self.memory
            .write_u32(self.effective_address(instr), value.to_bits())
    }

    pub(crate) fn exec_stfsu(&mut self, instr: Instruction) -> Result<(), Fault> {
        let ea = self.update_address(instr, false)?;
        let value = self.state.fpr_double(instr.rs()) as f32;
        self.memory.write_u32(ea, value.to_bits())?;
        self.state.set_gpr(instr.ra(), ea);
        Ok(())
    }

    pub(crate) fn exec_stfd(&mut self, instr: Instruction) -> Result<(), Fault> {
        self.memory.write_u64(
            self.effective_address(instr),
            self.state.fpr_bits(instr.rs()),
        )
    }

    pub(crate) fn exec_stfdu(&mut self, instr: Instruction) -> Result<(), Fault> {
        let ea = self.update_address(instr, false)?;
        self.memory.write_u64(ea, self.state.fpr_bits(instr.rs()))?;
        self.state.set_gpr(instr.ra(), ea);
        Ok(())
    }
}
