//! The reserved `TWI` executor: host-call bridge, breakpoints, watched
//! stops.

use ppc_asm::opcodes::debug::{
    BREAKPOINT_INSTRUCTION, CALL_RT_REDIRECTED, STOP_CODE, STOP_CODE_MASK,
};
use ppc_asm::{Instruction, INSTRUCTION_BYTES};

use crate::diag;
use crate::fault::Fault;
use crate::redirection::HostFunction;
use crate::registers::SP;
use crate::stops::StopTable;
use crate::trace::{BreakReason, TraceEvent};
use crate::Simulator;

impl Simulator {
    pub(crate) fn software_interrupt(&mut self, instr: Instruction) -> Result<(), Fault> {
        if instr.word() == BREAKPOINT_INSTRUCTION {
            self.enter_debugger(&BreakReason::Breakpoint);
            return Ok(());
        }
        let svc = instr.svc_value();
        if svc == CALL_RT_REDIRECTED {
            return self.bridge_call();
        }
        if svc >= STOP_CODE {
            return self.handle_stop(svc & STOP_CODE_MASK);
        }
        Err(self.unimplemented(instr))
    }

    /// Dispatches into the host function whose trap word is at PC, writes
    /// the result to the ISA return registers, and resumes at the saved
    /// link register as if the callee had executed `blr`.
    fn bridge_call(&mut self) -> Result<(), Fault> {
        let trap_address = self.state.pc();
        let redirection = *self
            .redirections
            .from_trap_address(trap_address)
            .ok_or(Fault::UnknownRedirection { addr: trap_address })?;

        let sp = self.state.gpr(SP);
        if sp & (self.config.stack_alignment - 1) != 0 {
            diag::print_diag(&format!("host call with unaligned stack {sp:#010x}"));
            if self.config.strict_stack_alignment {
                return Err(Fault::UnalignedStack { sp });
            }
        }

        let host_fn = redirection.host_function();
        if self.config.trace_execution {
            self.trace(&TraceEvent::HostCall {
                trap_address,
                call_type: host_fn.call_type(),
            });
        }

        let saved_lr = self.state.lr();
        match host_fn {
            HostFunction::Builtin(f) => {
                let result = f(
                    self.state.gpr(3),
                    self.state.gpr(4),
                    self.state.gpr(5),
                    self.state.gpr(6),
                    self.memory.read_u32(sp)?,
                    self.memory.read_u32(sp.wrapping_add(4))?,
                );
                self.state.set_gpr(3, result as u32);
                self.state.set_gpr(4, (result >> 32) as u32);
            }
            HostFunction::FpFp(f) => {
                let result = f(self.state.fpr_double(1), self.state.fpr_double(2));
                self.state.set_fpr_double(1, result);
            }
            HostFunction::Compare(f) => {
                let result = f(self.state.fpr_double(1), self.state.fpr_double(2)) as u64;
                self.state.set_gpr(3, result as u32);
                self.state.set_gpr(4, (result >> 32) as u32);
            }
            HostFunction::Fp(f) => {
                let result = f(self.state.fpr_double(1));
                self.state.set_fpr_double(1, result);
            }
            HostFunction::FpInt(f) => {
                let result = f(self.state.fpr_double(1), self.state.gpr(3) as i32);
                self.state.set_fpr_double(1, result);
            }
            HostFunction::DirectApi(f) => {
                let result = f(self.state.gpr(3));
                self.state.set_gpr(3, result);
            }
            HostFunction::DirectGetter(f) => {
                let result = f(self.state.gpr(3), self.state.gpr(4));
                self.state.set_gpr(3, result);
            }
        }

        self.set_pc(saved_lr);
        Ok(())
    }

    /// Watched-stop execution: capture the description, count the hit, skip
    /// the stop word and its message word, and enter the debug handler when
    /// the stop is enabled.
    fn handle_stop(&mut self, code: u32) -> Result<(), Fault> {
        let pc = self.state.pc();
        let message_address = self.memory.read_u32(pc.wrapping_add(INSTRUCTION_BYTES))?;
        let message = self.memory.read_cstr(message_address).ok();

        let watched = StopTable::is_watched(code);
        if watched {
            if let Some(text) = &message {
                self.stops.capture_description(code, text);
            }
            self.stops.increase_counter(code);
        }
        let enabled = self.stops.is_enabled(code);
        if self.config.trace_execution {
            self.trace(&TraceEvent::StopHit { code, enabled });
        }

        self.set_pc(pc.wrapping_add(2 * INSTRUCTION_BYTES));
        if enabled {
            match &message {
                Some(text) => diag::print_diag(&format!("hit stop {code}: {text}")),
                None => diag::print_diag(&format!("hit stop {code}")),
            }
            self.enter_debugger(&BreakReason::WatchedStop { code, message });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::trace::{BreakReason, DebugHandler};
    use crate::Simulator;
    use ppc_asm::opcodes::debug;
    use ppc_asm::{Instruction, INSTRUCTION_BYTES};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder(Rc<RefCell<Vec<BreakReason>>>);

    impl DebugHandler for Recorder {
        fn on_break(&mut self, _sim: &mut Simulator, reason: &BreakReason) {
            self.0.borrow_mut().push(reason.clone());
        }
    }

    fn write_stop(sim: &mut Simulator, addr: u32, code: u32, message: &str) {
        let message_addr = 0x3000;
        for (i, byte) in message.bytes().chain(std::iter::once(0)).enumerate() {
            sim.memory_mut()
                .write_u8(message_addr + i as u32, byte)
                .unwrap();
        }
        sim.memory_mut()
            .write_u32(addr, debug::stop_instruction(code))
            .unwrap();
        sim.memory_mut()
            .write_u32(addr + INSTRUCTION_BYTES, message_addr)
            .unwrap();
    }

    #[test]
    fn enabled_stop_counts_captures_and_breaks() {
        let mut sim = Simulator::default();
        let breaks = Rc::new(RefCell::new(Vec::new()));
        sim.set_debug_handler(Box::new(Recorder(Rc::clone(&breaks))));

        write_stop(&mut sim, 0x1000, 17, "spilled register");
        sim.set_pc(0x1000);
        sim.pc_modified = false;
        let word = sim.memory().read_u32(0x1000).unwrap();
        sim.dispatch(Instruction::new(word)).unwrap();

        assert_eq!(sim.get_pc(), 0x1008, "skips the stop and message words");
        let info = sim.stop_info(17).unwrap();
        assert_eq!(info.count, 1);
        assert_eq!(info.description.as_deref(), Some("spilled register"));
        assert_eq!(
            breaks.borrow().as_slice(),
            &[BreakReason::WatchedStop {
                code: 17,
                message: Some("spilled register".to_owned()),
            }]
        );
    }

    #[test]
    fn disabled_stop_still_counts_but_does_not_break() {
        let mut sim = Simulator::default();
        let breaks = Rc::new(RefCell::new(Vec::new()));
        sim.set_debug_handler(Box::new(Recorder(Rc::clone(&breaks))));
        sim.disable_stop(5);

        write_stop(&mut sim, 0x1000, 5, "quiet");
        sim.set_pc(0x1000);
        sim.pc_modified = false;
        let word = sim.memory().read_u32(0x1000).unwrap();
        sim.dispatch(Instruction::new(word)).unwrap();

        assert_eq!(sim.get_pc(), 0x1008);
        assert!(breaks.borrow().is_empty());
        let info = sim.stop_info(5).unwrap();
        assert_eq!(info.count, 1);
        assert!(!info.enabled);
    }

    #[test]
    fn breakpoint_word_enters_the_debugger() {
        let mut sim = Simulator::default();
        let breaks = Rc::new(RefCell::new(Vec::new()));
        sim.set_debug_handler(Box::new(Recorder(Rc::clone(&breaks))));

        sim.set_pc(0x1000);
        sim.pc_modified = false;
        sim.dispatch(Instruction::new(debug::BREAKPOINT_INSTRUCTION))
            .unwrap();
        assert_eq!(breaks.borrow().as_slice(), &[BreakReason::Breakpoint]);
        assert!(!sim.pc_modified, "the loop advances past the trap word");
    }

    #[test]
    fn other_twi_payloads_are_unimplemented() {
        let mut sim = Simulator::default();
        let word = (3 << 26) | 0x7; // twi with a meaningless payload
        assert!(sim.dispatch(Instruction::new(word)).is_err());
    }
}
