//! The simulator instance and its fetch-decode-execute loop.

use std::cell::RefCell;

use ppc_asm::opcodes::debug::BREAKPOINT_INSTRUCTION;
use ppc_asm::{Instruction, INSTRUCTION_BYTES};

use crate::config::SimConfig;
use crate::diag;
use crate::fault::Fault;
use crate::icache::InstructionCache;
use crate::memory::SimMemory;
use crate::redirection::{HostFunction, RedirectionTable};
use crate::registers::{ArchState, FIRST_CALLEE_SAVED, GENERAL_REGISTER_COUNT, R3, SP};
use crate::stops::{StopInfo, StopTable};
use crate::trace::{BreakReason, DebugHandler, TraceEvent, TraceSink};

/// End-of-simulation sentinel. `call` parks this in LR; the run loop exits
/// when PC reaches it. Aligned so `bclr`'s target masking preserves it, and
/// far beyond any configurable memory size.
pub const END_SIM_PC: u32 = 0xFFFF_FFF8;

/// Known-bad address seeded into PC and LR at construction so executing
/// unprepared state terminates instead of running garbage.
pub const BAD_LR: u32 = 0xFFFF_FFF0;

/// Base pattern of the canary written over callee-saved registers by `call`.
const CALLEE_SAVED_CANARY: u32 = 0xBADC_A11E;

/// One simulated PowerPC CPU: architectural state, flat memory, instruction
/// cache, redirection table and stop bookkeeping.
pub struct Simulator {
    pub(crate) config: SimConfig,
    pub(crate) state: ArchState,
    pub(crate) memory: SimMemory,
    pub(crate) icache: InstructionCache,
    pub(crate) redirections: RedirectionTable,
    pub(crate) stops: StopTable,
    pub(crate) pc_modified: bool,
    icount: u64,
    break_pc: Option<u32>,
    break_instr: u32,
    last_debugger_input: Option<String>,
    trace_sink: Option<Box<dyn TraceSink>>,
    debug_handler: Option<Box<dyn DebugHandler>>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl Simulator {
    /// Builds a simulator with zeroed registers, PC and LR parked on
    /// [`BAD_LR`], and the stack pointer at the top of the stack region.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let memory = SimMemory::new(config.memory_bytes, config.stack_bytes);
        let mut state = ArchState::new(BAD_LR);
        state.set_gpr(SP, memory.initial_sp());
        Self {
            config,
            state,
            memory,
            icache: InstructionCache::new(),
            redirections: RedirectionTable::new(),
            stops: StopTable::new(),
            pc_modified: false,
            icount: 0,
            break_pc: None,
            break_instr: 0,
            last_debugger_input: None,
            trace_sink: None,
            debug_handler: None,
        }
    }

    /// The configuration this simulator was built with.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    // --- State probes used by trampolines, the debugger and tests ---

    /// Reads a general-purpose register.
    #[must_use]
    pub fn get_register(&self, reg: usize) -> u32 {
        assert!(reg < GENERAL_REGISTER_COUNT);
        self.state.gpr(reg)
    }

    /// Writes a general-purpose register.
    pub fn set_register(&mut self, reg: usize, value: u32) {
        assert!(reg < GENERAL_REGISTER_COUNT);
        self.state.set_gpr(reg, value);
    }

    /// Reads a floating-point register as a double.
    #[must_use]
    pub fn get_double_from_d_register(&self, reg: usize) -> f64 {
        self.state.fpr_double(reg)
    }

    /// Writes a floating-point register from a double.
    pub fn set_d_register_from_double(&mut self, reg: usize, value: f64) {
        self.state.set_fpr_double(reg, value);
    }

    /// Reads a floating-point register as its raw bit pattern.
    #[must_use]
    pub fn get_d_register_bits(&self, reg: usize) -> u64 {
        self.state.fpr_bits(reg)
    }

    /// Writes a floating-point register from a raw bit pattern.
    pub fn set_d_register_bits(&mut self, reg: usize, bits: u64) {
        self.state.set_fpr_bits(reg, bits);
    }

    /// The program counter.
    #[must_use]
    pub fn get_pc(&self) -> u32 {
        self.state.pc()
    }

    /// Writes the program counter and marks it modified for the current
    /// instruction, suppressing the loop's auto-advance.
    pub fn set_pc(&mut self, value: u32) {
        self.pc_modified = true;
        self.state.set_pc(value);
    }

    /// The link register.
    #[must_use]
    pub fn lr(&self) -> u32 {
        self.state.lr()
    }

    /// Writes the link register.
    pub fn set_lr(&mut self, value: u32) {
        self.state.set_lr(value);
    }

    /// The count register.
    #[must_use]
    pub fn ctr(&self) -> u32 {
        self.state.ctr()
    }

    /// Writes the count register.
    pub fn set_ctr(&mut self, value: u32) {
        self.state.set_ctr(value);
    }

    /// The condition register.
    #[must_use]
    pub fn cr(&self) -> u32 {
        self.state.cr.bits()
    }

    /// The fixed-point exception register.
    #[must_use]
    pub fn xer(&self) -> crate::registers::Xer {
        self.state.xer
    }

    /// The floating-point status register.
    #[must_use]
    pub fn fpscr(&self) -> crate::registers::Fpscr {
        self.state.fpscr
    }

    /// Instructions retired since construction.
    #[must_use]
    pub fn icount(&self) -> u64 {
        self.icount
    }

    /// The simulated memory.
    #[must_use]
    pub fn memory(&self) -> &SimMemory {
        &self.memory
    }

    /// Mutable simulated memory. A host that patches code through this must
    /// call [`Simulator::flush_icache`] over the written range.
    #[must_use]
    pub fn memory_mut(&mut self) -> &mut SimMemory {
        &mut self.memory
    }

    /// True when PC holds a sentinel rather than executable code.
    #[must_use]
    pub fn has_bad_pc(&self) -> bool {
        let pc = self.state.pc();
        pc == END_SIM_PC || pc == BAD_LR
    }

    // --- Coherency and redirection surface ---

    /// Marks the instruction-cache lines covering `[start, start + size)`
    /// INVALID after the host wrote into the code stream.
    pub fn flush_icache(&mut self, start: u32, size: u32) {
        self.icache.flush(start, size);
    }

    /// Interns a redirection for `host_fn` and returns the surrogate address
    /// generated code should call instead of the host function.
    pub fn redirect_external_reference(&mut self, host_fn: HostFunction) -> u32 {
        match self
            .redirections
            .redirect(host_fn, &mut self.memory, &mut self.icache)
        {
            Ok(surrogate) => surrogate,
            Err(fault) => diag::fatal(fault),
        }
    }

    // --- Debugger surface ---

    /// Installs the debug handler invoked at breakpoints and stops.
    pub fn set_debug_handler(&mut self, handler: Box<dyn DebugHandler>) {
        self.debug_handler = Some(handler);
    }

    /// Installs the trace sink receiving [`TraceEvent`]s.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.trace_sink = Some(sink);
    }

    /// Remembers the last debugger command line for repeat-on-empty-input.
    pub fn set_last_debugger_input(&mut self, line: String) {
        self.last_debugger_input = Some(line);
    }

    /// The last debugger command line, if any.
    #[must_use]
    pub fn last_debugger_input(&self) -> Option<&str> {
        self.last_debugger_input.as_deref()
    }

    /// Registers the single breakpoint at `addr`, remembering the word it
    /// will replace. Returns false when one is already set or `addr` is not
    /// readable. The trap word is only written by [`Simulator::redo_breakpoints`].
    pub fn set_breakpoint(&mut self, addr: u32) -> bool {
        if self.break_pc.is_some() {
            return false;
        }
        let Ok(original) = self.memory.read_u32(addr) else {
            return false;
        };
        self.break_pc = Some(addr);
        self.break_instr = original;
        true
    }

    /// Restores the breakpointed word and forgets the breakpoint.
    pub fn delete_breakpoint(&mut self) -> bool {
        self.undo_breakpoints();
        self.break_pc = None;
        self.break_instr = 0;
        true
    }

    /// Swaps the original word back in. Debugger shells call this on entry
    /// so stepping does not re-trap.
    pub fn undo_breakpoints(&mut self) {
        if let Some(addr) = self.break_pc {
            if self.memory.write_u32(addr, self.break_instr).is_ok() {
                self.icache.flush(addr, INSTRUCTION_BYTES);
            }
        }
    }

    /// Swaps the trap word in. Debugger shells call this before resuming.
    pub fn redo_breakpoints(&mut self) {
        if let Some(addr) = self.break_pc {
            if self.memory.write_u32(addr, BREAKPOINT_INSTRUCTION).is_ok() {
                self.icache.flush(addr, INSTRUCTION_BYTES);
            }
        }
    }

    /// Enables a watched stop.
    pub fn enable_stop(&mut self, code: u32) {
        self.stops.enable(code);
    }

    /// Disables a watched stop.
    pub fn disable_stop(&mut self, code: u32) {
        self.stops.disable(code);
    }

    /// Counter, enable state and description of a watched stop.
    #[must_use]
    pub fn stop_info(&self, code: u32) -> Option<StopInfo> {
        self.stops.info(code)
    }

    pub(crate) fn trace(&mut self, event: &TraceEvent) {
        if let Some(sink) = &mut self.trace_sink {
            sink.on_event(event);
        }
    }

    /// Transfers control to the debug handler. With no handler installed the
    /// break is reported through the diagnostic routine and execution
    /// resumes.
    pub(crate) fn enter_debugger(&mut self, reason: &BreakReason) {
        if let Some(mut handler) = self.debug_handler.take() {
            handler.on_break(self, reason);
            if self.debug_handler.is_none() {
                self.debug_handler = Some(handler);
            }
        } else {
            diag::print_diag(&format!("debug break with no handler attached: {reason:?}"));
        }
    }

    pub(crate) fn unimplemented(&self, instr: Instruction) -> Fault {
        Fault::UnimplementedInstruction {
            pc: self.state.pc(),
            word: instr.word(),
        }
    }

    // --- The fetch-decode-execute loop ---

    /// Executes the single instruction at PC: optional I-cache verify,
    /// optional trace, route to the executor, auto-advance PC unless the
    /// executor wrote it, count the retirement.
    pub(crate) fn instruction_decode(&mut self) -> Result<(), Fault> {
        let pc = self.state.pc();
        let word = self.memory.read_u32(pc)?;
        if self.config.check_icache {
            self.icache.check(pc, &self.memory)?;
        }
        if self.config.trace_execution {
            self.trace(&TraceEvent::Retired {
                icount: self.icount,
                pc,
                word,
            });
        }
        self.pc_modified = false;
        self.dispatch(Instruction::new(word))?;
        if !self.pc_modified {
            self.state.set_pc(pc.wrapping_add(INSTRUCTION_BYTES));
        }
        self.icount += 1;
        Ok(())
    }

    /// Single-step hook for debugger shells: executes exactly one
    /// instruction at PC. Fatal faults abort.
    pub fn step(&mut self) {
        if let Err(fault) = self.instruction_decode() {
            diag::fatal(fault);
        }
    }

    /// Runs from the current PC until it reaches a sentinel. The slow
    /// variant additionally watches the stop-at-icount threshold; the two
    /// differ only in that check.
    pub fn execute(&mut self) {
        match self.config.stop_at_icount {
            None => {
                while !self.has_bad_pc() {
                    if let Err(fault) = self.instruction_decode() {
                        diag::fatal(fault);
                    }
                }
            }
            Some(threshold) => {
                let mut reached = false;
                while !self.has_bad_pc() {
                    if !reached && self.icount == threshold {
                        reached = true;
                        self.enter_debugger(&BreakReason::IcountReached);
                        continue;
                    }
                    if let Err(fault) = self.instruction_decode() {
                        diag::fatal(fault);
                    }
                }
            }
        }
    }

    // --- Top-level entry ---

    /// Calls generated code at `entry` with up to five register arguments
    /// (r3..r7) and the rest on the simulated stack, runs to the
    /// end-of-simulation sentinel, and returns r3.
    ///
    /// Callee-saved registers are canaried across the run; a clobber, an
    /// unbalanced stack pointer, or any executor fault aborts through the
    /// diagnostic routine.
    pub fn call(&mut self, entry: u32, args: &[u32]) -> u32 {
        match self.try_call(entry, args) {
            Ok(result) => result,
            Err(fault) => diag::fatal(fault),
        }
    }

    fn try_call(&mut self, entry: u32, args: &[u32]) -> Result<u32, Fault> {
        for (i, &arg) in args.iter().take(5).enumerate() {
            self.state.set_gpr(R3 + i, arg);
        }
        let stack_args = args.get(5..).unwrap_or(&[]);

        let original_sp = self.state.gpr(SP);
        // Reserve the argument words plus the LR slot and back-chain, then
        // align downward.
        let entry_sp = original_sp
            .wrapping_sub(stack_args.len() as u32 * 4)
            .wrapping_sub(8)
            & !(self.config.stack_alignment - 1);
        if entry_sp < self.memory.stack_limit() {
            return Err(Fault::StackOverflow {
                sp: entry_sp,
                limit: self.memory.stack_limit(),
            });
        }
        for (i, &arg) in stack_args.iter().enumerate() {
            self.memory.write_u32(entry_sp + i as u32 * 4, arg)?;
        }
        self.state.set_gpr(SP, entry_sp);

        self.state.set_pc(entry);
        self.state.set_lr(END_SIM_PC);

        let saved: [u32; GENERAL_REGISTER_COUNT - FIRST_CALLEE_SAVED] =
            std::array::from_fn(|i| self.state.gpr(FIRST_CALLEE_SAVED + i));
        let canary = CALLEE_SAVED_CANARY ^ self.icount as u32;
        for reg in FIRST_CALLEE_SAVED..GENERAL_REGISTER_COUNT {
            self.state.set_gpr(reg, canary);
        }

        self.execute();

        for reg in FIRST_CALLEE_SAVED..GENERAL_REGISTER_COUNT {
            if self.state.gpr(reg) != canary {
                return Err(Fault::CalleeSavedClobbered { reg });
            }
        }
        for (i, &value) in saved.iter().enumerate() {
            self.state.set_gpr(FIRST_CALLEE_SAVED + i, value);
        }

        if self.state.gpr(SP) != entry_sp {
            return Err(Fault::UnbalancedStack {
                expected: entry_sp,
                actual: self.state.gpr(SP),
            });
        }
        self.state.set_gpr(SP, original_sp);

        Ok(self.state.gpr(R3))
    }

    /// Pushes an address onto the simulated stack for a nested entry and
    /// returns the new stack pointer.
    pub fn push_address(&mut self, address: u32) -> u32 {
        let new_sp = self.state.gpr(SP).wrapping_sub(4);
        if new_sp < self.memory.stack_limit() {
            diag::fatal(Fault::StackOverflow {
                sp: new_sp,
                limit: self.memory.stack_limit(),
            });
        }
        if let Err(fault) = self.memory.write_u32(new_sp, address) {
            diag::fatal(fault);
        }
        self.state.set_gpr(SP, new_sp);
        new_sp
    }

    /// Pops the address pushed by [`Simulator::push_address`].
    pub fn pop_address(&mut self) -> u32 {
        let sp = self.state.gpr(SP);
        let address = match self.memory.read_u32(sp) {
            Ok(address) => address,
            Err(fault) => diag::fatal(fault),
        };
        self.state.set_gpr(SP, sp.wrapping_add(4));
        address
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Simulator>> = RefCell::new(None);
}

/// Runs `f` with this thread's simulator, creating it with the default
/// configuration on first use. The per-thread instance lives until thread
/// teardown.
pub fn with_current<R>(f: impl FnOnce(&mut Simulator) -> R) -> R {
    CURRENT.with(|cell| {
        let mut slot = cell.borrow_mut();
        let sim = slot.get_or_insert_with(Simulator::default);
        f(sim)
    })
}
