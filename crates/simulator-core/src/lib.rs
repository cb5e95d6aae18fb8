//! In-process PowerPC (32-bit) instruction-set simulator core.
//!
//! A managed-runtime host emits PowerPC machine code for a target CPU it is
//! not running on; this crate interprets that code so the rest of the
//! runtime can be developed and debugged on any host. The core is the
//! fetch-decode-execute loop, the architectural state it maintains, the
//! host-call bridge, and the instruction-cache coherency model. The
//! interactive debugger REPL and the disassembler are external collaborators
//! driving the hooks exposed here.

/// Simulator configuration.
pub mod config;
pub use config::{SimConfig, DEFAULT_MEMORY_BYTES, DEFAULT_STACK_BYTES};

/// Diagnostic print and abort routines.
pub mod diag;

/// Fatal fault taxonomy.
pub mod fault;
pub use fault::Fault;

/// Architectural register state.
pub mod registers;
pub use registers::{
    ArchState, ConditionRegister, Fpscr, RoundingMode, Xer, CR_EQ, CR_GT, CR_LT, CR_SO,
    FP_REGISTER_COUNT, GENERAL_REGISTER_COUNT, SP,
};

/// Simulated flat memory with its stack and redirection regions.
pub mod memory;
pub use memory::SimMemory;

/// Instruction-cache coherency model.
pub mod icache;
pub use icache::InstructionCache;

/// Host-call redirection.
pub mod redirection;
pub use redirection::{ExternalCallType, HostFunction, Redirection};

/// Watched-stop bookkeeping.
pub mod stops;
pub use stops::{StopInfo, NUM_WATCHED_STOPS, STOP_DISABLED_BIT};

/// Trace and debug hooks.
pub mod trace;
pub use trace::{BreakReason, DebugHandler, StderrTrace, TraceEvent, TraceSink};

/// The simulator instance and run loop.
pub mod simulator;
pub use simulator::{with_current, Simulator, BAD_LR, END_SIM_PC};

mod decoder;
mod execute;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
