//! Trace and debug hooks.
//!
//! The core never formats instructions itself; the disassembler lives with
//! the debugger REPL outside the core. Trace events carry the raw material
//! (icount, PC, instruction word) and the host decides how to render it.

use crate::redirection::ExternalCallType;

/// Events emitted while the loop runs with tracing enabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceEvent {
    /// One instruction is about to execute.
    Retired {
        /// Instructions executed before this one.
        icount: u64,
        /// Address of the instruction.
        pc: u32,
        /// Raw encoding.
        word: u32,
    },
    /// The bridge is about to dispatch into a host function.
    HostCall {
        /// Surrogate address being executed.
        trap_address: u32,
        /// Calling convention of the target.
        call_type: ExternalCallType,
    },
    /// A watched stop was hit.
    StopHit {
        /// Stop code.
        code: u32,
        /// Whether the stop was enabled.
        enabled: bool,
    },
}

/// Sink for trace events, installed by the host.
pub trait TraceSink {
    /// Receives one event in execution order.
    fn on_event(&mut self, event: &TraceEvent);
}

/// Trace sink printing through the diagnostic routine.
#[derive(Debug, Default)]
pub struct StderrTrace;

impl TraceSink for StderrTrace {
    fn on_event(&mut self, event: &TraceEvent) {
        match *event {
            TraceEvent::Retired { icount, pc, word } => {
                crate::diag::print_diag(&format!("{icount:5}  {pc:#010x}  {word:#010x}"));
            }
            TraceEvent::HostCall {
                trap_address,
                call_type,
            } => {
                crate::diag::print_diag(&format!(
                    "host call via {trap_address:#010x} ({call_type:?})"
                ));
            }
            TraceEvent::StopHit { code, enabled } => {
                crate::diag::print_diag(&format!("stop {code} hit (enabled: {enabled})"));
            }
        }
    }
}

/// Why control is being handed to the debug handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakReason {
    /// A breakpoint trap word executed.
    Breakpoint,
    /// An enabled watched stop executed.
    WatchedStop {
        /// Stop code.
        code: u32,
        /// Description word following the stop, if readable.
        message: Option<String>,
    },
    /// The configured stop-at-icount threshold was reached.
    IcountReached,
}

/// The debugger attachment point. The interactive REPL implements this
/// outside the core; the core only transfers control.
pub trait DebugHandler {
    /// Invoked with the simulator whose execution stopped. The handler may
    /// single-step, edit state, or simply return to resume the run loop.
    fn on_break(&mut self, sim: &mut crate::Simulator, reason: &BreakReason);
}
