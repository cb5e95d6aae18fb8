//! Fatal fault taxonomy.
//!
//! Every abnormal condition the core can hit funnels into [`Fault`].
//! Executors and memory helpers propagate these with `?`; the run loop
//! surfaces them through the single diagnostic/abort pair in [`crate::diag`].
//! None of them is a recovery path: the host is expected never to trigger
//! them, and they exist as development aids.

use thiserror::Error;

/// Fatal simulator faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    /// The decoder reached an opcode outside the implemented subset. Also
    /// raised for invalid forms of implemented opcodes (unsupported SPR
    /// numbers, CTR-decrementing `bcctr`, update forms with `rA == 0`).
    #[error("unsupported instruction at {pc:#010x}: {word:#010x}")]
    UnimplementedInstruction {
        /// Address of the offending word.
        pc: u32,
        /// The raw encoding.
        word: u32,
    },
    /// A data or instruction access fell outside the simulated memory.
    #[error("memory access out of range: {addr:#010x} ({size} bytes)")]
    MemoryOutOfRange {
        /// Faulting simulated address.
        addr: u32,
        /// Access width in bytes.
        size: u32,
    },
    /// A fetch through a VALID cache line observed bytes that differ from
    /// memory: the host patched code without calling `flush_icache`.
    #[error("stale instruction cache line at {addr:#010x}: cached {cached:#010x}, memory {memory:#010x}")]
    StaleCacheLine {
        /// Fetch address.
        addr: u32,
        /// Word held by the cache line.
        cached: u32,
        /// Word currently in memory.
        memory: u32,
    },
    /// The simulated stack pointer descended below the safety margin.
    #[error("simulated stack overflow: sp {sp:#010x} below limit {limit:#010x}")]
    StackOverflow {
        /// Stack pointer after the faulting adjustment.
        sp: u32,
        /// Lowest legal stack address.
        limit: u32,
    },
    /// Generated code returned from a `call` with a clobbered callee-saved
    /// register.
    #[error("callee-saved register r{reg} clobbered by generated code")]
    CalleeSavedClobbered {
        /// Register index, 14..=31.
        reg: usize,
    },
    /// Generated code returned from a `call` with a different stack pointer
    /// than it was entered with.
    #[error("stack pointer unbalanced on return: expected {expected:#010x}, got {actual:#010x}")]
    UnbalancedStack {
        /// Entry stack pointer.
        expected: u32,
        /// Stack pointer at the end-of-simulation sentinel.
        actual: u32,
    },
    /// A bridge trap word executed with no redirection record at its address.
    #[error("no redirection registered for trap word at {addr:#010x}")]
    UnknownRedirection {
        /// Address of the trap word.
        addr: u32,
    },
    /// The redirection page has no room for another trap word.
    #[error("redirection page exhausted")]
    RedirectionExhausted,
    /// A host call saw an unaligned stack while strict alignment is on.
    #[error("unaligned stack {sp:#010x} at host call")]
    UnalignedStack {
        /// Stack pointer at the call.
        sp: u32,
    },
}
