//! Host-call redirection.
//!
//! Generated code cannot branch to a real host function: the interpreter
//! would decode host instructions as PowerPC words. Instead the host asks
//! the simulator for a surrogate address per host function. The surrogate is
//! the address of a synthetic trap word materialized in the redirection page
//! of simulated memory; executing it dispatches into the host function with
//! a typed calling convention and resumes at the saved link register.

use std::collections::HashMap;

use ppc_asm::opcodes::debug::REDIRECT_CALL_INSTRUCTION;
use ppc_asm::INSTRUCTION_BYTES;

use crate::fault::Fault;
use crate::icache::InstructionCache;
use crate::memory::SimMemory;

/// Call-type tags of the bridge, one per supported host signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ExternalCallType {
    /// Six 32-bit arguments, 64-bit result.
    BuiltinCall,
    /// Two doubles in, double out.
    BuiltinFpFpCall,
    /// Two doubles in, 64-bit integer out.
    BuiltinCompareCall,
    /// One double in, double out.
    BuiltinFpCall,
    /// One double and one integer in, double out.
    BuiltinFpIntCall,
    /// One pointer-sized value in, host-value handle out.
    DirectApiCall,
    /// Two pointer-sized values in, host-value handle out.
    DirectGetterCall,
}

/// A host function with its calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFunction {
    /// `BUILTIN_CALL`: args r3..r6 plus two stack words; result r4:r3.
    Builtin(fn(u32, u32, u32, u32, u32, u32) -> u64),
    /// `BUILTIN_FP_FP_CALL`: args f1, f2; result f1.
    FpFp(fn(f64, f64) -> f64),
    /// `BUILTIN_COMPARE_CALL`: args f1, f2; result r4:r3.
    Compare(fn(f64, f64) -> i64),
    /// `BUILTIN_FP_CALL`: arg f1; result f1.
    Fp(fn(f64) -> f64),
    /// `BUILTIN_FP_INT_CALL`: args f1, r3; result f1.
    FpInt(fn(f64, i32) -> f64),
    /// `DIRECT_API_CALL`: arg r3; result r3.
    DirectApi(fn(u32) -> u32),
    /// `DIRECT_GETTER_CALL`: args r3, r4; result r3.
    DirectGetter(fn(u32, u32) -> u32),
}

impl HostFunction {
    /// The call-type tag of this function.
    #[must_use]
    pub const fn call_type(self) -> ExternalCallType {
        match self {
            Self::Builtin(_) => ExternalCallType::BuiltinCall,
            Self::FpFp(_) => ExternalCallType::BuiltinFpFpCall,
            Self::Compare(_) => ExternalCallType::BuiltinCompareCall,
            Self::Fp(_) => ExternalCallType::BuiltinFpCall,
            Self::FpInt(_) => ExternalCallType::BuiltinFpIntCall,
            Self::DirectApi(_) => ExternalCallType::DirectApiCall,
            Self::DirectGetter(_) => ExternalCallType::DirectGetterCall,
        }
    }

    /// Identity key used for interning: the host code address.
    fn key(self) -> usize {
        match self {
            Self::Builtin(f) => f as usize,
            Self::FpFp(f) => f as usize,
            Self::Compare(f) => f as usize,
            Self::Fp(f) => f as usize,
            Self::FpInt(f) => f as usize,
            Self::DirectApi(f) => f as usize,
            Self::DirectGetter(f) => f as usize,
        }
    }
}

/// One interned redirection. Immutable after creation.
#[derive(Debug, Clone, Copy)]
pub struct Redirection {
    host_fn: HostFunction,
    trap_address: u32,
}

impl Redirection {
    /// The redirected host function.
    #[must_use]
    pub const fn host_function(&self) -> HostFunction {
        self.host_fn
    }

    /// The surrogate address generated code calls.
    #[must_use]
    pub const fn trap_address(&self) -> u32 {
        self.trap_address
    }
}

/// Per-simulator table of live redirections, keyed both by host function
/// (for interning) and by trap-word address (for dispatch).
#[derive(Debug, Default)]
pub struct RedirectionTable {
    by_trap_address: HashMap<u32, Redirection>,
    by_host_fn: HashMap<(ExternalCallType, usize), u32>,
    next_slot: u32,
}

impl RedirectionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `host_fn` and returns its surrogate address, materializing
    /// the trap word in the redirection page on first use.
    ///
    /// # Errors
    ///
    /// [`Fault::RedirectionExhausted`] when the redirection page is full.
    pub fn redirect(
        &mut self,
        host_fn: HostFunction,
        memory: &mut SimMemory,
        icache: &mut InstructionCache,
    ) -> Result<u32, Fault> {
        let key = (host_fn.call_type(), host_fn.key());
        if let Some(&trap_address) = self.by_host_fn.get(&key) {
            return Ok(trap_address);
        }

        let trap_address = memory.redirection_base() + self.next_slot;
        if trap_address + INSTRUCTION_BYTES > memory.redirection_limit() {
            return Err(Fault::RedirectionExhausted);
        }
        self.next_slot += INSTRUCTION_BYTES;

        memory.write_u32(trap_address, REDIRECT_CALL_INSTRUCTION)?;
        icache.flush(trap_address, INSTRUCTION_BYTES);

        let redirection = Redirection {
            host_fn,
            trap_address,
        };
        self.by_trap_address.insert(trap_address, redirection);
        self.by_host_fn.insert(key, trap_address);
        Ok(trap_address)
    }

    /// Locates the redirection whose trap word lives at `trap_address`.
    #[must_use]
    pub fn from_trap_address(&self, trap_address: u32) -> Option<&Redirection> {
        self.by_trap_address.get(&trap_address)
    }
}
