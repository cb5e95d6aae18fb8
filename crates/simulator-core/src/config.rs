//! Simulator configuration.

/// Default size of the simulated flat memory.
pub const DEFAULT_MEMORY_BYTES: usize = 4 * 1024 * 1024;

/// Default size of the simulated stack region at the top of memory.
pub const DEFAULT_STACK_BYTES: usize = 1024 * 1024;

/// Default stack alignment checked at host-call boundaries.
pub const DEFAULT_STACK_ALIGNMENT: u32 = 8;

/// Immutable per-simulator configuration, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SimConfig {
    /// Size of the simulated flat memory in bytes.
    pub memory_bytes: usize,
    /// Size of the stack region carved from the top of memory.
    pub stack_bytes: usize,
    /// Emit a trace event for every retired instruction.
    pub trace_execution: bool,
    /// Verify the instruction cache on every fetch.
    pub check_icache: bool,
    /// Enter the debug handler when the instruction count reaches this value.
    pub stop_at_icount: Option<u64>,
    /// Alignment the simulated stack must hold at host-call boundaries.
    /// Must be a power of two.
    pub stack_alignment: u32,
    /// Abort on an unaligned stack at a host call instead of only reporting.
    pub strict_stack_alignment: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            memory_bytes: DEFAULT_MEMORY_BYTES,
            stack_bytes: DEFAULT_STACK_BYTES,
            trace_execution: false,
            check_icache: false,
            stop_at_icount: None,
            stack_alignment: DEFAULT_STACK_ALIGNMENT,
            strict_stack_alignment: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SimConfig;

    #[test]
    fn defaults_match_the_documented_flag_defaults() {
        let config = SimConfig::default();
        assert!(!config.trace_execution);
        assert!(!config.check_icache);
        assert_eq!(config.stop_at_icount, None);
        assert_eq!(config.stack_alignment, 8);
        assert!(config.stack_alignment.is_power_of_two());
    }
}
