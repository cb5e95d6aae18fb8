//! Diagnostic output.
//!
//! All human-readable output from the core goes through [`print_diag`], and
//! every fatal condition goes through [`fatal`]. Nothing else in the crate
//! writes to the console or aborts.

use crate::fault::Fault;

/// The single print routine for simulator diagnostics.
pub fn print_diag(message: &str) {
    eprintln!("sim: {message}");
}

/// The single abort routine. Prints the fault, then panics.
pub fn fatal(fault: Fault) -> ! {
    print_diag(&fault.to_string());
    panic!("simulator fault: {fault}");
}
