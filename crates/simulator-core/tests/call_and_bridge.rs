//! Host-call bridge coverage: every call-type round trip, the typed
//! argument/return register conventions, and resumption at the saved link
//! register.

use ppc_asm::{encode, INSTRUCTION_BYTES};
use simulator_core::{HostFunction, SimConfig, Simulator, END_SIM_PC, SP};

fn load_program(sim: &mut Simulator, base: u32, words: &[u32]) {
    for (i, &word) in words.iter().enumerate() {
        sim.memory_mut()
            .write_u32(base + i as u32 * INSTRUCTION_BYTES, word)
            .expect("program fits in memory");
    }
    sim.flush_icache(base, words.len() as u32 * INSTRUCTION_BYTES);
}

/// Runs the trap word at `surrogate` directly: the bridge must finish the
/// simulated call by jumping to LR, which is parked on the sentinel.
fn run_surrogate(sim: &mut Simulator, surrogate: u32) {
    sim.set_lr(END_SIM_PC);
    sim.set_pc(surrogate);
    sim.execute();
}

fn pack_args(a0: u32, a1: u32, a2: u32, a3: u32, a4: u32, a5: u32) -> u64 {
    let low = a0 ^ a1.rotate_left(8) ^ a2.rotate_left(16);
    let high = a3 ^ a4.rotate_left(8) ^ a5.rotate_left(16);
    u64::from(low) | (u64::from(high) << 32)
}

#[test]
fn builtin_call_reads_four_registers_and_two_stack_words() {
    let mut sim = Simulator::default();
    let surrogate = sim.redirect_external_reference(HostFunction::Builtin(pack_args));

    sim.set_register(3, 0x11);
    sim.set_register(4, 0x22);
    sim.set_register(5, 0x33);
    sim.set_register(6, 0x44);
    let sp = sim.get_register(SP);
    sim.memory_mut().write_u32(sp, 0x55).unwrap();
    sim.memory_mut().write_u32(sp + 4, 0x66).unwrap();

    run_surrogate(&mut sim, surrogate);

    let expected = pack_args(0x11, 0x22, 0x33, 0x44, 0x55, 0x66);
    assert_eq!(sim.get_register(3), expected as u32);
    assert_eq!(sim.get_register(4), (expected >> 32) as u32);
}

#[test]
fn fp_fp_call_uses_fpr1_and_fpr2() {
    let mut sim = Simulator::default();
    let surrogate = sim.redirect_external_reference(HostFunction::FpFp(f64::atan2));

    sim.set_d_register_from_double(1, 1.0);
    sim.set_d_register_from_double(2, 1.0);
    run_surrogate(&mut sim, surrogate);

    assert_eq!(
        sim.get_double_from_d_register(1),
        std::f64::consts::FRAC_PI_4
    );
}

#[test]
fn compare_call_returns_a_split_i64() {
    fn ordered(a: f64, b: f64) -> i64 {
        if a < b {
            -1
        } else {
            i64::from(a > b)
        }
    }
    let mut sim = Simulator::default();
    let surrogate = sim.redirect_external_reference(HostFunction::Compare(ordered));

    sim.set_d_register_from_double(1, 1.0);
    sim.set_d_register_from_double(2, 2.0);
    run_surrogate(&mut sim, surrogate);

    assert_eq!(sim.get_register(3), 0xFFFF_FFFF);
    assert_eq!(sim.get_register(4), 0xFFFF_FFFF);
}

#[test]
fn fp_call_round_trips_the_bits() {
    fn identity(a: f64) -> f64 {
        a
    }
    let mut sim = Simulator::default();
    let surrogate = sim.redirect_external_reference(HostFunction::Fp(identity));

    let payload = 0x7FF8_0000_1234_5678_u64;
    sim.set_d_register_bits(1, payload);
    run_surrogate(&mut sim, surrogate);
    assert_eq!(sim.get_d_register_bits(1), payload);
}

#[test]
fn fp_int_call_takes_the_integer_from_r3() {
    let mut sim = Simulator::default();
    let surrogate =
        sim.redirect_external_reference(HostFunction::FpInt(|a, n| a * f64::from(n)));

    sim.set_d_register_from_double(1, 2.5);
    sim.set_register(3, -4i32 as u32);
    run_surrogate(&mut sim, surrogate);
    assert_eq!(sim.get_double_from_d_register(1), -10.0);
}

#[test]
fn direct_api_and_getter_calls_use_r3_and_r4() {
    fn api(handle: u32) -> u32 {
        handle.wrapping_add(1)
    }
    fn getter(object: u32, name: u32) -> u32 {
        object ^ name
    }
    let mut sim = Simulator::default();
    let api_surrogate = sim.redirect_external_reference(HostFunction::DirectApi(api));
    let getter_surrogate = sim.redirect_external_reference(HostFunction::DirectGetter(getter));

    sim.set_register(3, 0x4000);
    run_surrogate(&mut sim, api_surrogate);
    assert_eq!(sim.get_register(3), 0x4001);

    sim.set_register(3, 0xF0F0);
    sim.set_register(4, 0x0F0F);
    run_surrogate(&mut sim, getter_surrogate);
    assert_eq!(sim.get_register(3), 0xFFFF);
}

#[test]
fn generated_code_calls_through_the_surrogate_and_resumes() {
    // The callee saves LR around the bridged call, as generated prologues
    // do; the bridge must resume at the instruction after `bla`.
    let mut sim = Simulator::default();
    let surrogate = sim.redirect_external_reference(HostFunction::FpFp(f64::atan2));
    assert!(
        surrogate < 0x0200_0000,
        "surrogate must be reachable by an absolute branch"
    );

    let entry = 0x1000;
    load_program(
        &mut sim,
        entry,
        &[
            encode::mflr(9),
            encode::ba(surrogate as i32, true),
            encode::li(4, 9),
            encode::mtlr(9),
            encode::blr(),
        ],
    );
    sim.set_d_register_from_double(1, 1.0);
    sim.set_d_register_from_double(2, 1.0);
    sim.call(entry, &[]);

    assert_eq!(
        sim.get_double_from_d_register(1),
        std::f64::consts::FRAC_PI_4
    );
    assert_eq!(sim.get_register(4), 9, "execution resumed after the call");
}

#[test]
fn interned_surrogates_are_stable_across_repeat_redirection() {
    let mut sim = Simulator::default();
    let first = sim.redirect_external_reference(HostFunction::FpFp(f64::atan2));
    let second = sim.redirect_external_reference(HostFunction::FpFp(f64::atan2));
    assert_eq!(first, second);

    let other = sim.redirect_external_reference(HostFunction::FpFp(f64::hypot));
    assert_ne!(first, other);
}

#[test]
#[should_panic(expected = "unaligned stack")]
fn strict_alignment_aborts_on_an_unaligned_host_call() {
    let config = SimConfig {
        strict_stack_alignment: true,
        ..SimConfig::default()
    };
    let mut sim = Simulator::new(config);
    let surrogate = sim.redirect_external_reference(HostFunction::Fp(|a| a));
    let sp = sim.get_register(SP);
    sim.set_register(SP, sp - 2);
    run_surrogate(&mut sim, surrogate);
}

#[test]
fn lenient_alignment_reports_but_proceeds() {
    let mut sim = Simulator::default();
    let surrogate = sim.redirect_external_reference(HostFunction::Fp(|a| a + 1.0));
    let sp = sim.get_register(SP);
    sim.set_register(SP, sp - 2);
    sim.set_d_register_from_double(1, 1.0);
    run_surrogate(&mut sim, surrogate);
    assert_eq!(sim.get_double_from_d_register(1), 2.0);
}
