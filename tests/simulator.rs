use lazy_static::lazy_static;
use niosim::instruction::Catalog;
use niosim::parser::{Assembler, Program};
use niosim::simulator::error::MemoryErrorKind;
use niosim::simulator::memory::{
    BUTTONS_START, LEDS_START, RAM_SIZE, SWITCHES_START, UART_START,
};
use niosim::simulator::{
    EmulatorError, Event, Fault, MemoryError, RegisterError, RunOutcome, SimState, Simulator,
    Tag, STACK_TOP,
};
use proptest::prelude::*;

lazy_static! {
    static ref CATALOG: Catalog = Catalog::new();
}

fn assemble(source: &str) -> Program {
    Assembler::new(&CATALOG)
        .assemble(source)
        .unwrap_or_else(|e| panic!("{e}"))
}

fn loaded(source: &str) -> Simulator {
    let mut sim = Simulator::new();
    sim.load(&assemble(source)).unwrap();
    sim
}

fn run(source: &str) -> Simulator {
    let mut sim = loaded(source);
    assert_eq!(sim.run_with_limit(10_000), Ok(RunOutcome::Halted));
    sim
}

#[test]
fn test_single_step_then_halt() {
    let mut sim = loaded("addi r2, r0, 5\n");
    assert_eq!(sim.state(), SimState::Loaded);

    assert_eq!(sim.step(), Ok(true));
    assert_eq!(sim.read_register(2), 5);
    assert_eq!(sim.pc(), 4);
    assert_eq!(sim.state(), SimState::Running);

    assert_eq!(sim.step(), Ok(false));
    assert_eq!(sim.state(), SimState::Halted);
    assert_eq!(sim.steps(), 1);

    // stays halted
    assert_eq!(sim.step(), Ok(false));
    assert_eq!(sim.run_with_limit(5), Ok(RunOutcome::Halted));
}

#[test]
fn test_forward_reference() {
    let sim = run("    br skip
                       movi r2, 1
                   skip:
                       movi r3, 3");
    assert_eq!(sim.read_register(2), 0);
    assert_eq!(sim.read_register(3), 3);
}

#[test]
fn test_macro_behaves_like_instruction() {
    let a = assemble("movi r4, 9\nmov r3, r4");
    let b = assemble("movi r4, 9\nadd r3, r4, r0");
    assert_eq!(a.image(), b.image());

    let mut sim = Simulator::new();
    sim.load(&a).unwrap();
    sim.run().unwrap();
    assert_eq!(sim.read_register(3), 9);
}

#[test]
fn test_led_store_is_masked() {
    let mut sim = Simulator::new();
    let events = sim.subscribe();

    sim.memory.write_byte(LEDS_START, 0x1f).unwrap();
    assert_eq!(sim.read_byte(LEDS_START), Ok(0xf));

    let leds: Vec<Event> = events
        .try_iter()
        .filter(|e| matches!(e, Event::Leds(_)))
        .collect();
    assert_eq!(leds, [Event::Leds(0xf)]);
}

#[test]
fn test_unmapped_address() {
    let mut sim = Simulator::new();
    assert_eq!(
        sim.memory.read_byte(0x8000_0000),
        Err(MemoryError {
            address: 0x8000_0000,
            kind: MemoryErrorKind::Unmapped
        })
    );
    assert_eq!(sim.read_word(RAM_SIZE), Err(MemoryError::unmapped(RAM_SIZE)));

    let mut sim = loaded("movia r3, 0x80000000\nldw r2, 0(r3)");
    let err = sim.run().unwrap_err();
    assert_eq!(err.pc, 8);
    assert_eq!(err.fault, Fault::Memory(MemoryError::unmapped(0x8000_0000)));
}

#[test]
fn test_division_by_zero_keeps_destination() {
    let mut sim = loaded("movi r3, 7\nmovi r4, 0\nmovi r5, 99\ndiv r5, r3, r4");
    assert_eq!(
        sim.run(),
        Err(EmulatorError {
            pc: 12,
            fault: Fault::DivisionByZero
        })
    );
    assert_eq!(sim.read_register(5), 99);
    assert_eq!(sim.pc(), 12);
}

#[test]
fn test_every_branch_lands_on_its_label() {
    // (branch, lhs, rhs): every one of these is taken
    let taken = [
        ("beq", 5, 5),
        ("bne", 5, 6),
        ("blt", -1, 1),
        ("bge", 1, -1),
        ("bge", 3, 3),
        ("bltu", 1, -1),
        ("bgeu", -1, 1),
        ("bgt", 2, 1),
        ("bgtu", -1, 1),
        ("ble", 1, 1),
        ("bleu", 1, 2),
    ];

    for (branch, lhs, rhs) in taken {
        let forward = format!(
            "    movi r3, {lhs}
                 movi r4, {rhs}
                 {branch} r3, r4, target
                 movi r2, 1
                 br end
             target:
                 movi r2, 42
             end:"
        );
        assert_eq!(run(&forward).read_register(2), 42, "{branch} {lhs}, {rhs}");

        // one pass through `back` with r5 = 0, then the branch jumps back and r5 becomes 1
        let backward = format!(
            "    movi r3, {lhs}
                 movi r4, {rhs}
                 br first
             back:
                 movi r5, 1
                 br end
             first:
                 {branch} r3, r4, back
             end:"
        );
        assert_eq!(run(&backward).read_register(5), 1, "{branch} {lhs}, {rhs}");

        // with the operands swapped only the always-equal cases still branch
        let not_taken = format!(
            "    movi r3, {rhs}
                 movi r4, {lhs}
                 movi r2, 1
                 {branch} r3, r4, end
                 movi r2, 42
             end:"
        );
        let expected = if lhs == rhs || branch == "bne" { 1 } else { 42 };
        assert_eq!(run(&not_taken).read_register(2), expected, "{branch} {rhs}, {lhs}");
    }
}

#[test]
fn test_absolute_jumps_land_on_target() {
    let sim = run("    call f
                       movi r2, 1
                       br end
                   f:  movi r2, 42
                       jmpi end
                       movi r2, 2
                   end:");
    assert_eq!(sim.read_register(2), 42);
    assert_eq!(sim.read_register(31), 4);

    let sim = run("    movia r8, target
                       jmp r8
                       movi r2, 1
                   target:
                       nextpc r3");
    assert_eq!(sim.read_register(2), 0);
    assert_eq!(sim.read_register(3), 20);
}

#[test]
fn test_misaligned_jump_faults() {
    let mut sim = loaded("movi r3, 2\njmp r3");
    assert_eq!(
        sim.run(),
        Err(EmulatorError {
            pc: 4,
            fault: Fault::MisalignedPc(2)
        })
    );
    assert_eq!(sim.pc(), 4);
}

#[test]
fn test_immediates_are_truncated() {
    let sim = run("movi r2, 0x10005\naddi r3, r0, 0xffff\nori r4, r0, -1\nslli r5, r5, 32");
    assert_eq!(sim.read_register(2), 5);
    assert_eq!(sim.read_register(3), u32::MAX);
    assert_eq!(sim.read_register(4), 0xffff);
}

#[test]
fn test_stack_pointer_starts_at_top() {
    let sim = loaded("nop");
    assert_eq!(sim.read_register(27), STACK_TOP);
}

#[test]
fn test_disabled_stack_pointer_is_left_alone() {
    let mut sim = loaded("nop");
    sim.registers_mut().disable(27);
    assert_eq!(sim.reset(), Ok(()));
    assert_eq!(sim.registers().tag(27), Tag::Disabled);
    assert_eq!(sim.read_register(27), 0);

    sim.registers_mut().enable(27);
    sim.reset().unwrap();
    assert_eq!(sim.read_register(27), STACK_TOP);
}

#[test]
fn test_disabled_register_faults() {
    let mut sim = loaded("movi r5, 1");
    sim.registers_mut().disable(5);
    assert_eq!(
        sim.step(),
        Err(EmulatorError {
            pc: 0,
            fault: Fault::Register(RegisterError(5))
        })
    );
}

#[test]
fn test_typed_register_view() {
    let sim = run("movi r2, -5\nmovi r3, 300");
    assert_eq!(sim.register::<i32>(2), -5);
    assert_eq!(sim.register::<u32>(2), 0xffff_fffb);
    assert_eq!(sim.register::<u8>(2), 0xfb);
    assert_eq!(sim.register::<i16>(3), 300);
    assert_eq!(sim.registers().tag(2), Tag::Untouched, "viewing isn't reading");
}

#[test]
fn test_failed_serial_load_keeps_character() {
    let source = format!("movia r8, {UART_START:#x}\nldbuio r5, 0(r8)");
    let mut sim = loaded(&source);
    sim.feed_serial_input(b'a');
    sim.feed_serial_input(b'b');
    sim.registers_mut().disable(5);

    assert_eq!(
        sim.run().map_err(|e| e.fault),
        Err(Fault::Register(RegisterError(5)))
    );
    assert_eq!(sim.read_byte(UART_START), Ok(b'a'), "nothing was received");

    sim.registers_mut().enable(5);
    sim.run().unwrap();
    assert_eq!(sim.read_register(5), b'a' as u32);
    assert_eq!(sim.read_byte(UART_START), Ok(b'b'));
}

#[test]
fn test_switches_and_buttons() {
    let source = format!(
        "movia r8, {SWITCHES_START}
         ldwio r2, 0(r8)
         movia r9, {BUTTONS_START}
         ldbio r3, 0(r9)"
    );
    let mut sim = loaded(&source);
    assert!(sim.toggle_switch(0));
    assert!(sim.toggle_switch(3));
    assert!(!sim.toggle_switch(4));
    assert!(!sim.toggle_switch(7));
    assert_eq!(sim.read_byte(SWITCHES_START), Ok(0b1001), "only four switches exist");
    assert!(sim.panel().press_button(1));
    sim.run().unwrap();
    assert_eq!(sim.read_register(2), 0b1001);
    assert_eq!(sim.read_register(3), 0b10);

    // inputs survive a reset
    sim.reset().unwrap();
    sim.run().unwrap();
    assert_eq!(sim.read_register(2), 0b1001);

    let mut sim = loaded(&format!("movia r8, {SWITCHES_START}\nstwio r8, 0(r8)"));
    let err = sim.run().unwrap_err();
    assert!(matches!(
        err.fault,
        Fault::Memory(MemoryError {
            kind: MemoryErrorKind::ReadOnly,
            ..
        })
    ));
}

#[test]
fn test_register_and_pc_events() {
    let mut sim = loaded("addi r2, r0, 5");
    let events = sim.subscribe();
    sim.run().unwrap();

    let events: Vec<Event> = events.try_iter().collect();
    assert_eq!(
        events,
        [
            Event::Register { index: 2, value: 5 },
            Event::Pc(4),
            Event::Halted { steps: 1 }
        ]
    );
}

#[test]
fn test_entry_point_and_line_map() {
    let program = assemble(
        ".global main
         movi r2, 1
         main:
         movi r3, 2",
    );
    assert_eq!(program.global("main"), Ok(4));
    assert_eq!(program.address_of_line(4), Some(4));
    assert_eq!(program.line_of_address(4), Some(4));

    let mut sim = Simulator::new();
    sim.load_with_entry(&program, 4).unwrap();
    sim.run().unwrap();
    assert_eq!(sim.read_register(2), 0);
    assert_eq!(sim.read_register(3), 2);

    assert_eq!(sim.disassemble(4).map(|i| i.to_string()), Ok("addi r3, r0, 2".into()));
    assert!(sim.load_with_entry(&program, 2).is_err());
}

#[test]
fn test_memory_blocks() {
    let sim = Simulator::new();
    let names: Vec<&str> = sim.memory.blocks().iter().map(|b| b.name()).collect();
    assert_eq!(names, ["ram", "leds", "switches", "buttons", "uart"]);
}

/// Everything [`Simulator::reset`] promises to restore: registers and their tags, PC, state,
/// step count and the contents of every memory block, devices included
#[derive(Debug, Clone, PartialEq, Eq)]
struct Snapshot {
    pc: u32,
    state: SimState,
    steps: u64,
    registers: Vec<(u32, Tag)>,
    blocks: Vec<Vec<u8>>,
}

fn snapshot(sim: &Simulator) -> Snapshot {
    Snapshot {
        pc: sim.pc(),
        state: sim.state(),
        steps: sim.steps(),
        registers: (0..32)
            .map(|i| (sim.read_register(i), sim.registers().tag(i)))
            .collect(),
        blocks: sim.memory.blocks().iter().map(|b| b.contents()).collect(),
    }
}

const COUNTER: &str = "
    .data
    counter: .word 0
    .text
    movia r8, counter
    movi r9, 20
    movia r11, 0xff200000
    movia r12, 0xff201000
loop:
    ldw r10, 0(r8)
    addi r10, r10, 1
    stw r10, 0(r8)
    subi sp, sp, 4
    stw r10, 0(sp)
    stwio r10, 0(r11)
    ldbuio r13, 0(r12)
    stbio r13, 1(r12)
    blt r10, r9, loop
";

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn reset_restores_the_loaded_state(steps in 0u64..150) {
        let mut sim = loaded(COUNTER);
        let initial = snapshot(&sim);

        sim.feed_serial_input(b'a');
        sim.toggle_switch(1);
        sim.run_with_limit(steps).unwrap();
        sim.toggle_switch(1);
        sim.reset().unwrap();
        prop_assert_eq!(snapshot(&sim), initial.clone());

        // a second reset changes nothing
        sim.reset().unwrap();
        prop_assert_eq!(snapshot(&sim), initial);
    }
}
