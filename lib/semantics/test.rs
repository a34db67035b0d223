use num_bigint::BigUint;
use std::collections::{BTreeMap, BTreeSet};

use crate::architecture::{Amd64, Register, RegisterId, X86};
use crate::ast::{Constant, ExpressionId};
use crate::concrete::{ConcreteMemory, ConcreteState};
use crate::instruction::{DecodedInstruction, Instruction};
use crate::operand::{MemoryOperand, Operand};
use crate::options::{Mode, OptionsBuilder};
use crate::semantics::Opcode;
use crate::{Context, Error, RC};

fn init_amd64_context(mode: Mode) -> Context {
    let options = OptionsBuilder::new().mode(mode).build();
    let mut context = Context::with_options(Box::new(ConcreteMemory::new()), options);
    context.set_architecture(RC::new(Amd64::new()));
    context
}

fn reg(context: &Context, id: RegisterId) -> Register {
    context.register(id).unwrap()
}

fn r(context: &Context, id: RegisterId) -> Operand {
    Operand::Register(reg(context, id))
}

fn imm(value: u64, bits: usize) -> Operand {
    Operand::immediate(value, bits)
}

fn mem(address: u64, size: usize) -> Operand {
    Operand::memory(MemoryOperand::at(address, size))
}

fn set_register(context: &mut Context, id: RegisterId, value: u64) {
    let register = reg(context, id);
    context.concretize_register(&register);
    context
        .concrete_state_mut()
        .set_register_value(&register, &Constant::new(value, register.bits()));
}

fn register_value(context: &mut Context, id: RegisterId) -> u64 {
    let register = reg(context, id);
    context
        .symbolic_register_value(&register)
        .unwrap()
        .value_u64()
        .unwrap()
}

fn tainted(context: &Context, id: RegisterId) -> bool {
    context.is_register_tainted(&reg(context, id))
}

fn taint(context: &mut Context, id: RegisterId) {
    let register = reg(context, id);
    context.taint_register(&register);
}

fn decoded(address: u64, next: u64, opcode: Opcode, operands: Vec<Operand>) -> DecodedInstruction {
    operands.into_iter().fold(
        DecodedInstruction::new(address, next, opcode, opcode.mnemonic()),
        |decoded, operand| decoded.operand(operand),
    )
}

fn step(context: &mut Context, opcode: Opcode, operands: Vec<Operand>) -> Instruction {
    context
        .process(&decoded(0x1000, 0x1004, opcode, operands))
        .unwrap()
}

type Fingerprint = (
    usize,
    ExpressionId,
    BTreeMap<RegisterId, ExpressionId>,
    BTreeSet<RegisterId>,
    usize,
);

fn fingerprint(context: &Context) -> Fingerprint {
    (
        context.symbolic_expressions().len(),
        context.symbolic_engine().next_expression_id(),
        context.symbolic_registers().clone(),
        context.taint_engine().tainted_registers().clone(),
        context.path_constraints().len(),
    )
}

#[test]
fn shl_wraps_shift_count() {
    let value: u64 = 0x8000_0000_1234_0001;
    for count in [0u64, 1, 3, 63, 64, 65, 127, 200] {
        let mut context = init_amd64_context(Mode::FullEmulation);
        set_register(&mut context, RegisterId::Rax, value);
        let rax = r(&context, RegisterId::Rax);
        step(&mut context, Opcode::Shl, vec![rax, imm(count, 8)]);

        let expected = value << (count % 64);
        assert_eq!(register_value(&mut context, RegisterId::Rax), expected);
        let rax = reg(&context, RegisterId::Rax);
        assert_eq!(
            context.concrete_state().register_value(&rax),
            Constant::new(expected, 64)
        );
    }
}

#[test]
fn shl_32_bit_and_register_count() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    set_register(&mut context, RegisterId::Rax, 0xffff_ffff_8000_0003);
    let eax = r(&context, RegisterId::Eax);
    step(&mut context, Opcode::Shl, vec![eax, imm(33, 8)]);
    assert_eq!(register_value(&mut context, RegisterId::Rax), 0x6);
    assert_eq!(register_value(&mut context, RegisterId::Cf), 1);

    set_register(&mut context, RegisterId::Rcx, 68);
    set_register(&mut context, RegisterId::Rbx, 1);
    let rbx = r(&context, RegisterId::Rbx);
    let cl = r(&context, RegisterId::Cl);
    step(&mut context, Opcode::Shl, vec![rbx, cl]);
    assert_eq!(register_value(&mut context, RegisterId::Rbx), 0x10);
}

#[test]
fn shl_wraps_narrow_registers() {
    let value: u64 = 0x1234_5681;
    for (id, bits) in [(RegisterId::Al, 8u32), (RegisterId::Ax, 16)] {
        for count in [0u64, 1, 7, 8, 9, 15, 16, 17, 255] {
            let mut context = init_amd64_context(Mode::FullEmulation);
            set_register(&mut context, RegisterId::Rax, value);
            let dst = r(&context, id);
            step(&mut context, Opcode::Shl, vec![dst, imm(count, 8)]);

            let mask = (1u64 << bits) - 1;
            let shifted = ((value & mask) << (count % bits as u64)) & mask;
            assert_eq!(register_value(&mut context, id), shifted);
            assert_eq!(
                register_value(&mut context, RegisterId::Rax),
                (value & !mask) | shifted
            );
        }
    }
}

#[test]
fn right_shifts_keep_overflow_for_wide_counts() {
    for of in [0, 1] {
        let mut context = init_amd64_context(Mode::FullEmulation);
        set_register(&mut context, RegisterId::Of, of);
        set_register(&mut context, RegisterId::Rax, 0x8000_0000_0000_0000);
        set_register(&mut context, RegisterId::Rbx, 0x8000_0000_0000_0000);
        let rax = r(&context, RegisterId::Rax);
        step(&mut context, Opcode::Sar, vec![rax, imm(3, 8)]);
        assert_eq!(
            register_value(&mut context, RegisterId::Rax),
            0xf000_0000_0000_0000
        );
        assert_eq!(register_value(&mut context, RegisterId::Of), of);

        let rbx = r(&context, RegisterId::Rbx);
        step(&mut context, Opcode::Shr, vec![rbx, imm(3, 8)]);
        assert_eq!(
            register_value(&mut context, RegisterId::Rbx),
            0x1000_0000_0000_0000
        );
        assert_eq!(register_value(&mut context, RegisterId::Of), of);
    }
}

#[test]
fn empty_memory_operands_are_rejected() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    let before = fingerprint(&context);
    let rax = r(&context, RegisterId::Rax);
    let error = context
        .process(&decoded(0x1000, 0x1004, Opcode::Shl, vec![mem(0x100, 0), imm(1, 8)]))
        .unwrap_err();
    assert!(matches!(error, Error::IllegalOperands { .. }));
    let error = context
        .process(&decoded(0x1000, 0x1004, Opcode::Mov, vec![rax, mem(0x100, 0)]))
        .unwrap_err();
    assert!(matches!(error, Error::IllegalOperands { .. }));
    assert_eq!(fingerprint(&context), before);
}

#[test]
fn shift_by_zero_keeps_flags() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    set_register(&mut context, RegisterId::Cf, 1);
    set_register(&mut context, RegisterId::Zf, 1);
    set_register(&mut context, RegisterId::Rax, 0x10);
    let rax = r(&context, RegisterId::Rax);
    step(&mut context, Opcode::Shr, vec![rax, imm(0, 8)]);
    assert_eq!(register_value(&mut context, RegisterId::Rax), 0x10);
    assert_eq!(register_value(&mut context, RegisterId::Cf), 1);
    assert_eq!(register_value(&mut context, RegisterId::Zf), 1);
}

#[test]
fn right_shifts() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    set_register(&mut context, RegisterId::Rax, 0x8000_0000_0000_0003);
    let rax = r(&context, RegisterId::Rax);
    step(&mut context, Opcode::Shr, vec![rax.clone(), imm(1, 8)]);
    assert_eq!(
        register_value(&mut context, RegisterId::Rax),
        0x4000_0000_0000_0001
    );
    assert_eq!(register_value(&mut context, RegisterId::Cf), 1);
    assert_eq!(register_value(&mut context, RegisterId::Of), 1);

    set_register(&mut context, RegisterId::Rbx, 0x8000_0000_0000_0003);
    let rbx = r(&context, RegisterId::Rbx);
    step(&mut context, Opcode::Sar, vec![rbx, imm(1, 8)]);
    assert_eq!(
        register_value(&mut context, RegisterId::Rbx),
        0xc000_0000_0000_0001
    );
    assert_eq!(register_value(&mut context, RegisterId::Cf), 1);
    assert_eq!(register_value(&mut context, RegisterId::Of), 0);
}

#[test]
fn jnb_follows_carry() {
    for (carry, expected) in [(0, 0x2000), (1, 0x1002)] {
        let mut context = init_amd64_context(Mode::FullEmulation);
        set_register(&mut context, RegisterId::Cf, carry);
        let instruction = context
            .process(&decoded(0x1000, 0x1002, Opcode::Jnb, vec![imm(0x2000, 64)]))
            .unwrap();

        assert_eq!(register_value(&mut context, RegisterId::Rip), expected);
        assert!(instruction.is_branch());
        assert_eq!(instruction.taken(), carry == 0);
        assert_eq!(instruction.target(), Some(0x2000));

        let constraints = context.path_constraints().constraints().to_vec();
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0].address(), 0x1000);
        assert_eq!(constraints[0].target(), expected);
        assert_eq!(constraints[0].taken(), carry == 0);
    }
}

#[test]
fn symbolic_branch_condition() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    set_register(&mut context, RegisterId::Rax, 5);
    set_register(&mut context, RegisterId::Rbx, 3);
    let rax = reg(&context, RegisterId::Rax);
    let variable = context
        .convert_register_to_symbolic_variable(&rax, "input")
        .unwrap();

    let operands = vec![r(&context, RegisterId::Rax), r(&context, RegisterId::Rbx)];
    step(&mut context, Opcode::Cmp, operands);
    let instruction = context
        .process(&decoded(0x1004, 0x1006, Opcode::Jnb, vec![imm(0x3000, 64)]))
        .unwrap();
    assert!(instruction.taken());

    let conjunction = context.path_constraints_ast().unwrap();
    assert!(context.evaluate(conjunction).unwrap().is_one());
    let variables = context.ast().collect_variables(conjunction).unwrap();
    assert!(variables.contains(&variable));
    assert!(context.ast().collect_references(conjunction).unwrap().is_empty());
}

#[test]
fn mov_32_bit_immediate_clears_taint() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    set_register(&mut context, RegisterId::Rax, 0xffff_ffff_0000_0000);
    taint(&mut context, RegisterId::Rax);
    let eax = r(&context, RegisterId::Eax);
    step(&mut context, Opcode::Mov, vec![eax, imm(5, 32)]);
    assert!(!tainted(&context, RegisterId::Rax));
    assert!(!tainted(&context, RegisterId::Eax));
    assert_eq!(register_value(&mut context, RegisterId::Rax), 5);
}

#[test]
fn taint_propagation() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    taint(&mut context, RegisterId::Rbx);

    let operands = vec![r(&context, RegisterId::Rax), r(&context, RegisterId::Rbx)];
    let instruction = step(&mut context, Opcode::Add, operands);
    assert!(tainted(&context, RegisterId::Rax));
    assert!(tainted(&context, RegisterId::Zf));
    assert!(tainted(&context, RegisterId::Cf));
    assert!(!tainted(&context, RegisterId::Rip));
    assert!(!context.tainted_symbolic_expressions().is_empty());
    assert!(instruction
        .expressions()
        .iter()
        .any(|id| context.symbolic_expression(*id).unwrap().is_tainted()));

    let rbx = r(&context, RegisterId::Rbx);
    step(&mut context, Opcode::Mov, vec![rbx, imm(1, 64)]);
    assert!(!tainted(&context, RegisterId::Rbx));

    let operands = vec![r(&context, RegisterId::Rcx), r(&context, RegisterId::Rax)];
    step(&mut context, Opcode::Xor, operands);
    assert!(tainted(&context, RegisterId::Rcx));
}

#[test]
fn failed_instructions_leave_no_trace() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    taint(&mut context, RegisterId::Rax);
    let rax = r(&context, RegisterId::Rax);
    step(&mut context, Opcode::Add, vec![rax.clone(), imm(1, 8)]);
    let before = fingerprint(&context);

    let illegal = context
        .process(&decoded(0x1004, 0x1008, Opcode::Mov, vec![imm(1, 64), rax.clone()]))
        .unwrap_err();
    assert!(matches!(illegal, Error::IllegalOperands { .. }));
    assert!(!illegal.is_coverage_gap());

    let rbx = r(&context, RegisterId::Rbx);
    let too_many = context
        .process(&decoded(0x1004, 0x1008, Opcode::Nop, vec![rax.clone(), rbx]))
        .unwrap_err();
    assert!(matches!(too_many, Error::IllegalOperands { .. }));

    let cl = r(&context, RegisterId::Cl);
    let missing = context
        .process(&decoded(0x1004, 0x1008, Opcode::Shl, vec![mem(0x100, 8), cl]))
        .unwrap_err();
    assert!(matches!(missing, Error::NotImplemented { .. }));
    assert!(missing.is_coverage_gap());

    let rbx = reg(&context, RegisterId::Rbx);
    let unresolved = Operand::memory(MemoryOperand::new(8).with_base(rbx));
    let precondition = context
        .process(&decoded(0x1004, 0x1008, Opcode::Mov, vec![rax, unresolved]))
        .unwrap_err();
    assert!(matches!(precondition, Error::MemoryNotSetUp(1)));
    assert!(precondition.is_precondition());

    let eax = r(&context, RegisterId::Eax);
    let xmm0 = r(&context, RegisterId::Xmm0);
    let sort = context
        .process(&decoded(0x1004, 0x1008, Opcode::Movzx, vec![eax, xmm0]))
        .unwrap_err();
    assert!(matches!(sort, Error::Sort));

    assert_eq!(fingerprint(&context), before);
}

#[test]
fn path_constraints_keep_order() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    set_register(&mut context, RegisterId::Zf, 1);
    context
        .process(&decoded(0x1000, 0x1002, Opcode::Jz, vec![imm(0x3000, 64)]))
        .unwrap();
    context
        .process(&decoded(0x3000, 0x3002, Opcode::Jnz, vec![imm(0x4000, 64)]))
        .unwrap();

    let path = context.path_constraints();
    let addresses: Vec<u64> = path.iter().map(|c| c.address()).collect();
    let targets: Vec<u64> = path.iter().map(|c| c.target()).collect();
    let taken: Vec<bool> = path.iter().map(|c| c.taken()).collect();
    assert_eq!(addresses, vec![0x1000, 0x3000]);
    assert_eq!(targets, vec![0x3000, 0x3002]);
    assert_eq!(taken, vec![true, false]);

    let conjunction = context.path_constraints_ast().unwrap();
    assert!(context.evaluate(conjunction).unwrap().is_one());

    context.clear_path_constraints();
    assert!(context.path_constraints().is_empty());
}

#[test]
fn reset_invalidates_expressions() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    let rbx = reg(&context, RegisterId::Rbx);
    context
        .convert_register_to_symbolic_variable(&rbx, "rbx")
        .unwrap();
    let operands = vec![r(&context, RegisterId::Rax), r(&context, RegisterId::Rbx)];
    step(&mut context, Opcode::Mov, operands);
    let rax = r(&context, RegisterId::Rax);
    let instruction = step(&mut context, Opcode::Add, vec![rax, imm(1, 8)]);
    let id = instruction.expressions()[0];

    let first = context.full_ast_from_id(id).unwrap();
    let second = context.full_ast_from_id(id).unwrap();
    assert_eq!(first, second);
    assert!(context.ast().collect_references(first).unwrap().is_empty());

    context.reset();
    assert!(matches!(
        context.symbolic_expression(id),
        Err(Error::InvalidExpressionId(_))
    ));
    assert!(context.path_constraints().is_empty());
    assert!(!tainted(&context, RegisterId::Rax));
}

#[test]
fn concolic_keeps_tainted_expressions() {
    let mut context = init_amd64_context(Mode::Concolic);
    taint(&mut context, RegisterId::Rax);

    let rbx = r(&context, RegisterId::Rbx);
    let instruction = step(&mut context, Opcode::Mov, vec![rbx, imm(1, 64)]);
    assert!(instruction.expressions().is_empty());
    assert_eq!(context.symbolic_register_id(&reg(&context, RegisterId::Rbx)), None);

    let operands = vec![r(&context, RegisterId::Rax), r(&context, RegisterId::Rbx)];
    let instruction = step(&mut context, Opcode::Add, operands);
    assert!(!instruction.expressions().is_empty());
    for id in instruction.expressions() {
        assert!(context.symbolic_expression(*id).unwrap().is_tainted());
    }
    assert!(context
        .symbolic_register_id(&reg(&context, RegisterId::Rax))
        .is_some());
    assert_eq!(context.symbolic_register_id(&reg(&context, RegisterId::Rip)), None);
}

#[test]
fn concrete_only_keeps_no_expressions() {
    let mut context = init_amd64_context(Mode::ConcreteOnly);
    taint(&mut context, RegisterId::Rax);
    let rax = r(&context, RegisterId::Rax);
    let instruction = step(&mut context, Opcode::Cmp, vec![rax, imm(0, 8)]);
    assert!(instruction.expressions().is_empty());
    assert!(tainted(&context, RegisterId::Zf));

    set_register(&mut context, RegisterId::Zf, 1);
    let instruction = context
        .process(&decoded(0x1004, 0x1006, Opcode::Jz, vec![imm(0x2000, 64)]))
        .unwrap();
    assert!(instruction.taken());
    assert!(instruction.expressions().is_empty());
    assert!(context.path_constraints().is_empty());
    assert!(context.symbolic_expressions().is_empty());
}

#[test]
fn arithmetic_flags() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    set_register(&mut context, RegisterId::Rax, u64::MAX);
    let rax = r(&context, RegisterId::Rax);
    step(&mut context, Opcode::Add, vec![rax.clone(), imm(1, 8)]);
    assert_eq!(register_value(&mut context, RegisterId::Rax), 0);
    assert_eq!(register_value(&mut context, RegisterId::Zf), 1);
    assert_eq!(register_value(&mut context, RegisterId::Cf), 1);
    assert_eq!(register_value(&mut context, RegisterId::Of), 0);
    assert_eq!(register_value(&mut context, RegisterId::Sf), 0);
    assert_eq!(register_value(&mut context, RegisterId::Pf), 1);
    assert_eq!(register_value(&mut context, RegisterId::Af), 1);

    set_register(&mut context, RegisterId::Rax, 0x8000_0000_0000_0000);
    step(&mut context, Opcode::Sub, vec![rax.clone(), imm(1, 8)]);
    assert_eq!(
        register_value(&mut context, RegisterId::Rax),
        0x7fff_ffff_ffff_ffff
    );
    assert_eq!(register_value(&mut context, RegisterId::Of), 1);
    assert_eq!(register_value(&mut context, RegisterId::Cf), 0);

    set_register(&mut context, RegisterId::Rax, 3);
    step(&mut context, Opcode::Cmp, vec![rax, imm(5, 8)]);
    assert_eq!(register_value(&mut context, RegisterId::Rax), 3);
    assert_eq!(register_value(&mut context, RegisterId::Cf), 1);
    assert_eq!(register_value(&mut context, RegisterId::Sf), 1);
    assert_eq!(register_value(&mut context, RegisterId::Zf), 0);
}

#[test]
fn inc_and_dec_keep_carry() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    set_register(&mut context, RegisterId::Cf, 1);
    set_register(&mut context, RegisterId::Rax, u64::MAX);
    let rax = r(&context, RegisterId::Rax);
    step(&mut context, Opcode::Inc, vec![rax.clone()]);
    assert_eq!(register_value(&mut context, RegisterId::Rax), 0);
    assert_eq!(register_value(&mut context, RegisterId::Zf), 1);
    assert_eq!(register_value(&mut context, RegisterId::Cf), 1);

    set_register(&mut context, RegisterId::Rax, 0x8000_0000_0000_0000);
    step(&mut context, Opcode::Dec, vec![rax]);
    assert_eq!(register_value(&mut context, RegisterId::Of), 1);
    assert_eq!(register_value(&mut context, RegisterId::Cf), 1);
}

#[test]
fn logic_clears_carry_and_overflow() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    set_register(&mut context, RegisterId::Cf, 1);
    set_register(&mut context, RegisterId::Of, 1);
    set_register(&mut context, RegisterId::Rax, 0xf0);
    let rax = r(&context, RegisterId::Rax);
    step(&mut context, Opcode::Test, vec![rax.clone(), imm(0x0f, 8)]);
    assert_eq!(register_value(&mut context, RegisterId::Rax), 0xf0);
    assert_eq!(register_value(&mut context, RegisterId::Zf), 1);
    assert_eq!(register_value(&mut context, RegisterId::Cf), 0);
    assert_eq!(register_value(&mut context, RegisterId::Of), 0);

    step(&mut context, Opcode::Or, vec![rax.clone(), imm(0x0f, 8)]);
    assert_eq!(register_value(&mut context, RegisterId::Rax), 0xff);
    step(&mut context, Opcode::And, vec![rax.clone(), imm(0x3c, 8)]);
    assert_eq!(register_value(&mut context, RegisterId::Rax), 0x3c);
    step(&mut context, Opcode::Not, vec![rax.clone()]);
    assert_eq!(register_value(&mut context, RegisterId::Rax), !0x3c);
    step(&mut context, Opcode::Xor, vec![rax.clone(), rax]);
    assert_eq!(register_value(&mut context, RegisterId::Rax), 0);
    assert_eq!(register_value(&mut context, RegisterId::Zf), 1);
}

#[test]
fn push_and_pop() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    set_register(&mut context, RegisterId::Rsp, 0x8000);
    set_register(&mut context, RegisterId::Rax, 0xdead);
    taint(&mut context, RegisterId::Rax);

    let rax = r(&context, RegisterId::Rax);
    step(&mut context, Opcode::Push, vec![rax, mem(0x7ff8, 8)]);
    assert_eq!(register_value(&mut context, RegisterId::Rsp), 0x7ff8);
    assert_eq!(
        context.symbolic_memory_value(0x7ff8, 8).unwrap(),
        Constant::new(0xdead, 64)
    );
    assert!(context.is_memory_tainted(0x7ff8, 8));
    assert_eq!(
        context.concrete_state().memory_value(0x7ff8, 8),
        Constant::new(0xdead, 64)
    );

    let rbx = r(&context, RegisterId::Rbx);
    step(&mut context, Opcode::Pop, vec![rbx, mem(0x7ff8, 8)]);
    assert_eq!(register_value(&mut context, RegisterId::Rbx), 0xdead);
    assert_eq!(register_value(&mut context, RegisterId::Rsp), 0x8000);
    assert!(tainted(&context, RegisterId::Rbx));

    step(&mut context, Opcode::Push, vec![imm(0xff, 8), mem(0x7ff8, 8)]);
    assert_eq!(
        context.symbolic_memory_value(0x7ff8, 8).unwrap(),
        Constant::new(u64::MAX, 64)
    );
    assert!(!context.is_memory_tainted(0x7ff8, 8));
}

#[test]
fn data_movement() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    set_register(&mut context, RegisterId::Rbx, 0x80);
    let eax = r(&context, RegisterId::Eax);
    let bl = r(&context, RegisterId::Bl);
    step(&mut context, Opcode::Movzx, vec![eax, bl.clone()]);
    assert_eq!(register_value(&mut context, RegisterId::Rax), 0x80);

    let rax = r(&context, RegisterId::Rax);
    step(&mut context, Opcode::Movsx, vec![rax.clone(), bl]);
    assert_eq!(
        register_value(&mut context, RegisterId::Rax),
        0xffff_ffff_ffff_ff80
    );

    let mut trusted = MemoryOperand::at(0x3000, 8);
    trusted.set_concrete_value(Constant::new(0x42, 64));
    step(&mut context, Opcode::Mov, vec![rax.clone(), Operand::memory(trusted)]);
    assert_eq!(register_value(&mut context, RegisterId::Rax), 0x42);

    step(&mut context, Opcode::Mov, vec![mem(0x4000, 4), imm(0x1234_5678, 32)]);
    let ax = r(&context, RegisterId::Ax);
    step(&mut context, Opcode::Mov, vec![ax, mem(0x4001, 2)]);
    assert_eq!(register_value(&mut context, RegisterId::Rax), 0x3456);
}

#[test]
fn lea_takes_taint_from_address_registers() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    set_register(&mut context, RegisterId::Rbx, 0x100);
    set_register(&mut context, RegisterId::Rcx, 2);
    taint(&mut context, RegisterId::Rcx);
    let address = MemoryOperand::at(0x120, 8)
        .with_base(reg(&context, RegisterId::Rbx))
        .with_index(reg(&context, RegisterId::Rcx), 8)
        .with_displacement(0x10);
    let rax = r(&context, RegisterId::Rax);
    step(&mut context, Opcode::Lea, vec![rax, Operand::memory(address)]);
    assert_eq!(register_value(&mut context, RegisterId::Rax), 0x120);
    assert!(tainted(&context, RegisterId::Rax));
}

#[test]
fn cmov_taint_follows_condition() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    set_register(&mut context, RegisterId::Rax, 1);
    set_register(&mut context, RegisterId::Rbx, 2);
    taint(&mut context, RegisterId::Rbx);

    let operands = vec![r(&context, RegisterId::Rax), r(&context, RegisterId::Rbx)];
    step(&mut context, Opcode::Cmovz, operands.clone());
    assert_eq!(register_value(&mut context, RegisterId::Rax), 1);
    assert!(!tainted(&context, RegisterId::Rax));

    set_register(&mut context, RegisterId::Zf, 1);
    step(&mut context, Opcode::Cmovz, operands.clone());
    assert_eq!(register_value(&mut context, RegisterId::Rax), 2);
    assert!(tainted(&context, RegisterId::Rax));

    set_register(&mut context, RegisterId::Rbx, 3);
    set_register(&mut context, RegisterId::Cf, 0);
    step(&mut context, Opcode::Cmovnb, operands);
    assert_eq!(register_value(&mut context, RegisterId::Rax), 3);
}

#[test]
fn setcc_reads_flags() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    taint(&mut context, RegisterId::Rax);
    let rax = r(&context, RegisterId::Rax);
    step(&mut context, Opcode::Cmp, vec![rax, imm(0, 8)]);

    let cl = r(&context, RegisterId::Cl);
    step(&mut context, Opcode::Setz, vec![cl.clone()]);
    assert_eq!(register_value(&mut context, RegisterId::Cl), 1);
    assert!(tainted(&context, RegisterId::Rcx));

    step(&mut context, Opcode::Setnz, vec![cl]);
    assert_eq!(register_value(&mut context, RegisterId::Cl), 0);

    let dl = r(&context, RegisterId::Dl);
    step(&mut context, Opcode::Setnb, vec![dl]);
    assert_eq!(register_value(&mut context, RegisterId::Dl), 1);
}

#[test]
fn bswap_and_vector_operations() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    set_register(&mut context, RegisterId::Rax, 0x1122_3344_5566_7788);
    let rax = r(&context, RegisterId::Rax);
    step(&mut context, Opcode::Bswap, vec![rax]);
    assert_eq!(
        register_value(&mut context, RegisterId::Rax),
        0x8877_6655_4433_2211
    );
    let eax = r(&context, RegisterId::Eax);
    step(&mut context, Opcode::Bswap, vec![eax]);
    assert_eq!(register_value(&mut context, RegisterId::Rax), 0x1122_3344);

    set_register(&mut context, RegisterId::Xmm0, 0x0001_0002_0003_0004);
    set_register(&mut context, RegisterId::Xmm1, 0x0001_0000_0003_0000);
    let xmm0 = r(&context, RegisterId::Xmm0);
    let xmm1 = r(&context, RegisterId::Xmm1);
    step(&mut context, Opcode::Pcmpeqw, vec![xmm0.clone(), xmm1.clone()]);
    let register = reg(&context, RegisterId::Xmm0);
    assert_eq!(
        context.symbolic_register_value(&register).unwrap(),
        Constant::new_big(
            BigUint::from(0xffff_ffff_ffff_ffff_ffff_0000_ffff_0000u128),
            128
        )
    );

    step(&mut context, Opcode::Andpd, vec![xmm0, xmm1]);
    assert_eq!(
        context.symbolic_register_value(&register).unwrap(),
        Constant::new(0x0001_0000_0003_0000, 128)
    );
}

#[test]
fn jumps_and_nops() {
    let mut context = init_amd64_context(Mode::FullEmulation);
    set_register(&mut context, RegisterId::Rax, 0x5000);
    let rax = r(&context, RegisterId::Rax);
    let instruction = step(&mut context, Opcode::Jmp, vec![rax]);
    assert!(instruction.is_branch());
    assert!(instruction.taken());
    assert_eq!(instruction.target(), Some(0x5000));
    assert_eq!(register_value(&mut context, RegisterId::Rip), 0x5000);
    assert!(context.path_constraints().is_empty());

    let instruction = step(&mut context, Opcode::Nop, vec![]);
    assert!(!instruction.is_branch());
    assert_eq!(register_value(&mut context, RegisterId::Rip), 0x1004);
}

#[test]
fn x86_partial_writes_keep_upper_bits() {
    let options = OptionsBuilder::new().build();
    let mut context = Context::with_options(Box::new(ConcreteMemory::new()), options);
    context.set_architecture(RC::new(X86::new()));
    set_register(&mut context, RegisterId::Eax, 0x1234_5678);
    let ax = r(&context, RegisterId::Ax);
    step(&mut context, Opcode::Mov, vec![ax, imm(0xabcd, 16)]);
    assert_eq!(register_value(&mut context, RegisterId::Eax), 0x1234_abcd);
    assert_eq!(register_value(&mut context, RegisterId::Eip), 0x1004);
    assert!(context.register(RegisterId::Rax).is_err());
}

#[test]
fn disabled_taint() {
    let options = OptionsBuilder::new().taint(false).build();
    let mut context = Context::with_options(Box::new(ConcreteMemory::new()), options);
    context.set_architecture(RC::new(Amd64::new()));
    taint(&mut context, RegisterId::Rbx);
    let operands = vec![r(&context, RegisterId::Rax), r(&context, RegisterId::Rbx)];
    step(&mut context, Opcode::Add, operands);
    assert!(!tainted(&context, RegisterId::Rax));
    assert!(!tainted(&context, RegisterId::Rbx));
    assert!(context.tainted_symbolic_expressions().is_empty());
}

#[test]
fn mnemonics() {
    assert_eq!(Opcode::from_mnemonic("pcmpeqw"), Some(Opcode::Pcmpeqw));
    assert_eq!(Opcode::from_mnemonic("vpxor"), None);
    assert_eq!(Opcode::Cmovnb.to_string(), "cmovnb");
}
