//! Deals with how instructions are executed

use super::{IType, Instruction, RType, RETURN_ADDRESS};
use crate::simulator::error::Fault;

/// Everything an instruction may touch while it executes. The [`Simulator`] is the real
/// implementation; anything else that wants to run instructions (a test harness, a tracer)
/// can provide its own.
///
/// After every instruction the engine adds 4 to the program counter, so an instruction that
/// redirects control flow writes the address *before* its target.
///
/// [`Simulator`]: crate::simulator::Simulator
pub trait Context {
    /// Address of the instruction being executed
    fn pc(&self) -> u32;

    /// Overwrites the program counter, failing if it is not word-aligned
    fn set_pc(&mut self, pc: u32) -> Result<(), Fault>;

    /// Fails if register `index` can't be accessed, without accessing it
    fn check_register(&self, index: u8) -> Result<(), Fault>;

    fn read_register(&mut self, index: u8) -> Result<u32, Fault>;
    fn write_register(&mut self, index: u8, value: u32) -> Result<(), Fault>;

    fn load_byte(&mut self, address: u32) -> Result<u8, Fault>;
    fn load_half(&mut self, address: u32) -> Result<u16, Fault>;
    fn load_word(&mut self, address: u32) -> Result<u32, Fault>;

    fn store_byte(&mut self, address: u32, value: u8) -> Result<(), Fault>;
    fn store_half(&mut self, address: u32, value: u16) -> Result<(), Fault>;
    fn store_word(&mut self, address: u32, value: u32) -> Result<(), Fault>;

    /// Transfers control to the absolute address `target`
    fn jump(&mut self, target: u32) -> Result<(), Fault> {
        if target % 4 != 0 {
            return Err(Fault::MisalignedPc(target));
        }
        self.set_pc(target.wrapping_sub(4))
    }
}

fn from_bool(x: bool) -> u32 {
    if x {
        1
    } else {
        0
    }
}

/// rC = op(rA, rB)
#[inline(always)]
fn exec_type_r<C, F>(ctx: &mut C, r: RType, op: F) -> Result<(), Fault>
where
    C: Context + ?Sized,
    F: FnOnce(u32, u32) -> Result<u32, Fault>,
{
    let a = ctx.read_register(r.a)?;
    let b = ctx.read_register(r.b)?;
    let value = op(a, b)?;
    ctx.write_register(r.c, value)
}

/// rC = op(rA, imm5)
#[inline(always)]
fn exec_shift_imm<C, F>(ctx: &mut C, r: RType, op: F) -> Result<(), Fault>
where
    C: Context + ?Sized,
    F: FnOnce(u32, u32) -> u32,
{
    let a = ctx.read_register(r.a)?;
    ctx.write_register(r.c, op(a, r.imm5 as u32 & 0x1f))
}

/// rB = op(rA, imm), with `imm` already extended
#[inline(always)]
fn exec_type_i<C, F>(ctx: &mut C, i: IType, imm: u32, op: F) -> Result<(), Fault>
where
    C: Context + ?Sized,
    F: FnOnce(u32, u32) -> u32,
{
    let a = ctx.read_register(i.a)?;
    ctx.write_register(i.b, op(a, imm))
}

/// PC += imm when `cond(rA, rB)` holds. The displacement is relative to the next instruction.
#[inline(always)]
fn exec_branch<C, F>(ctx: &mut C, i: IType, cond: F) -> Result<(), Fault>
where
    C: Context + ?Sized,
    F: FnOnce(u32, u32) -> bool,
{
    let a = ctx.read_register(i.a)?;
    let b = ctx.read_register(i.b)?;
    if cond(a, b) {
        let pc = ctx.pc();
        ctx.set_pc(pc.wrapping_add(i.simm() as u32))?;
    }
    Ok(())
}

/// rA + sign-extended offset
fn effective_address<C: Context + ?Sized>(ctx: &mut C, i: IType) -> Result<u32, Fault> {
    Ok(ctx.read_register(i.a)?.wrapping_add(i.simm() as u32))
}

/// rB = load(rA + offset). Device reads can have side effects, so rB is checked before
/// memory is touched.
#[inline(always)]
fn exec_load<C, F>(ctx: &mut C, i: IType, load: F) -> Result<(), Fault>
where
    C: Context + ?Sized,
    F: FnOnce(&mut C, u32) -> Result<u32, Fault>,
{
    let address = effective_address(ctx, i)?;
    ctx.check_register(i.b)?;
    let data = load(ctx, address)?;
    ctx.write_register(i.b, data)
}

impl Instruction {
    /// Executes this instruction against `ctx`. Every operand is read before anything is
    /// written, so a failing instruction leaves registers untouched.
    pub fn execute<C: Context + ?Sized>(&self, ctx: &mut C) -> Result<(), Fault> {
        use Instruction::*;

        match *self {
            // J-format
            Call(j) => {
                let pc = ctx.pc();
                ctx.jump(j.target(pc))?;
                ctx.write_register(RETURN_ADDRESS, pc.wrapping_add(4))
            }
            Jmpi(j) => {
                let pc = ctx.pc();
                ctx.jump(j.target(pc))
            }

            // I-format -- arithmetic and logic
            Addi(i) => exec_type_i(ctx, i, i.simm() as u32, |a, imm| a.wrapping_add(imm)),
            Andi(i) => exec_type_i(ctx, i, i.uimm(), |a, imm| a & imm),
            Ori(i) => exec_type_i(ctx, i, i.uimm(), |a, imm| a | imm),
            Xori(i) => exec_type_i(ctx, i, i.uimm(), |a, imm| a ^ imm),
            Andhi(i) => exec_type_i(ctx, i, i.uimm() << 16, |a, imm| a & imm),
            Orhi(i) => exec_type_i(ctx, i, i.uimm() << 16, |a, imm| a | imm),
            Xorhi(i) => exec_type_i(ctx, i, i.uimm() << 16, |a, imm| a ^ imm),
            Muli(i) => exec_type_i(ctx, i, i.simm() as u32, |a, imm| a.wrapping_mul(imm)),

            // I-format -- comparisons
            Cmpeqi(i) => exec_type_i(ctx, i, i.simm() as u32, |a, imm| from_bool(a == imm)),
            Cmpnei(i) => exec_type_i(ctx, i, i.simm() as u32, |a, imm| from_bool(a != imm)),
            Cmplti(i) => exec_type_i(ctx, i, i.simm() as u32, |a, imm| {
                from_bool((a as i32) < (imm as i32))
            }),
            Cmpgei(i) => exec_type_i(ctx, i, i.simm() as u32, |a, imm| {
                from_bool((a as i32) >= (imm as i32))
            }),
            Cmpltui(i) => exec_type_i(ctx, i, i.uimm(), |a, imm| from_bool(a < imm)),
            Cmpgeui(i) => exec_type_i(ctx, i, i.uimm(), |a, imm| from_bool(a >= imm)),

            // I-format -- loads
            Ldb(i) | Ldbio(i) => exec_load(ctx, i, |ctx, address| {
                Ok(ctx.load_byte(address)? as i8 as i32 as u32)
            }),
            Ldbu(i) | Ldbuio(i) => exec_load(ctx, i, |ctx, address| {
                Ok(ctx.load_byte(address)? as u32)
            }),
            Ldh(i) | Ldhio(i) => exec_load(ctx, i, |ctx, address| {
                Ok(ctx.load_half(address)? as i16 as i32 as u32)
            }),
            Ldhu(i) | Ldhuio(i) => exec_load(ctx, i, |ctx, address| {
                Ok(ctx.load_half(address)? as u32)
            }),
            Ldw(i) | Ldwio(i) => exec_load(ctx, i, |ctx, address| ctx.load_word(address)),

            // I-format -- stores
            Stb(i) | Stbio(i) => {
                let address = effective_address(ctx, i)?;
                let data = ctx.read_register(i.b)?;
                ctx.store_byte(address, data as u8)
            }
            Sth(i) | Sthio(i) => {
                let address = effective_address(ctx, i)?;
                let data = ctx.read_register(i.b)?;
                ctx.store_half(address, data as u16)
            }
            Stw(i) | Stwio(i) => {
                let address = effective_address(ctx, i)?;
                let data = ctx.read_register(i.b)?;
                ctx.store_word(address, data)
            }

            // I-format -- branches
            Br(i) => {
                let pc = ctx.pc();
                ctx.set_pc(pc.wrapping_add(i.simm() as u32))
            }
            Beq(i) => exec_branch(ctx, i, |a, b| a == b),
            Bne(i) => exec_branch(ctx, i, |a, b| a != b),
            Blt(i) => exec_branch(ctx, i, |a, b| (a as i32) < (b as i32)),
            Bge(i) => exec_branch(ctx, i, |a, b| (a as i32) >= (b as i32)),
            Bltu(i) => exec_branch(ctx, i, |a, b| a < b),
            Bgeu(i) => exec_branch(ctx, i, |a, b| a >= b),

            // R-format -- arithmetic and logic
            Add(r) => exec_type_r(ctx, r, |a, b| Ok(a.wrapping_add(b))),
            Sub(r) => exec_type_r(ctx, r, |a, b| Ok(a.wrapping_sub(b))),
            And(r) => exec_type_r(ctx, r, |a, b| Ok(a & b)),
            Or(r) => exec_type_r(ctx, r, |a, b| Ok(a | b)),
            Xor(r) => exec_type_r(ctx, r, |a, b| Ok(a ^ b)),
            Nor(r) => exec_type_r(ctx, r, |a, b| Ok(!(a | b))),
            Mul(r) => exec_type_r(ctx, r, |a, b| Ok(a.wrapping_mul(b))),
            Mulxss(r) => exec_type_r(ctx, r, |a, b| {
                Ok(((a as i32 as i64 * b as i32 as i64) >> 32) as u32)
            }),
            Mulxsu(r) => exec_type_r(ctx, r, |a, b| {
                Ok(((a as i32 as i64 * b as i64) >> 32) as u32)
            }),
            Mulxuu(r) => exec_type_r(ctx, r, |a, b| Ok(((a as u64 * b as u64) >> 32) as u32)),
            Div(r) => exec_type_r(ctx, r, |a, b| match b {
                0 => Err(Fault::DivisionByZero),
                _ => Ok((a as i32).wrapping_div(b as i32) as u32),
            }),
            Divu(r) => exec_type_r(ctx, r, |a, b| match b {
                0 => Err(Fault::DivisionByZero),
                _ => Ok(a / b),
            }),

            // R-format -- comparisons
            Cmpeq(r) => exec_type_r(ctx, r, |a, b| Ok(from_bool(a == b))),
            Cmpne(r) => exec_type_r(ctx, r, |a, b| Ok(from_bool(a != b))),
            Cmplt(r) => exec_type_r(ctx, r, |a, b| Ok(from_bool((a as i32) < (b as i32)))),
            Cmpge(r) => exec_type_r(ctx, r, |a, b| Ok(from_bool((a as i32) >= (b as i32)))),
            Cmpltu(r) => exec_type_r(ctx, r, |a, b| Ok(from_bool(a < b))),
            Cmpgeu(r) => exec_type_r(ctx, r, |a, b| Ok(from_bool(a >= b))),

            // R-format -- shifts and rotates
            Sll(r) => exec_type_r(ctx, r, |a, b| Ok(a << (b & 0x1f))),
            Srl(r) => exec_type_r(ctx, r, |a, b| Ok(a >> (b & 0x1f))),
            Sra(r) => exec_type_r(ctx, r, |a, b| Ok(((a as i32) >> (b & 0x1f)) as u32)),
            Rol(r) => exec_type_r(ctx, r, |a, b| Ok(a.rotate_left(b & 0x1f))),
            Ror(r) => exec_type_r(ctx, r, |a, b| Ok(a.rotate_right(b & 0x1f))),
            Slli(r) => exec_shift_imm(ctx, r, |a, imm| a << imm),
            Srli(r) => exec_shift_imm(ctx, r, |a, imm| a >> imm),
            Srai(r) => exec_shift_imm(ctx, r, |a, imm| ((a as i32) >> imm) as u32),
            Roli(r) => exec_shift_imm(ctx, r, |a, imm| a.rotate_left(imm)),

            // R-format -- control flow
            Jmp(r) => {
                let target = ctx.read_register(r.a)?;
                ctx.jump(target)
            }
            Callr(r) => {
                let target = ctx.read_register(r.a)?;
                let pc = ctx.pc();
                ctx.jump(target)?;
                ctx.write_register(RETURN_ADDRESS, pc.wrapping_add(4))
            }
            Ret(_) => {
                let target = ctx.read_register(RETURN_ADDRESS)?;
                ctx.jump(target)
            }
            Nextpc(r) => {
                let pc = ctx.pc();
                ctx.write_register(r.c, pc.wrapping_add(4))
            }
        }
    }
}
