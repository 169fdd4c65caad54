use crate::cpu::{Cpu, HaltReason, Place};
use crate::decoder::{Decoded, Op, Register};

/// What the step loop does after an instruction's effect is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Next,
    /// Condition failed: the following instruction runs in skip mode.
    Skip,
    Halt(HaltReason),
}

pub trait Executor {
    /// `b` is `None` for special (single operand) instructions.
    fn exec(&self, cpu: &mut Cpu, d: &Decoded, b: Option<Place>, a: Place) -> Flow;
}

fn shl64(x: u64, n: u16) -> u64 {
    if n >= 64 {
        0
    } else {
        x << n
    }
}

fn shr64(x: u64, n: u16) -> u64 {
    if n >= 64 {
        0
    } else {
        x >> n
    }
}

fn sar64(x: i64, n: u16) -> i64 {
    if n >= 64 {
        if x < 0 {
            -1
        } else {
            0
        }
    } else {
        x >> n
    }
}

fn signed(v: u16) -> i64 {
    v as i16 as i64
}

pub struct IntExecutor;

impl IntExecutor {
    fn special(&self, cpu: &mut Cpu, d: &Decoded, a: Place) -> Flow {
        match d.op {
            Op::Jsr => {
                let target = cpu.read(a.read);
                let ret = cpu.pc();
                cpu.push(ret);
                cpu.set_pc(target);
            }
            Op::Hcf => {
                return Flow::Halt(HaltReason::Hcf { pc: cpu.current() });
            }
            Op::Int => {
                let msg = cpu.read(a.read);
                cpu.interrupt(msg);
            }
            Op::Iag => {
                let ia = cpu.ia();
                cpu.write(a.write, ia);
            }
            Op::Ias => {
                let ia = cpu.read(a.read);
                cpu.set_ia(ia);
            }
            Op::Rfi => {
                cpu.set_queueing(false);
                let a_val = cpu.pop();
                cpu.set_reg(Register::A, a_val);
                let pc = cpu.pop();
                cpu.set_pc(pc);
            }
            Op::Iaq => {
                let on = cpu.read(a.read) != 0;
                cpu.set_queueing(on);
            }
            _ => unreachable!("basic opcode {:?} routed as special", d.op),
        }
        Flow::Next
    }
}

impl Executor for IntExecutor {
    fn exec(&self, cpu: &mut Cpu, d: &Decoded, b: Option<Place>, a: Place) -> Flow {
        let Some(b) = b else {
            return self.special(cpu, d, a);
        };

        // SET and the string ops never look at the destination's old value, so a device
        // behind b sees only the write.
        if matches!(d.op, Op::Set | Op::Sti | Op::Std) {
            let av = cpu.read(a.read);
            cpu.write(b.write, av);
            if d.op != Op::Set {
                let step = if d.op == Op::Sti { 1u16 } else { 0xffff };
                let i = cpu.reg(Register::I).wrapping_add(step);
                let j = cpu.reg(Register::J).wrapping_add(step);
                cpu.set_reg(Register::I, i);
                cpu.set_reg(Register::J, j);
            }
            return Flow::Next;
        }

        let bv = cpu.read(b.read);
        let av = cpu.read(a.read);

        if d.op.is_conditional() {
            let holds = match d.op {
                Op::Ifb => bv & av != 0,
                Op::Ifc => bv & av == 0,
                Op::Ife => bv == av,
                Op::Ifn => bv != av,
                Op::Ifg => bv > av,
                Op::Ifa => signed(bv) > signed(av),
                Op::Ifl => bv < av,
                Op::Ifu => signed(bv) < signed(av),
                _ => true,
            };
            return if holds { Flow::Next } else { Flow::Skip };
        }

        let ex = cpu.ex();
        let (res, new_ex): (u16, Option<u16>) = match d.op {
            Op::Add => {
                let s = bv as u32 + av as u32;
                (s as u16, Some((s >> 16) as u16))
            }
            Op::Sub => {
                let (r, borrow) = bv.overflowing_sub(av);
                (r, Some(borrow as u16))
            }
            Op::Mul => {
                let p = bv as u32 * av as u32;
                (p as u16, Some((p >> 16) as u16))
            }
            Op::Mli => {
                let p = signed(bv) * signed(av);
                (p as u16, Some((p >> 16) as u16))
            }
            Op::Div => {
                if av == 0 {
                    (0, Some(0))
                } else {
                    let frac = ((bv as u32) << 16) / av as u32;
                    (bv / av, Some(frac as u16))
                }
            }
            Op::Dvi => {
                if av == 0 {
                    (0, Some(0))
                } else {
                    let q = signed(bv) / signed(av);
                    let frac = (signed(bv) << 16) / signed(av);
                    (q as u16, Some(frac as u16))
                }
            }
            Op::Mod => (if av == 0 { 0 } else { bv % av }, None),
            Op::Mdi => {
                let r = if av == 0 { 0 } else { signed(bv) % signed(av) };
                (r as u16, None)
            }
            Op::And => (bv & av, None),
            Op::Bor => (bv | av, None),
            Op::Xor => (bv ^ av, None),
            Op::Shr => {
                let r = shr64(bv as u64, av);
                let out = shr64((bv as u64) << 16, av);
                (r as u16, Some(out as u16))
            }
            Op::Asr => {
                let r = sar64(signed(bv), av);
                let out = sar64(signed(bv) << 16, av);
                (r as u16, Some(out as u16))
            }
            Op::Shl => {
                let wide = shl64(bv as u64, av);
                (wide as u16, Some((wide >> 16) as u16))
            }
            Op::Adx => {
                let s = bv as u32 + av as u32 + ex as u32;
                (s as u16, Some(u16::from(s > 0xffff)))
            }
            Op::Sbx => {
                let s = bv as i32 - av as i32 + ex as i32;
                let out = if s < 0 {
                    0xffff
                } else if s > 0xffff {
                    1
                } else {
                    0
                };
                (s as u16, Some(out))
            }
            _ => unreachable!("special opcode {:?} routed as basic", d.op),
        };

        cpu.write(b.write, res);
        if let Some(v) = new_ex {
            cpu.set_ex(v);
        }
        Flow::Next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_shifts_do_not_panic() {
        assert_eq!(shl64(1, 200), 0);
        assert_eq!(shr64(u64::MAX, 64), 0);
        assert_eq!(sar64(-5, 100), -1);
        assert_eq!(sar64(5, 100), 0);
    }
}
