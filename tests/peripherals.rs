mod common;

use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::{boot, run, step};
use dcpu16_rs::decoder::Register::{A, B, C};
use dcpu16_rs::devices::{Clock, Console};
use dcpu16_rs::{assemble, BusError, DeviceCtx, HaltReason, Line, Peripheral, StepOutcome};
use pretty_assertions::assert_eq;

#[derive(Clone, Default)]
struct Sink(Arc<Mutex<Vec<u8>>>);

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read(u16),
    Write(u16, u16),
}

/// Logs every access on its line and answers reads with `reply + offset`.
struct Recorder {
    log: Arc<Mutex<Vec<Access>>>,
    reply: u16,
}

impl Recorder {
    fn new(reply: u16) -> (Self, Arc<Mutex<Vec<Access>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (Self { log: Arc::clone(&log), reply }, log)
    }
}

impl Peripheral for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_read(&mut self, offset: u16, _ctx: &mut DeviceCtx<'_>) -> u16 {
        self.log.lock().unwrap().push(Access::Read(offset));
        self.reply + offset
    }

    fn on_write(&mut self, offset: u16, new: u16, _old: u16, _ctx: &mut DeviceCtx<'_>) {
        self.log.lock().unwrap().push(Access::Write(offset, new));
    }
}

/// Keeps the opcode of every tick along with the word at 0x0100 at that moment.
struct TickCounter(Arc<Mutex<Vec<(u16, u16)>>>);

impl Peripheral for TickCounter {
    fn on_tick(&mut self, opcode: u16, ctx: &mut DeviceCtx<'_>) {
        self.0.lock().unwrap().push((opcode, ctx.read_ram(0x0100)));
    }
}

fn line(i: u8) -> Option<Line> {
    Line::new(i)
}

#[test]
fn second_claim_on_a_line_fails() {
    let mut cpu = boot("HCF 0");
    cpu.attach(Box::new(Clock::new()), line(1)).unwrap();
    let err = cpu.attach(Box::new(Clock::new()), line(1)).unwrap_err();
    assert_eq!(
        err,
        BusError::LineClaimed { line: Line::new(1).unwrap(), owner: "clock".into() }
    );
    // devices without a line never conflict
    cpu.attach(Box::new(Clock::new()), None).unwrap();
    cpu.attach(Box::new(Clock::new()), None).unwrap();
}

#[test]
fn detach_frees_the_line_and_is_idempotent() {
    let mut cpu = boot("HCF 0");
    let id = cpu.attach(Box::new(Clock::new()), line(3)).unwrap();
    assert!(cpu.detach(id).is_some());
    assert!(cpu.detach(id).is_none());
    assert!(!cpu.bus().is_claimed(Line::new(3).unwrap()));
    cpu.attach(Box::new(Clock::new()), line(3)).unwrap();
}

#[test]
fn lines_are_isolated() {
    let mut cpu = boot(
        "SET [0x2000], 7
SET A, [0x3004]
ADD [0x2001], 1
SET [0x3000], A
SET B, [0x2002]
SET [0x4000], 9
HCF",
    );
    let (two, two_log) = Recorder::new(0x200);
    let (three, three_log) = Recorder::new(0x300);
    cpu.attach(Box::new(two), line(2)).unwrap();
    cpu.attach(Box::new(three), line(3)).unwrap();
    run(&mut cpu, 100);

    assert_eq!(
        *two_log.lock().unwrap(),
        vec![Access::Write(0, 7), Access::Read(1), Access::Write(1, 0x202), Access::Read(2)]
    );
    assert_eq!(
        *three_log.lock().unwrap(),
        vec![Access::Read(4), Access::Write(0, 0x304)]
    );
    // device writes never reach RAM, unclaimed lines still do
    assert_eq!((cpu.peek(0x2000), cpu.peek(0x3000)), (0, 0));
    assert_eq!(cpu.peek(0x4000), 9);
    assert_eq!((cpu.reg(A), cpu.reg(B)), (0x304, 0x202));
}

#[test]
fn ticks_follow_executed_instructions_only() {
    let src = "SET [0x100], 9
IAS handler
IFE A, 2
SET C, 0x100
INT 5
HCF
handler: HCF";
    let words = assemble(src).unwrap().words;
    let ticks = Arc::new(Mutex::new(Vec::new()));
    let mut cpu = boot(src);
    cpu.attach(Box::new(TickCounter(Arc::clone(&ticks))), None).unwrap();
    let count = |t: &Arc<Mutex<Vec<(u16, u16)>>>| t.lock().unwrap().len();

    for _ in 0..3 {
        assert!(matches!(step(&mut cpu), StepOutcome::Executed { .. }));
    }
    assert_eq!(count(&ticks), 3);
    assert_eq!(step(&mut cpu), StepOutcome::Skipped { addr: 5 });
    assert_eq!(count(&ticks), 3);
    assert_eq!(cpu.reg(C), 0);
    assert!(matches!(step(&mut cpu), StepOutcome::Executed { addr: 7, .. }));
    assert_eq!(step(&mut cpu), StepOutcome::Interrupt { msg: 5 });
    assert_eq!(count(&ticks), 4);
    let summary = run(&mut cpu, 10);
    assert_eq!(summary.halt, Some(HaltReason::Hcf { pc: 9 }));

    // the store from the first instruction is already visible at its own tick
    assert_eq!(
        *ticks.lock().unwrap(),
        vec![(words[0], 9), (words[2], 9), (words[4], 9), (words[7], 9), (words[9], 9)]
    );
}

#[test]
fn clock_posts_its_message() {
    let mut cpu = boot(
        "IAS handler\nSET [0x1001], 7\nSET [0x1000], 5\n:spin SET PC, spin\n:handler SET B, A\nHCF 0",
    );
    cpu.attach(Box::new(Clock::new()), line(1)).unwrap();
    let summary = run(&mut cpu, 100);
    assert!(matches!(summary.halt, Some(HaltReason::Hcf { .. })));
    assert_eq!(cpu.reg(B), 7);
    assert!(cpu.read(0x1002) >= 1);
}

#[test]
fn clock_wait_burns_cycles() {
    let mut cpu = boot("SET [0x1003], 100\nHCF 0");
    cpu.attach(Box::new(Clock::new()), line(1)).unwrap();
    run(&mut cpu, 1);
    assert_eq!(cpu.cycles(), 100 + 3);
}

#[test]
fn console_writes_low_bytes() {
    let sink = Sink::default();
    let mut cpu = boot("SET [0x2000], 'h'\nSET [0x2000], 0x169\nHCF 0");
    cpu.attach(Box::new(Console::new(sink.clone())), line(2)).unwrap();
    run(&mut cpu, 100);
    assert_eq!(sink.0.lock().unwrap().as_slice(), b"hi");
    assert_eq!(cpu.peek(0x2000), 0);
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn console_reads_buffered_input() {
    let mut cpu = boot("SET A, [0x2001]\nSET B, [0x2001]\nSET C, [0x2001]\nHCF 0");
    let console = Console::new(io::sink()).with_input(Cursor::new(b"ok".to_vec()));
    let id = cpu.attach(Box::new(console), line(2)).unwrap();
    assert!(wait_for(|| cpu.read(0x2002) == 2));
    run(&mut cpu, 100);
    assert_eq!((cpu.reg(A), cpu.reg(B), cpu.reg(C)), (b'o' as u16, b'k' as u16, 0));
    assert!(cpu.detach(id).is_some());
}

#[test]
fn console_input_is_bounded() {
    let mut cpu = boot("HCF 0");
    let console = Console::new(io::sink())
        .with_capacity(4)
        .with_input(Cursor::new(vec![b'x'; 64]));
    let id = cpu.attach(Box::new(console), line(2)).unwrap();
    assert!(wait_for(|| cpu.read(0x2002) == 4));
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(cpu.read(0x2002), 4);
    // the reader is parked waiting for room; detaching releases it
    assert!(cpu.detach(id).is_some());
}

struct Failing;

impl Read for Failing {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "boom"))
    }
}

#[test]
fn console_reader_errors_reach_the_listener() {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let console = Console::new(io::sink())
        .with_input(Failing)
        .on_error(move |e| {
            let _ = tx.lock().unwrap().send(e.to_string());
        });
    let mut cpu = boot("HCF 0");
    cpu.attach(Box::new(console), line(2)).unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "boom");
    assert_eq!(cpu.read(0x2002), 0);
}

#[test]
fn shared_halt_flag_stops_the_run() {
    let mut cpu = boot(":spin SET PC, spin");
    let halt = cpu.halt_handle();
    halt.store(true, Ordering::SeqCst);
    let summary = run(&mut cpu, 1000);
    assert_eq!(summary.steps, 0);
    assert_eq!(summary.halt, Some(HaltReason::Requested));
}
