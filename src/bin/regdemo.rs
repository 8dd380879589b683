//! Demonstrates a plain register map, a field spanning two registers, and
//! a virtual device multiplexing two physical maps.

use clap::{Parser, Subcommand};
use regcore::context::DeviceContext;
use regcore::field::FieldDesc;
use regcore::flags::Flags;
use regcore::transport::MemoryTransport;
use regcore::virtual_device::{LoadFn, VirtualDevice};
use regcore::{check, Map};

/// Drives the register and field abstraction layer through a few worked
/// examples.
#[derive(Parser)]
#[command(name = "regdemo", about = "Exercise the register abstraction layer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Set and read back a single-register field.
    Plain,
    /// Set and read back a field spanning two registers.
    Spanning,
    /// Drive a virtual device through a map reconfiguration.
    Virtual,
}

const PLAIN_MAP: Map = &[FieldDesc::new("FOO", 0, 0, 8)];

const SPANNING_MAP: Map = &[FieldDesc::new("ACROSS", 0, 28, 8)];

const VIRT_MAP1: Map = &[
    FieldDesc::new("A", 0, 0, 8),
    FieldDesc::new("B", 0, 8, 8),
    FieldDesc::new("C", 1, 0, 16),
];
const VIRT_MAP2: Map = &[
    FieldDesc::new("P", 0, 0, 8),
    FieldDesc::new("Q", 0, 8, 8).with_flags(Flags::NORESET),
    FieldDesc::new("A", 1, 0, 16),
];
const VIRT_FIELDS: &[&str] = &["A", "B", "C", "P", "Q"];
const VIRT_MAPS: &[Map] = &[VIRT_MAP1, VIRT_MAP2];

fn memory_device(reg_width: u32, reg_num: usize) -> DeviceContext {
    let transport = MemoryTransport::new(reg_num);
    let (read_fn, write_fn) = transport.callbacks();
    DeviceContext::new(reg_width, reg_num).with_transport(read_fn, write_fn)
}

fn run_plain() {
    let mut ctx = memory_device(32, 1).with_map(PLAIN_MAP);
    check(&mut ctx, PLAIN_MAP).expect("PLAIN_MAP is well-formed");

    ctx.set("FOO", 0xAB).expect("value fits FOO");
    println!("FOO = {:#x} (data[0] = {:#010x})", ctx.get("FOO"), ctx.data()[0]);
}

fn run_spanning() {
    let mut ctx = memory_device(32, 2).with_map(SPANNING_MAP);
    check(&mut ctx, SPANNING_MAP).expect("SPANNING_MAP is well-formed");

    ctx.set("ACROSS", 0xFF).expect("value fits ACROSS");
    println!(
        "ACROSS = {:#x} (data = [{:#010x}, {:#010x}])",
        ctx.get("ACROSS"),
        ctx.data()[0],
        ctx.data()[1]
    );
}

fn run_virtual() {
    let base = memory_device(16, 2);
    let load_fn: LoadFn = Box::new(|id| {
        log::info!("load_fn(id={id})");
        Ok(())
    });
    let mut dev = VirtualDevice::new(base, VIRT_FIELDS, VIRT_MAPS, load_fn);
    dev.verify().expect("candidate maps are well-formed");

    dev.adjust("A", 0xFF).unwrap();
    dev.adjust("P", 0xFF).unwrap();
    dev.adjust("Q", 0x67).unwrap();
    dev.adjust("B", 0xFF).unwrap();
    println!(
        "after first round: A={:#x} B={:#x} C={:#x} P={:#x} Q={:#x}, physical={:?}",
        dev.obtain("A"),
        dev.obtain("B"),
        dev.obtain("C"),
        dev.obtain("P"),
        dev.obtain("Q"),
        dev.base().data()
    );

    dev.adjust("A", 0xFFFF).unwrap();
    println!(
        "after reload: physical={:?} (B, C dropped from the physical side)",
        dev.base().data()
    );
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Plain => run_plain(),
        Command::Spanning => run_spanning(),
        Command::Virtual => run_virtual(),
    }
}
