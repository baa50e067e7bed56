//! ppc-irdump: compile code groups from a raw PowerPC image and print
//! the generated IR.
//!
//! The image is loaded big-endian at `--base`; each `--start` address
//! is compiled as one group in real mode and dumped, one guest
//! instruction header per `---- 0x...` line.

use std::env;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::process;

use drc_core::dump::dump_ops_with;
use ppc_exec::{Bus, NoTlb, Processor};
use ppc_frontend::cpu::{mode, msr};
use ppc_frontend::{DrcConfig, DrcOptions, Flavor};

struct Args {
    image: String,
    base: u32,
    starts: Vec<u32>,
    flavor: Flavor,
    little_endian: bool,
    fast: bool,
    output: Option<String>,
}

const USAGE: &str = "\
usage: ppc-irdump <image> [options]

Options:
  --base <hex>       Load address of the image (default: 0)
  --start <hex>      Group start address, repeatable (default: base)
  --flavor <name>    403, 601, 603 or 604 (default: 604)
  --le               Compile in little-endian mode
  --fast             First-word checksums, unrounded singles
  -o <file>          Output to file
  -h, --help         Show this help";

fn parse_hex(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x");
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hex address '{s}': {e}"))
}

fn parse_flavor(s: &str) -> Result<Flavor, String> {
    match s {
        "403" => Ok(Flavor::Ppc403),
        "601" => Ok(Flavor::Ppc601),
        "603" => Ok(Flavor::Ppc603),
        "604" => Ok(Flavor::Ppc604),
        _ => Err(format!("unknown flavor '{s}'")),
    }
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut it = args.iter().skip(1);
    let image = match it.next() {
        Some(a) if a != "-h" && a != "--help" => a.clone(),
        _ => return Err(USAGE.to_string()),
    };
    let mut a = Args {
        image,
        base: 0,
        starts: Vec::new(),
        flavor: Flavor::Ppc604,
        little_endian: false,
        fast: false,
        output: None,
    };
    while let Some(opt) = it.next() {
        let mut value = || it.next().cloned().ok_or_else(|| format!("{opt} needs a value"));
        match opt.as_str() {
            "--base" => a.base = parse_hex(&value()?)?,
            "--start" => a.starts.push(parse_hex(&value()?)?),
            "--flavor" => a.flavor = parse_flavor(&value()?)?,
            "--le" => a.little_endian = true,
            "--fast" => a.fast = true,
            "-o" => a.output = Some(value()?),
            "-h" | "--help" => return Err(USAGE.to_string()),
            other => return Err(format!("unknown option: {other}")),
        }
    }
    if a.starts.is_empty() {
        a.starts.push(a.base);
    }
    Ok(a)
}

/// Read-only flat memory holding the image.
struct ImageBus {
    base: u32,
    data: Vec<u8>,
}

impl ImageBus {
    fn byte(&self, addr: u32) -> u8 {
        addr.checked_sub(self.base)
            .and_then(|off| self.data.get(off as usize))
            .copied()
            .unwrap_or(0)
    }
}

impl Bus for ImageBus {
    fn read(&mut self, addr: u32, size: u32) -> u64 {
        (0..size).fold(0, |acc, k| (acc << 8) | self.byte(addr.wrapping_add(k)) as u64)
    }

    fn write(&mut self, _addr: u32, _size: u32, _value: u64) {}

    fn is_mapped(&self, addr: u32) -> bool {
        addr.checked_sub(self.base)
            .is_some_and(|off| (off as usize) < self.data.len())
    }

    fn is_writable(&self, _addr: u32) -> bool {
        false
    }
}

fn run(args: Args) -> Result<(), String> {
    let data = fs::read(&args.image).map_err(|e| format!("failed to read {}: {e}", args.image))?;
    log::debug!("image: {} bytes at 0x{:08x}", data.len(), args.base);

    let bus = ImageBus {
        base: args.base,
        data: data.clone(),
    };
    let config = DrcConfig {
        options: if args.fast { DrcOptions::FAST } else { DrcOptions::DEFAULT },
        ..DrcConfig::DEFAULT
    };
    let flavor = args.flavor;
    let mut cpu = Processor::new(flavor, flavor.default_caps(), 1, None, bus, NoTlb, config);
    let (m, msr_bits) = if args.little_endian {
        (mode::LE, msr::LE)
    } else {
        (0, 0)
    };

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => {
            let f = fs::File::create(path).map_err(|e| format!("cannot create {path}: {e}"))?;
            Box::new(BufWriter::new(f))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let word_at = |pc: u32| -> Option<u32> {
        // Little-endian fetches swap words within each doubleword.
        let phys = if args.little_endian { pc ^ 4 } else { pc };
        let off = phys.checked_sub(args.base)? as usize;
        let bytes = data.get(off..off + 4)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    };

    for (n, &pc) in args.starts.iter().enumerate() {
        let state = cpu.state_mut();
        state.msr = msr_bits;
        state.mode = m;
        state.pc = pc;
        cpu.compile_current().map_err(|e| format!("compile of {m}:{pc:08x} failed: {e}"))?;
        log::info!(
            "group #{n} @ {m}:{pc:08x}: {} IR ops",
            cpu.drc().last_unit().ops().len()
        );

        let io_err = |e: io::Error| format!("write failed: {e}");
        writeln!(out, "group #{n} @ {m}:{pc:08x}").map_err(io_err)?;
        dump_ops_with(cpu.drc().last_unit(), &mut out, |pc, w| match word_at(pc) {
            Some(word) => write!(w, "  {word:08x}"),
            None => Ok(()),
        })
        .map_err(io_err)?;
        writeln!(out).map_err(io_err)?;
    }
    out.flush().map_err(|e| format!("flush failed: {e}"))?;

    let stats = cpu.stats();
    eprintln!(
        "{} group(s): {} units, {}/{} cache used, {} hash entries",
        args.starts.len(),
        stats.units,
        stats.used,
        stats.capacity,
        stats.hash_entries
    );
    Ok(())
}

fn main() {
    env_logger::init();
    let argv: Vec<String> = env::args().collect();
    let result = parse_args(&argv).and_then(run);
    if let Err(msg) = result {
        eprintln!("{msg}");
        process::exit(1);
    }
}
