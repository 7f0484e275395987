//! PIT Validate - CLI Entry Point
//!
//! Commands:
//! - `pit-validate replay <trace>` - Check a recorded trace against the model
//! - `pit-validate run <trace>` - Run a trace's events through the model only
//! - `pit-validate selftest` - Built-in model checks

use clap::{Parser, Subcommand};
use pit::harness::{load_trace, record, save_trace, Checker, Trace, Verdict};
use pit::pit::{count, AccessMode, Channel, Pit, PitType, TimerMode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pit-validate")]
#[command(version = "0.1.0")]
#[command(about = "A cycle-accurate 8253/8254 timer model for validating real silicon")]
struct Cli {
    /// Log model activity (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a trace's recorded observations against the model
    Replay {
        /// Path to the trace JSON file
        trace: String,
        /// Silicon variant (8253 or 8254), overriding the trace's own
        #[arg(long)]
        variant: Option<PitType>,
    },
    /// Run a trace's events through the model and print what it does
    Run {
        /// Path to the trace JSON file
        trace: String,
        /// Silicon variant (8253 or 8254), overriding the trace's own
        #[arg(long)]
        variant: Option<PitType>,
        /// Write the trace back out annotated with the model's values
        #[arg(short, long)]
        save: Option<String>,
    },
    /// Run the built-in self-test
    Selftest,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Replay { trace, variant }) => {
            replay_trace(&trace, variant);
        }
        Some(Commands::Run { trace, variant, save }) => {
            run_trace(&trace, variant, save);
        }
        Some(Commands::Selftest) => {
            run_self_test();
        }
        None => {
            println!("PIT Validate v0.1.0");
            println!("A cycle-accurate 8253/8254 timer model");
            println!();
            println!("Use --help for available commands");
            println!();
            demo_rate_generator();
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn open_trace(path: &str) -> Trace {
    match load_trace(path) {
        Ok(trace) => {
            println!("📂 Loaded {} steps for {}", trace.len(), trace.variant);
            if !trace.description.is_empty() {
                println!("   {}", trace.description);
            }
            trace
        }
        Err(e) => {
            eprintln!("❌ Failed to load trace: {}", e);
            std::process::exit(1);
        }
    }
}

fn replay_trace(path: &str, variant: Option<PitType>) {
    let trace = open_trace(path);
    let variant = variant.unwrap_or(trace.variant);

    println!();
    println!("━━━ Replay ({}) ━━━", variant);

    let mut checker = Checker::new(variant);
    for step in &trace.steps {
        let index = checker.step();
        match checker.check(&step.event, &step.observed) {
            Ok(Verdict::Match) => println!("{:>6}  {:<14} ok", index, step.event.to_string()),
            Ok(Verdict::Inconclusive) => {
                println!("{:>6}  {:<14} ? (count undefined)", index, step.event.to_string())
            }
            Err(e) => {
                tracing::error!(%e, "unexpected divergence");
                println!("{:>6}  {:<14} ✗", index, step.event.to_string());
                println!();
                print!("{}", checker.model());
                eprintln!("❌ {}", e);
                std::process::exit(1);
            }
        }
    }

    let tally = checker.tally();
    println!();
    println!("━━━ Result ━━━");
    println!("Matched:      {}", tally.matched);
    println!("Inconclusive: {}", tally.inconclusive);
    println!("Divergent:    0");
}

fn run_trace(path: &str, variant: Option<PitType>, save: Option<String>) {
    let trace = open_trace(path);
    let variant = variant.unwrap_or(trace.variant);

    println!();
    println!("━━━ Model run ({}) ━━━", variant);

    let mut recorded = record(variant, trace.events().copied());
    for (index, step) in recorded.steps.iter().enumerate() {
        let outs: String = step
            .observed
            .outputs
            .iter()
            .map(|o| match o {
                Some(true) => '1',
                Some(false) => '0',
                None => '-',
            })
            .collect();
        match step.observed.byte {
            Some(byte) => println!(
                "{:>6}  {:<14} out={}  -> {:02X}",
                index,
                step.event.to_string(),
                outs,
                byte
            ),
            None => println!("{:>6}  {:<14} out={}", index, step.event.to_string(), outs),
        }
    }

    if let Some(out_path) = save {
        recorded.description = trace.description.clone();
        if let Err(e) = save_trace(&recorded, &out_path) {
            eprintln!("❌ Failed to save trace: {}", e);
            std::process::exit(1);
        }
        println!();
        println!("✓ Saved to {}", out_path);
    }
}

fn demo_rate_generator() {
    println!("━━━ Rate Generator Demo ━━━");
    println!("Channel 0, mode 2, reload 4, gate high");
    println!();

    let mut pit = Pit::new(PitType::Model8254);
    pit.set_gate(0, true);
    pit.set_mode_byte(0b00_01_010_0);
    pit.write_data(0, 4);

    for tick in 1..=10 {
        pit.tick();
        let ch = pit.channel(0);
        println!(
            "tick {:>2}  count={}  out={}",
            tick,
            ch.counting_element(),
            if ch.output() { "HI" } else { "lo" }
        );
    }

    println!();
    println!("Output drops for one tick at count 1, then the counter reloads.");
}

fn run_self_test() {
    println!("━━━ PIT Model Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;
    let mut report = |name: &str, ok: bool| {
        print!("{}... ", name);
        if ok { println!("✓"); passed += 1; }
        else { println!("✗"); failed += 1; }
    };

    // Test 1: Mode set forces output level
    let mut ok = true;
    for mode in TimerMode::ALL {
        let mut ch = Channel::new(0, PitType::Model8254);
        ch.set_mode(AccessMode::Lsb, mode, false);
        ok &= ch.output() == mode.initial_output() && ch.counting_element() == 0;
    }
    report("Mode set forces output level", ok);

    // Test 2: Interrupt on terminal count
    let mut ch = Channel::new(0, PitType::Model8253);
    ch.set_mode(AccessMode::Lsb, TimerMode::InterruptOnTerminalCount, false);
    ch.write_count(0x20);
    ch.tick();
    ch.set_gate(true);
    let mut ok = ch.read_count() == 0x20;
    for k in 1..=0x20u16 {
        ch.tick();
        ok &= ch.read_count() == 0x20 - k && ch.output() == (k == 0x20);
    }
    report("Interrupt on terminal count", ok);

    // Test 3: Rate generator period
    let mut ch = Channel::new(0, PitType::Model8253);
    ch.set_gate(true);
    ch.set_mode(AccessMode::Lsb, TimerMode::RateGenerator, false);
    ch.write_count(5);
    ch.tick();
    let mut lows = 0;
    for _ in 0..50 {
        ch.tick();
        if !ch.output() {
            lows += 1;
        }
    }
    report("Rate generator pulses once per period", lows == 10);

    // Test 4: Square wave even reload
    let mut ch = Channel::new(0, PitType::Model8254);
    ch.set_gate(true);
    ch.set_mode(AccessMode::Lsb, TimerMode::SquareWaveGenerator, false);
    ch.write_count(10);
    ch.tick();
    let mut toggles = Vec::new();
    let mut level = ch.output();
    for t in 1..=40 {
        ch.tick();
        if ch.output() != level {
            toggles.push(t);
            level = ch.output();
        }
    }
    report("Square wave toggles every N/2", toggles == [5, 10, 15, 20, 25, 30, 35, 40]);

    // Test 5: BCD borrow
    report(
        "BCD wrap and borrow",
        count::count(0x0000, true) == 0x9999 && count::count(0x1000, true) == 0x0999,
    );

    // Test 6: BCD channel counts like decimal
    let mut ch = Channel::new(0, PitType::Model8253);
    ch.set_gate(true);
    ch.set_mode(AccessMode::LsbMsb, TimerMode::InterruptOnTerminalCount, true);
    ch.write_count(count::decimal_to_bcd(1000));
    ch.tick();
    let mut ok = true;
    for k in 1..=1000u16 {
        ch.tick();
        ok &= count::bcd_to_decimal(ch.read_count()) == Some(1000 - k);
    }
    report("BCD channel counts like decimal", ok);

    // Test 7: Latch idempotence
    let mut ch = Channel::new(0, PitType::Model8254);
    ch.set_gate(true);
    ch.set_mode(AccessMode::LsbMsb, TimerMode::InterruptOnTerminalCount, false);
    ch.write_count(0x1234);
    ch.tick();
    ch.latch();
    ch.tick();
    ch.latch();
    report("Latch idempotence", ch.count_latch() == Some(0x1234));

    // Test 8: Two-byte round trip
    let mut ch = Channel::new(0, PitType::Model8253);
    ch.set_mode(AccessMode::LsbMsb, TimerMode::InterruptOnTerminalCount, false);
    ch.send_reload_byte(0xEF);
    ch.send_reload_byte(0xBE);
    ch.tick();
    ch.latch();
    let lsb = ch.read_byte();
    let msb = ch.read_byte();
    report("LSB/MSB round trip", lsb == 0xEF && msb == 0xBE);

    // Test 9: Undefined window
    let mut ch = Channel::new(0, PitType::Model8254);
    ch.set_mode(AccessMode::Lsb, TimerMode::HardwareTriggeredStrobe, false);
    ch.write_count(0x40);
    let before = ch.is_count_undefined();
    ch.tick();
    report("Undefined count before trigger", !before && ch.is_count_undefined());

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
