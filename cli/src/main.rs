//! Command line tool for building, dumping and probing splash tables

use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use rand::{rngs::StdRng, Rng, SeedableRng};
use splash::{ProbeOption, SplashTable, SplashTableBuilder};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
    registry::Registry,
};

macro_rules! die {
    ($fmt:literal, $($arg:tt)*) => {{
        eprintln!($fmt, $($arg)*);
        std::process::exit(1);
    }};

    ($msg:literal) => {{
        eprintln!($msg);
        std::process::exit(1);
    }};
}

use tracing::{debug, info, warn};

fn init_tracing(quiet: bool, verbose: u8) -> LevelFilter {
    let level_filter = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    // The splash library logs through the log crate
    if tracing_log::LogTracer::init().is_err() {
        die!("INTERNAL ERROR: setting log tracer failed");
    }

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("SPLASH_LOG")
        .from_env_lossy();

    let subscriber = Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact(),
    );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        die!("INTERNAL ERROR: setting default tracing::subscriber failed");
    }

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing_panic::panic_hook(info);
        prev_hook(info);
    }));

    level_filter
}

/// Build, dump and probe splash tables
#[derive(Parser, Debug)]
#[command(name = "splash", version)]
#[command(about = "Build, dump and probe splash tables")]
struct ToolArgs {
    /// Suppress all output except for errors. This overrides the -v flag.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Turn on verbose output. Supply -v multiple times to increase verbosity.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(Subcommand, Debug, Clone)]
enum ToolCommand {
    /// Insert "key value" lines into a new table, stopping at the first failed insert
    Build {
        /// Number of hash functions
        #[arg(short = 'H', long = "hashes", value_name = "N")]
        num_hashes: usize,

        /// Entries per bucket (a power of two)
        #[arg(short, long, value_name = "N")]
        bucket_size: usize,

        /// Base 2 logarithm of the total number of entries
        #[arg(short = 'S', long, value_name = "BITS")]
        log2_capacity: u32,

        /// Largest number of displacements per insert
        #[arg(short = 'r', long, value_name = "N")]
        max_reinserts: u32,

        /// Seed for hash multipliers and eviction choices
        #[arg(long)]
        seed: Option<u64>,

        /// Write a dump of the table to FILE ("-" for stdout)
        #[arg(long, value_name = "FILE")]
        dump: Option<PathBuf>,

        /// Input file of "key value" lines (stdin if omitted or "-")
        input: Option<PathBuf>,
    },
    /// Look up keys read from stdin in a dumped table
    Probe {
        /// Probe implementation to use
        #[arg(long, value_enum, default_value_t = Backend::Auto)]
        backend: Backend,

        /// Print "key value" for hits only, instead of one value per key
        #[arg(long)]
        hits_only: bool,

        /// Table dump to load
        dumpfile: PathBuf,
    },
    /// Print N lines of "x x" with random x
    Randomize {
        /// Number of lines
        count: u64,

        /// Seed for the generator
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    /// Portable scalar probe
    Scalar,
    /// SIMD probe; fails unless the table has 2 hashes and 4-entry buckets
    Vector,
    /// SIMD probe when possible, scalar otherwise
    Auto,
}

impl From<Backend> for ProbeOption {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Scalar => ProbeOption::ScalarOnly,
            Backend::Vector => ProbeOption::VectorOnly,
            Backend::Auto => ProbeOption::TryVector,
        }
    }
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn open_input(path: Option<&Path>) -> Box<dyn BufRead> {
    match path {
        Some(path) if !is_stdio(path) => {
            let file = File::open(path)
                .unwrap_or_else(|e| die!("Could not open {}: {}", path.display(), e));
            Box::new(BufReader::new(file))
        }
        _ => Box::new(io::stdin().lock()),
    }
}

fn parse_pair(line: &str) -> Option<(u32, u32)> {
    let mut fields = line.split_ascii_whitespace();
    let key = fields.next()?.parse().ok()?;
    let value = fields.next()?.parse().ok()?;
    fields.next().is_none().then_some((key, value))
}

fn write_dump(table: &SplashTable, path: &Path) {
    let result = if is_stdio(path) {
        table.dump_into(BufWriter::new(io::stdout().lock()))
    } else {
        File::create(path).and_then(|file| table.dump_into(BufWriter::new(file)))
    };
    if let Err(e) = result {
        die!("Error writing dump to {}: {}", path.display(), e);
    }
    debug!("wrote dump to {}", path.display());
}

#[allow(clippy::too_many_arguments)]
fn build(
    num_hashes: usize,
    bucket_size: usize,
    log2_capacity: u32,
    max_reinserts: u32,
    seed: Option<u64>,
    dump: Option<&Path>,
    input: Option<&Path>,
) {
    let mut builder = SplashTableBuilder::new();
    builder
        .num_hashes(num_hashes)
        .bucket_size(bucket_size)
        .log2_capacity(log2_capacity)
        .max_reinserts(max_reinserts);
    if let Some(seed) = seed {
        builder.seed(seed);
    }
    let mut table = match builder.build() {
        Ok(table) => table,
        Err(e) => die!("Error creating table: {}", e),
    };

    for (index, line) in open_input(input).lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => die!("Error reading input: {}", e),
        };
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = parse_pair(&line) else {
            warn!("skipping input line {}: {:?} is not a key/value pair", index + 1, line);
            continue;
        };
        if let Err(e) = table.insert(key, value) {
            warn!("stopped at input line {}: {}", index + 1, e);
            break;
        }
    }

    info!(
        "placed {} entries in {} slots ({} buckets of {})",
        table.len(),
        table.capacity(),
        table.num_buckets(),
        table.bucket_size()
    );

    if let Some(path) = dump {
        write_dump(&table, path);
    }
}

fn probe(backend: Backend, hits_only: bool, dumpfile: &Path) {
    let file = match File::open(dumpfile) {
        Ok(file) => file,
        Err(e) => die!("Could not open {}: {}", dumpfile.display(), e),
    };
    let table = match SplashTableBuilder::new()
        .probe(backend.into())
        .load_from(BufReader::new(file))
    {
        Ok(table) => table,
        Err(e) => die!("Error loading {}: {}", dumpfile.display(), e),
    };
    info!(
        "loaded {} entries from {}, {:?} probe",
        table.len(),
        dumpfile.display(),
        table.backend()
    );

    let mut out = BufWriter::new(io::stdout().lock());
    for (index, line) in io::stdin().lock().lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => die!("Error reading input: {}", e),
        };
        // Only the first field is the key, so "key value" input works too
        let key = match line.split_ascii_whitespace().next() {
            Some(field) => field.parse::<u32>().ok(),
            None => continue,
        };
        let Some(key) = key else {
            warn!("skipping input line {}: {:?} is not a key", index + 1, line);
            continue;
        };

        let value = table.probe(key);
        let result = if !hits_only {
            writeln!(out, "{}", value)
        } else if value != 0 {
            writeln!(out, "{} {}", key, value)
        } else {
            Ok(())
        };
        if let Err(e) = result {
            die!("Error writing output: {}", e);
        }
    }
    if let Err(e) = out.flush() {
        die!("Error writing output: {}", e);
    }
}

fn randomize(count: u64, seed: Option<u64>) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut out = BufWriter::new(io::stdout().lock());
    for _ in 0..count {
        let x: u32 = rng.gen();
        if let Err(e) = writeln!(out, "{} {}", x, x) {
            die!("Error writing output: {}", e);
        }
    }
    if let Err(e) = out.flush() {
        die!("Error writing output: {}", e);
    }
}

fn main() {
    let args = ToolArgs::parse();
    let level_filter = init_tracing(args.quiet, args.verbose);

    let cmd = ToolArgs::command();
    info!(
        "starting {} ({} {}), log level: {level_filter}",
        cmd.get_name(),
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    match args.command {
        ToolCommand::Build {
            num_hashes,
            bucket_size,
            log2_capacity,
            max_reinserts,
            seed,
            dump,
            input,
        } => build(
            num_hashes,
            bucket_size,
            log2_capacity,
            max_reinserts,
            seed,
            dump.as_deref(),
            input.as_deref(),
        ),
        ToolCommand::Probe {
            backend,
            hits_only,
            dumpfile,
        } => probe(backend, hits_only, &dumpfile),
        ToolCommand::Randomize { count, seed } => randomize(count, seed),
    }
}
