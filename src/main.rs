use lcc::driver::{self, Options};
use lcc::target::Target;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "lcc", about = "Ahead-of-time compiler for the .lc language")]
struct Opt {
    /// The source file to compile
    #[structopt(parse(from_os_str))]
    input: std::path::PathBuf,
    /// Executable output path (defaults to the input name without extension)
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output: Option<std::path::PathBuf>,
    /// Keep the generated assembly file
    #[structopt(short = "S", long = "keep-asm")]
    keep_asm: bool,
    /// Print phase-by-phase progress
    #[structopt(short = "v", long = "verbose")]
    verbose: bool,
    /// Target architecture: x86_64, arm64 or arm32 (aliases accepted)
    #[structopt(long = "target", parse(try_from_str = parse_target))]
    target: Option<Target>,
}

fn parse_target(name: &str) -> Result<Target, String> {
    Target::from_name(name).ok_or_else(|| {
        format!(
            "unknown target `{}` (expected x86_64, arm64 or arm32)",
            name
        )
    })
}

fn main() {
    if let Err(ref e) = run() {
        eprintln!("lcc: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), driver::CompileError> {
    let opt = Opt::from_args();
    if opt.verbose {
        tracing_subscriber::fmt()
            .without_time()
            .with_max_level(tracing::Level::INFO)
            .init();
    }
    driver::compile(&Options {
        input: opt.input,
        output: opt.output,
        keep_asm: opt.keep_asm,
        target: opt.target,
    })?;
    Ok(())
}
