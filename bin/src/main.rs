use std::{
    io::{stdin, stdout, Write},
    path::PathBuf,
};

use clap::Parser;

use script::Runner;
use vm::{MachineConfig, STACK_SIZE};

#[derive(clap::Parser)]
struct Args {
    /// Script to run. Starts an interactive prompt when omitted.
    file: Option<PathBuf>,
    /// Capacity of the root stack.
    #[arg(long, default_value_t = STACK_SIZE)]
    stack_size: usize,
    /// Live-object count that triggers the first collection.
    #[arg(long, default_value_t = gc::DEFAULT_THRESHOLD)]
    initial_threshold: usize,
    /// Refuse to hold more than this many live objects.
    #[arg(long)]
    heap_limit: Option<usize>,
}

impl Args {
    fn config(&self) -> MachineConfig {
        MachineConfig::default()
            .with_root_capacity(self.stack_size)
            .with_initial_threshold(self.initial_threshold)
            .with_heap_limit(self.heap_limit)
    }
}

fn run_file(path: PathBuf, config: MachineConfig) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(path)?;
    script::run(&source, config, &mut stdout())?;
    Ok(())
}

fn run_prompt(config: MachineConfig) -> anyhow::Result<()> {
    let mut runner = Runner::new(config);
    loop {
        print!("> ");
        stdout().flush()?;
        let mut line = String::new();
        if stdin().read_line(&mut line)? == 0 {
            break;
        }
        if let Err(e) = runner.run_source(&line, &mut stdout()) {
            println!("{e}");
        }
    }
    println!();
    runner.finish(&mut stdout())?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = args.config();
    log::debug!("Running with {config:?}");

    match args.file {
        Some(file) => run_file(file, config),
        None => run_prompt(config),
    }
}
