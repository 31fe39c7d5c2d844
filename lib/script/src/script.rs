//! A line-oriented command language for driving a [`Machine`] by hand or from test files.
//!
//! ```text
//! int 1        # allocate Integer(1) and push it
//! int 2
//! pair         # pop 2 and 1, push (1 . 2)
//! collect      # prints "Collected 0 objects, 3 remaining."
//! ```

use std::{cell::RefCell, fmt::Display, io::Write, rc::Rc};

use gc::{CollectionReport, ObjectRef};
use itertools::Itertools;
use vm::{Machine, MachineConfig};

mod command;
pub use command::{Command, Keyword};

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
#[error("error (l. {line}): {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub struct ParseErrors(pub Vec<ParseError>);

impl Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().map(|e| e.to_string()).join("\n"))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("{0}")]
    ParseError(#[from] ParseErrors),
    #[error("[line {line}] {message}")]
    RuntimeError { line: usize, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn runtime(line: usize) -> impl Fn(vm::Error) -> RunError {
    move |error| RunError::RuntimeError { line, message: error.to_string() }
}

/// Parses a whole script, reporting every malformed line at once.
pub fn parse(source: &str) -> Result<Vec<(usize, Command)>, ParseErrors> {
    let mut commands = Vec::new();
    let mut errors = Vec::new();

    for (i, line) in source.lines().enumerate() {
        match Command::parse(line) {
            Ok(Some(command)) => commands.push((i + 1, command)),
            Ok(None) => {}
            Err(message) => errors.push(ParseError { line: i + 1, message }),
        }
    }

    if errors.is_empty() {
        Ok(commands)
    } else {
        Err(ParseErrors(errors))
    }
}

/// Runs `source` on a fresh machine and tears it down afterwards, even if the script failed.
pub fn run(source: &str, config: MachineConfig, output: &mut impl Write) -> Result<(), RunError> {
    let mut runner = Runner::new(config);
    let result = runner.run_source(source, output);
    runner.finish(output)?;
    result
}

fn flush_reports(
    reports: &RefCell<Vec<CollectionReport>>,
    output: &mut impl Write,
) -> std::io::Result<()> {
    for report in reports.borrow_mut().drain(..) {
        writeln!(output, "{report}")?;
    }
    Ok(())
}

#[derive(Debug)]
pub struct Runner {
    machine: Machine,
    reports: Rc<RefCell<Vec<CollectionReport>>>,
}

impl Runner {
    pub fn new(config: MachineConfig) -> Self {
        let mut machine = Machine::with_config(config);
        let reports = Rc::new(RefCell::new(Vec::new()));

        let sink = reports.clone();
        machine.on_collection(move |report| {
            log::info!("{report}");
            sink.borrow_mut().push(*report);
        });

        Self { machine, reports }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Runs every command of `source` against the same machine. Collection reports are
    /// written to `output` as they happen. Stops at the first runtime error.
    pub fn run_source(&mut self, source: &str, output: &mut impl Write) -> Result<(), RunError> {
        let commands = parse(source)?;

        for (line, command) in commands {
            let result = self.execute(line, command, output);
            flush_reports(&self.reports, output)?;
            result?;
        }

        Ok(())
    }

    /// Destroys the machine, writing the final collection report.
    pub fn finish(self, output: &mut impl Write) -> Result<CollectionReport, RunError> {
        let report = self.machine.destroy();
        flush_reports(&self.reports, output)?;
        Ok(report)
    }

    fn root(&self, line: usize, slot: usize) -> Result<ObjectRef, RunError> {
        self.machine.stack().get(slot).ok_or_else(|| RunError::RuntimeError {
            line,
            message: format!("no root at slot {slot}"),
        })
    }

    fn child(&self, line: usize, slot: Option<usize>) -> Result<Option<ObjectRef>, RunError> {
        slot.map(|slot| self.root(line, slot)).transpose()
    }

    fn execute(
        &mut self,
        line: usize,
        command: Command,
        output: &mut impl Write,
    ) -> Result<(), RunError> {
        log::trace!("[line {line}] {command:?}");

        match command {
            Command::Int(value) => {
                self.machine.push_int(value).map_err(runtime(line))?;
            }
            Command::Pair => {
                self.machine.push_pair().map_err(runtime(line))?;
            }
            Command::Pop => {
                self.machine.pop_root().map_err(runtime(line))?;
            }
            Command::Push(slot) => {
                let root = self.root(line, slot)?;
                self.machine.push_root(root).map_err(runtime(line))?;
            }
            Command::SetFirst { pair, child } => {
                let (pair, child) = (self.root(line, pair)?, self.child(line, child)?);
                self.machine.set_first(pair, child).map_err(runtime(line))?;
            }
            Command::SetSecond { pair, child } => {
                let (pair, child) = (self.root(line, pair)?, self.child(line, child)?);
                self.machine.set_second(pair, child).map_err(runtime(line))?;
            }
            Command::Collect => {
                self.machine.collect();
            }
            Command::Print => {
                let top = self.machine.peek_root(0).map_err(runtime(line))?;
                writeln!(output, "{}", self.machine.resolve(top))?;
            }
            Command::Stats => {
                writeln!(
                    output,
                    "live {}, threshold {}, {}",
                    self.machine.live_count(),
                    self.machine.collection_threshold(),
                    self.machine.stats()
                )?;
            }
            Command::Clear => self.machine.clear_roots(),
        }

        Ok(())
    }
}
