use std::io::Write;

use tracing::{info, warn};

use crate::{
    cache::IsCache,
    error::{CacheError, TraceError},
    replace::Outcome,
    trace::{Command, Record},
};

pub const INVALID_COMMAND: &str = "* * * * Warning! Invalid command received! * * * *";

#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Successful reads and writes replayed before the counters are cleared.
    /// Queries, invalid and skipped lines do not count. 0 disables warm-up.
    pub warmup: u64,
    /// Log progress every this many commands. 0 disables it.
    pub heartbeat: u64,
    /// Print `hit`/`miss` for writes.
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub commands: u64,
    pub accesses: u64,
    pub skipped: u64,
    pub invalid: u64,
}

/// Feeds decoded trace records to a cache and writes one output line per command.
pub struct Runner<W: Write> {
    out: W,
    opts: Options,
    summary: Summary,
    warmup: bool,
    next_heartbeat: u64,
}

impl<W: Write> Runner<W> {
    pub fn new(out: W, opts: Options) -> Self {
        Runner {
            out,
            opts,
            summary: Summary::default(),
            warmup: opts.warmup > 0,
            next_heartbeat: opts.heartbeat,
        }
    }

    pub fn summary(&self) -> Summary {
        self.summary
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Replays one block. Only I/O failures abort; bad lines are logged and skipped.
    pub fn operate(
        &mut self,
        cache: &mut dyn IsCache,
        block: Vec<Record>,
    ) -> Result<(), TraceError> {
        for record in block {
            match record.parsed {
                Ok(command) => self.dispatch(cache, record.line, command)?,
                Err(TraceError::Parse { line, reason }) => {
                    warn!(line, %reason, "skipping malformed line");
                    self.summary.skipped += 1;
                }
                Err(e) => return Err(e),
            }
            self.summary.commands += 1;

            if self.opts.heartbeat != 0 && self.summary.commands >= self.next_heartbeat {
                info!(commands = self.summary.commands, "progress");
                self.next_heartbeat += self.opts.heartbeat;
            }
        }
        Ok(())
    }

    /// Replays every block from `blocks` in order.
    pub fn run<I>(&mut self, cache: &mut dyn IsCache, blocks: I) -> Result<Summary, TraceError>
    where
        I: IntoIterator<Item = Vec<Record>>,
    {
        for block in blocks {
            self.operate(cache, block)?;
        }
        self.out.flush()?;
        Ok(self.summary)
    }

    fn dispatch(
        &mut self,
        cache: &mut dyn IsCache,
        line: usize,
        command: Command,
    ) -> Result<(), TraceError> {
        let result = match command {
            Command::Read { address } => to_address(cache, address)
                .and_then(|a| cache.read(a))
                .map(|(byte, outcome)| Some(Reply::Read(byte, outcome))),
            Command::Write { address, value } => to_address(cache, address)
                .and_then(|a| cache.write(a, value))
                .map(|outcome| Some(Reply::Write(outcome))),
            Command::MissRate => {
                writeln!(self.out, "Miss rate: {:.6}.", cache.miss_rate())?;
                Ok(None)
            }
            Command::Invalid(text) => {
                warn!(line, %text, "invalid command");
                self.summary.invalid += 1;
                writeln!(self.out, "{INVALID_COMMAND}")?;
                Ok(None)
            }
        };

        match result {
            Ok(Some(reply)) => {
                self.print(reply)?;
                self.count_access(cache);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(line, error = %e, "skipping access");
                self.summary.skipped += 1;
            }
        }
        Ok(())
    }

    fn print(&mut self, reply: Reply) -> std::io::Result<()> {
        match reply {
            Reply::Read(byte, Outcome::Hit) => {
                self.out.write_all(&[byte])?;
                writeln!(self.out)
            }
            Reply::Read(_, Outcome::Miss) => writeln!(self.out, "-1"),
            Reply::Write(outcome) if self.opts.verbose => {
                writeln!(self.out, "{}", if outcome.is_hit() { "hit" } else { "miss" })
            }
            Reply::Write(_) => Ok(()),
        }
    }

    fn count_access(&mut self, cache: &mut dyn IsCache) {
        self.summary.accesses += 1;
        if self.warmup && self.summary.accesses >= self.opts.warmup {
            cache.clear_stats();
            self.warmup = false;
            info!(accesses = self.summary.accesses, "finished warm-up");
        }
    }
}

enum Reply {
    Read(u8, Outcome),
    Write(Outcome),
}

/// Negative trace addresses are out of range for any memory.
fn to_address(cache: &dyn IsCache, raw: i64) -> Result<u64, CacheError> {
    u64::try_from(raw).map_err(|_| CacheError::OutOfRange {
        address: i128::from(raw),
        limit: cache.geometry().address_space(),
    })
}
