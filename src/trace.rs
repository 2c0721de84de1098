use std::{
    fs,
    io::{self, BufRead, BufReader, Read},
    path::PathBuf,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{Receiver, Sender};
use xz2::read::XzDecoder;

use crate::error::TraceError;

/// One decoded trace command. Addresses keep their sign so the engine
/// boundary can reject negative ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Read { address: i64 },
    Write { address: i64, value: u8 },
    MissRate,
    /// Anything that is not `R`, `W` or `MR`. Holds the raw line.
    Invalid(String),
}

#[derive(Debug)]
pub struct Record {
    /// 1-based.
    pub line: usize,
    pub parsed: Result<Command, TraceError>,
}

/// Parses a single trace line. Blank lines and `#` comments yield `None`.
///
/// Lines are bytes: the write value is taken as a raw byte, so values outside
/// ASCII need not be valid UTF-8.
pub fn parse_line<T: AsRef<[u8]> + ?Sized>(
    text: &T,
    line: usize,
) -> Option<Result<Command, TraceError>> {
    let text = text.as_ref().trim_ascii();
    if text.is_empty() || text.starts_with(b"#") {
        return None;
    }

    let split = text
        .iter()
        .position(|b| !b.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let (op, rest) = text.split_at(split);

    let parsed = match op {
        b"R" => parse_read(rest),
        b"W" => parse_write(rest),
        b"MR" if rest.trim_ascii().is_empty() => Ok(Command::MissRate),
        b"MR" => Err(format!("MR takes no operands, got {:?}", lossy(rest))),
        _ => Ok(Command::Invalid(String::from_utf8_lossy(text).into_owned())),
    };
    Some(parsed.map_err(|reason| TraceError::Parse { line, reason }))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes.trim_ascii()).into_owned()
}

fn parse_address(bytes: &[u8], what: &str) -> Result<i64, String> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(parse_int)
        .ok_or_else(|| format!("bad {what} address {:?}", lossy(bytes)))
}

fn parse_read(rest: &[u8]) -> Result<Command, String> {
    parse_address(rest, "read").map(|address| Command::Read { address })
}

fn parse_write(rest: &[u8]) -> Result<Command, String> {
    let comma = rest
        .iter()
        .position(|&b| b == b',')
        .ok_or_else(|| format!("write needs `<address>,<char>`, got {:?}", lossy(rest)))?;
    let address = parse_address(&rest[..comma], "write")?;

    let value = match rest[comma + 1..].trim_ascii() {
        [byte] => *byte,
        raw => {
            // a non-ASCII character typed in a UTF-8 editor
            let mut chars = std::str::from_utf8(raw).unwrap_or_default().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => {
                    u8::try_from(c).map_err(|_| format!("{c:?} is not a single byte"))?
                }
                _ => {
                    return Err(format!(
                        "write value must be one character, got {:?}",
                        lossy(raw)
                    ))
                }
            }
        }
    };
    Ok(Command::Write { address, value })
}

/// Integer with optional sign, in decimal, `0x` hex or leading-zero octal.
pub fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let (radix, body) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    if body.is_empty() || !body.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    let magnitude = i64::from_str_radix(body, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Parses every line of `reader`. Stops after the first I/O error.
pub fn parse_reader<R: BufRead>(reader: R) -> impl Iterator<Item = Record> {
    let mut failed = false;
    reader
        .split(b'\n')
        .enumerate()
        .map_while(move |(idx, text)| {
            if failed {
                return None;
            }
            let line = idx + 1;
            Some(match text {
                Ok(text) => parse_line(&text, line).map(|parsed| Record { line, parsed }),
                Err(e) => {
                    failed = true;
                    Some(Record {
                        line,
                        parsed: Err(TraceError::Io(e)),
                    })
                }
            })
        })
        .flatten()
}

/// A trace file streamed from a background thread in blocks of records.
pub struct Trace {
    pub rec: Receiver<Vec<Record>>,
    _thread: JoinHandle<()>,
}

impl Trace {
    /// Opens `path` (transparently decompressing `.xz`) and starts the reader.
    pub fn read(
        path: PathBuf,
        records_per_block: usize,
        blocks_per_queue: usize,
    ) -> io::Result<Trace> {
        let file = fs::File::open(&path)?;
        let stream: Box<dyn Read + Send> = if path.extension().is_some_and(|e| e == "xz") {
            Box::new(XzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let (sender, receiver) = crossbeam::channel::bounded(blocks_per_queue.max(1));
        let records_per_block = records_per_block.max(1);

        let t = thread::spawn(move || Trace::run_thread(stream, records_per_block, sender));

        Ok(Trace {
            rec: receiver,
            _thread: t,
        })
    }

    fn run_thread(
        stream: Box<dyn Read + Send>,
        records_per_block: usize,
        queue: Sender<Vec<Record>>,
    ) {
        let mut records = parse_reader(BufReader::new(stream)).peekable();
        while records.peek().is_some() {
            let block: Vec<Record> = records.by_ref().take(records_per_block).collect();
            if queue.send(block).is_err() {
                return;
            }
        }
    }
}
