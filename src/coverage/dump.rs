//! Coverage report text format.
//!
//! ```text
//! command <command>
//! args <arg> <arg> ...
//! date <timestamp>
//! file <path>
//! <line> <address count> <hit count>
//! ...
//! ```
//!
//! Command and arguments are escaped: backslash, new line and space are prefixed by a backslash
//! (new line written as `\n`).

use crate::coverage::CoverageReport;
use chrono::{DateTime, Local};
use itertools::Itertools;
use std::borrow::Cow;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// `ctime` layout without a trailing new line.
const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Description of a traced run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInfo {
    pub command: String,
    pub args: Vec<String>,
    pub started_at: DateTime<Local>,
}

impl RunInfo {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            started_at: Local::now(),
        }
    }

    pub fn timestamp(&self) -> String {
        self.started_at.format(TIMESTAMP_FORMAT).to_string()
    }
}

pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['\\', '\n', ' ']) {
        return Cow::Borrowed(s);
    }

    let mut escaped = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            ' ' => escaped.push_str("\\ "),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Write report in text format.
pub fn write_report(
    out: &mut impl Write,
    run: &RunInfo,
    report: &CoverageReport,
) -> io::Result<()> {
    writeln!(out, "command {}", escape(&run.command))?;
    if run.args.is_empty() {
        writeln!(out, "args")?;
    } else {
        writeln!(out, "args {}", run.args.iter().map(|a| escape(a)).join(" "))?;
    }
    writeln!(out, "date {}", run.timestamp())?;

    for file in &report.files {
        writeln!(out, "file {}", file.path.display())?;
        for line in &file.lines {
            writeln!(out, "{} {} {}", line.line, line.addresses, line.hits)?;
        }
    }
    Ok(())
}

/// Write report into a file, existing file truncated.
pub fn dump(path: &Path, run: &RunInfo, report: &CoverageReport) -> io::Result<()> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    write_report(&mut out, run, report)?;
    out.flush()
}
