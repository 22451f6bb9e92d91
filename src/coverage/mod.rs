pub mod collector;
pub mod dump;

use crate::debugger::address::RemoteAddress;
use crate::debugger::BreakpointTable;
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Source lines and addresses of their statement starts, grouped by a source file.
/// Files are kept in order of first appearance.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SourceLineMap {
    files: IndexMap<PathBuf, Vec<(u64, RemoteAddress)>>,
}

impl SourceLineMap {
    pub fn insert(&mut self, file: &Path, line: u64, addr: RemoteAddress) {
        match self.files.get_mut(file) {
            Some(lines) => lines.push((line, addr)),
            None => {
                self.files.insert(file.to_path_buf(), vec![(line, addr)]);
            }
        }
    }

    /// Add all lines of other map, lines of a file known by both maps are concatenated.
    pub fn merge(&mut self, other: SourceLineMap) {
        for (file, lines) in other.files {
            self.files.entry(file).or_default().extend(lines);
        }
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &[(u64, RemoteAddress)])> {
        self.files
            .iter()
            .map(|(file, lines)| (file.as_path(), lines.as_slice()))
    }

    pub fn lines_of(&self, file: &Path) -> Option<&[(u64, RemoteAddress)]> {
        self.files.get(file).map(Vec::as_slice)
    }

    /// Number of source files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Return unique addresses of all lines, one breakpoint per address.
pub fn collect_addresses(lines: &SourceLineMap) -> HashSet<RemoteAddress> {
    lines
        .files
        .values()
        .flat_map(|lines| lines.iter().map(|(_, addr)| *addr))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCoverage {
    pub line: u64,
    /// Number of distinct addresses of a line.
    pub addresses: usize,
    /// Number of line addresses reached at least once.
    pub hits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCoverage {
    pub path: PathBuf,
    /// Lines in ascending order.
    pub lines: Vec<LineCoverage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageReport {
    pub files: Vec<FileCoverage>,
}

impl CoverageReport {
    pub fn file(&self, path: &Path) -> Option<&FileCoverage> {
        self.files.iter().find(|f| f.path == path)
    }
}

impl FileCoverage {
    pub fn line(&self, line: u64) -> Option<&LineCoverage> {
        self.lines.iter().find(|l| l.line == line)
    }
}

/// Combine source lines with breakpoint hit counters.
/// An address without a breakpoint counts as a line address but never as a hit.
pub fn build_report(lines: &SourceLineMap, breakpoints: &BreakpointTable) -> CoverageReport {
    let files = lines
        .iter()
        .map(|(path, records)| {
            let mut by_line: BTreeMap<u64, BTreeSet<RemoteAddress>> = BTreeMap::new();
            for (line, addr) in records {
                by_line.entry(*line).or_default().insert(*addr);
            }

            let lines = by_line
                .into_iter()
                .map(|(line, addresses)| LineCoverage {
                    line,
                    addresses: addresses.len(),
                    hits: addresses
                        .iter()
                        .filter(|addr| {
                            breakpoints
                                .get(**addr)
                                .map(|brkpt| brkpt.hits() > 0)
                                .unwrap_or_default()
                        })
                        .count(),
                })
                .collect();

            FileCoverage {
                path: path.to_path_buf(),
                lines,
            }
        })
        .collect();

    CoverageReport { files }
}
