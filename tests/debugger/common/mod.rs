use bcov::coverage::{CoverageReport, LineCoverage};
use bcov::debugger::address::RemoteAddress;
use bcov::debugger::dwarf::{normalize_path, DebugInformation};
use bcov::debugger::{EventHook, ProcessExit, Progress, Resolution};
use nix::unistd::Pid;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Clone, Default)]
pub struct TestInfo {
    pub events: Rc<RefCell<Vec<Progress>>>,
}

impl TestInfo {
    /// Number of breakpoint events at address.
    pub fn breakpoint_events(&self, addr: RemoteAddress) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, Progress::Breakpoint(a, _) if *a == addr))
            .count()
    }
}

#[derive(Default)]
pub struct TestHooks {
    info: TestInfo,
}

impl TestHooks {
    pub fn new(info: TestInfo) -> Self {
        Self { info }
    }
}

impl EventHook for TestHooks {
    fn on_breakpoint(&self, addr: RemoteAddress, resolution: Resolution) {
        self.info
            .events
            .borrow_mut()
            .push(Progress::Breakpoint(addr, resolution));
    }

    fn on_foreign_trap(&self, pid: Pid) {
        self.info.events.borrow_mut().push(Progress::ForeignTrap(pid));
    }

    fn on_exit(&self, exit: ProcessExit) {
        self.info.events.borrow_mut().push(Progress::Exited(exit));
    }
}

#[macro_export]
macro_rules! assert_no_proc {
    ($pid:expr) => {
        let sys = sysinfo::System::new_with_specifics(
            sysinfo::RefreshKind::everything()
                .without_cpu()
                .without_memory(),
        );
        assert!(
            sysinfo::System::process(&sys, sysinfo::Pid::from_u32($pid.as_raw() as u32)).is_none()
        )
    };
}

/// Path of a test program source file, as it written in debug information.
pub fn source_path(file: &str) -> PathBuf {
    normalize_path(&Path::new(env!("CARGO_MANIFEST_DIR")).join("src/bin").join(file))
}

/// Return number of a line marked by `// cover: <marker>` comment.
pub fn marker_line(file: &str, marker: &str) -> u64 {
    let source = fs::read_to_string(source_path(file)).unwrap();
    let needle = format!("// cover: {marker}");
    source
        .lines()
        .position(|l| l.contains(&needle))
        .map(|idx| idx as u64 + 1)
        .unwrap_or_else(|| panic!("marker {marker} not found in {file}"))
}

/// Return sorted addresses of a source line.
///
/// # Arguments
///
/// * `app`: program path
/// * `base`: program load base
/// * `file`: source file name
/// * `line`: line number
pub fn line_addresses(app: &str, base: u64, file: &str, line: u64) -> Vec<RemoteAddress> {
    let lines = DebugInformation::load(Path::new(app))
        .unwrap()
        .source_lines(base);
    let mut addresses: Vec<_> = lines
        .lines_of(&source_path(file))
        .unwrap()
        .iter()
        .filter(|(l, _)| *l == line)
        .map(|(_, addr)| *addr)
        .collect();
    addresses.sort();
    addresses.dedup();
    assert!(!addresses.is_empty(), "no addresses for {file}:{line}");
    addresses
}

/// Return load base of a program, zero for position dependent executables.
pub fn program_base(app: &str, bases: &bcov::debugger::ModuleBaseTable) -> u64 {
    let info = DebugInformation::load(Path::new(app)).unwrap();
    if !info.is_relocatable() {
        return 0;
    }
    bases
        .base_of(&fs::canonicalize(app).unwrap())
        .unwrap()
}

/// Return coverage of a line.
pub fn line_coverage(report: &CoverageReport, file: &str, line: u64) -> LineCoverage {
    report
        .file(&source_path(file))
        .unwrap_or_else(|| panic!("file {file} not found in report"))
        .line(line)
        .unwrap_or_else(|| panic!("line {file}:{line} not found in report"))
        .clone()
}
