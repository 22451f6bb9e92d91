use crate::common::{line_coverage, marker_line, source_path};
use crate::CALC_APP;
use bcov::coverage::collector::Collector;
use bcov::debugger::{LoggingMode, ModuleBaseTable, ProcessExit};
use nix::unistd::Pid;
use serial_test::serial;
use std::fs;
use std::path::PathBuf;

#[test]
#[serial]
fn test_line_executed_once_covered() {
    let coverage = Collector::new(CALC_APP, vec![]).collect().unwrap();
    assert_eq!(coverage.exit, Some(ProcessExit::Code(0)));

    let sum3 = line_coverage(&coverage.report, "calc.rs", marker_line("calc.rs", "sum3"));
    assert!(sum3.addresses >= 1);
    assert_eq!(sum3.hits, sum3.addresses);

    // single address, reached four times, counted once
    let sum2 = line_coverage(&coverage.report, "calc.rs", marker_line("calc.rs", "sum2"));
    assert_eq!((sum2.addresses, sum2.hits), (1, 1));

    for line in &coverage.report.file(&source_path("calc.rs")).unwrap().lines {
        assert!(line.hits <= line.addresses);
    }

    // never called function has no code at all or not covered
    let unused_line = marker_line("calc.rs", "unused");
    if let Some(unused) = coverage
        .report
        .file(&source_path("calc.rs"))
        .unwrap()
        .line(unused_line)
    {
        assert_eq!(unused.hits, 0);
    }
}

#[test]
#[serial]
fn test_logging_disabled_nothing_covered() {
    let coverage = Collector::new(CALC_APP, vec![])
        .with_logging(LoggingMode::SignalGated { active: false })
        .collect()
        .unwrap();
    assert_eq!(coverage.exit, Some(ProcessExit::Code(0)));

    let sum3 = line_coverage(&coverage.report, "calc.rs", marker_line("calc.rs", "sum3"));
    assert!(sum3.addresses >= 1);
    assert_eq!(sum3.hits, 0);

    assert!(coverage
        .report
        .files
        .iter()
        .flat_map(|f| f.lines.iter())
        .all(|l| l.hits == 0));
}

#[test]
#[serial]
fn test_report_file_order_and_dump() {
    let coverage = Collector::new(CALC_APP, vec!["x".to_string()])
        .collect()
        .unwrap();

    for file in &coverage.report.files {
        assert!(file.lines.windows(2).all(|w| w[0].line < w[1].line));
    }

    let output = std::env::temp_dir().join("bcov-coverage-test.bcovdump");
    coverage.dump(&output).unwrap();
    let dump = fs::read_to_string(&output).unwrap();

    let sum3_line = marker_line("calc.rs", "sum3");
    let sum3 = line_coverage(&coverage.report, "calc.rs", sum3_line);
    let calc_section: Vec<&str> = dump
        .lines()
        .skip_while(|l| *l != format!("file {}", source_path("calc.rs").display()))
        .skip(1)
        .take_while(|l| !l.starts_with("file "))
        .collect();
    assert!(calc_section.contains(&format!("{sum3_line} {} {}", sum3.addresses, sum3.hits).as_str()));
    let sum2_line = marker_line("calc.rs", "sum2");
    assert!(calc_section.contains(&format!("{sum2_line} 1 1").as_str()));
    assert_eq!(dump.lines().nth(1), Some("args x"));

    _ = fs::remove_file(&output);
}

fn mapped_libc() -> PathBuf {
    let bases = ModuleBaseTable::discover(Pid::this()).unwrap();
    let libc = bases
        .modules()
        .find(|m| {
            m.file_name()
                .map(|f| f.to_string_lossy().starts_with("libc."))
                .unwrap_or_default()
        })
        .expect("libc not mapped");
    libc.to_path_buf()
}

#[test]
#[serial]
fn test_shared_library_coverage() {
    let libc = mapped_libc();
    let coverage = Collector::new(CALC_APP, vec![])
        .with_modules(vec![libc, PathBuf::from("/definitely/not/mapped.so")])
        .collect()
        .unwrap();
    assert_eq!(coverage.exit, Some(ProcessExit::Code(0)));

    // program coverage is not affected by extra modules
    let sum3 = line_coverage(&coverage.report, "calc.rs", marker_line("calc.rs", "sum3"));
    assert_eq!(sum3.hits, sum3.addresses);
}
