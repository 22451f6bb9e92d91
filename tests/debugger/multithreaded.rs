use crate::common::{line_addresses, line_coverage, marker_line, program_base};
use crate::{launch, MT_APP};
use bcov::coverage::collector::Collector;
use bcov::debugger::{LoggingMode, ProcessExit};
use serial_test::serial;
use std::fs;

#[test]
#[serial]
fn test_line_executed_by_two_threads() {
    let coverage = Collector::new(MT_APP, vec![]).collect().unwrap();
    assert_eq!(coverage.exit, Some(ProcessExit::Code(0)));

    let work = line_coverage(&coverage.report, "mt.rs", marker_line("mt.rs", "work"));
    assert!(work.addresses >= 1);
    assert!(work.hits >= 1);
    assert!(work.hits <= work.addresses);

    // one inlined copy per thread
    let mix_line = marker_line("mt.rs", "mix");
    let mix = line_coverage(&coverage.report, "mt.rs", mix_line);
    assert_eq!(mix.addresses, 2);
    assert!((1..=2).contains(&mix.hits));

    let output = std::env::temp_dir().join("bcov-mt-test.bcovdump");
    coverage.dump(&output).unwrap();
    let dump = fs::read_to_string(&output).unwrap();
    assert!(dump
        .lines()
        .any(|l| l == format!("{mix_line} 2 {}", mix.hits)));

    _ = fs::remove_file(&output);
}

#[test]
#[serial]
fn test_inlined_line_addresses_counted_separately() {
    let mut debugger = launch(MT_APP, &[], LoggingMode::AlwaysActive);
    let bases = debugger.module_bases().unwrap();
    let base = program_base(MT_APP, &bases);
    let addresses = line_addresses(MT_APP, base, "mt.rs", marker_line("mt.rs", "mix"));
    assert_eq!(addresses.len(), 2);
    debugger.install_breakpoints(addresses.clone()).unwrap();

    assert_eq!(debugger.run().unwrap(), ProcessExit::Code(0));
    // each thread runs its own copy
    for addr in &addresses {
        assert_eq!(debugger.breakpoints().get(*addr).unwrap().hits(), 1);
    }
}

#[test]
#[serial]
fn test_breakpoint_counted_once_for_all_threads() {
    let mut debugger = launch(MT_APP, &[], LoggingMode::AlwaysActive);
    let bases = debugger.module_bases().unwrap();
    let base = program_base(MT_APP, &bases);
    let addresses = line_addresses(MT_APP, base, "mt.rs", marker_line("mt.rs", "work"));
    debugger.install_breakpoints(addresses.clone()).unwrap();

    assert_eq!(debugger.run().unwrap(), ProcessExit::Code(0));
    assert!(debugger.breakpoints().get(addresses[0]).unwrap().hits() == 1);
    for addr in &addresses {
        assert!(debugger.breakpoints().get(*addr).unwrap().hits() <= 1);
    }
}

#[test]
#[serial]
fn test_rearm_in_threads() {
    let coverage = Collector::new(MT_APP, vec![])
        .with_logging(LoggingMode::SignalGated { active: false })
        .collect()
        .unwrap();
    assert_eq!(coverage.exit, Some(ProcessExit::Code(0)));

    let work = line_coverage(&coverage.report, "mt.rs", marker_line("mt.rs", "work"));
    assert_eq!(work.hits, 0);
}
