use crate::common::{line_coverage, marker_line};
use crate::SIGNALS_APP;
use bcov::coverage::collector::Collector;
use bcov::debugger::{LoggingMode, ProcessExit};
use serial_test::serial;

#[test]
#[serial]
fn test_logging_toggled_by_signals() {
    let coverage = Collector::new(SIGNALS_APP, vec!["toggle".to_string()])
        .with_logging(LoggingMode::SignalGated { active: false })
        .collect()
        .unwrap();
    // toggles never delivered to a program
    assert_eq!(coverage.exit, Some(ProcessExit::Code(0)));

    let report = &coverage.report;
    let before = line_coverage(report, "signals.rs", marker_line("signals.rs", "before"));
    let during = line_coverage(report, "signals.rs", marker_line("signals.rs", "during"));
    let after = line_coverage(report, "signals.rs", marker_line("signals.rs", "after"));
    assert_eq!(before.hits, 0);
    assert!(during.hits >= 1);
    assert_eq!(after.hits, 0);
}

#[test]
#[serial]
fn test_toggle_signals_delivered_when_always_active() {
    let coverage = Collector::new(SIGNALS_APP, vec!["toggle".to_string()])
        .collect()
        .unwrap();
    // both signals handled by a program
    assert_eq!(coverage.exit, Some(ProcessExit::Code(2)));

    let report = &coverage.report;
    for marker in ["before", "during", "after"] {
        let line = line_coverage(report, "signals.rs", marker_line("signals.rs", marker));
        assert!(line.hits >= 1, "line {marker} not covered");
    }
}
