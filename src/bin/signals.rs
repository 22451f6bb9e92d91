use signal_hook::consts::{SIGUSR1, SIGUSR2};
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[inline(never)]
fn before() {
    println!("before logging"); // cover: before
}

#[inline(never)]
fn during() {
    println!("while logging"); // cover: during
}

#[inline(never)]
fn after() {
    println!("after logging"); // cover: after
}

/// Raise logging toggles, exit code is a number of toggles delivered to this process.
fn toggle() {
    let got_usr1 = Arc::new(AtomicBool::new(false));
    let got_usr2 = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGUSR1, Arc::clone(&got_usr1)).unwrap();
    signal_hook::flag::register(SIGUSR2, Arc::clone(&got_usr2)).unwrap();

    before();
    nix::sys::signal::raise(nix::sys::signal::SIGUSR1).unwrap();
    during();
    nix::sys::signal::raise(nix::sys::signal::SIGUSR2).unwrap();
    after();

    let delivered = [got_usr1, got_usr2]
        .iter()
        .filter(|flag| flag.load(Ordering::SeqCst))
        .count();
    exit(delivered as i32);
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    match args[1].as_str() {
        "toggle" => toggle(),
        "exit" => exit(args[2].parse().unwrap()),
        "abort" => std::process::abort(),
        _ => panic!("unknown opt"),
    }
}
