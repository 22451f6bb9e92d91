use std::sync::{Arc, Barrier};
use std::thread;

fn main() {
    let barrier = Arc::new(Barrier::new(2));

    let b1 = barrier.clone();
    let t1 = thread::spawn(move || {
        b1.wait();
        let seed = mix(1);
        work(seed)
    });

    let b2 = barrier.clone();
    let t2 = thread::spawn(move || {
        b2.wait();
        let seed = mix(2);
        work(seed)
    });

    let total = t1.join().unwrap().wrapping_add(t2.join().unwrap());
    println!("total {total}");
}

// inlined into both thread bodies, so the line has one address per call site
#[inline(always)]
fn mix(seed: u64) -> u64 {
    seed ^ 0x5A5A // cover: mix
}

#[inline(never)]
fn work(seed: u64) -> u64 {
    let sum = (0..1000u64).fold(seed, u64::wrapping_add); // cover: work
    println!("thread {seed}: {sum}");
    sum
}
