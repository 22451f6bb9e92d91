fn main() {
    let s: i64 = sum3(1, 2, 3);
    print(s);
    let s2: i64 = sum3(s, s, s);
    print(s2);
}

#[inline(never)]
fn sum2(a: i64, b: i64) -> i64 {
    a ^ b // cover: sum2
}

#[inline(never)]
fn sum3(a: i64, b: i64, c: i64) -> i64 {
    let ab = sum2(a, b); // cover: sum3
    sum2(ab, c)
}

#[inline(never)]
fn print(v: i64) {
    let output = format!("result: {v}");

    println!("{output}")
}

#[allow(dead_code)]
#[inline(never)]
fn unused() {
    println!("never printed"); // cover: unused
}
