use std::env;

fn main() {
    let os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    if !(os == "linux" && arch == "x86_64") {
        panic!(
            "{} only works with linux on x86_64, target is {os}/{arch}",
            env!("CARGO_PKG_NAME")
        );
    }
}
