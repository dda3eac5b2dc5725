use std::env;

fn main() {
    let target = env::var("TARGET").unwrap_or_default();

    // MCU flags only apply to the firmware image; host builds run the tests.
    if target.contains("avr") {
        println!("cargo:rustc-link-arg=-mmcu=atmega328p");
    }

    println!("cargo:rerun-if-changed=build.rs");
}
