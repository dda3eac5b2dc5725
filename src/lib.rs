//! Signal generation and counting core of the component tester.
//!
//! The tools (PWM generator, square-wave generator, servo tester,
//! frequency counter, event counter) run as cooperative loops over a set
//! of abstract collaborators: the timer traits in [`hal`], a character
//! [`ui::DisplaySurface`], the blocking [`ui::UserInput`] poll and the
//! probe wiring in [`tools::probe`]. Register-level knowledge is confined
//! to the AVR backend; everything else builds and tests on the host.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_arch = "avr", feature(abi_avr_interrupt))]

pub mod config;
pub mod hal;
pub mod range;
pub mod signal;
pub mod tools;
pub mod ui;
