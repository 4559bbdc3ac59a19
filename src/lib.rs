//! rivenOS kernel library.
//!
//! Everything except the interrupt handlers is target-independent enough to
//! build (and unit-test) on the host, so `no_std` is dropped under `cfg(test)`
//! and only the IDT module is restricted to bare-metal builds.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_os = "none", feature(abi_x86_interrupt))]

pub mod drivers;
pub mod fs;
pub mod gdt;
#[cfg(target_os = "none")]
pub mod interrupts;
pub mod mm;
pub mod power;
pub mod shell;
