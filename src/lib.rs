//! numbers-abi
//!
//! A C ABI export boundary (`add`, `add_struct` and the `NumberPair` layout)
//! plus the tooling that keeps every foreign caller on the same layout
//! description: header generation, header checks and conformance probes.

pub mod boundary;
pub mod commands;
pub mod config;
pub mod ffi_check;
pub mod ffi_codegen;
pub mod ffi_parser;
pub mod layout;
pub mod probe;
pub mod surface;

pub use boundary::{add, add_struct, NumberPair};
