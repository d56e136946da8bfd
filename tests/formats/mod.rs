//! Integration tests for the format parsers.

mod detect;
mod elf;
