//! Host I/O adapter invoked by the PRINT/INPUT opcode family.
//!
//! The VM talks to a [`VmIo`] implementation instead of the process
//! streams directly, so tests can script input and capture output.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

pub trait VmIo {
    fn print_int(&mut self, value: i32);
    fn print_float(&mut self, value: f32);
    fn print_str(&mut self, s: &str);
    /// Read one integer; unparsable input yields 0 and the pending
    /// line is discarded.
    fn read_int(&mut self) -> i32;
    fn read_line(&mut self) -> String;
}

/// Format a float the way C++ `operator<<` does by default: six
/// significant digits, trailing zeros trimmed, scientific notation for
/// extreme magnitudes.
pub fn format_float(value: f32) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let exponent = value.abs().log10().floor() as i32;
    if (-4..6).contains(&exponent) {
        let decimals = (5 - exponent).max(0) as usize;
        let fixed = format!("{:.*}", decimals, value);
        if fixed.contains('.') {
            fixed.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            fixed
        }
    } else {
        let sci = format!("{:.5e}", value);
        // Trim trailing zeros in the mantissa: 1.50000e7 -> 1.5e7
        match sci.split_once('e') {
            Some((mantissa, exp)) => {
                let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
                format!("{}e{}", mantissa, exp)
            }
            None => sci,
        }
    }
}

/// Blocking console adapter over stdin/stdout.
#[derive(Default)]
pub struct ConsoleIo;

impl ConsoleIo {
    pub fn new() -> Self {
        Self
    }

    fn read_raw_line(&self) -> String {
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        line
    }
}

impl VmIo for ConsoleIo {
    fn print_int(&mut self, value: i32) {
        print!("{}", value);
        let _ = io::stdout().flush();
    }

    fn print_float(&mut self, value: f32) {
        print!("{}", format_float(value));
        let _ = io::stdout().flush();
    }

    fn print_str(&mut self, s: &str) {
        print!("{}", s);
        let _ = io::stdout().flush();
    }

    fn read_int(&mut self) -> i32 {
        let line = self.read_raw_line();
        line.split_whitespace()
            .next()
            .and_then(|tok| tok.parse().ok())
            .unwrap_or(0)
    }

    fn read_line(&mut self) -> String {
        let mut line = self.read_raw_line();
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        line
    }
}

#[derive(Default)]
struct CaptureState {
    input: VecDeque<String>,
    output: String,
}

/// Scripted adapter for tests: queued input lines, captured output.
/// Clones share state, so a test can keep a handle while the VM owns
/// the boxed copy.
#[derive(Clone, Default)]
pub struct CaptureIo {
    state: Rc<RefCell<CaptureState>>,
}

impl CaptureIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(lines: &[&str]) -> Self {
        let io = Self::new();
        for line in lines {
            io.state.borrow_mut().input.push_back(line.to_string());
        }
        io
    }

    pub fn output(&self) -> String {
        self.state.borrow().output.clone()
    }
}

impl VmIo for CaptureIo {
    fn print_int(&mut self, value: i32) {
        self.state.borrow_mut().output.push_str(&value.to_string());
    }

    fn print_float(&mut self, value: f32) {
        self.state.borrow_mut().output.push_str(&format_float(value));
    }

    fn print_str(&mut self, s: &str) {
        self.state.borrow_mut().output.push_str(s);
    }

    fn read_int(&mut self) -> i32 {
        self.state
            .borrow_mut()
            .input
            .pop_front()
            .and_then(|line| {
                line.split_whitespace()
                    .next()
                    .and_then(|tok| tok.parse().ok())
            })
            .unwrap_or(0)
    }

    fn read_line(&mut self) -> String {
        self.state
            .borrow_mut()
            .input
            .pop_front()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float_six_significant_digits() {
        assert_eq!(format_float(2.7182817), "2.71828");
        assert_eq!(format_float(3.14159265), "3.14159");
        assert_eq!(format_float(123456.7), "123457");
    }

    #[test]
    fn test_format_float_trims_trailing_zeros() {
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(1.0), "1");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(121.0), "121");
    }

    #[test]
    fn test_format_float_zero() {
        assert_eq!(format_float(0.0), "0");
    }

    #[test]
    fn test_format_float_integral_with_trailing_zero_digits() {
        assert_eq!(format_float(123450.0), "123450");
        assert_eq!(format_float(120.0), "120");
    }

    #[test]
    fn test_format_float_small_magnitudes_go_scientific() {
        assert_eq!(format_float(0.00001), "1e-5");
        assert_eq!(format_float(0.0001), "0.0001");
    }

    #[test]
    fn test_capture_io_scripted_input() {
        let mut io = CaptureIo::with_input(&["7", "not a number", "  42  "]);
        assert_eq!(io.read_int(), 7);
        assert_eq!(io.read_int(), 0);
        assert_eq!(io.read_int(), 42);
        // Exhausted input also yields 0.
        assert_eq!(io.read_int(), 0);
    }

    #[test]
    fn test_capture_io_shared_output() {
        let io = CaptureIo::new();
        let mut vm_side = io.clone();
        vm_side.print_int(12);
        vm_side.print_str("x");
        vm_side.print_float(1.5);
        assert_eq!(io.output(), "12x1.5");
    }
}
