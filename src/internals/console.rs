/// Input-output words
///
/// The terminal boundary is byte-oriented: the words below write single
/// bytes or short strings through an OutputDevice and read single bytes
/// from stdin. The Capture variant of the device backs the test harness,
/// which needs to see what a scenario printed.
///
use crate::errors::{ForthError, ForthResult};
use crate::kernel::Addr;
use crate::runtime::ForthRuntime;
use std::io::{self, Read, Write};

pub enum OutputDevice {
    Stdout,
    Capture(Vec<u8>),
}

impl OutputDevice {
    pub fn write_byte(&mut self, byte: u8) {
        match self {
            OutputDevice::Stdout => {
                let mut out = io::stdout();
                let _ = out.write_all(&[byte]);
            }
            OutputDevice::Capture(buffer) => buffer.push(byte),
        }
    }

    pub fn write_str(&mut self, text: &str) {
        match self {
            OutputDevice::Stdout => {
                let _ = io::stdout().write_all(text.as_bytes());
            }
            OutputDevice::Capture(buffer) => buffer.extend_from_slice(text.as_bytes()),
        }
    }

    pub fn flush(&mut self) {
        if let OutputDevice::Stdout = self {
            let _ = io::stdout().flush();
        }
    }

    /// Drain captured output as text; empty for the stdout device.
    pub fn take_captured(&mut self) -> String {
        match self {
            OutputDevice::Stdout => String::new(),
            OutputDevice::Capture(buffer) => {
                String::from_utf8_lossy(&std::mem::take(buffer)).into_owned()
            }
        }
    }
}

/// Read one byte from stdin; None at end of input.
pub fn read_byte() -> Option<u8> {
    let mut buf = [0u8; 1];
    match io::stdin().read(&mut buf) {
        Ok(1) => Some(buf[0]),
        _ => None,
    }
}

const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Render a cell in the given base: a leading '-' and magnitude digits,
/// never a two's-complement form.
pub fn number_in_base(value: i32, base: i32) -> String {
    let mut magnitude = (value as i64).unsigned_abs();
    let base = base as u64;
    let mut digits = Vec::new();
    loop {
        digits.push(DIGITS[(magnitude % base) as usize]);
        magnitude /= base;
        if magnitude == 0 {
            break;
        }
    }
    if value < 0 {
        digits.push(b'-');
    }
    digits.reverse();
    String::from_utf8(digits).expect("digits are ASCII")
}

impl ForthRuntime {
    /// EMIT ( char -- ) write the low 8 bits of the top item.
    pub fn f_emit(&mut self) -> ForthResult {
        let value = self.pop()?;
        self.out.write_byte((value & 0xff) as u8);
        self.out.flush();
        Ok(())
    }

    /// KEY ( -- char ) block for one character; 0 on end of input.
    pub fn f_key(&mut self) -> ForthResult {
        let c = read_byte().unwrap_or(0);
        self.push(c as i32)
    }

    /// TYPE ( c-addr u -- ) write u bytes. The run clips at the first
    /// address that fails to translate (the data-space ceiling, or the
    /// end of a transient buffer) rather than wrapping.
    pub fn f_type(&mut self) -> ForthResult {
        let count = self.pop()?;
        let addr = self.pop()? as Addr;
        if count < 0 {
            return Ok(());
        }
        for i in 0..count as u32 {
            match self.byte_at(addr, i) {
                Ok(byte) => self.out.write_byte(byte),
                Err(_) => break,
            }
        }
        self.out.flush();
        Ok(())
    }

    /// ACCEPT ( c-addr n -- n2 ) read up to n characters from the
    /// terminal into c-addr, honoring backspace and stopping at CR/LF.
    /// Characters are echoed; the count actually read is returned.
    pub fn f_accept(&mut self) -> ForthResult {
        let max = self.pop()?;
        let addr = self.pop()? as Addr;
        let mut count: u32 = 0;
        while (count as i32) < max {
            let byte = match read_byte() {
                Some(b) => b,
                None => break,
            };
            match byte {
                b'\r' | b'\n' => break,
                0x08 | 0x7f => {
                    if count > 0 {
                        count -= 1;
                        self.out.write_str("\x08 \x08");
                        self.out.flush();
                    }
                }
                b if (32..127).contains(&b) => {
                    let target = addr
                        .checked_add(count)
                        .ok_or(ForthError::InvalidAddress(addr))?;
                    self.c_store(target, b)?;
                    count += 1;
                    self.out.write_byte(b);
                    self.out.flush();
                }
                _ => {} // ignore control characters
            }
        }
        self.push(count as i32)
    }

    /// . ( n -- ) print the top item in the current BASE, followed by a
    /// space.
    pub fn f_dot(&mut self) -> ForthResult {
        let value = self.pop()?;
        let base = self.base()?;
        let text = number_in_base(value, base);
        self.out.write_str(&text);
        self.out.write_byte(b' ');
        self.out.flush();
        Ok(())
    }

    /// SOURCE ( -- c-addr u ) the input buffer and its current length.
    pub fn f_source(&mut self) -> ForthResult {
        let buffer = self.input_addr;
        let length = self.kernel.fetch(self.input_len_addr)?;
        self.push(buffer as i32)?;
        self.push(length)
    }

    /// >IN ( -- addr ) the address of the parse cursor.
    pub fn f_to_in(&mut self) -> ForthResult {
        self.push(self.to_in_addr as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_in_base_decimal() {
        assert_eq!(number_in_base(0, 10), "0");
        assert_eq!(number_in_base(1234, 10), "1234");
        assert_eq!(number_in_base(-56, 10), "-56");
    }

    #[test]
    fn test_number_in_base_hex() {
        assert_eq!(number_in_base(255, 16), "FF");
        assert_eq!(number_in_base(-255, 16), "-FF");
    }

    #[test]
    fn test_number_in_base_binary() {
        assert_eq!(number_in_base(5, 2), "101");
    }

    #[test]
    fn test_number_in_base_min_cell() {
        // i32::MIN must not panic on negation
        assert_eq!(number_in_base(i32::MIN, 16), "-80000000");
    }

    #[test]
    fn test_capture_device() {
        let mut out = OutputDevice::Capture(Vec::new());
        out.write_str("ab");
        out.write_byte(b'c');
        assert_eq!(out.take_captured(), "abc");
        assert_eq!(out.take_captured(), "");
    }
}
