/// Tools word set: stack display, dictionary listing, memory dump, and
/// the decompiler. These are diagnostics over the core's data model; the
/// core never depends on them.
///
use crate::errors::{ForthError, ForthResult};
use crate::internals::console::number_in_base;
use crate::internals::messages::DebugLevel;
use crate::kernel::{align_up, Addr, Cfunc, CELL_SIZE, FLAG_IMMEDIATE};
use crate::runtime::ForthRuntime;

pub const TOOLS_DEFINITIONS: &[&str] = &[
    ": ? @ . ;", // ( addr -- ) display the contents of an address
];

impl ForthRuntime {
    /// .S ( -- ) display the stack, bottom first, in the current BASE.
    /// The depth itself always prints in decimal.
    pub fn f_dot_s(&mut self) -> ForthResult {
        let base = self.base()?;
        let mut line = format!("<{}> ", self.ctx.depth());
        for value in self.ctx.data_slice() {
            line.push_str(&number_in_base(*value, base));
            line.push(' ');
        }
        line.push('\n');
        self.out.write_str(&line);
        self.out.flush();
        Ok(())
    }

    /// WORDS ( -- ) list the dictionary, newest first.
    pub fn f_words(&mut self) -> ForthResult {
        let mut word = self.head;
        let mut count = 0;
        let mut line = String::from("\n");
        while word != 0 {
            line.push_str(&format!("{:<16} ", self.kernel.read_name(word)?));
            count += 1;
            if count % 8 == 0 {
                line.push('\n');
            }
            word = self.kernel.read_link(word)?;
        }
        if count % 8 != 0 {
            line.push('\n');
        }
        line.push_str(&format!("{count} words\n"));
        self.out.write_str(&line);
        self.out.flush();
        Ok(())
    }

    /// DUMP ( addr u -- ) hex dump with an ASCII gutter.
    pub fn f_dump(&mut self) -> ForthResult {
        let count = self.pop()?;
        let addr = self.pop()? as Addr;
        if count <= 0 {
            return Ok(());
        }
        let count = count as u32;
        let mut text = format!("\nDUMP {addr:08X} ({count} bytes):\n");
        let mut offset = 0;
        while offset < count {
            text.push_str(&format!("{:08X}: ", addr.wrapping_add(offset)));
            for i in 0..16 {
                if i == 8 {
                    text.push(' ');
                }
                match self.byte_at(addr, offset + i) {
                    Ok(b) if offset + i < count => text.push_str(&format!("{b:02X} ")),
                    _ => text.push_str("   "),
                }
            }
            text.push_str(" |");
            for i in 0..16 {
                if offset + i >= count {
                    break;
                }
                match self.byte_at(addr, offset + i) {
                    Ok(b) if (32..127).contains(&b) => text.push(b as char),
                    Ok(_) => text.push('.'),
                    Err(_) => break,
                }
            }
            text.push_str("|\n");
            offset += 16;
        }
        self.out.write_str(&text);
        self.out.flush();
        Ok(())
    }

    /// SEE <name> ( -- ) decompile a word. Colon bodies are walked token
    /// by token with the inline-data words given their operands;
    /// primitives print their documentation line.
    pub fn f_see(&mut self) -> ForthResult {
        let name = self
            .parse_name_token()?
            .ok_or_else(|| ForthError::Compile("missing name after SEE".to_owned()))?;
        let word = match self.search_word(&name)? {
            Some(word) => word,
            None => {
                let text = format!("SEE: {name} not found\n");
                self.out.write_str(&text);
                return Ok(());
            }
        };
        let display_name = self.kernel.read_name(word)?;
        let immediate = self.kernel.read_flags(word)? & FLAG_IMMEDIATE != 0;
        let text = match self.kernel.read_cfunc(word)? {
            Cfunc::Colon => {
                let mut text = format!(": {display_name} {}",
                    self.decompile_body(self.kernel.read_param(word)? as Addr)?);
                text.push(';');
                if immediate {
                    text.push_str(" IMMEDIATE");
                }
                text.push('\n');
                text
            }
            Cfunc::AddressOf => format!(
                "VARIABLE {display_name}  ( value: {} )\n",
                self.kernel.read_param(word)?
            ),
            Cfunc::ParamValue => format!(
                "{} CONSTANT {display_name}\n",
                self.kernel.read_param(word)?
            ),
            Cfunc::ParamAddress => format!(
                "CREATE {display_name}  ( data at {} )\n",
                self.kernel.read_param(word)?
            ),
            Cfunc::Primitive(index) => match self.builtins.get(index) {
                Some(b) => format!("primitive: {}\n", b.doc),
                None => format!("primitive {display_name}\n"),
            },
        };
        self.out.write_str(&text);
        self.out.flush();
        Ok(())
    }

    fn decompile_body(&self, start: Addr) -> Result<String, ForthError> {
        let mut text = String::new();
        let mut ip = start;
        loop {
            let token = self.kernel.fetch(ip)? as Addr;
            ip += CELL_SIZE;
            let token_name = self.kernel.read_name(token)?;
            match token_name.as_str() {
                "EXIT" => break,
                "LIT" => {
                    text.push_str(&format!("{} ", self.kernel.fetch(ip)?));
                    ip += CELL_SIZE;
                }
                "FLIT" => {
                    let lo = self.kernel.fetch(ip)? as u32 as u64;
                    let hi = self.kernel.fetch(ip + CELL_SIZE)? as u32 as u64;
                    ip += 2 * CELL_SIZE;
                    text.push_str(&format!("{} ", f64::from_bits(lo | (hi << 32))));
                }
                "BRANCH" | "0BRANCH" | "(LOOP)" | "(+LOOP)" | "(LEAVE)" => {
                    text.push_str(&format!("{token_name}:{} ", self.kernel.fetch(ip)?));
                    ip += CELL_SIZE;
                }
                "(.\")" | "(S\")" | "(ABORT\")" => {
                    let length = self.kernel.fetch(ip)? as u32;
                    ip += CELL_SIZE;
                    let mut s = String::new();
                    for i in 0..length {
                        s.push(self.kernel.c_fetch(ip + i)? as char);
                    }
                    ip = align_up(ip + length);
                    text.push_str(&format!("{token_name} {s}\" "));
                }
                _ => text.push_str(&format!("{token_name} ")),
            }
        }
        Ok(text)
    }

    /// DEBUG-ON ( -- ) full diagnostics.
    pub fn f_debug_on(&mut self) -> ForthResult {
        self.msg.set_level(DebugLevel::Debug);
        Ok(())
    }

    /// DEBUG-OFF ( -- ) errors only.
    pub fn f_debug_off(&mut self) -> ForthResult {
        self.msg.set_level(DebugLevel::Error);
        Ok(())
    }
}

/////////////////////////
/// TESTS
///
#[cfg(test)]
mod tests {
    use crate::internals::console::OutputDevice;
    use crate::runtime::ForthRuntime;

    fn boot() -> ForthRuntime {
        let mut rt = ForthRuntime::new();
        rt.out = OutputDevice::Capture(Vec::new());
        rt.cold_start().expect("cold start");
        rt
    }

    #[test]
    fn test_dot_s_shows_depth_and_items() {
        let mut rt = boot();
        rt.interpret_text("1 2 3 .S").unwrap();
        assert_eq!(rt.out.take_captured(), "<3> 1 2 3 \n");
        assert_eq!(rt.ctx.depth(), 3); // .S does not consume
    }

    #[test]
    fn test_dot_s_honors_base() {
        let mut rt = boot();
        rt.interpret_text("255 HEX .S DECIMAL").unwrap();
        assert_eq!(rt.out.take_captured(), "<1> FF \n");
    }

    #[test]
    fn test_words_lists_dictionary() {
        let mut rt = boot();
        rt.interpret_text("WORDS").unwrap();
        let listing = rt.out.take_captured();
        assert!(listing.contains("SWAP"));
        assert!(listing.contains("SM/REM"));
        assert!(listing.contains("words"));
    }

    #[test]
    fn test_see_decompiles_colon_definition() {
        let mut rt = boot();
        rt.interpret_text(": SQ DUP * ;").unwrap();
        rt.interpret_text("SEE SQ").unwrap();
        assert_eq!(rt.out.take_captured(), ": SQ DUP * ;\n");
    }

    #[test]
    fn test_see_shows_literals() {
        let mut rt = boot();
        rt.interpret_text(": TWELVE 12 ;").unwrap();
        rt.interpret_text("SEE TWELVE").unwrap();
        assert_eq!(rt.out.take_captured(), ": TWELVE 12 ;\n");
    }

    #[test]
    fn test_see_variable_and_constant() {
        let mut rt = boot();
        rt.interpret_text("VARIABLE V 9 CONSTANT NINE").unwrap();
        rt.interpret_text("SEE NINE").unwrap();
        assert_eq!(rt.out.take_captured(), "9 CONSTANT NINE\n");
        rt.interpret_text("SEE V").unwrap();
        assert!(rt.out.take_captured().starts_with("VARIABLE V"));
    }

    #[test]
    fn test_question_mark_prints_cell() {
        let mut rt = boot();
        rt.interpret_text("VARIABLE V 77 V ! V ?").unwrap();
        assert_eq!(rt.out.take_captured(), "77 ");
    }

    #[test]
    fn test_dump_runs_over_dictionary_start() {
        let mut rt = boot();
        rt.interpret_text("0 32 DUMP").unwrap();
        let dump = rt.out.take_captured();
        assert!(dump.contains("00000000:"));
        assert!(dump.contains("|"));
    }
}
