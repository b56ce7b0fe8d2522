/// Outer text interpreter and compiler
///
/// The outer interpreter parses whitespace-delimited names from the input
/// region, resolves each against the dictionary, and either executes or
/// compiles it according to STATE and the immediate flag. Unresolved
/// tokens fall through to the BASE-aware integer parser and then, when
/// BASE is decimal, to the float parser.
///
/// The compiling words at the bottom of this file are the immediate words
/// that lay down tokens, inline literals, and branch fixups; the control
/// structures IF..THEN and BEGIN..REPEAT are bootstrapped in Forth on top
/// of them (see builtin.rs), while DO..LOOP compiles through the loop
/// frame stack so LEAVE sites can be patched.
///
use crate::errors::{ForthError, ForthResult};
use crate::kernel::{Addr, Cell, Cfunc, CELL_SIZE, FLAG_IMMEDIATE, MEM_SIZE, OFF_PARAM};
use crate::runtime::{ForthRuntime, LoopFrame, INPUT_BUFFER_SIZE, MAX_LEAVE_SITES, MAX_LOOP_DEPTH};

impl ForthRuntime {
    // Input region management

    /// Install text in the input region and reset the parse cursor.
    pub fn set_input_buffer(&mut self, text: &str) -> ForthResult {
        let bytes = text.as_bytes();
        let len = bytes.len().min(INPUT_BUFFER_SIZE as usize - 1);
        for (i, &b) in bytes[..len].iter().enumerate() {
            self.kernel.c_store(self.input_addr + i as u32, b)?;
        }
        self.kernel.c_store(self.input_addr + len as u32, 0)?;
        self.kernel.store(self.input_len_addr, len as Cell)?;
        self.kernel.store(self.to_in_addr, 0)?;
        Ok(())
    }

    fn to_in(&self) -> Result<Cell, ForthError> {
        self.kernel.fetch(self.to_in_addr)
    }

    fn set_to_in(&mut self, value: Cell) -> ForthResult {
        self.kernel.store(self.to_in_addr, value)
    }

    fn input_len(&self) -> Result<Cell, ForthError> {
        self.kernel.fetch(self.input_len_addr)
    }

    fn skip_spaces(&mut self) -> ForthResult {
        let len = self.input_len()?;
        let mut cursor = self.to_in()?;
        while cursor < len {
            let b = self.kernel.c_fetch(self.input_addr + cursor as u32)?;
            if !b.is_ascii_whitespace() {
                break;
            }
            cursor += 1;
        }
        self.set_to_in(cursor)
    }

    /// Parse the next whitespace-delimited token; None at end of source.
    pub fn parse_name_token(&mut self) -> Result<Option<String>, ForthError> {
        self.skip_spaces()?;
        let len = self.input_len()?;
        let mut cursor = self.to_in()?;
        let mut token = String::new();
        while cursor < len {
            let b = self.kernel.c_fetch(self.input_addr + cursor as u32)?;
            if b.is_ascii_whitespace() {
                break;
            }
            token.push(b as char);
            cursor += 1;
        }
        self.set_to_in(cursor)?;
        Ok(if token.is_empty() { None } else { Some(token) })
    }

    /// Read from >IN up to the delimiter, consuming it when present. The
    /// return is the source-region address and length of what was read;
    /// a missing delimiter is a warning, with end-of-source as the close.
    pub fn parse_delimited(&mut self, delim: u8) -> Result<(Addr, u32), ForthError> {
        let len = self.input_len()?;
        let mut cursor = self.to_in()?;
        let start = cursor;
        let mut closed = false;
        while cursor < len {
            let b = self.kernel.c_fetch(self.input_addr + cursor as u32)?;
            cursor += 1;
            if b == delim {
                closed = true;
                break;
            }
        }
        let length = if closed { cursor - start - 1 } else { cursor - start };
        self.set_to_in(cursor)?;
        if !closed {
            self.msg
                .warning("parse", "missing closing delimiter", Some(delim as char));
        }
        Ok((self.input_addr + start as u32, length as u32))
    }

    /// The delimited-string parse used by ." S" ABORT" and the comment
    /// word. Leading whitespace is dropped before the scan.
    pub fn parse_string_text(&mut self, delim: u8) -> Result<String, ForthError> {
        self.skip_spaces()?;
        let (addr, len) = self.parse_delimited(delim)?;
        let mut text = String::new();
        for i in 0..len {
            text.push(self.kernel.c_fetch(addr + i)? as char);
        }
        Ok(text)
    }

    // Number conversion

    /// BASE-aware signed integer parse. Overflow is a hard reject, not a
    /// wraparound.
    pub fn try_parse_number(&self, token: &str) -> Result<Option<Cell>, ForthError> {
        let base = self.base()?;
        let mut chars = token.bytes().peekable();
        let negative = match chars.peek() {
            Some(b'-') => {
                chars.next();
                true
            }
            Some(b'+') => {
                chars.next();
                false
            }
            _ => false,
        };
        let mut value: Cell = 0;
        let mut any = false;
        for c in chars {
            let digit = match char_to_digit(c, base) {
                Some(d) => d,
                None => return Ok(None),
            };
            if value > (Cell::MAX - digit) / base {
                return Ok(None); // would overflow
            }
            value = value * base + digit;
            any = true;
        }
        if !any {
            return Ok(None);
        }
        Ok(Some(if negative { -value } else { value }))
    }

    // Compilation support

    /// Lay one token cell down at HERE.
    pub fn compile_token(&mut self, token: Addr) -> ForthResult {
        if self.state()? == 0 {
            return Err(ForthError::Compile("not compiling".to_owned()));
        }
        self.kernel.align();
        let here = self.kernel.here();
        if here + CELL_SIZE > MEM_SIZE {
            return Err(ForthError::OutOfMemory);
        }
        self.kernel.store(here, token as Cell)?;
        self.kernel.set_here(here + CELL_SIZE);
        Ok(())
    }

    /// Compile LIT plus its inline value.
    pub fn compile_literal(&mut self, value: Cell) -> ForthResult {
        let lit = self.find_word("LIT")?;
        self.compile_token(lit)?;
        self.compile_token(value as Addr)
    }

    /// Compile a runtime word plus an inline counted byte payload,
    /// re-aligned for the next token.
    fn compile_inline_string(&mut self, runtime_name: &str, text: &str) -> ForthResult {
        let runtime = self.find_word(runtime_name)?;
        self.compile_token(runtime)?;
        self.compile_token(text.len() as Addr)?;
        let mut here = self.kernel.here();
        if here as usize + text.len() > MEM_SIZE as usize {
            return Err(ForthError::OutOfMemory);
        }
        for b in text.bytes() {
            self.kernel.c_store(here, b)?;
            here += 1;
        }
        self.kernel.set_here(here);
        self.kernel.align();
        Ok(())
    }

    // The outer interpreter

    /// Consume the input region token by token: immediate words always
    /// execute, other words execute or compile by STATE, and unresolved
    /// tokens go through the number parsers.
    pub fn interpret(&mut self) -> ForthResult {
        loop {
            let token = match self.parse_name_token()? {
                Some(token) => token,
                None => break,
            };
            if let Some(word) = self.search_word(&token)? {
                let immediate = self.kernel.read_flags(word)? & FLAG_IMMEDIATE != 0;
                if immediate || self.state()? == 0 {
                    self.execute_word(word)?;
                } else {
                    self.compile_token(word)?;
                }
            } else if let Some(number) = self.try_parse_number(&token)? {
                if self.state()? == 0 {
                    self.push(number)?;
                } else {
                    self.compile_literal(number)?;
                }
            } else if let Some(float) = self.try_parse_float(&token)? {
                if self.state()? == 0 {
                    self.ctx.fpush(float)?;
                } else {
                    self.compile_float_literal(float)?;
                }
            } else {
                return Err(ForthError::NotFound(token));
            }
        }
        Ok(())
    }

    /// The programmatic entry: install text, reset >IN, interpret.
    pub fn interpret_text(&mut self, text: &str) -> ForthResult {
        self.set_input_buffer(text)?;
        self.interpret()
    }

    // Defining and referencing words

    /// : <name> ( -- ) starts a new definition
    ///     Creates the colon header, records it for RECURSE, and enters
    ///     compile state. Definitions never nest.
    ///
    pub fn f_colon(&mut self) -> ForthResult {
        if self.state()? != 0 {
            return Err(ForthError::Compile("':' inside a definition".to_owned()));
        }
        let word = self.defining_word(Cfunc::Colon)?;
        self.compiling_word = word;
        self.set_state(true)
    }

    /// ; ( -- ) terminates a definition
    ///     Compiles EXIT, closes the open header, and returns to
    ///     interpret state.
    ///
    pub fn f_semicolon(&mut self) -> ForthResult {
        if self.state()? == 0 {
            return Err(ForthError::Compile("';' without matching ':'".to_owned()));
        }
        if !self.loop_stack.is_empty() {
            self.loop_stack.clear();
            return Err(ForthError::Compile(
                "definition ends inside DO ... LOOP".to_owned(),
            ));
        }
        let exit = self.find_word("EXIT")?;
        self.compile_token(exit)?;
        self.compiling_word = 0;
        self.set_state(false)
    }

    /// CREATE <name> ( -- ) makes a new dictionary entry
    ///     The new word pushes its data-space address when executed.
    ///
    pub fn f_create(&mut self) -> ForthResult {
        self.defining_word(Cfunc::ParamAddress)?;
        Ok(())
    }

    /// VARIABLE <name> ( -- ) creates a cell variable
    ///     The value lives in the word's own param field, initialized to 0.
    ///
    pub fn f_variable(&mut self) -> ForthResult {
        let word = self.defining_word(Cfunc::AddressOf)?;
        self.kernel.write_param(word, 0)
    }

    /// CONSTANT <name> ( n -- )
    pub fn f_constant(&mut self) -> ForthResult {
        let value = self.pop()?;
        let word = self.defining_word(Cfunc::ParamValue)?;
        self.kernel.write_param(word, value)
    }

    /// VALUE <name> ( n -- ) creates a constant assignable with TO
    pub fn f_value(&mut self) -> ForthResult {
        let value = self.pop()?;
        let word = self.defining_word(Cfunc::ParamValue)?;
        self.kernel.write_param(word, value)
    }

    /// TO <name> ( n -- ) stores n into the named word's param field
    ///     Inside a definition it compiles the store instead.
    ///
    pub fn f_to(&mut self) -> ForthResult {
        let name = self
            .parse_name_token()?
            .ok_or_else(|| ForthError::Compile("missing name after TO".to_owned()))?;
        let word = self.find_word(&name)?;
        let param_addr = word + OFF_PARAM;
        if self.state()? == 0 {
            let value = self.pop()?;
            self.kernel.store(param_addr, value)
        } else {
            self.compile_literal(param_addr as Cell)?;
            let store = self.find_word("!")?;
            self.compile_token(store)
        }
    }

    /// ' <name> ( -- xt )
    pub fn f_tick(&mut self) -> ForthResult {
        let name = self
            .parse_name_token()?
            .ok_or_else(|| ForthError::Compile("missing name after '".to_owned()))?;
        let word = self.find_word(&name)?;
        self.push(word as Cell)
    }

    /// ['] <name> ( -- ) compiles the execution token of name as a literal
    ///     The compile-time twin of the tick word: the name is parsed
    ///     now, the token is pushed at run time.
    ///
    pub fn f_bracket_tick(&mut self) -> ForthResult {
        let name = self
            .parse_name_token()?
            .ok_or_else(|| ForthError::Compile("missing name after [']".to_owned()))?;
        let word = self.find_word(&name)?;
        self.compile_literal(word as Cell)
    }

    /// FIND ( c-addr -- c-addr 0 | xt 1 | xt -1 ) counted-string lookup
    ///     Returns -1 for an immediate word, 1 for a normal word, 0 when
    ///     the name is not in the dictionary.
    ///
    pub fn f_find(&mut self) -> ForthResult {
        let c_addr = self.pop()? as Addr;
        let length = self.c_fetch(c_addr)? as u32;
        let mut name = String::new();
        for i in 0..length {
            name.push(self.byte_at(c_addr, 1 + i)? as char);
        }
        match self.search_word(&name)? {
            Some(word) => {
                self.push(word as Cell)?;
                let immediate = self.kernel.read_flags(word)? & FLAG_IMMEDIATE != 0;
                self.push(if immediate { -1 } else { 1 })
            }
            None => {
                self.push(c_addr as Cell)?;
                self.push(0)
            }
        }
    }

    /// IMMEDIATE ( -- ) sets the immediate flag on the most recent definition
    pub fn f_immediate(&mut self) -> ForthResult {
        if self.head == 0 {
            return Err(ForthError::Compile("no word to make immediate".to_owned()));
        }
        let flags = self.kernel.read_flags(self.head)?;
        self.kernel.write_flags(self.head, flags | FLAG_IMMEDIATE)
    }

    /// RECURSE ( -- ) compiles a call to the definition being compiled
    pub fn f_recurse(&mut self) -> ForthResult {
        if self.compiling_word == 0 {
            return Err(ForthError::Compile("RECURSE outside a definition".to_owned()));
        }
        let word = self.compiling_word;
        self.compile_token(word)
    }

    /// ( ( -- ) discards input up to the closing paren
    pub fn f_paren(&mut self) -> ForthResult {
        self.parse_delimited(b')')?;
        Ok(())
    }

    // DO .. LOOP compilation through the loop frame stack

    /// DO ( -- ) begins compiling a counted loop
    ///     Compiles (DO) and opens a loop frame holding the loop-top.
    ///
    pub fn f_do(&mut self) -> ForthResult {
        if self.loop_stack.len() >= MAX_LOOP_DEPTH {
            return Err(ForthError::Compile("loops nested too deeply".to_owned()));
        }
        let do_runtime = self.find_word("(DO)")?;
        self.compile_token(do_runtime)?;
        self.loop_stack.push(LoopFrame {
            loop_top: self.kernel.here(),
            leaves: [0; MAX_LEAVE_SITES],
            leave_count: 0,
        });
        Ok(())
    }

    /// LOOP ( -- ) closes a counted loop
    ///     Compiles (LOOP) with the loop-top and patches every LEAVE site
    ///     to just past the loop.
    ///
    pub fn f_loop(&mut self) -> ForthResult {
        self.close_loop("(LOOP)")
    }

    /// +LOOP ( -- ) closes a counted loop with the stack-supplied increment
    pub fn f_plus_loop(&mut self) -> ForthResult {
        self.close_loop("(+LOOP)")
    }

    fn close_loop(&mut self, runtime_name: &str) -> ForthResult {
        let frame = self
            .loop_stack
            .pop()
            .ok_or_else(|| ForthError::Compile("LOOP without DO".to_owned()))?;
        let runtime = self.find_word(runtime_name)?;
        self.compile_token(runtime)?;
        self.compile_token(frame.loop_top)?;
        let past_loop = self.kernel.here();
        for site in &frame.leaves[..frame.leave_count] {
            self.kernel.store(*site, past_loop as Cell)?;
        }
        Ok(())
    }

    /// LEAVE ( -- ) exits the innermost loop at run time
    ///     Compiles (LEAVE) with a placeholder target, recorded in the
    ///     open frame for LOOP to patch.
    ///
    pub fn f_leave(&mut self) -> ForthResult {
        if self.loop_stack.is_empty() {
            return Err(ForthError::Compile("LEAVE outside a loop".to_owned()));
        }
        let leave_runtime = self.find_word("(LEAVE)")?;
        self.compile_token(leave_runtime)?;
        let site = self.kernel.here();
        self.compile_token(0)?;
        let frame = self.loop_stack.last_mut().expect("frame checked above");
        if frame.leave_count >= MAX_LEAVE_SITES {
            return Err(ForthError::Compile("too many LEAVEs in one loop".to_owned()));
        }
        frame.leaves[frame.leave_count] = site;
        frame.leave_count += 1;
        Ok(())
    }

    // String-literal words; interpret state acts at once, compile state
    // lays the runtime word and payload inline.

    /// ." <text>"
    pub fn f_dot_quote(&mut self) -> ForthResult {
        let text = self.parse_string_text(b'"')?;
        if self.state()? == 0 {
            self.out.write_str(&text);
            self.out.flush();
            Ok(())
        } else {
            self.compile_inline_string("(.\")", &text)
        }
    }

    /// S" <text>" ( -- c-addr u ) a string literal
    ///     At interpret time the bytes land in PAD.
    ///
    pub fn f_s_quote(&mut self) -> ForthResult {
        let text = self.parse_string_text(b'"')?;
        if self.state()? == 0 {
            let (addr, len) = self.ctx.pad_string(text.as_bytes());
            self.push(addr as Cell)?;
            self.push(len as Cell)
        } else {
            self.compile_inline_string("(S\")", &text)
        }
    }

    /// ABORT" <text>" ( flag -- )
    pub fn f_abort_quote(&mut self) -> ForthResult {
        let text = self.parse_string_text(b'"')?;
        if self.state()? == 0 {
            let flag = self.pop()?;
            if flag != 0 {
                self.out.write_str(&text);
                self.out.write_str("\n");
                self.out.flush();
                return self.f_abort();
            }
            Ok(())
        } else {
            self.compile_inline_string("(ABORT\")", &text)
        }
    }

    // Parsing primitives exposed as words

    /// PARSE-NAME ( -- c-addr u )
    pub fn f_parse_name(&mut self) -> ForthResult {
        self.skip_spaces()?;
        let len = self.input_len()?;
        let start = self.to_in()?;
        let mut cursor = start;
        while cursor < len {
            let b = self.kernel.c_fetch(self.input_addr + cursor as u32)?;
            if b.is_ascii_whitespace() {
                break;
            }
            cursor += 1;
        }
        self.set_to_in(cursor)?;
        self.push((self.input_addr + start as u32) as Cell)?;
        self.push(cursor - start)
    }

    /// PARSE ( char -- c-addr u )
    pub fn f_parse(&mut self) -> ForthResult {
        let delim = (self.pop()? & 0xff) as u8;
        let (addr, len) = self.parse_delimited(delim)?;
        self.push(addr as Cell)?;
        self.push(len as Cell)
    }

    /// WORD ( char -- c-addr ) parses a token and leaves it counted in PAD
    pub fn f_word(&mut self) -> ForthResult {
        let delim = (self.pop()? & 0xff) as u8;
        self.skip_spaces()?;
        let (addr, len) = self.parse_delimited(delim)?;
        let mut bytes = Vec::with_capacity(len as usize);
        for i in 0..len {
            bytes.push(self.kernel.c_fetch(addr + i)?);
        }
        let pad = self.ctx.pad_counted(&bytes);
        self.push(pad as Cell)
    }
}

fn char_to_digit(c: u8, base: Cell) -> Option<Cell> {
    let digit = match c {
        b'0'..=b'9' => (c - b'0') as Cell,
        b'A'..=b'Z' => (c - b'A') as Cell + 10,
        b'a'..=b'z' => (c - b'a') as Cell + 10,
        _ => return None,
    };
    if digit < base {
        Some(digit)
    } else {
        None
    }
}
