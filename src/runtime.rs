//////////////////////////////////////////////////////////////
/// Forth Runtime Engine
///
/// This module defines the ForthRuntime struct, which packages the shared
/// interpreter state: the memory kernel, the dictionary head, the builtin
/// function table, the cached addresses of the system variables, and the
/// active execution context. It also provides cold_start, the dictionary
/// management and word-creation helpers, the abort/quit machinery, and
/// the REPL driver.
///
use crate::context::Context;
use crate::errors::{ForthError, ForthResult};
use crate::internals::builtin::{BuiltInFn, Code, BUILTIN_DEFINITIONS};
use crate::internals::console::OutputDevice;
use crate::internals::messages::Msg;
use crate::internals::tui::LineReader;
use crate::kernel::{
    Addr, Cell, Cfunc, Kernel, CELL_SIZE, FLAG_IMMEDIATE, MEM_SIZE, OFF_PARAM, PAD_ADDR,
    WORD_RECORD_BYTES,
};

pub const INPUT_BUFFER_SIZE: u32 = 256;

pub const TRUE: Cell = -1;
pub const FALSE: Cell = 0;

// Loop-compilation limits. A frame is pushed by DO and resolved by
// LOOP / +LOOP; LEAVE records patch sites into the open frame.
pub const MAX_LOOP_DEPTH: usize = 8;
pub const MAX_LEAVE_SITES: usize = 32;

pub struct LoopFrame {
    pub loop_top: Addr,
    pub leaves: [Addr; MAX_LEAVE_SITES],
    pub leave_count: usize,
}

pub struct ForthRuntime {
    pub kernel: Kernel,               // data space and dictionary storage
    pub ctx: Context,                 // the active execution context
    pub builtins: Vec<BuiltInFn>,     // primitive function table
    pub head: Addr,                   // most recently linked word, 0 = empty
    pub state_addr: Addr,             // STATE cell (param field of the STATE word)
    pub base_addr: Addr,              // BASE cell
    pub input_addr: Addr,             // input region: buffer, length, >IN
    pub input_len_addr: Addr,
    pub to_in_addr: Addr,
    pub compiling_word: Addr,         // open definition, 0 when none (for RECURSE)
    pub loop_stack: Vec<LoopFrame>,   // DO/LOOP compilation frames
    pub msg: Msg,
    pub out: OutputDevice,
}

impl ForthRuntime {
    pub fn new() -> ForthRuntime {
        ForthRuntime {
            kernel: Kernel::new(),
            ctx: Context::new("REPL", false),
            builtins: Vec::new(),
            head: 0,
            state_addr: 0,
            base_addr: 0,
            input_addr: 0,
            input_len_addr: 0,
            to_in_addr: 0,
            compiling_word: 0,
            loop_stack: Vec::new(),
            msg: Msg::new(),
            out: OutputDevice::Stdout,
        }
    }

    /// cold_start builds the dictionary from nothing: the input region at
    /// the bottom of data space, then the primitives, then the high-level
    /// definitions compiled by the system's own outer interpreter.
    pub fn cold_start(&mut self) -> ForthResult {
        self.input_system_init()?;
        self.compile_builtins()?;
        self.kernel.store(self.state_addr, FALSE)?;
        self.install_definitions(BUILTIN_DEFINITIONS)?;
        self.install_definitions(crate::internals::tools::TOOLS_DEFINITIONS)?;
        self.msg
            .info("cold-start", "dictionary ready", Some(self.kernel.here()));
        Ok(())
    }

    /// The input region sits below every word record, which keeps address
    /// 0 free to serve as the null link.
    fn input_system_init(&mut self) -> ForthResult {
        self.input_addr = self.kernel.allot(INPUT_BUFFER_SIZE)?;
        self.input_len_addr = self.kernel.allot(CELL_SIZE)?;
        self.to_in_addr = self.kernel.allot(CELL_SIZE)?;
        self.kernel.store(self.input_len_addr, 0)?;
        self.kernel.store(self.to_in_addr, 0)?;
        Ok(())
    }

    /// Compile each source line with the outer interpreter and insist it
    /// leaves the system in interpret state; anything else is a fatal
    /// bootstrap defect.
    fn install_definitions(&mut self, definitions: &[&str]) -> ForthResult {
        for line in definitions {
            self.msg.debug("cold-start", "defining", Some(line));
            self.interpret_text(line)?;
            if self.state()? != FALSE {
                return Err(ForthError::Message(format!(
                    "definition left the system in compile state: {line}"
                )));
            }
        }
        Ok(())
    }

    // Word creation

    /// Allocate and initialize a word record; the link is left for
    /// link_word so defining words control visibility explicitly.
    fn create_word(&mut self, name: &str, cfunc: Cfunc) -> Result<Addr, ForthError> {
        let word = self.kernel.allot(WORD_RECORD_BYTES)?;
        self.kernel.write_link(word, 0)?;
        self.kernel.write_name(word, name)?;
        self.kernel.write_flags(word, 0)?;
        self.kernel.write_cfunc(word, cfunc)?;
        let here = self.kernel.here();
        self.kernel.write_param(word, here as Cell)?;
        Ok(word)
    }

    pub fn link_word(&mut self, word: Addr) -> ForthResult {
        self.kernel.write_link(word, self.head)?;
        self.head = word;
        Ok(())
    }

    /// The shared kernel of `:`, CREATE, VARIABLE and friends: parse a
    /// name from the input, build a record with the given behavior, link
    /// it, and leave param pointing at the first free cell after it.
    pub fn defining_word(&mut self, cfunc: Cfunc) -> Result<Addr, ForthError> {
        let name = self
            .parse_name_token()?
            .ok_or_else(|| ForthError::Compile("missing name in definition".to_owned()))?;
        let word = self.create_word(&name, cfunc)?;
        self.link_word(word)?;
        Ok(word)
    }

    pub fn create_primitive(&mut self, name: &str, code: Code, doc: &str) -> Result<Addr, ForthError> {
        let index = self.builtins.len();
        self.builtins.push(BuiltInFn::new(name.to_owned(), code, doc.to_owned()));
        let word = self.create_word(name, Cfunc::Primitive(index))?;
        self.link_word(word)?;
        Ok(word)
    }

    pub fn create_immediate_primitive(
        &mut self,
        name: &str,
        code: Code,
        doc: &str,
    ) -> Result<Addr, ForthError> {
        let word = self.create_primitive(name, code, doc)?;
        self.kernel.write_flags(word, FLAG_IMMEDIATE)?;
        Ok(word)
    }

    /// Create a variable word and return the address of its value cell
    /// (the param field itself).
    pub fn create_variable(&mut self, name: &str, initial: Cell) -> Result<Addr, ForthError> {
        let word = self.create_word(name, Cfunc::AddressOf)?;
        self.kernel.write_param(word, initial)?;
        self.link_word(word)?;
        Ok(word + OFF_PARAM)
    }

    /// Expose a fixed buffer (such as PAD) as a word that pushes the
    /// buffer's address.
    pub fn create_area(&mut self, name: &str, addr: Addr) -> Result<Addr, ForthError> {
        let word = self.create_word(name, Cfunc::ParamValue)?;
        self.kernel.write_param(word, addr as Cell)?;
        self.link_word(word)?;
        Ok(word)
    }

    // Public registration surface for host peripheral bindings (GPIO,
    // timers, and the like compile their native side effects behind these).

    pub fn register_primitive(&mut self, name: &str, code: Code, doc: &str) -> ForthResult {
        self.create_primitive(name, code, doc).map(|_| ())
    }

    pub fn register_immediate_primitive(&mut self, name: &str, code: Code, doc: &str) -> ForthResult {
        self.create_immediate_primitive(name, code, doc).map(|_| ())
    }

    // Dictionary lookup

    /// Walk the chain head-first; the most recent definition shadows
    /// earlier ones. Returns None on a miss.
    pub fn search_word(&self, name: &str) -> Result<Option<Addr>, ForthError> {
        let mut word = self.head;
        while word != 0 {
            if self.kernel.name_matches(word, name)? {
                return Ok(Some(word));
            }
            word = self.kernel.read_link(word)?;
        }
        Ok(None)
    }

    pub fn find_word(&self, name: &str) -> Result<Addr, ForthError> {
        self.search_word(name)?
            .ok_or_else(|| ForthError::Message(format!("word not found: {name}")))
    }

    // Stack shorthands on the active context

    pub fn push(&mut self, value: Cell) -> ForthResult {
        self.ctx.push(value)
    }

    pub fn pop(&mut self) -> Result<Cell, ForthError> {
        self.ctx.pop()
    }

    // Byte access with transient routing: data-space bytes go to the
    // kernel, PAD/WORD/pictured addresses go to the active context.

    pub fn c_fetch(&self, addr: Addr) -> Result<u8, ForthError> {
        if addr < MEM_SIZE {
            self.kernel.c_fetch(addr)
        } else {
            self.ctx.transient_fetch(addr)
        }
    }

    pub fn c_store(&mut self, addr: Addr, value: u8) -> ForthResult {
        if addr < MEM_SIZE {
            self.kernel.c_store(addr, value)
        } else {
            self.ctx.transient_store(addr, value)
        }
    }

    /// Byte fetch at a user-supplied base plus offset; the addition is
    /// checked so addresses near the top of the u32 range fault instead
    /// of wrapping into the data space.
    pub fn byte_at(&self, addr: Addr, offset: u32) -> Result<u8, ForthError> {
        let target = addr
            .checked_add(offset)
            .ok_or(ForthError::InvalidAddress(addr))?;
        self.c_fetch(target)
    }

    /// Exchange the active execution context. A callback adapter (timer
    /// tick, interrupt handler) swaps its own context in before running
    /// user-level words and swaps back after; the primary context is
    /// untouched in between. Data space and the dictionary stay shared.
    pub fn swap_context(&mut self, other: &mut Context) {
        std::mem::swap(&mut self.ctx, other);
    }

    // System variables

    pub fn state(&self) -> Result<Cell, ForthError> {
        self.kernel.fetch(self.state_addr)
    }

    pub fn set_state(&mut self, compiling: bool) -> ForthResult {
        self.kernel
            .store(self.state_addr, if compiling { TRUE } else { FALSE })
    }

    /// BASE, clamped to decimal when out of range for both parse and
    /// print.
    pub fn base(&self) -> Result<Cell, ForthError> {
        let base = self.kernel.fetch(self.base_addr)?;
        Ok(if (2..=36).contains(&base) { base } else { 10 })
    }

    // Abort machinery. The words reset their own slice of the state and
    // return a control variant; the REPL decides where execution resumes.

    /// QUIT ( -- ) reset ip, the return stack, and STATE, then unwind to
    /// the REPL top. The data stack survives.
    pub fn f_quit(&mut self) -> ForthResult {
        self.quit_reset()?;
        Err(ForthError::Quit)
    }

    /// ABORT ( -- ) empty the data stack and QUIT.
    pub fn f_abort(&mut self) -> ForthResult {
        self.ctx.clear_data();
        self.ctx.clear_floats();
        self.quit_reset()?;
        Err(ForthError::Abort)
    }

    /// BYE ( -- ) leave the interpreter.
    pub fn f_bye(&mut self) -> ForthResult {
        Err(ForthError::Bye)
    }

    fn quit_reset(&mut self) -> ForthResult {
        self.ctx.ip = 0;
        self.ctx.clear_return();
        self.loop_stack.clear();
        self.compiling_word = 0;
        self.kernel.store(self.state_addr, FALSE)?;
        Ok(())
    }

    /// Per-line cleanup after a diagnosable fault: everything ABORT does.
    /// Data space, the dictionary, HERE and BASE are left alone.
    pub fn abort_reset(&mut self) {
        self.ctx.clear_data();
        self.ctx.clear_floats();
        let _ = self.quit_reset();
    }

    // The REPL driver

    /// Read lines through the external line editor, feed each to the
    /// outer interpreter, and print a depth indicator when the stack is
    /// not empty. All aborts land back here with per-line state already
    /// reset.
    pub fn repl(&mut self) {
        let mut reader = LineReader::new();
        loop {
            let prompt = match self.state() {
                Ok(s) if s != FALSE => "compiling> ",
                _ => "ok> ",
            };
            let line = match reader.read_line(prompt) {
                Some(line) => line,
                None => break, // EOF
            };
            if line.trim().is_empty() {
                continue;
            }
            match self.interpret_text(&line) {
                Ok(()) => {
                    if self.ctx.depth() > 0 {
                        self.out.write_str(&format!(" <{}>", self.ctx.depth()));
                    }
                    self.out.write_str(" ok\n");
                    self.out.flush();
                }
                Err(ForthError::Bye) => break,
                Err(ForthError::Quit) | Err(ForthError::Abort) => {}
                Err(e) => {
                    self.out.flush();
                    println!("ERROR: {e}");
                    self.abort_reset();
                }
            }
        }
        self.out.write_str("Goodbye!\n");
        self.out.flush();
    }

    /// Set up all the words that are implemented in Rust. Each one gets a
    /// dictionary record and a slot in the builtin table; the doc string
    /// feeds SEE.
    fn compile_builtins(&mut self) -> ForthResult {
        self.create_primitive("+", ForthRuntime::f_plus, "+ ( n1 n2 -- n3 ) Add n1 and n2")?;
        self.create_primitive("-", ForthRuntime::f_minus, "- ( n1 n2 -- n3 ) Subtract n2 from n1")?;
        self.create_primitive("*", ForthRuntime::f_times, "* ( n1 n2 -- n3 ) Multiply n1 by n2")?;
        self.create_primitive("/", ForthRuntime::f_divide,
            "/ ( n1 n2 -- n3 ) Divide n1 by n2, truncating toward zero")?;
        self.create_primitive("DROP", ForthRuntime::f_drop, "DROP ( x -- ) Remove the top item")?;
        self.create_primitive("SWAP", ForthRuntime::f_swap,
            "SWAP ( x1 x2 -- x2 x1 ) Exchange the top two items")?;
        self.create_primitive("ROT", ForthRuntime::f_rot,
            "ROT ( x1 x2 x3 -- x2 x3 x1 ) Rotate the third item to the top")?;
        self.create_primitive("PICK", ForthRuntime::f_pick,
            "PICK ( xu .. x0 u -- xu .. x0 xu ) Copy the u-th item to the top; 0 PICK is DUP")?;
        self.create_primitive("ROLL", ForthRuntime::f_roll,
            "ROLL ( xu .. x0 u -- xu-1 .. x0 xu ) Rotate u+1 items, bringing the u-th to the top")?;
        self.create_primitive("DEPTH", ForthRuntime::f_depth,
            "DEPTH ( -- n ) Number of cells on the data stack")?;
        self.create_primitive("=", ForthRuntime::f_equals,
            "= ( x1 x2 -- flag ) True when x1 equals x2")?;
        self.create_primitive("<", ForthRuntime::f_less_than,
            "< ( n1 n2 -- flag ) Signed less-than")?;
        self.create_primitive("U<", ForthRuntime::f_u_less,
            "U< ( u1 u2 -- flag ) Unsigned less-than")?;
        self.create_primitive("0=", ForthRuntime::f_zero_equals,
            "0= ( x -- flag ) True when x is zero")?;
        self.create_primitive("!", ForthRuntime::f_store, "! ( x addr -- ) Store x at addr")?;
        self.create_primitive("@", ForthRuntime::f_fetch, "@ ( addr -- x ) Fetch the cell at addr")?;
        self.create_primitive("C!", ForthRuntime::f_c_store,
            "C! ( char addr -- ) Store the low byte of char at addr")?;
        self.create_primitive("C@", ForthRuntime::f_c_fetch,
            "C@ ( addr -- char ) Fetch the byte at addr")?;
        self.create_primitive("HERE", ForthRuntime::f_here,
            "HERE ( -- addr ) The data space allocation cursor")?;
        self.create_primitive("ALLOT", ForthRuntime::f_allot,
            "ALLOT ( n -- ) Reserve n bytes of data space")?;
        self.create_primitive(",", ForthRuntime::f_comma,
            ", ( x -- ) Store x at HERE and advance HERE one cell")?;
        self.create_primitive("AND", ForthRuntime::f_and, "AND ( x1 x2 -- x3 ) Bitwise and")?;
        self.create_primitive("OR", ForthRuntime::f_or, "OR ( x1 x2 -- x3 ) Bitwise inclusive-or")?;
        self.create_primitive("XOR", ForthRuntime::f_xor, "XOR ( x1 x2 -- x3 ) Bitwise exclusive-or")?;
        self.create_primitive("INVERT", ForthRuntime::f_invert,
            "INVERT ( x1 -- x2 ) Bitwise inversion")?;
        self.create_primitive("SM/REM", ForthRuntime::f_sm_rem,
            "SM/REM ( d1 n1 -- n2 n3 ) Symmetric division of a double by a single; remainder takes the dividend's sign")?;
        self.create_primitive("FM/MOD", ForthRuntime::f_fm_mod,
            "FM/MOD ( d1 n1 -- n2 n3 ) Floored division of a double by a single; remainder takes the divisor's sign")?;
        self.create_primitive("M*", ForthRuntime::f_m_star,
            "M* ( n1 n2 -- d ) Signed double-cell product, low cell first")?;
        self.create_primitive(">R", ForthRuntime::f_to_r,
            ">R ( x -- ) ( R: -- x ) Move the top item to the return stack")?;
        self.create_primitive("R>", ForthRuntime::f_r_from,
            "R> ( -- x ) ( R: x -- ) Move the top return-stack item back")?;
        self.create_primitive("R@", ForthRuntime::f_r_fetch,
            "R@ ( -- x ) ( R: x -- x ) Copy the top of the return stack")?;
        self.create_primitive("EMIT", ForthRuntime::f_emit,
            "EMIT ( char -- ) Write the low 8 bits to the output device")?;
        self.create_primitive("KEY", ForthRuntime::f_key,
            "KEY ( -- char ) Read one character; 0 on end of input")?;
        self.create_primitive("TYPE", ForthRuntime::f_type,
            "TYPE ( c-addr u -- ) Write u bytes, clipping at the data-space ceiling")?;
        self.create_primitive("ACCEPT", ForthRuntime::f_accept,
            "ACCEPT ( c-addr n -- n2 ) Read up to n characters from the terminal into c-addr")?;
        self.create_primitive(".", ForthRuntime::f_dot,
            ". ( n -- ) Print the top item in the current BASE")?;
        self.create_primitive("SOURCE", ForthRuntime::f_source,
            "SOURCE ( -- c-addr u ) The input buffer and its length")?;
        self.create_primitive(">IN", ForthRuntime::f_to_in,
            ">IN ( -- addr ) Address of the parse cursor")?;
        self.create_primitive("QUIT", ForthRuntime::f_quit,
            "QUIT ( -- ) Reset execution state and return to the prompt")?;
        self.create_primitive("ABORT", ForthRuntime::f_abort,
            "ABORT ( i*x -- ) Empty the data stack and QUIT")?;
        self.create_primitive("BYE", ForthRuntime::f_bye, "BYE ( -- ) Leave the interpreter")?;

        // STATE and BASE live in their own param fields
        self.state_addr = self.create_variable("STATE", FALSE)?;
        self.base_addr = self.create_variable("BASE", 10)?;

        self.create_primitive(":", ForthRuntime::f_colon, ": <name> ( -- ) Begin a definition")?;
        self.create_immediate_primitive(";", ForthRuntime::f_semicolon,
            "; ( -- ) End a definition and return to interpret state")?;
        self.create_primitive("EXIT", ForthRuntime::f_exit,
            "EXIT ( -- ) ( R: nest-sys -- ) Return from a colon definition")?;
        self.create_primitive("IMMEDIATE", ForthRuntime::f_immediate,
            "IMMEDIATE ( -- ) Mark the most recent definition immediate")?;
        self.create_immediate_primitive("RECURSE", ForthRuntime::f_recurse,
            "RECURSE ( -- ) Compile a call to the definition being compiled")?;

        // Inline-data runtimes compiled by the words below them
        self.create_primitive("LIT", ForthRuntime::f_lit,
            "LIT ( -- x ) Push the literal cell that follows in the token stream")?;
        self.create_primitive("0BRANCH", ForthRuntime::f_zero_branch,
            "0BRANCH ( flag -- ) Branch to the inline target when flag is zero")?;
        self.create_primitive("BRANCH", ForthRuntime::f_branch,
            "BRANCH ( -- ) Branch to the inline target")?;
        self.create_primitive("(.\")", ForthRuntime::f_dot_quote_runtime,
            "(.\") ( -- ) Emit the inline string that follows")?;
        self.create_primitive("(ABORT\")", ForthRuntime::f_abort_quote_runtime,
            "(ABORT\") ( flag -- ) Print the inline string and abort when flag is nonzero")?;
        self.create_primitive("(S\")", ForthRuntime::f_s_quote_runtime,
            "(S\") ( -- c-addr u ) Push the inline string that follows")?;
        self.create_primitive("(DO)", ForthRuntime::f_do_runtime,
            "(DO) ( limit start -- ) ( R: -- loop-sys ) Begin a counted loop")?;
        self.create_primitive("(LOOP)", ForthRuntime::f_loop_runtime,
            "(LOOP) ( -- ) ( R: loop-sys -- | loop-sys ) Step the index by one")?;
        self.create_primitive("(+LOOP)", ForthRuntime::f_plus_loop_runtime,
            "(+LOOP) ( n -- ) ( R: loop-sys -- | loop-sys ) Step the index by n; ends when the step crosses the limit")?;
        self.create_primitive("(LEAVE)", ForthRuntime::f_leave_runtime,
            "(LEAVE) ( -- ) ( R: loop-sys -- ) Discard the loop and jump past it")?;
        self.create_primitive("I", ForthRuntime::f_i,
            "I ( -- n ) The innermost loop index")?;
        self.create_primitive("J", ForthRuntime::f_j,
            "J ( -- n ) The next outer loop index")?;
        self.create_primitive("UNLOOP", ForthRuntime::f_unloop,
            "UNLOOP ( -- ) ( R: loop-sys -- ) Discard one set of loop parameters")?;

        self.create_immediate_primitive(".\"", ForthRuntime::f_dot_quote,
            ".\" <text>\" ( -- ) Print text; compiles it inline inside a definition")?;
        self.create_immediate_primitive("ABORT\"", ForthRuntime::f_abort_quote,
            "ABORT\" <text>\" ( flag -- ) Abort with a message when flag is nonzero")?;
        self.create_immediate_primitive("S\"", ForthRuntime::f_s_quote,
            "S\" <text>\" ( -- c-addr u ) A string literal")?;
        self.create_immediate_primitive("(", ForthRuntime::f_paren,
            "( ( -- ) Comment to the closing paren")?;

        self.create_area("PAD", PAD_ADDR)?;

        self.create_primitive("CREATE", ForthRuntime::f_create,
            "CREATE <name> ( -- ) Define a word that pushes its data address")?;
        self.create_primitive("VARIABLE", ForthRuntime::f_variable,
            "VARIABLE <name> ( -- ) Define a cell variable initialized to 0")?;
        self.create_primitive("CONSTANT", ForthRuntime::f_constant,
            "CONSTANT <name> ( n -- ) Define a word that pushes n")?;
        self.create_primitive("VALUE", ForthRuntime::f_value,
            "VALUE <name> ( n -- ) Like CONSTANT, but assignable with TO")?;
        self.create_immediate_primitive("TO", ForthRuntime::f_to,
            "TO <name> ( n -- ) Store n into a VALUE")?;

        self.create_immediate_primitive("[']", ForthRuntime::f_bracket_tick,
            "['] <name> ( -- ) Compile the execution token of name as a literal")?;
        self.create_primitive("'", ForthRuntime::f_tick,
            "' <name> ( -- xt ) Push the execution token of name")?;
        self.create_primitive("EXECUTE", ForthRuntime::f_execute,
            "EXECUTE ( i*x xt -- j*x ) Execute the word whose token is xt")?;
        self.create_primitive("FIND", ForthRuntime::f_find,
            "FIND ( c-addr -- c-addr 0 | xt 1 | xt -1 ) Dictionary search; -1 marks an immediate word")?;

        self.create_immediate_primitive("DO", ForthRuntime::f_do,
            "DO ( limit start -- ) Begin compiling a counted loop")?;
        self.create_immediate_primitive("LOOP", ForthRuntime::f_loop,
            "LOOP ( -- ) Close a counted loop, stepping by one")?;
        self.create_immediate_primitive("+LOOP", ForthRuntime::f_plus_loop,
            "+LOOP ( n -- ) Close a counted loop, stepping by n")?;
        self.create_immediate_primitive("LEAVE", ForthRuntime::f_leave,
            "LEAVE ( -- ) Exit the innermost loop immediately")?;

        self.create_primitive("PARSE-NAME", ForthRuntime::f_parse_name,
            "PARSE-NAME ( -- c-addr u ) Parse a space-delimited name from the input")?;
        self.create_primitive("PARSE", ForthRuntime::f_parse,
            "PARSE ( char -- c-addr u ) Parse up to the delimiter char")?;
        self.create_primitive("WORD", ForthRuntime::f_word,
            "WORD ( char -- c-addr ) Parse a token and leave it counted in PAD")?;

        self.create_primitive("DEBUG-ON", ForthRuntime::f_debug_on,
            "DEBUG-ON ( -- ) Raise diagnostics to debug level")?;
        self.create_primitive("DEBUG-OFF", ForthRuntime::f_debug_off,
            "DEBUG-OFF ( -- ) Errors only")?;

        // Tools word set
        self.create_primitive(".S", ForthRuntime::f_dot_s,
            ".S ( -- ) Display the data stack, bottom first")?;
        self.create_primitive("WORDS", ForthRuntime::f_words,
            "WORDS ( -- ) List the dictionary, newest first")?;
        self.create_primitive("DUMP", ForthRuntime::f_dump,
            "DUMP ( addr u -- ) Hex dump of u bytes at addr")?;
        self.create_primitive("SEE", ForthRuntime::f_see,
            "SEE <name> ( -- ) Decompile a word")?;

        // Floating word set
        self.create_primitive("FDROP", ForthRuntime::f_fdrop, "FDROP ( F: r -- )")?;
        self.create_primitive("FDUP", ForthRuntime::f_fdup, "FDUP ( F: r -- r r )")?;
        self.create_primitive("F+", ForthRuntime::f_f_plus, "F+ ( F: r1 r2 -- r3 )")?;
        self.create_primitive("F-", ForthRuntime::f_f_minus, "F- ( F: r1 r2 -- r3 )")?;
        self.create_primitive("F*", ForthRuntime::f_f_times, "F* ( F: r1 r2 -- r3 )")?;
        self.create_primitive("F/", ForthRuntime::f_f_divide, "F/ ( F: r1 r2 -- r3 )")?;
        self.create_primitive("F.", ForthRuntime::f_f_dot, "F. ( F: r -- ) Print the top float")?;
        self.create_primitive("FLIT", ForthRuntime::f_flit,
            "FLIT ( F: -- r ) Push the inline double that follows, low cell first")?;

        Ok(())
    }
}

/////////////////////////
/// TESTS
///
#[cfg(test)]
mod tests {
    use super::*;

    fn boot() -> ForthRuntime {
        let mut rt = ForthRuntime::new();
        rt.out = OutputDevice::Capture(Vec::new());
        rt.cold_start().expect("cold start");
        rt
    }

    #[test]
    fn test_cold_start_ends_in_interpret_state() {
        let rt = boot();
        assert_eq!(rt.state().unwrap(), FALSE);
        assert_eq!(rt.ctx.depth(), 0);
    }

    #[test]
    fn test_dictionary_monotonic_and_terminates() {
        let rt = boot();
        let mut word = rt.head;
        let mut steps = 0;
        while word != 0 {
            let link = rt.kernel.read_link(word).unwrap();
            assert!(link == 0 || link < word, "link must point strictly earlier");
            word = link;
            steps += 1;
            assert!(steps < 10_000, "link chain must terminate");
        }
        assert!(steps > 50, "bootstrap dictionary should be substantial");
    }

    #[test]
    fn test_search_finds_most_recent_first() {
        let mut rt = boot();
        let original = rt.search_word("DUP").unwrap().unwrap();
        rt.interpret_text(": DUP 0 PICK ;").unwrap();
        let shadow = rt.search_word("dup").unwrap().unwrap();
        assert!(shadow > original);
    }

    #[test]
    fn test_create_variable_round_trip() {
        let mut rt = boot();
        let addr = rt.create_variable("TEN", 10).unwrap();
        assert_eq!(rt.kernel.fetch(addr).unwrap(), 10);
        rt.interpret_text("32 TEN !").unwrap();
        assert_eq!(rt.kernel.fetch(addr).unwrap(), 32);
        rt.interpret_text("TEN @").unwrap();
        assert_eq!(rt.pop().unwrap(), 32);
    }

    #[test]
    fn test_register_primitive_is_callable() {
        fn sample(rt: &mut ForthRuntime) -> ForthResult {
            let b = rt.pop()?;
            let a = rt.pop()?;
            rt.push(a + b)
        }
        let mut rt = boot();
        rt.register_primitive("ADD2", sample, "test word").unwrap();
        rt.interpret_text("10 32 ADD2").unwrap();
        assert_eq!(rt.pop().unwrap(), 42);
    }

    #[test]
    fn test_abort_preserves_dictionary_and_here() {
        let mut rt = boot();
        rt.interpret_text(": SQ DUP * ;").unwrap();
        let here = rt.kernel.here();
        let err = rt.interpret_text("1 2 NO-SUCH-WORD").unwrap_err();
        assert!(matches!(err, ForthError::NotFound(_)));
        rt.abort_reset();
        assert_eq!(rt.kernel.here(), here);
        assert_eq!(rt.ctx.depth(), 0);
        rt.interpret_text("7 SQ").unwrap();
        assert_eq!(rt.pop().unwrap(), 49);
    }

    #[test]
    fn test_register_immediate_primitive_executes_while_compiling() {
        fn mark(rt: &mut ForthRuntime) -> ForthResult {
            rt.kernel.store(rt.base_addr, 12)
        }
        let mut rt = boot();
        rt.register_immediate_primitive("MARK12", mark, "test word")
            .unwrap();
        rt.interpret_text(": T MARK12 ;").unwrap();
        // the immediate word ran during compilation, not at T's runtime
        assert_eq!(rt.kernel.fetch(rt.base_addr).unwrap(), 12);
    }

    #[test]
    fn test_builtin_table_carries_names() {
        let rt = boot();
        assert_eq!(rt.builtins[0].name, "+");
        assert!(rt.builtins.iter().any(|b| b.name == "SM/REM"));
    }

    #[test]
    fn test_swap_context_isolates_stacks() {
        let mut rt = boot();
        rt.interpret_text("11 22").unwrap();
        let mut timer_ctx = Context::new("TIMER_IRQ", true);
        rt.swap_context(&mut timer_ctx);
        rt.interpret_text("1 2 +").unwrap();
        assert_eq!(rt.ctx.data_slice(), &[3]);
        rt.swap_context(&mut timer_ctx);
        // the primary context is exactly as it was
        assert_eq!(rt.ctx.data_slice(), &[11, 22]);
        assert_eq!(rt.ctx.name, "REPL");
        assert!(timer_ctx.is_interrupt_handler);
    }

    #[test]
    fn test_base_clamps_to_decimal() {
        let mut rt = boot();
        rt.interpret_text("99 BASE !").unwrap();
        assert_eq!(rt.base().unwrap(), 10);
        rt.interpret_text("16 BASE !").unwrap();
        assert_eq!(rt.base().unwrap(), 16);
    }
}
