/// Builtin function table and the bootstrapped definitions
///
/// Primitives live in a table of named function pointers; a word record
/// whose cfunc is Primitive(i) dispatches through slot i. The doc string
/// is the SEE text for primitives.
///
/// BUILTIN_DEFINITIONS is the fixed list of colon definitions compiled at
/// cold start, once the primitives exist. Order matters: the control-flow
/// words come first because the later definitions use them, and every
/// line must leave the system back in interpret state.
///
use crate::errors::ForthResult;
use crate::runtime::ForthRuntime;

pub type Code = fn(&mut ForthRuntime) -> ForthResult;

pub struct BuiltInFn {
    pub name: String,
    pub code: Code,
    pub doc: String,
}

impl BuiltInFn {
    pub fn new(name: String, code: Code, doc: String) -> BuiltInFn {
        BuiltInFn { name, code, doc }
    }
}

pub const BUILTIN_DEFINITIONS: &[&str] = &[
    // Control flow scaffolding: IF compiles a conditional forward branch
    // whose target cell THEN (or ELSE) patches with HERE.
    ": IF ['] 0BRANCH , HERE 0 , ; IMMEDIATE",
    ": THEN HERE SWAP ! ; IMMEDIATE",
    ": ELSE ['] BRANCH , HERE 0 , SWAP HERE SWAP ! ; IMMEDIATE",
    // Stack words
    ": DUP 0 PICK ;",
    ": OVER 1 PICK ;",
    ": 2DUP OVER OVER ;",
    ": NIP SWAP DROP ;",
    ": TUCK SWAP OVER ;",
    ": 2DROP DROP DROP ;",
    ": 2SWAP ROT >R ROT R> ;",
    ": 2OVER 3 PICK 3 PICK ;",
    ": ?DUP DUP IF DUP THEN ;",
    ": TRUE -1 ;",
    ": FALSE 0 ;",
    ": NEGATE 0 SWAP - ;",
    ": 1+ 1 + ;",
    ": 1- 1 - ;",
    // Comparison derivations
    ": 0< 0 < ;",
    ": 0> 0 SWAP < ;",
    ": NOT 0= ;",
    ": <> = NOT ;",
    ": 0<> 0 <> ;",
    ": > SWAP < ;",
    ": <= > NOT ;",
    ": >= < NOT ;",
    ": U> SWAP U< ;",
    ": U<= U> NOT ;",
    ": U>= U< NOT ;",
    ": 2* DUP + ;",
    ": 2/ 2 / ;",
    // Division derivations over the double/single primitives
    ": S>D DUP 0< ;",
    ": MOD >R S>D R> SM/REM DROP ;",
    ": /MOD >R S>D R> SM/REM ;",
    ": */ >R M* R> FM/MOD NIP ;",
    ": */MOD >R M* R> FM/MOD ;",
    // Cell and character arithmetic
    ": CELL+ 4 + ;",
    ": CELLS 4 * ;",
    ": CHAR+ 1+ ;",
    ": CHARS ;",
    ": +! TUCK @ + SWAP ! ;",
    ": 2! TUCK ! CELL+ ! ;",
    ": 2@ DUP CELL+ @ SWAP @ ;",
    // State switches
    ": [ 0 STATE ! ; IMMEDIATE",
    ": ] -1 STATE ! ; IMMEDIATE",
    // Radix
    ": DECIMAL 10 BASE ! ;",
    ": HEX 16 BASE ! ;",
    ": BINARY 2 BASE ! ;",
    ": OCTAL 8 BASE ! ;",
    // Output
    ": BL 32 ;",
    ": CR 10 EMIT ;",
    ": SPACE BL EMIT ;",
    // Arithmetic helpers
    ": ABS DUP 0< IF NEGATE THEN ;",
    ": MIN 2DUP > IF SWAP THEN DROP ;",
    ": MAX 2DUP < IF SWAP THEN DROP ;",
    ": WITHIN OVER - >R - R> U< ;",
    ": SIGNUM DUP 0< IF DROP -1 ELSE 0> IF 1 ELSE 0 THEN THEN ;",
    ": BOUNDS OVER + SWAP ;",
    // Indefinite loops, built the same way as IF
    ": BEGIN HERE ; IMMEDIATE",
    ": AGAIN ['] BRANCH , , ; IMMEDIATE",
    ": UNTIL ['] 0BRANCH , , ; IMMEDIATE",
    ": WHILE ['] 0BRANCH , HERE 0 , SWAP ; IMMEDIATE",
    ": REPEAT ['] BRANCH , , HERE SWAP ! ; IMMEDIATE",
    ": SPACES BEGIN DUP WHILE SPACE 1- REPEAT DROP ;",
    // Alignment
    ": ALIGN HERE 3 + 3 INVERT AND HERE - ALLOT ;",
    ": ALIGNED 3 + 3 INVERT AND ;",
];

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
    fn test_every_builtin_definition_is_installed() {
        let rt = boot();
        for line in super::BUILTIN_DEFINITIONS {
            let name = line
                .split_whitespace()
                .nth(1)
                .expect("definition has a name");
            assert!(
                rt.search_word(name).unwrap().is_some(),
                "{name} missing from dictionary"
            );
        }
    }

    #[test]
    fn test_conditionals() {
        let mut rt = boot();
        rt.interpret_text(": T IF 10 ELSE 20 THEN ;").unwrap();
        rt.interpret_text("1 T 0 T").unwrap();
        assert_eq!(rt.ctx.data_slice(), &[10, 20]);
    }

    #[test]
    fn test_question_dup() {
        let mut rt = boot();
        rt.interpret_text("5 ?DUP 0 ?DUP").unwrap();
        assert_eq!(rt.ctx.data_slice(), &[5, 5, 0]);
    }

    #[test]
    fn test_begin_until() {
        let mut rt = boot();
        rt.interpret_text(": T 5 BEGIN 1- DUP 0= UNTIL ;").unwrap();
        rt.interpret_text("T").unwrap();
        assert_eq!(rt.ctx.data_slice(), &[0]);
    }

    #[test]
    fn test_begin_while_repeat() {
        let mut rt = boot();
        rt.interpret_text(": SUM 0 SWAP BEGIN DUP WHILE TUCK + SWAP 1- REPEAT DROP ;")
            .unwrap();
        rt.interpret_text("4 SUM").unwrap(); // 4+3+2+1
        assert_eq!(rt.pop().unwrap(), 10);
    }

    #[test]
    fn test_spaces_emits_blanks() {
        let mut rt = boot();
        rt.interpret_text("3 SPACES").unwrap();
        assert_eq!(rt.out.take_captured(), "   ");
        rt.interpret_text("0 SPACES").unwrap();
        assert_eq!(rt.out.take_captured(), "");
    }

    #[test]
    fn test_cr_and_bl() {
        let mut rt = boot();
        rt.interpret_text("BL EMIT CR").unwrap();
        assert_eq!(rt.out.take_captured(), " \n");
    }

    #[test]
    fn test_radix_words() {
        let mut rt = boot();
        rt.interpret_text("HEX 10 DECIMAL").unwrap();
        assert_eq!(rt.pop().unwrap(), 16);
        rt.interpret_text("BINARY 101 DECIMAL").unwrap();
        assert_eq!(rt.pop().unwrap(), 5);
        rt.interpret_text("OCTAL 17 DECIMAL").unwrap();
        assert_eq!(rt.pop().unwrap(), 15);
    }

    #[test]
    fn test_aligned() {
        let mut rt = boot();
        rt.interpret_text("5 ALIGNED 8 ALIGNED").unwrap();
        assert_eq!(rt.ctx.data_slice(), &[8, 8]);
    }

    #[test]
    fn test_align_keeps_here_aligned() {
        let mut rt = boot();
        rt.interpret_text("ALIGN").unwrap();
        assert_eq!(rt.kernel.here() % 4, 0);
    }

    #[test]
    fn test_bounds() {
        let mut rt = boot();
        rt.interpret_text("100 16 BOUNDS").unwrap();
        assert_eq!(rt.ctx.data_slice(), &[116, 100]);
    }

    #[test]
    fn test_state_closure_after_bootstrap() {
        let rt = boot();
        assert_eq!(rt.kernel.fetch(rt.state_addr).unwrap(), 0);
    }
}
