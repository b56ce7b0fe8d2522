/// General-purpose primitive words
///
/// Arithmetic, stack shuffling, memory access, comparison, bitwise and
/// return-stack operations. Everything here follows the ANS flag
/// convention: true is -1, false is 0.
///
use crate::errors::{ForthError, ForthResult};
use crate::kernel::{Addr, Cell, CELL_SIZE};
use crate::runtime::{ForthRuntime, FALSE, TRUE};

impl ForthRuntime {
    fn pop2(&mut self) -> Result<(Cell, Cell), ForthError> {
        let n2 = self.pop()?;
        let n1 = self.pop()?;
        Ok((n1, n2))
    }

    /// + ( n1 n2 -- n3 )
    pub fn f_plus(&mut self) -> ForthResult {
        let (n1, n2) = self.pop2()?;
        self.push(n1.wrapping_add(n2))
    }

    /// - ( n1 n2 -- n3 )
    pub fn f_minus(&mut self) -> ForthResult {
        let (n1, n2) = self.pop2()?;
        self.push(n1.wrapping_sub(n2))
    }

    /// * ( n1 n2 -- n3 )
    pub fn f_times(&mut self) -> ForthResult {
        let (n1, n2) = self.pop2()?;
        self.push(n1.wrapping_mul(n2))
    }

    /// / ( n1 n2 -- n3 ) native signed division, truncating toward zero.
    pub fn f_divide(&mut self) -> ForthResult {
        let (n1, n2) = self.pop2()?;
        if n2 == 0 {
            return Err(ForthError::DivisionByZero);
        }
        self.push(n1.wrapping_div(n2))
    }

    /// DROP ( x -- )
    pub fn f_drop(&mut self) -> ForthResult {
        self.pop()?;
        Ok(())
    }

    /// SWAP ( x1 x2 -- x2 x1 )
    pub fn f_swap(&mut self) -> ForthResult {
        let (x1, x2) = self.pop2()?;
        self.push(x2)?;
        self.push(x1)
    }

    /// ROT ( x1 x2 x3 -- x2 x3 x1 )
    pub fn f_rot(&mut self) -> ForthResult {
        let x3 = self.pop()?;
        let (x1, x2) = self.pop2()?;
        self.push(x2)?;
        self.push(x3)?;
        self.push(x1)
    }

    /// PICK ( xu .. x0 u -- xu .. x0 xu )
    pub fn f_pick(&mut self) -> ForthResult {
        let u = self.pop()?;
        if u < 0 {
            return Err(ForthError::StackUnderflow);
        }
        let xu = self.ctx.peek_at(u as usize)?;
        self.push(xu)
    }

    /// ROLL ( xu .. x0 u -- xu-1 .. x0 xu )
    pub fn f_roll(&mut self) -> ForthResult {
        let u = self.pop()?;
        if u < 0 {
            return Err(ForthError::StackUnderflow);
        }
        self.ctx.roll(u as usize)
    }

    /// DEPTH ( -- n )
    pub fn f_depth(&mut self) -> ForthResult {
        let depth = self.ctx.depth() as Cell;
        self.push(depth)
    }

    /// = ( x1 x2 -- flag )
    pub fn f_equals(&mut self) -> ForthResult {
        let (x1, x2) = self.pop2()?;
        self.push(if x1 == x2 { TRUE } else { FALSE })
    }

    /// < ( n1 n2 -- flag ) signed comparison.
    pub fn f_less_than(&mut self) -> ForthResult {
        let (n1, n2) = self.pop2()?;
        self.push(if n1 < n2 { TRUE } else { FALSE })
    }

    /// U< ( u1 u2 -- flag ) unsigned comparison.
    pub fn f_u_less(&mut self) -> ForthResult {
        let (n1, n2) = self.pop2()?;
        self.push(if (n1 as u32) < (n2 as u32) { TRUE } else { FALSE })
    }

    /// 0= ( x -- flag )
    pub fn f_zero_equals(&mut self) -> ForthResult {
        let x = self.pop()?;
        self.push(if x == 0 { TRUE } else { FALSE })
    }

    /// ! ( x addr -- )
    pub fn f_store(&mut self) -> ForthResult {
        let addr = self.pop()? as Addr;
        let x = self.pop()?;
        self.kernel.store(addr, x)
    }

    /// @ ( addr -- x )
    pub fn f_fetch(&mut self) -> ForthResult {
        let addr = self.pop()? as Addr;
        let x = self.kernel.fetch(addr)?;
        self.push(x)
    }

    /// C! ( char addr -- ) byte store, routed through the transient map.
    pub fn f_c_store(&mut self) -> ForthResult {
        let addr = self.pop()? as Addr;
        let value = self.pop()?;
        self.c_store(addr, (value & 0xff) as u8)
    }

    /// C@ ( addr -- char )
    pub fn f_c_fetch(&mut self) -> ForthResult {
        let addr = self.pop()? as Addr;
        let value = self.c_fetch(addr)?;
        self.push(value as Cell)
    }

    /// HERE ( -- addr )
    pub fn f_here(&mut self) -> ForthResult {
        let here = self.kernel.here();
        self.push(here as Cell)
    }

    /// ALLOT ( n -- ) reserve data space; a negative n gives it back.
    pub fn f_allot(&mut self) -> ForthResult {
        let n = self.pop()?;
        if n >= 0 {
            self.kernel.allot(n as u32)?;
        } else {
            let here = self.kernel.here() as i64 + n as i64;
            if here < 0 {
                return Err(ForthError::InvalidAddress(0));
            }
            self.kernel.set_here(here as Addr);
            self.kernel.align();
        }
        Ok(())
    }

    /// , ( x -- ) store x at HERE and advance one cell.
    pub fn f_comma(&mut self) -> ForthResult {
        let x = self.pop()?;
        self.kernel.align();
        let here = self.kernel.here();
        self.kernel.store(here, x)?;
        self.kernel.set_here(here + CELL_SIZE);
        Ok(())
    }

    /// AND ( x1 x2 -- x3 )
    pub fn f_and(&mut self) -> ForthResult {
        let (x1, x2) = self.pop2()?;
        self.push(x1 & x2)
    }

    /// OR ( x1 x2 -- x3 )
    pub fn f_or(&mut self) -> ForthResult {
        let (x1, x2) = self.pop2()?;
        self.push(x1 | x2)
    }

    /// XOR ( x1 x2 -- x3 )
    pub fn f_xor(&mut self) -> ForthResult {
        let (x1, x2) = self.pop2()?;
        self.push(x1 ^ x2)
    }

    /// INVERT ( x1 -- x2 )
    pub fn f_invert(&mut self) -> ForthResult {
        let x = self.pop()?;
        self.push(!x)
    }

    fn pop_double_and_divisor(&mut self) -> Result<(i64, i64), ForthError> {
        let divisor = self.pop()?;
        if divisor == 0 {
            return Err(ForthError::DivisionByZero);
        }
        let hi = self.pop()?;
        let lo = self.pop()?;
        let dividend = ((hi as i64) << 32) | (lo as u32 as i64);
        Ok((dividend, divisor as i64))
    }

    fn push_rem_quot(&mut self, remainder: i64, quotient: i64) -> ForthResult {
        if quotient < Cell::MIN as i64
            || quotient > Cell::MAX as i64
            || remainder < Cell::MIN as i64
            || remainder > Cell::MAX as i64
        {
            return Err(ForthError::Message("division result out of range".to_owned()));
        }
        self.push(remainder as Cell)?;
        self.push(quotient as Cell)
    }

    /// SM/REM ( d1 n1 -- n2 n3 ) symmetric double/single division; the
    /// remainder carries the dividend's sign.
    pub fn f_sm_rem(&mut self) -> ForthResult {
        let (dividend, divisor) = self.pop_double_and_divisor()?;
        let quotient = dividend / divisor;
        let remainder = dividend % divisor;
        self.push_rem_quot(remainder, quotient)
    }

    /// FM/MOD ( d1 n1 -- n2 n3 ) floored double/single division; the
    /// remainder carries the divisor's sign. Derived from the symmetric
    /// result: when the remainder is nonzero and disagrees in sign with
    /// the divisor, step the quotient down and fold the divisor in.
    pub fn f_fm_mod(&mut self) -> ForthResult {
        let (dividend, divisor) = self.pop_double_and_divisor()?;
        let mut quotient = dividend / divisor;
        let mut remainder = dividend % divisor;
        if remainder != 0 && (remainder > 0) != (divisor > 0) {
            quotient -= 1;
            remainder += divisor;
        }
        self.push_rem_quot(remainder, quotient)
    }

    /// M* ( n1 n2 -- d ) signed double-cell product, low cell first.
    pub fn f_m_star(&mut self) -> ForthResult {
        let (n1, n2) = self.pop2()?;
        let product = n1 as i64 * n2 as i64;
        self.push(product as Cell)?;
        self.push((product >> 32) as Cell)
    }

    /// >R ( x -- ) ( R: -- x )
    pub fn f_to_r(&mut self) -> ForthResult {
        let x = self.pop()?;
        self.ctx.rpush(x)
    }

    /// R> ( -- x ) ( R: x -- )
    pub fn f_r_from(&mut self) -> ForthResult {
        let x = self.ctx.rpop()?;
        self.push(x)
    }

    /// R@ ( -- x ) ( R: x -- x )
    pub fn f_r_fetch(&mut self) -> ForthResult {
        let x = self.ctx.rpeek(0)?;
        self.push(x)
    }
}

/////////////////////////
/// TESTS
///
#[cfg(test)]
mod tests {
    use super::*;
    use crate::internals::console::OutputDevice;

    fn boot() -> ForthRuntime {
        let mut rt = ForthRuntime::new();
        rt.out = OutputDevice::Capture(Vec::new());
        rt.cold_start().expect("cold start");
        rt
    }

    fn run(code: &str) -> Vec<Cell> {
        let mut rt = boot();
        rt.interpret_text(code).expect(code);
        rt.ctx.data_slice().to_vec()
    }

    #[test]
    fn test_stack_laws() {
        assert_eq!(run("1 2 SWAP"), vec![2, 1]);
        assert_eq!(run("7 DUP"), vec![7, 7]);
        assert_eq!(run("1 2 OVER"), vec![1, 2, 1]);
        assert_eq!(run("1 2 3 ROT"), vec![2, 3, 1]);
        assert_eq!(run("1 2 NIP"), vec![2]);
        assert_eq!(run("1 2 TUCK"), vec![2, 1, 2]);
        assert_eq!(run("1 2 3 4 2SWAP"), vec![3, 4, 1, 2]);
        assert_eq!(run("1 2 3 4 2OVER"), vec![1, 2, 3, 4, 1, 2]);
    }

    #[test]
    fn test_pick_and_roll() {
        assert_eq!(run("10 20 30 0 PICK"), vec![10, 20, 30, 30]);
        assert_eq!(run("10 20 30 2 PICK"), vec![10, 20, 30, 10]);
        assert_eq!(run("10 20 30 2 ROLL"), vec![20, 30, 10]);
        assert_eq!(run("10 20 30 0 ROLL"), vec![10, 20, 30]);
    }

    #[test]
    fn test_arithmetic_laws() {
        assert_eq!(run("5 9 + 9 -"), vec![5]);
        assert_eq!(run("5 0 +"), vec![5]);
        assert_eq!(run("5 1 *"), vec![5]);
        assert_eq!(run("2 3 + 4 *"), vec![20]);
        assert_eq!(run("100 25 - 30 10 +"), vec![75, 40]);
    }

    #[test]
    fn test_division_truncates_toward_zero() {
        assert_eq!(run("7 2 /"), vec![3]);
        assert_eq!(run("-7 2 /"), vec![-3]);
        assert_eq!(run("7 -2 /"), vec![-3]);
    }

    #[test]
    fn test_division_by_zero_aborts() {
        let mut rt = boot();
        let err = rt.interpret_text("1 0 /").unwrap_err();
        assert_eq!(err, ForthError::DivisionByZero);
    }

    #[test]
    fn test_sm_rem_remainder_sign_follows_dividend() {
        // ( d n -- rem quot ), dividend pushed low then high
        assert_eq!(run("7 0 3 SM/REM"), vec![1, 2]);
        assert_eq!(run("-7 -1 3 SM/REM"), vec![-1, -2]);
        assert_eq!(run("7 0 -3 SM/REM"), vec![1, -2]);
        assert_eq!(run("-7 -1 -3 SM/REM"), vec![-1, 2]);
    }

    #[test]
    fn test_fm_mod_remainder_sign_follows_divisor() {
        assert_eq!(run("7 0 3 FM/MOD"), vec![1, 2]);
        assert_eq!(run("-7 -1 3 FM/MOD"), vec![2, -3]);
        assert_eq!(run("7 0 -3 FM/MOD"), vec![-2, -3]);
        assert_eq!(run("-7 -1 -3 FM/MOD"), vec![-1, 2]);
    }

    #[test]
    fn test_division_identity_holds_for_both() {
        for (a, b) in [(17, 5), (-17, 5), (17, -5), (-17, -5), (12, 4)] {
            for op in ["SM/REM", "FM/MOD"] {
                let code = format!("{a} {hi} {b} {op}", hi = if a < 0 { -1 } else { 0 });
                let stack = run(&code);
                let (rem, quot) = (stack[0] as i64, stack[1] as i64);
                assert_eq!(quot * b as i64 + rem, a as i64, "{code}");
            }
        }
    }

    #[test]
    fn test_m_star_pushes_low_then_high() {
        assert_eq!(run("2 3 M*"), vec![6, 0]);
        assert_eq!(run("-1 -1 M*"), vec![1, 0]);
        // 0x7fffffff * 2 = 0xfffffffe -> low = -2, high = 0
        assert_eq!(run("2147483647 2 M*"), vec![-2, 0]);
        assert_eq!(run("-2 2147483647 M*"), vec![2, -1]);
    }

    #[test]
    fn test_derived_division_words() {
        assert_eq!(run("9 3 MOD"), vec![0]);
        assert_eq!(run("7 3 MOD"), vec![1]);
        assert_eq!(run("-7 3 MOD"), vec![-1]); // symmetric, like /
        assert_eq!(run("7 3 /MOD"), vec![1, 2]);
        assert_eq!(run("10 20 7 */"), vec![28]);
        assert_eq!(run("10 20 7 */MOD"), vec![4, 28]);
    }

    #[test]
    fn test_bitwise_words() {
        assert_eq!(run("12 10 AND"), vec![8]);
        assert_eq!(run("12 10 OR"), vec![14]);
        assert_eq!(run("12 10 XOR"), vec![6]);
        assert_eq!(run("0 INVERT"), vec![-1]);
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run("1 2 <"), vec![-1]);
        assert_eq!(run("2 1 <"), vec![0]);
        assert_eq!(run("3 3 ="), vec![-1]);
        assert_eq!(run("0 0="), vec![-1]);
        assert_eq!(run("-1 1 U<"), vec![0]); // -1 is a huge unsigned value
        assert_eq!(run("1 -1 U<"), vec![-1]);
        assert_eq!(run("2 1 >"), vec![-1]);
        assert_eq!(run("1 2 <>"), vec![-1]);
        assert_eq!(run("5 1 10 WITHIN"), vec![-1]);
        assert_eq!(run("10 1 10 WITHIN"), vec![0]);
    }

    #[test]
    fn test_min_max_abs_negate() {
        assert_eq!(run("3 5 MIN"), vec![3]);
        assert_eq!(run("3 5 MAX"), vec![5]);
        assert_eq!(run("-3 ABS"), vec![3]);
        assert_eq!(run("3 NEGATE"), vec![-3]);
        assert_eq!(run("-5 SIGNUM 0 SIGNUM 5 SIGNUM"), vec![-1, 0, 1]);
    }

    #[test]
    fn test_memory_words() {
        let mut rt = boot();
        rt.interpret_text("VARIABLE V 123 V ! V @").unwrap();
        assert_eq!(rt.pop().unwrap(), 123);
        rt.interpret_text("V 1 + C@").unwrap(); // second byte of 123
        assert_eq!(rt.pop().unwrap(), 0);
    }

    #[test]
    fn test_cell_arithmetic_words() {
        assert_eq!(run("8 CELL+"), vec![12]);
        assert_eq!(run("3 CELLS"), vec![12]);
        assert_eq!(run("5 CHAR+ 1 CHARS"), vec![6, 1]);
    }

    #[test]
    fn test_plus_store() {
        let mut rt = boot();
        rt.interpret_text("VARIABLE V 10 V ! 32 V +! V @").unwrap();
        assert_eq!(rt.pop().unwrap(), 42);
    }

    #[test]
    fn test_two_cell_store_fetch() {
        let mut rt = boot();
        rt.interpret_text("CREATE PAIR 8 ALLOT 11 22 PAIR 2! PAIR 2@")
            .unwrap();
        assert_eq!(rt.ctx.data_slice(), &[11, 22]);
    }

    #[test]
    fn test_return_stack_pairing() {
        assert_eq!(run(": T 5 >R 6 R@ R> ; T"), vec![6, 5, 5]);
    }

    #[test]
    fn test_allot_alignment_property() {
        let mut rt = boot();
        for n in [1, 2, 3, 5, 7, 9] {
            rt.interpret_text(&format!("{n} ALLOT")).unwrap();
            assert_eq!(rt.kernel.here() % CELL_SIZE, 0);
        }
    }

    #[test]
    fn test_transient_cell_access_fails() {
        let mut rt = boot();
        // PAD is byte-addressable but not cell-addressable
        let err = rt.interpret_text("PAD @").unwrap_err();
        assert!(matches!(err, ForthError::InvalidAddress(_)));
    }

    #[test]
    fn test_pad_byte_access_routes_to_context() {
        let mut rt = boot();
        rt.interpret_text("65 PAD C! PAD C@").unwrap();
        assert_eq!(rt.pop().unwrap(), 65);
        assert_eq!(rt.ctx.transient_fetch(crate::kernel::PAD_ADDR).unwrap(), 65);
    }
}
