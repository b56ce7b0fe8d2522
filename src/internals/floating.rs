/// Floating-point word set
///
/// A separate per-context stack of doubles; no implicit conversion to or
/// from the integer stack. Literals are recognized only when BASE is
/// exactly decimal and the token carries a '.' or an exponent marker, so
/// plain integers always stay integers. NaN and infinity are rejected.
///
/// FLIT carries its double inline as two cells, low half first.
///
use crate::errors::{ForthError, ForthResult};
use crate::kernel::Cell;
use crate::runtime::ForthRuntime;

impl ForthRuntime {
    /// The liberal float parse: 1.5, .5, 5., 1e9, 6.02E23 and friends.
    pub fn try_parse_float(&self, token: &str) -> Result<Option<f64>, ForthError> {
        // float syntax only applies in decimal; the raw BASE cell decides
        if self.kernel.fetch(self.base_addr)? != 10 {
            return Ok(None);
        }
        if !token.contains(['.', 'e', 'E']) {
            return Ok(None);
        }
        match token.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Compile FLIT plus the double split into two cells, low half first.
    pub fn compile_float_literal(&mut self, value: f64) -> ForthResult {
        let flit = self.find_word("FLIT")?;
        self.compile_token(flit)?;
        let bits = value.to_bits();
        self.compile_token(bits as u32)?;
        self.compile_token((bits >> 32) as u32)
    }

    /// FLIT ( F: -- r ) reassemble the two inline cells.
    pub fn f_flit(&mut self) -> ForthResult {
        if self.ctx.ip == 0 {
            return Err(ForthError::Message("FLIT outside a definition".to_owned()));
        }
        let lo = self.kernel.fetch(self.ctx.ip)? as u32 as u64;
        self.ctx.ip += 4;
        let hi = self.kernel.fetch(self.ctx.ip)? as u32 as u64;
        self.ctx.ip += 4;
        self.ctx.fpush(f64::from_bits(lo | (hi << 32)))
    }

    /// FDROP ( F: r -- )
    pub fn f_fdrop(&mut self) -> ForthResult {
        self.ctx.fpop()?;
        Ok(())
    }

    /// FDUP ( F: r -- r r )
    pub fn f_fdup(&mut self) -> ForthResult {
        let r = self.ctx.fpeek()?;
        self.ctx.fpush(r)
    }

    /// F+ ( F: r1 r2 -- r3 )
    pub fn f_f_plus(&mut self) -> ForthResult {
        let r2 = self.ctx.fpop()?;
        let r1 = self.ctx.fpop()?;
        self.ctx.fpush(r1 + r2)
    }

    /// F- ( F: r1 r2 -- r3 )
    pub fn f_f_minus(&mut self) -> ForthResult {
        let r2 = self.ctx.fpop()?;
        let r1 = self.ctx.fpop()?;
        self.ctx.fpush(r1 - r2)
    }

    /// F* ( F: r1 r2 -- r3 )
    pub fn f_f_times(&mut self) -> ForthResult {
        let r2 = self.ctx.fpop()?;
        let r1 = self.ctx.fpop()?;
        self.ctx.fpush(r1 * r2)
    }

    /// F/ ( F: r1 r2 -- r3 )
    pub fn f_f_divide(&mut self) -> ForthResult {
        let r2 = self.ctx.fpop()?;
        let r1 = self.ctx.fpop()?;
        if r2 == 0.0 {
            return Err(ForthError::DivisionByZero);
        }
        self.ctx.fpush(r1 / r2)
    }

    /// F. ( F: r -- ) print the top float; whole values print without a
    /// fractional tail.
    pub fn f_f_dot(&mut self) -> ForthResult {
        let value = self.ctx.fpop()?;
        let text = if value == value.trunc() && value.abs() < 1e15 {
            format!("{} ", value as i64)
        } else {
            format!("{value} ")
        };
        self.out.write_str(&text);
        self.out.flush();
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
    fn test_float_literals_interpret() {
        let mut rt = boot();
        rt.interpret_text("1.5 2.5 F+").unwrap();
        assert_eq!(rt.ctx.fpop().unwrap(), 4.0);
        assert_eq!(rt.ctx.depth(), 0); // integer stack untouched
    }

    #[test]
    fn test_float_arithmetic() {
        let mut rt = boot();
        rt.interpret_text("7.5 2.5 F-").unwrap();
        assert_eq!(rt.ctx.fpop().unwrap(), 5.0);
        rt.interpret_text("3.0 4.0 F*").unwrap();
        assert_eq!(rt.ctx.fpop().unwrap(), 12.0);
        rt.interpret_text("9.0 2.0 F/").unwrap();
        assert_eq!(rt.ctx.fpop().unwrap(), 4.5);
    }

    #[test]
    fn test_float_literal_forms() {
        let rt = boot();
        assert_eq!(rt.try_parse_float("1.5").unwrap(), Some(1.5));
        assert_eq!(rt.try_parse_float(".5").unwrap(), Some(0.5));
        assert_eq!(rt.try_parse_float("5.").unwrap(), Some(5.0));
        assert_eq!(rt.try_parse_float("1e3").unwrap(), Some(1000.0));
        assert_eq!(rt.try_parse_float("1.2E-2").unwrap(), Some(0.012));
    }

    #[test]
    fn test_integers_are_not_floats() {
        let rt = boot();
        assert_eq!(rt.try_parse_float("123").unwrap(), None);
        assert_eq!(rt.try_parse_float("-42").unwrap(), None);
    }

    #[test]
    fn test_no_float_parse_outside_decimal() {
        let mut rt = boot();
        rt.interpret_text("HEX").unwrap();
        assert_eq!(rt.try_parse_float("1.5").unwrap(), None);
    }

    #[test]
    fn test_infinity_rejected() {
        let rt = boot();
        assert_eq!(rt.try_parse_float("1e999").unwrap(), None);
    }

    #[test]
    fn test_compiled_float_literal_round_trip() {
        let mut rt = boot();
        rt.interpret_text(": PI-ISH 3.25 ; PI-ISH").unwrap();
        assert_eq!(rt.ctx.fpop().unwrap(), 3.25);
    }

    #[test]
    fn test_fdup_fdrop() {
        let mut rt = boot();
        rt.interpret_text("2.5 FDUP F+ 9.9 FDROP").unwrap();
        assert_eq!(rt.ctx.fpop().unwrap(), 5.0);
        assert_eq!(rt.ctx.fdepth(), 0);
    }

    #[test]
    fn test_f_dot_output() {
        let mut rt = boot();
        rt.interpret_text("4.0 F. 2.5 F.").unwrap();
        assert_eq!(rt.out.take_captured(), "4 2.5 ");
    }
}
