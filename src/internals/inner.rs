/// Inner interpreter
///
/// Executing a word dispatches on its cfunc tag. Colon definitions thread
/// through their compiled token stream: each token is the absolute address
/// of another word record, fetched at ip, and EXIT is the only way the
/// thread ends. The inline-data runtimes (LIT, the branches, the loop and
/// string words) read their operands from the token stream and advance ip
/// past them.
///
use crate::errors::{ForthError, ForthResult};
use crate::kernel::{align_up, Addr, Cell, Cfunc, CELL_SIZE, OFF_PARAM};
use crate::runtime::ForthRuntime;

impl ForthRuntime {
    /// Execute a word given its record address.
    pub fn execute_word(&mut self, word: Addr) -> ForthResult {
        match self.kernel.read_cfunc(word)? {
            Cfunc::Colon => self.execute_colon(word),
            Cfunc::AddressOf => self.push((word + OFF_PARAM) as Cell),
            Cfunc::ParamValue | Cfunc::ParamAddress => {
                let value = self.kernel.read_param(word)?;
                self.push(value)
            }
            Cfunc::Primitive(index) => {
                let code = self
                    .builtins
                    .get(index)
                    .ok_or_else(|| ForthError::Message(format!("bad primitive index {index}")))?
                    .code;
                code(self)
            }
        }
    }

    /// The threaded executor. A nested call saves the caller's ip on the
    /// return stack; EXIT restores it, or clears ip at the outermost
    /// level, which is what ends the loop.
    pub fn execute_colon(&mut self, word: Addr) -> ForthResult {
        if self.ctx.ip != 0 {
            let ip = self.ctx.ip;
            self.ctx.rpush(ip as Cell)?;
        }
        self.ctx.ip = self.kernel.read_param(word)? as Addr;
        while self.ctx.ip != 0 {
            let token = self.kernel.fetch(self.ctx.ip)? as Addr;
            self.ctx.ip += CELL_SIZE;
            self.execute_word(token)?;
        }
        Ok(())
    }

    /// EXIT ( -- ) ( R: nest-sys -- ) return to the caller, or stop the
    /// thread when there is no saved ip.
    pub fn f_exit(&mut self) -> ForthResult {
        self.ctx.ip = if self.ctx.rdepth() > 0 {
            self.ctx.rpop()? as Addr
        } else {
            0
        };
        Ok(())
    }

    /// EXECUTE ( i*x xt -- j*x ) run the word whose token is on the stack.
    pub fn f_execute(&mut self) -> ForthResult {
        let xt = self.pop()? as Addr;
        self.execute_word(xt)
    }

    fn operand(&mut self) -> Result<Cell, ForthError> {
        if self.ctx.ip == 0 {
            return Err(ForthError::Message(
                "inline operand read outside a definition".to_owned(),
            ));
        }
        let value = self.kernel.fetch(self.ctx.ip)?;
        self.ctx.ip += CELL_SIZE;
        Ok(value)
    }

    /// LIT ( -- x ) push the cell that follows in the token stream.
    pub fn f_lit(&mut self) -> ForthResult {
        let value = self.operand()?;
        self.push(value)
    }

    /// BRANCH ( -- ) unconditional jump to the inline target.
    pub fn f_branch(&mut self) -> ForthResult {
        let target = self.operand()?;
        self.ctx.ip = target as Addr;
        Ok(())
    }

    /// 0BRANCH ( flag -- ) jump to the inline target when flag is zero.
    pub fn f_zero_branch(&mut self) -> ForthResult {
        let target = self.operand()?;
        if self.pop()? == 0 {
            self.ctx.ip = target as Addr;
        }
        Ok(())
    }

    // Counted loops. (DO) moves limit and index to the return stack as a
    // loop-sys pair, index on top; the closers consume it.

    /// (DO) ( limit start -- ) ( R: -- limit start )
    pub fn f_do_runtime(&mut self) -> ForthResult {
        let start = self.pop()?;
        let limit = self.pop()?;
        self.ctx.rpush(limit)?;
        self.ctx.rpush(start)
    }

    /// (LOOP) ( -- ) step the index by one; fall through when it reaches
    /// the limit, otherwise jump back to the inline loop-top.
    pub fn f_loop_runtime(&mut self) -> ForthResult {
        let target = self.operand()?;
        let index = self.ctx.rpop()?.wrapping_add(1);
        let limit = self.ctx.rpop()?;
        if index == limit {
            return Ok(()); // ip already past the target cell
        }
        self.ctx.rpush(limit)?;
        self.ctx.rpush(index)?;
        self.ctx.ip = target as Addr;
        Ok(())
    }

    /// (+LOOP) ( n -- ) step the index by n. The loop ends exactly when
    /// the step from the old index crosses the limit boundary in the
    /// direction of travel; a zero step never ends it.
    pub fn f_plus_loop_runtime(&mut self) -> ForthResult {
        let step = self.pop()? as i64;
        let target = self.operand()?;
        let old = self.ctx.rpop()? as i64;
        let limit = self.ctx.rpop()? as i64;
        let new = old + step;
        let done = if step > 0 {
            old < limit && new >= limit
        } else if step < 0 {
            old >= limit && new < limit
        } else {
            false
        };
        if done {
            return Ok(());
        }
        self.ctx.rpush(limit as Cell)?;
        self.ctx.rpush(new as Cell)?;
        self.ctx.ip = target as Addr;
        Ok(())
    }

    /// (LEAVE) ( -- ) ( R: loop-sys -- ) drop the loop parameters and
    /// jump to the inline target just past the loop.
    pub fn f_leave_runtime(&mut self) -> ForthResult {
        let target = self.operand()?;
        self.ctx.rpop()?;
        self.ctx.rpop()?;
        self.ctx.ip = target as Addr;
        Ok(())
    }

    /// I ( -- n ) the index of the innermost loop.
    pub fn f_i(&mut self) -> ForthResult {
        let index = self.ctx.rpeek(0)?;
        self.push(index)
    }

    /// J ( -- n ) the index of the next outer loop, below the inner
    /// loop-sys pair.
    pub fn f_j(&mut self) -> ForthResult {
        let index = self.ctx.rpeek(2)?;
        self.push(index)
    }

    /// UNLOOP ( -- ) ( R: loop-sys -- ) discard one loop-sys pair.
    pub fn f_unloop(&mut self) -> ForthResult {
        self.ctx.rpop()?;
        self.ctx.rpop()?;
        Ok(())
    }

    // Inline string runtimes. The compiled layout is one length cell,
    // then the raw bytes, padded up to the next cell boundary.

    fn inline_string(&mut self) -> Result<(Addr, u32), ForthError> {
        let length = self.operand()? as u32;
        let start = self.ctx.ip;
        self.ctx.ip = align_up(start.saturating_add(length));
        Ok((start, length))
    }

    /// (.") ( -- ) write the inline string.
    pub fn f_dot_quote_runtime(&mut self) -> ForthResult {
        let (start, length) = self.inline_string()?;
        for i in 0..length {
            let byte = self.c_fetch(start + i)?;
            self.out.write_byte(byte);
        }
        self.out.flush();
        Ok(())
    }

    /// (S") ( -- c-addr u ) push the inline string's address and length.
    pub fn f_s_quote_runtime(&mut self) -> ForthResult {
        let (start, length) = self.inline_string()?;
        self.push(start as Cell)?;
        self.push(length as Cell)
    }

    /// (ABORT") ( flag -- ) write the inline string and abort when the
    /// flag is nonzero; otherwise skip over it.
    pub fn f_abort_quote_runtime(&mut self) -> ForthResult {
        let flag = self.pop()?;
        let (start, length) = self.inline_string()?;
        if flag != 0 {
            for i in 0..length {
                let byte = self.c_fetch(start + i)?;
                self.out.write_byte(byte);
            }
            self.out.write_byte(b'\n');
            self.out.flush();
            return self.f_abort();
        }
        Ok(())
    }
}
