//! Statement execution.
//!
//! Every statement starts at the current token and finishes with the current
//! token on the end-of-line of the last line it used (or on end-of-stream).
//! The statement loop then steps onto the next line.
//!
//! | Statement | Form |
//! |-----------|------|
//! | declaration | `int\|double\|string\|object name [= expr], ...` |
//! | assignment | `name = expr`, `name[expr] = expr` |
//! | call | `name(args...)` |
//! | conditional | `if cond [then]` ... `[elsif cond` ... `] [else` ... `] endif`, or `if cond then stmt` |
//! | loop | `while cond` ... `endwhile` |
//! | function | `function name(kind p, ...)` ... `endfunction`, `return [expr]` |

use tracing::{debug, trace};

use crate::source::LineCursor;
use super::{
    error::ErrorKind,
    interp::{Exec, Interpreter, Unwind},
    lexer::Token,
    scope::FunctionDef,
    value::{Value, ValueKind},
};

const MISSING_ENDIF: &str = "can't find endif";
const MISSING_ENDWHILE: &str = "can't find endwhile";
const MISSING_ENDFUNCTION: &str = "can't find endfunction";

impl<C: LineCursor> Interpreter<C> {
    /// Execute the statement beginning at the current token.
    pub(super) fn statement(&mut self) -> Exec<()> {
        trace!(line = ?self.line_no(), token = %self.tok, "statement");
        match self.tok.clone() {
            Token::Decl(kind) => {
                self.declaration(kind)?;
                self.expect_line_end()
            }
            Token::If => self.if_statement(false),
            Token::While => self.while_statement(),
            Token::Return => self.return_statement(),
            Token::Function => self.function_definition(),
            Token::EndFunction => {
                if self.scope.depth() == 0 {
                    return Err(self.fail(ErrorKind::Structural, "unexpected endfunction"));
                }
                Err(Unwind::Return(Some(Value::Int(1))))
            }
            Token::EndIf => Err(self.fail(ErrorKind::Structural, "unexpected endif")),
            Token::EndWhile => Err(self.fail(ErrorKind::Structural, "unexpected endwhile")),
            Token::Else => Err(self.fail(ErrorKind::Structural, "unexpected else")),
            Token::Elsif => Err(self.fail(ErrorKind::Structural, "unexpected elsif")),
            Token::Call(name) => {
                self.advance()?;
                let args = self.call_arguments()?;
                self.call(&name, args)?;
                self.advance()?;
                self.expect_line_end()
            }
            Token::Array(name) => {
                self.array_assignment(&name)?;
                self.expect_line_end()
            }
            Token::Ident(name) => {
                self.assignment(&name)?;
                self.expect_line_end()
            }
            Token::Eol | Token::Eof => Ok(()),
            other => Err(self.fail(
                ErrorKind::Syntax,
                format!("Expected identifier, found {other}"),
            )),
        }
    }

    /// Nothing but end-of-line may follow a finished statement.
    fn expect_line_end(&self) -> Exec<()> {
        if self.tok.ends_line() {
            Ok(())
        } else {
            Err(self.fail(
                ErrorKind::Syntax,
                format!("Unexpected {} after statement", self.tok),
            ))
        }
    }

    /// Advance past a closing keyword and require the line to end there.
    fn close_block(&mut self) -> Exec<()> {
        self.advance()?;
        self.expect_line_end()
    }

    // ── Declarations and assignment ──────────────────────────────────────────

    fn declaration(&mut self, kind: ValueKind) -> Exec<()> {
        loop {
            self.advance()?;
            let Token::Ident(name) = self.tok.clone() else {
                return Err(self.fail(ErrorKind::Syntax, "Expected variable name identifier"));
            };
            self.scope
                .declare(&name, kind.zero())
                .map_err(|e| self.fail(ErrorKind::Semantic, e.to_string()))?;
            self.advance()?;
            if self.tok == Token::Assign {
                self.advance()?;
                let value = self.parse_expression()?;
                self.store_var(&name, value)?;
            }
            match self.tok {
                Token::Comma => continue,
                Token::Eol | Token::Eof => return Ok(()),
                _ => return Err(self.fail(ErrorKind::Syntax, "Expected ','")),
            }
        }
    }

    fn assignment(&mut self, name: &str) -> Exec<()> {
        self.advance()?;
        if self.tok != Token::Assign {
            return Err(self.fail(ErrorKind::Syntax, "Expected '='"));
        }
        self.advance()?;
        let value = self.parse_expression()?;
        self.store_var(name, value)
    }

    fn array_assignment(&mut self, name: &str) -> Exec<()> {
        let index = self.index_expression()?;
        self.advance()?;
        if self.tok != Token::Assign {
            return Err(self.fail(ErrorKind::Syntax, "Expected '='"));
        }
        self.advance()?;
        let value = self.parse_value("Array element")?;
        self.write_index(name, &index, value)
    }

    // ── if / elsif / else ────────────────────────────────────────────────────

    /// `elsif` re-enters here with the current token on `elsif`.
    fn if_statement(&mut self, from_elsif: bool) -> Exec<()> {
        self.advance()?;
        let cond = self.condition("if")?;

        if self.tok == Token::Then {
            self.advance()?;
            if !self.tok.ends_line() {
                if from_elsif {
                    return Err(self.fail(
                        ErrorKind::Structural,
                        "elsif must start a block, not a single-line statement",
                    ));
                }
                return if cond {
                    self.statement()
                } else {
                    self.skip_to_line_end()
                };
            }
        }
        self.expect_line_end()?;

        if cond {
            self.block(|t| matches!(t, Token::EndIf | Token::Else | Token::Elsif), MISSING_ENDIF)?;
            if self.tok != Token::EndIf {
                self.skip_if_branch(false)?;
            }
            return self.close_block();
        }

        self.skip_if_branch(true)?;
        match self.tok {
            Token::Else => {
                self.close_block()?;
                self.block(|t| *t == Token::EndIf, MISSING_ENDIF)?;
                self.close_block()
            }
            Token::Elsif => self.if_statement(true),
            _ => self.close_block(),
        }
    }

    /// Run statements from the line after the current one until a token
    /// accepted by `stop` begins a line.
    fn block(&mut self, stop: fn(&Token) -> bool, missing: &str) -> Exec<()> {
        self.advance()?;
        while !stop(&self.tok) {
            if self.tok == Token::Eof {
                return Err(self.fail(ErrorKind::Structural, missing));
            }
            self.statement()?;
            self.advance()?;
        }
        Ok(())
    }

    /// Scan forward to the `endif` closing the current `if`, or, with
    /// `stop_at_else`, to an `else`/`elsif` at the same nesting level.
    ///
    /// A single-line `if ... then stmt` does not open a block, so its `if` is
    /// not counted.
    fn skip_if_branch(&mut self, stop_at_else: bool) -> Exec<()> {
        let mut depth = 1usize;
        let mut line_opens_if = false;
        loop {
            self.advance()?;
            trace!(line = ?self.line_no(), token = %self.tok, depth, "skip");
            match self.tok {
                Token::Eof => return Err(self.fail(ErrorKind::Structural, MISSING_ENDIF)),
                Token::Eol => line_opens_if = false,
                Token::If => {
                    depth += 1;
                    line_opens_if = true;
                }
                Token::Then if line_opens_if => {
                    let next = self.lex()?;
                    if !next.ends_line() {
                        depth -= 1;
                    }
                    self.lexer.push_back(next);
                    line_opens_if = false;
                }
                Token::EndIf => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Token::Else | Token::Elsif if stop_at_else && depth == 1 => return Ok(()),
                _ => {}
            }
        }
    }

    fn skip_to_line_end(&mut self) -> Exec<()> {
        while !self.tok.ends_line() {
            self.advance()?;
        }
        Ok(())
    }

    // ── while ────────────────────────────────────────────────────────────────

    fn while_statement(&mut self) -> Exec<()> {
        let line = self.source.current_line();
        let header = self.lexer.line().to_owned();
        let cond_offset = self.lexer.offset();
        let mut iterations = 0u64;

        loop {
            self.advance()?;
            let cond = self.condition("while")?;
            self.expect_line_end()?;
            if !cond {
                break;
            }
            iterations += 1;
            debug!(line = ?self.line_no(), iterations, "while iteration");
            self.block(|t| *t == Token::EndWhile, MISSING_ENDWHILE)?;

            if self.range_end.is_some() {
                self.source.seek(line);
            }
            self.lexer.reset_to(&header, cond_offset);
            self.tok = Token::While;
        }

        let mut depth = 1usize;
        loop {
            self.advance()?;
            match self.tok {
                Token::While => depth += 1,
                Token::EndWhile => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Token::Eof => return Err(self.fail(ErrorKind::Structural, MISSING_ENDWHILE)),
                _ => {}
            }
        }
        self.close_block()
    }

    // ── functions ────────────────────────────────────────────────────────────

    fn return_statement(&mut self) -> Exec<()> {
        self.advance()?;
        let value = if self.tok.ends_line() {
            None
        } else {
            self.parse_expression()?
        };
        self.expect_line_end()?;
        Err(Unwind::Return(value))
    }

    /// Record a function's signature and line range; the body is skipped.
    fn function_definition(&mut self) -> Exec<()> {
        let start = self.source.current_line();
        self.advance()?;
        let Token::Call(name) = self.tok.clone() else {
            return Err(self.fail(ErrorKind::Syntax, "Expected function start identifier"));
        };
        self.advance()?;
        if self.tok != Token::LParen {
            return Err(self.fail(ErrorKind::Syntax, "Expected ("));
        }
        self.advance()?;

        let mut params: Vec<(ValueKind, String)> = Vec::new();
        while self.tok != Token::RParen {
            let Token::Decl(kind) = self.tok else {
                return Err(self.fail(ErrorKind::Syntax, "Expected type name"));
            };
            self.advance()?;
            let Token::Ident(param) = self.tok.clone() else {
                return Err(self.fail(
                    ErrorKind::Syntax,
                    "Expected function parameter name identifier",
                ));
            };
            if params.iter().any(|(_, p)| *p == param) {
                return Err(self.fail(
                    ErrorKind::Semantic,
                    format!("Duplicate parameter name: {param}"),
                ));
            }
            params.push((kind, param));
            self.advance()?;
            match self.tok {
                Token::Comma => self.advance()?,
                Token::RParen => {}
                _ => return Err(self.fail(ErrorKind::Syntax, "Expected ',' or ')'")),
            }
        }
        self.close_block()?;

        loop {
            self.advance()?;
            match self.tok {
                Token::EndFunction => break,
                Token::Function => {
                    return Err(self.fail(ErrorKind::Structural, "Nested functions are illegal"))
                }
                Token::Eof => return Err(self.fail(ErrorKind::Structural, MISSING_ENDFUNCTION)),
                _ => {}
            }
        }
        let end = self.source.current_line();
        self.close_block()?;

        debug!(function = %name, params = params.len(), start = start + 1, end = end + 1, "define");
        self.scope.define_function(FunctionDef {
            name,
            params,
            start,
            end,
        });
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::script::error::{ErrorKind, ScriptError};
    use crate::script::interp::Interpreter;
    use crate::script::value::Value;
    use pretty_assertions::assert_eq;

    fn run(src: &str) -> Interpreter {
        let mut it = Interpreter::new();
        it.load_str(src).expect("load failed");
        it.run().expect("run failed");
        it
    }

    fn run_err(src: &str) -> ScriptError {
        let mut it = Interpreter::new();
        it.load_str(src).expect("load failed");
        it.run().expect_err("expected failure")
    }

    fn int(it: &mut Interpreter, name: &str) -> i64 {
        match it.get_var(name) {
            Ok(Value::Int(n)) => n,
            other => panic!("{name}: {other:?}"),
        }
    }

    #[test]
    fn declarations() {
        let mut it = run("int a, b = 2, c\ndouble d = 1.5\nstring s\nobject o");
        assert_eq!(int(&mut it, "a"), 0);
        assert_eq!(int(&mut it, "b"), 2);
        assert_eq!(it.get_var("d").unwrap(), Value::Double(1.5));
        assert_eq!(it.get_var("s").unwrap(), Value::Str(String::new()));
        assert_eq!(it.get_var("o").unwrap(), Value::null());
    }

    #[test]
    fn redeclaration_fails() {
        let e = run_err("int x\nint x");
        assert_eq!(e.kind, ErrorKind::Semantic);
        assert_eq!(e.message, "Already defined in this scope: x");
    }

    #[test]
    fn assignment_type_check() {
        let e = run_err("int x\nx = \"s\"");
        assert_eq!(e.kind, ErrorKind::Semantic);
        assert!(e.message.starts_with("Incompatible types"));
    }

    #[test]
    fn assignment_to_unknown_goes_to_host() {
        let e = run_err("y = 1");
        assert_eq!(e.kind, ErrorKind::Delegation);
        assert_eq!(e.message, "Unrecognised variable y");
    }

    #[test]
    fn trailing_tokens_rejected() {
        let e = run_err("int x\nx = 1 2");
        assert_eq!(e.kind, ErrorKind::Syntax);
        let e = run_err("int x\nx = 1 ,");
        assert_eq!(e.message, "Unexpected , after statement");
    }

    #[test]
    fn comments_and_blank_lines() {
        let mut it = run("# setup\n\nint x = 1 # one\n\n   \nx = x + 1");
        assert_eq!(int(&mut it, "x"), 2);
    }

    #[test]
    fn if_else() {
        let mut it = run("int x = 5\nint r\nif x > 3\nr = 1\nelse\nr = 2\nendif");
        assert_eq!(int(&mut it, "r"), 1);
        let mut it = run("int x = 1\nint r\nif x > 3\nr = 1\nelse\nr = 2\nendif");
        assert_eq!(int(&mut it, "r"), 2);
    }

    #[test]
    fn if_with_optional_then() {
        let mut it = run("int r\nif 1 then\nr = 7\nendif");
        assert_eq!(int(&mut it, "r"), 7);
    }

    #[test]
    fn elsif_chain() {
        let src = "int x = %\nint r\nif x == 1\nr = 10\nelsif x == 2\nr = 20\nelsif x == 3\nr = 30\nelse\nr = 99\nendif";
        for (x, want) in [(1, 10), (2, 20), (3, 30), (4, 99)] {
            let mut it = run(&src.replace('%', &x.to_string()));
            assert_eq!(int(&mut it, "r"), want, "x = {x}");
        }
    }

    #[test]
    fn nested_if_is_skipped_as_a_unit() {
        let src = "int r\nif 0\nif 1\nr = 1\nelse\nr = 2\nendif\nr = 3\nelse\nr = 4\nendif";
        let mut it = run(src);
        assert_eq!(int(&mut it, "r"), 4);
    }

    #[test]
    fn single_line_if_does_not_open_a_block() {
        let src = "int r\nif 0\nif 1 then r = 1\nr = 2\nelse\nr = 3\nendif";
        let mut it = run(src);
        assert_eq!(int(&mut it, "r"), 3);

        let src = "int r\nif 1 then r = 5\nif 0 then r = 6";
        let mut it = run(src);
        assert_eq!(int(&mut it, "r"), 5);
    }

    #[test]
    fn true_branch_skips_rest_of_chain() {
        let src = "int r\nif 1\nr = 1\nelsif 1\nr = 2\nelse\nif 1 then r = 9\nr = 3\nendif\nr = r + 10";
        let mut it = run(src);
        assert_eq!(int(&mut it, "r"), 11);
    }

    #[test]
    fn missing_endif() {
        let e = run_err("if 1\nint x");
        assert_eq!((e.kind, e.message.as_str()), (ErrorKind::Structural, "can't find endif"));
        let e = run_err("if 0\nint x");
        assert_eq!(e.message, "can't find endif");
    }

    #[test]
    fn stray_block_keywords() {
        assert_eq!(run_err("endif").message, "unexpected endif");
        assert_eq!(run_err("endwhile").message, "unexpected endwhile");
        assert_eq!(run_err("else").kind, ErrorKind::Structural);
        assert_eq!(run_err("endfunction").message, "unexpected endfunction");
    }

    #[test]
    fn single_line_elsif_rejected() {
        let e = run_err("int r\nif 0\nr = 1\nelsif 1 then r = 2\nendif");
        assert_eq!(e.kind, ErrorKind::Structural);
    }

    #[test]
    fn condition_type() {
        let e = run_err("if \"s\"\nendif");
        assert_eq!(e.message, "if condition needs to be integer");
        let e = run_err("while 1.5\nendwhile");
        assert_eq!(e.message, "while condition needs to be integer");
    }

    #[test]
    fn while_loop() {
        let mut it = run("int i = 0, sum = 0\nwhile i < 5\ni = i + 1\nsum = sum + i\nendwhile");
        assert_eq!(int(&mut it, "i"), 5);
        assert_eq!(int(&mut it, "sum"), 15);
    }

    #[test]
    fn while_false_skips_nested_loops() {
        let src = "int r = 1\nwhile 0\nwhile 1\nr = 2\nendwhile\nr = 3\nendwhile\nr = r + 1";
        let mut it = run(src);
        assert_eq!(int(&mut it, "r"), 2);
    }

    #[test]
    fn nested_while() {
        let src = "int i = 0, j, n = 0\nwhile i < 3\nj = 0\nwhile j < 4\nn = n + 1\nj = j + 1\nendwhile\ni = i + 1\nendwhile";
        let mut it = run(src);
        assert_eq!(int(&mut it, "n"), 12);
    }

    #[test]
    fn while_condition_re_evaluated_mid_line() {
        let mut it = run("int i = 0\nwhile (i + 1) * 2 < 10\ni = i + 1\nendwhile");
        assert_eq!(int(&mut it, "i"), 4);
    }

    #[test]
    fn missing_endwhile() {
        assert_eq!(run_err("while 1\nint x").message, "can't find endwhile");
        assert_eq!(run_err("while 0\nint x").message, "can't find endwhile");
    }

    #[test]
    fn function_definition_and_call() {
        let mut it = run("int r\nfunction sq(int n)\nreturn n * n\nendfunction\nr = sq(7)");
        assert_eq!(int(&mut it, "r"), 49);
    }

    #[test]
    fn function_without_return_yields_one() {
        let mut it = run("int r\nfunction f()\nint unused\nendfunction\nr = f()");
        assert_eq!(int(&mut it, "r"), 1);
    }

    #[test]
    fn bare_return_yields_no_value() {
        let e = run_err("int r\nfunction f()\nreturn\nendfunction\nr = f()");
        assert_eq!(e.message, "set variable r with null value");
    }

    #[test]
    fn call_statement_discards_result() {
        let mut it = run("int n\nfunction bump()\nn = n + 1\nendfunction\nbump()\nbump()");
        assert_eq!(int(&mut it, "n"), 2);
    }

    #[test]
    fn recursion() {
        let src = "function fact(int n)\nif n <= 1\nreturn 1\nendif\nreturn n * fact(n - 1)\nendfunction\nint r = fact(10)";
        let mut it = run(src);
        assert_eq!(int(&mut it, "r"), 3_628_800);
    }

    #[test]
    fn return_inside_loop_exits_function() {
        let src = "function first_over(int limit)\nint i = 0\nwhile 1\ni = i + 1\nif i * i > limit then return i\nendwhile\nendfunction\nint r = first_over(50)";
        let mut it = run(src);
        assert_eq!(int(&mut it, "r"), 8);
    }

    #[test]
    fn argument_count_checked() {
        let e = run_err("function f(int a, string b)\nendfunction\nf(1)");
        assert_eq!(e.message, "Expected 2 parameters, Found 1");
    }

    #[test]
    fn parameter_declarations() {
        let mut it = run("function f(int a, double b, string c, object d)\nreturn c + a\nendfunction\nstring r = f(1, 2.0, \"x\", null)");
        assert_eq!(it.get_var("r").unwrap(), Value::Str("x1".into()));
        let e = run_err("function f(int a, int a)\nendfunction");
        assert_eq!(e.message, "Duplicate parameter name: a");
    }

    #[test]
    fn nested_function_rejected() {
        let e = run_err("function f()\nfunction g()\nendfunction\nendfunction");
        assert_eq!((e.kind, e.message.as_str()), (ErrorKind::Structural, "Nested functions are illegal"));
    }

    #[test]
    fn missing_endfunction() {
        assert_eq!(run_err("function f()\nint x").message, "can't find endfunction");
    }

    #[test]
    fn redefinition_overwrites() {
        let src = "function f()\nreturn 1\nendfunction\nfunction f()\nreturn 2\nendfunction\nint r = f()";
        let mut it = run(src);
        assert_eq!(int(&mut it, "r"), 2);
    }

    #[test]
    fn locals_do_not_leak() {
        let mut it = run("function f()\nint inner = 3\nreturn inner\nendfunction\nint r = f()");
        assert_eq!(int(&mut it, "r"), 3);
        assert!(!it.has_var("inner"));
    }

    #[test]
    fn flat_global_fallback() {
        // g reads `x`; the caller's local x is invisible, the global x is used.
        let src = "int x = 1\nfunction g()\nreturn x\nendfunction\nfunction f()\nint x = 2\nreturn g()\nendfunction\nint r = f()";
        let mut it = run(src);
        assert_eq!(int(&mut it, "r"), 1);
    }

    #[test]
    fn callee_cannot_write_caller_locals() {
        let src = "function g()\nonly_in_f = 5\nendfunction\nfunction f()\nint only_in_f\ng()\nendfunction\nf()";
        let e = run_err(src);
        assert_eq!(e.kind, ErrorKind::Delegation);
    }

    #[test]
    fn global_assignment_from_function_needs_exact_type() {
        let e = run_err("object o\nfunction f()\no = 1\nendfunction\nf()");
        assert!(e.message.starts_with("Incompatible types"));
        let mut it = run("object o\no = 1");
        assert_eq!(it.get_var("o").unwrap().to_string(), "1");
    }

    #[test]
    fn array_without_store_is_delegation_error() {
        let e = run_err("a[1] = 2");
        assert_eq!(e.kind, ErrorKind::Delegation);
    }
}
