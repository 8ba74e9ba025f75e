//! Shunting-yard compiler: lexed tokens to a postfix [`Program`]
//! (spec.md §4.B.2).

use super::error::{CompileError, SyntaxErrorKind};
use super::lexer::Lexer;
use super::program::Program;
use super::token::{Opcode, Token, TokenKind};

/// Compile a filter expression into a postfix [`Program`].
///
/// Performs full arity checking at compile time: the returned program is
/// guaranteed to evaluate without stack underflow (barring unresolved
/// selectors, which [`super::program::eval`] reports separately).
pub fn compile(src: &str) -> Result<Program, CompileError> {
    let tokens = Lexer::new(src).tokenize()?;

    let mut output: Vec<Token> = Vec::new();
    let mut ops: Vec<Token> = Vec::new();
    let mut stack_depth: i64 = 0;

    for tok in tokens {
        match &tok.kind {
            TokenKind::Num(_) | TokenKind::Str(_) | TokenKind::Selector(_) | TokenKind::Tuple(_) => {
                stack_depth += 1;
                output.push(tok);
            }
            TokenKind::Op(Opcode::OParen) => ops.push(tok),
            TokenKind::Op(Opcode::CParen) => {
                loop {
                    match ops.pop() {
                        Some(top) if matches!(top.kind, TokenKind::Op(Opcode::OParen)) => break,
                        Some(top) => emit(&mut output, &mut stack_depth, top)?,
                        None => {
                            return Err(CompileError {
                                offset: tok.offset,
                                kind: SyntaxErrorKind::UnbalancedParenClose,
                            })
                        }
                    }
                }
            }
            TokenKind::Op(op) => {
                while let Some(top) = ops.last() {
                    let TokenKind::Op(top_op) = top.kind else { break };
                    if top_op == Opcode::OParen || top_op.precedence() < op.precedence() {
                        break;
                    }
                    let top = ops.pop().expect("just peeked");
                    emit(&mut output, &mut stack_depth, top)?;
                }
                ops.push(tok);
            }
        }
    }

    while let Some(top) = ops.pop() {
        if matches!(top.kind, TokenKind::Op(Opcode::OParen)) {
            return Err(CompileError {
                offset: top.offset,
                kind: SyntaxErrorKind::UnbalancedParenOpen,
            });
        }
        emit(&mut output, &mut stack_depth, top)?;
    }

    if stack_depth != 1 {
        let offset = output.last().map_or(0, |t| t.offset);
        return Err(CompileError { offset, kind: SyntaxErrorKind::UnusedTokens });
    }

    Ok(Program { tokens: output, source: src.to_string() })
}

fn emit(output: &mut Vec<Token>, stack_depth: &mut i64, tok: Token) -> Result<(), CompileError> {
    if let TokenKind::Op(op) = tok.kind {
        let arity = i64::from(op.arity());
        if *stack_depth < arity {
            return Err(CompileError { offset: tok.offset, kind: SyntaxErrorKind::ArityUnderflow });
        }
        *stack_depth -= arity;
        *stack_depth += 1;
    }
    output.push(tok);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(src: &str) -> Vec<Opcode> {
        compile(src)
            .unwrap()
            .tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Op(op) => Some(*op),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn precedence_orders_postfix_correctly() {
        // 1 + 2 * 3 -> 1 2 3 * +
        let program = compile("1 + 2 * 3").unwrap();
        let kinds: Vec<_> = program.tokens.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Num(1.0),
                TokenKind::Num(2.0),
                TokenKind::Num(3.0),
                TokenKind::Op(Opcode::Mult),
                TokenKind::Op(Opcode::Sum),
            ]
        );
    }

    #[test]
    fn parentheses_override_precedence() {
        let program = compile("(1 + 2) * 3").unwrap();
        let kinds: Vec<_> = program.tokens.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Num(1.0),
                TokenKind::Num(2.0),
                TokenKind::Op(Opcode::Sum),
                TokenKind::Num(3.0),
                TokenKind::Op(Opcode::Mult),
            ]
        );
    }

    #[test]
    fn unclosed_paren_is_an_error() {
        let err = compile("(1 + 2").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnbalancedParenOpen);
    }

    #[test]
    fn unopened_paren_is_an_error() {
        let err = compile("1 + 2)").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnbalancedParenClose);
    }

    #[test]
    fn back_to_back_operands_are_unused_tokens() {
        let err = compile("1 2").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnusedTokens);
    }

    #[test]
    fn binary_operator_missing_operand_underflows() {
        let err = compile("1 +").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::ArityUnderflow);
    }

    #[test]
    fn pow_is_left_associative() {
        // 2 ** 3 ** 2 -> ((2 ** 3) ** 2), i.e. postfix: 2 3 ** 2 **
        let program = compile("2 ** 3 ** 2").unwrap();
        let kinds: Vec<_> = program.tokens.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Num(2.0),
                TokenKind::Num(3.0),
                TokenKind::Op(Opcode::Pow),
                TokenKind::Num(2.0),
                TokenKind::Op(Opcode::Pow),
            ]
        );
    }

    #[test]
    fn tuple_literal_syntax_does_not_compile() {
        assert!(compile(".x in [1, 2, 3]").is_err());
    }

    #[test]
    fn complex_filter_expression_compiles() {
        assert_eq!(
            ops(r#".category == "gpu" and .price < 500 or .featured"#),
            vec![Opcode::Eq, Opcode::Lt, Opcode::And, Opcode::Or]
        );
    }
}
