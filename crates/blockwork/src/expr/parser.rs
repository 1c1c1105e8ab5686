use super::{ParseError, Span, Token};
use chumsky::{input::ValueInput, pratt::*, prelude::*};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(Arc<str>),
    True,
    Blank,
    Identifier(Arc<str>),
    Member {
        target: Box<Expr>,
        key: Arc<str>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        target: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Negate(Box<Expr>),
    Arithmetic {
        operator: ArithmeticOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Expr {
    fn arithmetic(operator: ArithmeticOperator, left: Expr, right: Expr) -> Self {
        Expr::Arithmetic {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// Suffix applied to an operand: `.key`, `(args)`, `[n]` or `[a:b:c]`.
#[derive(Debug, Clone)]
enum Postfix {
    Member(Arc<str>),
    Call(Vec<Expr>),
    Index(Expr),
    Slice {
        start: Option<Expr>,
        end: Option<Expr>,
        step: Option<Expr>,
    },
}

impl Postfix {
    fn apply(self, target: Expr) -> Expr {
        let target = Box::new(target);
        match self {
            Postfix::Member(key) => Expr::Member { target, key },
            Postfix::Call(arguments) => Expr::Call {
                callee: target,
                arguments,
            },
            Postfix::Index(index) => Expr::Index {
                target,
                index: Box::new(index),
            },
            Postfix::Slice { start, end, step } => Expr::Slice {
                target,
                start: start.map(Box::new),
                end: end.map(Box::new),
                step: step.map(Box::new),
            },
        }
    }
}

pub fn parser<'code, I>() -> impl Parser<'code, I, Expr, extra::Err<ParseError<'code, Token<'code>>>>
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    recursive(|expression| {
        let colon = just(Token::Colon);
        let comma = just(Token::Comma);
        let bracket_round_open = just(Token::BracketRoundOpen);
        let bracket_round_close = just(Token::BracketRoundClose);
        let bracket_square_open = just(Token::BracketSquareOpen);
        let bracket_square_close = just(Token::BracketSquareClose);

        let identifier = select! { Token::Identifier(identifier) => identifier };

        let literal = select! {
            Token::Number(number) => Expr::Number(number),
            Token::Text(text) => Expr::Text(text.into()),
            Token::True => Expr::True,
            Token::Blank => Expr::Blank,
        };

        let nested = expression
            .clone()
            .delimited_by(bracket_round_open.clone(), bracket_round_close.clone());

        let atom = choice((
            literal,
            identifier.map(|identifier: &str| Expr::Identifier(identifier.into())),
            nested,
        ));

        let member = just(Token::Dot)
            .ignore_then(identifier)
            .map(|key: &str| Postfix::Member(key.into()));

        let call = expression
            .clone()
            .separated_by(comma)
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(bracket_round_open, bracket_round_close)
            .map(Postfix::Call);

        let bound = expression.clone().or_not();
        let subscript = bound
            .clone()
            .then(
                colon
                    .clone()
                    .ignore_then(bound.clone())
                    .then(colon.ignore_then(bound).or_not())
                    .or_not(),
            )
            .delimited_by(bracket_square_open, bracket_square_close)
            .try_map(|(start, range), span| match range {
                None => start
                    .map(Postfix::Index)
                    .ok_or_else(|| Rich::custom(span, "missing index")),
                Some((end, step)) => Ok(Postfix::Slice {
                    start,
                    end,
                    step: step.flatten(),
                }),
            });

        let operand = atom.foldl(
            choice((member, call, subscript)).repeated(),
            |target, postfix| postfix.apply(target),
        );

        operand.pratt((
            prefix(9, just(Token::Minus), |_, operand, _| {
                Expr::Negate(Box::new(operand))
            }),
            infix(left(7), just(Token::Asterisk), |l, _, r, _| {
                Expr::arithmetic(ArithmeticOperator::Multiply, l, r)
            }),
            infix(left(7), just(Token::Slash), |l, _, r, _| {
                Expr::arithmetic(ArithmeticOperator::Divide, l, r)
            }),
            infix(left(5), just(Token::Plus), |l, _, r, _| {
                Expr::arithmetic(ArithmeticOperator::Add, l, r)
            }),
            infix(left(5), just(Token::Minus), |l, _, r, _| {
                Expr::arithmetic(ArithmeticOperator::Subtract, l, r)
            }),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse;

    fn identifier(name: &str) -> Box<Expr> {
        Box::new(Expr::Identifier(name.into()))
    }

    #[test]
    fn multiplication_binds_tighter() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Expr::arithmetic(
                ArithmeticOperator::Add,
                Expr::Number(1.0),
                Expr::arithmetic(ArithmeticOperator::Multiply, Expr::Number(2.0), Expr::Number(3.0)),
            )
        );
    }

    #[test]
    fn postfix_chains_left_to_right() {
        assert_eq!(
            parse("f(x).items[2]").unwrap(),
            Expr::Index {
                target: Box::new(Expr::Member {
                    target: Box::new(Expr::Call {
                        callee: identifier("f"),
                        arguments: vec![Expr::Identifier("x".into())],
                    }),
                    key: "items".into(),
                }),
                index: Box::new(Expr::Number(2.0)),
            }
        );
    }

    #[test]
    fn slices_with_optional_bounds() {
        assert_eq!(
            parse("list[::-1]").unwrap(),
            Expr::Slice {
                target: identifier("list"),
                start: None,
                end: None,
                step: Some(Box::new(Expr::Negate(Box::new(Expr::Number(1.0))))),
            }
        );
        assert_eq!(
            parse("list[2:]").unwrap(),
            Expr::Slice {
                target: identifier("list"),
                start: Some(Box::new(Expr::Number(2.0))),
                end: None,
                step: None,
            }
        );
    }

    #[test]
    fn negation_applies_to_the_whole_postfix_chain() {
        assert_eq!(
            parse("-a.b").unwrap(),
            Expr::Negate(Box::new(Expr::Member {
                target: identifier("a"),
                key: "b".into(),
            }))
        );
    }

    #[test]
    fn malformed_input_is_a_syntax_error() {
        assert!(parse("1 +").is_err());
        assert!(parse("a[]").is_err());
        assert!(parse("").is_err());
    }
}
