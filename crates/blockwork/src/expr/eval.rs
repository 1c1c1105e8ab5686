use super::{ArithmeticOperator, Expr};
use crate::cell::Cell;
use crate::error::{Error, Result};
use crate::node::{Block, Node, Primitive};
use crate::resolve::Env;

/// Evaluate to a concrete node. References are resolved shallowly, so a
/// name bound to code yields that code's result.
pub fn eval(expr: &Expr, env: &Env) -> Result<Node> {
    match expr {
        Expr::Number(number) => Ok(Node::number(*number)),
        Expr::Text(text) => Ok(Node::text(text.clone())),
        Expr::True => Ok(Node::truth()),
        Expr::Blank => Ok(Node::Blank),
        Expr::Identifier(_) | Expr::Member { .. } | Expr::Index { .. } => {
            env.resolve(&eval_cell(expr, env)?)
        }
        Expr::Slice {
            target,
            start,
            end,
            step,
        } => {
            let target = eval(target, env)?;
            let items = target.expect_block()?.items();
            let bound = |bound: &Option<Box<Expr>>| {
                bound
                    .as_deref()
                    .map(|expr| eval(expr, env).and_then(|node| node.expect_number()))
                    .transpose()
            };
            let step = bound(step)?.unwrap_or(1.0);
            let selected = slice(items, bound(start)?, bound(end)?, step)?;
            Ok(Node::Block(Block::from_items(selected)))
        }
        Expr::Call { callee, arguments } => {
            let callee = eval(callee, env)?;
            let function = callee.expect_function()?;
            let arguments = arguments
                .iter()
                .map(|argument| argument_cell(argument, env))
                .collect::<Result<Vec<_>>>()?;
            log::trace!("calling `{}` with {} arguments", function.name(), arguments.len());
            env.resolve(&function.call(&arguments)?)
        }
        Expr::Negate(operand) => Ok(Node::number(-eval(operand, env)?.expect_number()?)),
        Expr::Arithmetic {
            operator,
            left,
            right,
        } => arithmetic(*operator, eval(left, env)?, eval(right, env)?),
    }
}

/// Evaluate to the cell a reference points at, without resolving it.
fn eval_cell(expr: &Expr, env: &Env) -> Result<Cell> {
    match expr {
        Expr::Identifier(name) => env.lookup(name),
        Expr::Member { target, key } => {
            let target = eval(target, env)?;
            target
                .expect_block()?
                .get(key)
                .cloned()
                .ok_or_else(|| Error::UnknownProperty(key.to_string()))
        }
        Expr::Index { target, index } => {
            let target = eval(target, env)?;
            let items = target.expect_block()?.items();
            let index = position(eval(index, env)?.expect_number()?)?;
            index
                .checked_sub(1)
                .and_then(|index| items.get(index))
                .cloned()
                .ok_or(Error::IndexOutOfRange {
                    index,
                    len: items.len(),
                })
        }
        other => Ok(Cell::fixed(eval(other, env)?)),
    }
}

/// Identifier arguments hand the function the bound cell itself so it can
/// read it lazily or reactively; anything else arrives as a fixed cell.
fn argument_cell(argument: &Expr, env: &Env) -> Result<Cell> {
    match argument {
        Expr::Identifier(name) => env.lookup(name),
        other => Ok(Cell::fixed(eval(other, env)?)),
    }
}

/// A 1-based position. Fractions are truncated.
fn position(number: f64) -> Result<usize> {
    if !number.is_finite() || number < 1.0 {
        return Err(Error::InvalidIndex(number));
    }
    Ok(number as usize)
}

/// Inclusive 1-based slice. Bounds past the end are clamped; a negative
/// step walks from `start` down to `end`.
fn slice(items: &[Cell], start: Option<f64>, end: Option<f64>, step: f64) -> Result<Vec<Cell>> {
    if !step.is_finite() {
        return Err(Error::InvalidIndex(step));
    }
    if step.trunc() == 0.0 {
        return Err(Error::ZeroSliceStep);
    }
    let start = start.map(position).transpose()?;
    let end = end.map(position).transpose()?;
    let len = items.len();
    let step = step as i64;

    let mut selected = Vec::new();
    if step > 0 {
        let end = end.unwrap_or(len).min(len);
        let mut index = start.unwrap_or(1);
        while index <= end {
            selected.push(items[index - 1].clone());
            index += step as usize;
        }
    } else {
        let end = end.unwrap_or(1);
        let mut index = start.unwrap_or(len).min(len) as i64;
        while index >= end as i64 && index >= 1 {
            selected.push(items[index as usize - 1].clone());
            index += step;
        }
    }
    Ok(selected)
}

fn arithmetic(operator: ArithmeticOperator, left: Node, right: Node) -> Result<Node> {
    if let (ArithmeticOperator::Add, Node::Literal(Primitive::Text(a)), Node::Literal(Primitive::Text(b))) =
        (operator, &left, &right)
    {
        return Ok(Node::text(format!("{a}{b}")));
    }
    let (a, b) = (left.expect_number()?, right.expect_number()?);
    let result = match operator {
        ArithmeticOperator::Add => a + b,
        ArithmeticOperator::Subtract => a - b,
        ArithmeticOperator::Multiply => a * b,
        ArithmeticOperator::Divide => a / b,
    };
    Ok(Node::number(result))
}
