use crate::ast::BinaryOperator;
use crate::error::{RuntimeError, RuntimeResult};

use super::value::Value;

/// Apply a non-assignment binary operator to two runtime values.
///
/// Every supported `(operator, left type, right type)` combination is listed
/// here; anything else is an `UnsupportedBinaryOperation`. Note that
/// `string + int` concatenates while `int + string` is rejected.
pub fn apply_binary(op: BinaryOperator, left: Value, right: Value) -> RuntimeResult<Value> {
    use BinaryOperator::*;

    match (left, right) {
        (Value::Int(l), Value::Int(r)) => int_binary(op, l, r),
        (Value::Float(l), Value::Float(r)) => float_binary(op, l, r),
        (Value::Str(l), Value::Str(r)) => match op {
            Add => Ok(Value::Str(l + &r)),
            Equal => Ok(Value::Bool(l == r)),
            NotEqual => Ok(Value::Bool(l != r)),
            _ => Err(unsupported(op, "string", "string")),
        },
        (Value::Str(l), Value::Int(r)) if op == Add => Ok(Value::Str(format!("{}{}", l, r))),
        (Value::Bool(l), Value::Bool(r)) => match op {
            And => Ok(Value::Bool(l && r)),
            Or => Ok(Value::Bool(l || r)),
            Equal => Ok(Value::Bool(l == r)),
            NotEqual => Ok(Value::Bool(l != r)),
            _ => Err(unsupported(op, "bool", "bool")),
        },
        (l, r) => Err(unsupported(op, l.type_name(), r.type_name())),
    }
}

pub(crate) fn unsupported(
    op: BinaryOperator,
    left: &'static str,
    right: &'static str,
) -> RuntimeError {
    RuntimeError::UnsupportedBinaryOperation {
        op: op.symbol(),
        left,
        right,
    }
}

fn int_binary(op: BinaryOperator, l: i64, r: i64) -> RuntimeResult<Value> {
    use BinaryOperator::*;

    let value = match op {
        Add => Value::Int(l.wrapping_add(r)),
        Subtract => Value::Int(l.wrapping_sub(r)),
        Multiply => Value::Int(l.wrapping_mul(r)),
        Divide | Modulo if r == 0 => return Err(RuntimeError::DivisionByZero),
        Divide => Value::Int(l.wrapping_div(r)),
        Modulo => Value::Int(l.wrapping_rem(r)),
        Equal => Value::Bool(l == r),
        NotEqual => Value::Bool(l != r),
        Greater => Value::Bool(l > r),
        GreaterEqual => Value::Bool(l >= r),
        Less => Value::Bool(l < r),
        LessEqual => Value::Bool(l <= r),
        BitAnd => Value::Int(l & r),
        BitOr => Value::Int(l | r),
        BitXor => Value::Int(l ^ r),
        // wrapping_sh* masks the shift amount to 0..63
        ShiftLeft => Value::Int(l.wrapping_shl(r as u32)),
        ShiftRight => Value::Int(l.wrapping_shr(r as u32)),
        _ => return Err(unsupported(op, "int", "int")),
    };
    Ok(value)
}

fn float_binary(op: BinaryOperator, l: f32, r: f32) -> RuntimeResult<Value> {
    use BinaryOperator::*;

    let value = match op {
        Add => Value::Float(l + r),
        Subtract => Value::Float(l - r),
        Multiply => Value::Float(l * r),
        Divide => Value::Float(l / r),
        Equal => Value::Bool(l == r),
        NotEqual => Value::Bool(l != r),
        Greater => Value::Bool(l > r),
        GreaterEqual => Value::Bool(l >= r),
        Less => Value::Bool(l < r),
        LessEqual => Value::Bool(l <= r),
        _ => return Err(unsupported(op, "float", "float")),
    };
    Ok(value)
}
