use anyhow::{Result, anyhow};
use log::debug;

use crate::model::Value;

fn overflow(op: &str, lhs: &Value, rhs: &Value) -> anyhow::Error {
    anyhow!("integer overflow in {lhs} {op} {rhs}")
}

pub fn add(lhs: &Value, rhs: &Value) -> Result<Value> {
    Ok(match (lhs, rhs) {
        (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
        (Value::Float(a), Value::Integer(b)) => Value::Float(a + (*b as f64)),
        (Value::Integer(a), Value::Float(b)) => Value::Float((*a as f64) + b),
        (Value::Integer(a), Value::Integer(b)) =>
            Value::Integer(a.checked_add(*b).ok_or_else(|| overflow("+", lhs, rhs))?),
        _ => Err(anyhow!("cannot add {lhs} and {rhs}"))?,
    })
}

pub fn sub(lhs: &Value, rhs: &Value) -> Result<Value> {
    Ok(match (lhs, rhs) {
        (Value::Float(a), Value::Float(b)) => Value::Float(a - b),
        (Value::Float(a), Value::Integer(b)) => Value::Float(a - (*b as f64)),
        (Value::Integer(a), Value::Float(b)) => Value::Float((*a as f64) - b),
        (Value::Integer(a), Value::Integer(b)) =>
            Value::Integer(a.checked_sub(*b).ok_or_else(|| overflow("-", lhs, rhs))?),
        _ => Err(anyhow!("cannot subtract {rhs} from {lhs}"))?,
    })
}

pub fn mul(lhs: &Value, rhs: &Value) -> Result<Value> {
    Ok(match (lhs, rhs) {
        (Value::Float(a), Value::Float(b)) => Value::Float(a * b),
        (Value::Float(a), Value::Integer(b)) => Value::Float(a * (*b as f64)),
        (Value::Integer(a), Value::Float(b)) => Value::Float((*a as f64) * b),
        (Value::Integer(a), Value::Integer(b)) =>
            Value::Integer(a.checked_mul(*b).ok_or_else(|| overflow("*", lhs, rhs))?),
        _ => Err(anyhow!("cannot multiply {lhs} by {rhs}"))?,
    })
}

pub fn div(lhs: &Value, rhs: &Value) -> Result<Value> {
    let (a, b) = match (lhs, rhs) {
        (Value::Float(a), Value::Float(b)) => (*a, *b),
        (Value::Float(a), Value::Integer(b)) => (*a, *b as f64),
        (Value::Integer(a), Value::Float(b)) => (*a as f64, *b),
        (Value::Integer(a), Value::Integer(b)) => (*a as f64, *b as f64),
        _ => Err(anyhow!("div requires 2 integers or floats, got {lhs} and {rhs}"))?,
    };
    if b == 0.0 {
        Err(anyhow!("division by zero"))?
    }
    Ok(Value::Float(a / b))
}

pub fn pow(lhs: &Value, rhs: &Value) -> Result<Value> {
    Ok(match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) if *b >= 0 => {
            let exp = u32::try_from(*b).map_err(|_| overflow("^", lhs, rhs))?;
            Value::Integer(a.checked_pow(exp).ok_or_else(|| overflow("^", lhs, rhs))?)
        }
        (Value::Integer(a), Value::Integer(b)) => Value::Float((*a as f64).powf(*b as f64)),
        (Value::Float(a), Value::Float(b)) => Value::Float(a.powf(*b)),
        (Value::Float(a), Value::Integer(b)) => Value::Float(a.powf(*b as f64)),
        (Value::Integer(a), Value::Float(b)) => Value::Float((*a as f64).powf(*b)),
        _ => Err(anyhow!("pow {lhs} {rhs}"))?,
    })
}

pub fn neg(val: &Value) -> Result<Value> {
    Ok(match val {
        Value::Integer(a) => Value::Integer(a.checked_neg().ok_or_else(|| anyhow!("integer overflow in -{a}"))?),
        Value::Float(a) => Value::Float(-a),
        _ => Err(anyhow!("cannot negate {val}"))?,
    })
}

// numbers are formatted in place
pub fn concat(lhs: &Value, rhs: &Value) -> Result<Value> {
    Ok(match (lhs, rhs) {
        (Value::Array(_), _) | (_, Value::Array(_)) => Err(anyhow!("cannot concatenate {lhs} and {rhs}"))?,
        (a, b) => Value::String(format!("{a}{b}")),
    })
}

fn as_float(name: &str, val: &Value) -> Result<f64> {
    match val {
        Value::Integer(a) => Ok(*a as f64),
        Value::Float(a) => Ok(*a),
        _ => Err(anyhow!("{name} requires a number, got {val}")),
    }
}

fn extremum(name: &str, args: &[Value], pick_first: fn(f64, f64) -> bool) -> Result<Value> {
    let mut best: Option<&Value> = None;
    for arg in args {
        let candidate = as_float(name, arg)?;
        best = match best {
            Some(current) if !pick_first(candidate, as_float(name, current)?) => Some(current),
            _ => Some(arg),
        };
    }
    best.cloned().ok_or_else(|| anyhow!("{name} requires at least one argument"))
}

pub fn call(name: &str, args: &[Value]) -> Result<Value> {
    debug!("call {name} with {} args", args.len());
    let unary = |f: fn(f64) -> f64| -> Result<Value> {
        match args {
            [arg] => Ok(Value::Float(f(as_float(name, arg)?))),
            _ => Err(anyhow!("{name} takes 1 argument, got {}", args.len())),
        }
    };
    match name {
        "SQRT" => unary(f64::sqrt),
        "EXP" => unary(f64::exp),
        "LOG" => unary(f64::ln),
        "LOG10" => unary(f64::log10),
        "SIN" => unary(f64::sin),
        "COS" => unary(f64::cos),
        "TAN" => unary(f64::tan),
        "ASIN" => unary(f64::asin),
        "ACOS" => unary(f64::acos),
        "ATAN" => unary(f64::atan),
        "CEIL" => unary(f64::ceil),
        "FLOOR" => unary(f64::floor),
        "ABS" => match args {
            [Value::Integer(a)] => Ok(Value::Integer(a.checked_abs().ok_or_else(|| anyhow!("integer overflow in ABS({a})"))?)),
            _ => unary(f64::abs),
        },
        "MIN" => extremum(name, args, |candidate, current| candidate < current),
        "MAX" => extremum(name, args, |candidate, current| candidate > current),
        _ => Err(anyhow!("unknown function {name}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Value {
        Value::Integer(i)
    }

    #[test]
    fn arithmetic() {
        assert_eq!(add(&int(2), &int(3)).unwrap(), int(5));
        assert_eq!(add(&int(2), &Value::Float(0.5)).unwrap(), Value::Float(2.5));
        assert_eq!(sub(&int(2), &int(3)).unwrap(), int(-1));
        assert_eq!(mul(&Value::Float(1.5), &int(2)).unwrap(), Value::Float(3.0));
        assert_eq!(div(&int(10), &int(4)).unwrap(), Value::Float(2.5));
        assert_eq!(pow(&int(2), &int(10)).unwrap(), int(1024));
        assert_eq!(pow(&int(2), &int(-1)).unwrap(), Value::Float(0.5));
        assert_eq!(neg(&int(7)).unwrap(), int(-7));
    }

    #[test]
    fn arithmetic_errors() {
        assert!(div(&int(1), &int(0)).is_err());
        assert!(div(&int(1), &Value::Float(0.0)).is_err());
        assert!(add(&int(i64::MAX), &int(1)).is_err());
        assert!(pow(&int(10), &int(40)).is_err());
        assert!(add(&Value::String("a".to_owned()), &int(1)).is_err());
    }

    #[test]
    fn concatenation() {
        let s = Value::String("run_".to_owned());
        assert_eq!(concat(&s, &int(3)).unwrap(), Value::String("run_3".to_owned()));
        assert!(concat(&s, &Value::Array(vec![])).is_err());
    }

    #[test]
    fn functions() {
        assert_eq!(call("SQRT", &[int(16)]).unwrap(), Value::Float(4.0));
        assert_eq!(call("ABS", &[int(-3)]).unwrap(), int(3));
        assert_eq!(call("MAX", &[int(1), Value::Float(2.5), int(2)]).unwrap(), Value::Float(2.5));
        assert_eq!(call("MIN", &[int(4), int(-2)]).unwrap(), int(-2));
        assert!(call("MIN", &[]).is_err());
        assert!(call("SQRT", &[int(1), int(2)]).is_err());
        assert!(call("NOPE", &[int(1)]).is_err());
    }
}
