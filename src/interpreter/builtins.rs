use std::io::Write;
use std::process::Command;

use tracing::{debug, warn};

use crate::error::{RuntimeError, RuntimeResult};
use crate::resolver::BUILTIN_EXEC;

use super::value::Value;

pub(crate) fn print<W: Write>(out: &mut W, args: &[Value]) -> RuntimeResult<Value> {
    let line = args
        .iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(out, "{}", line)?;
    Ok(Value::Int(0))
}

pub(crate) fn printf<W: Write>(out: &mut W, args: &[Value]) -> RuntimeResult<Value> {
    match args.split_first() {
        None => writeln!(out)?,
        Some((template, rest)) => write!(out, "{}", format_template(&template.to_string(), rest))?,
    }
    Ok(Value::Int(0))
}

/// Substitute `%v %s %d %f %t` positionally and collapse `%%`.
/// Unknown verbs are copied through untouched; unused arguments are
/// reported in a trailing `%!(EXTRA type=value, ...)`.
fn format_template(template: &str, args: &[Value]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            result.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('%') => {
                chars.next();
                result.push('%');
            }
            Some(verb @ ('v' | 's' | 'd' | 'f' | 't')) => {
                chars.next();
                match args.next() {
                    Some(Value::Float(value)) if verb == 'f' => {
                        result.push_str(&format!("{:.6}", value))
                    }
                    Some(Value::Int(value)) if verb == 'f' => {
                        result.push_str(&format!("{:.6}", *value as f64))
                    }
                    Some(value) => result.push_str(&value.to_string()),
                    None => result.push_str(&format!("%!{}(MISSING)", verb)),
                }
            }
            _ => result.push('%'),
        }
    }

    let extra: Vec<_> = args
        .map(|arg| format!("{}={}", arg.type_name(), arg))
        .collect();
    if !extra.is_empty() {
        result.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
    }

    result
}

/// Run `cmd` through `sh -c`. Failures are values, not errors.
pub(crate) fn exec(args: &[Value]) -> RuntimeResult<Value> {
    let [command] = args else {
        return Err(RuntimeError::BuiltinArity {
            name: BUILTIN_EXEC,
            expected: 1,
            found: args.len(),
        });
    };
    let command = command.to_string();
    debug!(%command, "Running shell command");

    let output = match Command::new("sh").arg("-c").arg(&command).output() {
        Ok(output) => output,
        Err(err) => {
            warn!(%command, error = %err, "Failed to spawn shell");
            return Ok(Value::Error(err.to_string()));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = format!("'{}' exited with {}: {}", command, output.status, stderr.trim_end());
        warn!(%message, "Shell command failed");
        return Ok(Value::Error(message));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(Value::Str(stdout.trim_end_matches(['\n', '\r']).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(value: &str) -> Value {
        Value::Str(value.to_string())
    }

    fn printed(args: &[Value]) -> String {
        let mut out = Vec::new();
        print(&mut out, args).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn printfed(args: &[Value]) -> String {
        let mut out = Vec::new();
        printf(&mut out, args).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_print_joins_with_spaces() {
        assert_eq!(printed(&[s("a"), Value::Int(1), Value::Nil]), "a 1 nil\n");
        assert_eq!(printed(&[]), "\n");
    }

    #[test]
    fn test_printf_verbs() {
        assert_eq!(
            printfed(&[s("%s=%d (%t) %v"), s("x"), Value::Int(3), Value::Bool(true), Value::Nil]),
            "x=3 (true) nil"
        );
        assert_eq!(printfed(&[s("%f"), Value::Float(1.5)]), "1.500000");
        assert_eq!(printfed(&[s("100%%")]), "100%");
        assert_eq!(printfed(&[s("%q")]), "%q");
    }

    #[test]
    fn test_printf_missing_argument() {
        assert_eq!(printfed(&[s("a=%v b=%d"), Value::Int(1)]), "a=1 b=%!d(MISSING)");
        assert_eq!(printfed(&[]), "\n");
    }

    #[test]
    fn test_printf_extra_arguments() {
        assert_eq!(
            printfed(&[s("a=%v"), Value::Int(1), Value::Int(2), s("x")]),
            "a=1%!(EXTRA int=2, string=x)"
        );
        assert_eq!(printfed(&[s("plain"), Value::Bool(false)]), "plain%!(EXTRA bool=false)");
    }

    #[test]
    fn test_printf_has_no_implicit_newline() {
        assert_eq!(printfed(&[s("hi")]), "hi");
    }

    #[test]
    fn test_exec_captures_stdout() {
        assert_eq!(exec(&[s("echo hi")]).unwrap(), s("hi"));
    }

    #[test]
    fn test_exec_failure_is_a_value() {
        match exec(&[s("exit 3")]).unwrap() {
            Value::Error(message) => assert!(message.contains("exit 3")),
            other => panic!("Expected error value, got {:?}", other),
        }
    }

    #[test]
    fn test_exec_arity() {
        assert!(matches!(
            exec(&[]),
            Err(RuntimeError::BuiltinArity { expected: 1, found: 0, .. })
        ));
        assert!(exec(&[s("a"), s("b")]).is_err());
    }
}
