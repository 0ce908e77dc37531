/// Display output functions
///
/// Output goes to the runtime's sink rather than straight to stdout, so it
/// can be captured.
use crate::env::EnvRef;
use crate::error::SchemeError;
use crate::eval::{RunTime, expect_args_range, expect_n_args};
use crate::printer::{display_value, print_value};
use crate::value::SchemeValue;

// Ports are not modelled; a second argument is rejected.
fn single_object(args: &[SchemeValue]) -> Result<&SchemeValue, SchemeError> {
    expect_args_range(args, 1, 2)?;
    match args.get(1) {
        Some(port) => Err(SchemeError::wrong_type(port, "Port")),
        None => Ok(&args[0]),
    }
}

/// (write obj)
/// Writes obj in Scheme-readable format.
pub fn write_b(rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    let obj = single_object(args)?;
    rt.write_str(&print_value(obj));
    Ok(SchemeValue::Unspecified)
}

/// (display obj)
/// Strings and characters are written raw.
pub fn display_b(rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    let obj = single_object(args)?;
    rt.write_str(&display_value(obj));
    Ok(SchemeValue::Unspecified)
}

/// (newline)
pub fn newline_b(rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 0)?;
    rt.write_str("\n");
    Ok(SchemeValue::Unspecified)
}

pub fn register_display_builtins(env: &EnvRef) {
    register_builtin_family!(env,
        "write" => write_b,
        "display" => display_b,
        "newline" => newline_b,
    );
}
