/// Primitive procedures that take evaluated arguments and return a value
/// directly, one file per family.
///
/// Each family registers itself with `register_builtin_family!`:
///
/// register_builtin_family!(env,
///     "name" => function,
///     "another" => another_function,
/// );
macro_rules! register_builtin_family {
    ($env:expr, $($name:expr => $func:expr),* $(,)?) => {
        $(
            crate::env::EnvOps::define(
                $env,
                crate::symbol::intern_symbol($name),
                crate::value::new_builtin($name, $func),
            );
        )*
    };
}

pub mod display;
pub mod list;
pub mod number;
pub mod predicate;
pub mod string;
pub mod vector;

use crate::env::EnvRef;

pub fn register_builtins(env: &EnvRef) {
    number::register_number_builtins(env);
    list::register_list_builtins(env);
    predicate::register_predicate_builtins(env);
    string::register_string_builtins(env);
    vector::register_vector_builtins(env);
    display::register_display_builtins(env);
    log::debug!("registered {} global bindings", env.borrow().local_names().len());
}
