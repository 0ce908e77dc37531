/// Tracing support for the CEK machine.
///
use crate::eval::{CEKState, Control, Kont, RunTime, TraceType};
use crate::printer::print_value;

/// Frames listed per step at `TraceType::Full` before the chain is elided.
const KONT_PREVIEW: usize = 12;

/// Trace hook called from the CEK machine before every step.
///
pub fn debugger(state: &CEKState, rt: &RunTime) {
    match rt.trace {
        TraceType::Off => {}
        TraceType::Control => {
            log::debug!(target: "cek", "[{}] {}", rt.steps, dump_control(&state.control));
        }
        TraceType::Full => {
            log::debug!(target: "cek", "[{}] {}", rt.steps, dump_control(&state.control));
            log::debug!(target: "cek", "    {:?}", state.kont);
            log::debug!(target: "cek", "    stack: {}", dump_kont_chain(&state.kont));
            log::debug!(target: "cek", "    env: {:?}", state.env.borrow());
        }
    }
}

pub fn dump_control(control: &Control) -> String {
    match control {
        Control::Expr(obj) => format!("Expr  = {}", print_value(obj)),
        Control::Value(obj) => format!("Value = {}", print_value(obj)),
    }
}

/// Frame names from the innermost outwards, e.g. `EvalArg If Seq ... Halt (12 frames)`.
pub fn dump_kont_chain(kont: &Kont) -> String {
    let depth = kont.depth();
    let mut names = Vec::new();
    let mut current = Some(kont);
    while let Some(frame) = current {
        if names.len() == KONT_PREVIEW {
            names.push("...");
            break;
        }
        names.push(frame.name());
        current = frame.next().map(|k| &**k);
    }
    format!("{} ({} frames)", names.join(" "), depth)
}
