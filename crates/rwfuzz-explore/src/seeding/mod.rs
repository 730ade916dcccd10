//! Input discovery: parameter type confirmation and per-function seeds.

pub mod confirm;
pub mod mutate;
pub mod rng;
pub mod seed;

use rwfuzz_ir::{FunctionInput, Value};

/// Every assignment that picks one value per parameter.
///
/// An empty parameter list yields a single empty input; a parameter with
/// no values yields no inputs.
pub fn cartesian(choices: &[(String, Vec<Value>)]) -> Vec<FunctionInput> {
    let mut out = vec![FunctionInput::new()];
    for (name, values) in choices {
        let mut next = Vec::with_capacity(out.len() * values.len());
        for partial in &out {
            for value in values {
                let mut input = partial.clone();
                input.insert(name.clone(), value.clone());
                next.push(input);
            }
        }
        out = next;
    }
    out
}
