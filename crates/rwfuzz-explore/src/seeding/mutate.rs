//! The "generate a different value" mutation primitive.
//!
//! Numbers mostly stay put and otherwise take a small clamped step, text and
//! byte strings get a few positional substitutions, and anything else is
//! replaced by a mutated placeholder string. The primitive retries until the
//! result differs from its input.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rwfuzz_ir::{FunctionInput, Value, ValuePath};

use super::rng::stage_rng;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Upper bound on substitutions per string or byte mutation.
const MAX_SUBSTITUTIONS: usize = 3;

/// Chance, in percent, that a numeric leaf is left unchanged in one attempt.
const KEEP_NUMBER_PERCENT: u32 = 80;

/// Largest single numeric step.
const MAX_STEP: u8 = 5;

/// Stand-in text for leaves with no mutation rule of their own.
pub const PLACEHOLDER_TEXT: &str = "string";

/// Seeded source of value mutations.
#[derive(Debug, Clone)]
pub struct Mutator {
    rng: ChaCha8Rng,
}

impl Mutator {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self { rng }
    }

    pub fn from_seed(global_seed: u64, stage_id: u64) -> Self {
        Self::new(stage_rng(global_seed, stage_id))
    }

    /// Access to the underlying stream, for callers that pick paths.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// A value structurally different from `value`.
    pub fn different_value(&mut self, value: &Value) -> Value {
        loop {
            let candidate = self.attempt(value);
            if &candidate != value {
                return candidate;
            }
        }
    }

    /// Replace the leaf at `path` with a different value.
    ///
    /// Returns `false`, leaving `input` untouched, when the path does not
    /// resolve.
    pub fn mutate_at(&mut self, input: &mut FunctionInput, path: &ValuePath) -> bool {
        let Some(slot) = path.resolve_mut(input) else {
            return false;
        };
        let next = self.different_value(slot);
        *slot = next;
        true
    }

    fn attempt(&mut self, value: &Value) -> Value {
        match value {
            Value::Int { .. } | Value::Uint { .. } | Value::Float { .. } => {
                if self.rng.gen_range(0..100) < KEEP_NUMBER_PERCENT {
                    value.clone()
                } else {
                    self.step_number(value)
                }
            }
            Value::String { value } => Value::String {
                value: self.mutate_text(value),
            },
            Value::Bytes { value } => Value::Bytes {
                value: self.mutate_bytes(value),
            },
            _ => Value::string(self.mutate_text(PLACEHOLDER_TEXT)),
        }
    }

    fn step_number(&mut self, value: &Value) -> Value {
        let step = self.rng.gen_range(1..=MAX_STEP);
        let upward = self.rng.gen_bool(0.5);
        match *value {
            Value::Int { kind, value } => {
                let (min, max) = kind.bounds();
                let step = i64::from(step);
                let next = if upward {
                    if value > max - step {
                        max
                    } else {
                        value + step
                    }
                } else if value < min + step {
                    min
                } else {
                    value - step
                };
                Value::Int { kind, value: next }
            }
            Value::Uint { kind, value } => {
                let max = kind.max();
                let step = u64::from(step);
                let next = if upward {
                    if value > max - step {
                        max
                    } else {
                        value + step
                    }
                } else {
                    value.saturating_sub(step)
                };
                Value::Uint { kind, value: next }
            }
            Value::Float { kind, value } => {
                let max = kind.max();
                let delta = if upward { f64::from(step) } else { -f64::from(step) };
                let mut next = value + delta;
                if next == value {
                    // Step lost to precision; move by whole ulps instead.
                    next = value + delta * value.abs() * f64::EPSILON;
                }
                Value::Float {
                    kind,
                    value: next.clamp(-max, max),
                }
            }
            ref other => other.clone(),
        }
    }

    fn mutate_text(&mut self, text: &str) -> String {
        let mut chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return char::from(self.pick_char()).to_string();
        }
        let times = self.rng.gen_range(0..=MAX_SUBSTITUTIONS);
        for _ in 0..times {
            let pos = self.rng.gen_range(0..chars.len());
            chars[pos] = char::from(self.pick_char());
        }
        chars.into_iter().collect()
    }

    fn mutate_bytes(&mut self, bytes: &[u8]) -> Vec<u8> {
        let mut out = bytes.to_vec();
        if out.is_empty() {
            out.push(self.rng.gen());
            return out;
        }
        let times = self.rng.gen_range(0..=MAX_SUBSTITUTIONS);
        for _ in 0..times {
            let pos = self.rng.gen_range(0..out.len());
            out[pos] = self.rng.gen();
        }
        out
    }

    fn pick_char(&mut self) -> u8 {
        CHARSET[self.rng.gen_range(0..CHARSET.len())]
    }
}
