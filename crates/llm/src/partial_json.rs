//! Partial JSON Decoding
//!
//! Best-effort decoding of a JSON document that is still being streamed.
//! The decoder is a narrow capability (`text so far -> value | none`) so the
//! delta parser can be tested against other strategies.

use serde_json::Value;

/// Upper bound on how many truncation points are retried per decode.
const MAX_CUT_ATTEMPTS: usize = 8;

/// Turns an incomplete JSON text into the best value it currently describes.
pub trait PartialJsonDecoder: Send + Sync {
    /// Returns `None` when nothing usable can be recovered yet.
    fn decode(&self, text: &str) -> Option<Value>;
}

/// Decoder that closes an unterminated trailing string and any open
/// containers, dropping a dangling incomplete member when that alone
/// does not produce valid JSON.
///
/// A broken escape sequence inside the outermost object's string is not
/// repaired here; callers strip it and retry.
#[derive(Debug, Default, Clone, Copy)]
pub struct LenientJsonDecoder;

impl LenientJsonDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// A position the text may be truncated at, with the closers that make the
/// truncated prefix structurally complete.
struct CutPoint {
    at: usize,
    closers: String,
}

struct Scan {
    stack: Vec<char>,
    in_string: bool,
    cuts: Vec<CutPoint>,
}

fn closers_for(stack: &[char]) -> String {
    stack
        .iter()
        .rev()
        .map(|open| if *open == '{' { '}' } else { ']' })
        .collect()
}

fn scan(text: &str) -> Option<Scan> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut cuts = Vec::new();

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => stack.push(ch),
            '[' => {
                stack.push(ch);
                // Never cut inside the outermost container: an empty root is
                // worse than no value at all.
                if stack.len() >= 2 {
                    cuts.push(CutPoint {
                        at: idx + 1,
                        closers: closers_for(&stack),
                    });
                }
            }
            '}' | ']' => {
                let expected = if ch == '}' { '{' } else { '[' };
                if stack.pop() != Some(expected) {
                    return None;
                }
            }
            ',' => cuts.push(CutPoint {
                at: idx,
                closers: closers_for(&stack),
            }),
            _ => {}
        }
    }

    Some(Scan {
        stack,
        in_string,
        cuts,
    })
}

fn parse(candidate: &str) -> Option<Value> {
    serde_json::from_str::<Value>(candidate).ok()
}

impl PartialJsonDecoder for LenientJsonDecoder {
    fn decode(&self, text: &str) -> Option<Value> {
        let trimmed = text.trim_start();
        if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return None;
        }

        let scan = scan(text)?;
        if scan.stack.is_empty() && !scan.in_string {
            return parse(text);
        }

        let mut candidate = String::with_capacity(text.len() + scan.stack.len() + 1);
        candidate.push_str(text);
        if scan.in_string {
            candidate.push('"');
        }
        candidate.push_str(&closers_for(&scan.stack));
        if let Some(value) = parse(&candidate) {
            return Some(value);
        }

        scan.cuts
            .iter()
            .rev()
            .take(MAX_CUT_ATTEMPTS)
            .find_map(|cut| parse(&format!("{}{}", &text[..cut.at], cut.closers)))
    }
}
