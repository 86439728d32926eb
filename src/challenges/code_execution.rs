//! CodeExecution: a source snippet with deliberately injected bugs.
//!
//! The client must find and fix the bugs, then mentally execute the fixed
//! function on the provided input. The canonical answer is the output of
//! the correct reference implementation, never of the buggy code.

use base64::Engine;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;

use super::{context_field, ChallengeDriver, B64};
use crate::crypto::{random_bytes, sha256, sha256_hex};
use crate::error::Result;
use crate::types::{ChallengePayload, Difficulty, Dimension};

const NAME: &str = "code-execution";

// ── Bug catalog ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bug {
    OffByOne,
    WrongOperator,
    MissingStep,
    WrongInit,
    WrongPad,
    WrongShift,
}

impl Bug {
    fn name(self) -> &'static str {
        match self {
            Bug::OffByOne => "off_by_one",
            Bug::WrongOperator => "wrong_operator",
            Bug::MissingStep => "missing_step",
            Bug::WrongInit => "wrong_init",
            Bug::WrongPad => "wrong_pad",
            Bug::WrongShift => "wrong_shift",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Bug::OffByOne => "Uses % 255 instead of % 256 in modulo operation",
            Bug::WrongOperator => "Uses + (addition) instead of ^ (XOR) as the accumulator operator",
            Bug::MissingStep => "Missing byte reversal between hash rounds",
            Bug::WrongInit => "Accumulator initialized to 1 instead of 0",
            Bug::WrongPad => "padStart uses length 1 instead of 2 for hex encoding",
            Bug::WrongShift => "Shift amount is 7 instead of 8 in bit shifting",
        }
    }
}

// ── Code templates ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Template {
    ByteTransform,
    ArrayProcessing,
    HashChain,
}

impl Template {
    fn name(self) -> &'static str {
        match self {
            Template::ByteTransform => "byte_transform",
            Template::ArrayProcessing => "array_processing",
            Template::HashChain => "hash_chain",
        }
    }

    fn available_bugs(self) -> &'static [Bug] {
        match self {
            Template::ByteTransform => &[Bug::OffByOne, Bug::WrongShift],
            Template::ArrayProcessing => &[Bug::WrongOperator, Bug::WrongInit, Bug::WrongPad],
            Template::HashChain => &[Bug::MissingStep, Bug::OffByOne],
        }
    }

    /// (input bytes, hash-chain rounds where applicable)
    fn generate_input(self, rng: &mut impl Rng) -> (Vec<u8>, Option<u32>) {
        match self {
            Template::ByteTransform => (random_bytes(rng.gen_range(8..=16)), None),
            Template::ArrayProcessing => (random_bytes(rng.gen_range(8..=24)), None),
            Template::HashChain => (
                random_bytes(rng.gen_range(8..=16)),
                Some(rng.gen_range(2..=4)),
            ),
        }
    }

    fn buggy_code(self, rounds: Option<u32>, bugs: &[Bug]) -> String {
        let has = |bug: Bug| bugs.contains(&bug);
        match self {
            Template::ByteTransform => {
                let modulo = if has(Bug::OffByOne) { "255" } else { "256" };
                let multiplier = if has(Bug::WrongShift) {
                    "((i + 1) << 7)"
                } else {
                    "(i + 1)"
                };
                [
                    "function transform(data) {".to_owned(),
                    "  // data is a Uint8Array".to_owned(),
                    "  const result = [];".to_owned(),
                    "  for (let i = 0; i < data.length; i++) {".to_owned(),
                    format!("    result.push((data[i] * {multiplier}) % {modulo});"),
                    "  }".to_owned(),
                    "  // Return the SHA-256 hex digest of the resulting byte array".to_owned(),
                    "  return sha256hex(Uint8Array.from(result));".to_owned(),
                    "}".to_owned(),
                ]
                .join("\n")
            }
            Template::ArrayProcessing => {
                let operator = if has(Bug::WrongOperator) { "+" } else { "^" };
                let init = if has(Bug::WrongInit) { "1" } else { "0" };
                let pad = if has(Bug::WrongPad) { "1" } else { "2" };
                [
                    "function process(data) {".to_owned(),
                    "  // data is a Uint8Array".to_owned(),
                    format!("  let acc = {init};"),
                    "  for (const byte of data) {".to_owned(),
                    format!("    acc = (acc {operator} byte) & 0xFF;"),
                    "  }".to_owned(),
                    format!("  return acc.toString(16).padStart({pad}, '0');"),
                    "}".to_owned(),
                ]
                .join("\n")
            }
            Template::HashChain => {
                let rounds = rounds.unwrap_or(2);
                let loop_end = if has(Bug::OffByOne) {
                    format!("{rounds} - 1")
                } else {
                    rounds.to_string()
                };
                let reverse_line = if has(Bug::MissingStep) {
                    "      // (no reversal step)".to_owned()
                } else {
                    "      current = current.reverse();".to_owned()
                };
                [
                    "function hashChain(data, rounds) {".to_owned(),
                    format!("  // data is a Uint8Array, rounds = {rounds}"),
                    "  let current = data;".to_owned(),
                    format!("  for (let i = 0; i < {loop_end}; i++) {{"),
                    "    current = sha256(current); // returns Uint8Array".to_owned(),
                    reverse_line,
                    "  }".to_owned(),
                    "  return hex(current); // returns hex string".to_owned(),
                    "}".to_owned(),
                ]
                .join("\n")
            }
        }
    }

    /// Output of the bug-free reference implementation.
    fn correct_output(self, data: &[u8], rounds: Option<u32>) -> String {
        match self {
            Template::ByteTransform => {
                let result: Vec<u8> = data
                    .iter()
                    .enumerate()
                    .map(|(i, b)| ((*b as u64 * (i as u64 + 1)) % 256) as u8)
                    .collect();
                sha256_hex(&result)
            }
            Template::ArrayProcessing => {
                let acc = data.iter().fold(0u8, |acc, b| acc ^ b);
                format!("{acc:02x}")
            }
            Template::HashChain => {
                let rounds = rounds.unwrap_or(2);
                let mut current = data.to_vec();
                for _ in 0..rounds {
                    let mut digest = sha256(&current);
                    digest.reverse();
                    current = digest;
                }
                hex::encode(current)
            }
        }
    }
}

// ── Difficulty configuration ────────────────────────────────────

struct DifficultyConfig {
    bug_count: usize,
    templates: &'static [Template],
    edge_case_hint: bool,
}

fn difficulty_config(difficulty: Difficulty) -> DifficultyConfig {
    match difficulty {
        Difficulty::Easy => DifficultyConfig {
            bug_count: 1,
            templates: &[Template::ByteTransform, Template::ArrayProcessing],
            edge_case_hint: false,
        },
        Difficulty::Medium => DifficultyConfig {
            bug_count: 1,
            templates: &[
                Template::ByteTransform,
                Template::ArrayProcessing,
                Template::HashChain,
            ],
            edge_case_hint: false,
        },
        Difficulty::Hard => DifficultyConfig {
            bug_count: 2,
            templates: &[
                Template::ByteTransform,
                Template::ArrayProcessing,
                Template::HashChain,
            ],
            edge_case_hint: false,
        },
        Difficulty::Adversarial => DifficultyConfig {
            bug_count: 3,
            templates: &[
                Template::ByteTransform,
                Template::ArrayProcessing,
                Template::HashChain,
            ],
            edge_case_hint: true,
        },
    }
}

fn select_bugs(template: Template, count: usize, rng: &mut impl Rng) -> Vec<Bug> {
    let available = template.available_bugs();
    available
        .choose_multiple(rng, count.min(available.len()))
        .copied()
        .collect()
}

// ── Driver ──────────────────────────────────────────────────────

pub struct CodeExecutionDriver;

impl ChallengeDriver for CodeExecutionDriver {
    fn name(&self) -> &'static str {
        NAME
    }

    fn dimensions(&self) -> &'static [Dimension] {
        &[Dimension::Reasoning, Dimension::Execution]
    }

    fn generate(&self, difficulty: Difficulty) -> Result<ChallengePayload> {
        let config = difficulty_config(difficulty);
        let mut rng = rand::thread_rng();

        let template = config.templates[rng.gen_range(0..config.templates.len())];
        let (data, rounds) = template.generate_input(&mut rng);
        let bugs = select_bugs(template, config.bug_count, &mut rng);
        let buggy_code = template.buggy_code(rounds, &bugs);
        let correct_output = template.correct_output(&data, rounds);

        let mut lines = vec![
            "The following JavaScript function contains bug(s). Your task is to:".to_owned(),
            "1. Identify and fix all bugs in the code".to_owned(),
            "2. Mentally execute the fixed code with the provided input".to_owned(),
            "3. Return the correct output".to_owned(),
            String::new(),
            "## Code".to_owned(),
            "```javascript".to_owned(),
            buggy_code,
            "```".to_owned(),
            String::new(),
            "## Input".to_owned(),
            format!("Data (hex): {}", hex::encode(&data)),
        ];
        if let Some(rounds) = rounds {
            lines.push(format!("Rounds: {rounds}"));
        }
        lines.extend([
            String::new(),
            "## Notes".to_owned(),
            "- sha256hex() / sha256() compute SHA-256 and return hex string / Uint8Array respectively"
                .to_owned(),
            "- hex() converts a Uint8Array to a hex string".to_owned(),
            "- All arithmetic on bytes should stay within 0-255 range".to_owned(),
        ]);
        if config.edge_case_hint {
            lines.extend([
                String::new(),
                "Note: Pay close attention to boundary conditions, operator precedence, and off-by-one errors."
                    .to_owned(),
            ]);
        }
        lines.extend([
            String::new(),
            "Return the exact output of the fixed function.".to_owned(),
        ]);

        let mut input_params = serde_json::Map::new();
        if let Some(rounds) = rounds {
            input_params.insert("rounds".into(), json!(rounds));
        }

        Ok(ChallengePayload {
            challenge_type: NAME.into(),
            instructions: lines.join("\n"),
            data: B64.encode(&data),
            steps: bugs.len() as u32,
            context: Some(json!({
                "template_name": template.name(),
                "bugs": bugs
                    .iter()
                    .map(|b| json!({ "name": b.name(), "description": b.description() }))
                    .collect::<Vec<_>>(),
                "correct_output": correct_output,
                "input_params": input_params,
            })),
        })
    }

    fn solve(&self, payload: &ChallengePayload) -> Result<String> {
        context_field(payload, "correct_output")
    }
}
