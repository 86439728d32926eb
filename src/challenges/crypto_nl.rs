//! CryptoNL: a pipeline of byte operations described in natural language.
//!
//! The client receives random bytes plus prose instructions ("XOR each byte
//! with 0x2A", "reverse the byte order", …) and must return the SHA-256 hex
//! digest of the buffer after executing every step in order.

use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{context_field, decode_data, ChallengeDriver, B64};
use crate::crypto::{hmac_sha256, random_bytes, sha256, sha256_hex};
use crate::error::{AgentAuthError, Result};
use crate::types::{ChallengePayload, Difficulty, Dimension};

const NAME: &str = "crypto-nl";

// ── Operations ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ByteOp {
    Xor { key: u8 },
    Reverse,
    Slice { start: usize, end: usize },
    Sort,
    Rotate { positions: usize },
    Sha256,
    BitwiseNot,
    Repeat { times: usize },
    Hmac { key_hex: String },
    Base64Encode,
}

const BASIC_OPS: &[&str] = &["xor", "reverse", "slice", "sort", "rotate"];
const MEDIUM_OPS: &[&str] = &[
    "xor",
    "reverse",
    "slice",
    "sort",
    "rotate",
    "sha256",
    "bitwise_not",
];
const ALL_OPS: &[&str] = &[
    "xor",
    "reverse",
    "slice",
    "sort",
    "rotate",
    "sha256",
    "bitwise_not",
    "repeat",
    "hmac",
    "base64_encode",
];

fn op_pool(difficulty: Difficulty) -> &'static [&'static str] {
    match difficulty {
        Difficulty::Easy => BASIC_OPS,
        Difficulty::Medium => MEDIUM_OPS,
        Difficulty::Hard | Difficulty::Adversarial => ALL_OPS,
    }
}

/// (op count, data size in bytes)
fn difficulty_config(difficulty: Difficulty) -> (usize, usize) {
    match difficulty {
        Difficulty::Easy => (1, 16),
        Difficulty::Medium => (2, 32),
        Difficulty::Hard => (4, 64),
        Difficulty::Adversarial => (6, 128),
    }
}

fn generate_ops(count: usize, data_size: usize, difficulty: Difficulty) -> Vec<ByteOp> {
    let pool = op_pool(difficulty);
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| match pool[rng.gen_range(0..pool.len())] {
            "xor" => ByteOp::Xor {
                key: rng.gen_range(1..=255),
            },
            "reverse" => ByteOp::Reverse,
            "slice" => {
                let start = rng.gen_range(0..=data_size / 4);
                let end = rng.gen_range(start + 4..=(start + data_size / 2).min(data_size));
                ByteOp::Slice { start, end }
            }
            "sort" => ByteOp::Sort,
            "rotate" => ByteOp::Rotate {
                positions: rng.gen_range(1..=data_size / 2),
            },
            "sha256" => ByteOp::Sha256,
            "bitwise_not" => ByteOp::BitwiseNot,
            "repeat" => ByteOp::Repeat {
                times: rng.gen_range(2..=3),
            },
            "hmac" => ByteOp::Hmac {
                key_hex: hex::encode(random_bytes(16)),
            },
            _ => ByteOp::Base64Encode,
        })
        .collect()
}

fn apply_op(data: Vec<u8>, op: &ByteOp) -> Result<Vec<u8>> {
    Ok(match op {
        ByteOp::Xor { key } => data.iter().map(|b| b ^ key).collect(),
        ByteOp::Reverse => {
            let mut out = data;
            out.reverse();
            out
        }
        ByteOp::Slice { start, end } => {
            // Out-of-range indices clamp rather than fail: ops earlier in the
            // pipeline may have shrunk the buffer below the generated bounds.
            let len = data.len();
            let start = (*start).min(len);
            let end = (*end).min(len).max(start);
            data[start..end].to_vec()
        }
        ByteOp::Sort => {
            let mut out = data;
            out.sort_unstable();
            out
        }
        ByteOp::Rotate { positions } => {
            if data.is_empty() {
                return Ok(data);
            }
            let mut out = data;
            let positions = positions % out.len();
            out.rotate_left(positions);
            out
        }
        ByteOp::Sha256 => sha256(&data),
        ByteOp::BitwiseNot => data.iter().map(|b| !b).collect(),
        ByteOp::Repeat { times } => data.repeat(*times),
        ByteOp::Hmac { key_hex } => {
            let key = hex::decode(key_hex)
                .map_err(|e| AgentAuthError::MalformedPayload(format!("bad hmac key: {e}")))?;
            hmac_sha256(&key, &data)
        }
        ByteOp::Base64Encode => B64.encode(&data).into_bytes(),
    })
}

fn execute_ops(data: Vec<u8>, ops: &[ByteOp]) -> Result<Vec<u8>> {
    let mut result = data;
    for op in ops {
        result = apply_op(result, op)?;
    }
    Ok(result)
}

// ── Natural-language phrasings ──────────────────────────────────

fn phrase(op: &ByteOp, rng: &mut impl Rng) -> String {
    let mut options: Vec<String> = match op {
        ByteOp::Xor { key } => vec![
            format!("XOR each byte with 0x{key:02X}"),
            format!("Apply exclusive-or with the value {key} to every byte"),
            format!("Bitwise XOR each octet using the key {key}"),
            format!("For every byte, flip bits using 0x{key:02x} as mask"),
        ],
        ByteOp::Reverse => vec![
            "Reverse the byte order".into(),
            "Flip the sequence end-to-end".into(),
            "Mirror the byte array so the last byte becomes first".into(),
            "Invert the positional ordering of all bytes".into(),
        ],
        ByteOp::Slice { start, end } => vec![
            format!("Take bytes from offset {start} to {end}"),
            format!("Extract the slice [{start}:{end}] from the data"),
            format!("Isolate bytes at positions {start} through {}", end - 1),
        ],
        ByteOp::Sort => vec![
            "Sort all bytes in ascending order".into(),
            "Arrange the bytes from smallest to largest value".into(),
            "Order the octets numerically, lowest first".into(),
        ],
        ByteOp::Rotate { positions } => vec![
            format!("Rotate the bytes left by {positions} positions"),
            format!("Shift all bytes {positions} positions to the left, wrapping around"),
            format!("Circular left-shift the array by {positions}"),
        ],
        ByteOp::Sha256 => vec![
            "Compute the SHA-256 hash of the current data (producing 32 raw bytes)".into(),
            "Hash the byte array with SHA-256, replacing it with the 32-byte digest".into(),
            "Apply SHA-256 to the data; the result is the raw 32-byte hash".into(),
        ],
        ByteOp::BitwiseNot => vec![
            "Flip every bit in each byte (bitwise NOT, masked to 8 bits)".into(),
            "Apply bitwise complement to every byte (~byte & 0xFF)".into(),
            "Invert all bits in the array; each byte becomes its one's complement".into(),
        ],
        ByteOp::Repeat { times } => vec![
            format!("Concatenate the array with itself {times} times (total {times}x copies)"),
            format!("Repeat the data {times} times by appending it to itself"),
            format!("Duplicate the byte sequence so it appears {times} times in a row"),
        ],
        ByteOp::Hmac { key_hex } => vec![
            format!(
                "Compute HMAC-SHA256 of the data using the hex key {key_hex} (producing 32 raw bytes)"
            ),
            format!("HMAC the byte array with SHA-256 and key 0x{key_hex}, yielding 32 bytes"),
            format!(
                "Apply HMAC-SHA256 using the secret key (hex) {key_hex}; the result is 32 raw bytes"
            ),
        ],
        ByteOp::Base64Encode => vec![
            "Base64-encode the data, then treat the resulting ASCII string as a new byte array"
                .into(),
            "Encode the bytes as a base64 string and reinterpret its characters as byte values"
                .into(),
            "Convert the data to base64 and use the encoded string's character codes as the new bytes"
                .into(),
        ],
    };
    options.swap_remove(rng.gen_range(0..options.len()))
}

fn render_instructions(ops: &[ByteOp]) -> String {
    let mut rng = rand::thread_rng();
    ops.iter()
        .enumerate()
        .map(|(i, op)| format!("Step {}: {}", i + 1, phrase(op, &mut rng)))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Driver ──────────────────────────────────────────────────────

pub struct CryptoNlDriver;

impl ChallengeDriver for CryptoNlDriver {
    fn name(&self) -> &'static str {
        NAME
    }

    fn dimensions(&self) -> &'static [Dimension] {
        &[Dimension::Reasoning, Dimension::Execution]
    }

    fn generate(&self, difficulty: Difficulty) -> Result<ChallengePayload> {
        let (op_count, data_size) = difficulty_config(difficulty);
        let data = random_bytes(data_size);
        let ops = generate_ops(op_count, data_size, difficulty);
        let instructions = render_instructions(&ops);

        Ok(ChallengePayload {
            challenge_type: NAME.into(),
            instructions: format!(
                "{instructions}\n\nThen compute the SHA-256 hex digest of the final result."
            ),
            data: B64.encode(&data),
            steps: ops.len() as u32,
            context: Some(json!({ "ops": ops })),
        })
    }

    fn solve(&self, payload: &ChallengePayload) -> Result<String> {
        let data = decode_data(payload)?;
        let ops: Vec<ByteOp> = context_field(payload, "ops")?;
        let result = execute_ops(data, &ops)?;
        Ok(sha256_hex(&result))
    }
}
