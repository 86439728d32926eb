//! MultiStep: chained computations with labelled intermediate results
//! R1..Rn, plus memory probes that recall or re-apply earlier steps.
//!
//! The final answer is the SHA-256 hex digest of the lowercase-hex
//! concatenation of every step result.

use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{context_field, decode_data, ChallengeDriver, B64};
use crate::crypto::{hmac_sha256, random_bytes, sha256_hex};
use crate::error::{AgentAuthError, Result};
use crate::types::{ChallengePayload, Difficulty, Dimension};

const NAME: &str = "multi-step";

// ── Step definitions ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StepDef {
    /// Hash the previous result (or the input data for step 1).
    Sha256,
    Xor { key: u8 },
    /// The message is always the initial data. An empty key means "use the
    /// previous step's result as the key"; step 1 always carries a fixed
    /// hex key.
    Hmac { key: String },
    Slice { start: usize, end: usize },
    /// One byte of an earlier result, as two lowercase hex digits.
    MemoryRecall { step: usize, byte_index: usize },
    /// Re-execute an earlier step's definition on the previous result.
    MemoryApply { step: usize },
}

impl StepDef {
    fn is_memory(&self) -> bool {
        matches!(self, StepDef::MemoryRecall { .. } | StepDef::MemoryApply { .. })
    }
}

#[derive(Debug, Clone)]
struct StepResult {
    def: StepDef,
    /// Lowercase hex of this step's output.
    result: String,
}

struct DifficultyConfig {
    data_size: usize,
    compute_steps: usize,
    memory_recall: usize,
    memory_apply: usize,
}

fn difficulty_config(difficulty: Difficulty) -> DifficultyConfig {
    match difficulty {
        Difficulty::Easy => DifficultyConfig {
            data_size: 32,
            compute_steps: 3,
            memory_recall: 0,
            memory_apply: 0,
        },
        Difficulty::Medium => DifficultyConfig {
            data_size: 32,
            compute_steps: 3,
            memory_recall: 1,
            memory_apply: 0,
        },
        Difficulty::Hard => DifficultyConfig {
            data_size: 64,
            compute_steps: 3,
            memory_recall: 1,
            memory_apply: 1,
        },
        Difficulty::Adversarial => DifficultyConfig {
            data_size: 64,
            compute_steps: 4,
            memory_recall: 2,
            memory_apply: 1,
        },
    }
}

// ── Step execution ──────────────────────────────────────────────

fn from_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|e| AgentAuthError::MalformedPayload(format!("bad hex: {e}")))
}

fn prior_result<'a>(results: &'a [StepResult], step: usize) -> Result<&'a StepResult> {
    results
        .get(step)
        .ok_or_else(|| AgentAuthError::MalformedPayload(format!("step {step} out of range")))
}

/// Execute one step. `results` holds the outputs of every earlier step;
/// `index` is this step's position (0-based).
fn execute_step(
    index: usize,
    def: &StepDef,
    input_data_hex: &str,
    results: &[StepResult],
) -> Result<String> {
    let source = |results: &[StepResult]| -> Result<String> {
        if index == 0 {
            Ok(input_data_hex.to_owned())
        } else {
            Ok(prior_result(results, index - 1)?.result.clone())
        }
    };

    match def {
        StepDef::Sha256 => {
            let data = from_hex(&source(results)?)?;
            Ok(sha256_hex(&data))
        }
        StepDef::Xor { key } => {
            let data = from_hex(&source(results)?)?;
            Ok(hex::encode(
                data.iter().map(|b| b ^ key).collect::<Vec<u8>>(),
            ))
        }
        StepDef::Hmac { key } => {
            let key_bytes = if index == 0 {
                from_hex(key)?
            } else {
                from_hex(&prior_result(results, index - 1)?.result)?
            };
            let message = from_hex(input_data_hex)?;
            Ok(hex::encode(hmac_sha256(&key_bytes, &message)))
        }
        StepDef::Slice { start, end } => {
            let data = from_hex(&source(results)?)?;
            let len = data.len();
            let start = (*start).min(len);
            let end = (*end).min(len).max(start);
            Ok(hex::encode(&data[start..end]))
        }
        StepDef::MemoryRecall { step, byte_index } => {
            let target = from_hex(&prior_result(results, *step)?.result)?;
            let byte = target.get(*byte_index).ok_or_else(|| {
                AgentAuthError::MalformedPayload(format!(
                    "byte index {byte_index} out of range for step {step}"
                ))
            })?;
            Ok(format!("{byte:02x}"))
        }
        StepDef::MemoryApply { step } => {
            let referenced = prior_result(results, *step)?.def.clone();
            execute_step(index, &referenced, input_data_hex, results)
        }
    }
}

fn execute_all_steps(steps: &[StepDef], input_data_hex: &str) -> Result<Vec<StepResult>> {
    let mut results: Vec<StepResult> = Vec::with_capacity(steps.len());
    for (i, def) in steps.iter().enumerate() {
        let result = execute_step(i, def, input_data_hex, &results)?;
        results.push(StepResult {
            def: def.clone(),
            result,
        });
    }
    Ok(results)
}

fn compute_final_answer(results: &[StepResult]) -> String {
    let concatenated: String = results.iter().map(|r| r.result.as_str()).collect();
    sha256_hex(concatenated.as_bytes())
}

// ── Step generation ─────────────────────────────────────────────

fn generate_compute_step(
    index: usize,
    data_size: usize,
    results: &[StepResult],
    rng: &mut impl Rng,
) -> StepDef {
    let available: &[&str] = if index == 0 {
        &["sha256", "xor"]
    } else {
        &["sha256", "xor", "hmac", "slice"]
    };

    match available[rng.gen_range(0..available.len())] {
        "sha256" => StepDef::Sha256,
        "xor" => StepDef::Xor {
            key: rng.gen_range(1..=255),
        },
        "hmac" => {
            if index == 0 {
                StepDef::Hmac {
                    key: hex::encode(random_bytes(16)),
                }
            } else {
                StepDef::Hmac { key: String::new() }
            }
        }
        _ => {
            let prev_len = if index == 0 {
                data_size
            } else {
                results[index - 1].result.len() / 2
            };
            let max_end = prev_len.max(4);
            let start = rng.gen_range(0..=max_end / 4);
            let end = rng.gen_range(start + 2..=(start + max_end / 2).min(max_end));
            StepDef::Slice { start, end }
        }
    }
}

fn generate_memory_recall_step(results: &[StepResult], rng: &mut impl Rng) -> Result<StepDef> {
    let step = rng.gen_range(0..results.len());
    let bytes = from_hex(&results[step].result)?;
    let byte_index = rng.gen_range(0..bytes.len());
    Ok(StepDef::MemoryRecall { step, byte_index })
}

fn generate_memory_apply_step(results: &[StepResult], rng: &mut impl Rng) -> StepDef {
    let compute_steps: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.def.is_memory())
        .map(|(i, _)| i)
        .collect();
    let step = if compute_steps.is_empty() {
        0
    } else {
        compute_steps[rng.gen_range(0..compute_steps.len())]
    };
    StepDef::MemoryApply { step }
}

/// Compute steps are generated while being executed, so that memory steps
/// have concrete results to point into.
fn generate_steps(
    difficulty: Difficulty,
    input_data_hex: &str,
) -> Result<(Vec<StepDef>, Vec<StepResult>)> {
    let config = difficulty_config(difficulty);
    let mut rng = rand::thread_rng();
    let mut steps: Vec<StepDef> = Vec::new();
    let mut results: Vec<StepResult> = Vec::new();

    for i in 0..config.compute_steps {
        let def = generate_compute_step(i, config.data_size, &results, &mut rng);
        let result = execute_step(i, &def, input_data_hex, &results)?;
        steps.push(def.clone());
        results.push(StepResult { def, result });
    }

    for _ in 0..config.memory_recall {
        let def = generate_memory_recall_step(&results, &mut rng)?;
        let index = steps.len();
        let result = execute_step(index, &def, input_data_hex, &results)?;
        steps.push(def.clone());
        results.push(StepResult { def, result });
    }

    for _ in 0..config.memory_apply {
        let def = generate_memory_apply_step(&results, &mut rng);
        let index = steps.len();
        let result = execute_step(index, &def, input_data_hex, &results)?;
        steps.push(def.clone());
        results.push(StepResult { def, result });
    }

    Ok((steps, results))
}

// ── Instruction rendering ───────────────────────────────────────

fn pick(options: Vec<String>, rng: &mut impl Rng) -> String {
    let mut options = options;
    options.swap_remove(rng.gen_range(0..options.len()))
}

fn render_instruction(index: usize, def: &StepDef, rng: &mut impl Rng) -> String {
    let step_num = index + 1;
    let label = format!("R{step_num}");
    let source_ref = if index == 0 {
        "the provided data".to_owned()
    } else {
        format!("R{index}")
    };

    let phrasing = match def {
        StepDef::Sha256 => pick(
            vec![
                format!("Compute the SHA-256 hash of {source_ref}. Your result is"),
                format!("Hash {source_ref} using SHA-256. Your result is"),
                format!("Apply SHA-256 to {source_ref}. Your result is"),
            ],
            rng,
        ),
        StepDef::Xor { key } => pick(
            vec![
                format!("XOR each byte of {source_ref} with 0x{key:02X}. Your result is"),
                format!(
                    "Apply exclusive-or with the value {key} to every byte of {source_ref}. Your result is"
                ),
                format!(
                    "Bitwise XOR each byte of {source_ref} using the key 0x{key:02x}. Your result is"
                ),
            ],
            rng,
        ),
        StepDef::Hmac { key } => {
            let key_ref = if index == 0 {
                format!("the hex key \"{key}\"")
            } else {
                format!("R{index}")
            };
            pick(
                vec![
                    format!(
                        "Compute HMAC-SHA256 with {key_ref} as key and the provided data as message. Your result is"
                    ),
                    format!(
                        "Use {key_ref} as an HMAC-SHA256 key to sign the provided data. Your result is"
                    ),
                ],
                rng,
            )
        }
        StepDef::Slice { start, end } => pick(
            vec![
                format!(
                    "Take bytes {start} through {} (inclusive) from {source_ref}. Your result is",
                    end - 1
                ),
                format!(
                    "Extract the first {} bytes of {source_ref} starting at offset {start}. Your result is",
                    end - start
                ),
            ],
            rng,
        ),
        StepDef::MemoryRecall { step, byte_index } => pick(
            vec![
                format!(
                    "What was byte {byte_index} (0-indexed) of your result R{}? Express as a 2-digit hex value. Your result is",
                    step + 1
                ),
                format!(
                    "Recall the value of byte at position {byte_index} in R{}, written as two hex digits. Your result is",
                    step + 1
                ),
            ],
            rng,
        ),
        StepDef::MemoryApply { step } => pick(
            vec![
                format!(
                    "Apply the same operation you performed in step {} to {source_ref}. Your result is",
                    step + 1
                ),
                format!(
                    "Repeat the operation from step {}, but this time on {source_ref}. Your result is",
                    step + 1
                ),
            ],
            rng,
        ),
    };

    format!("Step {step_num}: {phrasing} {label}.")
}

fn render_all_instructions(steps: &[StepDef]) -> String {
    let mut rng = rand::thread_rng();
    let lines: Vec<String> = steps
        .iter()
        .enumerate()
        .map(|(i, def)| render_instruction(i, def, &mut rng))
        .collect();
    let refs: Vec<String> = (1..=steps.len()).map(|i| format!("R{i}")).collect();
    format!(
        "{}\nYour final answer: SHA-256 of the concatenation of {} (all as lowercase hex strings, concatenated without separators).",
        lines.join("\n"),
        refs.join(" + ")
    )
}

// ── Driver ──────────────────────────────────────────────────────

pub struct MultiStepDriver;

impl ChallengeDriver for MultiStepDriver {
    fn name(&self) -> &'static str {
        NAME
    }

    fn dimensions(&self) -> &'static [Dimension] {
        &[Dimension::Reasoning, Dimension::Execution, Dimension::Memory]
    }

    fn generate(&self, difficulty: Difficulty) -> Result<ChallengePayload> {
        let config = difficulty_config(difficulty);
        let data = random_bytes(config.data_size);
        let input_data_hex = hex::encode(&data);

        let (steps, results) = generate_steps(difficulty, &input_data_hex)?;
        let final_answer = compute_final_answer(&results);
        let instructions = render_all_instructions(&steps);

        Ok(ChallengePayload {
            challenge_type: NAME.into(),
            instructions,
            data: B64.encode(&data),
            steps: steps.len() as u32,
            context: Some(json!({
                "step_defs": steps,
                "expected_results": results.iter().map(|r| r.result.clone()).collect::<Vec<_>>(),
                "expected_answer": final_answer,
            })),
        })
    }

    fn solve(&self, payload: &ChallengePayload) -> Result<String> {
        let data = decode_data(payload)?;
        let input_data_hex = hex::encode(&data);
        let steps: Vec<StepDef> = context_field(payload, "step_defs")?;
        let results = execute_all_steps(&steps, &input_data_hex)?;
        Ok(compute_final_answer(&results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DIFFICULTIES: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Adversarial,
    ];

    // ── Generation ──────────────────────────────────────

    #[test]
    fn test_generate_step_counts() {
        let driver = MultiStepDriver;
        for (difficulty, expected_steps) in [
            (Difficulty::Easy, 3),
            (Difficulty::Medium, 4),
            (Difficulty::Hard, 5),
            (Difficulty::Adversarial, 7),
        ] {
            let payload = driver.generate(difficulty).unwrap();
            assert_eq!(payload.steps, expected_steps, "{difficulty}");
        }
    }

    #[test]
    fn test_generated_context_matches_reexecution() {
        let driver = MultiStepDriver;
        for difficulty in DIFFICULTIES {
            let payload = driver.generate(difficulty).unwrap();
            let expected: String = context_field(&payload, "expected_answer").unwrap();
            assert_eq!(driver.solve(&payload).unwrap(), expected);
        }
    }

    #[test]
    fn test_instructions_reference_all_results() {
        let driver = MultiStepDriver;
        let payload = driver.generate(Difficulty::Adversarial).unwrap();
        for i in 1..=payload.steps {
            assert!(
                payload.instructions.contains(&format!("R{i}")),
                "missing R{i} in instructions"
            );
        }
        assert!(payload.instructions.contains("Your final answer"));
    }

    // ── Solve / verify round-trip ───────────────────────

    #[test]
    fn test_solve_verify_round_trip_all_difficulties() {
        let driver = MultiStepDriver;
        for difficulty in DIFFICULTIES {
            for _ in 0..10 {
                let payload = driver.generate(difficulty).unwrap();
                let hash = driver.compute_answer_hash(&payload).unwrap();
                let answer = driver.solve(&payload).unwrap();
                assert!(driver.verify(&hash, &json!(answer)));
                assert!(!driver.verify(&hash, &json!("wrong")));
                assert!(!driver.verify(&hash, &json!(7)));
            }
        }
    }

    // ── Step execution ──────────────────────────────────

    #[test]
    fn test_sha256_step_on_input() {
        let input = hex::encode(b"hello");
        let result = execute_step(0, &StepDef::Sha256, &input, &[]).unwrap();
        assert_eq!(result, sha256_hex(b"hello"));
    }

    #[test]
    fn test_xor_step_chains_from_previous() {
        let input = hex::encode([0x01u8, 0x02]);
        let results = execute_all_steps(
            &[StepDef::Xor { key: 0xFF }, StepDef::Xor { key: 0xFF }],
            &input,
        )
        .unwrap();
        // double XOR with the same key restores the input
        assert_eq!(results[1].result, input);
    }

    #[test]
    fn test_hmac_step_uses_previous_result_as_key() {
        let input = hex::encode([0xAAu8; 8]);
        let results = execute_all_steps(
            &[StepDef::Sha256, StepDef::Hmac { key: String::new() }],
            &input,
        )
        .unwrap();
        let key = hex::decode(&results[0].result).unwrap();
        let expected = hex::encode(hmac_sha256(&key, &[0xAAu8; 8]));
        assert_eq!(results[1].result, expected);
    }

    #[test]
    fn test_memory_recall_extracts_one_byte() {
        let input = hex::encode([0x10u8, 0x20, 0x30]);
        let results = execute_all_steps(
            &[
                StepDef::Xor { key: 0x01 },
                StepDef::MemoryRecall {
                    step: 0,
                    byte_index: 2,
                },
            ],
            &input,
        )
        .unwrap();
        assert_eq!(results[1].result, "31");
    }

    #[test]
    fn test_memory_apply_reexecutes_on_previous() {
        let input = hex::encode([0x0Fu8, 0xF0]);
        let results = execute_all_steps(
            &[
                StepDef::Xor { key: 0x0F },
                StepDef::Sha256,
                StepDef::MemoryApply { step: 0 },
            ],
            &input,
        )
        .unwrap();
        // step 3 re-applies "xor 0x0F" to R2 (the sha256 digest)
        let digest = hex::decode(&results[1].result).unwrap();
        let expected = hex::encode(digest.iter().map(|b| b ^ 0x0F).collect::<Vec<u8>>());
        assert_eq!(results[2].result, expected);
    }

    #[test]
    fn test_final_answer_hashes_concatenation() {
        let results = vec![
            StepResult {
                def: StepDef::Sha256,
                result: "aabb".into(),
            },
            StepResult {
                def: StepDef::Sha256,
                result: "ccdd".into(),
            },
        ];
        assert_eq!(compute_final_answer(&results), sha256_hex(b"aabbccdd"));
    }

    #[test]
    fn test_out_of_range_step_reference_errors() {
        let input = hex::encode([0u8; 4]);
        let err = execute_all_steps(&[StepDef::MemoryApply { step: 3 }], &input);
        assert!(err.is_err());
    }

    #[test]
    fn test_memory_steps_follow_compute_steps() {
        let driver = MultiStepDriver;
        for _ in 0..20 {
            let payload = driver.generate(Difficulty::Adversarial).unwrap();
            let steps: Vec<StepDef> = context_field(&payload, "step_defs").unwrap();
            let first_memory = steps.iter().position(StepDef::is_memory);
            if let Some(pos) = first_memory {
                assert!(steps[..pos].iter().all(|s| !s.is_memory()));
                // adversarial: 4 compute + 2 recall + 1 apply
                assert_eq!(pos, 4);
            }
        }
    }
}
