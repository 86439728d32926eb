//! AmbiguousLogic: deliberately underspecified instructions with one
//! canonical interpretation and scored alternatives.
//!
//! Hard chains two templates, adversarial three; chained scores multiply and
//! duplicate answers keep their highest score. The engine accepts only the
//! primary answer; the scored list is recorded for downstream scoring.

use base64::Engine;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;

use super::{context_field, ChallengeDriver, B64};
use crate::crypto::{random_bytes, sha256_hex};
use crate::error::{AgentAuthError, Result};
use crate::types::{ChallengePayload, Difficulty, Dimension};

const NAME: &str = "ambiguous-logic";

#[derive(Debug, Clone)]
struct AcceptableAnswer {
    /// Hex-encoded result.
    answer: String,
    /// 1.0 = the canonical interpretation.
    score: f64,
}

// ── Byte helpers ────────────────────────────────────────────────

fn xor_bytes(data: &[u8], key: u8) -> Vec<u8> {
    data.iter().map(|b| b ^ key).collect()
}

fn sort_ascending(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    out.sort_unstable();
    out
}

fn reverse_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    out.reverse();
    out
}

// ── Templates ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Template {
    LuckyNumber,
    FamousConstant,
    BigSmall,
}

const ALL_TEMPLATES: [Template; 3] = [
    Template::LuckyNumber,
    Template::FamousConstant,
    Template::BigSmall,
];

impl Template {
    fn name(self) -> &'static str {
        match self {
            Template::LuckyNumber => "lucky-number",
            Template::FamousConstant => "famous-constant",
            Template::BigSmall => "big-small",
        }
    }

    fn generate(
        self,
        data: &[u8],
        difficulty: Difficulty,
        rng: &mut impl Rng,
    ) -> (String, Vec<AcceptableAnswer>) {
        match self {
            Template::LuckyNumber => lucky_number(data, difficulty, rng),
            Template::FamousConstant => famous_constant(data, rng),
            Template::BigSmall => big_small(data, rng),
        }
    }
}

fn pick(options: Vec<String>, rng: &mut impl Rng) -> String {
    let mut options = options;
    options.swap_remove(rng.gen_range(0..options.len()))
}

/// "Lucky number" is canonically 7; alternative readings treat 3, 8, or 13
/// as lucky.
fn lucky_number(
    data: &[u8],
    difficulty: Difficulty,
    rng: &mut impl Rng,
) -> (String, Vec<AcceptableAnswer>) {
    let byte_count = data.len();

    let primary = if byte_count == 7 {
        xor_bytes(data, 7)
    } else {
        xor_bytes(data, 13)
    };
    let mut answers = vec![AcceptableAnswer {
        answer: hex::encode(primary),
        score: 1.0,
    }];

    if difficulty != Difficulty::Easy {
        for (lucky, score) in [(3usize, 0.6), (8, 0.6), (13, 0.7)] {
            let alt = if byte_count == lucky {
                xor_bytes(data, 7)
            } else {
                xor_bytes(data, 13)
            };
            let alt_hex = hex::encode(alt);
            if alt_hex != answers[0].answer {
                answers.push(AcceptableAnswer {
                    answer: alt_hex,
                    score,
                });
            }
        }
    }

    let instructions = pick(
        vec![
            format!(
                "You are given {byte_count} bytes of data (base64-encoded).\n\
                 If the number of bytes is a lucky number, XOR each byte with 7.\n\
                 Otherwise, XOR each byte with 13.\n\
                 Return the hex-encoded result."
            ),
            format!(
                "The data below contains {byte_count} bytes.\n\
                 When the byte count is lucky, apply XOR 7 to every byte.\n\
                 When unlucky, apply XOR 13 instead.\n\
                 Provide your answer as a hex string."
            ),
        ],
        rng,
    );

    (instructions, answers)
}

/// "The most famous constant" is canonically pi (3.1 -> 31); e (27) and
/// phi (16) are defensible alternatives.
fn famous_constant(data: &[u8], rng: &mut impl Rng) -> (String, Vec<AcceptableAnswer>) {
    let answers = vec![
        AcceptableAnswer {
            answer: hex::encode(xor_bytes(data, 31)),
            score: 1.0,
        },
        AcceptableAnswer {
            answer: hex::encode(xor_bytes(data, 27)),
            score: 0.8,
        },
        AcceptableAnswer {
            answer: hex::encode(xor_bytes(data, 16)),
            score: 0.6,
        },
    ];

    let instructions = pick(
        vec![
            "XOR each byte of the provided data with the most famous mathematical constant's \
             first two digits as an integer.\nReturn the hex-encoded result."
                .into(),
            "Take the universally recognized mathematical constant, extract its first two digits \
             as a whole number, and XOR every byte of the data with that number.\n\
             Provide the hex-encoded output."
                .into(),
        ],
        rng,
    );

    (instructions, answers)
}

/// "Big" canonically means > 127; > 100 and > 200 are alternatives.
fn big_small(data: &[u8], rng: &mut impl Rng) -> (String, Vec<AcceptableAnswer>) {
    let first = data.first().copied().unwrap_or_default();

    let branch = |threshold: u8| {
        if first > threshold {
            reverse_bytes(data)
        } else {
            sort_ascending(data)
        }
    };

    let mut answers = vec![AcceptableAnswer {
        answer: hex::encode(branch(127)),
        score: 1.0,
    }];
    let alt_100 = hex::encode(branch(100));
    let alt_200 = hex::encode(branch(200));
    if alt_100 != answers[0].answer {
        answers.push(AcceptableAnswer {
            answer: alt_100.clone(),
            score: 0.8,
        });
    }
    if alt_200 != answers[0].answer && alt_200 != alt_100 {
        answers.push(AcceptableAnswer {
            answer: alt_200,
            score: 0.7,
        });
    }

    let instructions = pick(
        vec![
            "If the first byte of the data is big, reverse the entire byte array.\n\
             Otherwise, sort all bytes in ascending order.\n\
             Return the hex-encoded result."
                .into(),
            "Examine the first byte. If it is a big value, flip the array end-to-end.\n\
             If it is small, arrange bytes from lowest to highest.\n\
             Provide the hex-encoded output."
                .into(),
        ],
        rng,
    );

    (instructions, answers)
}

// ── Difficulty configuration ────────────────────────────────────

/// (data size, chained template count)
fn difficulty_config(difficulty: Difficulty) -> (usize, usize) {
    match difficulty {
        Difficulty::Easy => (8, 1),
        Difficulty::Medium => (16, 1),
        Difficulty::Hard => (32, 2),
        Difficulty::Adversarial => (64, 3),
    }
}

fn dedup_keep_max(answers: Vec<AcceptableAnswer>) -> Vec<AcceptableAnswer> {
    let mut unique: Vec<AcceptableAnswer> = Vec::new();
    for ans in answers {
        match unique.iter_mut().find(|u| u.answer == ans.answer) {
            Some(existing) => {
                if ans.score > existing.score {
                    existing.score = ans.score;
                }
            }
            None => unique.push(ans),
        }
    }
    unique.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    unique
}

fn scored_answer_hashes(answers: &[AcceptableAnswer]) -> serde_json::Value {
    json!(answers
        .iter()
        .map(|a| json!({
            "answer_hash": sha256_hex(a.answer.as_bytes()),
            "score": a.score,
        }))
        .collect::<Vec<_>>())
}

// ── Driver ──────────────────────────────────────────────────────

pub struct AmbiguousLogicDriver;

impl AmbiguousLogicDriver {
    fn generate_single(
        &self,
        template: Template,
        data: &[u8],
        difficulty: Difficulty,
        rng: &mut impl Rng,
    ) -> ChallengePayload {
        let (instructions, answers) = template.generate(data, difficulty, rng);

        ChallengePayload {
            challenge_type: NAME.into(),
            instructions,
            data: B64.encode(data),
            steps: 1,
            context: Some(json!({
                "template_name": template.name(),
                "primary_answer": answers[0].answer,
                "scored_answers": scored_answer_hashes(&answers),
            })),
        }
    }

    /// Each template re-generates on the previous template's primary output;
    /// every (previous, next) answer pair multiplies scores.
    fn generate_chained(
        &self,
        templates: &[Template],
        data: &[u8],
        difficulty: Difficulty,
        rng: &mut impl Rng,
    ) -> Result<ChallengePayload> {
        let mut current_data = data.to_vec();
        let mut instruction_parts: Vec<String> = Vec::new();
        let mut all_acceptable: Vec<AcceptableAnswer> = Vec::new();

        for (i, template) in templates.iter().enumerate() {
            let (instructions, answers) = template.generate(&current_data, difficulty, rng);
            instruction_parts.push(format!("--- Part {} ---\n{instructions}", i + 1));

            if i == 0 {
                all_acceptable = answers;
            } else {
                let mut chained: Vec<AcceptableAnswer> = Vec::new();
                for prev in &all_acceptable {
                    let prev_data = hex::decode(&prev.answer).map_err(|e| {
                        AgentAuthError::MalformedPayload(format!("bad chained answer: {e}"))
                    })?;
                    let (_, chain_answers) = template.generate(&prev_data, difficulty, rng);
                    for ans in chain_answers {
                        chained.push(AcceptableAnswer {
                            answer: ans.answer,
                            score: prev.score * ans.score,
                        });
                    }
                }
                all_acceptable = chained;
            }

            current_data = hex::decode(&all_acceptable[0].answer).map_err(|e| {
                AgentAuthError::MalformedPayload(format!("bad chained answer: {e}"))
            })?;
        }

        let deduplicated = dedup_keep_max(all_acceptable);

        let full_instructions = format!(
            "This is a multi-part ambiguous logic challenge.\n\
             Apply each part's transformation in order, using the output of the previous part \
             as input for the next.\n\n{}",
            instruction_parts.join("\n\n")
        );

        Ok(ChallengePayload {
            challenge_type: NAME.into(),
            instructions: full_instructions,
            data: B64.encode(data),
            steps: templates.len() as u32,
            context: Some(json!({
                "template_names": templates.iter().map(|t| t.name()).collect::<Vec<_>>(),
                "primary_answer": deduplicated[0].answer,
                "scored_answers": scored_answer_hashes(&deduplicated),
            })),
        })
    }
}

impl ChallengeDriver for AmbiguousLogicDriver {
    fn name(&self) -> &'static str {
        NAME
    }

    fn dimensions(&self) -> &'static [Dimension] {
        &[Dimension::Reasoning, Dimension::Ambiguity]
    }

    fn generate(&self, difficulty: Difficulty) -> Result<ChallengePayload> {
        let (data_size, template_count) = difficulty_config(difficulty);
        let data = random_bytes(data_size);
        let mut rng = rand::thread_rng();

        let mut templates = ALL_TEMPLATES;
        templates.shuffle(&mut rng);
        let selected = &templates[..template_count.min(templates.len())];

        if selected.len() == 1 {
            Ok(self.generate_single(selected[0], &data, difficulty, &mut rng))
        } else {
            self.generate_chained(selected, &data, difficulty, &mut rng)
        }
    }

    fn solve(&self, payload: &ChallengePayload) -> Result<String> {
        context_field(payload, "primary_answer")
    }
}
