//! The default canary catalog: 17 probes covering formatting habits,
//! floating-point rendering, randomness distributions, and reasoning style.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;

use super::{Canary, CanaryAnalysis, Distribution, InjectionMethod};

pub const CATALOG_VERSION: &str = "1.1.0";

fn exact(pairs: &[(&str, &str)]) -> CanaryAnalysis {
    CanaryAnalysis::ExactMatch {
        expected: pairs
            .iter()
            .map(|(family, value)| (family.to_string(), value.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn pattern(pairs: &[(&str, &str)]) -> CanaryAnalysis {
    CanaryAnalysis::Pattern {
        patterns: pairs
            .iter()
            .map(|(family, value)| (family.to_string(), value.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn statistical(entries: &[(&str, f64, f64)]) -> CanaryAnalysis {
    CanaryAnalysis::Statistical {
        distributions: entries
            .iter()
            .map(|(family, mean, stddev)| {
                (
                    family.to_string(),
                    Distribution {
                        mean: *mean,
                        stddev: *stddev,
                    },
                )
            })
            .collect::<BTreeMap<_, _>>(),
    }
}

fn canary(
    id: &str,
    prompt: &str,
    method: InjectionMethod,
    analysis: CanaryAnalysis,
    weight: f64,
) -> Canary {
    Canary {
        id: id.to_owned(),
        prompt: prompt.to_owned(),
        injection_method: method,
        analysis,
        confidence_weight: weight,
    }
}

pub fn default_canaries() -> Vec<Canary> {
    vec![
        canary(
            "unicode-rtl",
            "What is the 3rd character (0-indexed) of the string '\\u202E\\u0041\\u0042\\u0043'? Reply with just the character.",
            InjectionMethod::Inline,
            exact(&[
                ("gpt-4-class", "C"),
                ("claude-3-class", "C"),
                ("gemini-class", "B"),
                ("llama-class", "B"),
                ("mistral-class", "C"),
            ]),
            0.3,
        ),
        canary(
            "random-numbers-5",
            "List 5 random integers between 1 and 100, comma-separated, no spaces.",
            InjectionMethod::Suffix,
            statistical(&[
                ("gpt-4-class", 52.0, 18.0),
                ("claude-3-class", 47.0, 20.0),
                ("gemini-class", 50.0, 22.0),
                ("llama-class", 55.0, 25.0),
                ("mistral-class", 48.0, 21.0),
            ]),
            0.4,
        ),
        canary(
            "random-numbers-10",
            "List 10 random integers between 1 and 50, comma-separated, no spaces.",
            InjectionMethod::Suffix,
            statistical(&[
                ("gpt-4-class", 26.0, 10.0),
                ("claude-3-class", 24.0, 12.0),
                ("gemini-class", 25.0, 11.0),
                ("llama-class", 28.0, 14.0),
                ("mistral-class", 25.0, 13.0),
            ]),
            0.35,
        ),
        canary(
            "reasoning-style",
            "Solve step by step in one sentence: if all A are B, and some B are C, can we say some A are C?",
            InjectionMethod::Inline,
            pattern(&[
                ("gpt-4-class", "therefore|thus|hence|consequently"),
                ("claude-3-class", "let me|let's|I need to|we need to|consider"),
                ("gemini-class", "so,|this means|we can see"),
                ("llama-class", "the answer is|yes|no,"),
                ("mistral-class", "indeed|in fact|precisely"),
            ]),
            0.25,
        ),
        canary(
            "math-precision",
            "What is 0.1 + 0.2? Reply with just the number.",
            InjectionMethod::Inline,
            exact(&[
                ("gpt-4-class", "0.3"),
                ("claude-3-class", "0.30000000000000004"),
                ("gemini-class", "0.3"),
                ("llama-class", "0.3"),
                ("mistral-class", "0.3"),
            ]),
            0.2,
        ),
        canary(
            "list-format",
            "List 3 primary colors, one per line.",
            InjectionMethod::Suffix,
            pattern(&[
                ("gpt-4-class", "^1\\.|^- |^Red"),
                ("claude-3-class", "^- |^\\* |^Red"),
                ("gemini-class", "^\\* |^1\\."),
                ("llama-class", "^1\\.|^Red"),
                ("mistral-class", "^- |^1\\."),
            ]),
            0.15,
        ),
        canary(
            "creative-word",
            "Say one random English word. Just the word, nothing else.",
            InjectionMethod::Suffix,
            statistical(&[
                ("gpt-4-class", 6.0, 2.0),
                ("claude-3-class", 8.0, 3.0),
                ("gemini-class", 5.0, 2.0),
                ("llama-class", 5.0, 3.0),
                ("mistral-class", 7.0, 2.0),
            ]),
            0.1,
        ),
        canary(
            "emoji-choice",
            "Pick one emoji that represents happiness. Just the emoji.",
            InjectionMethod::Inline,
            exact(&[
                ("gpt-4-class", "\u{1F60A}"),
                ("claude-3-class", "\u{1F604}"),
                ("gemini-class", "\u{1F603}"),
                ("llama-class", "\u{1F600}"),
                ("mistral-class", "\u{1F642}"),
            ]),
            0.2,
        ),
        canary(
            "code-style",
            "Write a one-line Python hello world. Just the code, no explanation.",
            InjectionMethod::Embedded,
            pattern(&[
                ("gpt-4-class", "print\\(\"Hello,? [Ww]orld!?\"\\)"),
                ("claude-3-class", "print\\(\"Hello,? [Ww]orld!?\"\\)"),
                ("gemini-class", "print\\(\"Hello,? [Ww]orld!?\"\\)"),
                ("llama-class", "print\\(\"Hello [Ww]orld\"\\)"),
                ("mistral-class", "print\\(\"Hello,? [Ww]orld!?\"\\)"),
            ]),
            0.1,
        ),
        canary(
            "temperature-words",
            "Describe 25 degrees Celsius in exactly one word.",
            InjectionMethod::Suffix,
            exact(&[
                ("gpt-4-class", "Warm"),
                ("claude-3-class", "Pleasant"),
                ("gemini-class", "Comfortable"),
                ("llama-class", "Warm"),
                ("mistral-class", "Mild"),
            ]),
            0.25,
        ),
        canary(
            "number-between",
            "Pick a number between 1 and 10. Just the number.",
            InjectionMethod::Inline,
            statistical(&[
                ("gpt-4-class", 7.0, 1.5),
                ("claude-3-class", 4.0, 2.0),
                ("gemini-class", 7.0, 2.0),
                ("llama-class", 5.0, 2.5),
                ("mistral-class", 6.0, 2.0),
            ]),
            0.3,
        ),
        canary(
            "default-greeting",
            "Say hello to a user in one short sentence.",
            InjectionMethod::Suffix,
            pattern(&[
                ("gpt-4-class", "Hello!|Hi there|Hey"),
                ("claude-3-class", "Hello!|Hi there|Hey there"),
                ("gemini-class", "Hello!|Hi!|Hey there"),
                ("llama-class", "Hello|Hi!|Hey"),
                ("mistral-class", "Hello!|Greetings|Hi"),
            ]),
            0.15,
        ),
        canary(
            "math-chain",
            "Solve step by step: (7+3)*2 - 4/2. Show your intermediate steps, then give the final answer.",
            InjectionMethod::Inline,
            pattern(&[
                ("gpt-4-class", "7 \\+ 3 = 10|10 \\* 2 = 20|= 18"),
                ("claude-3-class", "7\\+3|10\\)|\\* 2|= 18"),
                ("gemini-class", "\\(7\\+3\\)|= 10|20 - 2|= 18"),
                ("llama-class", "10 \\* 2|20 - 2|18"),
                ("mistral-class", "First|= 10|= 20|= 18"),
            ]),
            0.3,
        ),
        canary(
            "sorting-preference",
            "Sort these words alphabetically and list them: banana, cherry, apple, date. One per line.",
            InjectionMethod::Suffix,
            pattern(&[
                ("gpt-4-class", "^1\\.|^- [Aa]pple"),
                ("claude-3-class", "^- [Aa]pple|^\\* [Aa]pple|^[Aa]pple"),
                ("gemini-class", "^\\* [Aa]pple|^1\\."),
                ("llama-class", "^1\\. [Aa]pple|^[Aa]pple"),
                ("mistral-class", "^- [Aa]pple|^1\\."),
            ]),
            0.2,
        ),
        canary(
            "json-formatting",
            "Output a JSON object with keys \"name\" (value \"Alice\") and \"age\" (value 30). Just the JSON, nothing else.",
            InjectionMethod::Embedded,
            pattern(&[
                ("gpt-4-class", "\\{\\s*\"name\":\\s*\"Alice\",\\s*\"age\":\\s*30\\s*\\}"),
                ("claude-3-class", "\\{\\s*\n\\s*\"name\":\\s*\"Alice\""),
                ("gemini-class", "\\{\"name\":\"Alice\",\"age\":30\\}|\\{\\s*\"name\""),
                ("llama-class", "\\{\"name\": \"Alice\"|\\{\\s*\"name\""),
                ("mistral-class", "\\{\\s*\"name\":\\s*\"Alice\""),
            ]),
            0.2,
        ),
        canary(
            "analogy-completion",
            "Complete this analogy with one word: cat is to kitten as dog is to ___",
            InjectionMethod::Inline,
            exact(&[
                ("gpt-4-class", "puppy"),
                ("claude-3-class", "puppy"),
                ("gemini-class", "puppy"),
                ("llama-class", "puppy"),
                ("mistral-class", "puppy"),
            ]),
            0.1,
        ),
        canary(
            "confidence-expression",
            "On a scale of 0 to 100, how confident are you that 2+2=4? Reply with just the number.",
            InjectionMethod::Suffix,
            statistical(&[
                ("gpt-4-class", 100.0, 1.0),
                ("claude-3-class", 99.0, 3.0),
                ("gemini-class", 100.0, 1.0),
                ("llama-class", 95.0, 8.0),
                ("mistral-class", 100.0, 2.0),
            ]),
            0.15,
        ),
    ]
}

/// Optional filters for [`CanaryCatalog::select`].
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    pub method: Option<InjectionMethod>,
    pub exclude: Vec<String>,
}

/// Catalog of canary probes for model fingerprinting.
pub struct CanaryCatalog {
    canaries: Vec<Canary>,
    pub version: &'static str,
}

impl CanaryCatalog {
    /// Build with the default probe set, or a caller-supplied one.
    pub fn new(canaries: Option<Vec<Canary>>) -> Self {
        CanaryCatalog {
            canaries: canaries.unwrap_or_else(default_canaries),
            version: CATALOG_VERSION,
        }
    }

    pub fn list(&self) -> &[Canary] {
        &self.canaries
    }

    pub fn get(&self, id: &str) -> Option<&Canary> {
        self.canaries.iter().find(|c| c.id == id)
    }

    /// Apply the filters, shuffle, and take the first `count`.
    pub fn select(&self, count: usize, options: &SelectOptions) -> Vec<Canary> {
        let mut candidates: Vec<Canary> = self
            .canaries
            .iter()
            .filter(|c| options.method.map_or(true, |m| c.injection_method == m))
            .filter(|c| !options.exclude.contains(&c.id))
            .cloned()
            .collect();

        candidates.shuffle(&mut rand::thread_rng());
        candidates.truncate(count);
        candidates
    }
}

impl Default for CanaryCatalog {
    fn default() -> Self {
        CanaryCatalog::new(None)
    }
}
