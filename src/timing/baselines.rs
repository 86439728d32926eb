//! Built-in latency baselines: four challenge types × four difficulties.

use super::TimingBaseline;
use crate::types::Difficulty;

#[allow(clippy::too_many_arguments)]
fn baseline(
    challenge_type: &str,
    difficulty: Difficulty,
    mean_ms: f64,
    std_ms: f64,
    too_fast_ms: f64,
    ai_lower_ms: f64,
    ai_upper_ms: f64,
    human_ms: f64,
    timeout_ms: f64,
) -> TimingBaseline {
    TimingBaseline {
        challenge_type: challenge_type.to_owned(),
        difficulty,
        mean_ms,
        std_ms,
        too_fast_ms,
        ai_lower_ms,
        ai_upper_ms,
        human_ms,
        timeout_ms,
    }
}

pub fn default_baselines() -> Vec<TimingBaseline> {
    use Difficulty::{Adversarial, Easy, Hard, Medium};

    vec![
        // crypto-nl
        baseline("crypto-nl", Easy, 150.0, 60.0, 20.0, 40.0, 1000.0, 8000.0, 30000.0),
        baseline("crypto-nl", Medium, 300.0, 120.0, 30.0, 50.0, 2000.0, 10000.0, 30000.0),
        baseline("crypto-nl", Hard, 600.0, 200.0, 50.0, 100.0, 3000.0, 15000.0, 30000.0),
        baseline("crypto-nl", Adversarial, 1000.0, 350.0, 80.0, 150.0, 5000.0, 20000.0, 30000.0),
        // multi-step
        baseline("multi-step", Easy, 400.0, 150.0, 40.0, 80.0, 2000.0, 12000.0, 30000.0),
        baseline("multi-step", Medium, 800.0, 300.0, 60.0, 150.0, 4000.0, 15000.0, 30000.0),
        baseline("multi-step", Hard, 1200.0, 400.0, 100.0, 300.0, 5000.0, 20000.0, 30000.0),
        baseline("multi-step", Adversarial, 1800.0, 500.0, 150.0, 400.0, 7000.0, 25000.0, 30000.0),
        // ambiguous-logic
        baseline("ambiguous-logic", Easy, 200.0, 80.0, 20.0, 50.0, 1500.0, 10000.0, 30000.0),
        baseline("ambiguous-logic", Medium, 400.0, 150.0, 40.0, 80.0, 2500.0, 12000.0, 30000.0),
        baseline("ambiguous-logic", Hard, 700.0, 250.0, 60.0, 120.0, 3500.0, 15000.0, 30000.0),
        baseline("ambiguous-logic", Adversarial, 1000.0, 350.0, 80.0, 200.0, 5000.0, 20000.0, 30000.0),
        // code-execution
        baseline("code-execution", Easy, 300.0, 100.0, 30.0, 60.0, 1500.0, 15000.0, 30000.0),
        baseline("code-execution", Medium, 500.0, 200.0, 50.0, 100.0, 3000.0, 20000.0, 30000.0),
        baseline("code-execution", Hard, 900.0, 300.0, 80.0, 150.0, 4500.0, 25000.0, 30000.0),
        baseline("code-execution", Adversarial, 1500.0, 450.0, 120.0, 250.0, 6000.0, 30000.0, 30000.0),
    ]
}

pub fn get_baseline(challenge_type: &str, difficulty: Difficulty) -> Option<TimingBaseline> {
    default_baselines()
        .into_iter()
        .find(|b| b.challenge_type == challenge_type && b.difficulty == difficulty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_baselines_count() {
        assert_eq!(default_baselines().len(), 16);
    }

    #[test]
    fn test_get_baseline() {
        let b = get_baseline("crypto-nl", Difficulty::Easy).unwrap();
        assert_eq!(b.challenge_type, "crypto-nl");
        assert_eq!(b.mean_ms, 150.0);
        assert!(get_baseline("nope", Difficulty::Easy).is_none());
    }

    #[test]
    fn test_all_type_difficulty_pairs_present() {
        for challenge_type in ["crypto-nl", "multi-step", "ambiguous-logic", "code-execution"] {
            for difficulty in [
                Difficulty::Easy,
                Difficulty::Medium,
                Difficulty::Hard,
                Difficulty::Adversarial,
            ] {
                assert!(
                    get_baseline(challenge_type, difficulty).is_some(),
                    "missing {challenge_type}/{difficulty}"
                );
            }
        }
    }

    #[test]
    fn test_boundaries_are_ordered() {
        for b in default_baselines() {
            assert!(b.too_fast_ms <= b.ai_upper_ms);
            assert!(b.ai_upper_ms <= b.human_ms);
            assert!(b.human_ms <= b.timeout_ms);
        }
    }
}
