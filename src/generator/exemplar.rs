//! Basic-variant generation: overlap-ranked recall from the exemplar log.

use crate::error::GenerationError;
use crate::knowledge::{ExemplarLog, KnowledgeUnit};
use crate::random::RandomSource;
use crate::text;

/// Fragments spliced together when nothing overlaps the input.
const SPLICE_FRAGMENTS: usize = 3;

/// Answer from the exemplar log.
///
/// Units sharing tokens with the input are ranked by overlap count (newer
/// first on ties). The top unit's output is returned with the first sentence
/// of the runner-up appended. With no overlap at all, three random sentences
/// from across the log are spliced instead.
pub fn generate_from_exemplars(
    log: &ExemplarLog,
    input: &str,
    rng: &mut dyn RandomSource,
) -> Result<String, GenerationError> {
    let query = text::token_set(input);
    let mut ranked: Vec<(usize, &KnowledgeUnit)> = log
        .units()
        .rev()
        .map(|unit| (unit.overlap(&query), unit))
        .filter(|(overlap, _)| *overlap > 0)
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    if let Some((_, top)) = ranked.first() {
        let borrowed = ranked
            .get(1)
            .and_then(|(_, runner_up)| text::split_sentences(&runner_up.output).first().copied());
        return Ok(match borrowed {
            Some(sentence) if !top.output.contains(sentence) => {
                format!("{} {}", top.output.trim(), sentence)
            }
            _ => top.output.clone(),
        });
    }

    let sentences: Vec<&str> = log
        .units()
        .flat_map(|unit| text::split_sentences(&unit.output))
        .collect();
    if sentences.is_empty() {
        return Err(GenerationError::EmptyKnowledge);
    }
    let splice: Vec<&str> = (0..SPLICE_FRAGMENTS)
        .map(|_| sentences[rng.pick(sentences.len())])
        .collect();
    Ok(splice.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::random::ScriptedRandom;

    fn log_with(pairs: &[(&str, &str)]) -> ExemplarLog {
        let mut log = ExemplarLog::new(100);
        for (input, output) in pairs {
            log.push(KnowledgeUnit::new(input, output, Metrics::default()));
        }
        log
    }

    #[test]
    fn empty_log_is_an_error() {
        let log = ExemplarLog::new(10);
        let mut rng = ScriptedRandom::new(vec![0.5]);
        assert!(matches!(
            generate_from_exemplars(&log, "hello", &mut rng),
            Err(GenerationError::EmptyKnowledge)
        ));
    }

    #[test]
    fn top_match_borrows_runner_up_sentence() {
        let log = log_with(&[
            ("weather today rain", "Bring an umbrella. It is wet."),
            ("weather today sun rain", "It will be sunny."),
            ("cooking pasta", "Boil water first."),
        ]);
        let mut rng = ScriptedRandom::new(vec![0.0]);
        let output = generate_from_exemplars(&log, "rain today and sun", &mut rng).unwrap();
        assert_eq!(output, "It will be sunny. Bring an umbrella.");
    }

    #[test]
    fn single_match_returns_its_output() {
        let log = log_with(&[("cooking pasta", "Boil water first."), ("music", "Play it loud.")]);
        let mut rng = ScriptedRandom::new(vec![0.0]);
        let output = generate_from_exemplars(&log, "pasta please", &mut rng).unwrap();
        assert_eq!(output, "Boil water first.");
    }

    #[test]
    fn no_overlap_splices_three_sentences() {
        let log = log_with(&[("a", "One. Two."), ("b", "Three.")]);
        let mut rng = ScriptedRandom::new(vec![0.0, 0.5, 0.9]);
        let output = generate_from_exemplars(&log, "zzz", &mut rng).unwrap();
        assert_eq!(output, "One. Two. Three.");
    }
}
