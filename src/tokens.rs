use tiktoken_rs::CoreBPE;

/// Token counter used for chunk sizing. Resolution order: the model's own
/// encoding, then the generic `o200k_base` encoding, then a character
/// heuristic (~4 chars per token). Counting never fails; an inaccurate count
/// only affects chunk boundaries, not correctness.
pub struct TokenEstimator {
    bpe: Option<CoreBPE>,
}

impl TokenEstimator {
    pub fn for_model(model: &str) -> Self {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .or_else(|_| tiktoken_rs::o200k_base())
            .ok();
        if bpe.is_none() {
            eprintln!(
                "Warning: no tokenizer available for model {}. Falling back to character-based token estimation for chunking.",
                model
            );
        }
        Self { bpe }
    }

    pub fn count(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => char_estimate(text),
        }
    }
}

fn char_estimate(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_estimate_floor_is_one() {
        assert_eq!(char_estimate(""), 1);
        assert_eq!(char_estimate("ab"), 1);
        assert_eq!(char_estimate("abcdefgh"), 2);
    }

    #[test]
    fn unknown_model_still_counts() {
        // Unmapped model names resolve through the generic encoding.
        let est = TokenEstimator::for_model("gpt-5.1");
        assert!(est.count("fn main() {}\n") > 0);
    }

    #[test]
    fn known_model_counts() {
        let est = TokenEstimator::for_model("gpt-4o-mini");
        let n = est.count("hello world");
        assert!(n >= 1 && n <= 4);
    }
}
