use serde::{Deserialize, Serialize};
use validator::Validate;

/// One free-text user question. Lives for a single request/response cycle;
/// only the session transcript keeps it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UserQuestion {
    #[validate(length(min = 1, max = 4096))]
    pub text: String,
}

impl UserQuestion {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_question_fails_validation() {
        let q = UserQuestion::new("   ");
        assert!(q.validate().is_err());
    }

    #[test]
    fn question_is_trimmed() {
        let q = UserQuestion::new("  How many views?  ");
        assert_eq!(q.text, "How many views?");
        assert!(q.validate().is_ok());
    }
}
