//! Activation code generation.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

/// Smallest activation code.
pub const MIN_CODE: u32 = 1;
/// Largest activation code.
pub const MAX_CODE: u32 = 10_000;

/// Source of activation codes.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniformly random numeric code in `[MIN_CODE, MAX_CODE]`.
///
/// Codes are not checked for uniqueness.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        rand::rng().random_range(MIN_CODE..=MAX_CODE).to_string()
    }
}

/// Hands out a fixed sequence of codes, cycling when exhausted.
#[derive(Debug)]
pub struct FixedCodeGenerator {
    codes: Vec<String>,
    next: AtomicUsize,
}

impl FixedCodeGenerator {
    /// # Panics
    /// Panics if `codes` is empty.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes: Vec<String> = codes.into_iter().map(Into::into).collect();
        assert!(!codes.is_empty(), "FixedCodeGenerator needs at least one code");
        Self {
            codes,
            next: AtomicUsize::new(0),
        }
    }
}

impl CodeGenerator for FixedCodeGenerator {
    fn generate(&self) -> String {
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        self.codes[i % self.codes.len()].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_codes_in_range() {
        let generator = RandomCodeGenerator;
        for _ in 0..1000 {
            let code = generator.generate();
            let n: u32 = code.parse().unwrap();
            assert!((MIN_CODE..=MAX_CODE).contains(&n), "code {} out of range", n);
            assert!(!code.starts_with('0'));
        }
    }

    #[test]
    fn test_fixed_codes_cycle() {
        let generator = FixedCodeGenerator::new(["4821", "17"]);
        assert_eq!(generator.generate(), "4821");
        assert_eq!(generator.generate(), "17");
        assert_eq!(generator.generate(), "4821");
    }
}
