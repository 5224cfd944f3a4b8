// Term-list glossary composer
use crate::error::Result;
use crate::port::GlossaryComposer;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Currency codes kept verbatim in every language
const NO_TRANSLATE: &[&str] = &[
    "AUD", "CAD", "CHF", "CNY", "EUR", "GBP", "HKD", "IDR", "INR", "JPY", "KRW", "MYR", "SGD",
    "THB", "TWD", "USD",
];

/// Emits the configured `source -> target` pairs whose source term occurs in
/// the sample, plus currency codes mapped to themselves
#[derive(Debug, Clone, Default)]
pub struct TermListGlossary {
    terms: Vec<(String, String)>,
}

impl TermListGlossary {
    pub fn new(terms: Vec<(String, String)>) -> Self {
        Self { terms }
    }

    /// Parse `source<TAB>target` lines; blank lines and `#` comments are skipped
    pub fn from_tsv(text: &str) -> Self {
        let terms = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|l| l.split_once('\t'))
            .map(|(s, t)| (s.trim().to_string(), t.trim().to_string()))
            .filter(|(s, t)| !s.is_empty() && !t.is_empty())
            .collect();
        Self { terms }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn rows(&self, sample: &str) -> Vec<(String, String)> {
        let haystack = sample.to_lowercase();
        let mut seen = BTreeSet::new();
        let mut rows = Vec::new();

        for (source, target) in &self.terms {
            if haystack.contains(&source.to_lowercase()) && seen.insert(source.to_lowercase()) {
                rows.push((source.clone(), target.clone()));
            }
        }
        for code in NO_TRANSLATE {
            let present = sample
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|token| token == *code);
            if present && seen.insert(code.to_lowercase()) {
                rows.push((code.to_string(), code.to_string()));
            }
        }
        rows
    }
}

#[async_trait]
impl GlossaryComposer for TermListGlossary {
    async fn compose(&self, _source_lang: &str, _target_lang: &str, sample: &str) -> Result<Vec<u8>> {
        let mut out = String::new();
        for (source, target) in self.rows(sample) {
            out.push_str(&source);
            out.push('\t');
            out.push_str(&target);
            out.push('\n');
        }
        Ok(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_only_terms_present_in_sample_are_emitted() {
        let glossary = TermListGlossary::from_tsv(
            "# finance\nlaporan keuangan\tfinancial report\nneraca\tbalance sheet\n\nbroken line\n",
        );
        assert_eq!(glossary.len(), 2);

        let tsv = glossary
            .compose("id", "en", "Laporan Keuangan 2024 dalam USD dan IDR.")
            .await
            .unwrap();
        let text = String::from_utf8(tsv).unwrap();
        assert_eq!(text, "laporan keuangan\tfinancial report\nIDR\tIDR\nUSD\tUSD\n");
    }

    #[tokio::test]
    async fn test_empty_when_nothing_matches() {
        let glossary = TermListGlossary::default();
        let tsv = glossary.compose("auto", "en", "nothing relevant, USDT is not USD-like").await.unwrap();
        // "USD" appears as its own token after splitting on '-'
        assert_eq!(String::from_utf8(tsv).unwrap(), "USD\tUSD\n");

        let none = glossary.compose("auto", "en", "plain words").await.unwrap();
        assert!(none.is_empty());
    }
}
