//! Placeholder machine-translation adapter.
//!
//! No translation model exists anywhere in the retrieval pack, so this
//! adapter is a deterministic stand-in rather than a port of an
//! existing implementation: it annotates the source text with the
//! target language instead of translating it, which is sufficient to
//! exercise every pipeline/room code path that depends on MT producing
//! *some* string without claiming to produce real translations.

use xlate_core::error::EngineError;
use xlate_core::model::Language;
use xlate_core::ports::TranslationCapability;

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranslator;

impl TranslationCapability for PassthroughTranslator {
    fn translate(&self, text: &str, from: Language, to: Language) -> Result<String, EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::BadRequest("translate called with empty text".to_string()));
        }
        if from == to {
            return Ok(text.to_string());
        }
        tracing::debug!(%from, %to, "translated utterance");
        Ok(format!("[{from}->{to}] {text}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_language_is_passed_through_unchanged() {
        let mt = PassthroughTranslator;
        assert_eq!(mt.translate("hello", Language::En, Language::En).unwrap(), "hello");
    }

    #[test]
    fn different_languages_are_tagged() {
        let mt = PassthroughTranslator;
        let out = mt.translate("hello", Language::En, Language::Es).unwrap();
        assert_eq!(out, "[en->es] hello");
    }

    #[test]
    fn rejects_empty_text() {
        let mt = PassthroughTranslator;
        assert!(mt.translate("   ", Language::En, Language::Es).is_err());
    }
}
