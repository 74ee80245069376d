//! Heading detection for text that carries no native structure.
//!
//! Each [`HeadingClassifier`] looks at one line and answers whether it is a
//! heading and at which level. Classifiers are combined in a
//! [`ClassifierSet`], which keeps the strongest signal; adding a script
//! means adding a classifier, not touching the extractors.

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::config::HeuristicConfig;

lazy_static! {
    // 1.2 / 1.2.3 Title
    static ref DOTTED_NUMBERING: Regex = Regex::new(r"^(\d+(?:\.\d+){1,8})[\.\)]?\s+\S").unwrap();
    // 1. Title / 1) Title / 12 Title
    static ref SINGLE_NUMBERING: Regex = Regex::new(r"^\d{1,3}[\.\)]?\s+\S").unwrap();
    // A. Title
    static ref LETTER_NUMBERING: Regex = Regex::new(r"^[A-Z]\.\s*\S").unwrap();
    static ref LATIN_KEYWORD: Regex =
        Regex::new(r"(?i)^(chapter|part|appendix|annex|section)\b").unwrap();

    // 第1章 / 第一章 / 第2節
    static ref CJK_ORDINAL: Regex =
        Regex::new(r"^第[0-9一二三四五六七八九十百千〇零]+([章部編節項款])").unwrap();
    // 1．概要 / 1.2 概要 / 3、課題; a bare count such as 5月 or 3つ is prose
    static ref CJK_NUMBERING: Regex =
        Regex::new(r"^(\d{1,3}(?:\.\d{1,3}){0,8})(?:[\.\)、]\s*|\s+)[^\d\s.]").unwrap();
    static ref CJK_KEYWORD: Regex =
        Regex::new(r"^(付録|序章|終章|はじめに|おわりに|まとめ|参考文献|目次)").unwrap();
}

/// Which kind of evidence made a line a heading. Later variants win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HeadingSignal {
    ShortLine,
    Keyword,
    Numbering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadingGuess {
    pub level: u32,
    pub signal: HeadingSignal,
}

/// Per-call switches for a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineContext {
    /// Layout-only evidence (line length) is meaningful for extracted PDF
    /// text but not for DOCX paragraphs.
    pub allow_short_line: bool,
}

impl LineContext {
    pub const PAGE_TEXT: LineContext = LineContext { allow_short_line: true };
    pub const PARAGRAPH: LineContext = LineContext { allow_short_line: false };
}

pub trait HeadingClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` when the line is not a heading.
    fn classify(&self, line: &str, ctx: &LineContext) -> Option<HeadingGuess>;
}

/// True if the text contains Han, Hiragana or Katakana characters.
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c as u32,
            0x3040..=0x30FF     // Hiragana, Katakana
            | 0x3400..=0x4DBF   // CJK Extension A
            | 0x4E00..=0x9FFF   // CJK Unified Ideographs
            | 0xF900..=0xFAFF   // CJK Compatibility Ideographs
            | 0xFF66..=0xFF9F)  // Half-width Katakana
    })
}

/// Lines that cannot be headings at all: too short, or no letters (page numbers, rules).
fn is_candidate(line: &str, config: &HeuristicConfig) -> bool {
    line.chars().count() >= config.min_heading_chars && line.chars().any(char::is_alphabetic)
}

fn dotted_depth(numbering: &str) -> u32 {
    numbering.split('.').filter(|part| !part.is_empty()).count() as u32
}

/// Numbering, keyword and short-line heuristics for Latin-script documents.
pub struct LatinClassifier {
    config: HeuristicConfig,
}

impl LatinClassifier {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }
}

impl HeadingClassifier for LatinClassifier {
    fn name(&self) -> &'static str {
        "latin"
    }

    fn classify(&self, line: &str, ctx: &LineContext) -> Option<HeadingGuess> {
        let line: String = line.trim().nfkc().collect();
        if !is_candidate(&line, &self.config) {
            return None;
        }

        let guess = |level: u32, signal| {
            Some(HeadingGuess {
                level: level.clamp(1, self.config.max_heading_level.max(1)),
                signal,
            })
        };

        if let Some(caps) = DOTTED_NUMBERING.captures(&line) {
            return guess(dotted_depth(&caps[1]), HeadingSignal::Numbering);
        }
        if SINGLE_NUMBERING.is_match(&line) || LETTER_NUMBERING.is_match(&line) {
            return guess(1, HeadingSignal::Numbering);
        }
        if let Some(caps) = LATIN_KEYWORD.captures(&line) {
            let level = if caps[1].eq_ignore_ascii_case("section") { 2 } else { 1 };
            return guess(level, HeadingSignal::Keyword);
        }

        // CJK lines are measured by the CJK classifier's threshold
        if ctx.allow_short_line
            && self.config.enable_short_line
            && !contains_cjk(&line)
            && line.chars().count() <= self.config.short_line_max_chars
        {
            return guess(self.config.short_line_level, HeadingSignal::ShortLine);
        }

        None
    }
}

/// Heuristics for Japanese headings (第N章, 付録, unspaced numbering).
pub struct JapaneseClassifier {
    config: HeuristicConfig,
}

impl JapaneseClassifier {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }
}

impl HeadingClassifier for JapaneseClassifier {
    fn name(&self) -> &'static str {
        "japanese"
    }

    fn classify(&self, line: &str, ctx: &LineContext) -> Option<HeadingGuess> {
        // Full-width digits and dots become ASCII under NFKC
        let line: String = line.trim().nfkc().collect();
        if !contains_cjk(&line) || !is_candidate(&line, &self.config) {
            return None;
        }

        let guess = |level: u32, signal| {
            Some(HeadingGuess {
                level: level.clamp(1, self.config.max_heading_level.max(1)),
                signal,
            })
        };

        if let Some(caps) = CJK_ORDINAL.captures(&line) {
            let level = match &caps[1] {
                "節" => 2,
                "項" | "款" => 3,
                _ => 1,
            };
            return guess(level, HeadingSignal::Numbering);
        }
        if let Some(caps) = CJK_NUMBERING.captures(&line) {
            return guess(dotted_depth(&caps[1]), HeadingSignal::Numbering);
        }
        if CJK_KEYWORD.is_match(&line) {
            return guess(1, HeadingSignal::Keyword);
        }

        if ctx.allow_short_line
            && self.config.enable_short_line
            && line.chars().count() <= self.config.cjk_short_line_max_chars
        {
            return guess(self.config.short_line_level, HeadingSignal::ShortLine);
        }

        None
    }
}

/// Ordered collection of classifiers; the strongest signal wins and ties
/// go to the classifier registered first.
pub struct ClassifierSet {
    classifiers: Vec<Box<dyn HeadingClassifier>>,
}

impl ClassifierSet {
    pub fn new(classifiers: Vec<Box<dyn HeadingClassifier>>) -> Self {
        Self { classifiers }
    }

    /// Japanese first, then Latin.
    pub fn default_for(config: &HeuristicConfig) -> Self {
        Self::new(vec![
            Box::new(JapaneseClassifier::new(config.clone())),
            Box::new(LatinClassifier::new(config.clone())),
        ])
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.classifiers.iter().map(|c| c.name()).collect()
    }

    pub fn classify(&self, line: &str, ctx: &LineContext) -> Option<HeadingGuess> {
        let mut best: Option<HeadingGuess> = None;
        for classifier in &self.classifiers {
            if let Some(guess) = classifier.classify(line, ctx) {
                if best.is_none_or(|current| guess.signal > current.signal) {
                    best = Some(guess);
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> ClassifierSet {
        ClassifierSet::default_for(&HeuristicConfig::default())
    }

    fn level(line: &str) -> Option<u32> {
        set().classify(line, &LineContext::PAGE_TEXT).map(|g| g.level)
    }

    #[test]
    fn test_dotted_numbering_depth() {
        assert_eq!(level("1.2.3 Sampling strategy for the second cohort of participants"), Some(3));
        assert_eq!(level("2.1 Background"), Some(2));
    }

    #[test]
    fn test_single_numbering_and_letters() {
        assert_eq!(level("1. Introduction to the problem space and its many constraints"), Some(1));
        assert_eq!(level("3) Results"), Some(1));
        assert_eq!(level("B. Related work"), Some(1));
    }

    #[test]
    fn test_keywords() {
        let guess = set()
            .classify("Appendix: raw measurement tables and extended derivations", &LineContext::PARAGRAPH)
            .unwrap();
        assert_eq!(guess.signal, HeadingSignal::Keyword);
        assert_eq!(guess.level, 1);
        assert_eq!(level("Section on methodology"), Some(2));
    }

    #[test]
    fn test_short_line_only_for_page_text() {
        assert_eq!(level("Summary"), Some(2));
        assert_eq!(set().classify("Summary", &LineContext::PARAGRAPH), None);
    }

    #[test]
    fn test_long_prose_is_not_heading() {
        assert_eq!(
            level("This sentence is clearly body text because it runs on for a long while."),
            None
        );
    }

    #[test]
    fn test_page_numbers_rejected() {
        assert_eq!(level("12"), None);
        assert_eq!(level("- 3 -"), None);
    }

    #[test]
    fn test_japanese_ordinals() {
        assert_eq!(level("第1章 研究の背景と目的について詳しく述べる長い見出しの例です"), Some(1));
        assert_eq!(level("第三節 手法"), Some(2));
        assert_eq!(level("第2項 評価"), Some(3));
    }

    #[test]
    fn test_japanese_fullwidth_numbering() {
        assert_eq!(level("１．２ 評価方法についての詳細な説明と実験条件の整理を行う節"), Some(2));
        assert_eq!(level("3．概要"), Some(1));
        assert_eq!(level("２、課題"), Some(1));
    }

    #[test]
    fn test_counts_and_dates_are_not_numbering() {
        for line in ["5月の売上は前年比で増加した。", "3つの課題が残っている。", "10時から会議を開始します。"] {
            assert_eq!(set().classify(line, &LineContext::PARAGRAPH), None, "{}", line);
        }
        assert_eq!(set().classify("1.5倍に拡大した", &LineContext::PARAGRAPH), None);
    }

    #[test]
    fn test_year_prefix_is_not_numbering() {
        let guess = set().classify("2024年度の事業計画と予算配分の方針について", &LineContext::PAGE_TEXT);
        assert_eq!(guess, None);
    }

    #[test]
    fn test_japanese_keyword_and_short_line() {
        let guess = set().classify("参考文献", &LineContext::PARAGRAPH).unwrap();
        assert_eq!(guess.signal, HeadingSignal::Keyword);
        assert_eq!(level("結果の考察"), Some(2));
    }

    #[test]
    fn test_numbering_beats_short_line() {
        let guess = set().classify("1.1 Scope", &LineContext::PAGE_TEXT).unwrap();
        assert_eq!(guess.signal, HeadingSignal::Numbering);
        assert_eq!(guess.level, 2);
    }

    #[test]
    fn test_level_capped() {
        let config = HeuristicConfig {
            max_heading_level: 3,
            ..HeuristicConfig::default()
        };
        let set = ClassifierSet::default_for(&config);
        let guess = set.classify("1.2.3.4.5 Deep", &LineContext::PAGE_TEXT).unwrap();
        assert_eq!(guess.level, 3);
    }

    #[test]
    fn test_registration_order() {
        assert_eq!(set().names(), vec!["japanese", "latin"]);
    }
}
