// ============================================================
// Layer 4 - Text Preprocessor
// ============================================================
// Turns the raw text of a literary work into normalised
// sentences ready for vocabulary counting and encoding.
//
// Steps (applied in order):
//   1. clean()              Unicode spaces, CR, tabs and control
//                           characters become plain spaces/newlines,
//                           runs of spaces collapse, at most one
//                           blank line survives between paragraphs
//   2. sentences()          split on . ! ? ; and on blank lines
//   3. normalise_sentence() case-fold and strip punctuation
//
// Apostrophes and hyphens are kept when they sit between two
// letters ("don't", "well-known") and dropped otherwise, so
// quoted dialogue and dashes do not leak into the vocabulary.
//
// Reference: Rust Book §8 (Strings in Rust)

const SENTENCE_TERMINATORS: [char; 4] = ['.', '!', '?', ';'];

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Normalise whitespace and control characters.
    pub fn clean(&self, text: &str) -> String {
        let normalised: String = text.chars().map(normalise_char).collect();

        let lines: Vec<String> = normalised
            .lines()
            .map(collapse_spaces)
            .collect();

        // Allow at most one blank line between paragraphs
        let mut result     = String::with_capacity(normalised.len());
        let mut blank_run  = 0usize;
        for line in &lines {
            if line.is_empty() {
                blank_run += 1;
                if blank_run > 1 {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            result.push_str(line);
            result.push('\n');
        }

        result.trim().to_string()
    }

    /// Split cleaned text into sentences. Paragraph breaks always end
    /// a sentence; single newlines inside a paragraph do not.
    pub fn sentences(&self, text: &str) -> Vec<String> {
        let cleaned = self.clean(text);

        cleaned
            .split("\n\n")
            .flat_map(|paragraph| {
                paragraph
                    .split(|c| SENTENCE_TERMINATORS.contains(&c))
                    .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
                    .collect::<Vec<_>>()
            })
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Case-fold and strip punctuation from a single sentence.
    pub fn normalise_sentence(&self, sentence: &str) -> String {
        let chars: Vec<char> = sentence.chars().collect();
        let mut out = String::with_capacity(sentence.len());

        for (i, &c) in chars.iter().enumerate() {
            if c.is_alphanumeric() {
                out.extend(c.to_lowercase());
            } else if is_word_joiner(c) && between_letters(&chars, i) {
                out.push(if c == '\u{2019}' { '\'' } else { c });
            } else {
                out.push(' ');
            }
        }

        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Full pipeline: raw document text to normalised, non-empty sentences
    pub fn process(&self, text: &str) -> Vec<String> {
        self.sentences(text)
            .iter()
            .map(|s| self.normalise_sentence(s))
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

fn normalise_char(c: char) -> char {
    match c {
        '\t' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
        '\r' => '\n',
        c if c.is_control() && c != '\n' => ' ',
        c => c,
    }
}

fn collapse_spaces(line: &str) -> String {
    line.split(' ')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_word_joiner(c: char) -> bool {
    matches!(c, '\'' | '\u{2019}' | '-')
}

fn between_letters(chars: &[char], i: usize) -> bool {
    let before = i.checked_sub(1).and_then(|j| chars.get(j));
    let after  = chars.get(i + 1);
    matches!((before, after), (Some(b), Some(a)) if b.is_alphanumeric() && a.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_multiple_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello   world"), "hello world");
    }

    #[test]
    fn test_removes_control_chars() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello\x01world"), "hello world");
    }

    #[test]
    fn test_collapses_blank_lines() {
        let p = Preprocessor::new();
        let output = p.clean("line1\n\n\n\n\nline2");
        assert_eq!(output, "line1\n\nline2");
    }

    #[test]
    fn test_case_folding() {
        let p = Preprocessor::new();
        assert_eq!(p.normalise_sentence("It Is A Truth"), "it is a truth");
    }

    #[test]
    fn test_strips_punctuation() {
        let p = Preprocessor::new();
        assert_eq!(
            p.normalise_sentence("\"Well,\" said she: (quietly) -- yes"),
            "well said she quietly yes"
        );
    }

    #[test]
    fn test_keeps_inner_apostrophes_and_hyphens() {
        let p = Preprocessor::new();
        assert_eq!(
            p.normalise_sentence("Don\u{2019}t be so well-known, 'sir'"),
            "don't be so well-known sir"
        );
    }

    #[test]
    fn test_sentence_splitting() {
        let p = Preprocessor::new();
        let s = p.sentences("Call me Ishmael. Some years ago!\nNever mind\n\nhow long");
        assert_eq!(
            s,
            vec!["Call me Ishmael", "Some years ago", "Never mind", "how long"]
        );
    }

    #[test]
    fn test_process_drops_punctuation_only_sentences() {
        let p = Preprocessor::new();
        assert_eq!(p.process("Yes! ... -- . No?"), vec!["yes", "no"]);
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new();
        assert_eq!(p.clean(""), "");
        assert!(p.process("").is_empty());
    }
}
