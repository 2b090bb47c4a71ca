use std::num::NonZeroU32;

/// Share of the width budget a line may use before it is re-split.
const FILL_RATIO: f32 = 0.95;

/// Pixel measurement of rendered text.
pub trait TextMeasure {
    fn text_width(&self, text: &str) -> f32;
}

/// Wrap `text` into lines that fit `max_width` pixels under `measure`.
///
/// A first pass wraps greedily on a character budget estimated from the width
/// of `"A"`. Every draft line is then measured for real, and lines wider than
/// 95% of the budget are re-split word by word. A word that is wider than the
/// budget on its own keeps a line to itself; words are never broken.
pub fn wrap_text<M>(text: &str, max_width: NonZeroU32, measure: &M) -> Vec<String>
where
    M: TextMeasure + ?Sized,
{
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let max_width = max_width.get() as f32;
    let limit = max_width * FILL_RATIO;

    let avg_char_width = measure.text_width("A");
    let max_chars = if avg_char_width > 0.0 {
        ((max_width / avg_char_width) as usize).max(1)
    } else {
        1
    };
    let columns = ((max_chars as f32 * 1.5) as usize).max(1);

    let normalized = words.join(" ");
    let draft = textwrap::wrap(
        &normalized,
        textwrap::Options::new(columns)
            .break_words(false)
            .word_separator(textwrap::WordSeparator::AsciiSpace)
            .word_splitter(textwrap::WordSplitter::NoHyphenation)
            .wrap_algorithm(textwrap::WrapAlgorithm::FirstFit),
    );

    let mut lines = Vec::with_capacity(draft.len());
    for line in draft {
        if measure.text_width(&line) > limit {
            resplit(&line, limit, measure, &mut lines);
        } else {
            lines.push(line.into_owned());
        }
    }
    lines
}

fn resplit<M>(line: &str, limit: f32, measure: &M, out: &mut Vec<String>)
where
    M: TextMeasure + ?Sized,
{
    let mut current = String::new();
    for word in line.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };

        if measure.text_width(&candidate) < limit {
            current = candidate;
        } else {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
}
