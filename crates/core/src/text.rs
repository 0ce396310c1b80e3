use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Characters kept by [`clean_text`] besides letters, digits and whitespace.
/// Dates need `/ . -`, MRZ lines need `<`, labels need `:`, `'` and `°`.
const KEPT_PUNCTUATION: &[char] = &['/', '.', '-', '\'', '<', ':', '°'];

/// Remove diacritics: `"Sénégal"` → `"Senegal"`.
pub fn strip_accents(value: &str) -> String {
    value.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Collapse every whitespace run into a single space and trim the ends.
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace OCR noise characters with spaces, keeping the punctuation that
/// carries meaning on identity documents.
pub fn clean_text(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || KEPT_PUNCTUATION.contains(&c) {
                c
            } else {
                ' '
            }
        })
        .collect();
    collapse_whitespace(&replaced)
}

/// Case-folded, accent-stripped, whitespace-collapsed form used for
/// comparisons of free text (names, places, labels).
pub fn fold_text(value: &str) -> String {
    collapse_whitespace(&strip_accents(value).to_lowercase())
}

/// Canonical identifier form: accent-stripped, upper-cased, only `A-Z`,
/// `0-9` and `-` kept.
pub fn normalize_identifier(value: &str) -> String {
    strip_accents(value)
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

/// Levenshtein edit distance over chars using the two-row algorithm.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    let (m, n) = (a.len(), b.len());

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    // Keep the shorter string in the inner loop to minimise allocation.
    let (a, b, m, n) = if m <= n { (a, b, m, n) } else { (b, a, n, m) };

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Similarity ratio in `[0.0, 1.0]`: `1 - distance / longest_length`.
/// Two empty strings are identical.
pub fn similarity_ratio(s1: &str, s2: &str) -> f32 {
    if s1 == s2 {
        return 1.0;
    }
    let max_len = s1.chars().count().max(s2.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein_distance(s1, s2) as f32 / max_len as f32)
}

/// Share of meaningful characters among the non-whitespace ones; 0.0 for
/// blank input. Letters, digits and the MRZ filler `<` count as meaningful.
pub fn text_quality(value: &str) -> f32 {
    let (meaningful, total) = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(m, t), c| {
            (m + usize::from(c.is_alphanumeric() || c == '<'), t + 1)
        });
    if total == 0 {
        return 0.0;
    }
    meaningful as f32 / total as f32
}
