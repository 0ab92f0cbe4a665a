/// Counts positions where the submitted answer matches the key, ignoring case.
///
/// Both strings are expected to have the same length; extra characters on
/// either side are never counted.
pub fn grade(submitted: &str, key: &str) -> usize {
    submitted
        .chars()
        .zip(key.chars())
        .filter(|(answer, expected)| answer.eq_ignore_ascii_case(expected))
        .count()
}

/// Share of correct answers in `0.0..=1.0`.
pub fn ratio(correct_count: usize, question_count: usize) -> f64 {
    if question_count == 0 {
        return 0.0;
    }
    correct_count as f64 / question_count as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_matching_positions() {
        assert_eq!(grade("abdd", "abcd"), 3);
        assert_eq!(grade("dcba", "abcd"), 0);
    }

    #[test]
    fn key_against_itself_is_perfect() {
        for key in ["a", "abcd", "eeffgghh"] {
            assert_eq!(grade(key, key), key.len());
        }
    }

    #[test]
    fn comparison_ignores_case() {
        assert_eq!(grade("ABdD", "abcd"), 3);
    }

    #[test]
    fn grading_is_symmetric() {
        let pairs = [("abdd", "abcd"), ("aaaa", "abcd"), ("xyzw", "xazw")];
        for (a, k) in pairs {
            assert_eq!(grade(a, k), grade(k, a));
        }
    }

    #[test]
    fn ratio_of_three_out_of_four() {
        assert!((ratio(3, 4) - 0.75).abs() < f64::EPSILON);
        assert_eq!(ratio(0, 0), 0.0);
    }
}
