use super::totp::CODE_DIGITS;

/// Normalizes a user-typed token into an integer, correcting common look-alike characters.
///
/// Spaces are skipped and `!`, `B`/`b`, `G`, `g`, `I`/`i`, `O`/`o` are read as the digits they are
/// usually mistaken for. Note that upper-case `G` reads as 6 while lower-case `g` reads as 9.
/// Anything that is not an ASCII digit after mapping is dropped. Only the first `desired_length`
/// digits count; a shorter input yields the value of the digits found, as if left-padded with
/// zeros. Never fails.
pub fn sanitize(raw: &str, desired_length: usize) -> u64 {
    let mut result: u64 = 0;
    let mut accepted = 0;

    for ch in raw.chars() {
        if accepted >= desired_length {
            break;
        }
        let Some(digit) = normalize(ch).to_digit(10) else {
            continue;
        };
        result = result.saturating_mul(10).saturating_add(u64::from(digit));
        accepted += 1;
    }

    result
}

/// [`sanitize`] with the standard six digits.
pub fn sanitize_token(raw: &str) -> u64 {
    sanitize(raw, CODE_DIGITS)
}

fn normalize(ch: char) -> char {
    match ch {
        '!' => '1',
        'B' | 'b' => '8',
        'G' => '6',
        'g' => '9',
        'I' | 'i' => '1',
        'O' | 'o' => '0',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_token_is_unchanged() {
        assert_eq!(sanitize("123456", 6), 123456);
        assert_eq!(sanitize(&sanitize("987654", 6).to_string(), 6), 987654);
    }

    #[test]
    fn spaces_are_skipped() {
        assert_eq!(sanitize("1 2 3 4 5 6", 6), 123456);
        assert_eq!(sanitize("  123 456 ", 6), 123456);
    }

    #[test]
    fn confusable_characters_are_mapped() {
        assert_eq!(sanitize("!2B4I6", 6), 128416);
        assert_eq!(sanitize("bOoiI!", 6), 800111);
    }

    #[test]
    fn g_maps_asymmetrically() {
        assert_eq!(sanitize("G", 1), 6);
        assert_eq!(sanitize("g", 1), 9);
        assert_eq!(sanitize("1G2g34", 6), 162934);
    }

    #[test]
    fn unmapped_characters_are_dropped() {
        assert_eq!(sanitize("12-34x56", 6), 123456);
        assert_eq!(sanitize("abcdef", 6), 8);
        assert_eq!(sanitize("١٢٣", 6), 0);
    }

    #[test]
    fn extra_digits_are_ignored() {
        assert_eq!(sanitize("1234567890", 6), 123456);
    }

    #[test]
    fn short_input_keeps_only_found_digits() {
        assert_eq!(sanitize("12", 6), 12);
        assert_eq!(sanitize("000042", 6), 42);
        assert_eq!(sanitize("", 6), 0);
    }

    #[test]
    fn desired_length_is_respected() {
        assert_eq!(sanitize("12345678", 8), 12345678);
        assert_eq!(sanitize("123456", 0), 0);
        assert_eq!(sanitize_token("654321"), 654321);
    }
}
