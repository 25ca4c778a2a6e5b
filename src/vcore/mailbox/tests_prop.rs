//! Property tests for tag layout
//!
//! TEST_SCOPE:
//!   - any tag written by write_tag validates as exactly one tag
//!   - complete() accepts answered tags and leaves value words untouched
//!   - validate() never panics on arbitrary words

use super::*;
use proptest::collection::vec;
use proptest::prelude::*;

proptest! {
    #[test]
    fn written_tag_validates(
        id in 1u32..=u32::MAX,
        args in vec(any::<u32>(), 0..=MAX_VALUE_WORDS),
        response_words in 0usize..=MAX_VALUE_WORDS,
    ) {
        let mut buf = [0u32; TAG_HEADER_WORDS + MAX_VALUE_WORDS];
        let used = write_tag(&mut buf, id, &args, response_words).unwrap();

        prop_assert_eq!(used, TAG_HEADER_WORDS + args.len().max(response_words));
        prop_assert_eq!(validate(&buf[..used]), Ok(1));
        prop_assert_eq!(&buf[TAG_HEADER_WORDS..TAG_HEADER_WORDS + args.len()], &args[..]);
    }

    #[test]
    fn complete_preserves_values(
        id in 1u32..=u32::MAX,
        args in vec(any::<u32>(), 1..=MAX_VALUE_WORDS),
    ) {
        let mut buf = [0u32; TAG_HEADER_WORDS + MAX_VALUE_WORDS];
        let used = write_tag(&mut buf, id, &args, 0).unwrap();
        buf[2] |= RESPONSE_BIT;

        prop_assert!(complete(&mut buf[..used]).is_ok());
        prop_assert_eq!(buf[2], (args.len() * 4) as u32);
        prop_assert_eq!(&buf[TAG_HEADER_WORDS..used], &args[..]);
    }

    #[test]
    fn validate_total_on_arbitrary_words(words in vec(any::<u32>(), 0..32)) {
        let _ = validate(&words);
    }
}
