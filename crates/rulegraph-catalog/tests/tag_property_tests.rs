use rulegraph_catalog::tag::{entity_id_of, suffix_of, Suffix};
use rulegraph_catalog::TypeTag;
use proptest::prelude::*;

fn entity_id() -> impl Strategy<Value = String> {
    // Host ids are short alphanumerics, but may embed underscores and even the
    // suffix words themselves.
    prop_oneof![
        proptest::string::string_regex("[a-z0-9][a-z0-9_-]{0,12}").unwrap(),
        Just("x_document".to_string()),
        Just("y_link".to_string()),
    ]
}

fn entity_tag() -> impl Strategy<Value = TypeTag> {
    (entity_id(), 0u8..4).prop_map(|(id, kind)| match kind {
        0 => TypeTag::Record(id),
        1 => TypeTag::RecordArray(id),
        2 => TypeTag::Link(id),
        _ => TypeTag::LinkArray(id),
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn string_helpers_agree_with_parsed_tag(tag in entity_tag()) {
        let text = tag.to_string();
        prop_assert_eq!(entity_id_of(&text), tag.entity_id());
        prop_assert_eq!(suffix_of(&text), tag.suffix());
        let parsed: TypeTag = text.parse().expect("parse");
        prop_assert_eq!(parsed, tag);
    }

    #[test]
    fn element_of_array_is_scalar_suffix(tag in entity_tag()) {
        let element = tag.element();
        match tag.suffix() {
            Some(Suffix::RecordArray) => prop_assert_eq!(element.suffix(), Some(Suffix::Record)),
            Some(Suffix::LinkArray) => prop_assert_eq!(element.suffix(), Some(Suffix::Link)),
            _ => prop_assert!(element.is_unset()),
        }
    }
}
