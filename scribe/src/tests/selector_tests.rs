use crate::selector::{ChainTable, Role, Selector};

#[test]
fn parses_prefixed_selector_strings() {
    assert_eq!(
        Selector::from("css:.project-item"),
        Selector::Css(".project-item".to_string())
    );
    assert_eq!(
        Selector::from("testid:user-menu"),
        Selector::TestId("user-menu".to_string())
    );
    assert_eq!(
        Selector::from("text:button|Log in"),
        Selector::Text {
            tag: "button".to_string(),
            needle: "Log in".to_string()
        }
    );
    assert_eq!(
        Selector::from("aria:button|profile"),
        Selector::AriaLabel {
            tag: "button".to_string(),
            needle: "profile".to_string()
        }
    );
    assert_eq!(
        Selector::from("placeholder:Title"),
        Selector::Placeholder("Title".to_string())
    );
    assert_eq!(
        Selector::from("href:/project/"),
        Selector::Href("/project/".to_string())
    );
}

#[test]
fn unknown_prefix_becomes_invalid_not_a_panic() {
    match Selector::from("xpath://div") {
        Selector::Invalid(reason) => assert!(reason.contains("xpath://div")),
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn tagged_selector_without_needle_is_invalid() {
    assert!(matches!(Selector::from("text:button"), Selector::Invalid(_)));
    assert!(matches!(Selector::from("text:|needle"), Selector::Invalid(_)));
    assert!(matches!(Selector::from("aria:button|"), Selector::Invalid(_)));
}

#[test]
fn default_chain_table_is_valid_and_covers_every_role() {
    let table = ChainTable::default();
    table.validate().expect("default table must validate");
    for role in Role::ALL {
        assert!(!table.chain(role).is_empty(), "{role:?} has no chain");
    }
}

#[test]
fn validation_rejects_empty_chain() {
    let mut table = ChainTable::default();
    table.set_chain(Role::SubmitAction, Vec::new());
    assert!(table.validate().is_err());
}

#[test]
fn validation_rejects_invalid_entry() {
    let mut table = ChainTable::default();
    table.set_chain(Role::TitleField, vec![Selector::from("bogus")]);
    assert!(table.validate().is_err());
}

#[test]
fn js_compilation_escapes_needles() {
    let selector = Selector::Text {
        tag: "button".to_string(),
        needle: "say \"hi\"".to_string(),
    };
    let js = selector.to_js_array();
    assert!(js.contains("say \\\"hi\\\""), "unescaped needle in: {js}");
    assert_eq!(Selector::Invalid("x".to_string()).to_js_array(), "[]");
}
