use std::cell::RefCell;
use std::rc::Rc;

use rulegraph_catalog::{
    record_tag, Attribute, AutomationTarget, Catalog, Collection, ConstraintKind, LinkType, RuleTrigger, TypeTag,
};
use rulegraph_engine::block::{MessageLevel, Picker};
use rulegraph_engine::{
    BlockId, BlockKind, Connection, EditorConfig, EditorSession, EngineError, FieldEdit, Position, Socket,
    VariableId,
};

fn attribute(id: &str, name: &str) -> Attribute {
    Attribute {
        id: id.into(),
        name: name.into(),
        constraint_type: ConstraintKind::None,
    }
}

fn collection(id: &str, name: &str, attributes: Vec<Attribute>) -> Collection {
    Collection {
        id: id.into(),
        name: name.into(),
        icon: String::new(),
        color: String::new(),
        attributes,
        default_attribute_id: None,
    }
}

fn catalog_with_order_attributes(order_attributes: Vec<Attribute>) -> Catalog {
    Catalog {
        collections: vec![
            collection("ord", "Orders", order_attributes),
            collection("cust", "Customers", vec![attribute("c1", "Name")]),
        ],
        link_types: vec![LinkType {
            id: "oc".into(),
            name: "Ordered by".into(),
            collection_ids: ["ord".into(), "cust".into()],
            attributes: vec![attribute("since", "Since")],
        }],
        ..Catalog::default()
    }
}

fn catalog() -> Catalog {
    catalog_with_order_attributes(vec![attribute("attr1", "Title"), attribute("attr2", "Total")])
}

fn order_rule() -> EditorSession {
    EditorSession::for_target(
        catalog(),
        &AutomationTarget::rule("ord", RuleTrigger::Update),
        EditorConfig::default(),
    )
    .expect("session")
}

fn variable(session: &EditorSession, name: &str) -> VariableId {
    session.variable_by_name(name).expect("variable").id.clone()
}

fn getter(session: &EditorSession, name: &str) -> BlockId {
    let id = variable(session, name);
    session.graph().getters_of(&id)[0]
}

fn at(x: i32, y: i32) -> Position {
    Position::new(x, y)
}

fn show_message() -> BlockKind {
    BlockKind::ShowMessage {
        level: MessageLevel::default(),
    }
}

fn get_attribute() -> BlockKind {
    BlockKind::GetAttribute {
        attribute: Picker::default(),
    }
}

fn picker_of(session: &EditorSession, id: BlockId) -> Picker {
    let block = session.block(id).expect("block");
    block.kind.attribute_picker().expect("picker").0.clone()
}

/// newRecord → get_attribute → show_message
fn message_with_attribute(session: &mut EditorSession) -> (BlockId, BlockId) {
    let show = session.insert_block(show_message(), at(200, 200)).unwrap();
    let attr = session.insert_block(get_attribute(), at(300, 300)).unwrap();
    let record = getter(session, "newRecord");
    assert_eq!(
        session.connect_value(attr, Socket::Document, record).unwrap(),
        Connection::Connected
    );
    assert_eq!(
        session.connect_value(show, Socket::Message, attr).unwrap(),
        Connection::Connected
    );
    (show, attr)
}

#[test]
fn seeds_protected_getters_for_a_rule() {
    let session = order_rule();
    let names: Vec<_> = session.variables().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["oldRecord", "newRecord"]);
    assert!(session.variables().all(|v| v.protected));
    assert_eq!(session.graph().len(), 2);
    assert!(session.script().is_empty());
    assert!(matches!(session.compile(), Err(EngineError::EmptyScript)));
}

#[test]
fn emits_message_with_record_attribute() {
    let mut session = order_rule();
    let (_, attr) = message_with_attribute(&mut session);

    assert_eq!(picker_of(&session, attr).selected(), Some("attr1"));
    assert_eq!(
        session.compile().unwrap(),
        "var ctx = host.context();\n\nctx.showMessage(\"success\", ctx.getDocumentAttribute(newRecord, \"attr1\"));\n"
    );
}

#[test]
fn removed_attribute_falls_back_to_first_remaining() {
    let mut session = order_rule();
    message_with_attribute(&mut session);

    session
        .rebuild_with_catalog(catalog_with_order_attributes(vec![attribute("attr2", "Total")]))
        .unwrap();
    let attr = session
        .graph()
        .iter()
        .find(|b| matches!(b.kind, BlockKind::GetAttribute { .. }))
        .map(|b| b.id)
        .expect("get_attribute survives");
    assert_eq!(picker_of(&session, attr).selected(), Some("attr2"));
    assert!(session.script().contains("getDocumentAttribute(newRecord, \"attr2\")"));

    session.rebuild_with_catalog(catalog_with_order_attributes(vec![])).unwrap();
    let picker = picker_of(&session, attr);
    assert!(picker.options.is_empty());
    assert_eq!(picker.selected(), None);
}

#[test]
fn collection_default_attribute_wins_over_first() {
    let mut catalog = catalog();
    catalog.collections[0].default_attribute_id = Some("attr2".into());
    let mut session = EditorSession::for_target(
        catalog,
        &AutomationTarget::rule("ord", RuleTrigger::Create),
        EditorConfig::default(),
    )
    .unwrap();
    let (_, attr) = message_with_attribute(&mut session);
    assert_eq!(picker_of(&session, attr).selected(), Some("attr2"));

    session.set_field(attr, FieldEdit::Attribute("attr1".into())).unwrap();
    assert_eq!(picker_of(&session, attr).selected(), Some("attr1"));
}

#[test]
fn rejects_incompatible_connection_without_changes() {
    let mut session = order_rule();
    let attr = session.insert_block(get_attribute(), at(0, 0)).unwrap();
    let text = session
        .insert_block(BlockKind::Text { text: "hi".into() }, at(50, 50))
        .unwrap();
    let before = session.diagram().to_string();

    assert_eq!(
        session.connect_value(attr, Socket::Document, text).unwrap(),
        Connection::Rejected
    );
    assert_eq!(
        session.connect_value(attr, Socket::Else, text).unwrap(),
        Connection::Rejected
    );
    assert!(session.block(text).unwrap().is_top_level());
    assert_eq!(session.diagram(), before);
}

#[test]
fn loop_variable_takes_linked_collection_and_resets_on_disconnect() {
    let mut session = order_rule();
    let x = session.create_variable("x").unwrap();

    let linked = session
        .insert_block(
            BlockKind::LinkedDocuments {
                link_type_id: "oc".into(),
            },
            at(100, 100),
        )
        .unwrap();
    let record = getter(&session, "newRecord");
    session.connect_value(linked, Socket::Document, record).unwrap();

    let each = session
        .insert_block(BlockKind::ForEachDocument { variable: x.clone() }, at(100, 200))
        .unwrap();
    assert_eq!(
        session.connect_value(each, Socket::List, linked).unwrap(),
        Connection::Connected
    );

    let show = session.insert_block(show_message(), at(0, 0)).unwrap();
    assert_eq!(
        session.connect_statement(each, Socket::Do, show).unwrap(),
        Connection::Connected
    );
    let attr = session.insert_block(get_attribute(), at(0, 0)).unwrap();
    let x_getter = session
        .insert_block(BlockKind::VariableGet { variable: x.clone() }, at(0, 0))
        .unwrap();
    session.connect_value(attr, Socket::Document, x_getter).unwrap();
    session.connect_value(show, Socket::Message, attr).unwrap();

    assert_eq!(session.variable_by_name("x").unwrap().tag, record_tag("cust"));
    assert_eq!(session.block(linked).unwrap().output(), &TypeTag::RecordArray("cust".into()));
    assert_eq!(picker_of(&session, attr).selected(), Some("c1"));
    assert_eq!(
        session.script(),
        "var ctx = host.context();\nvar x;\n\n\
         for (x of ctx.getLinkedDocuments(newRecord, \"oc\")) {\n  \
         ctx.showMessage(\"success\", ctx.getDocumentAttribute(x, \"c1\"));\n}\n"
    );

    session.disconnect(linked).unwrap();
    assert_eq!(session.variable_by_name("x").unwrap().tag, TypeTag::Unset);
    let picker = picker_of(&session, attr);
    assert_eq!(picker.selected(), None);
    assert!(picker.options.is_empty());
    // Unset getters still fit a record socket.
    assert_eq!(session.block(attr).unwrap().document(), Some(x_getter));
    let landed = session.block(linked).unwrap().position;
    assert_eq!(landed, at(125, 225));
}

#[test]
fn link_document_offers_both_sides() {
    let mut session = EditorSession::for_target(
        catalog(),
        &AutomationTarget::link_rule("oc", RuleTrigger::Create),
        EditorConfig::default(),
    )
    .unwrap();
    let link_doc = session
        .insert_block(
            BlockKind::LinkDocument {
                collection: Picker::default(),
            },
            at(100, 100),
        )
        .unwrap();
    assert_eq!(session.block(link_doc).unwrap().output(), &TypeTag::Unresolved);

    let link = getter(&session, "newLink");
    session.connect_value(link_doc, Socket::Link, link).unwrap();
    let BlockKind::LinkDocument { collection } = &session.block(link_doc).unwrap().kind else {
        panic!("kind changed");
    };
    let offered: Vec<_> = collection.options.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(offered, ["Orders", "Customers"]);
    assert_eq!(session.block(link_doc).unwrap().output(), &record_tag("ord"));

    session.set_field(link_doc, FieldEdit::Collection("cust".into())).unwrap();
    assert_eq!(session.block(link_doc).unwrap().output(), &record_tag("cust"));

    let attr = session.insert_block(get_attribute(), at(0, 0)).unwrap();
    session.connect_value(attr, Socket::Document, link_doc).unwrap();
    assert_eq!(picker_of(&session, attr).selected(), Some("c1"));
}

#[test]
fn retyped_variable_drops_getters_that_no_longer_fit() {
    let mut session = order_rule();
    let x = session.create_variable("x").unwrap();
    let y = session.create_variable("y").unwrap();

    let each_link = session
        .insert_block(BlockKind::ForEachLink { variable: y }, at(100, 100))
        .unwrap();
    let x_getter = session
        .insert_block(BlockKind::VariableGet { variable: x.clone() }, at(0, 0))
        .unwrap();
    assert_eq!(
        session.connect_value(each_link, Socket::List, x_getter).unwrap(),
        Connection::Connected
    );

    let set = session
        .insert_block(BlockKind::VariableSet { variable: x }, at(300, 300))
        .unwrap();
    let record = getter(&session, "newRecord");
    session.connect_value(set, Socket::Value, record).unwrap();

    assert_eq!(session.variable_by_name("x").unwrap().tag, record_tag("ord"));
    assert!(session.block(x_getter).is_none());
    assert!(session.last_report().removed.contains(&x_getter));
}

#[test]
fn protected_variables_survive_every_edit() {
    let mut session = order_rule();
    let new_record = variable(&session, "newRecord");
    let record = getter(&session, "newRecord");

    session.delete_block(record).unwrap();
    assert!(session.block(record).is_some());

    session.delete_variable(&new_record).unwrap();
    assert!(session.variable_by_name("newRecord").is_some());
    assert!(!session.rename_variable(&new_record, "renamed").unwrap());

    let (show, attr) = message_with_attribute(&mut session);
    session.delete_block(show).unwrap();
    assert!(session.block(attr).is_none());
    assert!(session.block(record).unwrap().is_top_level());
}

#[test]
fn user_variables_rename_and_delete() {
    let mut session = order_rule();
    let x = session.create_variable("x").unwrap();
    let set = session
        .insert_block(BlockKind::VariableSet { variable: x.clone() }, at(0, 0))
        .unwrap();
    let value = session.insert_block(BlockKind::Number { value: 3.0 }, at(0, 0)).unwrap();
    session.connect_value(set, Socket::Value, value).unwrap();
    assert!(session.script().contains("x = 3;"));

    assert!(!session.rename_variable(&x, "newRecord").unwrap());
    assert!(session.rename_variable(&x, "total").unwrap());
    assert!(session.script().contains("total = 3;"));

    session.delete_variable(&x).unwrap();
    assert!(session.block(set).is_none());
    assert!(session.block(value).is_none());
    assert!(session.variable_by_name("total").is_none());
}

#[test]
fn insert_errors_name_the_problem() {
    let mut session = order_rule();
    assert!(matches!(
        session.insert_block(BlockKind::DeleteDocument, at(0, 0)),
        Err(EngineError::UnsupportedConfiguration(_))
    ));
    assert!(matches!(
        session.insert_block_type("no_such_block", at(0, 0)),
        Err(EngineError::UnknownBlockType(_))
    ));
    assert!(matches!(
        session.insert_block(
            BlockKind::VariableGet {
                variable: VariableId::from("var-99")
            },
            at(0, 0)
        ),
        Err(EngineError::UnknownVariable(_))
    ));
    let text = session.insert_block_type("text", at(0, 0)).unwrap();
    assert!(matches!(
        session.set_field(text, FieldEdit::Number(1.0)),
        Err(EngineError::FieldMismatch { .. })
    ));
}

#[test]
fn unsupported_targets_fail_to_open() {
    let cron_link = AutomationTarget::link_rule("oc", RuleTrigger::Cron);
    assert!(matches!(
        EditorSession::for_target(catalog(), &cron_link, EditorConfig::default()),
        Err(EngineError::UnsupportedConfiguration(_))
    ));
}

#[test]
fn diagram_reload_reproduces_script() {
    let mut session = order_rule();
    message_with_attribute(&mut session);
    let diagram = session.diagram().to_string();

    let mut reloaded = order_rule();
    reloaded.load_diagram(&diagram).unwrap();
    assert_eq!(reloaded.script(), session.script());
    assert_eq!(reloaded.diagram(), diagram);
}

#[test]
fn listeners_fire_only_on_change() {
    let mut session = order_rule();
    let scripts = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&scripts);
    session.on_script_changed(move |script| sink.borrow_mut().push(script.to_string()));

    let show = session.insert_block(show_message(), at(0, 0)).unwrap();
    assert_eq!(scripts.borrow().len(), 1);

    session.move_block(show, at(40, 40)).unwrap();
    assert_eq!(scripts.borrow().len(), 1);
    assert!(session.diagram().contains("x=\"40\""));
}

#[test]
fn revalidation_of_a_settled_graph_is_quiet() {
    let mut session = order_rule();
    message_with_attribute(&mut session);
    let report = session.revalidate();
    assert!(!report.changed_anything());
    assert!(!report.capped);
}

#[test]
fn changing_created_collection_cascades_through_variable() {
    let mut session = order_rule();
    let x = session.create_variable("created").unwrap();
    let create = session
        .insert_block(
            BlockKind::CreateDocument {
                collection_id: "ord".into(),
            },
            at(0, 0),
        )
        .unwrap();
    let set = session
        .insert_block(BlockKind::VariableSet { variable: x.clone() }, at(200, 100))
        .unwrap();
    session.connect_value(set, Socket::Value, create).unwrap();

    let mut reads = Vec::new();
    let mut prev = set;
    for _ in 0..2 {
        let show = session.insert_block(show_message(), at(0, 0)).unwrap();
        let attr = session.insert_block(get_attribute(), at(0, 0)).unwrap();
        let get = session
            .insert_block(BlockKind::VariableGet { variable: x.clone() }, at(0, 0))
            .unwrap();
        session.connect_value(attr, Socket::Document, get).unwrap();
        session.connect_value(show, Socket::Message, attr).unwrap();
        session.connect_next(prev, show).unwrap();
        prev = show;
        reads.push((attr, get));
    }
    assert_eq!(session.variable_by_name("created").unwrap().tag, record_tag("ord"));
    assert!(reads.iter().all(|(attr, _)| picker_of(&session, *attr).selected() == Some("attr1")));

    session.set_field(create, FieldEdit::Collection("cust".into())).unwrap();

    assert_eq!(session.variable_by_name("created").unwrap().tag, record_tag("cust"));
    for (attr, get) in reads {
        assert_eq!(picker_of(&session, attr).selected(), Some("c1"));
        assert_eq!(session.block(attr).unwrap().document(), Some(get));
        assert_eq!(session.block(get).unwrap().output(), &record_tag("cust"));
    }
}

#[test]
fn attribute_subject_rejects_record_arrays() {
    let mut session = order_rule();
    let attr = session.insert_block(get_attribute(), at(0, 0)).unwrap();
    let siblings = session.insert_block(BlockKind::SiblingDocuments, at(0, 0)).unwrap();
    let record = getter(&session, "newRecord");
    session.connect_value(siblings, Socket::Document, record).unwrap();
    assert_eq!(
        session.block(siblings).unwrap().output(),
        &TypeTag::RecordArray("ord".into())
    );

    assert_eq!(
        session.connect_value(attr, Socket::Document, siblings).unwrap(),
        Connection::Rejected
    );
    assert_eq!(session.block(attr).unwrap().document(), None);
}

#[test]
fn linked_documents_resolve_the_other_side() {
    let mut session = EditorSession::for_target(
        catalog(),
        &AutomationTarget::rule("cust", RuleTrigger::Update),
        EditorConfig::default(),
    )
    .unwrap();
    let linked = session
        .insert_block(
            BlockKind::LinkedDocuments {
                link_type_id: "oc".into(),
            },
            at(0, 0),
        )
        .unwrap();
    let record = getter(&session, "newRecord");
    session.connect_value(linked, Socket::Document, record).unwrap();
    assert_eq!(
        session.block(linked).unwrap().output(),
        &TypeTag::RecordArray("ord".into())
    );
}

#[test]
fn moving_a_binder_above_another_retypes_the_variable() {
    let mut session = order_rule();
    let x = session.create_variable("x").unwrap();
    let mut binders = Vec::new();
    for (collection, y) in [("ord", 100), ("cust", 200)] {
        let create = session
            .insert_block(
                BlockKind::CreateDocument {
                    collection_id: collection.into(),
                },
                at(0, 0),
            )
            .unwrap();
        let set = session
            .insert_block(BlockKind::VariableSet { variable: x.clone() }, at(0, y))
            .unwrap();
        session.connect_value(set, Socket::Value, create).unwrap();
        binders.push(set);
    }
    let get = session
        .insert_block(BlockKind::VariableGet { variable: x.clone() }, at(400, 400))
        .unwrap();
    assert_eq!(session.variable_by_name("x").unwrap().tag, record_tag("ord"));

    session.move_block(binders[1], at(0, -100)).unwrap();

    assert_eq!(session.variable_by_name("x").unwrap().tag, record_tag("cust"));
    assert_eq!(session.block(get).unwrap().output(), &record_tag("cust"));
    assert!(!session.revalidate().changed_anything());
}

#[test]
fn deleting_a_variable_keeps_protected_getters_it_held() {
    let mut session = order_rule();
    let x = session.create_variable("x").unwrap();
    let set = session
        .insert_block(BlockKind::VariableSet { variable: x.clone() }, at(100, 100))
        .unwrap();
    let record = getter(&session, "newRecord");
    session.connect_value(set, Socket::Value, record).unwrap();

    session.delete_variable(&x).unwrap();

    assert!(session.block(set).is_none());
    let new_record = variable(&session, "newRecord");
    assert_eq!(session.graph().getters_of(&new_record), vec![record]);
    assert!(session.block(record).unwrap().is_top_level());
    assert!(!session.last_report().removed.contains(&record));
}

#[test]
fn diagram_with_largest_block_id_still_seeds() {
    let mut session = order_rule();
    session
        .load_diagram(r#"<xml><block type="date_now" id="4294967295" x="2147483647" y="0"/></xml>"#)
        .unwrap();
    assert!(session.block(BlockId(u32::MAX)).is_some());
    for name in ["oldRecord", "newRecord"] {
        let id = variable(&session, name);
        assert_eq!(session.graph().getters_of(&id).len(), 1);
    }
}
