//! Forge a find-with-populate query, plan its joins, and integrate a row
//! cache the way an adapter without native joins would.

use quarry_core::{
    Record,
    config::ForgeConfig,
    join::{RowCache, integrate, plan_populate_joins},
    model::{attribute::AttributeDef, entity::ModelDef, ontology::Schema},
    obs::sink::NoopSink,
    query::{Method, PopulateDirective, QueryForge, RawQuery, UsageErrorCode},
};
use serde_json::{Value, json};

fn library() -> Schema {
    Schema::builder()
        .model(
            ModelDef::new("author", "id")
                .attribute(AttributeDef::number("id").auto_increment())
                .attribute(AttributeDef::string("name").required())
                .attribute(AttributeDef::collection("books", "book").via("author")),
        )
        .model(
            ModelDef::new("book", "id")
                .attribute(AttributeDef::number("id").auto_increment())
                .attribute(AttributeDef::string("title"))
                .attribute(AttributeDef::model("author", "author")),
        )
        .build()
        .expect("library schema should be valid")
}

fn rows(value: Value) -> Vec<Record> {
    serde_json::from_value(value).expect("rows should be an array of dictionaries")
}

#[test]
fn forged_populates_plan_and_integrate() {
    let schema = library();
    let forge = QueryForge::new(&schema)
        .with_config(ForgeConfig::default())
        .with_sink(&NoopSink);

    let query = forge
        .forge_raw(
            RawQuery::from_json(json!({
                "using": "author",
                "method": "find",
                "criteria": { "select": ["name"] },
                "populates": { "books": true },
            }))
            .unwrap(),
        )
        .unwrap();

    assert_eq!(query.method(), Method::Find);
    let criteria = query.criteria().unwrap();
    assert_eq!(
        criteria.select,
        Some(vec!["id".to_string(), "name".to_string()])
    );

    let populates = query.populates().unwrap();
    assert!(matches!(
        populates.get("books"),
        Some(PopulateDirective::Plural(_))
    ));

    let mut instructions = Vec::new();
    for attribute in populates.keys() {
        instructions.extend(plan_populate_joins(&schema, &query.using, attribute).unwrap());
    }

    let cache = RowCache::new()
        .with_table(
            "author",
            rows(json!([{ "id": 1, "name": "Le Guin" }, { "id": 2, "name": "Banks" }])),
        )
        .with_table(
            "book",
            rows(json!([
                { "id": 7, "title": "Excession", "author": 2 },
                { "id": 8, "title": "Lathe", "author": 1 },
                { "id": 9, "title": "Inversions", "author": 2 },
            ])),
        );

    let mut outcome = None;
    integrate(&cache, &instructions, |result| outcome = Some(result));
    let authors = outcome.unwrap().unwrap();

    assert_eq!(authors.len(), 2);
    assert_eq!(authors[0]["books"][0]["title"], json!("Lathe"));
    assert_eq!(
        authors[1]["books"]
            .as_array()
            .unwrap()
            .iter()
            .map(|book| book["id"].clone())
            .collect::<Vec<_>>(),
        vec![json!(7), json!(9)]
    );
}

#[test]
fn usage_errors_surface_stable_codes() {
    let schema = library();
    let err = QueryForge::new(&schema)
        .with_sink(&NoopSink)
        .forge_raw(
            RawQuery::from_json(json!({
                "using": "book",
                "method": "create",
                "newRecord": { "title": 12 },
            }))
            .unwrap(),
        )
        .unwrap_err();

    assert_eq!(err.usage_code(), Some(UsageErrorCode::InvalidNewRecord));
    assert!(err.to_string().starts_with("E_INVALID_NEW_RECORD"));
}
