use crate::{
    Record,
    join::{
        Cardinality, JoinError, JoinInstruction, PlanError, PopulateSpec, RowCache, inner_join,
        integrate, left_outer_join, plan_populate_joins, populate,
    },
    model::{attribute::AttributeDef, entity::ModelDef, ontology::Schema},
    test_fixtures,
};
use serde_json::{Value, json};

fn rows(value: Value) -> Vec<Record> {
    serde_json::from_value(value).expect("rows should be an array of dictionaries")
}

fn hop(parent: &str, child: &str, keys: (&str, &str), alias: &str) -> JoinInstruction {
    JoinInstruction {
        parent: parent.to_string(),
        child: child.to_string(),
        parent_key: keys.0.to_string(),
        child_key: keys.1.to_string(),
        alias: alias.to_string(),
        child_pk: "id".to_string(),
        cardinality: Cardinality::Many,
    }
}

fn run(cache: &RowCache, instructions: &[JoinInstruction]) -> Result<Vec<Record>, JoinError> {
    let mut outcome = None;
    integrate(cache, instructions, |result| outcome = Some(result));

    outcome.expect("completion should run before integrate returns")
}

fn ids(records: &Value) -> Vec<Value> {
    records
        .as_array()
        .expect("alias should hold an array")
        .iter()
        .map(|record| record["id"].clone())
        .collect()
}

fn user_pet_cache() -> RowCache {
    RowCache::new()
        .with_table(
            "user",
            rows(json!([
                { "id": 1, "name": "Ann" },
                { "id": 2, "name": "Bo" },
                { "id": 3, "name": "Cy" },
            ])),
        )
        .with_table(
            "pet",
            rows(json!([
                { "id": 10, "userId": 1, "name": "Rex" },
                { "id": 11, "userId": 3, "name": "Tom" },
                { "id": 12, "userId": 1, "name": "Kit" },
                { "id": 13, "userId": null, "name": "Stray" },
            ])),
        )
}

//
// primitives
//

#[test]
fn left_outer_join_keeps_every_left_row_in_order() {
    let left = rows(json!([{ "id": 1 }, { "id": 2 }, { "id": 3 }]));
    let right = rows(json!([
        { "owner": 3, "n": "a" },
        { "owner": 1, "n": "b" },
        { "owner": 1, "n": "c" },
    ]));

    let joined = left_outer_join(&left, &right, "id", "owner", "pet");
    let shape: Vec<(Value, Value)> = joined
        .iter()
        .map(|row| (row["id"].clone(), row.get("pet.n").cloned().unwrap_or(Value::Null)))
        .collect();

    assert_eq!(
        shape,
        vec![
            (json!(1), json!("b")),
            (json!(1), json!("c")),
            (json!(2), Value::Null),
            (json!(3), json!("a")),
        ]
    );
}

#[test]
fn inner_join_drops_unmatched_rows_and_pairs_every_match() {
    let left = rows(json!([{ "id": 1 }, { "id": 2 }, { "id": null }]));
    let right = rows(json!([
        { "owner": 1, "n": "a" },
        { "owner": 1, "n": "b" },
        { "owner": null, "n": "c" },
    ]));

    let joined = inner_join(&left, &right, "id", "owner", "pet");

    assert_eq!(joined.len(), 2);
    assert!(joined.iter().all(|row| row["id"] == json!(1)));
}

#[test]
fn join_keys_do_not_match_across_types() {
    let left = rows(json!([{ "id": 1 }]));
    let right = rows(json!([{ "owner": "1" }]));

    assert!(inner_join(&left, &right, "id", "owner", "pet").is_empty());
}

#[test]
fn integral_float_keys_match_their_integer() {
    let left = rows(json!([{ "id": 1 }, { "id": 2 }]));
    let right = rows(json!([
        { "owner": 1.0, "n": "a" },
        { "owner": 2.5, "n": "b" },
        { "owner": "2", "n": "c" },
    ]));

    let joined = inner_join(&left, &right, "id", "owner", "pet");

    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0]["pet.n"], json!("a"));
}

#[test]
fn float_foreign_keys_still_populate() {
    let cache = RowCache::new()
        .with_table("user", rows(json!([{ "id": 1 }])))
        .with_table("pet", rows(json!([{ "id": 10, "userId": 1.0 }])));

    let result = run(&cache, &[hop("user", "pet", ("id", "userId"), "pets")]).unwrap();

    assert_eq!(ids(&result[0]["pets"]), vec![json!(10)]);
}

#[test]
fn singular_populate_attaches_record_or_null() {
    let mut parents = rows(json!([{ "id": 1, "pal": 2 }, { "id": 2, "pal": null }]));
    let joined = inner_join(
        &parents,
        &rows(json!([{ "id": 2, "name": "Bo" }])),
        "pal",
        "id",
        "user",
    );

    populate(
        &mut parents,
        &joined,
        &PopulateSpec {
            alias: "pal",
            parent_key: "pal",
            child_table: "user",
            child_pk: "id",
            fk_to_child: "user.id",
            cardinality: Cardinality::One,
        },
    );

    assert_eq!(parents[0]["pal"], json!({ "id": 2, "name": "Bo" }));
    assert_eq!(parents[1]["pal"], Value::Null);
}

//
// integrate
//

#[test]
fn one_hop_gives_every_parent_an_array() {
    let cache = user_pet_cache();
    let result = run(&cache, &[hop("user", "pet", ("id", "userId"), "pets")]).unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(ids(&result[0]["pets"]), vec![json!(10), json!(12)]);
    assert_eq!(result[1]["pets"], json!([]));
    assert_eq!(ids(&result[2]["pets"]), vec![json!(11)]);
    assert_eq!(
        result[2]["pets"][0],
        json!({ "id": 11, "userId": 3, "name": "Tom" })
    );
}

#[test]
fn integrate_leaves_the_cache_untouched() {
    let cache = user_pet_cache();
    let before = cache.clone();

    run(&cache, &[hop("user", "pet", ("id", "userId"), "pets")]).unwrap();
    assert_eq!(cache, before);
}

#[test]
fn two_hops_restrict_to_pairs_reachable_through_the_junction() {
    let cache = RowCache::new()
        .with_table("pet", rows(json!([{ "id": 1 }, { "id": 2 }])))
        .with_table(
            "pet_tag",
            rows(json!([
                { "id": 100, "pet": 1, "tag": 7 },
                { "id": 101, "pet": 1, "tag": 8 },
                { "id": 102, "pet": 3, "tag": 9 },
                { "id": 103, "pet": 1, "tag": 7 },
            ])),
        )
        .with_table(
            "tag",
            rows(json!([
                { "id": 7, "label": "cute" },
                { "id": 8, "label": "old" },
                { "id": 9, "label": "loud" },
            ])),
        );
    let instructions = [
        hop("pet", "pet_tag", ("id", "pet"), "tags"),
        hop("pet_tag", "tag", ("tag", "id"), "tags"),
    ];

    let result = run(&cache, &instructions).unwrap();

    // tag 9 hangs off a junction row for a pet that is not in the result
    assert_eq!(ids(&result[0]["tags"]), vec![json!(7), json!(8)]);
    assert_eq!(result[1]["tags"], json!([]));
    assert_eq!(result[0]["tags"][1], json!({ "id": 8, "label": "old" }));
}

#[test]
fn several_aliases_populate_the_same_root_rows() {
    let cache = user_pet_cache().with_table(
        "toy",
        rows(json!([{ "id": 5, "ownerId": 2 }])),
    );
    let instructions = [
        hop("user", "pet", ("id", "userId"), "pets"),
        hop("user", "toy", ("id", "ownerId"), "toys"),
    ];

    let result = run(&cache, &instructions).unwrap();

    assert_eq!(result[1]["pets"], json!([]));
    assert_eq!(ids(&result[1]["toys"]), vec![json!(5)]);
    assert_eq!(result[0]["toys"], json!([]));
}

#[test]
fn integrate_reports_failures_through_the_completion() {
    let cache = user_pet_cache();

    assert_eq!(run(&cache, &[]), Err(JoinError::NoInstructions));
    assert_eq!(
        run(&cache, &[hop("owner", "pet", ("id", "userId"), "pets")]),
        Err(JoinError::MissingTable {
            table: "owner".to_string()
        })
    );
    assert_eq!(
        run(&cache, &[hop("user", "bone", ("id", "userId"), "bones")]),
        Err(JoinError::MissingTable {
            table: "bone".to_string()
        })
    );

    let three = [
        hop("user", "pet", ("id", "userId"), "pets"),
        hop("pet", "pet", ("id", "id"), "pets"),
        hop("pet", "pet", ("id", "id"), "pets"),
    ];
    assert_eq!(
        run(&cache, &three),
        Err(JoinError::MalformedAlias {
            alias: "pets".to_string(),
            hops: 3
        })
    );

    let broken_chain = [
        hop("user", "pet", ("id", "userId"), "pets"),
        hop("user", "pet", ("id", "userId"), "pets"),
    ];
    assert!(matches!(
        run(&cache, &broken_chain),
        Err(JoinError::ConflictingAlias { .. })
    ));
}

#[test]
fn row_cache_deserializes_from_json() {
    let cache: RowCache = serde_json::from_value(json!({
        "user": [{ "id": 1 }],
        "pet": [],
    }))
    .unwrap();

    assert_eq!(cache.len(), 2);
    assert!(cache["pet"].is_empty());
}

//
// planning
//

#[test]
fn planner_builds_one_hop_for_singular_and_via_associations() {
    let schema = test_fixtures::schema();

    let best_friend = plan_populate_joins(&schema, "user", "bestFriend").unwrap();
    assert_eq!(
        best_friend,
        vec![JoinInstruction {
            parent: "user".to_string(),
            child: "user".to_string(),
            parent_key: "bestFriend".to_string(),
            child_key: "id".to_string(),
            alias: "bestFriend".to_string(),
            child_pk: "id".to_string(),
            cardinality: Cardinality::One,
        }]
    );

    let pets = plan_populate_joins(&schema, "user", "pets").unwrap();
    assert_eq!(pets.len(), 1);
    assert_eq!(pets[0].parent_key, "id");
    assert_eq!(pets[0].child_key, "owner");
    assert_eq!(pets[0].cardinality, Cardinality::Many);
}

#[test]
fn planner_builds_two_hops_through_a_junction() {
    let schema = test_fixtures::schema();
    let tags = plan_populate_joins(&schema, "pet", "tags").unwrap();

    assert_eq!(tags.len(), 2);
    assert_eq!(
        (tags[0].parent.as_str(), tags[0].child.as_str()),
        ("pet", "pet_tag")
    );
    assert_eq!(
        (tags[0].parent_key.as_str(), tags[0].child_key.as_str()),
        ("id", "pet")
    );
    assert_eq!(
        (tags[1].parent.as_str(), tags[1].child.as_str()),
        ("pet_tag", "tag")
    );
    assert_eq!(
        (tags[1].parent_key.as_str(), tags[1].child_key.as_str()),
        ("tag", "id")
    );
    assert!(tags.iter().all(|hop| hop.alias == "tags"));
}

#[test]
fn planner_rejects_non_associations_and_unjoinable_collections() {
    let schema = test_fixtures::schema();
    assert!(matches!(
        plan_populate_joins(&schema, "user", "age"),
        Err(PlanError::NotAnAssociation { .. })
    ));
    assert!(matches!(
        plan_populate_joins(&schema, "user", "ghost"),
        Err(PlanError::Ontology(_))
    ));

    let loose = Schema::builder()
        .model(
            ModelDef::new("shelf", "id")
                .attribute(AttributeDef::number("id"))
                .attribute(AttributeDef::collection("books", "book")),
        )
        .model(ModelDef::new("book", "id").attribute(AttributeDef::number("id")))
        .build()
        .unwrap();
    assert!(matches!(
        plan_populate_joins(&loose, "shelf", "books"),
        Err(PlanError::NoJoinPath { .. })
    ));
}

#[test]
fn planned_instructions_drive_integration() {
    let schema = test_fixtures::schema();
    let cache = RowCache::new()
        .with_table(
            "user",
            rows(json!([
                { "id": "u1", "bestFriend": "u2" },
                { "id": "u2", "bestFriend": null },
            ])),
        )
        .with_table(
            "pet",
            rows(json!([{ "id": 1, "owner": "u2", "name": "Rex" }])),
        );

    let mut instructions = plan_populate_joins(&schema, "user", "pets").unwrap();
    let result = run(&cache, &instructions).unwrap();
    assert_eq!(result[0]["pets"], json!([]));
    assert_eq!(ids(&result[1]["pets"]), vec![json!(1)]);

    instructions = plan_populate_joins(&schema, "user", "bestFriend").unwrap();
    let result = run(&cache, &instructions).unwrap();
    assert_eq!(result[0]["bestFriend"]["id"], json!("u2"));
    assert_eq!(result[1]["bestFriend"], Value::Null);
}
