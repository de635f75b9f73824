use crate::model::{
    attribute::AttributeDef,
    entity::ModelDef,
    ontology::Schema,
};
use serde_json::json;

/// Datastore that runs joins natively in the fixture schema.
pub(crate) const JOIN_DATASTORE: &str = "primary";

/// Datastore without native join support.
pub(crate) const ARCHIVE_DATASTORE: &str = "archive";

///
/// Fixture ontology shared by unit tests.
///
/// user (string pk) 1--* pet (number pk) via `owner`
/// pet *--* tag through `pet_tag` (archive datastore, so not optimizable)
///
pub(crate) fn schema() -> Schema {
    Schema::builder()
        .join_capable_datastore(JOIN_DATASTORE)
        .model(
            ModelDef::new("user", "id")
                .datastore(JOIN_DATASTORE)
                .attribute(AttributeDef::string("id"))
                .attribute(AttributeDef::string("name").required())
                .attribute(AttributeDef::number("age"))
                .attribute(AttributeDef::boolean("active").default_value(json!(true)))
                .attribute(AttributeDef::json("settings"))
                .attribute(AttributeDef::number("createdAt").auto_created_at())
                .attribute(AttributeDef::model("bestFriend", "user"))
                .attribute(AttributeDef::collection("pets", "pet").via("owner")),
        )
        .model(
            ModelDef::new("pet", "id")
                .datastore(JOIN_DATASTORE)
                .attribute(AttributeDef::number("id").auto_increment())
                .attribute(AttributeDef::string("name").required())
                .attribute(AttributeDef::string("species").default_value(json!("cat")))
                .attribute(AttributeDef::model("owner", "user"))
                .attribute(AttributeDef::collection("tags", "tag").through("pet_tag")),
        )
        .model(
            ModelDef::new("tag", "id")
                .datastore(ARCHIVE_DATASTORE)
                .attribute(AttributeDef::number("id").auto_increment())
                .attribute(AttributeDef::string("label")),
        )
        .model(
            ModelDef::new("pet_tag", "id")
                .datastore(ARCHIVE_DATASTORE)
                .attribute(AttributeDef::number("id").auto_increment())
                .attribute(AttributeDef::model("pet", "pet"))
                .attribute(AttributeDef::model("tag", "tag")),
        )
        .build()
        .expect("fixture schema should be valid")
}
