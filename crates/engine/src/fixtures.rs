//! Shared test data

use normdb_core::Record;
use normdb_schema::{Schema, SchemaConfig, compile};
use serde_json::{Value, json};

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => panic!("fixture must be an object"),
    }
}

/// user, role, post and comment, all identified by `id`
pub fn blog_schema() -> Schema {
    let config = SchemaConfig::from_json(
        r#"{
            "@defaults": { "key": "id" },
            "@authored": { "targets": { "author": "user" } },
            "role": {},
            "user": { "targets": { "role": "role" } },
            "post": {
                "parent": "@authored",
                "targets": { "comments": { "type": "comment", "isArray": true } }
            },
            "comment": "@authored"
        }"#,
    )
    .unwrap();
    compile(&config).unwrap()
}

/// A user that can point at another user
pub fn friends_schema() -> Schema {
    let config = SchemaConfig::from_json(
        r#"{ "user": { "key": "id", "targets": { "bestFriend": "user" } } }"#,
    )
    .unwrap();
    compile(&config).unwrap()
}

pub fn blog_post() -> Value {
    json!({
        "id": 1,
        "title": "Hello",
        "author": { "id": "u1", "name": "One", "role": { "id": "r1", "name": "Admin" } },
        "comments": [
            {
                "id": 10,
                "text": "First",
                "author": { "id": "u1", "name": "One", "role": { "id": "r1", "name": "Admin" } }
            },
            {
                "id": 11,
                "text": "Second",
                "author": { "id": "u2", "name": "Two", "role": { "id": "r2", "name": "Standard" } }
            }
        ]
    })
}
