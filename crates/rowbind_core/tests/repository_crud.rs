use rowbind_core::{
    Criteria, Criterion, EntityBinding, FieldDef, MetaRegistry, RepoError, Repository, Row,
    SaveOutcome, SqliteAdapter, TableDef, Value,
};

#[derive(Debug, Clone, Default, PartialEq)]
struct User {
    id: Option<i64>,
    name: String,
    age: i64,
}

fn user_binding() -> EntityBinding<User> {
    EntityBinding::new("User", User::default)
        .with_getter("getId", |user| {
            user.id.map(Value::Integer).unwrap_or(Value::Null)
        })
        .with_setter("setId", |user, value| {
            if let Value::Integer(id) = value {
                user.id = Some(id);
            }
        })
        .with_getter("getName", |user| Value::Text(user.name.clone()))
        .with_setter("setName", |user, value| {
            if let Value::Text(name) = value {
                user.name = name;
            }
        })
        .with_getter("getAge", |user| Value::Integer(user.age))
        .with_setter("setAge", |user, value| {
            if let Value::Integer(age) = value {
                user.age = age;
            }
        })
}

fn user_registry() -> MetaRegistry {
    let mut registry = MetaRegistry::new();
    registry
        .register(
            TableDef::new("users", "id", user_binding())
                .with_field(FieldDef::new("id"))
                .with_field(FieldDef::new("name"))
                .with_field(FieldDef::new("age")),
        )
        .unwrap();
    registry
}

fn user_adapter() -> SqliteAdapter {
    let adapter = SqliteAdapter::open_in_memory().unwrap();
    adapter
        .connection()
        .unwrap()
        .execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER);")
        .unwrap();
    adapter
}

#[test]
fn save_assigns_identity_and_round_trips() {
    let adapter = user_adapter();
    let repo = Repository::new(&adapter, user_registry());

    let mut user = User {
        id: None,
        name: "ada".to_string(),
        age: 36,
    };
    assert!(repo.save(&mut user).unwrap());
    let id = user.id.expect("insert should write the new id back");

    let loaded: User = repo.find_by_id(id).unwrap().expect("row should exist");
    assert_eq!(loaded, user);
}

#[test]
fn save_routes_to_update_when_identity_present() {
    let adapter = user_adapter();
    let repo = Repository::new(&adapter, user_registry());

    let mut user = User {
        id: None,
        name: "draft".to_string(),
        age: 20,
    };
    repo.save(&mut user).unwrap();
    let id = user.id.unwrap();

    user.name = "final".to_string();
    assert!(repo.save(&mut user).unwrap());

    let all: Vec<User> = repo.find(&Criteria::new()).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, Some(id));
    assert_eq!(all[0].name, "final");
}

#[test]
fn save_raw_branches_on_identity_presence() {
    let adapter = user_adapter();
    let repo = Repository::new(&adapter, user_registry());

    let insert_row = Row::from([("name".to_string(), Value::Text("x".to_string()))]);
    let outcome = repo.save_raw(insert_row, None).unwrap();
    let id = match &outcome {
        SaveOutcome::Inserted(Some(Value::Integer(id))) => *id,
        other => panic!("expected insert outcome, got {other:?}"),
    };
    assert!(outcome.succeeded());

    let update_row = Row::from([
        ("id".to_string(), Value::Integer(id)),
        ("name".to_string(), Value::Text("y".to_string())),
    ]);
    assert_eq!(
        repo.save_raw(update_row, None).unwrap(),
        SaveOutcome::Updated(true)
    );

    let missing_row = Row::from([
        ("id".to_string(), Value::Integer(9999)),
        ("name".to_string(), Value::Text("z".to_string())),
    ]);
    assert_eq!(
        repo.save_raw(missing_row, None).unwrap(),
        SaveOutcome::Updated(false)
    );
}

#[test]
fn save_raw_treats_empty_identity_as_insert() {
    let adapter = user_adapter();
    let repo = Repository::new(&adapter, user_registry());

    let row = Row::from([
        ("id".to_string(), Value::Null),
        ("name".to_string(), Value::Text("x".to_string())),
    ]);
    assert!(matches!(
        repo.save_raw(row, None).unwrap(),
        SaveOutcome::Inserted(Some(_))
    ));
}

#[test]
fn update_raw_without_identity_fails_loudly() {
    let adapter = user_adapter();
    let repo = Repository::new(&adapter, user_registry());

    let row = Row::from([("name".to_string(), Value::Text("x".to_string()))]);
    let err = repo.update_raw(row, None).unwrap_err();
    assert!(matches!(err, RepoError::MissingIdentity { .. }));
}

#[test]
fn insert_raw_strips_caller_supplied_identity() {
    let adapter = user_adapter();
    let repo = Repository::new(&adapter, user_registry());

    let row = Row::from([
        ("id".to_string(), Value::Integer(42)),
        ("name".to_string(), Value::Text("x".to_string())),
    ]);
    let id = repo.insert_raw(row, None).unwrap().expect("id assigned");
    assert_eq!(id, Value::Integer(1));
}

#[test]
fn find_preserves_adapter_row_order() {
    let adapter = user_adapter();
    let repo = Repository::new(&adapter, user_registry());

    for (name, age) in [("c", 30), ("a", 10), ("b", 20)] {
        let mut user = User {
            id: None,
            name: name.to_string(),
            age,
        };
        repo.save(&mut user).unwrap();
    }

    let raw_ids: Vec<Value> = repo
        .find_raw(&Criteria::new(), None)
        .unwrap()
        .into_iter()
        .map(|row| row["id"].clone())
        .collect();
    let entity_ids: Vec<Value> = repo
        .find::<User>(&Criteria::new())
        .unwrap()
        .into_iter()
        .map(|user| Value::Integer(user.id.unwrap()))
        .collect();
    assert_eq!(entity_ids, raw_ids);
}

#[test]
fn find_with_between_criteria() {
    let adapter = user_adapter();
    let repo = Repository::new(&adapter, user_registry());

    for age in [10, 20, 30] {
        let mut user = User {
            id: None,
            name: format!("u{age}"),
            age,
        };
        repo.save(&mut user).unwrap();
    }

    let criteria = Criteria::from([("age".to_string(), Criterion::between(15i64, 30i64))]);
    let matched: Vec<User> = repo.find(&criteria).unwrap();
    assert_eq!(matched.len(), 2);
    assert!(matched.iter().all(|user| user.age >= 15));
}

#[test]
fn find_one_returns_first_match_or_none() {
    let adapter = user_adapter();
    let repo = Repository::new(&adapter, user_registry());

    let mut user = User {
        id: None,
        name: "only".to_string(),
        age: 1,
    };
    repo.save(&mut user).unwrap();

    let found: Option<User> = repo.find_one(&Criteria::new()).unwrap();
    assert_eq!(found.map(|u| u.name), Some("only".to_string()));

    let criteria = Criteria::from([("age".to_string(), Criterion::eq(99i64))]);
    let missing: Option<User> = repo.find_one(&criteria).unwrap();
    assert!(missing.is_none());
}

#[test]
fn delete_removes_persisted_entity() {
    let adapter = user_adapter();
    let repo = Repository::new(&adapter, user_registry());

    let mut user = User {
        id: None,
        name: "gone".to_string(),
        age: 5,
    };
    repo.save(&mut user).unwrap();
    let id = user.id.unwrap();

    assert!(repo.delete(&user).unwrap());
    let missing: Option<User> = repo.find_by_id(id).unwrap();
    assert!(missing.is_none());
}

#[test]
fn delete_by_id_reports_missing_rows() {
    let adapter = user_adapter();
    let repo = Repository::new(&adapter, user_registry());

    assert!(!repo.delete_by_id(Value::Integer(7), None).unwrap());
}

#[test]
fn table_name_resolution_uses_default_and_class() {
    let adapter = user_adapter();
    let repo = Repository::new(&adapter, user_registry());

    assert_eq!(repo.table_name(None), Some("users".to_string()));
    assert_eq!(repo.table_name(Some("User")), Some("users".to_string()));
    assert_eq!(repo.table_name(Some("Ghost")), None);
    // Second lookup is served from the memoization cache.
    assert_eq!(repo.table_name(Some("User")), Some("users".to_string()));
}

#[test]
fn typed_operations_reject_unbound_entity_types() {
    #[derive(Debug, Default)]
    struct Stranger;

    let adapter = user_adapter();
    let repo = Repository::new(&adapter, user_registry());

    let err = repo.find::<Stranger>(&Criteria::new()).unwrap_err();
    assert!(matches!(err, RepoError::UnboundType(_)));
}
