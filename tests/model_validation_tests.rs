use chrono::Utc;
use rbac_portal::{
    models::{
        Action, CreateRoleRequest, CreateUserRequest, GrantInput, Module, ModulePermission,
        UpdateRoleRequest, UpdateUserRequest, User, UserProfile,
    },
    response::{ApiResponse, ErrorDetail},
};

// --- Tests ---

#[test]
fn test_action_wire_names() {
    for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
        assert_eq!(Action::parse(action.as_str()), Some(action));
        assert_eq!(
            serde_json::to_value(action).unwrap(),
            serde_json::Value::String(action.to_string())
        );
    }
    assert_eq!(Action::parse("approve"), None);
    assert_eq!(Action::parse("Read"), None);
}

#[test]
fn test_grant_input_defaults_missing_capabilities() {
    let input: GrantInput = serde_json::from_str(r#"{"module_key":"users","can_read":true}"#).unwrap();
    assert!(input.can_read);
    assert!(!input.can_create && !input.can_update && !input.can_delete);
}

#[test]
fn test_create_role_request_has_no_system_flag() {
    // An injected is_system is ignored by deserialization.
    let input: CreateRoleRequest =
        serde_json::from_str(r#"{"key":"X","name":"X","is_system":true}"#).unwrap();
    let json = serde_json::to_string(&input).unwrap();
    assert!(!json.contains("is_system"));
}

#[test]
fn test_create_role_request_validation() {
    let valid = CreateRoleRequest {
        key: "AUDITOR".to_string(),
        name: "Auditor".to_string(),
        description: None,
    };
    assert!(valid.validate().is_empty());

    let invalid = CreateRoleRequest {
        key: "K".repeat(51),
        name: "  ".to_string(),
        description: None,
    };
    let errors = invalid.validate();
    assert!(errors.contains(&ErrorDetail::field("key", "Role key must be at most 50 characters")));
    assert!(errors.iter().any(|e| e.field.as_deref() == Some("name")));
}

#[test]
fn test_role_requests_respect_column_limits() {
    let patch = UpdateRoleRequest {
        key: Some("K".repeat(60)),
        name: Some("N".repeat(150)),
        description: Some("D".repeat(300)),
    };
    let mut fields: Vec<_> = patch
        .validate()
        .into_iter()
        .filter_map(|e| e.field)
        .collect();
    fields.sort();
    assert_eq!(fields, vec!["description", "key", "name"]);

    let create = CreateRoleRequest {
        key: "AUDITOR".to_string(),
        name: "N".repeat(101),
        description: Some("D".repeat(256)),
    };
    assert_eq!(create.validate().len(), 2);

    // Exactly at the limits is accepted.
    let at_limit = UpdateRoleRequest {
        key: Some("K".repeat(50)),
        name: Some("N".repeat(100)),
        description: Some("D".repeat(255)),
    };
    assert!(at_limit.validate().is_empty());
}

#[test]
fn test_update_role_request_optionality() {
    let partial = UpdateRoleRequest {
        name: Some("New Name Only".to_string()),
        ..UpdateRoleRequest::default()
    };

    let json_output = serde_json::to_string(&partial).unwrap();
    assert!(json_output.contains(r#""name":"New Name Only""#));
    assert!(!json_output.contains("key"));
    assert!(partial.validate().is_empty());

    let parsed: UpdateRoleRequest = serde_json::from_str("{}").unwrap();
    assert!(parsed.key.is_none() && parsed.name.is_none() && parsed.description.is_none());
}

#[test]
fn test_create_user_request_defaults_and_validation() {
    let input: CreateUserRequest = serde_json::from_str(
        r#"{"email":"a@b.io","username":"a","password":"pw"}"#,
    )
    .unwrap();
    assert!(input.is_active);
    assert!(input.can_access_system);
    assert!(input.validate().is_empty());

    for email in ["plain", "@b.io", "a@nodot", "a@.io"] {
        let input = CreateUserRequest {
            email: email.to_string(),
            ..input.clone()
        };
        assert_eq!(input.validate().len(), 1, "{email} should be rejected");
    }
}

#[test]
fn test_user_requests_respect_column_limits() {
    let patch = UpdateUserRequest {
        email: Some(format!("{}@example.com", "a".repeat(250))),
        username: Some("u".repeat(101)),
        full_name: Some("f".repeat(256)),
        ..UpdateUserRequest::default()
    };
    let fields: Vec<_> = patch.validate().into_iter().filter_map(|e| e.field).collect();
    assert_eq!(fields, vec!["email", "username", "full_name"]);
}

#[test]
fn test_update_user_request_cannot_carry_role() {
    let parsed: UpdateUserRequest =
        serde_json::from_str(r#"{"full_name":"N","role_id":1}"#).unwrap();
    let json_output = serde_json::to_string(&parsed).unwrap();
    assert!(!json_output.contains("role_id"));
    assert!(parsed.validate().is_empty());
}

#[test]
fn test_user_profile_hides_password_hash() {
    let user = User {
        id: 7,
        email: "x@example.com".to_string(),
        username: "x".to_string(),
        hashed_password: "$argon2id$secret".to_string(),
        full_name: None,
        is_active: true,
        can_access_system: true,
        is_superuser: false,
        role_id: Some(2),
        created_at: Utc::now(),
        updated_at: None,
    };

    let json_output = serde_json::to_string(&UserProfile::from(user)).unwrap();
    assert!(!json_output.contains("argon2"));
    assert!(!json_output.contains("hashed_password"));
    assert!(json_output.contains(r#""role_id":2"#));
}

#[test]
fn test_module_permission_copies_module_identity() {
    let module = Module {
        id: 3,
        key: "reports".to_string(),
        name: "Reports".to_string(),
        description: None,
    };
    let entry = ModulePermission::new(&module, Default::default());
    assert_eq!(entry.module_id, 3);
    assert_eq!(entry.module_key, "reports");
    assert_eq!(entry.module_name, "Reports");
    assert!(!entry.can_read);
}

#[test]
fn test_envelope_shape() {
    let ok = serde_json::to_value(ApiResponse::ok(1, "done")).unwrap();
    assert_eq!(ok["message"], "done");
    assert_eq!(ok["status"], 200);
    assert_eq!(ok["result"], 1);
    assert_eq!(ok["errors"], serde_json::json!([]));
    assert!(ok.get("meta").is_none());

    let list = serde_json::to_value(ApiResponse::list(vec![1, 2], 12, 2, 2, "page")).unwrap();
    assert_eq!(list["meta"]["totalPages"], 6);
    assert_eq!(list["meta"]["hasNext"], true);
}
