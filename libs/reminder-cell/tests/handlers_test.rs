use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::Json;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reminder_cell::handlers::*;
use reminder_cell::models::{CreateReminderRequest, DispatchRequest, ScheduleType};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    let auth = Authorization::bearer(token).unwrap();
    TypedHeader(auth)
}

fn patient_extension() -> Extension<User> {
    Extension(TestUser::patient("patient@example.com").to_user())
}

fn create_request(schedule_type: ScheduleType) -> CreateReminderRequest {
    CreateReminderRequest {
        title: "Losartan 50mg".to_string(),
        message: None,
        schedule_type,
        start_time: "2024-06-01T09:00:00Z".parse().unwrap(),
        recurrence_interval_minutes: None,
        days_of_week: None,
        timezone: None,
        channels: None,
        notify_email: None,
        notify_push: None,
    }
}

#[tokio::test]
async fn dispatch_rejects_a_non_uuid_reminder_id() {
    let config = TestConfig::default().to_arc();
    let body = DispatchRequest {
        reminder_id: Some("definitely-not-a-uuid".to_string()),
    };

    let result = dispatch_reminders(State(config), Some(Json(body))).await;

    assert_matches!(result, Err(AppError::BadRequest(_)));
}

#[tokio::test]
async fn dispatch_refuses_to_run_without_persistence_credentials() {
    let config = Arc::new(AppConfig {
        supabase_url: String::new(),
        supabase_service_role_key: String::new(),
        supabase_anon_key: String::new(),
        supabase_jwt_secret: String::new(),
        email_provider_url: None,
        push_provider_url: None,
        sms_provider_url: None,
        webhook_provider_url: None,
    });

    let result = dispatch_reminders(State(config), None).await;

    assert_matches!(result, Err(AppError::Internal(_)));
}

#[tokio::test]
async fn dispatch_maps_an_unknown_reminder_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/reminders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let body = DispatchRequest {
        reminder_id: Some(Uuid::new_v4().to_string()),
    };

    let result = dispatch_reminders(State(config), Some(Json(body))).await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn dispatch_answers_with_the_reminder_outcome_shape() {
    let server = MockServer::start().await;
    let reminder_id = Uuid::new_v4();

    let patient_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/reminders"))
        .and(query_param("id", format!("eq.{}", reminder_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::reminder_row(&reminder_id.to_string(), &patient_id.to_string())
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/reminder_notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::notification_row(
                &reminder_id.to_string(),
                &patient_id.to_string(),
                "email",
            )
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/reminders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}])))
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let body = DispatchRequest {
        reminder_id: Some(reminder_id.to_string()),
    };

    let Json(response) = dispatch_reminders(State(config), Some(Json(body)))
        .await
        .unwrap();

    assert_eq!(response["reminderId"], json!(reminder_id));
    let attempts = response["attempts"].as_array().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["type"], json!("email"));
    // Email endpoint was never configured, so the attempt failed but the
    // reminder still rescheduled.
    assert_eq!(attempts[0]["success"], json!(false));
    assert_eq!(response["active"], json!(true));
}

#[tokio::test]
async fn create_rejects_weekly_reminders_without_days() {
    let config = TestConfig::default().to_arc();
    let request = create_request(ScheduleType::Weekly);

    let result = create_reminder(
        State(config),
        create_auth_header("test-token"),
        patient_extension(),
        Json(request),
    )
    .await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn create_rejects_custom_reminders_without_an_interval() {
    let config = TestConfig::default().to_arc();
    let request = create_request(ScheduleType::Custom);

    let result = create_reminder(
        State(config),
        create_auth_header("test-token"),
        patient_extension(),
        Json(request),
    )
    .await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn create_rejects_an_empty_title() {
    let config = TestConfig::default().to_arc();
    let mut request = create_request(ScheduleType::Daily);
    request.title = "   ".to_string();

    let result = create_reminder(
        State(config),
        create_auth_header("test-token"),
        patient_extension(),
        Json(request),
    )
    .await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn create_initializes_the_first_trigger_to_the_start_instant() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/reminders"))
        .and(wiremock::matchers::body_partial_json(json!({
            "schedule_type": "daily",
            "recurrence_interval_minutes": 1440,
            "active": true,
            "next_trigger_at": "2024-06-01T09:00:00Z"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "title": "Losartan 50mg",
            "schedule_type": "daily",
            "start_time": "2024-06-01T09:00:00Z",
            "recurrence_interval_minutes": 1440,
            "days_of_week": [],
            "timezone": "UTC",
            "active": true,
            "next_trigger_at": "2024-06-01T09:00:00Z",
            "last_triggered_at": null,
            "channels": null,
            "notify_email": true,
            "notify_push": false,
            "created_at": "2024-05-30T00:00:00Z",
            "updated_at": "2024-05-30T00:00:00Z"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let request = create_request(ScheduleType::Daily);

    let Json(response) = create_reminder(
        State(config),
        create_auth_header("test-token"),
        patient_extension(),
        Json(request),
    )
    .await
    .unwrap();

    assert_eq!(response["next_trigger_at"], json!("2024-06-01T09:00:00Z"));
}
