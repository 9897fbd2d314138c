//! OpenAPI document for the management API.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AutoRemind API",
        description = "Multi-tenant SMS reminder platform for small service businesses"
    ),
    paths(
        crate::api::handlers::auth::register,
        crate::api::handlers::auth::login,
        crate::api::handlers::auth::logout,
        crate::api::handlers::auth::me,
        crate::api::handlers::auth::delete_account,
        crate::api::handlers::records::list_records,
        crate::api::handlers::records::create_record,
        crate::api::handlers::records::get_record,
        crate::api::handlers::records::update_record,
        crate::api::handlers::records::delete_record,
        crate::api::handlers::records::delete_records,
        crate::api::handlers::records::import_records,
        crate::api::handlers::records::export_records,
        crate::api::handlers::records::send_record_now,
        crate::api::handlers::settings::get_settings,
        crate::api::handlers::settings::update_settings,
        crate::api::handlers::settings::test_sms,
        crate::api::handlers::billing::get_subscription,
        crate::api::handlers::billing::create_checkout,
        crate::api::handlers::billing::create_portal,
        crate::api::handlers::billing::change_plan,
        crate::api::handlers::webhooks::payments_webhook,
        crate::api::handlers::cron::run_reminders,
    ),
    components(schemas(
        crate::api::models::users::CurrentUser,
        crate::api::models::users::RegisterRequest,
        crate::api::models::users::LoginRequest,
        crate::api::models::users::UserResponse,
        crate::api::models::records::ClientRecordResponse,
        crate::api::models::records::ClientRecordCreate,
        crate::api::models::records::ClientRecordUpdate,
        crate::api::models::records::BulkDeleteRequest,
        crate::api::models::records::BulkDeleteResponse,
        crate::api::models::records::ImportRequest,
        crate::api::models::records::ImportResponse,
        crate::api::models::records::SendNowResponse,
        crate::api::models::settings::SettingsResponse,
        crate::api::models::settings::SettingsUpdate,
        crate::api::models::settings::TestSmsRequest,
        crate::api::models::settings::TestSmsResponse,
        crate::api::models::billing::SubscriptionResponse,
        crate::api::models::billing::CheckoutRequest,
        crate::api::models::billing::RedirectResponse,
        crate::api::models::billing::ChangePlanRequest,
        crate::api::models::billing::ChangePlanResponse,
        crate::api::handlers::cron::CronResponse,
        crate::reminders::dispatcher::DispatchEntry,
        crate::reminders::dispatcher::DispatchReport,
        crate::policy::PlanTier,
    )),
    tags(
        (name = "authentication", description = "Sessions and accounts"),
        (name = "records", description = "Client record management"),
        (name = "settings", description = "Per-tenant settings"),
        (name = "billing", description = "Plans and payments"),
        (name = "webhooks", description = "Inbound provider events"),
        (name = "cron", description = "Scheduled triggers"),
    )
)]
pub struct ApiDoc;
