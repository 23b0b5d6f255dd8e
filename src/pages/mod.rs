use axum::{response::Html, routing::get, Router};

use crate::{
    session::{CurrentSession, CurrentUser},
    state::AppState,
};

pub mod views;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/services", get(services))
        .route("/doctors", get(doctors))
        .route("/dashboard", get(dashboard))
        .route("/settings", get(settings))
        .route("/my-appointments", get(my_appointments))
        .route("/my-profile", get(my_profile))
}

async fn index(session: CurrentSession) -> Html<String> {
    Html(views::static_page(
        "Welcome to CarePoint",
        "Compassionate care, close to home.",
        session.is_authenticated(),
    ))
}

async fn services(session: CurrentSession) -> Html<String> {
    Html(views::static_page(
        "Our Services",
        "Emergency care, cardiology, pediatrics and diagnostics.",
        session.is_authenticated(),
    ))
}

async fn doctors(session: CurrentSession) -> Html<String> {
    Html(views::static_page(
        "Our Doctors",
        "Meet the specialists on our team.",
        session.is_authenticated(),
    ))
}

async fn dashboard(CurrentUser(user): CurrentUser) -> Html<String> {
    Html(views::member_page("Dashboard", &user))
}

async fn settings(CurrentUser(user): CurrentUser) -> Html<String> {
    Html(views::member_page("Settings", &user))
}

async fn my_appointments(CurrentUser(user): CurrentUser) -> Html<String> {
    Html(views::member_page("My Appointments", &user))
}

async fn my_profile(CurrentUser(user): CurrentUser) -> Html<String> {
    Html(views::member_page("My Profile", &user))
}
