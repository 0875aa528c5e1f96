pub mod health;
pub mod notifications;
pub mod tasks;
pub mod users;

use actix_web::web;

/// Mounts the API resources. The caller wraps the result in `/api` and the
/// auth middleware.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .service(users::register)
            .service(users::login)
            .service(users::forgot_password)
            .service(users::reset_password)
            .service(users::get_profile)
            .service(users::update_profile),
    )
    .service(
        web::scope("/tasks")
            .service(
                web::scope("/notifications")
                    .service(notifications::subscribe)
                    .service(notifications::unsubscribe)
                    .service(notifications::get_preferences),
            )
            .service(tasks::filter_tasks)
            .service(tasks::tasks_by_priority)
            .service(tasks::send_test_email)
            .service(tasks::get_tasks)
            .service(tasks::create_task)
            .service(tasks::get_task)
            .service(tasks::update_task)
            .service(tasks::delete_task),
    );
}
